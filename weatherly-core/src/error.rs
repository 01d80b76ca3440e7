use thiserror::Error;

/// Failure of a data fetch: configuration, input, remote lookup or transport.
///
/// Every variant resolves to a short user-facing string through
/// [`FetchError::user_message`]; none of them is fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("Invalid location format")]
    InvalidLocation,

    /// Forward geocoding returned no candidates.
    #[error("Location not found")]
    LocationNotFound,

    /// The API answered with a non-success status.
    #[error("request failed with status {status}: {}", .message.as_deref().unwrap_or("Unknown error"))]
    Http { status: u16, message: Option<String> },

    /// No response at all (DNS, connect, reset...).
    #[error("network failure: {0}")]
    Network(String),

    #[error("{0}")]
    Unexpected(String),
}

impl FetchError {
    /// Permanent "nothing there" outcomes. These are never retried.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Http { status: 404, .. } | FetchError::LocationNotFound)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message shown next to the affected panel.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Http { status, message } => match status {
                400 => "Bad request: Please check the input data.".to_string(),
                401 => "Unauthorized: Invalid API key.".to_string(),
                403 => "Forbidden: Access denied.".to_string(),
                404 => "Not found: Location not found. Please check the spelling.".to_string(),
                429 => "Too many requests: Please try again later.".to_string(),
                500 => "Server error: Please try again later.".to_string(),
                other => format!(
                    "API error ({other}): {}",
                    message.as_deref().unwrap_or("Unknown error")
                ),
            },
            FetchError::Network(_) => {
                "Network error: Unable to connect. Please check your internet connection."
                    .to_string()
            }
            FetchError::MissingApiKey | FetchError::InvalidLocation => self.to_string(),
            FetchError::LocationNotFound | FetchError::Unexpected(_) => {
                format!("Unexpected error: {self}")
            }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_builder() {
            FetchError::Unexpected(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Failure of the persistence layer behind the cache. Never reaches callers of
/// [`crate::cache::Cache`]; it is logged and treated as a cache miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("storage quota exceeded: {needed} bytes needed, capacity is {capacity}")]
    QuotaExceeded { needed: usize, capacity: usize },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("entry could not be (de)serialized: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
