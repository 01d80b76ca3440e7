use std::{future::Future, sync::Arc};

use crate::{
    cache::Cache,
    error::FetchError,
    provider::WeatherProvider,
    retry::{RetryPolicy, Sleeper, TokioSleeper, retry_request},
};

/// Collaborators shared by every fetcher: the API, the cache, and the retry
/// policy with its sleeper. Clones share all of them.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub provider: Arc<dyn WeatherProvider>,
    pub cache: Cache,
    pub retry_policy: RetryPolicy,
    pub sleeper: Arc<dyn Sleeper>,
}

impl FetchContext {
    pub fn new(provider: Arc<dyn WeatherProvider>, cache: Cache) -> Self {
        Self {
            provider,
            cache,
            retry_policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub async fn retry<T, F, Fut>(&self, operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        retry_request(&self.retry_policy, self.sleeper.as_ref(), operation).await
    }
}
