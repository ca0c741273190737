//! Text loads through the response cache, with linear-backoff retries.

use std::pin::pin;

use async_trait::async_trait;
use futures::future::select;
use tokio_util::sync::CancellationToken;
use web_time::Duration;

use crate::config::RetryPolicy;
use crate::error::FetchError;
use crate::http_cache::{
    CacheStorage, FetchWithCacheOptions, HttpFetcher, HttpMethod, fetch_with_cache,
};

/// Timer seam; the browser shell backs it with `setTimeout`.
#[async_trait(?Send)]
pub trait Delay {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub cache_name: String,
    pub bypass_cache: bool,
    pub signal: Option<CancellationToken>,
}

impl LoadOptions {
    pub fn new(cache_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            bypass_cache: false,
            signal: None,
        }
    }

    #[must_use]
    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    #[must_use]
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedText {
    pub text: String,
    pub from_cache: bool,
}

/// What a content view renders for one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextLoadState {
    Loading,
    Ready(CachedText),
    Failed { message: String },
    /// Superseded or torn down; nothing should be rendered from it.
    Cancelled,
}

impl TextLoadState {
    #[must_use]
    pub fn from_result(result: Result<CachedText, FetchError>) -> Self {
        match result {
            Ok(text) => Self::Ready(text),
            Err(FetchError::Aborted) => Self::Cancelled,
            Err(error) => Self::Failed {
                message: error.to_string(),
            },
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

pub struct CachedTextLoader<'a> {
    fetcher: &'a dyn HttpFetcher,
    cache: Option<&'a dyn CacheStorage>,
    delay: &'a dyn Delay,
    retry: RetryPolicy,
}

impl<'a> CachedTextLoader<'a> {
    pub fn new(
        fetcher: &'a dyn HttpFetcher,
        cache: Option<&'a dyn CacheStorage>,
        delay: &'a dyn Delay,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            cache,
            delay,
            retry,
        }
    }

    /// An empty `url` means "nothing to show" and resolves immediately.
    pub async fn load(&self, url: &str, options: &LoadOptions) -> Result<CachedText, FetchError> {
        if url.is_empty() {
            return Ok(CachedText::default());
        }

        let cache_name = options.cache_name.as_str();
        let signal = options.signal.as_ref();
        tracing::debug!(url, cache_name, bypass_cache = options.bypass_cache, "text.fetch.start");

        let mut last_error = None;
        for attempt in 0..=self.retry.max_retries {
            if is_cancelled(signal) {
                return Err(FetchError::Aborted);
            }
            match self.attempt(url, options).await {
                Ok(text) => {
                    tracing::debug!(
                        url,
                        cache_name,
                        from_cache = text.from_cache,
                        bytes = text.text.len(),
                        "text.fetch.success"
                    );
                    return Ok(text);
                }
                Err(error) => {
                    if error.is_aborted() || is_cancelled(signal) {
                        return Err(FetchError::Aborted);
                    }
                    if attempt < self.retry.max_retries {
                        let wait = self.retry.delay_for_attempt(attempt);
                        tracing::debug!(
                            url,
                            cache_name,
                            attempt = attempt + 1,
                            wait_ms = wait.as_millis() as u64,
                            %error,
                            "text.fetch.retry"
                        );
                        self.sleep(wait, signal).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        if is_cancelled(signal) {
            return Err(FetchError::Aborted);
        }
        let error = last_error.unwrap_or_else(|| FetchError::network("no fetch attempt was made"));
        tracing::warn!(url, cache_name, %error, "text.fetch.error");
        Err(error)
    }

    async fn attempt(&self, url: &str, options: &LoadOptions) -> Result<CachedText, FetchError> {
        let fetch_options = FetchWithCacheOptions {
            cache_name: options.cache_name.clone(),
            bypass_cache: options.bypass_cache,
            signal: options.signal.clone(),
            method: HttpMethod::Get,
        };
        let result = fetch_with_cache(self.fetcher, self.cache, url, &fetch_options).await?;
        if !result.response.ok() {
            return Err(FetchError::Status {
                status: result.response.status,
            });
        }
        Ok(CachedText {
            text: result.response.text(),
            from_cache: result.from_cache,
        })
    }

    async fn sleep(&self, wait: Duration, signal: Option<&CancellationToken>) {
        match signal {
            Some(signal) => {
                let cancelled = pin!(signal.cancelled());
                select(self.delay.sleep(wait), cancelled).await;
            }
            None => self.delay.sleep(wait).await,
        }
    }
}

fn is_cancelled(signal: Option<&CancellationToken>) -> bool {
    signal.is_some_and(CancellationToken::is_cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_state_maps_results() {
        assert_eq!(
            TextLoadState::from_result(Err(FetchError::Status { status: 503 })),
            TextLoadState::Failed {
                message: "HTTP 503".to_string()
            }
        );
        assert_eq!(
            TextLoadState::from_result(Err(FetchError::Aborted)),
            TextLoadState::Cancelled
        );
        assert_eq!(
            TextLoadState::from_result(Ok(CachedText::default())),
            TextLoadState::Ready(CachedText::default())
        );
        assert!(TextLoadState::Loading.is_loading());
    }
}
