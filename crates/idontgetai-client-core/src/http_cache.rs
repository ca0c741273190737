//! Read-through response cache in front of the network.
//!
//! Only successful, non-opaque `GET` responses are written. Every cache
//! failure is logged and treated as a miss; only network failures and
//! cancellation reach the caller.

use std::cell::RefCell;
use std::collections::HashMap;
use std::pin::pin;

use async_trait::async_trait;
use futures::future::{Either, select};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: HttpMethod,
}

/// Mirrors the browser `Response.type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseKind {
    #[default]
    Basic,
    Cors,
    Default,
    Error,
    Opaque,
    OpaqueRedirect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub url: String,
    pub status: u16,
    pub kind: ResponseKind,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status,
            kind: ResponseKind::Basic,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn is_cacheable(&self) -> bool {
        self.ok() && self.kind != ResponseKind::Opaque
    }
}

#[async_trait(?Send)]
pub trait HttpFetcher {
    /// Implementations should abort the underlying request when `signal`
    /// fires; the cache layer stops waiting either way.
    async fn fetch(
        &self,
        request: &FetchRequest,
        signal: Option<&CancellationToken>,
    ) -> Result<FetchedResponse, FetchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheStoreError {
    #[error("cache storage is unavailable")]
    Unavailable,
    #[error("cache write was aborted")]
    Aborted,
    #[error("cache `{cache_name}` operation failed: {message}")]
    Operation { cache_name: String, message: String },
}

/// Named response caches keyed by URL (the browser Cache API shape).
#[async_trait(?Send)]
pub trait CacheStorage {
    async fn lookup(
        &self,
        cache_name: &str,
        url: &str,
    ) -> Result<Option<FetchedResponse>, CacheStoreError>;

    /// Must not commit the entry once `signal` has fired; report
    /// [`CacheStoreError::Aborted`] instead.
    async fn store(
        &self,
        cache_name: &str,
        url: &str,
        response: &FetchedResponse,
        signal: Option<&CancellationToken>,
    ) -> Result<(), CacheStoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    entries: RefCell<HashMap<(String, String), FetchedResponse>>,
}

impl MemoryCacheStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, cache_name: &str, url: &str) -> bool {
        self.entries
            .borrow()
            .contains_key(&(cache_name.to_string(), url.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[async_trait(?Send)]
impl CacheStorage for MemoryCacheStorage {
    async fn lookup(
        &self,
        cache_name: &str,
        url: &str,
    ) -> Result<Option<FetchedResponse>, CacheStoreError> {
        Ok(self
            .entries
            .borrow()
            .get(&(cache_name.to_string(), url.to_string()))
            .cloned())
    }

    async fn store(
        &self,
        cache_name: &str,
        url: &str,
        response: &FetchedResponse,
        signal: Option<&CancellationToken>,
    ) -> Result<(), CacheStoreError> {
        if signal.is_some_and(CancellationToken::is_cancelled) {
            return Err(CacheStoreError::Aborted);
        }
        self.entries.borrow_mut().insert(
            (cache_name.to_string(), url.to_string()),
            response.clone(),
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FetchWithCacheOptions {
    pub cache_name: String,
    pub bypass_cache: bool,
    pub signal: Option<CancellationToken>,
    pub method: HttpMethod,
}

impl FetchWithCacheOptions {
    pub fn new(cache_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            bypass_cache: false,
            signal: None,
            method: HttpMethod::Get,
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

    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWithCacheResult {
    pub response: FetchedResponse,
    pub from_cache: bool,
}

/// `cache` is `None` where the environment has no cache storage at all.
pub async fn fetch_with_cache(
    fetcher: &dyn HttpFetcher,
    cache: Option<&dyn CacheStorage>,
    url: &str,
    options: &FetchWithCacheOptions,
) -> Result<FetchWithCacheResult, FetchError> {
    let cache_name = options.cache_name.as_str();
    let cache = cache.filter(|_| options.method == HttpMethod::Get);

    if let Some(cache) = cache
        && !options.bypass_cache
    {
        match cache.lookup(cache_name, url).await {
            Ok(Some(response)) => {
                tracing::debug!(cache_name, url, "cache.hit");
                return Ok(FetchWithCacheResult {
                    response,
                    from_cache: true,
                });
            }
            Ok(None) => tracing::debug!(cache_name, url, "cache.miss"),
            Err(error) => tracing::debug!(cache_name, url, %error, "cache.unavailable"),
        }
    }

    let signal = options.signal.as_ref();
    if signal.is_some_and(CancellationToken::is_cancelled) {
        return Err(FetchError::Aborted);
    }

    let request = FetchRequest {
        url: url.to_string(),
        method: options.method,
    };
    let response = match signal {
        Some(signal) => {
            let fetch = fetcher.fetch(&request, Some(signal));
            let cancelled = pin!(signal.cancelled());
            match select(fetch, cancelled).await {
                Either::Left((result, _)) => result?,
                Either::Right(_) => return Err(FetchError::Aborted),
            }
        }
        None => fetcher.fetch(&request, None).await?,
    };

    let aborted = signal.is_some_and(CancellationToken::is_cancelled);
    if let Some(cache) = cache
        && response.is_cacheable()
        && !aborted
    {
        let store = cache.store(cache_name, url, &response, signal);
        let stored = match signal {
            Some(signal) => {
                let cancelled = pin!(signal.cancelled());
                match select(store, cancelled).await {
                    Either::Left((result, _)) => result,
                    Either::Right(_) => Err(CacheStoreError::Aborted),
                }
            }
            None => store.await,
        };
        match stored {
            Ok(()) => tracing::debug!(cache_name, url, status = response.status, "cache.put"),
            Err(CacheStoreError::Aborted) => tracing::debug!(cache_name, url, "cache.put_aborted"),
            Err(error) => tracing::debug!(cache_name, url, %error, "cache.put_failed"),
        }
    }

    Ok(FetchWithCacheResult {
        response,
        from_cache: false,
    })
}
