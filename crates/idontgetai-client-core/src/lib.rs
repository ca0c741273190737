//! Client core for the idontgetai content site.
//!
//! Everything here is platform independent: the browser capabilities the site
//! relies on (session storage, the address bar, the Cache API, `fetch`,
//! timers and the wall clock) are trait seams, so the logic runs and is tested
//! on the host while the web shell supplies the `web-sys` implementations.

#![cfg_attr(test, allow(clippy::expect_used, clippy::panic))]

pub mod config;
pub mod error;
pub mod giscus;
pub mod github_url;
pub mod href;
pub mod http_cache;
pub mod location;
pub mod return_to;
pub mod route;
pub mod slug;
pub mod storage;
pub mod text_fetch;
pub mod viewer;

pub use config::{CacheNames, RetryPolicy, SiteConfig};
pub use error::{ConfigError, FetchError};
pub use giscus::{DiscussionTerm, GiscusEvent, classify_message, discussion_term};
pub use github_url::{
    COMPRESSED_PREFIX, compress_github_url, expand_github_url, resolve_viewer_fetch_url,
};
pub use http_cache::{
    CacheStorage, CacheStoreError, FetchRequest, FetchWithCacheOptions, FetchWithCacheResult,
    FetchedResponse, HttpFetcher, HttpMethod, MemoryCacheStorage, ResponseKind, fetch_with_cache,
};
pub use href::normalize_internal_href;
pub use location::{
    AddressBar, HashLocation, ListenerId, LocationEvents, LocationSnapshot, MemoryAddressBar,
    NavigationError, QueryParams, parse_hash_location, query_string_from_snapshot,
};
pub use return_to::{
    Clock, RecoveryInputs, ReturnToDecision, ReturnToRecord, ReturnToRecovery, SkipReason,
    evaluate_return_to,
};
pub use route::SiteRoute;
pub use slug::slugify;
pub use storage::{KeyValueStore, MemoryStore, StorageChain, StorageError};
pub use text_fetch::{CachedText, CachedTextLoader, Delay, LoadOptions, TextLoadState};
pub use viewer::{ViewerPageType, ViewerQuery, ViewerReference, comments_callback_target};
