#![allow(clippy::needless_pass_by_value)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::panic))]

#[cfg(any(target_arch = "wasm32", test))]
mod console_log;
#[cfg(any(target_arch = "wasm32", test))]
mod view;
#[cfg(target_arch = "wasm32")]
mod wasm_constants;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::cell::RefCell;
    use std::rc::Rc;

    use async_trait::async_trait;
    use futures_util::future::{Either, select};
    use futures_util::pin_mut;
    use gloo_net::http::{Method, RequestBuilder};
    use idontgetai_client_core::{
        AddressBar, CacheStorage, CacheStoreError, CachedTextLoader, Clock, FetchError,
        FetchRequest, FetchWithCacheOptions, FetchedResponse, HttpFetcher, HttpMethod,
        KeyValueStore, LoadOptions, LocationEvents, LocationSnapshot, MemoryStore,
        NavigationError, ResponseKind, ReturnToRecovery, SiteConfig, SiteRoute, StorageChain,
        StorageError, TextLoadState, ViewerPageType, ViewerReference, classify_message,
        comments_callback_target, fetch_with_cache, normalize_internal_href,
    };
    use idontgetai_client_core::location::current_route_path;
    use tokio_util::sync::CancellationToken;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::{JsFuture, spawn_local};
    use web_time::Duration;

    use crate::console_log;
    use crate::view::{CommentsView, ContentView, ShellView, ViewerView, shell_view};
    use crate::wasm_constants::*;

    mod browser;
    mod lifecycle;
    mod network;
    mod routing;

    use browser::*;
    use lifecycle::*;
    use network::*;
    use routing::*;

    thread_local! {
        static SITE: RefCell<Option<Rc<SiteContext>>> = const { RefCell::new(None) };
        static CURRENT_VIEW: RefCell<Option<ShellView>> = const { RefCell::new(None) };
        static MOUNTED_VIEWER: RefCell<Option<ViewerView>> = const { RefCell::new(None) };
        static ACTIVE_LOAD: RefCell<Option<CancellationToken>> = const { RefCell::new(None) };
        static DOCUMENT_OBJECT_URL: RefCell<Option<String>> = const { RefCell::new(None) };
        static POPSTATE_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
        static HASHCHANGE_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
        static MESSAGE_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
    }

    /// Browser capabilities the client core runs against.
    struct SiteContext {
        config: SiteConfig,
        storage: StorageChain,
        location: LocationEvents<BrowserAddressBar>,
        cache: Option<BrowserCacheStorage>,
        fetcher: GlooFetcher,
        delay: GlooDelay,
        clock: BrowserClock,
    }

    impl SiteContext {
        fn recovery(&self) -> ReturnToRecovery<'_, LocationEvents<BrowserAddressBar>> {
            ReturnToRecovery::new(&self.config, &self.storage, &self.location, &self.clock)
        }

        fn cache_storage(&self) -> Option<&dyn CacheStorage> {
            self.cache.as_ref().map(|cache| cache as &dyn CacheStorage)
        }
    }

    fn site() -> Option<Rc<SiteContext>> {
        SITE.with(|slot| slot.borrow().clone())
    }

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        console_log::install(console_log::default_level());
        if let Err(error) = boot() {
            tracing::error!(%error, "shell.boot_failed");
        }
    }

    /// Navigate to an in-site href (`/math`, `note-viewer?src=...`,
    /// legacy `?query#/path`).
    #[wasm_bindgen]
    pub fn navigate(href: String) {
        let Some(site) = site() else {
            return;
        };
        let target = format!("#{}", normalize_internal_href(&href));
        if let Err(error) = site.location.push(&target) {
            tracing::warn!(%error, href = %target, "shell.navigate_failed");
        }
    }

    /// Reload the mounted viewer's content, skipping the cache lookup.
    #[wasm_bindgen]
    pub fn retry_content() {
        let Some(site) = site() else {
            return;
        };
        let Some(viewer) = MOUNTED_VIEWER.with(|slot| slot.borrow().clone()) else {
            return;
        };
        start_content_load(&site, viewer, true);
    }

    #[wasm_bindgen]
    pub fn shell_view_json() -> String {
        CURRENT_VIEW.with(|view| {
            serde_json::to_string(&*view.borrow()).unwrap_or_else(|_| "null".to_string())
        })
    }

    fn boot() -> Result<(), String> {
        let config = load_site_config();
        let address = BrowserAddressBar::from_window()?;
        let site = Rc::new(SiteContext {
            storage: browser_storage_chain(),
            location: LocationEvents::new(address),
            cache: BrowserCacheStorage::detect(),
            fetcher: GlooFetcher,
            delay: GlooDelay,
            clock: BrowserClock,
            config,
        });

        // Runs before the hub dispatches anything, so the first route the
        // shell resolves is already the recovered one.
        let recovery = site.recovery();
        let restored = recovery.restore_return_to_if_needed();
        recovery.normalize_viewer_src_param_in_place();
        tracing::info!(
            restored,
            cache = site.cache.is_some(),
            storage = ?site.storage.backend_names(),
            "shell.boot"
        );

        SITE.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&site)));
        install_location_hub(&site);
        install_comments_message_handler();
        handle_location_change(&site.location.snapshot());
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm::shell_view_json;

#[cfg(not(target_arch = "wasm32"))]
pub fn shell_view_json() -> String {
    "null".to_string()
}
