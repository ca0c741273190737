use super::*;

    /// `window.location` / `window.history` behind the core's address bar.
    pub(super) struct BrowserAddressBar {
        window: web_sys::Window,
    }

    impl BrowserAddressBar {
        pub(super) fn from_window() -> Result<Self, String> {
            let window = web_sys::window().ok_or_else(|| "window is unavailable".to_string())?;
            Ok(Self { window })
        }

        fn history(&self) -> Result<web_sys::History, NavigationError> {
            self.window.history().map_err(|_| NavigationError::Rejected {
                message: "history is unavailable".to_string(),
            })
        }
    }

    impl AddressBar for BrowserAddressBar {
        fn snapshot(&self) -> LocationSnapshot {
            let location = self.window.location();
            LocationSnapshot {
                href: location.href().unwrap_or_default(),
                hash: location.hash().unwrap_or_default(),
                search: location.search().unwrap_or_default(),
                pathname: location.pathname().unwrap_or_default(),
            }
        }

        fn origin(&self) -> String {
            self.window.location().origin().unwrap_or_default()
        }

        fn referrer(&self) -> String {
            self.window
                .document()
                .map(|document| document.referrer())
                .unwrap_or_default()
        }

        fn replace(&self, url: &str) -> Result<(), NavigationError> {
            self.history()?
                .replace_state_with_url(&JsValue::NULL, "", Some(url))
                .map_err(|error| NavigationError::Rejected {
                    message: js_error_message(&error),
                })
        }

        fn push(&self, url: &str) -> Result<(), NavigationError> {
            self.history()?
                .push_state_with_url(&JsValue::NULL, "", Some(url))
                .map_err(|error| NavigationError::Rejected {
                    message: js_error_message(&error),
                })
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) enum WebStorageKind {
        Session,
        Local,
    }

    /// `sessionStorage` or `localStorage`. Access can throw (privacy modes,
    /// sandboxed frames, quota), which surfaces as a [`StorageError`].
    pub(super) struct WebStorageBackend {
        kind: WebStorageKind,
    }

    impl WebStorageBackend {
        pub(super) fn new(kind: WebStorageKind) -> Self {
            Self { kind }
        }

        fn storage(&self) -> Result<web_sys::Storage, StorageError> {
            let unavailable = StorageError::Unavailable {
                backend: self.backend_name(),
            };
            let window = web_sys::window().ok_or(unavailable.clone())?;
            let storage = match self.kind {
                WebStorageKind::Session => window.session_storage(),
                WebStorageKind::Local => window.local_storage(),
            };
            storage.ok().flatten().ok_or(unavailable)
        }

        fn rejected(&self, operation: &'static str) -> StorageError {
            StorageError::Rejected {
                backend: self.backend_name(),
                operation,
            }
        }
    }

    impl KeyValueStore for WebStorageBackend {
        fn backend_name(&self) -> &'static str {
            match self.kind {
                WebStorageKind::Session => "sessionStorage",
                WebStorageKind::Local => "localStorage",
            }
        }

        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.storage()?
                .get_item(key)
                .map_err(|_| self.rejected("get"))
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.storage()?
                .set_item(key, value)
                .map_err(|_| self.rejected("set"))
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.storage()?
                .remove_item(key)
                .map_err(|_| self.rejected("remove"))
        }
    }

    /// Session storage first, local storage second, page memory last.
    pub(super) fn browser_storage_chain() -> StorageChain {
        StorageChain::new()
            .with_backend(WebStorageBackend::new(WebStorageKind::Session))
            .with_backend(WebStorageBackend::new(WebStorageKind::Local))
            .with_backend(MemoryStore::new())
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub(super) struct BrowserClock;

    impl Clock for BrowserClock {
        fn now_unix_ms(&self) -> u64 {
            epoch_millis_now()
        }
    }

    pub(super) fn js_error_message(error: &JsValue) -> String {
        error
            .dyn_ref::<js_sys::Error>()
            .map(|error| String::from(error.message()))
            .or_else(|| error.as_string())
            .unwrap_or_else(|| "unknown browser error".to_string())
    }
