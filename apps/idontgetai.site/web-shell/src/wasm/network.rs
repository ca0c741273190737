use super::*;

    /// `fetch` through gloo-net, aborted through an `AbortController` when
    /// the caller's signal fires.
    pub(super) struct GlooFetcher;

    #[async_trait(?Send)]
    impl HttpFetcher for GlooFetcher {
        async fn fetch(
            &self,
            request: &FetchRequest,
            signal: Option<&CancellationToken>,
        ) -> Result<FetchedResponse, FetchError> {
            let builder = RequestBuilder::new(&request.url).method(gloo_method(request.method));
            let response = match signal {
                Some(signal) => {
                    let controller = web_sys::AbortController::new()
                        .map_err(|error| FetchError::network(js_error_message(&error)))?;
                    let abort_signal = controller.signal();
                    let request = builder
                        .abort_signal(Some(&abort_signal))
                        .build()
                        .map_err(|error| FetchError::network(error.to_string()))?;
                    let send = request.send();
                    let cancelled = signal.cancelled();
                    pin_mut!(send, cancelled);
                    match select(send, cancelled).await {
                        Either::Left((result, _)) => {
                            result.map_err(|error| FetchError::network(error.to_string()))?
                        }
                        Either::Right(_) => {
                            controller.abort();
                            return Err(FetchError::Aborted);
                        }
                    }
                }
                None => builder
                    .send()
                    .await
                    .map_err(|error| FetchError::network(error.to_string()))?,
            };

            let status = response.status();
            let kind = response_kind(response.type_());
            let url = response.url();
            let body = response
                .binary()
                .await
                .map_err(|error| FetchError::network(error.to_string()))?;
            Ok(FetchedResponse {
                url,
                status,
                kind,
                body,
            })
        }
    }

    fn gloo_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    fn response_kind(kind: web_sys::ResponseType) -> ResponseKind {
        match kind {
            web_sys::ResponseType::Cors => ResponseKind::Cors,
            web_sys::ResponseType::Default => ResponseKind::Default,
            web_sys::ResponseType::Error => ResponseKind::Error,
            web_sys::ResponseType::Opaque => ResponseKind::Opaque,
            web_sys::ResponseType::Opaqueredirect => ResponseKind::OpaqueRedirect,
            _ => ResponseKind::Basic,
        }
    }

    /// The window's Cache API (`caches`), absent on insecure origins.
    pub(super) struct BrowserCacheStorage {
        caches: web_sys::CacheStorage,
    }

    impl BrowserCacheStorage {
        pub(super) fn detect() -> Option<Self> {
            let window = web_sys::window()?;
            let has_caches = js_sys::Reflect::has(&window, &JsValue::from_str("caches")).unwrap_or(false);
            if !has_caches {
                return None;
            }
            window.caches().ok().map(|caches| Self { caches })
        }

        async fn open(&self, cache_name: &str) -> Result<web_sys::Cache, CacheStoreError> {
            let opened = JsFuture::from(self.caches.open(cache_name))
                .await
                .map_err(|error| cache_error(cache_name, &error))?;
            opened
                .dyn_into::<web_sys::Cache>()
                .map_err(|error| cache_error(cache_name, &error))
        }
    }

    #[async_trait(?Send)]
    impl CacheStorage for BrowserCacheStorage {
        async fn lookup(
            &self,
            cache_name: &str,
            url: &str,
        ) -> Result<Option<FetchedResponse>, CacheStoreError> {
            let cache = self.open(cache_name).await?;
            let matched = JsFuture::from(cache.match_with_str(url))
                .await
                .map_err(|error| cache_error(cache_name, &error))?;
            if matched.is_undefined() || matched.is_null() {
                return Ok(None);
            }
            let response = matched
                .dyn_into::<web_sys::Response>()
                .map_err(|error| cache_error(cache_name, &error))?;
            let buffer = response
                .array_buffer()
                .map_err(|error| cache_error(cache_name, &error))?;
            let buffer = JsFuture::from(buffer)
                .await
                .map_err(|error| cache_error(cache_name, &error))?;
            Ok(Some(FetchedResponse {
                url: url.to_string(),
                status: response.status(),
                kind: response_kind(response.type_()),
                body: js_sys::Uint8Array::new(&buffer).to_vec(),
            }))
        }

        async fn store(
            &self,
            cache_name: &str,
            url: &str,
            response: &FetchedResponse,
            signal: Option<&CancellationToken>,
        ) -> Result<(), CacheStoreError> {
            let cache = self.open(cache_name).await?;
            if signal.is_some_and(CancellationToken::is_cancelled) {
                return Err(CacheStoreError::Aborted);
            }
            let init = web_sys::ResponseInit::new();
            init.set_status(response.status);
            let mut body = response.body.clone();
            let stored = web_sys::Response::new_with_opt_u8_array_and_init(Some(body.as_mut_slice()), &init)
                .map_err(|error| cache_error(cache_name, &error))?;
            JsFuture::from(cache.put_with_str(url, &stored))
                .await
                .map_err(|error| cache_error(cache_name, &error))?;
            Ok(())
        }
    }

    fn cache_error(cache_name: &str, error: &JsValue) -> CacheStoreError {
        CacheStoreError::Operation {
            cache_name: cache_name.to_string(),
            message: js_error_message(error),
        }
    }

    pub(super) struct GlooDelay;

    #[async_trait(?Send)]
    impl idontgetai_client_core::Delay for GlooDelay {
        async fn sleep(&self, duration: Duration) {
            gloo_timers::future::sleep(duration).await;
        }
    }

    pub(super) async fn load_text(
        site: &SiteContext,
        reference: &ViewerReference,
        bypass_cache: bool,
        signal: &CancellationToken,
    ) -> Option<ContentView> {
        let loader = CachedTextLoader::new(
            &site.fetcher,
            site.cache_storage(),
            &site.delay,
            site.config.retry,
        );
        let options = LoadOptions::new(site.config.cache_names.for_text_source(&reference.url))
            .bypass_cache(bypass_cache)
            .with_signal(signal.clone());
        let result = loader.load(&reference.url, &options).await;
        ContentView::from_text_state(TextLoadState::from_result(result))
    }

    /// PDFs go through the same cache and reach the renderer as an object URL.
    pub(super) async fn load_document(
        site: &SiteContext,
        reference: &ViewerReference,
        bypass_cache: bool,
        signal: &CancellationToken,
    ) -> Option<ContentView> {
        let options = FetchWithCacheOptions::new(site.config.cache_names.pdf.as_str())
            .bypass_cache(bypass_cache)
            .with_signal(signal.clone());
        let result = match fetch_with_cache(&site.fetcher, site.cache_storage(), &reference.url, &options).await {
            Ok(result) => result,
            Err(FetchError::Aborted) => return None,
            Err(error) => {
                return Some(ContentView::Failed {
                    message: error.to_string(),
                });
            }
        };
        if !result.response.ok() {
            return Some(ContentView::Failed {
                message: FetchError::Status {
                    status: result.response.status,
                }
                .to_string(),
            });
        }
        match object_url_for(&result.response.body, PDF_MIME_TYPE) {
            Ok(object_url) => Some(ContentView::Document {
                object_url,
                from_cache: result.from_cache,
            }),
            Err(message) => Some(ContentView::Failed { message }),
        }
    }

    fn object_url_for(bytes: &[u8], mime_type: &str) -> Result<String, String> {
        let parts = js_sys::Array::new();
        parts.push(&js_sys::Uint8Array::from(bytes));
        let options = web_sys::BlobPropertyBag::new();
        options.set_type(mime_type);
        let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(|error| js_error_message(&error))?;
        let object_url =
            web_sys::Url::create_object_url_with_blob(&blob).map_err(|error| js_error_message(&error))?;
        let previous = DOCUMENT_OBJECT_URL.with(|slot| slot.replace(Some(object_url.clone())));
        if let Some(previous) = previous {
            let _ = web_sys::Url::revoke_object_url(&previous);
        }
        Ok(object_url)
    }
