use super::*;

    /// Page-provided overrides in `window.__IDONTGETAI_CONFIG__`; anything
    /// missing or malformed falls back to the defaults.
    pub(super) fn load_site_config() -> SiteConfig {
        let Some(window) = web_sys::window() else {
            return SiteConfig::default();
        };
        let Ok(value) = js_sys::Reflect::get(&window, &JsValue::from_str(SITE_CONFIG_GLOBAL)) else {
            return SiteConfig::default();
        };
        if value.is_undefined() || value.is_null() {
            return SiteConfig::default();
        }
        let Some(raw) = js_sys::JSON::stringify(&value)
            .ok()
            .and_then(|raw| raw.as_string())
        else {
            tracing::warn!("config.unserializable");
            return SiteConfig::default();
        };
        match SiteConfig::from_json(&raw) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(%error, "config.invalid");
                SiteConfig::default()
            }
        }
    }

    pub(super) fn epoch_millis_now() -> u64 {
        let now = js_sys::Date::now();
        if !now.is_finite() || now.is_sign_negative() {
            return 0;
        }
        now.floor().min(u64::MAX as f64) as u64
    }

    pub(super) fn publish_view(view: ShellView) {
        let route = match &view {
            ShellView::Section { name, .. } | ShellView::Placeholder { name, .. } => name.clone(),
            ShellView::Viewer { viewer, .. } => viewer.page_type.as_str().to_string(),
            ShellView::NotFound { .. } => "not-found".to_string(),
        };
        let detail = serde_json::to_string(&view).unwrap_or_else(|_| "null".to_string());
        CURRENT_VIEW.with(|slot| *slot.borrow_mut() = Some(view));

        if let Some(root) = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.document_element())
        {
            let _ = root.set_attribute(ROUTE_DATA_ATTRIBUTE, &route);
        }
        dispatch_custom_event(VIEW_EVENT, &detail);
    }

    /// Swap the content of the mounted viewer, ignoring results for a viewer
    /// that has since been replaced.
    pub(super) fn publish_content(viewer: &ViewerView, content: ContentView) {
        let still_mounted = MOUNTED_VIEWER.with(|slot| slot.borrow().as_ref() == Some(viewer));
        if !still_mounted {
            return;
        }
        publish_view(ShellView::Viewer {
            viewer: viewer.clone(),
            content,
        });
    }

    pub(super) fn publish_comments(view: CommentsView) {
        let detail = serde_json::to_string(&view).unwrap_or_else(|_| "null".to_string());
        dispatch_custom_event(COMMENTS_EVENT, &detail);
    }

    fn dispatch_custom_event(name: &str, detail_json: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let detail = js_sys::JSON::parse(detail_json).unwrap_or(JsValue::NULL);
        let init = web_sys::CustomEventInit::new();
        init.set_detail(&detail);
        match web_sys::CustomEvent::new_with_event_init_dict(name, &init) {
            Ok(event) => {
                let _ = window.dispatch_event(&event);
            }
            Err(error) => {
                tracing::warn!(event = name, error = %js_error_message(&error), "shell.event_failed");
            }
        }
    }
