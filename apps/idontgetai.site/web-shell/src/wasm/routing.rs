use super::*;

    pub(super) fn install_location_hub(context: &Rc<SiteContext>) {
        if !context.location.ensure_installed() {
            return;
        }
        context.location.subscribe(handle_location_change);

        let Some(window) = web_sys::window() else {
            return;
        };
        for (event_name, slot) in [("popstate", &POPSTATE_HANDLER), ("hashchange", &HASHCHANGE_HANDLER)] {
            slot.with(|slot| {
                if slot.borrow().is_some() {
                    return;
                }
                let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_event| {
                    if let Some(site) = site() {
                        site.location.notify_external();
                    }
                }));
                if let Err(error) =
                    window.add_event_listener_with_callback(event_name, callback.as_ref().unchecked_ref())
                {
                    tracing::warn!(event = event_name, error = %js_error_message(&error), "shell.listener_failed");
                }
                *slot.borrow_mut() = Some(callback);
            });
        }
    }

    /// Resolve the hash route and publish what the page should show.
    /// Navigations issued from here re-enter through the hub, so every
    /// rewrite returns immediately.
    pub(super) fn handle_location_change(snapshot: &LocationSnapshot) {
        let Some(site) = site() else {
            return;
        };
        let route = SiteRoute::from_path(&current_route_path(&snapshot.hash));

        if let Some(target) = route.redirect() {
            tracing::debug!(from = %route.path(), to = %target.path(), "route.redirect");
            replace_route(&site, &format!("#{}", target.path()));
            return;
        }

        match route {
            SiteRoute::CommentsCallback => {
                unmount_viewer(&site);
                let target = comments_callback_target(&snapshot.pathname, &snapshot.search)
                    .unwrap_or_else(|| "#/".to_string());
                replace_route(&site, &target);
            }
            SiteRoute::Viewer(page_type) => mount_viewer(&site, page_type, snapshot),
            _ => {
                unmount_viewer(&site);
                publish_view(shell_view(&route, snapshot));
            }
        }
    }

    fn replace_route(site: &SiteContext, target: &str) {
        if let Err(error) = site.location.replace(target) {
            tracing::warn!(%error, href = target, "route.replace_failed");
        }
    }

    fn mount_viewer(site: &Rc<SiteContext>, page_type: ViewerPageType, snapshot: &LocationSnapshot) {
        let recovery = site.recovery();
        if recovery.normalize_viewer_src_param_in_place() {
            return;
        }

        let viewer = ViewerView::from_snapshot(page_type, snapshot);
        let already_mounted = MOUNTED_VIEWER.with(|slot| slot.borrow().as_ref() == Some(&viewer));
        if already_mounted {
            return;
        }

        if viewer.source_url.is_empty() {
            recovery.clear_viewer_active();
        } else {
            recovery.mark_viewer_active(page_type);
        }
        tracing::info!(page = page_type.as_str(), source = %viewer.source_url, "viewer.mount");
        release_document();

        MOUNTED_VIEWER.with(|slot| *slot.borrow_mut() = Some(viewer.clone()));
        publish_view(shell_view(&SiteRoute::Viewer(page_type), snapshot));
        start_content_load(site, viewer, false);
    }

    fn unmount_viewer(site: &SiteContext) {
        let Some(viewer) = MOUNTED_VIEWER.with(|slot| slot.borrow_mut().take()) else {
            return;
        };
        if let Some(load) = ACTIVE_LOAD.with(|slot| slot.borrow_mut().take()) {
            load.cancel();
        }
        release_document();
        site.recovery().clear_viewer_active();
        tracing::debug!(page = viewer.page_type.as_str(), "viewer.unmount");
    }

    /// Revoke the blob URL of the document the outgoing viewer rendered.
    fn release_document() {
        if let Some(object_url) = DOCUMENT_OBJECT_URL.with(|slot| slot.borrow_mut().take())
            && let Err(error) = web_sys::Url::revoke_object_url(&object_url)
        {
            tracing::debug!(error = %js_error_message(&error), "viewer.revoke_failed");
        }
    }

    /// Load the viewer's source, cancelling whatever load was in flight.
    pub(super) fn start_content_load(site: &Rc<SiteContext>, viewer: ViewerView, bypass_cache: bool) {
        let signal = CancellationToken::new();
        if let Some(previous) = ACTIVE_LOAD.with(|slot| slot.borrow_mut().replace(signal.clone())) {
            previous.cancel();
        }

        let Some(reference) = viewer.reference() else {
            publish_content(&viewer, ContentView::MissingSource);
            return;
        };
        if bypass_cache {
            publish_content(&viewer, ContentView::Loading);
        }

        let site = Rc::clone(site);
        spawn_local(async move {
            let content = match reference.page_type {
                ViewerPageType::Note => load_text(&site, &reference, bypass_cache, &signal).await,
                ViewerPageType::Pdf => load_document(&site, &reference, bypass_cache, &signal).await,
            };
            if signal.is_cancelled() {
                return;
            }
            if let Some(content) = content {
                publish_content(&viewer, content);
            }
        });
    }

    /// Relay Giscus iframe messages to the page as comment status events.
    pub(super) fn install_comments_message_handler() {
        let Some(window) = web_sys::window() else {
            return;
        };
        MESSAGE_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return;
            }
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |event| {
                let Some(message) = event.dyn_ref::<web_sys::MessageEvent>() else {
                    return;
                };
                let Some(raw) = js_sys::JSON::stringify(&message.data())
                    .ok()
                    .and_then(|raw| raw.as_string())
                else {
                    return;
                };
                let Ok(data) = serde_json::from_str::<serde_json::Value>(&raw) else {
                    return;
                };
                if let Some(event) = classify_message(&message.origin(), &data) {
                    tracing::debug!(?event, "comments.message");
                    publish_comments(CommentsView::from(event));
                }
            }));
            if let Err(error) = window.add_event_listener_with_callback("message", callback.as_ref().unchecked_ref()) {
                tracing::warn!(event = "message", error = %js_error_message(&error), "shell.listener_failed");
            }
            *slot.borrow_mut() = Some(callback);
        });
    }
