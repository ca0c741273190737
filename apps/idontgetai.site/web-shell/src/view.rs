use idontgetai_client_core::{
    GiscusEvent, LocationSnapshot, SiteRoute, TextLoadState, ViewerPageType, ViewerQuery,
    ViewerReference, discussion_term,
};
use serde::Serialize;

/// What the page renderer is told to show, published as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ShellView {
    Section {
        name: String,
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    Viewer {
        viewer: ViewerView,
        content: ContentView,
    },
    Placeholder {
        name: String,
        subject: String,
        topic: String,
    },
    NotFound {
        path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerView {
    pub page_type: ViewerPageType,
    pub title: String,
    pub subtitle: String,
    pub back: String,
    pub back_label: String,
    pub source_url: String,
    pub discussion_term: String,
    pub discussion_labels: String,
}

impl ViewerView {
    pub fn from_snapshot(page_type: ViewerPageType, snapshot: &LocationSnapshot) -> Self {
        let query = ViewerQuery::parse(snapshot.query_string(), page_type);
        let source_url = query
            .reference(page_type)
            .map(|reference| reference.url)
            .unwrap_or_default();
        // PDF threads key on the raw `src` parameter, notes on the resolved URL.
        let term_source = match page_type {
            ViewerPageType::Pdf => query.src.as_str(),
            ViewerPageType::Note => source_url.as_str(),
        };
        let term = discussion_term(page_type, Some(query.title.as_str()), Some(term_source));
        Self {
            page_type,
            title: query.title,
            subtitle: query.subtitle,
            back: query.back,
            back_label: query.back_label,
            source_url,
            discussion_term: term.term,
            discussion_labels: term.labels,
        }
    }

    pub fn reference(&self) -> Option<ViewerReference> {
        if self.source_url.is_empty() {
            return None;
        }
        Some(ViewerReference {
            page_type: self.page_type,
            url: self.source_url.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ContentView {
    /// The viewer has no source to load.
    MissingSource,
    Loading,
    #[serde(rename_all = "camelCase")]
    Text { text: String, from_cache: bool },
    #[serde(rename_all = "camelCase")]
    Document { object_url: String, from_cache: bool },
    Failed { message: String },
}

impl ContentView {
    /// `None` for a cancelled load, which must not be rendered.
    pub fn from_text_state(state: TextLoadState) -> Option<Self> {
        match state {
            TextLoadState::Loading => Some(Self::Loading),
            TextLoadState::Ready(text) => Some(Self::Text {
                text: text.text,
                from_cache: text.from_cache,
            }),
            TextLoadState::Failed { message } => Some(Self::Failed { message }),
            TextLoadState::Cancelled => None,
        }
    }
}

pub fn shell_view(route: &SiteRoute, snapshot: &LocationSnapshot) -> ShellView {
    match route {
        SiteRoute::Viewer(page_type) => {
            let viewer = ViewerView::from_snapshot(*page_type, snapshot);
            let content = if viewer.source_url.is_empty() {
                ContentView::MissingSource
            } else {
                ContentView::Loading
            };
            ShellView::Viewer { viewer, content }
        }
        SiteRoute::Note { subject, topic } | SiteRoute::Log { subject, topic } => {
            ShellView::Placeholder {
                name: route.name().to_string(),
                subject: subject.clone(),
                topic: topic.clone(),
            }
        }
        SiteRoute::NotFound { path } => ShellView::NotFound { path: path.clone() },
        _ => ShellView::Section {
            name: route.name().to_string(),
            path: route.path(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CommentsView {
    Loaded,
    DiscussionMissing,
    Failed { message: String },
}

impl From<GiscusEvent> for CommentsView {
    fn from(event: GiscusEvent) -> Self {
        match event {
            GiscusEvent::Loaded => Self::Loaded,
            GiscusEvent::DiscussionMissing => Self::DiscussionMissing,
            GiscusEvent::Failed { message } if message.is_empty() => Self::Failed {
                message: "Unknown error from Giscus".to_string(),
            },
            GiscusEvent::Failed { message } => Self::Failed { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use idontgetai_client_core::CachedText;
    use serde_json::json;

    use super::*;

    fn snapshot(href: &str) -> LocationSnapshot {
        LocationSnapshot::parse(href).expect("valid href")
    }

    #[test]
    fn viewer_view_reads_hash_query_and_resolves_source() {
        let view = ViewerView::from_snapshot(
            ViewerPageType::Note,
            &snapshot("http://localhost:3000/#/note-viewer?src=ghs%2Fo%2Fr%2Fmain%2Fintro.md&back=%2Fai"),
        );
        assert_eq!(
            view.source_url,
            "https://raw.githubusercontent.com/o/r/main/intro.md"
        );
        assert_eq!(view.title, "Untitled Note");
        assert_eq!(view.back, "/ai");
        assert!(view.discussion_term.starts_with("note-viewer | Untitled Note #"));
        assert_eq!(
            view.reference().map(|reference| reference.url),
            Some(view.source_url.clone())
        );
    }

    #[test]
    fn pdf_discussion_term_hashes_the_raw_src_parameter() {
        let view = ViewerView::from_snapshot(
            ViewerPageType::Pdf,
            &snapshot("http://localhost:3000/#/pdf-viewer?src=ghs%2Fo%2Fr%2Fmain%2Fdocs%2Fa.pdf&title=hi"),
        );
        assert_eq!(
            view.source_url,
            "https://raw.githubusercontent.com/o/r/main/docs/a.pdf"
        );
        assert_eq!(view.discussion_term, "pdf-viewer | hi #150e6fh");
        assert_eq!(view.discussion_labels, "pdf-viewer,hi");
    }

    #[test]
    fn viewer_without_source_reports_missing_source() {
        let route = SiteRoute::Viewer(ViewerPageType::Pdf);
        let view = shell_view(&route, &snapshot("http://localhost:3000/#/pdf-viewer"));
        let ShellView::Viewer { viewer, content } = view else {
            panic!("expected viewer view");
        };
        assert_eq!(content, ContentView::MissingSource);
        assert_eq!(viewer.title, "PDF 预览");
        assert_eq!(viewer.reference(), None);
    }

    #[test]
    fn sections_and_placeholders_serialize_with_kind_tags() {
        let home = shell_view(&SiteRoute::Home, &snapshot("http://localhost:3000/#/"));
        assert_eq!(
            serde_json::to_value(&home).expect("json"),
            json!({ "kind": "section", "name": "home", "path": "/" })
        );

        let note = SiteRoute::from_path("/notes/math/limits");
        let placeholder = shell_view(&note, &snapshot("http://localhost:3000/#/notes/math/limits"));
        assert_eq!(
            serde_json::to_value(&placeholder).expect("json"),
            json!({ "kind": "placeholder", "name": "note", "subject": "math", "topic": "limits" })
        );
    }

    #[test]
    fn content_view_drops_cancelled_loads() {
        assert_eq!(ContentView::from_text_state(TextLoadState::Cancelled), None);
        assert_eq!(
            serde_json::to_value(ContentView::from_text_state(TextLoadState::Ready(CachedText {
                text: "# Hi".to_string(),
                from_cache: true,
            })))
            .expect("json"),
            json!({ "status": "text", "text": "# Hi", "fromCache": true })
        );
    }

    #[test]
    fn comments_view_fills_in_empty_failure_message() {
        assert_eq!(
            CommentsView::from(GiscusEvent::Failed {
                message: String::new()
            }),
            CommentsView::Failed {
                message: "Unknown error from Giscus".to_string()
            }
        );
        assert_eq!(
            CommentsView::from(GiscusEvent::DiscussionMissing),
            CommentsView::DiscussionMissing
        );
    }
}
