use crate::github_url::decode_uri_component;
use crate::viewer::{COMMENTS_CALLBACK_ROUTE, ViewerPageType};

/// Hash-router routes of the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteRoute {
    Home,
    CommentsCallback,
    Ai,
    Math,
    Physics,
    Philosophy,
    Psychology,
    Economics,
    Literature,
    Cse,
    /// Retired section, redirected to [`SiteRoute::Cse`].
    Humanities,
    Tools,
    Viewer(ViewerPageType),
    Note { subject: String, topic: String },
    Log { subject: String, topic: String },
    NotFound { path: String },
}

impl SiteRoute {
    /// Resolve a route path (hash without `#` and query). Leading and
    /// trailing slashes are optional, so `#comments` resolves like
    /// `#/comments`.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let normalized = format!("/{}", path.trim_matches('/'));
        let path = normalized.as_str();
        if path == COMMENTS_CALLBACK_ROUTE {
            return Self::CommentsCallback;
        }
        if let Some(page_type) = ViewerPageType::from_route(path) {
            return Self::Viewer(page_type);
        }
        match path {
            "/" => return Self::Home,
            "/ai" => return Self::Ai,
            "/math" => return Self::Math,
            "/physics" => return Self::Physics,
            "/philosophy" => return Self::Philosophy,
            "/psychology" => return Self::Psychology,
            "/economics" => return Self::Economics,
            "/literature" => return Self::Literature,
            "/cse" => return Self::Cse,
            "/humanities" => return Self::Humanities,
            "/tools" => return Self::Tools,
            _ => {}
        }

        let segments = path.trim_start_matches('/').split('/').collect::<Vec<_>>();
        match segments.as_slice() {
            ["notes", subject, topic] if !subject.is_empty() && !topic.is_empty() => Self::Note {
                subject: decode_segment(subject),
                topic: decode_segment(topic),
            },
            ["logs", subject, topic] if !subject.is_empty() && !topic.is_empty() => Self::Log {
                subject: decode_segment(subject),
                topic: decode_segment(topic),
            },
            _ => Self::NotFound {
                path: path.to_string(),
            },
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::CommentsCallback => COMMENTS_CALLBACK_ROUTE.to_string(),
            Self::Ai => "/ai".to_string(),
            Self::Math => "/math".to_string(),
            Self::Physics => "/physics".to_string(),
            Self::Philosophy => "/philosophy".to_string(),
            Self::Psychology => "/psychology".to_string(),
            Self::Economics => "/economics".to_string(),
            Self::Literature => "/literature".to_string(),
            Self::Cse => "/cse".to_string(),
            Self::Humanities => "/humanities".to_string(),
            Self::Tools => "/tools".to_string(),
            Self::Viewer(page_type) => page_type.route().to_string(),
            Self::Note { subject, topic } => format!("/notes/{subject}/{topic}"),
            Self::Log { subject, topic } => format!("/logs/{subject}/{topic}"),
            Self::NotFound { path } => path.clone(),
        }
    }

    /// Where a retired route now lives.
    #[must_use]
    pub fn redirect(&self) -> Option<Self> {
        match self {
            Self::Humanities => Some(Self::Cse),
            _ => None,
        }
    }

    #[must_use]
    pub fn viewer_page_type(&self) -> Option<ViewerPageType> {
        match self {
            Self::Viewer(page_type) => Some(*page_type),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::CommentsCallback => "comments",
            Self::Ai => "ai",
            Self::Math => "math",
            Self::Physics => "physics",
            Self::Philosophy => "philosophy",
            Self::Psychology => "psychology",
            Self::Economics => "economics",
            Self::Literature => "literature",
            Self::Cse => "cse",
            Self::Humanities => "humanities",
            Self::Tools => "tools",
            Self::Viewer(ViewerPageType::Pdf) => "pdf-viewer",
            Self::Viewer(ViewerPageType::Note) => "note-viewer",
            Self::Note { .. } => "note",
            Self::Log { .. } => "log",
            Self::NotFound { .. } => "not-found",
        }
    }
}

fn decode_segment(segment: &str) -> String {
    decode_uri_component(segment).unwrap_or_else(|| segment.to_string())
}
