use serde::{Deserialize, Serialize};

use crate::github_url::resolve_viewer_fetch_url;
use crate::location::QueryParams;

pub const PDF_VIEWER_ROUTE: &str = "/pdf-viewer";
pub const NOTE_VIEWER_ROUTE: &str = "/note-viewer";
pub const COMMENTS_CALLBACK_ROUTE: &str = "/comments";
pub const SRC_PARAM: &str = "src";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerPageType {
    Pdf,
    Note,
}

impl ViewerPageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Note => "note",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pdf" => Some(Self::Pdf),
            "note" => Some(Self::Note),
            _ => None,
        }
    }

    #[must_use]
    pub fn route(self) -> &'static str {
        match self {
            Self::Pdf => PDF_VIEWER_ROUTE,
            Self::Note => NOTE_VIEWER_ROUTE,
        }
    }

    #[must_use]
    pub fn from_route(path: &str) -> Option<Self> {
        match path {
            PDF_VIEWER_ROUTE => Some(Self::Pdf),
            NOTE_VIEWER_ROUTE => Some(Self::Note),
            _ => None,
        }
    }

    fn default_title(self) -> &'static str {
        match self {
            Self::Pdf => "PDF 预览",
            Self::Note => "Untitled Note",
        }
    }

    fn default_back_label(self) -> &'static str {
        match self {
            Self::Pdf => "返回",
            Self::Note => "Back",
        }
    }
}

#[must_use]
pub fn is_viewer_route(path: &str) -> bool {
    ViewerPageType::from_route(path).is_some()
}

/// Which embedded viewer is shown and the remote resource it loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerReference {
    pub page_type: ViewerPageType,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerQuery {
    pub src: String,
    pub title: String,
    pub subtitle: String,
    pub back: String,
    pub back_label: String,
}

impl ViewerQuery {
    #[must_use]
    pub fn parse(query: &str, page_type: ViewerPageType) -> Self {
        let params = QueryParams::parse(query);
        let or_default = |key: &str, default: &str| {
            params
                .get_non_empty(key)
                .unwrap_or(default)
                .to_string()
        };
        Self {
            src: or_default(SRC_PARAM, ""),
            title: or_default("title", page_type.default_title()),
            subtitle: or_default("subtitle", ""),
            back: or_default("back", "/"),
            back_label: or_default("backLabel", page_type.default_back_label()),
        }
    }

    /// `None` while the viewer has nothing to load.
    #[must_use]
    pub fn reference(&self, page_type: ViewerPageType) -> Option<ViewerReference> {
        if self.src.is_empty() {
            return None;
        }
        Some(ViewerReference {
            page_type,
            url: resolve_viewer_fetch_url(&self.src),
        })
    }
}

/// Legacy `#/comments` landing: when the real search string still carries
/// `src`, rebuild the viewer address (search kept, hash replaced).
#[must_use]
pub fn comments_callback_target(pathname: &str, search: &str) -> Option<String> {
    let params = QueryParams::parse(search);
    let src = params.get_non_empty(SRC_PARAM)?;
    let page_type = if src.to_lowercase().ends_with(".pdf") {
        ViewerPageType::Pdf
    } else {
        ViewerPageType::Note
    };
    Some(format!("{pathname}{search}#{}", page_type.route()))
}
