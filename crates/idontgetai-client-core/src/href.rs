use crate::github_url::compress_github_url;
use crate::location::QueryParams;
use crate::viewer::{SRC_PARAM, is_viewer_route};

/// Normalize an in-site link to the hash router's `/path?query` form.
///
/// Legacy `?query#/path` links become `/path?query`; `path#hash` keeps only
/// the hash route. Viewer links get their `src` compressed.
#[must_use]
pub fn normalize_internal_href(href: &str) -> String {
    let trimmed = href.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let normalized = if let Some(rest) = trimmed.strip_prefix('?') {
        let mut parts = rest.split('#');
        let query = parts.next().unwrap_or_default();
        let hash = parts.next().unwrap_or_default();
        if hash.is_empty() {
            format!("/{trimmed}")
        } else if query.is_empty() {
            with_leading_slash(hash)
        } else {
            format!("{}?{query}", with_leading_slash(hash))
        }
    } else {
        let mut parts = trimmed.split('#');
        let path = parts.next().unwrap_or_default();
        let hash = parts.next().unwrap_or_default();
        if hash.is_empty() {
            with_leading_slash(path)
        } else {
            with_leading_slash(hash)
        }
    };

    compress_viewer_src(normalized)
}

fn with_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn compress_viewer_src(href: String) -> String {
    let Some((path, query)) = href.split_once('?') else {
        return href;
    };
    if !is_viewer_route(path) {
        return href;
    }
    let mut params = QueryParams::parse(query);
    let Some(src) = params.get_non_empty(SRC_PARAM) else {
        return href;
    };
    let compressed = compress_github_url(src);
    if compressed.len() >= src.len() {
        return href;
    }
    params.set(SRC_PARAM, &compressed);
    format!("{path}?{}", params.to_query_string())
}
