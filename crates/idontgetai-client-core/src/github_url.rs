//! Short `ghs/` tokens for GitHub content links.
//!
//! The comment provider's login redirect only preserves a bounded query
//! string, so viewer links carry `ghs/{owner}/{repo}/{branch}/{path}` instead
//! of a full raw-content URL. The codec only knows GitHub shapes; anything
//! else passes through untouched.

use std::sync::OnceLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;

pub const COMPRESSED_PREFIX: &str = "ghs/";
pub const RAW_CONTENT_ORIGIN: &str = "https://raw.githubusercontent.com";

const GITHUB_CONTENT_PATTERN: &str = r"^(?:https?://)?(?:raw\.githubusercontent\.com|github\.com)/([^/]+)/([^/]+)/(?:blob/|raw/|refs/heads/)?([^/]+)/(.+)$";
const GITHUB_BLOB_PATTERN: &str =
    r"^(?:https?://)?github\.com/([^/]+)/([^/]+)/(?:blob|raw)/([^/]+)/(.+)$";

// Everything `encodeURI` leaves alone: unreserved, reserved, and `#`.
const URI_ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

static GITHUB_CONTENT_URL: OnceLock<Option<Regex>> = OnceLock::new();
static GITHUB_BLOB_URL: OnceLock<Option<Regex>> = OnceLock::new();

fn github_content_url() -> Option<&'static Regex> {
    GITHUB_CONTENT_URL
        .get_or_init(|| Regex::new(GITHUB_CONTENT_PATTERN).ok())
        .as_ref()
}

fn github_blob_url() -> Option<&'static Regex> {
    GITHUB_BLOB_URL
        .get_or_init(|| Regex::new(GITHUB_BLOB_PATTERN).ok())
        .as_ref()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GithubContentParts<'a> {
    owner: &'a str,
    repo: &'a str,
    branch: &'a str,
    path: &'a str,
}

fn capture_parts<'a>(pattern: &Regex, input: &'a str) -> Option<GithubContentParts<'a>> {
    let captures = pattern.captures(input)?;
    Some(GithubContentParts {
        owner: captures.get(1)?.as_str(),
        repo: captures.get(2)?.as_str(),
        branch: captures.get(3)?.as_str(),
        path: captures.get(4)?.as_str(),
    })
}

fn raw_content_url(parts: GithubContentParts<'_>) -> String {
    format!(
        "{RAW_CONTENT_ORIGIN}/{}/{}/{}/{}",
        parts.owner, parts.repo, parts.branch, parts.path
    )
}

/// Compress a GitHub blob/raw/raw.githubusercontent.com URL into a `ghs/`
/// token. Best effort: unsupported or undecodable input comes back as is.
#[must_use]
pub fn compress_github_url(url: &str) -> String {
    if url.is_empty() || url.starts_with(COMPRESSED_PREFIX) {
        return url.to_string();
    }

    let Some(decoded) = decode_uri_component(url) else {
        tracing::debug!(url, "github_url.compress.decode_failed");
        return url.to_string();
    };
    let Some(pattern) = github_content_url() else {
        return url.to_string();
    };
    match capture_parts(pattern, &decoded) {
        Some(parts) => format!(
            "{COMPRESSED_PREFIX}{}/{}/{}/{}",
            parts.owner, parts.repo, parts.branch, parts.path
        ),
        None => url.to_string(),
    }
}

/// Expand a `ghs/` token back into its raw.githubusercontent.com URL.
#[must_use]
pub fn expand_github_url(token: &str) -> String {
    if !token.starts_with(COMPRESSED_PREFIX) {
        return token.to_string();
    }
    let segments = token.split('/').collect::<Vec<_>>();
    match segments.as_slice() {
        [_, owner, repo, branch, path @ ..] if !path.is_empty() => format!(
            "{RAW_CONTENT_ORIGIN}/{owner}/{repo}/{branch}/{}",
            path.join("/")
        ),
        _ => token.to_string(),
    }
}

/// The canonical raw-content form of a supported GitHub URL.
#[must_use]
pub fn canonical_raw_url(url: &str) -> Option<String> {
    let decoded = decode_uri_component(url)?;
    capture_parts(github_content_url()?, &decoded).map(raw_content_url)
}

/// Turn a viewer `src` parameter (token, encoded URL, blob link, or plain
/// URL) into the URL the content loader should fetch.
#[must_use]
pub fn resolve_viewer_fetch_url(src: &str) -> String {
    if src.is_empty() {
        return String::new();
    }

    let mut expanded = expand_github_url(src);
    if !(expanded.starts_with("https://") || expanded.starts_with("http://")) {
        expanded = decode_fully(src);
    }

    let trimmed = expanded.trim();
    let raw = github_blob_url()
        .and_then(|pattern| capture_parts(pattern, trimmed))
        .map_or_else(|| trimmed.to_string(), raw_content_url);

    encode_uri(&raw)
}

/// `decodeURIComponent`: every `%` must start a valid escape and the result
/// must be UTF-8, otherwise the input is rejected.
#[must_use]
pub fn decode_uri_component(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut index = 0;
    while let Some(offset) = bytes.get(index..)?.iter().position(|byte| *byte == b'%') {
        let escape = index + offset;
        let valid = bytes
            .get(escape + 1..escape + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return None;
        }
        index = escape + 3;
    }
    percent_encoding::percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

fn decode_fully(input: &str) -> String {
    let mut current = input.to_string();
    while let Some(decoded) = decode_uri_component(&current) {
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

/// `encodeURI`: escapes everything outside the URI character set.
#[must_use]
pub fn encode_uri(input: &str) -> String {
    utf8_percent_encode(input, URI_ESCAPE_SET).to_string()
}
