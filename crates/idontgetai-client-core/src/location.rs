//! Address snapshots, hash-route parsing, and location change notification.
//!
//! The site uses hash routing, but links produced by older routing behaviour
//! put the viewer query in the real search string instead of after the `?`
//! inside the hash. Everything that reads query parameters goes through
//! [`query_string_from_snapshot`] so both shapes resolve the same way.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use url::{Url, form_urlencoded};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationSnapshot {
    pub href: String,
    pub hash: String,
    pub search: String,
    pub pathname: String,
}

impl LocationSnapshot {
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let hash = url
            .fragment()
            .filter(|fragment| !fragment.is_empty())
            .map(|fragment| format!("#{fragment}"))
            .unwrap_or_default();
        let search = url
            .query()
            .filter(|query| !query.is_empty())
            .map(|query| format!("?{query}"))
            .unwrap_or_default();
        Self {
            href: url.as_str().to_string(),
            hash,
            search,
            pathname: url.path().to_string(),
        }
    }

    #[must_use]
    pub fn parse(href: &str) -> Option<Self> {
        Url::parse(href).ok().map(|url| Self::from_url(&url))
    }

    #[must_use]
    pub fn query_string(&self) -> &str {
        query_string_from_snapshot(&self.hash, &self.search)
    }

    #[must_use]
    pub fn search_query(&self) -> &str {
        strip_question_mark(&self.search)
    }
}

/// Query parameters for the current view: the part after `?` inside the hash
/// wins; otherwise the real search string without its leading `?`.
#[must_use]
pub fn query_string_from_snapshot<'a>(hash: &'a str, search: &'a str) -> &'a str {
    if let Some((_, query)) = hash.split_once('?') {
        return query;
    }
    strip_question_mark(search)
}

fn strip_question_mark(search: &str) -> &str {
    search.strip_prefix('?').unwrap_or(search)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashLocation {
    pub path: String,
    pub query: String,
}

#[must_use]
pub fn parse_hash_location(hash: &str) -> HashLocation {
    let raw = hash.strip_prefix('#').unwrap_or(hash);
    let (path, query) = raw.split_once('?').unwrap_or((raw, ""));
    let path = if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    HashLocation {
        path,
        query: query.to_string(),
    }
}

#[must_use]
pub fn is_hash_router_fragment(hash: &str) -> bool {
    hash.starts_with("#/")
}

/// Route path the hash router resolves: hash without `#` and query.
#[must_use]
pub fn current_route_path(hash: &str) -> String {
    let raw = hash.strip_prefix('#').unwrap_or(hash);
    let path = raw.split('?').next().unwrap_or_default();
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Ordered `application/x-www-form-urlencoded` pairs, with the get/set
/// semantics of a browser `URLSearchParams`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let query = strip_question_mark(query);
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`Self::get`], but an empty value counts as missing.
    #[must_use]
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    /// Replace the first `key` pair in place and drop any later duplicates;
    /// append when absent.
    pub fn set(&mut self, key: &str, value: &str) {
        let mut replaced = false;
        self.pairs.retain_mut(|(name, existing)| {
            if name != key {
                return true;
            }
            if replaced {
                return false;
            }
            *existing = value.to_string();
            replaced = true;
            true
        });
        if !replaced {
            self.pairs.push((key.to_string(), value.to_string()));
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[must_use]
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("address `{url}` cannot be resolved against the current location")]
    InvalidUrl { url: String },
    #[error("history update was rejected: {message}")]
    Rejected { message: String },
}

/// The browser address bar as the client core needs it. `replace` and `push`
/// take anything `history.replaceState` accepts: absolute URLs, paths, or
/// bare `#fragment`s resolved against the current address.
pub trait AddressBar {
    fn snapshot(&self) -> LocationSnapshot;
    fn origin(&self) -> String;
    fn referrer(&self) -> String;
    fn replace(&self, url: &str) -> Result<(), NavigationError>;
    fn push(&self, url: &str) -> Result<(), NavigationError>;
}

impl<T: AddressBar + ?Sized> AddressBar for Rc<T> {
    fn snapshot(&self) -> LocationSnapshot {
        (**self).snapshot()
    }

    fn origin(&self) -> String {
        (**self).origin()
    }

    fn referrer(&self) -> String {
        (**self).referrer()
    }

    fn replace(&self, url: &str) -> Result<(), NavigationError> {
        (**self).replace(url)
    }

    fn push(&self, url: &str) -> Result<(), NavigationError> {
        (**self).push(url)
    }
}

/// In-memory address bar for hosts without a browser, and for tests.
#[derive(Debug)]
pub struct MemoryAddressBar {
    current: RefCell<Url>,
    referrer: RefCell<String>,
    entries: RefCell<Vec<String>>,
}

impl MemoryAddressBar {
    pub fn new(href: &str) -> Result<Self, NavigationError> {
        let url = Url::parse(href).map_err(|_| NavigationError::InvalidUrl {
            url: href.to_string(),
        })?;
        Ok(Self {
            entries: RefCell::new(vec![url.as_str().to_string()]),
            current: RefCell::new(url),
            referrer: RefCell::new(String::new()),
        })
    }

    #[must_use]
    pub fn with_referrer(self, referrer: &str) -> Self {
        *self.referrer.borrow_mut() = referrer.to_string();
        self
    }

    #[must_use]
    pub fn href(&self) -> String {
        self.current.borrow().as_str().to_string()
    }

    /// History stack, oldest first; replaces overwrite the last entry.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    fn resolve(&self, url: &str) -> Result<Url, NavigationError> {
        self.current
            .borrow()
            .join(url)
            .map_err(|_| NavigationError::InvalidUrl {
                url: url.to_string(),
            })
    }
}

impl AddressBar for MemoryAddressBar {
    fn snapshot(&self) -> LocationSnapshot {
        LocationSnapshot::from_url(&self.current.borrow())
    }

    fn origin(&self) -> String {
        self.current.borrow().origin().ascii_serialization()
    }

    fn referrer(&self) -> String {
        self.referrer.borrow().clone()
    }

    fn replace(&self, url: &str) -> Result<(), NavigationError> {
        let next = self.resolve(url)?;
        if let Some(last) = self.entries.borrow_mut().last_mut() {
            *last = next.as_str().to_string();
        }
        *self.current.borrow_mut() = next;
        Ok(())
    }

    fn push(&self, url: &str) -> Result<(), NavigationError> {
        let next = self.resolve(url)?;
        self.entries.borrow_mut().push(next.as_str().to_string());
        *self.current.borrow_mut() = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type LocationListener = Rc<dyn Fn(&LocationSnapshot)>;

/// Location change hub.
///
/// Script-driven history updates do not fire `popstate` or `hashchange`, so
/// every programmatic navigation goes through this wrapper; once installed it
/// notifies subscribers after each `push`/`replace`, and the host forwards its
/// own navigation events through [`LocationEvents::notify_external`].
pub struct LocationEvents<A> {
    inner: A,
    installed: Cell<bool>,
    next_listener_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, LocationListener)>>,
}

impl<A: AddressBar> LocationEvents<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            installed: Cell::new(false),
            next_listener_id: Cell::new(1),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Start dispatching. Returns `false` when already installed.
    pub fn ensure_installed(&self) -> bool {
        if self.installed.get() {
            return false;
        }
        self.installed.set(true);
        true
    }

    pub fn subscribe(&self, listener: impl Fn(&LocationSnapshot) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id.get());
        self.next_listener_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Forward a host navigation event (`popstate`, `hashchange`).
    pub fn notify_external(&self) {
        self.dispatch();
    }

    fn dispatch(&self) {
        if !self.installed.get() {
            return;
        }
        let snapshot = self.inner.snapshot();
        let listeners = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect::<Vec<_>>();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

impl<A: AddressBar> AddressBar for LocationEvents<A> {
    fn snapshot(&self) -> LocationSnapshot {
        self.inner.snapshot()
    }

    fn origin(&self) -> String {
        self.inner.origin()
    }

    fn referrer(&self) -> String {
        self.inner.referrer()
    }

    fn replace(&self, url: &str) -> Result<(), NavigationError> {
        self.inner.replace(url)?;
        self.dispatch();
        Ok(())
    }

    fn push(&self, url: &str) -> Result<(), NavigationError> {
        self.inner.push(url)?;
        self.dispatch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_prefers_hash() {
        assert_eq!(
            query_string_from_snapshot("#/note-viewer?src=abc&title=hi", "?src=should_not_use"),
            "src=abc&title=hi"
        );
    }

    #[test]
    fn query_falls_back_to_search() {
        assert_eq!(
            query_string_from_snapshot("#/note-viewer", "?src=abc&title=hi"),
            "src=abc&title=hi"
        );
        assert_eq!(query_string_from_snapshot("", "src=abc"), "src=abc");
    }

    #[test]
    fn hash_location_normalizes_path() {
        assert_eq!(
            parse_hash_location("#/pdf-viewer?src=x"),
            HashLocation {
                path: "/pdf-viewer".to_string(),
                query: "src=x".to_string()
            }
        );
        assert_eq!(parse_hash_location("").path, "/");
        assert_eq!(parse_hash_location("#comments").path, "/comments");
    }

    #[test]
    fn route_path_strips_query() {
        assert_eq!(current_route_path("#/note-viewer?src=a"), "/note-viewer");
        assert_eq!(current_route_path(""), "/");
    }

    #[test]
    fn snapshot_splits_href() {
        let snapshot =
            LocationSnapshot::parse("http://localhost:3000/site/?giscus=abc#comments").expect("url");
        assert_eq!(snapshot.hash, "#comments");
        assert_eq!(snapshot.search, "?giscus=abc");
        assert_eq!(snapshot.pathname, "/site/");
        assert_eq!(snapshot.search_query(), "giscus=abc");
    }

    #[test]
    fn query_params_set_replaces_first_and_drops_duplicates() {
        let mut params = QueryParams::parse("?src=a&title=t&src=b");
        params.set("src", "ghs/o/r/main/a.md");
        assert_eq!(params.to_query_string(), "src=ghs%2Fo%2Fr%2Fmain%2Fa.md&title=t");
        params.set("back", "/cse");
        assert_eq!(params.get("back"), Some("/cse"));
        assert_eq!(QueryParams::parse("src=").get_non_empty("src"), None);
    }

    #[test]
    fn memory_address_bar_resolves_fragments() {
        let bar = MemoryAddressBar::new("http://localhost:3000/?giscus=abc#comments").expect("url");
        bar.replace("#/note-viewer?src=a").expect("replace");
        assert_eq!(bar.href(), "http://localhost:3000/?giscus=abc#/note-viewer?src=a");
        bar.push("/other").expect("push");
        assert_eq!(bar.entries().len(), 2);
        assert_eq!(bar.origin(), "http://localhost:3000");
    }

    #[test]
    fn hub_dispatches_only_after_install() {
        let bar = MemoryAddressBar::new("http://localhost:3000/").expect("url");
        let events = LocationEvents::new(bar);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        events.subscribe(move |snapshot| sink.borrow_mut().push(snapshot.hash.clone()));

        events.replace("#/math").expect("replace");
        assert!(seen.borrow().is_empty());

        assert!(events.ensure_installed());
        assert!(!events.ensure_installed());
        events.replace("#/note-viewer?src=abc").expect("replace");
        events.notify_external();
        assert_eq!(
            *seen.borrow(),
            vec!["#/note-viewer?src=abc".to_string(), "#/note-viewer?src=abc".to_string()]
        );
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let events = LocationEvents::new(MemoryAddressBar::new("http://localhost:3000/").expect("url"));
        events.ensure_installed();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let id = events.subscribe(move |_| counter.set(counter.get() + 1));
        events.push("#/ai").expect("push");
        assert!(events.unsubscribe(id));
        events.push("#/cse").expect("push");
        assert_eq!(calls.get(), 1);
    }
}
