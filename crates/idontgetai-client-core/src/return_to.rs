//! Return-to recovery for the comment provider's login round trip.
//!
//! A viewer page records its own address before the user can leave for the
//! comment provider. The provider's redirect frequently comes back without
//! the hash route (or on a bare callback address), so at boot, before the
//! router reads the address, [`ReturnToRecovery::restore_return_to_if_needed`]
//! decides whether to put the saved viewer address back in place.
//!
//! The decision is a pure function, [`evaluate_return_to`], returning either
//! `Restore` or the specific gate that stopped it.

use url::Url;

use crate::config::{
    RESTORED_FOR_KEY, RETURN_TO_AT_KEY, RETURN_TO_KEY, SiteConfig, VIEWER_ACTIVE_KEY,
};
use crate::github_url::compress_github_url;
use crate::location::{
    AddressBar, LocationSnapshot, QueryParams, is_hash_router_fragment, parse_hash_location,
};
use crate::storage::StorageChain;
use crate::viewer::{SRC_PARAM, ViewerPageType, is_viewer_route};

pub trait Clock {
    fn now_unix_ms(&self) -> u64;
}

/// Session-scoped recovery state as persisted in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnToRecord {
    pub viewer_active: Option<ViewerPageType>,
    pub return_to_url: Option<String>,
    pub return_to_at: Option<u64>,
    pub restored_for: Option<String>,
}

impl ReturnToRecord {
    fn is_fresh(&self, now_unix_ms: u64, max_age_ms: u64) -> bool {
        self.return_to_at
            .is_some_and(|recorded_at| now_unix_ms.saturating_sub(recorded_at) <= max_age_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No viewer was active and no callback token is present.
    NoRecord,
    /// The saved address is missing its timestamp or is past the window.
    StaleRecord,
    /// The saved address does not belong to this origin.
    UntrustedOrigin,
    AlreadyAtTarget,
    /// The address still routes somewhere and nothing ties the visit to the
    /// login round trip.
    NotBroken,
    /// The address is broken but the visitor came from an unrelated site.
    UnrelatedReferrer,
    /// This exact target was already restored once in this session.
    AlreadyRestored,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoRecord => "no_record",
            Self::StaleRecord => "stale_record",
            Self::UntrustedOrigin => "untrusted_origin",
            Self::AlreadyAtTarget => "already_at_target",
            Self::NotBroken => "not_broken",
            Self::UnrelatedReferrer => "unrelated_referrer",
            Self::AlreadyRestored => "already_restored",
        }
    }

    /// Integrity failures throw the saved record away.
    #[must_use]
    pub fn discards_record(self) -> bool {
        matches!(self, Self::StaleRecord | Self::UntrustedOrigin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnToDecision {
    Restore { target_url: String },
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryInputs<'a> {
    pub snapshot: &'a LocationSnapshot,
    pub origin: &'a str,
    pub referrer: &'a str,
    pub record: &'a ReturnToRecord,
    pub now_unix_ms: u64,
}

#[must_use]
pub fn evaluate_return_to(config: &SiteConfig, inputs: &RecoveryInputs<'_>) -> ReturnToDecision {
    let search_params = QueryParams::parse(inputs.snapshot.search_query());
    let callback_token = search_params.get_non_empty(&config.callback_param);
    let record = inputs.record;

    if record.viewer_active.is_none() && callback_token.is_none() {
        return ReturnToDecision::Skip(SkipReason::NoRecord);
    }
    let Some(return_to_url) = record
        .return_to_url
        .as_deref()
        .filter(|url| !url.is_empty())
    else {
        return ReturnToDecision::Skip(SkipReason::NoRecord);
    };
    if !record.is_fresh(inputs.now_unix_ms, config.return_to_max_age_ms) {
        return ReturnToDecision::Skip(SkipReason::StaleRecord);
    }
    if !is_same_origin(return_to_url, inputs.origin) {
        return ReturnToDecision::Skip(SkipReason::UntrustedOrigin);
    }
    if inputs.snapshot.href == return_to_url {
        return ReturnToDecision::Skip(SkipReason::AlreadyAtTarget);
    }

    let broken = is_broken_viewer_state(inputs.snapshot);
    let from_auth = callback_token.is_some()
        || is_auth_referrer(inputs.referrer, &config.auth_referrer_hosts);
    if !broken && !from_auth {
        return ReturnToDecision::Skip(SkipReason::NotBroken);
    }
    if !from_auth && !inputs.referrer.is_empty() {
        return ReturnToDecision::Skip(SkipReason::UnrelatedReferrer);
    }

    let target_url = with_callback_token(return_to_url, &config.callback_param, callback_token);
    if record.restored_for.as_deref() == Some(target_url.as_str()) {
        return ReturnToDecision::Skip(SkipReason::AlreadyRestored);
    }
    ReturnToDecision::Restore { target_url }
}

/// A viewer with no `src`, an address without a hash route, or the bare
/// root route.
#[must_use]
pub fn is_broken_viewer_state(snapshot: &LocationSnapshot) -> bool {
    let hash = parse_hash_location(&snapshot.hash);
    if is_viewer_route(&hash.path) {
        let query = if hash.query.is_empty() {
            snapshot.search_query()
        } else {
            hash.query.as_str()
        };
        return QueryParams::parse(query).get_non_empty(SRC_PARAM).is_none();
    }
    if !is_hash_router_fragment(&snapshot.hash) {
        return true;
    }
    hash.path == "/"
}

fn is_same_origin(url: &str, origin: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let parsed_origin = parsed.origin();
    parsed_origin.is_tuple() && parsed_origin.ascii_serialization() == origin
}

fn is_auth_referrer(referrer: &str, hosts: &[String]) -> bool {
    let referrer = referrer.trim();
    if referrer.is_empty() {
        return false;
    }
    let host = match Url::parse(referrer) {
        Ok(url) => url.host_str().map(str::to_ascii_lowercase),
        Err(_) => referrer
            .split('/')
            .next()
            .map(str::to_ascii_lowercase),
    };
    host.is_some_and(|host| hosts.iter().any(|candidate| *candidate == host))
}

/// Carry the callback token into the restored address's real query string
/// so a widget on the destination can finish its handshake.
fn with_callback_token(target: &str, param: &str, token: Option<&str>) -> String {
    let Some(token) = token else {
        return target.to_string();
    };
    let Ok(mut url) = Url::parse(target) else {
        return target.to_string();
    };
    let mut params = QueryParams::parse(url.query().unwrap_or_default());
    if params.get_non_empty(param).is_some() {
        return target.to_string();
    }
    params.set(param, token);
    url.set_query(Some(&params.to_query_string()));
    url.to_string()
}

/// Storage-backed recovery operations bound to one address bar.
pub struct ReturnToRecovery<'a, A: AddressBar + ?Sized> {
    config: &'a SiteConfig,
    storage: &'a StorageChain,
    address: &'a A,
    clock: &'a dyn Clock,
}

impl<'a, A: AddressBar + ?Sized> ReturnToRecovery<'a, A> {
    pub fn new(
        config: &'a SiteConfig,
        storage: &'a StorageChain,
        address: &'a A,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            storage,
            address,
            clock,
        }
    }

    #[must_use]
    pub fn load_record(&self) -> ReturnToRecord {
        let get = |suffix: &str| self.storage.get(&self.config.storage_key(suffix));
        ReturnToRecord {
            viewer_active: get(VIEWER_ACTIVE_KEY)
                .as_deref()
                .and_then(ViewerPageType::parse),
            return_to_url: get(RETURN_TO_KEY),
            return_to_at: get(RETURN_TO_AT_KEY).and_then(|raw| raw.trim().parse::<u64>().ok()),
            restored_for: get(RESTORED_FOR_KEY),
        }
    }

    /// Record the current address as the place to come back to.
    pub fn mark_viewer_active(&self, page_type: ViewerPageType) {
        let href = self.address.snapshot().href;
        let now = self.clock.now_unix_ms();
        self.storage.set(
            &self.config.storage_key(VIEWER_ACTIVE_KEY),
            page_type.as_str(),
        );
        self.storage
            .set(&self.config.storage_key(RETURN_TO_KEY), &href);
        self.storage.set(
            &self.config.storage_key(RETURN_TO_AT_KEY),
            &now.to_string(),
        );
        tracing::debug!(page = page_type.as_str(), href = %href, "return_to.mark_active");
    }

    /// Viewer unmounted normally; the saved address stays for a callback
    /// that arrives later with a token.
    pub fn clear_viewer_active(&self) {
        self.storage
            .remove(&self.config.storage_key(VIEWER_ACTIVE_KEY));
    }

    /// Shorten a viewer's `src` in place so outgoing redirects stay within
    /// the provider's length limit. Returns whether the address changed.
    pub fn normalize_viewer_src_param_in_place(&self) -> bool {
        let snapshot = self.address.snapshot();
        let hash = parse_hash_location(&snapshot.hash);
        if !is_viewer_route(&hash.path) {
            return false;
        }

        let query_in_hash = !hash.query.is_empty();
        let query = if query_in_hash {
            hash.query.as_str()
        } else {
            snapshot.search_query()
        };
        if query.is_empty() {
            return false;
        }

        let mut params = QueryParams::parse(query);
        let Some(src) = params.get_non_empty(SRC_PARAM).map(str::to_string) else {
            return false;
        };
        let compressed = compress_github_url(&src);
        if compressed.is_empty() || compressed == src || compressed.len() >= src.len() {
            return false;
        }

        params.set(SRC_PARAM, &compressed);
        let next_query = params.to_query_string();
        let next_url = if query_in_hash {
            format!("#{}?{next_query}", hash.path)
        } else {
            format!("{}?{next_query}{}", snapshot.pathname, snapshot.hash)
        };
        if let Err(error) = self.address.replace(&next_url) {
            tracing::warn!(%error, "viewer.compress.replace_failed");
            return false;
        }
        tracing::debug!(
            page = %hash.path,
            from = src.len(),
            to = compressed.len(),
            "viewer.compress"
        );
        true
    }

    #[must_use]
    pub fn evaluate(&self) -> ReturnToDecision {
        let record = self.load_record();
        let snapshot = self.address.snapshot();
        let origin = self.address.origin();
        let referrer = self.address.referrer();
        evaluate_return_to(
            self.config,
            &RecoveryInputs {
                snapshot: &snapshot,
                origin: &origin,
                referrer: &referrer,
                record: &record,
                now_unix_ms: self.clock.now_unix_ms(),
            },
        )
    }

    /// Run once at boot, before the router reads the address.
    pub fn restore_return_to_if_needed(&self) -> bool {
        match self.evaluate() {
            ReturnToDecision::Skip(reason) => {
                if reason.discards_record() {
                    self.discard_record();
                }
                tracing::debug!(reason = reason.as_str(), "return_to.skip");
                false
            }
            ReturnToDecision::Restore { target_url } => {
                if let Err(error) = self.address.replace(&target_url) {
                    tracing::warn!(%error, url = %target_url, "return_to.replace_failed");
                    return false;
                }
                self.storage
                    .set(&self.config.storage_key(RESTORED_FOR_KEY), &target_url);
                self.clear_viewer_active();
                tracing::info!(url = %target_url, "return_to.restored");
                true
            }
        }
    }

    fn discard_record(&self) {
        for suffix in [VIEWER_ACTIVE_KEY, RETURN_TO_KEY, RETURN_TO_AT_KEY] {
            self.storage.remove(&self.config.storage_key(suffix));
        }
    }
}
