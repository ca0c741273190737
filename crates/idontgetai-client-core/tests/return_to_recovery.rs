use std::cell::{Cell, RefCell};
use std::rc::Rc;

use idontgetai_client_core::config::{RESTORED_FOR_KEY, RETURN_TO_AT_KEY, RETURN_TO_KEY, VIEWER_ACTIVE_KEY};
use idontgetai_client_core::{
    AddressBar, Clock, KeyValueStore, LocationEvents, MemoryAddressBar, MemoryStore,
    ReturnToDecision, ReturnToRecovery, SiteConfig, SkipReason, StorageChain, StorageError,
    ViewerPageType,
};

const ORIGIN: &str = "http://localhost:3000";
const NOTE_URL: &str = "http://localhost:3000/#/note-viewer?src=ghs%2Fo%2Fr%2Fmain%2Fdocs%2Fa.md";
const PDF_URL: &str =
    "http://localhost:3000/#/pdf-viewer?src=ghs%2Fo%2Fr%2Fmain%2Fdocs%2Fa.pdf&title=hi";

struct FixedClock(Cell<u64>);

impl FixedClock {
    fn at(now: u64) -> Self {
        Self(Cell::new(now))
    }

    fn advance_minutes(&self, minutes: u64) {
        self.0.set(self.0.get() + minutes * 60 * 1000);
    }
}

impl Clock for FixedClock {
    fn now_unix_ms(&self) -> u64 {
        self.0.get()
    }
}

struct DisabledStore;

impl KeyValueStore for DisabledStore {
    fn backend_name(&self) -> &'static str {
        "disabled"
    }

    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable {
            backend: "disabled",
        })
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable {
            backend: "disabled",
        })
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable {
            backend: "disabled",
        })
    }
}

fn session_storage() -> StorageChain {
    StorageChain::new().with_backend(MemoryStore::new())
}

/// Visit `viewer_url`, mark it active, then leave.
fn visit_viewer(
    config: &SiteConfig,
    storage: &StorageChain,
    clock: &FixedClock,
    viewer_url: &str,
    page_type: ViewerPageType,
) {
    let bar = MemoryAddressBar::new(viewer_url).expect("viewer url");
    ReturnToRecovery::new(config, storage, &bar, clock).mark_viewer_active(page_type);
}

#[test]
fn normalize_compresses_src_inside_hash() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_000);
    let bar = MemoryAddressBar::new(
        "http://localhost:3000/#/pdf-viewer?src=https%3A%2F%2Fgithub.com%2Fo%2Fr%2Fblob%2Fmain%2Fdocs%2Fa.pdf",
    )
    .expect("url");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);

    assert!(recovery.normalize_viewer_src_param_in_place());
    assert_eq!(
        bar.snapshot().hash,
        "#/pdf-viewer?src=ghs%2Fo%2Fr%2Fmain%2Fdocs%2Fa.pdf"
    );
    assert_eq!(bar.entries().len(), 1);
    assert!(!recovery.normalize_viewer_src_param_in_place());
}

#[test]
fn normalize_compresses_src_in_real_search() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_000);
    let bar = MemoryAddressBar::new(
        "http://localhost:3000/?src=https%3A%2F%2Fgithub.com%2Fo%2Fr%2Fblob%2Fmain%2Fa.md&title=hi#/note-viewer",
    )
    .expect("url");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);

    assert!(recovery.normalize_viewer_src_param_in_place());
    assert_eq!(
        bar.href(),
        "http://localhost:3000/?src=ghs%2Fo%2Fr%2Fmain%2Fa.md&title=hi#/note-viewer"
    );
}

#[test]
fn normalize_ignores_non_viewer_routes() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_000);
    let bar = MemoryAddressBar::new(
        "http://localhost:3000/#/math?src=https%3A%2F%2Fgithub.com%2Fo%2Fr%2Fblob%2Fmain%2Fa.md",
    )
    .expect("url");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);
    assert!(!recovery.normalize_viewer_src_param_in_place());
}

#[test]
fn mark_viewer_active_records_href_and_time() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(42_000);
    visit_viewer(&config, &storage, &clock, NOTE_URL, ViewerPageType::Note);

    assert_eq!(
        storage.get(&config.storage_key(VIEWER_ACTIVE_KEY)),
        Some("note".to_string())
    );
    assert_eq!(
        storage.get(&config.storage_key(RETURN_TO_KEY)),
        Some(NOTE_URL.to_string())
    );
    assert_eq!(
        storage.get("idontgetai:giscus:returnToAt"),
        Some("42000".to_string())
    );
}

#[test]
fn clear_viewer_active_keeps_the_saved_address() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(42_000);
    let bar = MemoryAddressBar::new(NOTE_URL).expect("url");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);
    recovery.mark_viewer_active(ViewerPageType::Note);
    recovery.clear_viewer_active();

    let record = recovery.load_record();
    assert_eq!(record.viewer_active, None);
    assert_eq!(record.return_to_url.as_deref(), Some(NOTE_URL));
}

#[test]
fn broken_home_after_github_login_restores_saved_viewer() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_700_000_000_000);
    visit_viewer(&config, &storage, &clock, NOTE_URL, ViewerPageType::Note);
    clock.advance_minutes(2);

    let bar = MemoryAddressBar::new(&format!("{ORIGIN}/#/"))
        .expect("url")
        .with_referrer("https://github.com/");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);

    assert!(recovery.restore_return_to_if_needed());
    assert_eq!(bar.href(), NOTE_URL);
    assert_eq!(bar.entries().len(), 1);
    assert_eq!(
        storage.get(&config.storage_key(RESTORED_FOR_KEY)),
        Some(NOTE_URL.to_string())
    );
    assert_eq!(storage.get(&config.storage_key(VIEWER_ACTIVE_KEY)), None);
}

#[test]
fn callback_token_is_merged_into_restored_pdf_address() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_700_000_000_000);
    visit_viewer(&config, &storage, &clock, PDF_URL, ViewerPageType::Pdf);

    let bar = MemoryAddressBar::new(&format!("{ORIGIN}/?giscus=abc123#comments")).expect("url");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);

    assert!(recovery.restore_return_to_if_needed());
    assert_eq!(
        bar.href(),
        "http://localhost:3000/?giscus=abc123#/pdf-viewer?src=ghs%2Fo%2Fr%2Fmain%2Fdocs%2Fa.pdf&title=hi"
    );

    // A refresh of the restored page must not restore again.
    assert_eq!(
        recovery.evaluate(),
        ReturnToDecision::Skip(SkipReason::AlreadyRestored)
    );
    assert!(!recovery.restore_return_to_if_needed());
}

#[test]
fn token_return_after_viewer_unmount_still_restores() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_700_000_000_000);
    let viewer = MemoryAddressBar::new(NOTE_URL).expect("url");
    let viewer_recovery = ReturnToRecovery::new(&config, &storage, &viewer, &clock);
    viewer_recovery.mark_viewer_active(ViewerPageType::Note);
    viewer_recovery.clear_viewer_active();

    let bar = MemoryAddressBar::new(&format!("{ORIGIN}/?giscus=t#comments")).expect("url");
    assert!(ReturnToRecovery::new(&config, &storage, &bar, &clock).restore_return_to_if_needed());
    assert_eq!(
        bar.href(),
        "http://localhost:3000/?giscus=t#/note-viewer?src=ghs%2Fo%2Fr%2Fmain%2Fdocs%2Fa.md"
    );
}

#[test]
fn already_at_saved_address_is_left_alone() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_700_000_000_000);
    visit_viewer(&config, &storage, &clock, NOTE_URL, ViewerPageType::Note);

    let bar = MemoryAddressBar::new(NOTE_URL)
        .expect("url")
        .with_referrer("https://example.com/");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);

    assert_eq!(
        recovery.evaluate(),
        ReturnToDecision::Skip(SkipReason::AlreadyAtTarget)
    );
    assert!(!recovery.restore_return_to_if_needed());
    assert_eq!(bar.href(), NOTE_URL);
}

#[test]
fn stale_record_is_not_restored_and_is_cleared() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_700_000_000_000);
    visit_viewer(&config, &storage, &clock, NOTE_URL, ViewerPageType::Note);
    clock.advance_minutes(20);

    let bar = MemoryAddressBar::new(&format!("{ORIGIN}/#/"))
        .expect("url")
        .with_referrer("https://github.com/");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);

    assert!(!recovery.restore_return_to_if_needed());
    assert_eq!(bar.href(), format!("{ORIGIN}/#/"));
    for suffix in [VIEWER_ACTIVE_KEY, RETURN_TO_KEY, RETURN_TO_AT_KEY] {
        assert_eq!(storage.get(&config.storage_key(suffix)), None, "{suffix}");
    }
}

#[test]
fn record_from_another_origin_is_discarded() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_700_000_000_000);
    visit_viewer(
        &config,
        &storage,
        &clock,
        "https://elsewhere.example/#/note-viewer?src=a",
        ViewerPageType::Note,
    );

    let bar = MemoryAddressBar::new(&format!("{ORIGIN}/#/"))
        .expect("url")
        .with_referrer("https://github.com/");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);

    assert_eq!(
        recovery.evaluate(),
        ReturnToDecision::Skip(SkipReason::UntrustedOrigin)
    );
    assert!(!recovery.restore_return_to_if_needed());
    assert_eq!(storage.get(&config.storage_key(RETURN_TO_KEY)), None);
}

#[test]
fn missing_record_skips_without_clearing() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_700_000_000_000);
    let bar = MemoryAddressBar::new(&format!("{ORIGIN}/#/")).expect("url");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);

    assert_eq!(recovery.evaluate(), ReturnToDecision::Skip(SkipReason::NoRecord));
    assert!(!recovery.restore_return_to_if_needed());
}

#[test]
fn disabled_storage_never_restores() {
    let config = SiteConfig::default();
    let storage = StorageChain::new().with_backend(DisabledStore);
    let clock = FixedClock::at(1_700_000_000_000);
    visit_viewer(&config, &storage, &clock, NOTE_URL, ViewerPageType::Note);

    let bar = MemoryAddressBar::new(&format!("{ORIGIN}/?giscus=t#comments")).expect("url");
    let recovery = ReturnToRecovery::new(&config, &storage, &bar, &clock);
    assert!(!recovery.restore_return_to_if_needed());
    assert_eq!(bar.href(), format!("{ORIGIN}/?giscus=t#comments"));
}

#[test]
fn custom_prefix_isolates_records() {
    let config = SiteConfig {
        storage_prefix: "staging:".to_string(),
        ..SiteConfig::default()
    };
    let storage = session_storage();
    let clock = FixedClock::at(1_700_000_000_000);
    visit_viewer(&config, &storage, &clock, NOTE_URL, ViewerPageType::Note);

    assert_eq!(storage.get("staging:returnTo"), Some(NOTE_URL.to_string()));
    assert_eq!(storage.get("idontgetai:giscus:returnTo"), None);
}

#[test]
fn restoring_through_the_hub_notifies_subscribers() {
    let config = SiteConfig::default();
    let storage = session_storage();
    let clock = FixedClock::at(1_700_000_000_000);
    visit_viewer(&config, &storage, &clock, NOTE_URL, ViewerPageType::Note);

    let bar = MemoryAddressBar::new(&format!("{ORIGIN}/"))
        .expect("url")
        .with_referrer("https://giscus.app/");
    let events = Rc::new(LocationEvents::new(bar));
    events.ensure_installed();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    events.subscribe(move |snapshot| sink.borrow_mut().push(snapshot.href.clone()));

    let recovery = ReturnToRecovery::new(&config, &storage, &events, &clock);
    assert!(recovery.restore_return_to_if_needed());
    assert_eq!(*seen.borrow(), vec![NOTE_URL.to_string()]);
}
