use std::time::Duration;

use anyhow::{Context, Result};

use crate::classifier::classify;
use crate::readiness::{self, Readiness};
use crate::thumbnail;
use crate::traits::{BrowserEngine, DomSession, SettingsProvider, WatchStore};
use crate::types::{ScrapeResult, ScrapeResultKind, Watch};

/// Run one check against a watch: navigate, race readiness, extract,
/// classify, apply the deactivation side effect, tear down.
///
/// `initial` marks the watch's first-ever check. It changes how an absent
/// element or absent text is classified: on the first check those signal a
/// misconfigured watch (`ElementNotFound` / `TextNotFound`), on later checks
/// they mean the watched content disappeared (`Change`).
///
/// Browser failures never escape: a session that cannot be opened or a page
/// that never becomes inspectable classifies as `Timeout`. Settings and
/// store failures propagate to the caller.
pub async fn observe(
    mut watch: Watch,
    initial: bool,
    engine: &impl BrowserEngine,
    settings: &impl SettingsProvider,
    store: &impl WatchStore,
) -> Result<ScrapeResult> {
    let tenant_settings = settings
        .settings(&watch.key.tenant_id)
        .await
        .with_context(|| format!("failed to load settings for tenant {}", watch.key.tenant_id))?;

    tracing::info!(
        tenant_id = %watch.key.tenant_id,
        name = %watch.key.name,
        url = %watch.url,
        initial,
        timeout_secs = tenant_settings.timeout_secs,
        "Starting check"
    );

    let session = match engine.open(&watch.url).await {
        Ok(session) => session,
        Err(err) => {
            // Navigation failure is not a distinct result kind: a page that
            // never loads is indistinguishable from one that loads too slowly.
            tracing::warn!(url = %watch.url, error = %err, "failed to open session");
            return Ok(ScrapeResult::new(watch, ScrapeResultKind::Timeout));
        }
    };

    let kind = inspect(&session, &mut watch, tenant_settings.timeout(), initial).await;

    // Teardown happens exactly once, before any side effect, on every branch.
    if let Err(err) = session.close().await {
        tracing::warn!(url = %watch.url, error = %err, "failed to tear down session");
    }

    if kind == ScrapeResultKind::Change {
        apply_deactivation(&watch, store).await?;
    }

    tracing::info!(
        tenant_id = %watch.key.tenant_id,
        name = %watch.key.name,
        kind = ?kind,
        "Check completed"
    );

    Ok(ScrapeResult::new(watch, kind))
}

/// Everything that runs inside the live session. Returns a kind instead of
/// early-returning so the caller can guarantee a single teardown.
async fn inspect(
    session: &impl DomSession,
    watch: &mut Watch,
    timeout: Duration,
    initial: bool,
) -> ScrapeResultKind {
    // Best-effort icon discovery; a failure here never affects the outcome.
    match session.discover_icon().await {
        Ok(Some(href)) => {
            if let Some(icon) = thumbnail::canonical_icon_url(&watch.url, &href) {
                tracing::debug!(url = %watch.url, icon = %icon, "Discovered site icon");
                watch.thumbnail = Some(icon);
            }
        }
        Ok(None) => {}
        Err(err) => {
            tracing::debug!(url = %watch.url, error = %err, "icon discovery failed");
        }
    }

    let readiness = readiness::await_element(
        session,
        &watch.css_selector,
        watch.dom_element_property.as_deref(),
        timeout,
    )
    .await;

    match readiness {
        Readiness::Found { content } => classify(content.as_deref(), &watch.current_text, initial),
        // The page settled without the element. First check: the selector
        // was wrong from creation. Later checks: the element disappeared,
        // which is a change the owner should hear about.
        Readiness::ConfirmedAbsent if initial => ScrapeResultKind::ElementNotFound,
        Readiness::ConfirmedAbsent => ScrapeResultKind::Change,
        Readiness::Inconclusive => ScrapeResultKind::Timeout,
    }
}

/// The only mutation the core performs: set `active` on the stored watches
/// matching the composite key to the watch's own keep-active preference.
async fn apply_deactivation(watch: &Watch, store: &impl WatchStore) -> Result<()> {
    let rows = store
        .set_active(&watch.key, watch.keep_active)
        .await
        .with_context(|| format!("failed to update active flag for watch {}", watch.key.name))?;

    tracing::info!(
        tenant_id = %watch.key.tenant_id,
        owner_id = %watch.key.owner_id,
        name = %watch.key.name,
        active = watch.keep_active,
        rows,
        "Applied keep-active preference"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SessionError;
    use crate::config::TenantSettings;
    use crate::types::{ElementProbe, WatchKey};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn watch() -> Watch {
        Watch {
            key: WatchKey::new("tenant-1", "owner-1", "price watch"),
            url: "https://example.com/item".to_string(),
            css_selector: "#price".to_string(),
            dom_element_property: None,
            current_text: "in stock".to_string(),
            thumbnail: None,
            keep_active: false,
        }
    }

    struct FixedSettings;

    #[async_trait]
    impl SettingsProvider for FixedSettings {
        async fn settings(&self, _tenant_id: &str) -> Result<TenantSettings> {
            // Zero so the readiness race probes once and moves on.
            Ok(TenantSettings::new(0))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        active: Mutex<HashMap<WatchKey, bool>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WatchStore for MemoryStore {
        async fn set_active(&self, key: &WatchKey, active: bool) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.active.lock().unwrap().insert(key.clone(), active);
            Ok(1)
        }
    }

    #[derive(Clone)]
    enum IconOutcome {
        None,
        Href(&'static str),
        Error,
    }

    struct MockSession {
        probe: Result<ElementProbe, ()>,
        settled: bool,
        icon: IconOutcome,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DomSession for MockSession {
        async fn probe(
            &self,
            _selector: &str,
            _attribute: Option<&str>,
        ) -> Result<ElementProbe, SessionError> {
            self.probe
                .clone()
                .map_err(|_| SessionError::Config("probe failed".to_string()))
        }

        async fn wait_until_settled(&self, _within: Duration) -> Result<bool, SessionError> {
            Ok(self.settled)
        }

        async fn discover_icon(&self) -> Result<Option<String>, SessionError> {
            match self.icon {
                IconOutcome::None => Ok(None),
                IconOutcome::Href(href) => Ok(Some(href.to_string())),
                IconOutcome::Error => Err(SessionError::Config("evaluate failed".to_string())),
            }
        }

        async fn close(self) -> Result<(), SessionError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockEngine {
        session: Mutex<Option<MockSession>>,
    }

    impl MockEngine {
        fn with(session: MockSession) -> Self {
            Self {
                session: Mutex::new(Some(session)),
            }
        }

        fn failing() -> Self {
            Self {
                session: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl BrowserEngine for MockEngine {
        type Session = MockSession;

        async fn open(&self, url: &str) -> Result<MockSession, SessionError> {
            self.session
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| SessionError::Config(format!("no session for {url}")))
        }
    }

    fn found(text: &str) -> Result<ElementProbe, ()> {
        Ok(ElementProbe::Found {
            content: Some(text.to_string()),
        })
    }

    fn session(probe: Result<ElementProbe, ()>, closes: &Arc<AtomicUsize>) -> MockSession {
        MockSession {
            probe,
            settled: true,
            icon: IconOutcome::None,
            closes: Arc::clone(closes),
        }
    }

    #[tokio::test]
    async fn matching_text_is_no_change_with_no_side_effect() {
        let closes = Arc::new(AtomicUsize::new(0));
        let engine = MockEngine::with(session(found("Still In Stock today"), &closes));
        let store = MemoryStore::default();

        let result = observe(watch(), false, &engine, &FixedSettings, &store)
            .await
            .unwrap();

        assert_eq!(result.kind(), ScrapeResultKind::NoChange);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_text_applies_keep_active_exactly_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let engine = MockEngine::with(session(found("out of stock"), &closes));
        let store = MemoryStore::default();

        let result = observe(watch(), false, &engine, &FixedSettings, &store)
            .await
            .unwrap();

        assert_eq!(result.kind(), ScrapeResultKind::Change);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        // keep_active is false on this watch, so the change deactivates it.
        assert_eq!(
            store.active.lock().unwrap().get(&result.watch().key),
            Some(&false)
        );
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deactivation_is_idempotent() {
        let store = MemoryStore::default();

        for _ in 0..2 {
            let closes = Arc::new(AtomicUsize::new(0));
            let engine = MockEngine::with(session(found("out of stock"), &closes));
            observe(watch(), false, &engine, &FixedSettings, &store)
                .await
                .unwrap();
        }

        let active = store.active.lock().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active.get(&watch().key), Some(&false));
    }

    #[tokio::test]
    async fn missing_element_is_element_not_found_on_initial_check() {
        let closes = Arc::new(AtomicUsize::new(0));
        let engine = MockEngine::with(session(Ok(ElementProbe::Missing), &closes));
        let store = MemoryStore::default();

        let result = observe(watch(), true, &engine, &FixedSettings, &store)
            .await
            .unwrap();

        assert_eq!(result.kind(), ScrapeResultKind::ElementNotFound);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_element_is_a_change_on_recurring_check() {
        let closes = Arc::new(AtomicUsize::new(0));
        let engine = MockEngine::with(session(Ok(ElementProbe::Missing), &closes));
        let store = MemoryStore::default();

        let result = observe(watch(), false, &engine, &FixedSettings, &store)
            .await
            .unwrap();

        assert_eq!(result.kind(), ScrapeResultKind::Change);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_text_is_text_not_found_on_initial_check() {
        let closes = Arc::new(AtomicUsize::new(0));
        let engine = MockEngine::with(session(
            Ok(ElementProbe::Found { content: None }),
            &closes,
        ));
        let store = MemoryStore::default();

        let result = observe(watch(), true, &engine, &FixedSettings, &store)
            .await
            .unwrap();

        assert_eq!(result.kind(), ScrapeResultKind::TextNotFound);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsettled_page_times_out_without_side_effect() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut mock = session(Ok(ElementProbe::Missing), &closes);
        mock.settled = false;
        let engine = MockEngine::with(mock);
        let store = MemoryStore::default();

        let result = observe(watch(), false, &engine, &FixedSettings, &store)
            .await
            .unwrap();

        assert_eq!(result.kind(), ScrapeResultKind::Timeout);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_open_times_out() {
        let engine = MockEngine::failing();
        let store = MemoryStore::default();

        let result = observe(watch(), false, &engine, &FixedSettings, &store)
            .await
            .unwrap();

        assert_eq!(result.kind(), ScrapeResultKind::Timeout);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn discovered_icon_is_canonicalized_onto_the_watch() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut mock = session(found("in stock"), &closes);
        mock.icon = IconOutcome::Href("/static/favicon.png?v=9");
        let engine = MockEngine::with(mock);
        let store = MemoryStore::default();

        let result = observe(watch(), false, &engine, &FixedSettings, &store)
            .await
            .unwrap();

        assert_eq!(
            result.watch().thumbnail.as_deref(),
            Some("https://example.com/static/favicon.png")
        );
    }

    #[tokio::test]
    async fn icon_failure_never_alters_the_result_or_an_existing_thumbnail() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut mock = session(found("in stock"), &closes);
        mock.icon = IconOutcome::Error;
        let engine = MockEngine::with(mock);
        let store = MemoryStore::default();

        let mut watched = watch();
        watched.thumbnail = Some("https://example.com/old-icon.png".to_string());

        let result = observe(watched, false, &engine, &FixedSettings, &store)
            .await
            .unwrap();

        assert_eq!(result.kind(), ScrapeResultKind::NoChange);
        assert_eq!(
            result.watch().thumbnail.as_deref(),
            Some("https://example.com/old-icon.png")
        );
    }
}
