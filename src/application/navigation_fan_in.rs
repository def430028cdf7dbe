//! Navigation fan-in: many tabs, one writer.
//!
//! Tabs and popups report navigations concurrently. Extraction runs on the
//! reporting side, in parallel across tabs; the resulting snapshots go
//! through a bounded queue drained by a single consumer task, which is the
//! only caller of `SessionHandle::update`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::shared_session::SessionHandle;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FanInConfig, PageSnapshot, PageView, SessionResult, TabId};
use crate::domain::ports::{ExtractionError, PageExtractor};

/// Counters kept by the fan-in since it started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanInStats {
    pub tabs_attached: u64,
    pub navigations_applied: u64,
    pub events_dropped: u64,
    pub extraction_failures: u64,
}

#[derive(Debug, Default)]
struct FanInCounters {
    tabs_attached: AtomicU64,
    navigations_applied: AtomicU64,
    events_dropped: AtomicU64,
    extraction_failures: AtomicU64,
}

impl FanInCounters {
    fn snapshot(&self) -> FanInStats {
        FanInStats {
            tabs_attached: self.tabs_attached.load(Ordering::Relaxed),
            navigations_applied: self.navigations_applied.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
enum FanInEvent {
    TabOpened { tab: TabId, opener: Option<TabId> },
    Navigated(PageSnapshot),
    TabClosed(TabId),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

#[derive(Debug)]
struct TabEntry {
    opener: Option<TabId>,
    open: bool,
    navigations: u64,
}

/// Serializes navigation events from any number of tabs into one session.
pub struct NavigationFanIn {
    tx: mpsc::Sender<FanInEvent>,
    session: SessionHandle,
    extractor: Arc<dyn PageExtractor>,
    counters: Arc<FanInCounters>,
    /// Close flags handed out to tab handles, keyed by tab.
    tab_flags: Mutex<HashMap<TabId, Arc<AtomicBool>>>,
    consumer: JoinHandle<()>,
}

impl NavigationFanIn {
    /// Spawn the consumer task. Must be called inside a Tokio runtime.
    pub fn start(session: SessionHandle, extractor: Arc<dyn PageExtractor>, config: &FanInConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let counters = Arc::new(FanInCounters::default());
        let consumer = tokio::spawn(run_consumer(rx, session.clone(), Arc::clone(&counters)));

        info!(
            session_id = %session.session_id(),
            queue_capacity = config.queue_capacity,
            "Navigation fan-in started"
        );

        Self {
            tx,
            session,
            extractor,
            counters,
            tab_flags: Mutex::new(HashMap::new()),
            consumer,
        }
    }

    /// Attach a tab or popup. Attaching the same tab again returns a handle
    /// that shares the first one's state.
    pub async fn attach_tab(&self, tab: TabId, opener: Option<TabId>) -> DomainResult<TabHandle> {
        let closed = {
            let mut flags = self.tab_flags.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(flags.entry(tab.clone()).or_default())
        };

        send(&self.tx, FanInEvent::TabOpened {
            tab: tab.clone(),
            opener,
        })
        .await?;

        Ok(TabHandle {
            tab,
            closed,
            tx: self.tx.clone(),
            extractor: Arc::clone(&self.extractor),
            counters: Arc::clone(&self.counters),
        })
    }

    /// Enqueue an already-extracted snapshot. Snapshots from tabs never
    /// attached attach them implicitly.
    pub async fn submit(&self, snapshot: PageSnapshot) -> DomainResult<()> {
        send(&self.tx, FanInEvent::Navigated(snapshot)).await
    }

    /// Wait until every event enqueued before this call has been applied.
    pub async fn flush(&self) -> DomainResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        send(&self.tx, FanInEvent::Flush(ack_tx)).await?;
        ack_rx.await.map_err(|_| DomainError::FanInClosed)
    }

    /// Latest published session result.
    pub fn compute(&self) -> SessionResult {
        self.session.compute()
    }

    pub const fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn stats(&self) -> FanInStats {
        self.counters.snapshot()
    }

    /// Apply everything already queued, then stop the consumer. Navigations
    /// submitted through outstanding tab handles after this point fail with
    /// `FanInClosed` instead of being silently lost.
    pub async fn shutdown(self) -> FanInStats {
        if send(&self.tx, FanInEvent::Shutdown).await.is_err() {
            warn!("Fan-in consumer already stopped");
        }
        if let Err(e) = self.consumer.await {
            error!(error = %e, "Fan-in consumer task failed");
        }

        let stats = self.counters.snapshot();
        info!(
            session_id = %self.session.session_id(),
            tabs_attached = stats.tabs_attached,
            navigations_applied = stats.navigations_applied,
            events_dropped = stats.events_dropped,
            "Navigation fan-in stopped"
        );
        stats
    }
}

/// Producer side for one tab.
#[derive(Clone)]
pub struct TabHandle {
    tab: TabId,
    closed: Arc<AtomicBool>,
    tx: mpsc::Sender<FanInEvent>,
    extractor: Arc<dyn PageExtractor>,
    counters: Arc<FanInCounters>,
}

impl TabHandle {
    pub const fn tab(&self) -> &TabId {
        &self.tab
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Extract the page and enqueue the result. Returns `false` when the
    /// event was dropped because the tab is closed.
    ///
    /// A page that closed during extraction is dropped like a navigation
    /// from a closed tab. Any other extractor failure contributes an empty
    /// snapshot rather than an error.
    pub async fn on_navigate(&self, mut page: PageView) -> DomainResult<bool> {
        if self.drop_if_closed(&page.url) {
            return Ok(false);
        }
        page.tab = self.tab.clone();

        let observations = match self.extractor.extract(&page).await {
            Ok(observations) => observations,
            Err(ExtractionError::PageClosed) => {
                self.counters.events_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(tab = %self.tab, url = %page.url, "Page closed during extraction");
                return Ok(false);
            }
            Err(e) => {
                self.counters.extraction_failures.fetch_add(1, Ordering::Relaxed);
                warn!(tab = %self.tab, url = %page.url, error = %e, "Extraction failed");
                Vec::new()
            }
        };

        // The tab may have closed while extraction ran.
        if self.drop_if_closed(&page.url) {
            return Ok(false);
        }

        send(
            &self.tx,
            FanInEvent::Navigated(PageSnapshot {
                tab: self.tab.clone(),
                url: page.url,
                observations,
            }),
        )
        .await?;
        Ok(true)
    }

    /// Run [`on_navigate`](Self::on_navigate) on its own task.
    pub fn spawn_navigate(&self, page: PageView) -> JoinHandle<DomainResult<bool>> {
        let handle = self.clone();
        tokio::spawn(async move { handle.on_navigate(page).await })
    }

    /// Mark the tab closed. Later navigations from it are dropped.
    pub async fn close(&self) -> DomainResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        send(&self.tx, FanInEvent::TabClosed(self.tab.clone())).await
    }

    fn drop_if_closed(&self, url: &str) -> bool {
        if self.is_closed() {
            self.counters.events_dropped.fetch_add(1, Ordering::Relaxed);
            warn!(tab = %self.tab, url, "Dropped navigation from closed tab");
            true
        } else {
            false
        }
    }
}

async fn send(tx: &mpsc::Sender<FanInEvent>, event: FanInEvent) -> DomainResult<()> {
    tx.send(event).await.map_err(|_| DomainError::FanInClosed)
}

async fn run_consumer(
    mut rx: mpsc::Receiver<FanInEvent>,
    session: SessionHandle,
    counters: Arc<FanInCounters>,
) {
    let mut tabs: HashMap<TabId, TabEntry> = HashMap::new();

    while let Some(event) = rx.recv().await {
        match event {
            FanInEvent::TabOpened { tab, opener } => {
                if let Entry::Vacant(entry) = tabs.entry(tab) {
                    info!(tab = %entry.key(), opener = ?opener, "Tab attached");
                    entry.insert(TabEntry {
                        opener,
                        open: true,
                        navigations: 0,
                    });
                    counters.tabs_attached.fetch_add(1, Ordering::Relaxed);
                }
            }
            FanInEvent::Navigated(snapshot) => {
                let entry = tabs.entry(snapshot.tab.clone()).or_insert_with(|| {
                    info!(tab = %snapshot.tab, "Tab attached on first navigation");
                    counters.tabs_attached.fetch_add(1, Ordering::Relaxed);
                    TabEntry {
                        opener: None,
                        open: true,
                        navigations: 0,
                    }
                });
                if !entry.open {
                    counters.events_dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(tab = %snapshot.tab, url = %snapshot.url, "Dropped navigation from closed tab");
                    continue;
                }
                entry.navigations += 1;

                let summary = session.update(&snapshot).await;
                counters.navigations_applied.fetch_add(1, Ordering::Relaxed);
                debug!(
                    tab = %snapshot.tab,
                    processed = summary.processed,
                    newly_covered = summary.newly_covered,
                    "Navigation applied"
                );
            }
            FanInEvent::TabClosed(tab) => {
                let entry = tabs.entry(tab).or_insert(TabEntry {
                    opener: None,
                    open: false,
                    navigations: 0,
                });
                entry.open = false;
                debug!(opener = ?entry.opener, navigations = entry.navigations, "Tab closed");
            }
            FanInEvent::Flush(ack) => {
                // The flusher may have given up waiting.
                let _ = ack.send(());
            }
            FanInEvent::Shutdown => {
                // Refuse new events; whatever is already queued still drains.
                rx.close();
            }
        }
    }

    debug!(tabs = tabs.len(), "Fan-in consumer exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MatchingConfig;
    use crate::domain::ports::{ExtractionError, PassthroughExtractor};
    use crate::services::Session;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    fn fan_in_with(extractor: Arc<dyn PageExtractor>) -> NavigationFanIn {
        let session = Session::from_value(
            &json!([[{"names": "lakers"}], [{"names": "kings"}]]),
            &MatchingConfig::default(),
        )
        .unwrap();
        NavigationFanIn::start(SessionHandle::new(session), extractor, &FanInConfig::default())
    }

    fn page(url: &str, payload: Value) -> PageView {
        PageView {
            tab: TabId::new("ignored"),
            url: url.to_string(),
            payload,
        }
    }

    #[tokio::test]
    async fn test_navigation_reaches_session() {
        let fan_in = fan_in_with(Arc::new(PassthroughExtractor));
        let tab = fan_in.attach_tab(TabId::new("main"), None).await.unwrap();

        assert!(tab.on_navigate(page("https://x.example/1", json!([{"name": "lakers"}]))).await.unwrap());
        fan_in.flush().await.unwrap();

        assert_eq!(fan_in.compute().is_query_covered, vec![true, false]);
        let stats = fan_in.shutdown().await;
        assert_eq!(stats.tabs_attached, 1);
        assert_eq!(stats.navigations_applied, 1);
    }

    #[tokio::test]
    async fn test_attach_is_idempotent() {
        let fan_in = fan_in_with(Arc::new(PassthroughExtractor));
        let first = fan_in.attach_tab(TabId::new("main"), None).await.unwrap();
        let second = fan_in.attach_tab(TabId::new("main"), None).await.unwrap();

        first.close().await.unwrap();
        assert!(second.is_closed());

        fan_in.flush().await.unwrap();
        assert_eq!(fan_in.stats().tabs_attached, 1);
    }

    #[tokio::test]
    async fn test_closed_tab_events_are_dropped() {
        let fan_in = fan_in_with(Arc::new(PassthroughExtractor));
        let tab = fan_in.attach_tab(TabId::new("popup"), Some(TabId::new("main"))).await.unwrap();
        tab.close().await.unwrap();

        let applied = tab.on_navigate(page("https://x.example/2", json!([{"name": "kings"}]))).await.unwrap();
        assert!(!applied);

        fan_in
            .submit(PageSnapshot::new("popup", "https://x.example/3", vec![json!({"name": "kings"})]))
            .await
            .unwrap();
        fan_in.flush().await.unwrap();

        assert_eq!(fan_in.compute().n_covered, 0);
        let stats = fan_in.shutdown().await;
        assert_eq!(stats.events_dropped, 2);
        assert_eq!(stats.navigations_applied, 0);
    }

    #[tokio::test]
    async fn test_unknown_tab_is_attached_on_first_snapshot() {
        let fan_in = fan_in_with(Arc::new(PassthroughExtractor));
        fan_in
            .submit(PageSnapshot::new("late-popup", "https://x.example/4", vec![json!({"name": "kings"})]))
            .await
            .unwrap();
        fan_in.flush().await.unwrap();

        assert_eq!(fan_in.compute().is_query_covered, vec![false, true]);
        assert_eq!(fan_in.stats().tabs_attached, 1);
    }

    struct FailingExtractor;

    #[async_trait]
    impl PageExtractor for FailingExtractor {
        async fn extract(&self, _page: &PageView) -> Result<Vec<Value>, ExtractionError> {
            Err(ExtractionError::Failed("selector missing".to_string()))
        }
    }

    #[tokio::test]
    async fn test_extraction_failure_degrades_to_empty_page() {
        let fan_in = fan_in_with(Arc::new(FailingExtractor));
        let tab = fan_in.attach_tab(TabId::new("main"), None).await.unwrap();

        assert!(tab.on_navigate(page("https://x.example/5", Value::Null)).await.unwrap());
        fan_in.flush().await.unwrap();

        let result = fan_in.compute();
        assert_eq!(result.stats.pages_seen, 1);
        assert_eq!(result.n_covered, 0);
        assert_eq!(fan_in.stats().extraction_failures, 1);
    }

    struct ClosingExtractor;

    #[async_trait]
    impl PageExtractor for ClosingExtractor {
        async fn extract(&self, _page: &PageView) -> Result<Vec<Value>, ExtractionError> {
            Err(ExtractionError::PageClosed)
        }
    }

    #[tokio::test]
    async fn test_page_closed_during_extraction_is_dropped() {
        let fan_in = fan_in_with(Arc::new(ClosingExtractor));
        let tab = fan_in.attach_tab(TabId::new("popup"), None).await.unwrap();

        assert!(!tab.on_navigate(page("https://x.example/7", json!([{"name": "lakers"}]))).await.unwrap());
        fan_in.flush().await.unwrap();

        assert_eq!(fan_in.compute().stats.pages_seen, 0);
        let stats = fan_in.shutdown().await;
        assert_eq!(stats.events_dropped, 1);
        assert_eq!(stats.extraction_failures, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_accepted_navigation_is_applied_across_shutdown() {
        let fan_in = fan_in_with(Arc::new(PassthroughExtractor));
        let tab = fan_in.attach_tab(TabId::new("main"), None).await.unwrap();

        let joins: Vec<_> = (0..200)
            .map(|i| tab.spawn_navigate(page(&format!("https://x.example/p/{i}"), json!([{"name": format!("show {i}")}]))))
            .collect();
        let stats = fan_in.shutdown().await;

        let mut accepted = 0;
        for join in joins {
            match join.await.unwrap() {
                Ok(true) => accepted += 1,
                Ok(false) => panic!("tab was never closed"),
                Err(e) => assert!(matches!(e, DomainError::FanInClosed)),
            }
        }
        assert_eq!(stats.navigations_applied, accepted);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let fan_in = fan_in_with(Arc::new(PassthroughExtractor));
        let tab = fan_in.attach_tab(TabId::new("main"), None).await.unwrap();
        fan_in.shutdown().await;

        let err = tab.on_navigate(page("https://x.example/6", json!([]))).await.unwrap_err();
        assert!(matches!(err, DomainError::FanInClosed));
    }
}
