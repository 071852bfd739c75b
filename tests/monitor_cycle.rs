use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use listing_monitor::{
    CycleOutcome, EventHandler, Extractor, FetchError, FetchedPage, Fetcher, Listing, ListingId,
    Monitor, MonitorConfig, MonitorEvent, MonitorTiming, Notifier, NotifyError, ProxyEndpoint,
    ProxyPool, SeenStore,
};
use tempfile::TempDir;
use url::Url;

/// Replays a fixed script of responses; runs dry with a transport error.
#[derive(Default)]
struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<FetchedPage, FetchError>>>,
    proxies_used: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn with(responses: Vec<Result<FetchedPage, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(responses.into()),
            proxies_used: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.proxies_used.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &Url, proxy: &ProxyEndpoint) -> Result<FetchedPage, FetchError> {
        self.proxies_used.lock().unwrap().push(proxy.as_str().to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transport("script exhausted".into())))
    }
}

fn page(status: u16, ids: &str) -> Result<FetchedPage, FetchError> {
    Ok(FetchedPage {
        status,
        body: ids.to_string(),
    })
}

/// Reads a comma separated id list as the newest-first feed.
struct CsvExtractor;

impl Extractor for CsvExtractor {
    fn extract(&self, body: &str) -> Vec<Listing> {
        body.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Listing::new(id, format!("https://market.example/items/{id}-thing")))
            .collect()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl RecordingNotifier {
    fn failing_on(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failing: ids.iter().map(|id| id.to_string()).collect(),
        })
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, listing: &Listing) -> Result<(), NotifyError> {
        let id = listing.id.to_string();
        self.sent.lock().unwrap().push(id.clone());
        if self.failing.contains(&id) {
            return Err(NotifyError::Status {
                status: 500,
                body: "webhook down".into(),
            });
        }
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    fetcher: Arc<ScriptedFetcher>,
    notifier: Arc<RecordingNotifier>,
    monitor: Monitor,
}

impl Harness {
    fn new(
        responses: Vec<Result<FetchedPage, FetchError>>,
        proxies: &str,
        seen: &[&str],
        failing: &[&str],
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("seen_items.json");
        let mut store = SeenStore::new(&store_path);
        for id in seen {
            store.insert(ListingId::from(*id));
        }

        let config = MonitorConfig::new(Url::parse("https://market.example/catalog").unwrap())
            .with_proxy_source(dir.path().join("proxies.txt"))
            .with_seen_store(&store_path)
            .with_timing(MonitorTiming::immediate());

        let fetcher = ScriptedFetcher::with(responses);
        let notifier = RecordingNotifier::failing_on(failing);
        let monitor = Monitor::builder(config)
            .with_proxy_pool(ProxyPool::parse(proxies))
            .with_seen_store(store)
            .with_fetcher(fetcher.clone())
            .with_extractor(Arc::new(CsvExtractor))
            .with_notifier(notifier.clone())
            .build();

        Self {
            dir,
            fetcher,
            notifier,
            monitor,
        }
    }

    fn store_path(&self) -> std::path::PathBuf {
        self.dir.path().join("seen_items.json")
    }

    fn persisted(&self) -> SeenStore {
        SeenStore::load(self.store_path())
    }
}

const PROXIES: &str = "1.1.1.1:8080:alice:secret\n2.2.2.2:8080:bob:secret\n";

fn contains(store: &SeenStore, id: &str) -> bool {
    store.contains(&ListingId::from(id))
}

#[tokio::test]
async fn initial_sync_records_baseline_without_notifying() {
    let mut h = Harness::new(vec![page(200, "5,4,3")], PROXIES, &["3"], &[]);

    let report = h.monitor.initial_sync().await;

    assert_eq!(report.scanned, 3);
    assert_eq!(report.added, 2);
    assert!(h.notifier.sent().is_empty());
    let persisted = h.persisted();
    assert_eq!(persisted.len(), 3);
    assert!(contains(&persisted, "5") && contains(&persisted, "4"));
}

#[tokio::test]
async fn initial_sync_retries_through_failures_and_empty_pages() {
    let mut h = Harness::new(
        vec![
            Err(FetchError::Timeout),
            page(503, ""),
            page(200, ""),
            page(200, "2,1"),
        ],
        PROXIES,
        &[],
        &[],
    );

    let report = h.monitor.initial_sync().await;

    assert_eq!(report.scanned, 2);
    assert_eq!(h.fetcher.calls(), 4);
    assert!(Path::new(&h.store_path()).exists());
}

#[tokio::test]
async fn poll_detects_items_up_to_first_seen_id() {
    let mut h = Harness::new(vec![page(200, "a,b,c,d")], PROXIES, &["c"], &[]);

    let outcome = h.monitor.poll_once().await;

    assert_eq!(outcome, CycleOutcome::Drops { found: 2, scanned: 4 });
    assert_eq!(h.notifier.sent(), vec!["a", "b"]);
    let store = h.monitor.store();
    assert!(contains(store, "a") && contains(store, "b"));
    assert!(!contains(store, "d"));
}

#[tokio::test]
async fn all_unseen_items_become_seen() {
    let mut h = Harness::new(vec![page(200, "9,8,7")], PROXIES, &[], &[]);

    h.monitor.poll_once().await;

    assert_eq!(h.notifier.sent(), vec!["9", "8", "7"]);
    let persisted = h.persisted();
    for id in ["9", "8", "7"] {
        assert!(contains(&persisted, id));
    }
}

#[tokio::test]
async fn repeated_cycles_never_report_an_id_twice() {
    let mut h = Harness::new(
        vec![page(200, "2,1"), page(200, "3,2,1"), page(200, "3,2,1")],
        PROXIES,
        &[],
        &[],
    );

    assert_eq!(
        h.monitor.poll_once().await,
        CycleOutcome::Drops { found: 2, scanned: 2 }
    );
    assert_eq!(
        h.monitor.poll_once().await,
        CycleOutcome::Drops { found: 1, scanned: 3 }
    );
    assert_eq!(h.monitor.poll_once().await, CycleOutcome::Idle { scanned: 3 });
    assert_eq!(h.notifier.sent(), vec!["2", "1", "3"]);
}

#[tokio::test]
async fn failed_notification_still_marks_item_seen() {
    let mut h = Harness::new(vec![page(200, "x,y")], PROXIES, &[], &["x"]);

    let outcome = h.monitor.poll_once().await;

    assert_eq!(outcome, CycleOutcome::Drops { found: 2, scanned: 2 });
    assert_eq!(h.notifier.sent(), vec!["x", "y"]);
    assert!(contains(&h.persisted(), "x"));
    assert_eq!(h.monitor.metrics().snapshot().notification_failures, 1);
}

#[tokio::test]
async fn block_status_keeps_pool_and_store_untouched() {
    for status in [401u16, 403, 429] {
        let mut h = Harness::new(vec![page(status, "n,o")], PROXIES, &["o"], &[]);

        let outcome = h.monitor.poll_once().await;

        assert_eq!(outcome, CycleOutcome::Blocked(status));
        assert_eq!(h.monitor.proxies().len(), 2);
        assert_eq!(h.monitor.store().len(), 1);
        assert!(h.notifier.sent().is_empty());
    }
}

#[tokio::test]
async fn other_statuses_are_reported_as_unexpected() {
    let mut h = Harness::new(vec![page(500, "a")], PROXIES, &[], &[]);
    assert_eq!(h.monitor.poll_once().await, CycleOutcome::UnexpectedStatus(500));
    assert!(h.monitor.store().is_empty());
}

#[tokio::test]
async fn empty_pool_skips_the_fetch() {
    let mut h = Harness::new(vec![page(200, "a")], "", &[], &[]);

    for _ in 0..3 {
        assert_eq!(h.monitor.poll_once().await, CycleOutcome::NoProxy);
    }
    assert_eq!(h.fetcher.calls(), 0);
    assert_eq!(h.monitor.metrics().snapshot().proxy_starvation, 3);
}

#[tokio::test]
async fn empty_pool_picks_up_proxies_added_to_the_source_file() {
    let mut h = Harness::new(vec![page(200, "a")], "", &[], &[]);
    assert_eq!(h.monitor.poll_once().await, CycleOutcome::NoProxy);

    std::fs::write(h.dir.path().join("proxies.txt"), PROXIES).unwrap();

    assert_eq!(
        h.monitor.poll_once().await,
        CycleOutcome::Drops { found: 1, scanned: 1 }
    );
}

#[tokio::test]
async fn transport_failure_and_empty_page_do_not_touch_the_store() {
    let mut h = Harness::new(
        vec![Err(FetchError::Connect("refused".into())), page(200, "")],
        PROXIES,
        &[],
        &[],
    );

    assert!(matches!(
        h.monitor.poll_once().await,
        CycleOutcome::TransportFailed(_)
    ));
    assert_eq!(h.monitor.poll_once().await, CycleOutcome::EmptyPage);
    assert!(h.monitor.store().is_empty());
    assert!(!h.store_path().exists());

    let stats = h.monitor.metrics().snapshot();
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.fetch_failures, 1);
    assert_eq!(stats.empty_pages, 1);
}

#[tokio::test]
async fn fetches_go_through_pool_proxies() {
    let mut h = Harness::new(
        vec![page(200, "1"), page(200, "2"), page(200, "3")],
        PROXIES,
        &[],
        &[],
    );
    for _ in 0..3 {
        h.monitor.poll_once().await;
    }

    let known: Vec<String> = h
        .monitor
        .proxies()
        .endpoints()
        .iter()
        .map(|endpoint| endpoint.as_str().to_string())
        .collect();
    for used in h.fetcher.proxies_used.lock().unwrap().iter() {
        assert!(known.contains(used));
    }
}

/// Fills the proxy source file the first time the pool comes up empty.
struct RestockOnStarvation {
    path: PathBuf,
    starved: Mutex<usize>,
}

impl EventHandler for RestockOnStarvation {
    fn handle(&self, event: &MonitorEvent) {
        if matches!(event, MonitorEvent::NoProxy) {
            let mut starved = self.starved.lock().unwrap();
            *starved += 1;
            if *starved == 1 {
                std::fs::write(&self.path, PROXIES).unwrap();
            }
        }
    }
}

#[tokio::test]
async fn initial_sync_waits_for_proxies_to_appear() {
    let dir = tempfile::tempdir().unwrap();
    let proxy_path = dir.path().join("proxies.txt");
    let store_path = dir.path().join("seen_items.json");
    let restock = Arc::new(RestockOnStarvation {
        path: proxy_path.clone(),
        starved: Mutex::new(0),
    });

    let config = MonitorConfig::new(Url::parse("https://market.example/catalog").unwrap())
        .with_proxy_source(&proxy_path)
        .with_seen_store(&store_path)
        .with_timing(MonitorTiming::immediate());
    let fetcher = ScriptedFetcher::with(vec![page(200, "6,5")]);
    let notifier = RecordingNotifier::failing_on(&[]);
    let mut monitor = Monitor::builder(config)
        .with_proxy_pool(ProxyPool::default())
        .with_seen_store(SeenStore::new(&store_path))
        .with_fetcher(fetcher.clone())
        .with_extractor(Arc::new(CsvExtractor))
        .with_notifier(notifier.clone())
        .with_event_handler(restock.clone())
        .build();

    let report = monitor.initial_sync().await;

    assert_eq!(report.added, 2);
    assert_eq!(*restock.starved.lock().unwrap(), 1);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(monitor.proxies().len(), 2);
    assert_eq!(monitor.metrics().snapshot().proxy_starvation, 1);
    assert!(notifier.sent().is_empty());
    assert!(SeenStore::load(&store_path).contains(&ListingId::from("6")));
}

#[tokio::test]
async fn failed_store_save_does_not_stop_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the store's parent directory should be.
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();
    let store_path = blocker.join("seen_items.json");

    let config = MonitorConfig::new(Url::parse("https://market.example/catalog").unwrap())
        .with_proxy_source(dir.path().join("proxies.txt"))
        .with_seen_store(&store_path)
        .with_timing(MonitorTiming::immediate());
    let fetcher = ScriptedFetcher::with(vec![page(200, "b,a"), page(200, "b,a")]);
    let notifier = RecordingNotifier::failing_on(&[]);
    let mut monitor = Monitor::builder(config)
        .with_proxy_pool(ProxyPool::parse(PROXIES))
        .with_seen_store(SeenStore::new(&store_path))
        .with_fetcher(fetcher)
        .with_extractor(Arc::new(CsvExtractor))
        .with_notifier(notifier.clone())
        .build();

    assert_eq!(
        monitor.poll_once().await,
        CycleOutcome::Drops { found: 2, scanned: 2 }
    );
    let stats = monitor.metrics().snapshot();
    assert_eq!(stats.store_failures, 1);
    assert_eq!(stats.store_saves, 0);
    assert!(contains(monitor.store(), "a") && contains(monitor.store(), "b"));

    assert_eq!(monitor.poll_once().await, CycleOutcome::Idle { scanned: 2 });
    assert_eq!(notifier.sent(), vec!["b", "a"]);
}
