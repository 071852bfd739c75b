//! Detection engine.
//!
//! Owns the proxy pool, the seen store and the collaborators, and drives the
//! monitor through a one-off baseline sync followed by an endless poll loop.
//! Every step runs sequentially on the calling task; steady-state failures are
//! turned into a [`CycleOutcome`] and a backoff, never into an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::config::{MonitorConfig, MonitorTiming};
use crate::detection::new_listings;
use crate::listing::{
	Extractor, FetchedPage, Fetcher, HtmlListingExtractor, NoopNotifier, Notifier,
	ReqwestFetcher, WebhookNotifier,
};
use crate::modules::events::{
	DropEvent, EventDispatcher, EventHandler, LoggingHandler, MetricsHandler, MonitorEvent,
	ResponseEvent,
};
use crate::modules::metrics::MetricsCollector;
use crate::modules::proxy::ProxyPool;
use crate::modules::state::SeenStore;

/// Status codes read as "the site is blocking or throttling us".
pub const BLOCK_STATUSES: [u16; 3] = [401, 403, 429];

/// What a single poll iteration ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
	/// The proxy pool had nothing to hand out.
	NoProxy,
	/// The fetch failed below HTTP (timeout, refused connection...).
	TransportFailed(String),
	/// 401, 403 or 429.
	Blocked(u16),
	UnexpectedStatus(u16),
	/// 200 but the extractor found no listings.
	EmptyPage,
	Idle { scanned: usize },
	Drops { found: usize, scanned: usize },
}

impl CycleOutcome {
	/// How long to wait before the next iteration.
	pub fn backoff(&self, timing: &MonitorTiming) -> Duration {
		match self {
			CycleOutcome::NoProxy => timing.no_proxy_backoff,
			_ => timing.poll_interval,
		}
	}
}

/// Result of the baseline sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
	pub scanned: usize,
	pub added: usize,
}

enum FetchAttempt {
	NoProxy,
	Failed(String),
	Page(FetchedPage),
}

/// Fluent builder for [`Monitor`].
pub struct MonitorBuilder {
	config: MonitorConfig,
	proxies: Option<ProxyPool>,
	store: Option<SeenStore>,
	fetcher: Option<Arc<dyn Fetcher>>,
	extractor: Option<Arc<dyn Extractor>>,
	notifier: Option<Arc<dyn Notifier>>,
	handlers: Vec<Arc<dyn EventHandler>>,
}

impl MonitorBuilder {
	pub fn new(config: MonitorConfig) -> Self {
		Self {
			config,
			proxies: None,
			store: None,
			fetcher: None,
			extractor: None,
			notifier: None,
			handlers: Vec::new(),
		}
	}

	pub fn with_proxy_pool(mut self, pool: ProxyPool) -> Self {
		self.proxies = Some(pool);
		self
	}

	pub fn with_seen_store(mut self, store: SeenStore) -> Self {
		self.store = Some(store);
		self
	}

	pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
		self.fetcher = Some(fetcher);
		self
	}

	pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
		self.extractor = Some(extractor);
		self
	}

	pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = Some(notifier);
		self
	}

	pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
		self.handlers.push(handler);
		self
	}

	/// Fill anything not supplied from the configuration: proxies and seen ids
	/// are read from their files, and the HTTP, HTML and webhook
	/// implementations are used for the collaborators.
	pub fn build(self) -> Monitor {
		let config = self.config;

		let proxies = self
			.proxies
			.unwrap_or_else(|| ProxyPool::load(&config.proxy_source_path));
		let store = self
			.store
			.unwrap_or_else(|| SeenStore::load(config.seen_store_path.clone()));
		let fetcher = self
			.fetcher
			.unwrap_or_else(|| Arc::new(ReqwestFetcher::new(config.request_timeout)));
		let extractor = self
			.extractor
			.unwrap_or_else(|| Arc::new(HtmlListingExtractor::new(config.target_url.clone())));
		let notifier: Arc<dyn Notifier> = match self.notifier {
			Some(notifier) => notifier,
			None => match &config.notification_endpoint {
				Some(endpoint) => Arc::new(WebhookNotifier::new(endpoint.clone())),
				None => Arc::new(NoopNotifier),
			},
		};

		let metrics = MetricsCollector::new();
		let mut events = EventDispatcher::new();
		events.register_handler(Arc::new(LoggingHandler));
		events.register_handler(Arc::new(MetricsHandler::new(metrics.clone())));
		for handler in self.handlers {
			events.register_handler(handler);
		}

		Monitor {
			config,
			proxies,
			store,
			fetcher,
			extractor,
			notifier,
			metrics,
			events,
		}
	}
}

/// The poll-cycle state machine.
pub struct Monitor {
	config: MonitorConfig,
	proxies: ProxyPool,
	store: SeenStore,
	fetcher: Arc<dyn Fetcher>,
	extractor: Arc<dyn Extractor>,
	notifier: Arc<dyn Notifier>,
	metrics: MetricsCollector,
	events: EventDispatcher,
}

impl Monitor {
	pub fn builder(config: MonitorConfig) -> MonitorBuilder {
		MonitorBuilder::new(config)
	}

	pub fn config(&self) -> &MonitorConfig {
		&self.config
	}

	pub fn store(&self) -> &SeenStore {
		&self.store
	}

	pub fn proxies(&self) -> &ProxyPool {
		&self.proxies
	}

	pub fn metrics(&self) -> &MetricsCollector {
		&self.metrics
	}

	pub fn notifications_enabled(&self) -> bool {
		self.notifier.is_enabled()
	}

	/// Announce, sync once, then poll forever.
	pub async fn run(&mut self) {
		if self.notifier.is_enabled()
			&& let Err(err) = self.notifier.announce("**Monitor Online**").await
		{
			log::debug!("startup announcement failed: {err}");
		}

		self.initial_sync().await;

		loop {
			let outcome = self.poll_once().await;
			pause(outcome.backoff(&self.config.timing)).await;
		}
	}

	/// Record every currently listed id as seen without notifying.
	///
	/// Retries until a proxy is available, the page answers 200 and the
	/// extractor returns at least one listing; an empty page is treated as a
	/// glitch, not as an empty feed.
	pub async fn initial_sync(&mut self) -> SyncReport {
		log::info!("syncing current listings");
		let timing = self.config.timing;

		loop {
			let page = match self.fetch_page().await {
				FetchAttempt::NoProxy => {
					pause(timing.no_proxy_backoff).await;
					continue;
				}
				FetchAttempt::Failed(_) => {
					pause(timing.retry_backoff).await;
					continue;
				}
				FetchAttempt::Page(page) => page,
			};

			if page.status != 200 {
				log::warn!("initial scan failed ({}), retrying", page.status);
				pause(timing.retry_backoff).await;
				continue;
			}

			let listings = self.extractor.extract(&page.body);
			if listings.is_empty() {
				self.events.dispatch(MonitorEvent::EmptyPage);
				pause(timing.retry_backoff).await;
				continue;
			}

			let added = listings
				.iter()
				.filter(|listing| self.store.insert(listing.id.clone()))
				.count();
			self.persist();

			let report = SyncReport {
				scanned: listings.len(),
				added,
			};
			self.events.dispatch(MonitorEvent::Synced {
				scanned: report.scanned,
				added: report.added,
			});
			return report;
		}
	}

	/// One poll iteration, without the trailing sleep.
	pub async fn poll_once(&mut self) -> CycleOutcome {
		self.metrics.record_cycle();

		let page = match self.fetch_page().await {
			FetchAttempt::NoProxy => return CycleOutcome::NoProxy,
			FetchAttempt::Failed(err) => return CycleOutcome::TransportFailed(err),
			FetchAttempt::Page(page) => page,
		};

		match page.status {
			200 => {}
			status if BLOCK_STATUSES.contains(&status) => {
				// No proxy is excluded here; the next cycle simply draws again.
				self.events.dispatch(MonitorEvent::Blocked { status });
				return CycleOutcome::Blocked(status);
			}
			status => {
				self.events.dispatch(MonitorEvent::UnexpectedStatus { status });
				return CycleOutcome::UnexpectedStatus(status);
			}
		}

		let listings = self.extractor.extract(&page.body);
		if listings.is_empty() {
			self.events.dispatch(MonitorEvent::EmptyPage);
			return CycleOutcome::EmptyPage;
		}

		let scanned = listings.len();
		let fresh = new_listings(&listings, |id| self.store.contains(id));
		if fresh.is_empty() {
			self.events.dispatch(MonitorEvent::Idle { scanned });
			return CycleOutcome::Idle { scanned };
		}

		let found = fresh.len();
		self.events.dispatch(MonitorEvent::DropsFound { count: found });

		for listing in fresh {
			self.events.dispatch(MonitorEvent::Drop(DropEvent {
				id: listing.id.to_string(),
				summary: listing.summary(),
				url: listing.url.clone(),
				timestamp: chrono::Utc::now(),
			}));

			if let Err(err) = self.notifier.notify(listing).await {
				self.events.dispatch(MonitorEvent::NotificationFailed {
					id: listing.id.to_string(),
					error: err.to_string(),
				});
			}
			self.store.insert(listing.id.clone());
			pause(self.config.timing.dispatch_delay).await;
		}

		self.persist();
		log::info!("{}", self.metrics.snapshot().summary());
		CycleOutcome::Drops { found, scanned }
	}

	/// Write the seen store to disk. A failed save is reported as an event and
	/// otherwise ignored; the in-memory set stays authoritative.
	fn persist(&self) {
		match self.store.save() {
			Ok(persisted) => self.events.dispatch(MonitorEvent::StoreSaved { persisted }),
			Err(err) => self.events.dispatch(MonitorEvent::StoreSaveFailed {
				error: err.to_string(),
			}),
		}
	}

	async fn fetch_page(&mut self) -> FetchAttempt {
		self.proxies
			.reload_if_empty(&self.config.proxy_source_path);

		let Some(proxy) = self.proxies.acquire().cloned() else {
			self.events.dispatch(MonitorEvent::NoProxy);
			return FetchAttempt::NoProxy;
		};

		let started = Instant::now();
		match self.fetcher.fetch(&self.config.target_url, &proxy).await {
			Ok(page) => {
				self.events.dispatch(MonitorEvent::Response(ResponseEvent {
					status: page.status,
					latency: started.elapsed(),
					proxy: proxy.to_string(),
					timestamp: chrono::Utc::now(),
				}));
				FetchAttempt::Page(page)
			}
			Err(err) => {
				let error = err.to_string();
				self.events.dispatch(MonitorEvent::FetchFailed {
					proxy: proxy.to_string(),
					error: error.clone(),
				});
				FetchAttempt::Failed(error)
			}
		}
	}
}

async fn pause(duration: Duration) {
	if duration > Duration::ZERO {
		sleep(duration).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_depends_on_outcome() {
		let timing = MonitorTiming::default();
		assert_eq!(CycleOutcome::NoProxy.backoff(&timing), Duration::from_secs(10));
		assert_eq!(CycleOutcome::Blocked(429).backoff(&timing), Duration::from_secs(15));
		assert_eq!(
			CycleOutcome::TransportFailed("timeout".into()).backoff(&timing),
			Duration::from_secs(15)
		);
		assert_eq!(
			CycleOutcome::Drops { found: 1, scanned: 10 }.backoff(&timing),
			Duration::from_secs(15)
		);
	}
}
