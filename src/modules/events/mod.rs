//! Monitor event system.
//!
//! The engine publishes what happens in each cycle; handlers turn events into
//! log lines and counters.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::metrics::MetricsCollector;

#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub status: u16,
    pub latency: Duration,
    pub proxy: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DropEvent {
    pub id: String,
    pub summary: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum MonitorEvent {
    NoProxy,
    Response(ResponseEvent),
    FetchFailed { proxy: String, error: String },
    Blocked { status: u16 },
    UnexpectedStatus { status: u16 },
    EmptyPage,
    Synced { scanned: usize, added: usize },
    Idle { scanned: usize },
    DropsFound { count: usize },
    Drop(DropEvent),
    NotificationFailed { id: String, error: String },
    StoreSaved { persisted: usize },
    StoreSaveFailed { error: String },
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &MonitorEvent);
}

/// Broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: MonitorEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &MonitorEvent) {
        match event {
            MonitorEvent::NoProxy => {
                log::warn!("no proxies available, add some to the proxy file");
            }
            MonitorEvent::Response(response) => {
                log::debug!(
                    "<- {} via {} ({:.2}s)",
                    response.status,
                    response.proxy,
                    response.latency.as_secs_f64()
                );
            }
            MonitorEvent::FetchFailed { proxy, error } => {
                log::error!("fetch via {proxy} failed: {error}");
            }
            MonitorEvent::Blocked { status } => {
                log::warn!("blocked: status {status}, rotating proxy");
            }
            MonitorEvent::UnexpectedStatus { status } => {
                log::warn!("unexpected status {status}");
            }
            MonitorEvent::EmptyPage => {
                log::warn!("parser returned 0 items");
            }
            MonitorEvent::Synced { scanned, added } => {
                log::info!("synced {scanned} items ({added} new), monitor ready");
            }
            MonitorEvent::Idle { scanned } => {
                log::info!("no new drops (scanned {scanned} items)");
            }
            MonitorEvent::DropsFound { count } => {
                log::info!("{count} drop(s) found");
            }
            MonitorEvent::Drop(drop) => {
                log::info!("  > {} [{}]", drop.summary, drop.id);
            }
            MonitorEvent::NotificationFailed { id, error } => {
                log::warn!("notification for {id} failed: {error}");
            }
            MonitorEvent::StoreSaved { persisted } => {
                log::debug!("seen store saved ({persisted} ids)");
            }
            MonitorEvent::StoreSaveFailed { error } => {
                log::error!("seen store save failed: {error}");
            }
        }
    }
}

/// Feeds the metrics collector.
#[derive(Clone, Debug)]
pub struct MetricsHandler {
    metrics: MetricsCollector,
}

impl MetricsHandler {
    pub fn new(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }
}

impl EventHandler for MetricsHandler {
    fn handle(&self, event: &MonitorEvent) {
        match event {
            MonitorEvent::NoProxy => self.metrics.record_proxy_starvation(),
            MonitorEvent::Response(response) => {
                self.metrics.record_response(response.status, response.latency)
            }
            MonitorEvent::FetchFailed { .. } => self.metrics.record_fetch_failure(),
            MonitorEvent::EmptyPage => self.metrics.record_empty_page(),
            MonitorEvent::Drop(_) => self.metrics.record_drop(),
            MonitorEvent::NotificationFailed { .. } => {
                self.metrics.record_notification_failure()
            }
            MonitorEvent::StoreSaved { .. } => self.metrics.record_store_save(true),
            MonitorEvent::StoreSaveFailed { .. } => self.metrics.record_store_save(false),
            _ => {}
        }
    }
}
