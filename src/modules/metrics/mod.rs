//! Monitor counters.
//!
//! Aggregates per-cycle outcomes so operators can tell blocking apart from
//! plain network noise.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Point-in-time copy of the monitor counters.
#[derive(Debug, Clone)]
pub struct MonitorStats {
    pub started_at: DateTime<Utc>,
    pub cycles: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub blocked: u64,
    pub unexpected_status: u64,
    pub empty_pages: u64,
    pub proxy_starvation: u64,
    pub drops: u64,
    pub notification_failures: u64,
    pub store_saves: u64,
    pub store_failures: u64,
    pub last_status: Option<u16>,
    pub average_latency: Option<Duration>,
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            cycles: 0,
            fetches: 0,
            fetch_failures: 0,
            blocked: 0,
            unexpected_status: 0,
            empty_pages: 0,
            proxy_starvation: 0,
            drops: 0,
            notification_failures: 0,
            store_saves: 0,
            store_failures: 0,
            last_status: None,
            average_latency: None,
        }
    }
}

impl MonitorStats {
    /// One-line digest for the log.
    pub fn summary(&self) -> String {
        let latency = self
            .average_latency
            .map(|avg| format!("{}ms", avg.as_millis()))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "stats: cycles={} fetches={} blocked={} transport_failures={} unexpected={} \
             empty_pages={} no_proxy={} drops={} notify_failures={} store_failures={} latency={}",
            self.cycles,
            self.fetches,
            self.blocked,
            self.fetch_failures,
            self.unexpected_status,
            self.empty_pages,
            self.proxy_starvation,
            self.drops,
            self.notification_failures,
            self.store_failures,
            latency,
        )
    }
}

/// Shared counter set fed by the metrics event handler.
#[derive(Clone, Debug, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MonitorStats>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut MonitorStats),
    {
        if let Ok(mut guard) = self.inner.lock() {
            f(&mut guard);
        }
    }

    pub fn record_cycle(&self) {
        self.update(|stats| stats.cycles += 1);
    }

    pub fn record_response(&self, status: u16, latency: Duration) {
        self.update(|stats| {
            stats.fetches += 1;
            stats.last_status = Some(status);
            stats.average_latency = Some(match stats.average_latency {
                Some(avg) => {
                    Duration::from_secs_f64(avg.as_secs_f64() * 0.9 + latency.as_secs_f64() * 0.1)
                }
                None => latency,
            });
            match status {
                200 => {}
                401 | 403 | 429 => stats.blocked += 1,
                _ => stats.unexpected_status += 1,
            }
        });
    }

    pub fn record_fetch_failure(&self) {
        self.update(|stats| {
            stats.fetches += 1;
            stats.fetch_failures += 1;
        });
    }

    pub fn record_empty_page(&self) {
        self.update(|stats| stats.empty_pages += 1);
    }

    pub fn record_proxy_starvation(&self) {
        self.update(|stats| stats.proxy_starvation += 1);
    }

    pub fn record_drop(&self) {
        self.update(|stats| stats.drops += 1);
    }

    pub fn record_notification_failure(&self) {
        self.update(|stats| stats.notification_failures += 1);
    }

    pub fn record_store_save(&self, success: bool) {
        self.update(|stats| {
            if success {
                stats.store_saves += 1;
            } else {
                stats.store_failures += 1;
            }
        });
    }

    pub fn snapshot(&self) -> MonitorStats {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}
