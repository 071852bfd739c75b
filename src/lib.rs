//! # listing-monitor
//!
//! Watches a marketplace search page and reports listings it has not seen
//! before.
//!
//! ## Features
//!
//! - Random proxy selection per request from a plain-text proxy list
//! - Newest-first drop detection with early exit on the first known item
//! - Seen ids persisted to a capped JSON file that survives restarts
//! - Webhook notifications, isolated from the detection path
//!
//! ## Example
//!
//! ```no_run
//! use listing_monitor::{Monitor, MonitorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::from_env()?;
//!     let mut monitor = Monitor::builder(config).build();
//!     monitor.run().await;
//!     Ok(())
//! }
//! ```

mod monitor;

pub mod config;
pub mod detection;
pub mod listing;
pub mod modules;

pub use crate::monitor::{
    BLOCK_STATUSES,
    CycleOutcome,
    Monitor,
    MonitorBuilder,
    SyncReport,
};

pub use crate::config::{ConfigError, MonitorConfig, MonitorTiming};

pub use crate::detection::new_listings;

pub use crate::listing::{
    Extractor,
    FetchError,
    FetchedPage,
    Fetcher,
    HtmlListingExtractor,
    Listing,
    ListingId,
    NoopNotifier,
    Notifier,
    NotifyError,
    ReqwestFetcher,
    WebhookNotifier,
};

pub use crate::modules::{
    EventDispatcher,
    EventHandler,
    MetricsCollector,
    MonitorEvent,
    MonitorStats,
    ProxyEndpoint,
    ProxyPool,
    SEEN_CAP,
    SeenStore,
    StoreError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
