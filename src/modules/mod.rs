//! Cross-cutting services module
//!
//! Proxy selection, seen-id persistence, events and counters used by the
//! detection engine.

pub mod events;
pub mod metrics;
pub mod proxy;
pub mod state;

// Re-export commonly used types
pub use events::{
    DropEvent, EventDispatcher, EventHandler, LoggingHandler, MetricsHandler, MonitorEvent,
    ResponseEvent,
};
pub use metrics::{MetricsCollector, MonitorStats};
pub use proxy::{ProxyEndpoint, ProxyParseError, ProxyPool};
pub use state::{SEEN_CAP, SeenStore, StoreError};
