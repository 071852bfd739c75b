//! Runtime configuration.
//!
//! Provides the monitor settings with:
//! - Environment / `.env` loading
//! - Builder-style overrides
//! - Poll timing knobs

pub mod settings;

pub use settings::{ConfigError, MonitorConfig, MonitorTiming};
