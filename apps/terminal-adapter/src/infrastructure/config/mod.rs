//! Configuration Module
//!
//! Configuration loading for the adapter service.

mod settings;

pub use settings::{AdapterConfig, ConfigError, ServerSettings, WatchdogSettings};
