//! Configuration management.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use relay_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/relay.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Topic: {}", config.settings().bus.topic);
//!
//! config.settings_mut().store.tolerate_errors = true;
//! config.update_section(ConfigSection::Store).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    BusSettings, ConfigSection, LoggingSettings, PathSettings, Settings, StoreSettings,
    TopologySettings, TransformSettings,
};
