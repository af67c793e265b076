//! Relay Core - multi-stage media transform orchestration
//!
//! This crate contains the controller state machine, the stage worker
//! driver, the progress-rate-limited transform driver and the append-only
//! job event store. Transports and storage sit behind traits so the same
//! logic runs in-process, from a CLI or under an event platform.

pub mod bus;
pub mod config;
pub mod logging;
pub mod messages;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod transform;
pub mod worker;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
