//! Job orchestration.
//!
//! This module provides the controller state machine and the declarative
//! topology table it consumes.
//!
//! # Architecture
//!
//! ```text
//! ingestion trigger ──► Controller ──StartJob──► worker1 ─┐
//!                          │       └─StartJob──► worker2 ─┤ JobProgress /
//!                          │                              │ JobCompleted
//!                          ◄──────────────────────────────┘
//!                          │ (worker2 completed)
//!                          └─StartJob──► worker3
//! ```
//!
//! # Example
//!
//! ```ignore
//! use relay_core::orchestrator::{Controller, Topology};
//!
//! let controller = Controller::new(Topology::parallel(), bus, store, clock);
//! let report = controller.handle_batch(&raw_event);
//! println!("handled {} records", report.handled);
//! ```

mod controller;
mod errors;
mod topology;

pub use controller::{Action, Controller, Decision, Dispatch};
pub use errors::{ControllerError, TopologyError};
pub use topology::{default_stage_args, GatePolicy, StageSpec, Topology, TopologyPreset};
