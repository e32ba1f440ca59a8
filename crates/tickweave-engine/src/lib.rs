//! Elaboration driver, tick generation and simulator for Tickweave.
//!
//! [`elaborate`] takes a [`Design`] through dependency extraction, net
//! resolution and scheduling. [`generate_tick`] compiles the resulting
//! schedule into a [`TickFn`], and [`Simulator`] ties both to a
//! net-indexed [`SignalStore`] that blocks read and write while a cycle
//! executes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod elaborate;
pub mod metrics;
pub mod sim;
pub mod store;
pub mod tick;

pub use config::{ConfigError, SimConfig, TickMode};
pub use elaborate::{elaborate, Design, Elaboration, ElaborationError};
pub use metrics::{ElaborationMetrics, TickMetrics};
pub use sim::Simulator;
pub use store::SignalStore;
pub use tick::{generate_tick, BlockSource, GenerateError, TickFn};
