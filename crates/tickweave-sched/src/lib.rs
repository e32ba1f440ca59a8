//! Update-block scheduling for the Tickweave core.
//!
//! Builds the block graph from explicit constraints and inferred
//! writer → reader edges, separates sequential (register) edges from
//! combinational ones, rejects combinational loops, and levelizes the
//! remainder into a deterministic serial order.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod diagnostics;
pub mod graph;
pub mod schedule;

pub use diagnostics::{classify, DfgEdge, EdgeKind, NetReport, ScheduleDiagnostics};
pub use graph::{DiGraph, NodeSet};
pub use schedule::{
    schedule, CycleEdge, CycleReport, InferredEdge, Schedule, ScheduleError, ScheduleInput,
};
