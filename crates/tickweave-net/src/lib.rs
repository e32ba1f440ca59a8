//! Net resolution for the Tickweave scheduling core.
//!
//! Directly-connected signals are merged into nets with a union-find
//! over signal indices. Each net may have at most one driver. Block
//! accesses and dependency pairs are then rewritten from signals to
//! nets, which is the granularity the scheduler works at.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod resolve;
pub mod union_find;

pub use resolve::{
    resolve, Connection, Driver, DriverConflict, NetEdge, NetError, NetMap, ResolveOptions,
};
pub use union_find::UnionFind;
