//! Component hierarchy, update-block registry and explicit constraints.
//!
//! A [`Hierarchy`] is an arena of component nodes. Each node owns its
//! update blocks (unique by name within the node), its locally declared
//! ordering constraints, and its children. The flattened
//! [`Aggregate`] view is what the rest of the elaboration pipeline
//! consumes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod hierarchy;

pub use hierarchy::{Aggregate, Component, Hierarchy, RegistryError};
