//! Core types and traits for the Tickweave scheduling core.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the shared-state universe used throughout the workspace: typed ids,
//! signal definitions, the [`SignalTable`], the [`SignalSet`] bitset,
//! runtime error types, and the state-access traits update blocks run
//! against.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod signal;
pub mod traits;

pub use error::{BlockError, SignalError, StepError};
pub use id::{BlockId, ComponentId, Constraint, Cycle, NetId, SignalId};
pub use signal::{SignalDef, SignalKind, SignalSet, SignalSetIter, SignalTable};
pub use traits::{SignalAccess, SignalReader, SignalWriter};
