//! Error types shared across the Tickweave workspace.
//!
//! Elaboration-time errors (registry, extraction, nets, scheduling,
//! generation) live next to the stage that raises them. This module
//! holds the signal-table errors and the run-time errors raised while
//! a compiled tick executes.

use std::error::Error;
use std::fmt;

use crate::id::{BlockId, SignalId};

/// Errors from declaring signals in a [`SignalTable`](crate::SignalTable).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignalError {
    /// A signal with this path was already declared.
    DuplicatePath {
        /// The contested path.
        path: String,
    },
    /// The referenced signal does not exist.
    UnknownSignal {
        /// The missing signal.
        signal: SignalId,
    },
    /// More than `u32::MAX` signals were declared.
    TableFull,
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicatePath { path } => write!(f, "signal '{path}' declared twice"),
            Self::UnknownSignal { signal } => write!(f, "unknown signal {signal}"),
            Self::TableFull => write!(f, "signal table exceeds u32::MAX entries"),
        }
    }
}

impl Error for SignalError {}

/// Errors returned by an update block's behavior during a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockError {
    /// The block's behavior failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The block touched a signal the state store does not know.
    UnknownSignal {
        /// The offending signal.
        signal: SignalId,
    },
    /// The block wrote a signal whose net is driven by a constant.
    ConstWrite {
        /// The signal that was written.
        signal: SignalId,
    },
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::UnknownSignal { signal } => write!(f, "unknown signal {signal}"),
            Self::ConstWrite { signal } => write!(f, "write to constant-driven signal {signal}"),
        }
    }
}

impl Error for BlockError {}

/// Errors from advancing the simulation by one cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepError {
    /// An update block returned an error; the cycle did not complete.
    BlockFailed {
        /// Id of the failing block.
        block: BlockId,
        /// Name of the failing block.
        name: String,
        /// The underlying block error.
        reason: BlockError,
    },
    /// A previous cycle failed part-way; the simulation is halted until
    /// it is reset or re-elaborated.
    Halted,
    /// The tick procedure was generated for an older design revision.
    StaleSchedule {
        /// Revision the tick procedure was generated from.
        generated: u64,
        /// Current design revision.
        current: u64,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockFailed {
                block,
                name,
                reason,
            } => {
                write!(f, "update block '{name}' (#{block}) failed: {reason}")
            }
            Self::Halted => write!(f, "simulation halted after a failed cycle"),
            Self::StaleSchedule { generated, current } => write!(
                f,
                "tick generated for revision {generated} but the design is at revision {current}"
            ),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::BlockFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
