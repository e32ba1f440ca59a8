//! Test utilities and mock types for Tickweave development.
//!
//! Provides a mock implementation of the signal-access traits
//! ([`SignalReader`], [`SignalWriter`]) and reusable block and design
//! fixtures in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::HashMap;

use tickweave_core::{BlockError, SignalId, SignalReader, SignalWriter};

/// Mock signal state backed by a `HashMap<SignalId, u64>`.
///
/// Every signal is independent (no nets). Reads of signals never set or
/// declared return `None`. Pre-populate with
/// [`set`](MockSignalState::set), inspect with
/// [`get`](MockSignalState::get).
#[derive(Clone, Debug, Default)]
pub struct MockSignalState {
    values: HashMap<SignalId, u64>,
    writes: usize,
}

impl MockSignalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `signals`, all starting at zero.
    pub fn with_signals(signals: impl IntoIterator<Item = SignalId>) -> Self {
        Self {
            values: signals.into_iter().map(|s| (s, 0)).collect(),
            writes: 0,
        }
    }

    /// Pre-populate a signal.
    pub fn set(&mut self, signal: SignalId, value: u64) {
        self.values.insert(signal, value);
    }

    /// Current value of a signal.
    pub fn get(&self, signal: SignalId) -> Option<u64> {
        self.values.get(&signal).copied()
    }

    /// Number of successful writes made through [`SignalWriter`].
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl SignalReader for MockSignalState {
    fn read(&self, signal: SignalId) -> Option<u64> {
        self.get(signal)
    }
}

impl SignalWriter for MockSignalState {
    fn write(&mut self, signal: SignalId, value: u64) -> Result<(), BlockError> {
        let slot = self
            .values
            .get_mut(&signal)
            .ok_or(BlockError::UnknownSignal { signal })?;
        *slot = value;
        self.writes += 1;
        Ok(())
    }
}
