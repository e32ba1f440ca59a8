//! Core abstraction traits for signal access while a tick executes.

use crate::error::BlockError;
use crate::id::SignalId;

/// Read access to signal values.
///
/// Values are raw 64-bit patterns; their interpretation belongs to the
/// datatype layer, not to the scheduling core. Signals in the same net
/// read the same value.
pub trait SignalReader {
    /// Read the current value of a signal.
    ///
    /// Returns `None` if the signal is unknown to this store.
    fn read(&self, signal: SignalId) -> Option<u64>;
}

/// Write access to signal values.
///
/// Implemented by the simulator's signal store and by test mocks.
pub trait SignalWriter {
    /// Overwrite the value of a signal (and so of its whole net).
    fn write(&mut self, signal: SignalId, value: u64) -> Result<(), BlockError>;
}

/// Combined read/write access, as handed to an update block.
///
/// Blanket-implemented for every type that is both a [`SignalReader`]
/// and a [`SignalWriter`].
pub trait SignalAccess: SignalReader + SignalWriter {}

impl<T: SignalReader + SignalWriter + ?Sized> SignalAccess for T {}
