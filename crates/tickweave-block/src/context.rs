//! Execution context passed to update blocks during a tick.

use tickweave_core::{BlockError, BlockId, Cycle, SignalAccess, SignalId};

/// Execution context passed to each block's [`Behavior`](crate::Behavior).
///
/// Uses dynamic dispatch (`&mut dyn SignalAccess`) so that the block
/// behavior stays object-safe and can run against mock state in tests.
/// Reads observe every write made earlier in the same cycle.
pub struct BlockContext<'a> {
    state: &'a mut dyn SignalAccess,
    block: BlockId,
    cycle: Cycle,
}

impl<'a> BlockContext<'a> {
    /// Construct a new block context.
    ///
    /// Typically called by the generated tick procedure, not by blocks.
    pub fn new(state: &'a mut dyn SignalAccess, block: BlockId, cycle: Cycle) -> Self {
        Self {
            state,
            block,
            cycle,
        }
    }

    /// Read the current value of a signal.
    pub fn read(&self, signal: SignalId) -> Result<u64, BlockError> {
        self.state
            .read(signal)
            .ok_or(BlockError::UnknownSignal { signal })
    }

    /// Write a signal. The value becomes visible to every signal in its net.
    pub fn write(&mut self, signal: SignalId, value: u64) -> Result<(), BlockError> {
        self.state.write(signal, value)
    }

    /// Id of the block being executed.
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Cycle currently being evaluated.
    pub fn cycle(&self) -> Cycle {
        self.cycle
    }
}
