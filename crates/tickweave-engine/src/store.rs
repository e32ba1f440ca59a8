//! Net-indexed signal value storage.
//!
//! One value slot per net: every member signal reads and writes the same
//! slot, so a write through one port is immediately visible through every
//! signal connected to it.

use tickweave_core::{BlockError, NetId, SignalId, SignalReader, SignalTable, SignalWriter};
use tickweave_net::{Driver, NetMap};

/// Current signal values of an elaborated design.
#[derive(Clone, Debug, Default)]
pub struct SignalStore {
    net_of: Vec<Option<NetId>>,
    const_net: Vec<bool>,
    values: Vec<u64>,
    initial: Vec<u64>,
}

impl SignalStore {
    /// Build a store for `signals` partitioned by `nets`.
    ///
    /// Nets driven by a constant start at that constant and reject writes
    /// through any member; every other net starts at zero.
    pub fn new(signals: &SignalTable, nets: &NetMap) -> Self {
        let net_of: Vec<Option<NetId>> = signals.iter().map(|(id, _)| nets.net_of(id)).collect();
        let mut initial = vec![0; nets.net_count()];
        let mut const_net = vec![false; nets.net_count()];
        for net in nets.nets() {
            if let Some(Driver::Const { value, .. }) = nets.driver(net) {
                initial[net.0 as usize] = value;
                const_net[net.0 as usize] = true;
            }
        }
        Self {
            net_of,
            const_net,
            values: initial.clone(),
            initial,
        }
    }

    /// Number of signals covered.
    pub fn len(&self) -> usize {
        self.net_of.len()
    }

    /// Whether the store covers no signals.
    pub fn is_empty(&self) -> bool {
        self.net_of.is_empty()
    }

    fn slot(&self, signal: SignalId) -> Option<usize> {
        self.net_of
            .get(signal.0 as usize)
            .copied()
            .flatten()
            .map(|n| n.0 as usize)
    }

    /// Restore every net to its initial value.
    pub fn reset(&mut self) {
        self.values.copy_from_slice(&self.initial);
    }

    /// Copy values from a store built for an earlier elaboration.
    ///
    /// Signals are matched by id. Constant nets keep their constant. When
    /// an edit merged several old nets into one, the value of the
    /// lowest-numbered member wins.
    pub fn carry_from(&mut self, prev: &SignalStore) {
        let mut filled = vec![false; self.values.len()];
        for (i, net) in self.net_of.iter().enumerate() {
            let Some(net) = *net else {
                continue;
            };
            let n = net.0 as usize;
            if filled[n] || self.const_net[n] {
                continue;
            }
            if let Some(v) = prev.read(SignalId(i as u32)) {
                self.values[n] = v;
                filled[n] = true;
            }
        }
    }
}

impl SignalReader for SignalStore {
    fn read(&self, signal: SignalId) -> Option<u64> {
        self.slot(signal).map(|n| self.values[n])
    }
}

impl SignalWriter for SignalStore {
    fn write(&mut self, signal: SignalId, value: u64) -> Result<(), BlockError> {
        let n = self.slot(signal).ok_or(BlockError::UnknownSignal { signal })?;
        if self.const_net[n] {
            return Err(BlockError::ConstWrite { signal });
        }
        self.values[n] = value;
        Ok(())
    }
}
