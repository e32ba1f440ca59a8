//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a signal within a [`SignalTable`](crate::SignalTable).
///
/// Signals are declared by the front end and assigned sequential IDs.
/// `SignalId(n)` corresponds to the n-th declared signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(pub u32);

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SignalId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies an update block.
///
/// Assigned at registration in strictly increasing order, so comparing
/// two `BlockId`s compares their registration order. The scheduler uses
/// this as its deterministic tie-break.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for BlockId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a component node in a hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ComponentId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a net: an equivalence class of directly-connected signals.
///
/// Net ids are only meaningful for the elaboration that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetId(pub u32);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NetId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Monotonically increasing simulated clock cycle counter.
///
/// Incremented once per completed tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cycle(pub u64);

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Cycle {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Explicit ordering constraint: `before` runs earlier than `after` in
/// every cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constraint {
    /// Block that must run first.
    pub before: BlockId,
    /// Block that must run second.
    pub after: BlockId,
}

impl Constraint {
    /// Create a constraint `before < after`.
    pub fn new(before: BlockId, after: BlockId) -> Self {
        Self { before, after }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} < #{}", self.before, self.after)
    }
}
