//! Signal definitions, the [`SignalTable`], and the [`SignalSet`] bitset.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::SignalError;
use crate::id::{ComponentId, SignalId};

/// Classification of a signal's role in its owning component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalKind {
    /// Input port, driven from outside the owning component.
    InPort,
    /// Output port, observable from outside the owning component.
    OutPort,
    /// Internal wire.
    Wire,
    /// Constant. Counts as the driver of whatever net it lands in.
    Const(u64),
}

impl SignalKind {
    /// Whether this kind is a port (input or output).
    pub fn is_port(&self) -> bool {
        matches!(self, Self::InPort | Self::OutPort)
    }

    /// The constant value, for [`SignalKind::Const`].
    pub fn const_value(&self) -> Option<u64> {
        match self {
            Self::Const(v) => Some(*v),
            _ => None,
        }
    }
}

/// Definition of a signal declared during elaboration.
///
/// The declared type is opaque to the scheduling core: it is carried
/// only for diagnostics. Element, slice and attribute signals (e.g.
/// `top.mem[3]`, `top.bus.valid`) record the aggregate they belong to
/// in `parent`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalDef {
    /// Full hierarchical path, e.g. `"top.counter.out"`.
    pub path: String,
    /// Port/wire/constant classification.
    pub kind: SignalKind,
    /// Declared datatype name, e.g. `"Bits8"`. Never interpreted.
    pub type_name: String,
    /// Component that owns this signal.
    pub owner: ComponentId,
    /// Aggregate signal this one is an element/slice/field of.
    pub parent: Option<SignalId>,
}

impl SignalDef {
    /// Whether this signal is directly inspectable from outside its
    /// owning component (i.e. it is not part of an aggregate).
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

/// The universe of signals for one design.
///
/// Signals are appended by the front end and never removed; `SignalId(n)`
/// indexes the n-th declaration. Paths are unique.
#[derive(Clone, Debug, Default)]
pub struct SignalTable {
    defs: Vec<SignalDef>,
    by_path: IndexMap<String, SignalId>,
    children: Vec<SmallVec<[SignalId; 4]>>,
}

impl SignalTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a top-level signal owned by `owner`.
    pub fn declare(
        &mut self,
        path: impl Into<String>,
        kind: SignalKind,
        type_name: impl Into<String>,
        owner: ComponentId,
    ) -> Result<SignalId, SignalError> {
        self.insert(SignalDef {
            path: path.into(),
            kind,
            type_name: type_name.into(),
            owner,
            parent: None,
        })
    }

    /// Declare an element, slice or attribute of an existing signal.
    ///
    /// `suffix` is appended verbatim to the parent path (`"[3]"`,
    /// `"[0:4]"`, `".valid"`). The child inherits the parent's kind
    /// and owner.
    pub fn declare_child(
        &mut self,
        parent: SignalId,
        suffix: &str,
        type_name: impl Into<String>,
    ) -> Result<SignalId, SignalError> {
        let parent_def = self
            .get(parent)
            .ok_or(SignalError::UnknownSignal { signal: parent })?;
        let def = SignalDef {
            path: format!("{}{}", parent_def.path, suffix),
            kind: parent_def.kind,
            type_name: type_name.into(),
            owner: parent_def.owner,
            parent: Some(parent),
        };
        self.insert(def)
    }

    fn insert(&mut self, def: SignalDef) -> Result<SignalId, SignalError> {
        if self.by_path.contains_key(&def.path) {
            return Err(SignalError::DuplicatePath { path: def.path });
        }
        let raw = u32::try_from(self.defs.len()).map_err(|_| SignalError::TableFull)?;
        let id = SignalId(raw);
        if let Some(parent) = def.parent {
            self.children[parent.0 as usize].push(id);
        }
        self.by_path.insert(def.path.clone(), id);
        self.defs.push(def);
        self.children.push(SmallVec::new());
        Ok(id)
    }

    /// Look up a signal definition.
    pub fn get(&self, id: SignalId) -> Option<&SignalDef> {
        self.defs.get(id.0 as usize)
    }

    /// Look up a signal by its full path.
    pub fn lookup(&self, path: &str) -> Option<SignalId> {
        self.by_path.get(path).copied()
    }

    /// Path of a signal, or `"<unknown>"` for an out-of-range id.
    pub fn path(&self, id: SignalId) -> &str {
        self.get(id).map(|d| d.path.as_str()).unwrap_or("<unknown>")
    }

    /// Whether `id` names a declared signal.
    pub fn contains(&self, id: SignalId) -> bool {
        (id.0 as usize) < self.defs.len()
    }

    /// Number of declared signals.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether no signals have been declared.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Iterate `(id, def)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (SignalId, &SignalDef)> + '_ {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, d)| (SignalId(i as u32), d))
    }

    /// Direct children (elements/slices/fields) of a signal.
    pub fn children(&self, id: SignalId) -> &[SignalId] {
        self.children
            .get(id.0 as usize)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// All strict ancestors of a signal, nearest first.
    pub fn ancestors(&self, id: SignalId) -> Vec<SignalId> {
        let mut out = Vec::new();
        let mut cur = self.get(id).and_then(|d| d.parent);
        while let Some(p) = cur {
            out.push(p);
            cur = self.get(p).and_then(|d| d.parent);
        }
        out
    }

    /// All strict descendants of a signal, in pre-order.
    pub fn descendants(&self, id: SignalId) -> Vec<SignalId> {
        let mut out = Vec::new();
        let mut stack: Vec<SignalId> = self.children(id).iter().rev().copied().collect();
        while let Some(s) = stack.pop() {
            out.push(s);
            stack.extend(self.children(s).iter().rev().copied());
        }
        out
    }
}

/// A set of signal IDs implemented as a dynamically-sized bitset.
///
/// Used for block read/write sets so that overlap checks between
/// blocks are word-parallel.
#[derive(Clone, Debug, Default)]
pub struct SignalSet {
    bits: Vec<u64>,
}

impl SignalSet {
    const BITS_PER_WORD: usize = 64;

    /// Create an empty signal set.
    pub fn empty() -> Self {
        Self { bits: Vec::new() }
    }

    /// Insert a signal ID into the set.
    pub fn insert(&mut self, signal: SignalId) {
        let word = signal.0 as usize / Self::BITS_PER_WORD;
        let bit = signal.0 as usize % Self::BITS_PER_WORD;
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        self.bits[word] |= 1u64 << bit;
    }

    /// Check whether the set contains a signal ID.
    pub fn contains(&self, signal: SignalId) -> bool {
        let word = signal.0 as usize / Self::BITS_PER_WORD;
        let bit = signal.0 as usize % Self::BITS_PER_WORD;
        word < self.bits.len() && (self.bits[word] & (1u64 << bit)) != 0
    }

    /// Add every member of `other` to `self`.
    pub fn union_with(&mut self, other: &Self) {
        if other.bits.len() > self.bits.len() {
            self.bits.resize(other.bits.len(), 0);
        }
        for (a, b) in self.bits.iter_mut().zip(&other.bits) {
            *a |= *b;
        }
    }

    /// Return the union of two sets (`self | other`).
    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    /// Returns `true` if the set contains no signals.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// Returns the number of signals in the set.
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over the signal IDs in the set, in ascending order.
    pub fn iter(&self) -> SignalSetIter<'_> {
        SignalSetIter {
            bits: &self.bits,
            word_idx: 0,
            current: self.bits.first().copied().unwrap_or(0),
        }
    }
}

impl PartialEq for SignalSet {
    fn eq(&self, other: &Self) -> bool {
        let max_len = self.bits.len().max(other.bits.len());
        (0..max_len).all(|i| {
            self.bits.get(i).copied().unwrap_or(0) == other.bits.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for SignalSet {}

impl FromIterator<SignalId> for SignalSet {
    fn from_iter<I: IntoIterator<Item = SignalId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for signal in iter {
            set.insert(signal);
        }
        set
    }
}

impl Extend<SignalId> for SignalSet {
    fn extend<I: IntoIterator<Item = SignalId>>(&mut self, iter: I) {
        for signal in iter {
            self.insert(signal);
        }
    }
}

impl<'a> IntoIterator for &'a SignalSet {
    type Item = SignalId;
    type IntoIter = SignalSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over signal IDs in a [`SignalSet`], yielding IDs in ascending order.
pub struct SignalSetIter<'a> {
    bits: &'a [u64],
    word_idx: usize,
    current: u64,
}

impl Iterator for SignalSetIter<'_> {
    type Item = SignalId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(SignalId((self.word_idx * 64 + bit) as u32));
            }
            self.word_idx += 1;
            if self.word_idx >= self.bits.len() {
                return None;
            }
            self.current = self.bits[self.word_idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TOP: ComponentId = ComponentId(0);

    #[test]
    fn duplicate_path_rejected() {
        let mut t = SignalTable::new();
        t.declare("top.a", SignalKind::Wire, "Bits8", TOP).unwrap();
        let err = t.declare("top.a", SignalKind::Wire, "Bits8", TOP).unwrap_err();
        assert_eq!(
            err,
            SignalError::DuplicatePath {
                path: "top.a".into()
            }
        );
    }

    #[test]
    fn child_inherits_owner_and_kind() {
        let mut t = SignalTable::new();
        let comp = ComponentId(3);
        let mem = t.declare("top.m.mem", SignalKind::Wire, "Bits32x4", comp).unwrap();
        let elem = t.declare_child(mem, "[2]", "Bits32").unwrap();
        let def = t.get(elem).unwrap();
        assert_eq!(def.path, "top.m.mem[2]");
        assert_eq!(def.owner, comp);
        assert_eq!(def.kind, SignalKind::Wire);
        assert!(!def.is_top_level());
        assert!(t.get(mem).unwrap().is_top_level());
        assert_eq!(t.lookup("top.m.mem[2]"), Some(elem));
    }

    #[test]
    fn ancestry_walks() {
        let mut t = SignalTable::new();
        let bus = t.declare("top.bus", SignalKind::OutPort, "Bus", TOP).unwrap();
        let data = t.declare_child(bus, ".data", "Bits32").unwrap();
        let lo = t.declare_child(data, "[0:16]", "Bits16").unwrap();
        let valid = t.declare_child(bus, ".valid", "Bits1").unwrap();

        assert_eq!(t.ancestors(lo), vec![data, bus]);
        assert_eq!(t.descendants(bus), vec![data, lo, valid]);
        assert!(t.ancestors(bus).is_empty());
        assert_eq!(t.children(bus), &[data, valid]);
    }

    #[test]
    fn child_of_unknown_parent_rejected() {
        let mut t = SignalTable::new();
        let err = t.declare_child(SignalId(7), "[0]", "Bits1").unwrap_err();
        assert_eq!(err, SignalError::UnknownSignal { signal: SignalId(7) });
    }

    #[test]
    fn set_iter_crosses_word_boundary() {
        let set: SignalSet = [SignalId(0), SignalId(63), SignalId(64), SignalId(200)]
            .into_iter()
            .collect();
        let ids: Vec<u32> = set.iter().map(|s| s.0).collect();
        assert_eq!(ids, vec![0, 63, 64, 200]);
    }

    fn arb_signal_set() -> impl Strategy<Value = SignalSet> {
        prop::collection::vec(0u32..200, 0..32)
            .prop_map(|ids| ids.into_iter().map(SignalId).collect::<SignalSet>())
    }

    proptest! {
        #[test]
        fn union_commutative(a in arb_signal_set(), b in arb_signal_set()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn len_matches_iter_count(a in arb_signal_set()) {
            prop_assert_eq!(a.len(), a.iter().count());
        }
    }
}
