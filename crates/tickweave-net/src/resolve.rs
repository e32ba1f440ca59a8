//! Net resolution: connections → nets, driver checks, and rewriting of
//! block accesses and dependency pairs to net granularity.

use std::error::Error;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tickweave_block::{DepSites, Extraction};
use tickweave_core::{BlockId, ComponentId, NetId, SignalId, SignalKind, SignalTable};
use tracing::{debug, instrument};

use crate::union_find::UnionFind;

/// A direct connection between two signals. Connected signals share a net.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    /// One endpoint.
    pub a: SignalId,
    /// The other endpoint.
    pub b: SignalId,
}

impl Connection {
    /// Connect `a` and `b`.
    pub fn new(a: SignalId, b: SignalId) -> Self {
        Self { a, b }
    }
}

/// Options controlling driver checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Reject undriven nets that contain an output port of `top`.
    pub deny_undriven_outputs: bool,
    /// The top-level component.
    pub top: ComponentId,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            deny_undriven_outputs: false,
            top: ComponentId(0),
        }
    }
}

/// The single source of a net's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    /// A member signal written by an update block.
    Block {
        /// The writing block.
        block: BlockId,
        /// The member it writes.
        signal: SignalId,
    },
    /// A constant member.
    Const {
        /// The constant signal.
        signal: SignalId,
        /// Its value.
        value: u64,
    },
}

/// A dependency pair rewritten to nets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetEdge {
    /// Net that is read.
    pub from: NetId,
    /// Net that is written.
    pub to: NetId,
    /// Statements inducing the dependency.
    pub sites: DepSites,
}

/// Resolved nets for one elaboration.
#[derive(Clone, Debug, Default)]
pub struct NetMap {
    net_of: Vec<NetId>,
    members: Vec<SmallVec<[SignalId; 4]>>,
    drivers: Vec<Option<Driver>>,
    writers: Vec<SmallVec<[BlockId; 1]>>,
    readers: Vec<SmallVec<[BlockId; 4]>>,
    block_reads: IndexMap<BlockId, Vec<NetId>>,
    block_writes: IndexMap<BlockId, Vec<NetId>>,
    edges: Vec<NetEdge>,
}

impl NetMap {
    /// Number of nets.
    pub fn net_count(&self) -> usize {
        self.members.len()
    }

    /// All net ids in ascending order.
    pub fn nets(&self) -> impl Iterator<Item = NetId> {
        (0..self.members.len() as u32).map(NetId)
    }

    /// Net containing `signal`.
    pub fn net_of(&self, signal: SignalId) -> Option<NetId> {
        self.net_of.get(signal.0 as usize).copied()
    }

    /// Member signals of a net, ascending.
    pub fn members(&self, net: NetId) -> &[SignalId] {
        self.members
            .get(net.0 as usize)
            .map(|m| m.as_slice())
            .unwrap_or(&[])
    }

    /// The net's driver, if it has one.
    pub fn driver(&self, net: NetId) -> Option<Driver> {
        self.drivers.get(net.0 as usize).copied().flatten()
    }

    /// Blocks writing a member of the net.
    pub fn writers(&self, net: NetId) -> &[BlockId] {
        self.writers
            .get(net.0 as usize)
            .map(|w| w.as_slice())
            .unwrap_or(&[])
    }

    /// Blocks reading the net, directly or through an overlapping
    /// aggregate/element, ascending.
    pub fn readers(&self, net: NetId) -> &[BlockId] {
        self.readers
            .get(net.0 as usize)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// Nets a block reads (overlap-expanded), ascending.
    pub fn reads_of(&self, block: BlockId) -> &[NetId] {
        self.block_reads
            .get(&block)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// Nets a block writes, ascending.
    pub fn writes_of(&self, block: BlockId) -> &[NetId] {
        self.block_writes
            .get(&block)
            .map(|w| w.as_slice())
            .unwrap_or(&[])
    }

    /// Dependency pairs at net granularity, in discovery order.
    pub fn edges(&self) -> &[NetEdge] {
        &self.edges
    }

    /// Nets without a driver.
    pub fn undriven(&self) -> impl Iterator<Item = NetId> + '_ {
        self.nets().filter(|&n| self.driver(n).is_none())
    }
}

/// One net with conflicting drivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverConflict {
    /// The contested net.
    pub net: NetId,
    /// Every block writing the net or an overlapping signal, ascending.
    pub writers: Vec<(BlockId, String)>,
    /// Every member and overlapping signal involved, ascending.
    pub members: Vec<(SignalId, String)>,
}

impl fmt::Display for DriverConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net {}: driven by", self.net)?;
        for (i, (id, name)) in self.writers.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}'{name}' (#{id})")?;
        }
        write!(f, "; members")?;
        for (i, (_, path)) in self.members.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{path}")?;
        }
        Ok(())
    }
}

/// Errors from net resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetError {
    /// A connection or block access names a signal not in the table.
    UnknownSignal {
        /// The missing signal.
        signal: SignalId,
    },
    /// One or more nets have more than one driver.
    MultipleDrivers {
        /// Every conflict found, by ascending net.
        conflicts: Vec<DriverConflict>,
    },
    /// Output ports of the top component are left undriven.
    UndrivenOutput {
        /// The undriven outputs with their paths.
        outputs: Vec<(SignalId, String)>,
    },
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSignal { signal } => write!(f, "unknown signal {signal}"),
            Self::MultipleDrivers { conflicts } => {
                write!(f, "multiple drivers")?;
                for c in conflicts {
                    write!(f, "\n  {c}")?;
                }
                Ok(())
            }
            Self::UndrivenOutput { outputs } => {
                write!(f, "undriven top-level outputs:")?;
                for (_, path) in outputs {
                    write!(f, " {path}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for NetError {}

// ── Resolution ──────────────────────────────────────────────────

#[derive(Default)]
struct Conflict {
    writers: IndexSet<BlockId>,
    members: IndexSet<SignalId>,
}

/// Partition signals into nets and check drivers.
///
/// Net ids are assigned in order of each net's smallest member, so the
/// result depends only on the inputs, not on connection order.
#[instrument(skip_all, fields(signals = signals.len(), connections = connections.len()))]
pub fn resolve(
    signals: &SignalTable,
    connections: &[Connection],
    extraction: &Extraction,
    options: &ResolveOptions,
) -> Result<NetMap, NetError> {
    let n = signals.len();
    let check = |s: SignalId| {
        if signals.contains(s) {
            Ok(())
        } else {
            Err(NetError::UnknownSignal { signal: s })
        }
    };
    for c in connections {
        check(c.a)?;
        check(c.b)?;
    }
    for (_, access) in extraction.blocks() {
        for s in access.reads.iter().chain(access.writes.iter()) {
            check(s)?;
        }
    }

    // Partition.
    let mut uf = UnionFind::new(n);
    for c in connections {
        uf.union(c.a.0, c.b.0);
    }
    let mut root_to_net: IndexMap<u32, NetId> = IndexMap::new();
    let mut net_of = Vec::with_capacity(n);
    let mut members: Vec<SmallVec<[SignalId; 4]>> = Vec::new();
    for i in 0..n as u32 {
        let root = uf.find(i);
        let next = NetId(root_to_net.len() as u32);
        let net = *root_to_net.entry(root).or_insert(next);
        if members.len() <= net.0 as usize {
            members.push(SmallVec::new());
        }
        members[net.0 as usize].push(SignalId(i));
        net_of.push(net);
    }
    let nets = members.len();

    // Writers and drivers.
    let mut claims: Vec<SmallVec<[(BlockId, SignalId); 1]>> = vec![SmallVec::new(); nets];
    let mut signal_writers: IndexMap<SignalId, SmallVec<[BlockId; 1]>> = IndexMap::new();
    let mut block_writes = IndexMap::new();
    for (block, access) in extraction.blocks() {
        let mut written: Vec<NetId> = Vec::new();
        for s in access.writes.iter() {
            let net = net_of[s.0 as usize];
            claims[net.0 as usize].push((block, s));
            signal_writers.entry(s).or_default().push(block);
            written.push(net);
        }
        written.sort_unstable();
        written.dedup();
        block_writes.insert(block, written);
    }

    let mut conflicts: IndexMap<NetId, Conflict> = IndexMap::new();
    let mut drivers: Vec<Option<Driver>> = vec![None; nets];
    let mut writers: Vec<SmallVec<[BlockId; 1]>> = vec![SmallVec::new(); nets];
    for net in 0..nets {
        let mut driving: IndexSet<SignalId> = IndexSet::new();
        let mut blocks: IndexSet<BlockId> = IndexSet::new();
        for &(b, s) in &claims[net] {
            blocks.insert(b);
            driving.insert(s);
        }
        let mut konst = None;
        for &m in &members[net] {
            if let Some(SignalKind::Const(value)) = signals.get(m).map(|d| d.kind) {
                driving.insert(m);
                konst.get_or_insert(Driver::Const { signal: m, value });
            }
        }
        let mut sorted_blocks: Vec<BlockId> = blocks.iter().copied().collect();
        sorted_blocks.sort_unstable();
        writers[net] = sorted_blocks.into_iter().collect();

        if blocks.len() > 1 || driving.len() > 1 {
            let c = conflicts.entry(NetId(net as u32)).or_default();
            c.writers.extend(blocks.iter().copied());
            c.members.extend(members[net].iter().copied());
            continue;
        }
        drivers[net] = match claims[net].first() {
            Some(&(block, signal)) => Some(Driver::Block { block, signal }),
            None => konst,
        };
    }

    // Overlapping storage: a block writing an element while another
    // block writes an enclosing aggregate.
    for (&s, ws) in &signal_writers {
        for anc in signals.ancestors(s) {
            let Some(anc_ws) = signal_writers.get(&anc) else {
                continue;
            };
            for &b in ws {
                for &b2 in anc_ws {
                    if b != b2 {
                        let c = conflicts.entry(net_of[s.0 as usize]).or_default();
                        c.writers.insert(b);
                        c.writers.insert(b2);
                        c.members.insert(s);
                        c.members.insert(anc);
                    }
                }
            }
        }
    }

    if !conflicts.is_empty() {
        let mut out: Vec<DriverConflict> = conflicts
            .into_iter()
            .map(|(net, c)| {
                let mut w: Vec<BlockId> = c.writers.into_iter().collect();
                w.sort_unstable();
                let mut m: Vec<SignalId> = c.members.into_iter().collect();
                m.sort_unstable();
                DriverConflict {
                    net,
                    writers: w
                        .into_iter()
                        .map(|b| (b, extraction.name(b).to_string()))
                        .collect(),
                    members: m
                        .into_iter()
                        .map(|s| (s, signals.path(s).to_string()))
                        .collect(),
                }
            })
            .collect();
        out.sort_by_key(|c| c.net);
        return Err(NetError::MultipleDrivers { conflicts: out });
    }

    // Readers, expanded across enclosing aggregates and elements.
    let related = |s: SignalId, out: &mut Vec<NetId>| {
        for &m in &members[net_of[s.0 as usize].0 as usize] {
            out.push(net_of[m.0 as usize]);
            for a in signals.ancestors(m) {
                out.push(net_of[a.0 as usize]);
            }
            for d in signals.descendants(m) {
                out.push(net_of[d.0 as usize]);
            }
        }
    };
    let mut block_reads = IndexMap::new();
    let mut readers: Vec<SmallVec<[BlockId; 4]>> = vec![SmallVec::new(); nets];
    for (block, access) in extraction.blocks() {
        let mut read: Vec<NetId> = Vec::new();
        for s in access.reads.iter() {
            related(s, &mut read);
        }
        read.sort_unstable();
        read.dedup();
        for &net in &read {
            readers[net.0 as usize].push(block);
        }
        block_reads.insert(block, read);
    }
    for r in &mut readers {
        r.sort_unstable();
        r.dedup();
    }

    if options.deny_undriven_outputs {
        let driven = |net: NetId| drivers[net.0 as usize].is_some();
        let mut outputs = Vec::new();
        for (id, def) in signals.iter() {
            if def.kind != SignalKind::OutPort || def.owner != options.top {
                continue;
            }
            let mut near = Vec::new();
            related(id, &mut near);
            if !near.into_iter().any(driven) {
                outputs.push((id, def.path.clone()));
            }
        }
        if !outputs.is_empty() {
            return Err(NetError::UndrivenOutput { outputs });
        }
    }

    // Dependency pairs at net granularity.
    let mut merged: IndexMap<(NetId, NetId), DepSites> = IndexMap::new();
    for (&(rd, wr), sites) in extraction.deps() {
        let key = (net_of[rd.0 as usize], net_of[wr.0 as usize]);
        if key.0 == key.1 {
            continue;
        }
        let slot = merged.entry(key).or_default();
        for site in sites {
            if !slot.contains(site) {
                slot.push(*site);
            }
        }
    }
    let edges: Vec<NetEdge> = merged
        .into_iter()
        .map(|((from, to), sites)| NetEdge { from, to, sites })
        .collect();

    let map = NetMap {
        net_of,
        members,
        drivers,
        writers,
        readers,
        block_reads,
        block_writes,
        edges,
    };
    debug!(
        nets = map.net_count(),
        undriven = map.undriven().count(),
        edges = map.edges.len(),
        "nets resolved"
    );
    Ok(map)
}
