//! Block scheduling: sequential/combinational classification, cycle
//! detection, batching and the final serial order.

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tickweave_block::{DepSite, Extraction};
use tickweave_core::{BlockId, Constraint, NetId, SignalId, SignalTable};
use tickweave_net::NetMap;
use tracing::{debug, instrument, trace};

use crate::diagnostics::{build_diagnostics, ScheduleDiagnostics};
use crate::graph::DiGraph;

/// An inferred ordering edge: `writer` produces a net `reader` consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferredEdge {
    /// Block writing the net.
    pub writer: BlockId,
    /// Block reading the net.
    pub reader: BlockId,
    /// The net carrying the dependency.
    pub net: NetId,
    /// Members of the net the two blocks touch.
    pub signals: SmallVec<[SignalId; 2]>,
    /// Statements on either side of the edge.
    pub sites: SmallVec<[DepSite; 2]>,
}

/// Everything the scheduler needs from earlier elaboration stages.
#[derive(Clone, Copy, Debug)]
pub struct ScheduleInput<'a> {
    /// Signal table, for diagnostics.
    pub signals: &'a SignalTable,
    /// Per-block access sets and dependency sites.
    pub extraction: &'a Extraction,
    /// Resolved nets.
    pub nets: &'a NetMap,
    /// Explicit constraints.
    pub constraints: &'a [Constraint],
}

/// A computed schedule.
#[derive(Clone, Debug)]
pub struct Schedule {
    order: Vec<BlockId>,
    batches: Vec<Vec<BlockId>>,
    rank: IndexMap<BlockId, usize>,
    retained: Vec<InferredEdge>,
    sequential: Vec<InferredEdge>,
    constraints: Vec<Constraint>,
    diagnostics: ScheduleDiagnostics,
}

impl Schedule {
    /// Blocks in execution order.
    pub fn order(&self) -> &[BlockId] {
        &self.order
    }

    /// Dependency levels. Concatenated, they give [`order`](Self::order).
    pub fn batches(&self) -> &[Vec<BlockId>] {
        &self.batches
    }

    /// Position of a block in the serial order.
    pub fn rank(&self, block: BlockId) -> Option<usize> {
        self.rank.get(&block).copied()
    }

    /// Number of scheduled blocks.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no blocks are scheduled.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Combinational edges that constrain the order.
    pub fn retained_edges(&self) -> &[InferredEdge] {
        &self.retained
    }

    /// Sequential edges removed from the ordering graph.
    pub fn sequential_edges(&self) -> &[InferredEdge] {
        &self.sequential
    }

    /// Explicit constraints honored by this schedule.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Read-only diagnostics export.
    pub fn diagnostics(&self) -> &ScheduleDiagnostics {
        &self.diagnostics
    }
}

// ── Errors ──────────────────────────────────────────────────────

/// One edge inside a reported cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleEdge {
    /// A user-declared constraint.
    Explicit {
        /// Earlier block.
        before: BlockId,
        /// Later block.
        after: BlockId,
    },
    /// An inferred combinational dependency.
    Inferred {
        /// Writing block.
        writer: BlockId,
        /// Reading block.
        reader: BlockId,
        /// Net carrying the dependency.
        net: NetId,
        /// Signals involved, with their paths.
        signals: Vec<(SignalId, String)>,
        /// Source positions of the statements involved.
        sites: Vec<DepSite>,
    },
}

/// One strongly connected group of blocks that cannot be ordered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    /// Blocks in the cycle, ascending, with names.
    pub blocks: Vec<(BlockId, String)>,
    /// Every edge between blocks of the cycle.
    pub edges: Vec<CycleEdge>,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.blocks.iter().map(|(_, n)| n.as_str()).collect();
        write!(f, "[{}]", names.join(", "))?;
        for e in &self.edges {
            match e {
                CycleEdge::Explicit { before, after } => {
                    write!(f, "\n    #{before} -> #{after} (constraint)")?
                }
                CycleEdge::Inferred {
                    writer,
                    reader,
                    signals,
                    sites,
                    ..
                } => {
                    let paths: Vec<&str> = signals.iter().map(|(_, p)| p.as_str()).collect();
                    write!(f, "\n    #{writer} -> #{reader} via {}", paths.join(", "))?;
                    for s in sites {
                        write!(f, " [#{} @ {}]", s.block, s.span)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Errors from scheduling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    /// A constraint references a block that was not analyzed.
    UnknownBlock {
        /// The offending block.
        block: BlockId,
    },
    /// Explicit constraints alone form a cycle.
    ConstraintCycle {
        /// Every cycle among the constraints.
        cycles: Vec<CycleReport>,
    },
    /// Combinational dependencies (possibly with constraints) form a cycle
    /// with no sequential edge to break it.
    CombinationalCycle {
        /// Every cycle found.
        cycles: Vec<CycleReport>,
    },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBlock { block } => {
                write!(f, "constraint references unknown update block #{block}")
            }
            Self::ConstraintCycle { cycles } => {
                write!(f, "explicit constraints form a cycle")?;
                for c in cycles {
                    write!(f, "\n  {c}")?;
                }
                Ok(())
            }
            Self::CombinationalCycle { cycles } => {
                write!(f, "combinational loop between update blocks")?;
                for c in cycles {
                    write!(f, "\n  {c}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for ScheduleError {}

// ── Scheduling ──────────────────────────────────────────────────

/// Compute the execution order of every analyzed block.
///
/// 1. Explicit constraints alone give a tentative order; a cycle among
///    them is fatal.
/// 2. An inferred edge `w → r` is sequential when `r` is constrained to
///    run before `w`; sequential edges are removed.
/// 3. Any cycle over the remaining edges is a combinational loop.
/// 4. The acyclic graph is levelized into batches. Blocks within a batch
///    are ordered by id.
#[instrument(skip_all, fields(blocks = input.extraction.block_count(), constraints = input.constraints.len()))]
pub fn schedule(input: ScheduleInput<'_>) -> Result<Schedule, ScheduleError> {
    let ScheduleInput {
        signals,
        extraction,
        nets,
        constraints,
    } = input;

    let mut nodes: Vec<BlockId> = extraction.blocks().map(|(b, _)| b).collect();
    nodes.sort_unstable();
    let index: IndexMap<BlockId, usize> = nodes.iter().enumerate().map(|(i, &b)| (b, i)).collect();
    let idx = |b: BlockId| {
        index
            .get(&b)
            .copied()
            .ok_or(ScheduleError::UnknownBlock { block: b })
    };

    // 1. Tentative order from explicit constraints.
    let mut explicit = DiGraph::new(nodes.len());
    for c in constraints {
        explicit.add_edge(idx(c.before)?, idx(c.after)?);
    }
    if explicit.levels().is_none() {
        let cycles = report_cycles(&explicit, &nodes, extraction, constraints, &[], signals);
        return Err(ScheduleError::ConstraintCycle { cycles });
    }
    let reach = explicit.reachability();

    // 2. Classify inferred edges.
    let sites = SiteIndex::new(nets);
    let mut retained = Vec::new();
    let mut sequential = Vec::new();
    for net in nets.nets() {
        for &w in nets.writers(net) {
            for &r in nets.readers(net) {
                if w == r {
                    continue;
                }
                let edge = inferred(extraction, nets, &sites, w, r, net);
                if reach[idx(r)?].contains(idx(w)?) {
                    trace!(writer = %w, reader = %r, net = %net, "sequential edge");
                    sequential.push(edge);
                } else {
                    retained.push(edge);
                }
            }
        }
    }

    // 3. Cycle detection over constraints plus combinational edges.
    let mut full = explicit.clone();
    for e in &retained {
        full.add_edge(idx(e.writer)?, idx(e.reader)?);
    }
    let Some(levels) = full.levels() else {
        let cycles = report_cycles(&full, &nodes, extraction, constraints, &retained, signals);
        return Err(ScheduleError::CombinationalCycle { cycles });
    };

    // 4. Batches and serial order.
    let depth = levels.iter().copied().max().map_or(0, |m| m + 1);
    let mut batches: Vec<Vec<BlockId>> = vec![Vec::new(); depth];
    for (i, &lvl) in levels.iter().enumerate() {
        batches[lvl].push(nodes[i]);
    }
    let order: Vec<BlockId> = batches.iter().flatten().copied().collect();
    let rank: IndexMap<BlockId, usize> = order.iter().enumerate().map(|(i, &b)| (b, i)).collect();

    let diagnostics = build_diagnostics(nets, &rank, &sequential);
    debug!(
        batches = batches.len(),
        retained = retained.len(),
        sequential = sequential.len(),
        "schedule computed"
    );
    Ok(Schedule {
        order,
        batches,
        rank,
        retained,
        sequential,
        constraints: constraints.to_vec(),
        diagnostics,
    })
}

/// Dependency sites per `(block, net)`, split by direction.
struct SiteIndex {
    writes: IndexMap<(BlockId, NetId), SmallVec<[DepSite; 2]>>,
    reads: IndexMap<(BlockId, NetId), SmallVec<[DepSite; 2]>>,
}

impl SiteIndex {
    fn new(nets: &NetMap) -> Self {
        let mut writes: IndexMap<_, SmallVec<[DepSite; 2]>> = IndexMap::new();
        let mut reads: IndexMap<_, SmallVec<[DepSite; 2]>> = IndexMap::new();
        for e in nets.edges() {
            for &site in &e.sites {
                let w = writes.entry((site.block, e.to)).or_default();
                if !w.contains(&site) {
                    w.push(site);
                }
                let r = reads.entry((site.block, e.from)).or_default();
                if !r.contains(&site) {
                    r.push(site);
                }
            }
        }
        Self { writes, reads }
    }
}

fn inferred(
    extraction: &Extraction,
    nets: &NetMap,
    sites: &SiteIndex,
    writer: BlockId,
    reader: BlockId,
    net: NetId,
) -> InferredEdge {
    let mut signals: SmallVec<[SignalId; 2]> = SmallVec::new();
    let w_acc = extraction.access(writer);
    let r_acc = extraction.access(reader);
    for &m in nets.members(net) {
        let written = w_acc.is_some_and(|a| a.writes.contains(m));
        let read = r_acc.is_some_and(|a| a.reads.contains(m));
        if written || read {
            signals.push(m);
        }
    }
    let mut edge_sites: SmallVec<[DepSite; 2]> = SmallVec::new();
    let both = [
        sites.writes.get(&(writer, net)),
        sites.reads.get(&(reader, net)),
    ];
    for s in both.into_iter().flatten().flatten() {
        if !edge_sites.contains(s) {
            edge_sites.push(*s);
        }
    }
    edge_sites.sort_by_key(|s| (s.block, s.span));
    InferredEdge {
        writer,
        reader,
        net,
        signals,
        sites: edge_sites,
    }
}

fn report_cycles(
    graph: &DiGraph,
    nodes: &[BlockId],
    extraction: &Extraction,
    constraints: &[Constraint],
    retained: &[InferredEdge],
    signals: &SignalTable,
) -> Vec<CycleReport> {
    let mut out = Vec::new();
    for comp in graph.strongly_connected() {
        if comp.len() < 2 {
            continue;
        }
        let members: Vec<BlockId> = comp.iter().map(|&i| nodes[i]).collect();
        let inside = |b: BlockId| members.contains(&b);
        let mut edges = Vec::new();
        for c in constraints {
            if inside(c.before) && inside(c.after) {
                edges.push(CycleEdge::Explicit {
                    before: c.before,
                    after: c.after,
                });
            }
        }
        for e in retained {
            if inside(e.writer) && inside(e.reader) {
                edges.push(CycleEdge::Inferred {
                    writer: e.writer,
                    reader: e.reader,
                    net: e.net,
                    signals: e
                        .signals
                        .iter()
                        .map(|&s| (s, signals.path(s).to_string()))
                        .collect(),
                    sites: e.sites.to_vec(),
                });
            }
        }
        out.push(CycleReport {
            blocks: members
                .iter()
                .map(|&b| (b, extraction.name(b).to_string()))
                .collect(),
            edges,
        });
    }
    out
}
