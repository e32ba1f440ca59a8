//! Read-only diagnostics export for a computed schedule.
//!
//! Mirrors what a dataflow-graph viewer needs: per-net fan-in/fan-out,
//! every dependency edge classified against the final ranks, the rank
//! of every block, and the sequential edges that were cut.

use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tickweave_block::Span;
use tickweave_core::{BlockId, NetId};
use tickweave_net::NetMap;

use crate::schedule::InferredEdge;

/// Classification of a dependency edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    /// The read observes the value written earlier in the same cycle.
    Combinational,
    /// The read observes the previous cycle's value.
    Sequential,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Combinational => write!(f, "combinational"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

/// Fan-in/fan-out of one net.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetReport {
    /// The net.
    pub net: NetId,
    /// Number of member signals.
    pub members: usize,
    /// Number of drivers (0 or 1).
    pub drivers: usize,
    /// Number of blocks reading it.
    pub readers: usize,
}

/// A net-level dependency inside one block, classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DfgEdge {
    /// Net read.
    pub from: NetId,
    /// Net written.
    pub to: NetId,
    /// Block containing the statements.
    pub block: BlockId,
    /// Statement positions.
    pub spans: SmallVec<[Span; 2]>,
    /// Classification against the final ranks.
    pub kind: EdgeKind,
}

/// Diagnostics export for one schedule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScheduleDiagnostics {
    /// One report per net, ascending.
    pub nets: Vec<NetReport>,
    /// Every net-level dependency, per block.
    pub edges: Vec<DfgEdge>,
    /// `(block, rank)` in serial order.
    pub ranks: Vec<(BlockId, usize)>,
    /// Inferred edges removed as sequential.
    pub sequential: Vec<InferredEdge>,
}

impl ScheduleDiagnostics {
    /// Number of edges of the given kind.
    pub fn count(&self, kind: EdgeKind) -> usize {
        self.edges.iter().filter(|e| e.kind == kind).count()
    }
}

/// Classify a dependency `from → to` inside `block`.
///
/// The edge is sequential when `from` has exactly one writer and that
/// writer runs after `block`: the read sees last cycle's value.
pub fn classify(
    nets: &NetMap,
    rank: &IndexMap<BlockId, usize>,
    from: NetId,
    block: BlockId,
) -> EdgeKind {
    match nets.writers(from) {
        [w] if *w != block => match (rank.get(&block), rank.get(w)) {
            (Some(rb), Some(rw)) if rb < rw => EdgeKind::Sequential,
            _ => EdgeKind::Combinational,
        },
        _ => EdgeKind::Combinational,
    }
}

pub(crate) fn build_diagnostics(
    nets: &NetMap,
    rank: &IndexMap<BlockId, usize>,
    sequential: &[InferredEdge],
) -> ScheduleDiagnostics {
    let net_reports = nets
        .nets()
        .map(|net| NetReport {
            net,
            members: nets.members(net).len(),
            drivers: usize::from(nets.driver(net).is_some()),
            readers: nets.readers(net).len(),
        })
        .collect();

    let mut edges = Vec::new();
    for e in nets.edges() {
        let mut per_block: IndexMap<BlockId, SmallVec<[Span; 2]>> = IndexMap::new();
        for site in &e.sites {
            per_block.entry(site.block).or_default().push(site.span);
        }
        for (block, spans) in per_block {
            edges.push(DfgEdge {
                from: e.from,
                to: e.to,
                block,
                spans,
                kind: classify(nets, rank, e.from, block),
            });
        }
    }

    let mut ranks: Vec<(BlockId, usize)> = rank.iter().map(|(&b, &r)| (b, r)).collect();
    ranks.sort_by_key(|&(_, r)| r);

    ScheduleDiagnostics {
        nets: net_reports,
        edges,
        ranks,
        sequential: sequential.to_vec(),
    }
}

impl fmt::Display for ScheduleDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nets:")?;
        for n in &self.nets {
            writeln!(
                f,
                "  net {}: {} members, {} driver(s), {} reader(s)",
                n.net, n.members, n.drivers, n.readers
            )?;
        }
        writeln!(f, "edges:")?;
        for e in &self.edges {
            let spans: Vec<String> = e.spans.iter().map(|s| s.to_string()).collect();
            writeln!(
                f,
                "  net {} -> net {} in #{} [{}]: {}",
                e.from,
                e.to,
                e.block,
                spans.join(", "),
                e.kind
            )?;
        }
        writeln!(f, "ranks:")?;
        for (b, r) in &self.ranks {
            writeln!(f, "  #{b}: {r}")?;
        }
        writeln!(f, "sequential:")?;
        for e in &self.sequential {
            writeln!(f, "  #{} -> #{} via net {}", e.writer, e.reader, e.net)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{schedule, ScheduleInput};
    use tickweave_block::{extract, BinOp, Expr, Stmt, UpdateBlock};
    use tickweave_core::{ComponentId, Constraint, SignalKind, SignalTable};
    use tickweave_net::{resolve, ResolveOptions};

    #[test]
    fn register_read_is_classified_sequential() {
        // upA: s.x = s.y + 1        (reads y, writes x)
        // upB: s.y = s.x            (reads x, writes y)
        // upA < upB
        let mut t = SignalTable::new();
        let x = t
            .declare("top.x", SignalKind::Wire, "Bits8", ComponentId(0))
            .unwrap();
        let y = t
            .declare("top.y", SignalKind::Wire, "Bits8", ComponentId(0))
            .unwrap();
        let a = UpdateBlock::new(
            "upA",
            vec![Stmt::assign(
                x,
                Expr::binary(BinOp::Add, Expr::sig(y), Expr::Const(1)),
                Span::line(4),
            )],
            |_| Ok(()),
        );
        let b = UpdateBlock::new(
            "upB",
            vec![Stmt::assign(y, Expr::sig(x), Span::line(8))],
            |_| Ok(()),
        );
        let ex = extract([(BlockId(0), &a), (BlockId(1), &b)]).unwrap();
        let nets = resolve(&t, &[], &ex, &ResolveOptions::default()).unwrap();
        let cs = [Constraint::new(BlockId(0), BlockId(1))];
        let s = schedule(ScheduleInput {
            signals: &t,
            extraction: &ex,
            nets: &nets,
            constraints: &cs,
        })
        .unwrap();

        let d = s.diagnostics();
        assert_eq!(d.ranks, vec![(BlockId(0), 0), (BlockId(1), 1)]);
        assert_eq!(d.count(EdgeKind::Sequential), 1);
        assert_eq!(d.count(EdgeKind::Combinational), 1);
        let seq = d
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::Sequential)
            .unwrap();
        assert_eq!(seq.block, BlockId(0));
        assert_eq!(seq.from, nets.net_of(y).unwrap());
        assert_eq!(seq.spans.as_slice(), &[Span::line(4)]);
        assert_eq!(d.nets.len(), 2);
        assert!(d.nets.iter().all(|n| n.drivers == 1 && n.readers == 1));

        let text = d.to_string();
        assert!(text.contains("sequential"));
        assert!(text.contains("#1 -> #0"));
    }
}
