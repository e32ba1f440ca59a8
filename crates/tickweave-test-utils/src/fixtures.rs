//! Reusable update-block and design fixtures.
//!
//! Block constructors pair a body that describes the block's effects
//! with a behavior that actually performs them:
//!
//! - [`copy_block`]: `dst = src`.
//! - [`incr_block`]: `sig = sig + 1`.
//! - [`add_block`]: `dst = a + b`.
//! - [`const_block`]: `dst = value`.
//! - [`failing_block`]: writes `dst`, then fails after N calls.
//!
//! Design fixtures ([`counter`], [`chain`]) return a populated
//! [`Hierarchy`] and [`SignalTable`] plus the ids tests need.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tickweave_block::{BinOp, Behavior, BlockContext, Expr, Span, Stmt, UpdateBlock};
use tickweave_core::{BlockError, BlockId, ComponentId, SignalId, SignalKind, SignalTable};
use tickweave_registry::Hierarchy;

pub fn copy_block(name: impl Into<String>, src: SignalId, dst: SignalId) -> UpdateBlock {
    UpdateBlock::new(
        name,
        vec![Stmt::assign(dst, Expr::sig(src), Span::line(1))],
        move |ctx| {
            let v = ctx.read(src)?;
            ctx.write(dst, v)
        },
    )
}

pub fn incr_block(name: impl Into<String>, sig: SignalId) -> UpdateBlock {
    UpdateBlock::new(
        name,
        vec![Stmt::assign(
            sig,
            Expr::binary(BinOp::Add, Expr::sig(sig), Expr::Const(1)),
            Span::line(1),
        )],
        move |ctx| {
            let v = ctx.read(sig)?;
            ctx.write(sig, v.wrapping_add(1))
        },
    )
}

pub fn add_block(name: impl Into<String>, a: SignalId, b: SignalId, dst: SignalId) -> UpdateBlock {
    UpdateBlock::new(
        name,
        vec![Stmt::assign(
            dst,
            Expr::binary(BinOp::Add, Expr::sig(a), Expr::sig(b)),
            Span::line(1),
        )],
        move |ctx| {
            let v = ctx.read(a)?.wrapping_add(ctx.read(b)?);
            ctx.write(dst, v)
        },
    )
}

pub fn const_block(name: impl Into<String>, dst: SignalId, value: u64) -> UpdateBlock {
    UpdateBlock::new(
        name,
        vec![Stmt::assign(dst, Expr::Const(value), Span::line(1))],
        move |ctx| ctx.write(dst, value),
    )
}

/// Writes its call index to `dst`, then fails once it has succeeded
/// `succeed_count` times.
///
/// The call counter is atomic so the behavior is `Send + Sync`.
#[derive(Debug)]
pub struct FailingBehavior {
    pub dst: SignalId,
    pub succeed_count: usize,
    calls: AtomicUsize,
}

impl FailingBehavior {
    pub fn new(dst: SignalId, succeed_count: usize) -> Self {
        Self {
            dst,
            succeed_count,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times the behavior has run.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Behavior for FailingBehavior {
    fn run(&self, ctx: &mut BlockContext<'_>) -> Result<(), BlockError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n >= self.succeed_count {
            return Err(BlockError::ExecutionFailed {
                reason: format!(
                    "deliberate failure after {} successful calls",
                    self.succeed_count
                ),
            });
        }
        ctx.write(self.dst, n as u64)
    }
}

/// A block running a shared [`FailingBehavior`]; the handle lets tests
/// inspect the call count.
pub fn failing_block(
    name: impl Into<String>,
    dst: SignalId,
    succeed_count: usize,
) -> (UpdateBlock, Arc<FailingBehavior>) {
    let behavior = Arc::new(FailingBehavior::new(dst, succeed_count));
    let block = UpdateBlock::with_shared(
        name,
        vec![Stmt::assign(dst, Expr::Const(0), Span::line(1))],
        behavior.clone(),
    );
    (block, behavior)
}

/// Declare a top-level 64-bit wire.
pub fn wire(signals: &mut SignalTable, path: &str) -> SignalId {
    signals
        .declare(path, SignalKind::Wire, "Bits64", ComponentId(0))
        .unwrap()
}

// ── Designs ──────────────────────────────────────────────────────

/// `incr` (`count = count + 1`) and `report` (`display = count`) under
/// one component, with `incr < report`.
pub struct CounterFixture {
    pub hierarchy: Hierarchy,
    pub signals: SignalTable,
    pub count: SignalId,
    pub display: SignalId,
    pub incr: BlockId,
    pub report: BlockId,
}

pub fn counter() -> CounterFixture {
    let mut hierarchy = Hierarchy::new("top");
    let mut signals = SignalTable::new();
    let count = wire(&mut signals, "top.counter");
    let display = wire(&mut signals, "top.display");
    let comp = hierarchy.add_component(hierarchy.top(), "ctr").unwrap();
    let incr = hierarchy
        .register_block(comp, incr_block("incr", count))
        .unwrap();
    let report = hierarchy
        .register_block(comp, copy_block("report", count, display))
        .unwrap();
    hierarchy.add_constraint(comp, incr, report).unwrap();
    CounterFixture {
        hierarchy,
        signals,
        count,
        display,
        incr,
        report,
    }
}

/// `n + 1` wires `s0..=sn` and `n` copy blocks `s[i+1] = s[i]`,
/// registered last stage first so the schedule has to reverse them.
pub struct ChainFixture {
    pub hierarchy: Hierarchy,
    pub signals: SignalTable,
    pub stages: Vec<SignalId>,
    /// `blocks[i]` writes `stages[i + 1]`.
    pub blocks: Vec<BlockId>,
}

pub fn chain(n: usize) -> ChainFixture {
    let mut hierarchy = Hierarchy::new("top");
    let mut signals = SignalTable::new();
    let stages: Vec<SignalId> = (0..=n)
        .map(|i| wire(&mut signals, &format!("top.s{i}")))
        .collect();
    let top = hierarchy.top();
    let mut blocks = vec![BlockId(0); n];
    for i in (0..n).rev() {
        blocks[i] = hierarchy
            .register_block(top, copy_block(format!("stage{i}"), stages[i], stages[i + 1]))
            .unwrap();
    }
    ChainFixture {
        hierarchy,
        signals,
        stages,
        blocks,
    }
}
