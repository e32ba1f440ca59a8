//! Tick generation: compile a schedule into one callable procedure.
//!
//! [`generate_tick`] resolves every scheduled block to its behavior once,
//! up front. The resulting [`TickFn`] runs the blocks in serial order
//! against any [`SignalAccess`] and stops at the first failure.
//!
//! Two flavors exist. [`TickMode::Normal`] walks a preallocated array of
//! steps. [`TickMode::Unrolled`] folds the steps into a balanced tree of
//! closures so a tick is a single call with no loop. Both run the same
//! blocks in the same order and fail on the same block.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tickweave_block::{Behavior, BlockContext, UpdateBlock};
use tickweave_core::{BlockId, Cycle, SignalAccess, StepError};
use tickweave_registry::Hierarchy;
use tickweave_sched::Schedule;
use tracing::{debug, instrument};

use crate::config::TickMode;

// ── BlockSource ────────────────────────────────────────────────────

/// Where generation looks up the behavior of a scheduled block.
pub trait BlockSource {
    /// The live block with this id, if any.
    fn block(&self, id: BlockId) -> Option<&UpdateBlock>;
}

impl BlockSource for Hierarchy {
    fn block(&self, id: BlockId) -> Option<&UpdateBlock> {
        Hierarchy::block(self, id)
    }
}

impl BlockSource for IndexMap<BlockId, UpdateBlock> {
    fn block(&self, id: BlockId) -> Option<&UpdateBlock> {
        self.get(&id)
    }
}

// ── GenerateError ──────────────────────────────────────────────────

/// Errors from [`generate_tick`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerateError {
    /// The schedule contains no blocks.
    EmptySchedule,
    /// A scheduled block has no behavior in the block source.
    MissingBlock {
        /// The scheduled id.
        block: BlockId,
    },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySchedule => write!(f, "no update blocks to schedule"),
            Self::MissingBlock { block } => {
                write!(f, "scheduled update block #{block} has no behavior")
            }
        }
    }
}

impl Error for GenerateError {}

// ── Steps ──────────────────────────────────────────────────────────

struct Step {
    id: BlockId,
    name: Arc<str>,
    behavior: Arc<dyn Behavior>,
}

impl Step {
    fn run(&self, state: &mut dyn SignalAccess, cycle: Cycle) -> Result<(), StepError> {
        let mut ctx = BlockContext::new(state, self.id, cycle);
        self.behavior
            .run(&mut ctx)
            .map_err(|reason| StepError::BlockFailed {
                block: self.id,
                name: self.name.to_string(),
                reason,
            })
    }
}

type Fused = Box<dyn Fn(&mut dyn SignalAccess, Cycle) -> Result<(), StepError> + Send + Sync>;

fn leaf(step: Step) -> Fused {
    Box::new(move |state: &mut dyn SignalAccess, cycle: Cycle| step.run(state, cycle))
}

fn pair(first: Fused, second: Fused) -> Fused {
    Box::new(move |state: &mut dyn SignalAccess, cycle: Cycle| {
        first(&mut *state, cycle)?;
        second(state, cycle)
    })
}

/// Fold adjacent closures pairwise until one remains. Depth is
/// `ceil(log2(n))`; order is preserved.
fn fuse(mut layer: Vec<Fused>) -> Fused {
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        let mut it = layer.into_iter();
        while let Some(first) = it.next() {
            match it.next() {
                Some(second) => next.push(pair(first, second)),
                None => next.push(first),
            }
        }
        layer = next;
    }
    layer
        .pop()
        .unwrap_or_else(|| Box::new(|_: &mut dyn SignalAccess, _: Cycle| Ok(())))
}

enum Exec {
    Array(Vec<Step>),
    Fused(Fused),
}

// ── TickFn ─────────────────────────────────────────────────────────

/// A compiled tick procedure.
///
/// Holds no reference to the schedule or hierarchy it came from; only
/// the design revision is recorded so callers can detect staleness.
pub struct TickFn {
    mode: TickMode,
    revision: u64,
    order: Vec<BlockId>,
    exec: Exec,
}

impl TickFn {
    /// Run one cycle: every scheduled block once, in order.
    ///
    /// Stops at the first failing block; blocks after it are not run.
    pub fn call(&self, state: &mut dyn SignalAccess, cycle: Cycle) -> Result<(), StepError> {
        match &self.exec {
            Exec::Array(steps) => {
                for step in steps {
                    step.run(&mut *state, cycle)?;
                }
                Ok(())
            }
            Exec::Fused(f) => f(state, cycle),
        }
    }

    /// The flavor this procedure was generated in.
    pub fn mode(&self) -> TickMode {
        self.mode
    }

    /// Design revision the schedule was computed from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Blocks run per tick, in order.
    pub fn order(&self) -> &[BlockId] {
        &self.order
    }

    /// Number of blocks run per tick.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Always `false`: generation rejects empty schedules.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for TickFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickFn")
            .field("mode", &self.mode)
            .field("revision", &self.revision)
            .field("order", &self.order)
            .finish()
    }
}

/// Compile `schedule` into a tick procedure.
///
/// Each call starts from scratch; nothing is shared with procedures
/// generated earlier.
#[instrument(skip_all, fields(blocks = schedule.len(), mode = %mode, revision = revision))]
pub fn generate_tick<S: BlockSource + ?Sized>(
    schedule: &Schedule,
    blocks: &S,
    mode: TickMode,
    revision: u64,
) -> Result<TickFn, GenerateError> {
    if schedule.is_empty() {
        return Err(GenerateError::EmptySchedule);
    }
    let mut steps = Vec::with_capacity(schedule.len());
    for &id in schedule.order() {
        let block = blocks.block(id).ok_or(GenerateError::MissingBlock { block: id })?;
        steps.push(Step {
            id,
            name: Arc::from(block.name()),
            behavior: Arc::clone(block.behavior()),
        });
    }
    let exec = match mode {
        TickMode::Normal => Exec::Array(steps),
        TickMode::Unrolled => Exec::Fused(fuse(steps.into_iter().map(leaf).collect())),
    };
    debug!("tick procedure generated");
    Ok(TickFn {
        mode,
        revision,
        order: schedule.order().to_vec(),
        exec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tickweave_block::{extract, Expr, Span, Stmt};
    use tickweave_core::{
        BlockError, ComponentId, SignalId, SignalKind, SignalReader, SignalTable, SignalWriter,
    };
    use tickweave_net::{resolve, ResolveOptions};
    use tickweave_sched::{schedule, ScheduleInput};

    #[derive(Default)]
    struct Flat(Vec<u64>);

    impl SignalReader for Flat {
        fn read(&self, signal: SignalId) -> Option<u64> {
            self.0.get(signal.0 as usize).copied()
        }
    }

    impl SignalWriter for Flat {
        fn write(&mut self, signal: SignalId, value: u64) -> Result<(), BlockError> {
            let slot = self
                .0
                .get_mut(signal.0 as usize)
                .ok_or(BlockError::UnknownSignal { signal })?;
            *slot = value;
            Ok(())
        }
    }

    /// `n` independent blocks, each appending its index to `log`; the
    /// block at `fail_at` fails instead.
    fn logging_blocks(
        n: usize,
        fail_at: Option<usize>,
        log: &Arc<Mutex<Vec<usize>>>,
    ) -> (Schedule, IndexMap<BlockId, UpdateBlock>) {
        let mut t = SignalTable::new();
        let mut blocks = IndexMap::new();
        for i in 0..n {
            let s = t
                .declare(format!("top.s{i}"), SignalKind::Wire, "Bits8", ComponentId(0))
                .unwrap();
            let log = Arc::clone(log);
            let b = UpdateBlock::new(
                format!("b{i}"),
                vec![Stmt::assign(s, Expr::Const(1), Span::line(1))],
                move |_ctx| {
                    if fail_at == Some(i) {
                        return Err(BlockError::ExecutionFailed {
                            reason: "boom".into(),
                        });
                    }
                    log.lock().unwrap().push(i);
                    Ok(())
                },
            );
            blocks.insert(BlockId(i as u32), b);
        }
        let ex = extract(blocks.iter().map(|(&id, b)| (id, b))).unwrap();
        let nets = resolve(&t, &[], &ex, &ResolveOptions::default()).unwrap();
        let s = schedule(ScheduleInput {
            signals: &t,
            extraction: &ex,
            nets: &nets,
            constraints: &[],
        })
        .unwrap();
        (s, blocks)
    }

    #[test]
    fn both_modes_run_blocks_in_order() {
        for mode in [TickMode::Normal, TickMode::Unrolled] {
            let log = Arc::new(Mutex::new(Vec::new()));
            let (s, blocks) = logging_blocks(7, None, &log);
            let tick = generate_tick(&s, &blocks, mode, 3).unwrap();
            assert_eq!(tick.mode(), mode);
            assert_eq!(tick.revision(), 3);
            assert_eq!(tick.len(), 7);
            tick.call(&mut Flat(vec![0; 7]), Cycle(0)).unwrap();
            assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4, 5, 6]);
        }
    }

    #[test]
    fn failure_stops_the_cycle_in_both_modes() {
        for mode in [TickMode::Normal, TickMode::Unrolled] {
            let log = Arc::new(Mutex::new(Vec::new()));
            let (s, blocks) = logging_blocks(5, Some(2), &log);
            let tick = generate_tick(&s, &blocks, mode, 0).unwrap();
            let err = tick.call(&mut Flat(vec![0; 5]), Cycle(4)).unwrap_err();
            match err {
                StepError::BlockFailed { block, name, .. } => {
                    assert_eq!(block, BlockId(2));
                    assert_eq!(name, "b2");
                }
                other => panic!("expected BlockFailed, got {other:?}"),
            }
            assert_eq!(*log.lock().unwrap(), vec![0, 1]);
        }
    }

    #[test]
    fn blocks_see_earlier_writes_and_the_cycle() {
        let mut t = SignalTable::new();
        let x = t
            .declare("top.x", SignalKind::Wire, "Bits8", ComponentId(0))
            .unwrap();
        let y = t
            .declare("top.y", SignalKind::Wire, "Bits8", ComponentId(0))
            .unwrap();
        let w = UpdateBlock::new(
            "w",
            vec![Stmt::assign(x, Expr::Const(0), Span::line(1))],
            move |ctx| ctx.write(x, ctx.cycle().0 + 10),
        );
        let r = UpdateBlock::new(
            "r",
            vec![Stmt::assign(y, Expr::sig(x), Span::line(2))],
            move |ctx| {
                let v = ctx.read(x)?;
                ctx.write(y, v * 2)
            },
        );
        // Registered reader-first so the schedule has to reorder them.
        let mut blocks = IndexMap::new();
        blocks.insert(BlockId(0), r);
        blocks.insert(BlockId(1), w);
        let ex = extract(blocks.iter().map(|(&id, b)| (id, b))).unwrap();
        let nets = resolve(&t, &[], &ex, &ResolveOptions::default()).unwrap();
        let s = schedule(ScheduleInput {
            signals: &t,
            extraction: &ex,
            nets: &nets,
            constraints: &[],
        })
        .unwrap();
        assert_eq!(s.order(), &[BlockId(1), BlockId(0)]);

        for mode in [TickMode::Normal, TickMode::Unrolled] {
            let tick = generate_tick(&s, &blocks, mode, 0).unwrap();
            let mut state = Flat(vec![0; 2]);
            tick.call(&mut state, Cycle(5)).unwrap();
            assert_eq!(state.0, vec![15, 30]);
        }
    }

    #[test]
    fn missing_block_is_reported() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (s, mut blocks) = logging_blocks(3, None, &log);
        blocks.shift_remove(&BlockId(1));
        assert_eq!(
            generate_tick(&s, &blocks, TickMode::Normal, 0).unwrap_err(),
            GenerateError::MissingBlock { block: BlockId(1) }
        );
    }

    #[test]
    fn empty_schedule_is_rejected() {
        let t = SignalTable::new();
        let blocks: IndexMap<BlockId, UpdateBlock> = IndexMap::new();
        let ex = extract(blocks.iter().map(|(&id, b)| (id, b))).unwrap();
        let nets = resolve(&t, &[], &ex, &ResolveOptions::default()).unwrap();
        let s = schedule(ScheduleInput {
            signals: &t,
            extraction: &ex,
            nets: &nets,
            constraints: &[],
        })
        .unwrap();
        assert_eq!(
            generate_tick(&s, &blocks, TickMode::Unrolled, 0).unwrap_err(),
            GenerateError::EmptySchedule
        );
    }

    #[test]
    fn fused_tree_keeps_order_for_odd_sizes() {
        for n in 1..=9 {
            let hits = Arc::new(AtomicUsize::new(0));
            let seen = Arc::new(Mutex::new(Vec::new()));
            let layer: Vec<Fused> = (0..n)
                .map(|i| {
                    let hits = Arc::clone(&hits);
                    let seen = Arc::clone(&seen);
                    Box::new(move |_: &mut dyn SignalAccess, _: Cycle| {
                        hits.fetch_add(1, Ordering::Relaxed);
                        seen.lock().unwrap().push(i);
                        Ok(())
                    }) as Fused
                })
                .collect();
            let mut state = Flat::default();
            fuse(layer)(&mut state as &mut dyn SignalAccess, Cycle(0)).unwrap();
            assert_eq!(hits.load(Ordering::Relaxed), n);
            assert_eq!(*seen.lock().unwrap(), (0..n).collect::<Vec<_>>());
        }
    }
}
