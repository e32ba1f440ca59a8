//! The simulator: an elaborated design, its tick procedure and its state.
//!
//! [`Simulator`] owns the [`Design`] and keeps three things in step with
//! it: the [`Elaboration`], the generated [`TickFn`], and the
//! [`SignalStore`]. Structural edits go through
//! [`restructure`](Simulator::restructure), which re-elaborates and
//! regenerates the tick while carrying signal values over. Edits made
//! through [`design_mut`](Simulator::design_mut) (to the hierarchy, the
//! signal table or the connections) leave the tick stale until
//! [`reelaborate`](Simulator::reelaborate) is called.

use std::time::Instant;

use tickweave_core::{BlockError, Cycle, SignalId, SignalReader, SignalWriter, StepError};
use tickweave_sched::{Schedule, ScheduleDiagnostics};
use tracing::{debug, instrument, warn};

use crate::config::SimConfig;
use crate::elaborate::{elaborate, Design, Elaboration, ElaborationError};
use crate::metrics::TickMetrics;
use crate::store::SignalStore;
use crate::tick::{generate_tick, TickFn};

/// A runnable, single-threaded simulation of one design.
#[derive(Debug)]
pub struct Simulator {
    design: Design,
    config: SimConfig,
    elaboration: Elaboration,
    tick_fn: TickFn,
    store: SignalStore,
    cycle: Cycle,
    halted: bool,
    last_metrics: TickMetrics,
}

impl Simulator {
    /// Elaborate `design` and generate its tick procedure.
    ///
    /// All signals start at zero except constant nets.
    #[instrument(skip_all, fields(mode = %config.tick_mode))]
    pub fn new(design: Design, config: SimConfig) -> Result<Self, ElaborationError> {
        let elaboration = elaborate(&design, &config)?;
        let tick_fn = generate_tick(
            &elaboration.schedule,
            &design.hierarchy,
            config.tick_mode,
            elaboration.revision,
        )?;
        let store = SignalStore::new(&design.signals, &elaboration.nets);
        debug!(blocks = tick_fn.len(), "simulator ready");
        Ok(Self {
            design,
            config,
            elaboration,
            tick_fn,
            store,
            cycle: Cycle(0),
            halted: false,
            last_metrics: TickMetrics::default(),
        })
    }

    /// Set a signal (and so its whole net) from outside the design.
    pub fn poke(&mut self, signal: SignalId, value: u64) -> Result<(), BlockError> {
        self.store.write(signal, value)
    }

    /// Current value of a signal.
    pub fn peek(&self, signal: SignalId) -> Option<u64> {
        self.store.read(signal)
    }

    /// Current value of the signal with this dotted path.
    pub fn peek_path(&self, path: &str) -> Option<u64> {
        self.design
            .signals
            .lookup(path)
            .and_then(|s| self.store.read(s))
    }

    /// Run one cycle.
    ///
    /// If a block fails, the blocks after it are skipped and the
    /// simulator halts: further ticks return [`StepError::Halted`] until
    /// [`reset`](Self::reset) or [`reelaborate`](Self::reelaborate).
    pub fn tick(&mut self) -> Result<(), StepError> {
        if self.halted {
            return Err(StepError::Halted);
        }
        let current = self.design.revision();
        if self.tick_fn.revision() != current {
            return Err(StepError::StaleSchedule {
                generated: self.tick_fn.revision(),
                current,
            });
        }

        let start = Instant::now();
        if let Err(e) = self.tick_fn.call(&mut self.store, self.cycle) {
            self.halted = true;
            warn!(cycle = %self.cycle, error = %e, "cycle failed, simulation halted");
            return Err(e);
        }
        self.cycle = Cycle(self.cycle.0 + 1);
        self.last_metrics = TickMetrics {
            cycle: self.cycle.0,
            blocks_run: self.tick_fn.len(),
            elapsed_us: u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
        };
        Ok(())
    }

    /// Run up to `cycles` cycles, clamped to
    /// [`max_cycles_per_run`](SimConfig::max_cycles_per_run).
    ///
    /// Returns the number of cycles run. Stops at the first failure.
    pub fn run(&mut self, cycles: u64) -> Result<u64, StepError> {
        let budget = self.config.max_cycles_per_run;
        let n = cycles.min(budget);
        if n < cycles {
            debug!(requested = cycles, budget, "run clamped to cycle budget");
        }
        for _ in 0..n {
            self.tick()?;
        }
        Ok(n)
    }

    /// Number of completed cycles.
    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Whether a failed cycle has halted the simulation.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Return every signal to its initial value and the cycle count to 0.
    ///
    /// Clears a halt. The schedule is kept.
    pub fn reset(&mut self) {
        self.store.reset();
        self.cycle = Cycle(0);
        self.halted = false;
        self.last_metrics = TickMetrics::default();
        debug!("simulator reset");
    }

    /// Apply a structural edit, then [`reelaborate`](Self::reelaborate).
    ///
    /// If `edit` fails its error is returned and nothing is re-elaborated;
    /// any edits it made before failing leave the tick stale.
    pub fn restructure<F>(&mut self, edit: F) -> Result<(), ElaborationError>
    where
        F: FnOnce(&mut Design) -> Result<(), ElaborationError>,
    {
        edit(&mut self.design)?;
        self.reelaborate()
    }

    /// Re-elaborate the current design and regenerate the tick.
    ///
    /// Signal values carry over by signal id; constant nets take their
    /// constant. On failure the previous elaboration is kept and, if the
    /// design changed, ticks report [`StepError::StaleSchedule`].
    #[instrument(skip_all, fields(revision = self.design.revision()))]
    pub fn reelaborate(&mut self) -> Result<(), ElaborationError> {
        let elaboration = elaborate(&self.design, &self.config)?;
        let tick_fn = generate_tick(
            &elaboration.schedule,
            &self.design.hierarchy,
            self.config.tick_mode,
            elaboration.revision,
        )?;
        let mut store = SignalStore::new(&self.design.signals, &elaboration.nets);
        store.carry_from(&self.store);
        self.elaboration = elaboration;
        self.tick_fn = tick_fn;
        self.store = store;
        self.halted = false;
        debug!(blocks = self.tick_fn.len(), "re-elaborated");
        Ok(())
    }

    /// The design being simulated.
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// Mutable access to the design. The tick is stale after any
    /// structural edit until [`reelaborate`](Self::reelaborate).
    pub fn design_mut(&mut self) -> &mut Design {
        &mut self.design
    }

    /// The active configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The current elaboration.
    pub fn elaboration(&self) -> &Elaboration {
        &self.elaboration
    }

    /// The current schedule.
    pub fn schedule(&self) -> &Schedule {
        &self.elaboration.schedule
    }

    /// Read-only diagnostics for the current schedule.
    pub fn diagnostics(&self) -> &ScheduleDiagnostics {
        self.elaboration.schedule.diagnostics()
    }

    /// The generated tick procedure.
    pub fn tick_fn(&self) -> &TickFn {
        &self.tick_fn
    }

    /// Metrics from the most recent successful tick.
    pub fn last_metrics(&self) -> &TickMetrics {
        &self.last_metrics
    }
}
