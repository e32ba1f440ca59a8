//! The elaboration driver: design in, schedule out.
//!
//! [`elaborate`] runs the stages in order (aggregate the hierarchy,
//! extract block dependencies, resolve nets, schedule) and stops at the
//! first stage that fails. Every stage's error is wrapped in
//! [`ElaborationError`].

use std::error::Error;
use std::fmt;
use std::time::Instant;

use tickweave_block::{extract, ExtractError, Extraction};
use tickweave_core::{SignalError, SignalId, SignalTable};
use tickweave_net::{resolve, Connection, NetError, NetMap, ResolveOptions};
use tickweave_registry::{Hierarchy, RegistryError};
use tickweave_sched::{schedule, Schedule, ScheduleError, ScheduleInput};
use tracing::{info, instrument};

use crate::config::{ConfigError, SimConfig};
use crate::metrics::ElaborationMetrics;
use crate::tick::GenerateError;

// ── Design ─────────────────────────────────────────────────────────

/// Everything elaboration consumes.
#[derive(Debug)]
pub struct Design {
    /// Components, update blocks and explicit constraints.
    pub hierarchy: Hierarchy,
    /// Every declared signal.
    pub signals: SignalTable,
    connections: Vec<Connection>,
}

impl Design {
    /// An empty design whose top component is named `top_name`.
    pub fn new(top_name: impl Into<String>) -> Self {
        Self {
            hierarchy: Hierarchy::new(top_name),
            signals: SignalTable::new(),
            connections: Vec::new(),
        }
    }

    /// A design from an already-built hierarchy and signal table, with no
    /// connections.
    pub fn from_parts(hierarchy: Hierarchy, signals: SignalTable) -> Self {
        Self {
            hierarchy,
            signals,
            connections: Vec::new(),
        }
    }

    /// Connect two signals directly. Endpoints are checked by
    /// [`validate`](Self::validate).
    pub fn connect(&mut self, a: SignalId, b: SignalId) {
        self.connections.push(Connection::new(a, b));
    }

    /// Direct signal-to-signal connections, in the order they were made.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Structural revision of the whole design.
    ///
    /// Grows with every hierarchy edit, every signal declaration and every
    /// connection. Signals and connections are append-only, so their
    /// counts are monotonic and the sum changes on any edit.
    pub fn revision(&self) -> u64 {
        self.hierarchy.revision() + self.signals.len() as u64 + self.connections.len() as u64
    }

    /// Check every connection endpoint against the signal table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for c in &self.connections {
            for signal in [c.a, c.b] {
                if !self.signals.contains(signal) {
                    return Err(ConfigError::UnknownConnectionEndpoint { signal });
                }
            }
        }
        Ok(())
    }
}

// ── Elaboration ────────────────────────────────────────────────────

/// The products of one elaboration.
#[derive(Clone, Debug)]
pub struct Elaboration {
    /// Serial order, batches and diagnostics.
    pub schedule: Schedule,
    /// Signal-to-net partition with drivers and readers.
    pub nets: NetMap,
    /// Per-block access sets and dependency sites.
    pub extraction: Extraction,
    /// Counts and timing.
    pub metrics: ElaborationMetrics,
    /// Design revision this elaboration reflects.
    pub revision: u64,
}

// ── ElaborationError ───────────────────────────────────────────────

/// Any error that stops a design from reaching a runnable tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElaborationError {
    /// Configuration or design validation failed.
    Config(ConfigError),
    /// A structural edit was rejected.
    Registry(RegistryError),
    /// A signal declaration was rejected.
    Signal(SignalError),
    /// One or more blocks contain unsupported constructs.
    Extract(ExtractError),
    /// Net resolution failed.
    Net(NetError),
    /// The blocks cannot be ordered.
    Schedule(ScheduleError),
    /// The schedule could not be compiled.
    Generate(GenerateError),
}

impl fmt::Display for ElaborationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Signal(e) => write!(f, "signal table: {e}"),
            Self::Extract(e) => write!(f, "dependency extraction: {e}"),
            Self::Net(e) => write!(f, "net resolution: {e}"),
            Self::Schedule(e) => write!(f, "scheduling: {e}"),
            Self::Generate(e) => write!(f, "tick generation: {e}"),
        }
    }
}

impl Error for ElaborationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Registry(e) => Some(e),
            Self::Signal(e) => Some(e),
            Self::Extract(e) => Some(e),
            Self::Net(e) => Some(e),
            Self::Schedule(e) => Some(e),
            Self::Generate(e) => Some(e),
        }
    }
}

impl From<ConfigError> for ElaborationError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<RegistryError> for ElaborationError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<SignalError> for ElaborationError {
    fn from(e: SignalError) -> Self {
        Self::Signal(e)
    }
}

impl From<ExtractError> for ElaborationError {
    fn from(e: ExtractError) -> Self {
        Self::Extract(e)
    }
}

impl From<NetError> for ElaborationError {
    fn from(e: NetError) -> Self {
        Self::Net(e)
    }
}

impl From<ScheduleError> for ElaborationError {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

impl From<GenerateError> for ElaborationError {
    fn from(e: GenerateError) -> Self {
        Self::Generate(e)
    }
}

// ── Driver ─────────────────────────────────────────────────────────

/// Elaborate `design` into a schedule.
///
/// The design is not modified. Elaborating the same design twice gives
/// identical schedules.
#[instrument(skip_all, fields(revision = design.revision()))]
pub fn elaborate(design: &Design, config: &SimConfig) -> Result<Elaboration, ElaborationError> {
    let start = Instant::now();

    // 1. Validate configuration and connections.
    config.validate()?;
    design.validate()?;

    // 2. Flatten the hierarchy and analyze every live block.
    let hierarchy = &design.hierarchy;
    let aggregate = hierarchy.aggregate();
    let extraction = extract(
        aggregate
            .blocks
            .iter()
            .filter_map(|&id| hierarchy.block(id).map(|b| (id, b))),
    )?;

    // 3. Partition signals into nets and check drivers.
    let nets = resolve(
        &design.signals,
        &design.connections,
        &extraction,
        &ResolveOptions {
            deny_undriven_outputs: config.deny_undriven_outputs,
            top: hierarchy.top(),
        },
    )?;

    // 4. Order the blocks.
    let schedule = schedule(ScheduleInput {
        signals: &design.signals,
        extraction: &extraction,
        nets: &nets,
        constraints: &aggregate.constraints,
    })?;

    let metrics = ElaborationMetrics {
        blocks: schedule.len(),
        nets: nets.net_count(),
        inferred_edges: schedule.retained_edges().len() + schedule.sequential_edges().len(),
        sequential_edges: schedule.sequential_edges().len(),
        explicit_edges: aggregate.constraints.len(),
        batches: schedule.batches().len(),
        elapsed_us: u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
    };
    info!(
        blocks = metrics.blocks,
        nets = metrics.nets,
        sequential = metrics.sequential_edges,
        batches = metrics.batches,
        elapsed_us = metrics.elapsed_us,
        "design elaborated"
    );
    Ok(Elaboration {
        schedule,
        nets,
        extraction,
        metrics,
        revision: design.revision(),
    })
}
