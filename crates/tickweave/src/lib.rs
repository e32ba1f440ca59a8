//! Tickweave: update-block scheduling and tick generation for
//! cycle-level hardware simulation.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Tickweave sub-crates. For most users, adding `tickweave` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use tickweave::prelude::*;
//!
//! let mut design = Design::new("top");
//! let top = design.hierarchy.top();
//! let count = design
//!     .signals
//!     .declare("top.count", SignalKind::Wire, "Bits64", top)
//!     .unwrap();
//! let display = design
//!     .signals
//!     .declare("top.display", SignalKind::Wire, "Bits64", top)
//!     .unwrap();
//!
//! // count = count + 1
//! let incr = UpdateBlock::new(
//!     "incr",
//!     vec![Stmt::assign(
//!         count,
//!         Expr::binary(BinOp::Add, Expr::sig(count), Expr::Const(1)),
//!         Span::line(1),
//!     )],
//!     move |ctx| {
//!         let v = ctx.read(count)?;
//!         ctx.write(count, v + 1)
//!     },
//! );
//! // display = count
//! let report = UpdateBlock::new(
//!     "report",
//!     vec![Stmt::assign(display, Expr::sig(count), Span::line(2))],
//!     move |ctx| {
//!         let v = ctx.read(count)?;
//!         ctx.write(display, v)
//!     },
//! );
//!
//! // Registered out of order: the scheduler puts `incr` first.
//! let report = design.hierarchy.register_block(top, report).unwrap();
//! let incr = design.hierarchy.register_block(top, incr).unwrap();
//!
//! let mut sim = Simulator::new(design, SimConfig::default()).unwrap();
//! assert_eq!(sim.schedule().order(), &[incr, report]);
//!
//! sim.run(3).unwrap();
//! assert_eq!(sim.peek(display), Some(3));
//! assert_eq!(sim.cycle(), Cycle(3));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tickweave-core` | IDs, signal table, errors, signal-access traits |
//! | [`block`] | `tickweave-block` | Update-block bodies, behaviors, dependency extraction |
//! | [`registry`] | `tickweave-registry` | Component hierarchy and block registration |
//! | [`net`] | `tickweave-net` | Net resolution and driver checks |
//! | [`sched`] | `tickweave-sched` | Scheduling, cycle reports, diagnostics |
//! | [`engine`] | `tickweave-engine` | Elaboration, tick generation, the simulator |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`tickweave-core`).
///
/// Contains the [`types::SignalTable`], the id newtypes, the error types
/// and the signal-access traits ([`types::SignalReader`],
/// [`types::SignalWriter`]).
pub use tickweave_core as types;

/// Update blocks and dependency extraction (`tickweave-block`).
///
/// An [`block::UpdateBlock`] pairs a body, used to infer dependencies,
/// with a [`block::Behavior`] that runs each cycle.
pub use tickweave_block as block;

/// Component hierarchy (`tickweave-registry`).
///
/// [`registry::Hierarchy`] owns components, their blocks and their
/// ordering constraints.
pub use tickweave_registry as registry;

/// Net resolution (`tickweave-net`).
pub use tickweave_net as net;

/// Scheduling and diagnostics (`tickweave-sched`).
///
/// Produces a [`sched::Schedule`] or a [`sched::ScheduleError`] naming
/// the blocks involved in every cycle.
pub use tickweave_sched as sched;

/// Elaboration and simulation (`tickweave-engine`).
///
/// [`engine::elaborate`] runs the whole pipeline once;
/// [`engine::Simulator`] owns a design and ticks it.
pub use tickweave_engine as engine;

/// Common imports for typical Tickweave usage.
///
/// ```rust
/// use tickweave::prelude::*;
/// ```
///
/// This imports the most frequently used types: design building blocks,
/// the simulator and its configuration, and the error types a caller is
/// likely to match on.
pub mod prelude {
    // Core types and traits
    pub use tickweave_core::{
        BlockId, ComponentId, Cycle, NetId, SignalId, SignalKind, SignalReader, SignalTable,
        SignalWriter,
    };

    // Errors
    pub use tickweave_core::{BlockError, SignalError, StepError};

    // Blocks
    pub use tickweave_block::{
        Behavior, BinOp, BlockContext, CmpOp, Expr, Span, Stmt, UnaryOp, UpdateBlock,
    };

    // Hierarchy, nets, schedule
    pub use tickweave_net::NetError;
    pub use tickweave_registry::{Hierarchy, RegistryError};
    pub use tickweave_sched::{Schedule, ScheduleDiagnostics, ScheduleError};

    // Engine
    pub use tickweave_engine::{
        Design, Elaboration, ElaborationError, SimConfig, Simulator, TickMetrics, TickMode,
    };
}
