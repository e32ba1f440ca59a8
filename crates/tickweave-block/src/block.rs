//! The [`UpdateBlock`] type and the [`Behavior`] trait.
//!
//! An update block is a named unit of combinational or sequential logic
//! owned by a component. It is executed exactly once per cycle, in the
//! order chosen by the scheduler.

use std::fmt;
use std::sync::Arc;

use tickweave_core::BlockError;

use crate::ast::Body;
use crate::context::BlockContext;

/// Executable side of an update block.
///
/// # Contract
///
/// - `run()` MUST be deterministic given the signal values it reads.
/// - `&self`: behaviors are stateless; state lives in signals.
/// - The signals touched at run time SHOULD agree with the block's
///   [`Body`]. The scheduler only sees the body.
///
/// Blanket-implemented for closures of the matching signature.
///
/// # Examples
///
/// ```
/// use tickweave_block::{Behavior, BlockContext};
/// use tickweave_core::{BlockError, SignalId};
///
/// struct Invert {
///     input: SignalId,
///     output: SignalId,
/// }
///
/// impl Behavior for Invert {
///     fn run(&self, ctx: &mut BlockContext<'_>) -> Result<(), BlockError> {
///         let v = ctx.read(self.input)?;
///         ctx.write(self.output, !v & 1)
///     }
/// }
///
/// let inv = Invert { input: SignalId(0), output: SignalId(1) };
/// assert_eq!(inv.output, SignalId(1));
/// ```
pub trait Behavior: Send + Sync + 'static {
    /// Execute the block once against the current signal state.
    fn run(&self, ctx: &mut BlockContext<'_>) -> Result<(), BlockError>;
}

impl<F> Behavior for F
where
    F: Fn(&mut BlockContext<'_>) -> Result<(), BlockError> + Send + Sync + 'static,
{
    fn run(&self, ctx: &mut BlockContext<'_>) -> Result<(), BlockError> {
        self(ctx)
    }
}

/// A named update block: analyzable body plus executable behavior.
///
/// Cloning is cheap; the behavior is shared.
#[derive(Clone)]
pub struct UpdateBlock {
    name: String,
    body: Body,
    behavior: Arc<dyn Behavior>,
}

impl UpdateBlock {
    /// Create a block from its body and a closure behavior.
    pub fn new<F>(name: impl Into<String>, body: impl Into<Body>, f: F) -> Self
    where
        F: Fn(&mut BlockContext<'_>) -> Result<(), BlockError> + Send + Sync + 'static,
    {
        Self::from_behavior(name, body, f)
    }

    /// Create a block from its body and any [`Behavior`] implementation.
    pub fn from_behavior(
        name: impl Into<String>,
        body: impl Into<Body>,
        behavior: impl Behavior,
    ) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            behavior: Arc::new(behavior),
        }
    }

    /// A block that shares an already-allocated behavior.
    pub fn with_shared(
        name: impl Into<String>,
        body: impl Into<Body>,
        behavior: Arc<dyn Behavior>,
    ) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            behavior,
        }
    }

    /// Block name, unique within its owning component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Analyzable body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Shared handle to the executable behavior.
    pub fn behavior(&self) -> &Arc<dyn Behavior> {
        &self.behavior
    }

    /// Execute the block once.
    pub fn run(&self, ctx: &mut BlockContext<'_>) -> Result<(), BlockError> {
        self.behavior.run(ctx)
    }
}

impl fmt::Debug for UpdateBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateBlock")
            .field("name", &self.name)
            .field("stmts", &self.body.stmts.len())
            .finish_non_exhaustive()
    }
}
