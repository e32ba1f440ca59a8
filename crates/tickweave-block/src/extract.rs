//! Static dependency extraction over update-block bodies.
//!
//! For each block, [`extract`] computes the set of signals it reads and
//! writes, plus a map from `(read_signal, written_signal)` pairs to the
//! statements that induce them. A write inside a conditional depends on
//! the condition's reads as well as on its own right-hand side.
//!
//! Loops are rejected: a block body must be straight-line code with
//! conditionals only. Calls are opaque and contribute no reads.

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tickweave_core::{BlockId, SignalId, SignalSet};
use tracing::{debug, trace};

use crate::ast::{Access, Expr, Span, Stmt};
use crate::block::UpdateBlock;

/// Signals a single block reads and writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockAccess {
    /// Every signal the block may read, including condition and index reads.
    pub reads: SignalSet,
    /// Every signal the block may write.
    pub writes: SignalSet,
}

/// A statement that induces a read→write dependency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepSite {
    /// Block containing the statement.
    pub block: BlockId,
    /// Position of the statement.
    pub span: Span,
}

/// All statements inducing one dependency pair.
pub type DepSites = SmallVec<[DepSite; 2]>;

/// Result of running extraction over a set of blocks.
#[derive(Clone, Debug, Default)]
pub struct Extraction {
    names: IndexMap<BlockId, String>,
    access: IndexMap<BlockId, BlockAccess>,
    deps: IndexMap<(SignalId, SignalId), DepSites>,
}

impl Extraction {
    /// Read/write sets of one block.
    pub fn access(&self, block: BlockId) -> Option<&BlockAccess> {
        self.access.get(&block)
    }

    /// Name of an analyzed block, or `"<unknown>"`.
    pub fn name(&self, block: BlockId) -> &str {
        self.names.get(&block).map_or("<unknown>", String::as_str)
    }

    /// Iterate blocks and their access sets in input order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BlockAccess)> + '_ {
        self.access.iter().map(|(&b, a)| (b, a))
    }

    /// Number of analyzed blocks.
    pub fn block_count(&self) -> usize {
        self.access.len()
    }

    /// The `(read, written)` dependency map, in discovery order.
    pub fn deps(&self) -> &IndexMap<(SignalId, SignalId), DepSites> {
        &self.deps
    }

    /// Statements that make `written` depend on `read`.
    pub fn sites(&self, read: SignalId, written: SignalId) -> &[DepSite] {
        self.deps
            .get(&(read, written))
            .map(|s| s.as_slice())
            .unwrap_or(&[])
    }
}

/// Language constructs extraction refuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Construct {
    /// A `for` loop.
    ForLoop,
    /// A `while` loop.
    WhileLoop,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForLoop => write!(f, "for loop"),
            Self::WhileLoop => write!(f, "while loop"),
        }
    }
}

/// One unsupported construct found in one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockExtractError {
    /// Offending block.
    pub block: BlockId,
    /// Name of the offending block.
    pub block_name: String,
    /// What was found.
    pub construct: Construct,
    /// Where it was found.
    pub span: Span,
}

impl fmt::Display for BlockExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "update block '{}' (#{}) contains a {} at {}; loops are not supported",
            self.block_name, self.block, self.construct, self.span
        )
    }
}

/// Extraction failed for one or more blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractError {
    /// Every unsupported construct found, in block then source order.
    pub errors: Vec<BlockExtractError>,
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency extraction failed")?;
        for e in &self.errors {
            write!(f, "\n  {e}")?;
        }
        Ok(())
    }
}

impl Error for ExtractError {}

/// Analyze every block and merge the results.
///
/// Errors from all blocks are collected before failing, so a single run
/// reports every offending loop.
pub fn extract<'a, I>(blocks: I) -> Result<Extraction, ExtractError>
where
    I: IntoIterator<Item = (BlockId, &'a UpdateBlock)>,
{
    let mut out = Extraction::default();
    let mut errors = Vec::new();

    for (id, block) in blocks {
        match extract_block(id, block) {
            Ok((access, pairs)) => {
                for (rd, wr, span) in pairs {
                    let site = DepSite { block: id, span };
                    let sites = out.deps.entry((rd, wr)).or_default();
                    if !sites.contains(&site) {
                        sites.push(site);
                    }
                }
                out.names.insert(id, block.name().to_string());
                out.access.insert(id, access);
            }
            Err(mut errs) => errors.append(&mut errs),
        }
    }

    if errors.is_empty() {
        debug!(
            blocks = out.access.len(),
            pairs = out.deps.len(),
            "dependency extraction complete"
        );
        Ok(out)
    } else {
        Err(ExtractError { errors })
    }
}

/// Analyze a single block.
///
/// Returns its access sets and every `(read, written, span)` triple in
/// source order. Pairs whose read and written signal coincide are omitted.
#[allow(clippy::type_complexity)]
pub fn extract_block(
    id: BlockId,
    block: &UpdateBlock,
) -> Result<(BlockAccess, Vec<(SignalId, SignalId, Span)>), Vec<BlockExtractError>> {
    let mut v = Visitor {
        block: id,
        name: block.name(),
        frames: Vec::new(),
        locals: IndexMap::new(),
        access: BlockAccess::default(),
        pairs: Vec::new(),
        errors: Vec::new(),
    };
    v.visit_stmts(&block.body().stmts, false);
    debug_assert!(v.frames.is_empty());

    if v.errors.is_empty() {
        trace!(
            block = %id,
            name = block.name(),
            reads = v.access.reads.len(),
            writes = v.access.writes.len(),
            "block analyzed"
        );
        Ok((v.access, v.pairs))
    } else {
        Err(v.errors)
    }
}

// ── Visitor ─────────────────────────────────────────────────────

struct Visitor<'b> {
    block: BlockId,
    name: &'b str,
    /// One frame per enclosing conditional arm.
    frames: Vec<SignalSet>,
    /// Signals each local transitively depends on.
    locals: IndexMap<&'b str, SignalSet>,
    access: BlockAccess,
    pairs: Vec<(SignalId, SignalId, Span)>,
    errors: Vec<BlockExtractError>,
}

impl<'b> Visitor<'b> {
    /// Visit a statement list. In an else arm, the guard reads of each
    /// statement are folded into the arm's frame for the statements
    /// that follow it.
    fn visit_stmts(&mut self, stmts: &'b [Stmt], fold_guards: bool) {
        for stmt in stmts {
            let guard = self.visit_stmt(stmt);
            if fold_guards {
                if let Some(frame) = self.frames.last_mut() {
                    frame.union_with(&guard);
                }
            }
        }
    }

    /// Visit one statement, returning the reads of its guard (if any).
    fn visit_stmt(&mut self, stmt: &'b Stmt) -> SignalSet {
        match stmt {
            Stmt::Assign {
                targets,
                value,
                span,
            } => {
                let mut reads = self.expr_reads(value);
                for t in targets {
                    reads.union_with(&self.index_reads(t));
                }
                let writes: SignalSet = targets
                    .iter()
                    .flat_map(|t| t.targets.iter().copied())
                    .collect();
                self.record(reads, writes, *span);
                SignalSet::empty()
            }
            Stmt::AugAssign {
                target,
                value,
                span,
                ..
            } => {
                let mut reads = self.expr_reads(value);
                reads.union_with(&self.index_reads(target));
                reads.extend(target.targets.iter().copied());
                let writes: SignalSet = target.targets.iter().copied().collect();
                self.record(reads, writes, *span);
                SignalSet::empty()
            }
            Stmt::Let { name, value, .. } => {
                let mut taint = self.expr_reads(value);
                taint.union_with(&self.context());
                self.access.reads.union_with(&taint);
                // Inside a conditional the other arm may bind the same
                // name, so bindings accumulate instead of replacing.
                if !self.frames.is_empty() {
                    if let Some(prev) = self.locals.get_mut(name.as_str()) {
                        prev.union_with(&taint);
                        return SignalSet::empty();
                    }
                }
                self.locals.insert(name.as_str(), taint);
                SignalSet::empty()
            }
            Stmt::If {
                test, body, orelse, ..
            } => {
                let test_reads = self.expr_reads(test);
                self.access.reads.union_with(&test_reads);

                self.frames.push(test_reads.clone());
                self.visit_stmts(body, false);
                self.frames.pop();

                self.frames.push(test_reads.clone());
                self.visit_stmts(orelse, true);
                self.frames.pop();

                test_reads
            }
            Stmt::Expr { value, .. } => {
                let reads = self.expr_reads(value);
                self.access.reads.union_with(&reads);
                SignalSet::empty()
            }
            Stmt::For { span, .. } => {
                self.reject(Construct::ForLoop, *span);
                SignalSet::empty()
            }
            Stmt::While { span, .. } => {
                self.reject(Construct::WhileLoop, *span);
                SignalSet::empty()
            }
            Stmt::Pass { .. } => SignalSet::empty(),
        }
    }

    fn record(&mut self, mut reads: SignalSet, writes: SignalSet, span: Span) {
        reads.union_with(&self.context());
        for rd in reads.iter() {
            for wr in writes.iter() {
                if rd != wr {
                    self.pairs.push((rd, wr, span));
                }
            }
        }
        self.access.reads.union_with(&reads);
        self.access.writes.union_with(&writes);
    }

    fn reject(&mut self, construct: Construct, span: Span) {
        self.errors.push(BlockExtractError {
            block: self.block,
            block_name: self.name.to_string(),
            construct,
            span,
        });
    }

    /// Union of all enclosing conditional frames.
    fn context(&self) -> SignalSet {
        let mut ctx = SignalSet::empty();
        for f in &self.frames {
            ctx.union_with(f);
        }
        ctx
    }

    fn index_reads(&self, access: &Access) -> SignalSet {
        match &access.index {
            Some(idx) => self.expr_reads(idx),
            None => SignalSet::empty(),
        }
    }

    fn expr_reads(&self, expr: &Expr) -> SignalSet {
        let mut out = SignalSet::empty();
        self.collect(expr, &mut out);
        out
    }

    fn collect(&self, expr: &Expr, out: &mut SignalSet) {
        match expr {
            Expr::Const(_) | Expr::Call { .. } => {}
            Expr::Local(name) => {
                if let Some(taint) = self.locals.get(name.as_str()) {
                    out.union_with(taint);
                }
            }
            Expr::Signal(access) => {
                out.extend(access.targets.iter().copied());
                if let Some(idx) = &access.index {
                    self.collect(idx, out);
                }
            }
            Expr::Unary { operand, .. } => self.collect(operand, out),
            Expr::Binary { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => {
                self.collect(lhs, out);
                self.collect(rhs, out);
            }
            Expr::Cond {
                test,
                then,
                otherwise,
            } => {
                self.collect(test, out);
                self.collect(then, out);
                self.collect(otherwise, out);
            }
        }
    }
}
