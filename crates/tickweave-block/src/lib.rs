//! Update blocks, their analyzable bodies, and static dependency extraction.
//!
//! An [`UpdateBlock`] pairs an executable [`Behavior`] with a parsed
//! [`Body`]. The body is never executed; [`extract`] walks it to infer which
//! signals each block reads and writes, producing the implicit ordering
//! information the scheduler consumes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod ast;
pub mod block;
pub mod context;
pub mod extract;

pub use ast::{Access, BinOp, Body, CmpOp, Expr, Span, Stmt, UnaryOp};
pub use block::{Behavior, UpdateBlock};
pub use context::BlockContext;
pub use extract::{
    extract, extract_block, BlockAccess, BlockExtractError, Construct, DepSite, DepSites,
    ExtractError, Extraction,
};
