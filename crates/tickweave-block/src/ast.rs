//! Analyzable representation of an update block's body.
//!
//! The front end lowers each block's source into this IR. Signal
//! references are already resolved to [`SignalId`]s; locals are plain
//! names. The IR exists for static analysis only and is never executed.

use smallvec::{smallvec, SmallVec};
use tickweave_core::SignalId;

/// Source position of a statement, used in diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    /// 1-based source line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

impl Span {
    /// A span at the start of the given line.
    pub fn line(line: u32) -> Self {
        Self { line, column: 0 }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical not.
    Not,
    /// Arithmetic negation.
    Neg,
    /// Bitwise inversion.
    Invert,
}

/// Binary arithmetic and logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `//`
    Div,
    /// `%`
    Mod,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `and`
    And,
    /// `or`
    Or,
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A reference to one or more signals.
///
/// A plain reference such as `s.out` names exactly one signal. An
/// indexed reference whose index is not a compile-time constant
/// (`s.mem[s.addr]`) names every element it could touch; the index
/// expression is kept so its own reads are accounted for.
#[derive(Clone, Debug, PartialEq)]
pub struct Access {
    /// Signals this access may touch.
    pub targets: SmallVec<[SignalId; 1]>,
    /// Dynamic index expression, if any.
    pub index: Option<Box<Expr>>,
}

impl Access {
    /// A statically resolved reference to a single signal.
    pub fn one(signal: SignalId) -> Self {
        Self {
            targets: smallvec![signal],
            index: None,
        }
    }

    /// A dynamically indexed reference over `targets`.
    pub fn indexed(targets: impl IntoIterator<Item = SignalId>, index: Expr) -> Self {
        Self {
            targets: targets.into_iter().collect(),
            index: Some(Box::new(index)),
        }
    }
}

impl From<SignalId> for Access {
    fn from(signal: SignalId) -> Self {
        Self::one(signal)
    }
}

/// Expressions.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Literal value.
    Const(u64),
    /// Block-local variable.
    Local(String),
    /// Signal read.
    Signal(Access),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Comparison.
    Compare {
        /// Operator.
        op: CmpOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Conditional expression (`a if c else b`).
    Cond {
        /// Condition.
        test: Box<Expr>,
        /// Value when the condition holds.
        then: Box<Expr>,
        /// Value otherwise.
        otherwise: Box<Expr>,
    },
    /// Call to an opaque function. Contributes no signal reads.
    Call {
        /// Callee name, for diagnostics.
        func: String,
        /// Arguments. Not analyzed.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Read of a single signal.
    pub fn sig(signal: SignalId) -> Self {
        Self::Signal(Access::one(signal))
    }

    /// Read of a block-local variable.
    pub fn local(name: impl Into<String>) -> Self {
        Self::Local(name.into())
    }

    /// Binary operation.
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Comparison.
    pub fn compare(op: CmpOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Opaque call.
    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            func: func.into(),
            args,
        }
    }
}

/// Statements.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `t1 = t2 = value`.
    Assign {
        /// Assignment targets.
        targets: Vec<Access>,
        /// Assigned value.
        value: Expr,
        /// Source position.
        span: Span,
    },
    /// `target op= value`. Reads the target as well as writing it.
    AugAssign {
        /// Assignment target.
        target: Access,
        /// Operator.
        op: BinOp,
        /// Right-hand side.
        value: Expr,
        /// Source position.
        span: Span,
    },
    /// Binding of a block-local variable.
    Let {
        /// Local name.
        name: String,
        /// Bound value.
        value: Expr,
        /// Source position.
        span: Span,
    },
    /// `if test: body else: orelse`. An `elif` is an `If` nested as the
    /// sole statement of `orelse`.
    If {
        /// Condition.
        test: Expr,
        /// Statements run when the condition holds.
        body: Vec<Stmt>,
        /// Statements run otherwise.
        orelse: Vec<Stmt>,
        /// Source position.
        span: Span,
    },
    /// Bare expression statement.
    Expr {
        /// The expression.
        value: Expr,
        /// Source position.
        span: Span,
    },
    /// `for var in iter: body`. Rejected by extraction.
    For {
        /// Loop variable.
        var: String,
        /// Iterated expression.
        iter: Expr,
        /// Loop body.
        body: Vec<Stmt>,
        /// Source position.
        span: Span,
    },
    /// `while test: body`. Rejected by extraction.
    While {
        /// Condition.
        test: Expr,
        /// Loop body.
        body: Vec<Stmt>,
        /// Source position.
        span: Span,
    },
    /// No-op.
    Pass {
        /// Source position.
        span: Span,
    },
}

impl Stmt {
    /// `target = value` on a single signal.
    pub fn assign(target: SignalId, value: Expr, span: Span) -> Self {
        Self::Assign {
            targets: vec![Access::one(target)],
            value,
            span,
        }
    }

    /// `name = value` on a block-local variable.
    pub fn bind(name: impl Into<String>, value: Expr, span: Span) -> Self {
        Self::Let {
            name: name.into(),
            value,
            span,
        }
    }
}

/// The body of an update block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Body {
    /// Top-level statements, in source order.
    pub stmts: Vec<Stmt>,
}

impl Body {
    /// Create a body from statements.
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }

    /// An empty body.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl From<Vec<Stmt>> for Body {
    fn from(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}
