//! Conditions raised while running hosted code.
//!
//! A condition is never a Rust panic: raising one stores an [`Exception`] in
//! the state's pending slot, and the interpreter cycle unwinds call frames
//! until an operator intercepts it or the call stack is empty.
//!
//! # Categories
//!
//! - **Recoverable conditions**: everything hosted code can provoke (stack
//!   underflow, type mismatch, memory overflow, undefined names...). These can
//!   be intercepted by `stopped`, `finally` and the loop operators.
//!
//! - **Internal consistency**: [`ErrorKind::Internal`] reports a defect in the
//!   engine itself. No operator may clear it.

use crate::memory::MemorySize;
use thiserror::Error;

/// Category of a raised condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    /// Not enough operands on the operand stack.
    #[error("stackunderflow")]
    StackUnderflow,

    /// An operand has the wrong type or permission.
    #[error("typecheck")]
    TypeCheck,

    /// An operand is outside the accepted range.
    #[error("rangecheck")]
    RangeCheck,

    /// A fixed-size structure is full or a literal does not fit.
    #[error("limitcheck")]
    LimitCheck,

    /// The memory ledger rejected an allocation.
    #[error("vmoverflow")]
    VmOverflow,

    /// No mark on the operand stack.
    #[error("unmatchedmark")]
    UnmatchedMark,

    /// A name could not be resolved through the dictionary stack.
    #[error("undefined")]
    Undefined,

    /// The result of an operation cannot be represented.
    #[error("undefinedresult")]
    UndefinedResult,

    /// Attempt to modify a read-only value.
    #[error("invalidaccess")]
    InvalidAccess,

    /// Attempt to remove one of the permanent dictionaries.
    #[error("dictstackunderflow")]
    DictStackUnderflow,

    /// Re-entrant use of a state that is already cycling.
    #[error("busy")]
    Busy,

    /// Request to leave the innermost loop.
    #[error("break")]
    Break,

    /// `break` used outside of any loop.
    #[error("invalidbreak")]
    InvalidBreak,

    /// Explicit `stop`.
    #[error("stop")]
    Stop,

    /// Structurally impossible engine state.
    #[error("internal")]
    Internal,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 15] = [
        ErrorKind::StackUnderflow,
        ErrorKind::TypeCheck,
        ErrorKind::RangeCheck,
        ErrorKind::LimitCheck,
        ErrorKind::VmOverflow,
        ErrorKind::UnmatchedMark,
        ErrorKind::Undefined,
        ErrorKind::UndefinedResult,
        ErrorKind::InvalidAccess,
        ErrorKind::DictStackUnderflow,
        ErrorKind::Busy,
        ErrorKind::Break,
        ErrorKind::InvalidBreak,
        ErrorKind::Stop,
        ErrorKind::Internal,
    ];

    /// The category name as seen by hosted code (e.g. `rangecheck`).
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::StackUnderflow => "stackunderflow",
            ErrorKind::TypeCheck => "typecheck",
            ErrorKind::RangeCheck => "rangecheck",
            ErrorKind::LimitCheck => "limitcheck",
            ErrorKind::VmOverflow => "vmoverflow",
            ErrorKind::UnmatchedMark => "unmatchedmark",
            ErrorKind::Undefined => "undefined",
            ErrorKind::UndefinedResult => "undefinedresult",
            ErrorKind::InvalidAccess => "invalidaccess",
            ErrorKind::DictStackUnderflow => "dictstackunderflow",
            ErrorKind::Busy => "busy",
            ErrorKind::Break => "break",
            ErrorKind::InvalidBreak => "invalidbreak",
            ErrorKind::Stop => "stop",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn from_name(name: &str) -> Option<ErrorKind> {
        ErrorKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether operators are forbidden to clear this condition.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Internal)
    }
}

/// A raised condition: category, message and the call trail at raise time.
///
/// Exceptions are read-only once raised. The trail lists call frames from
/// the innermost (top of the call stack) outwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Exception {
    kind: ErrorKind,
    message: String,
    trail: Vec<String>,
}

impl Exception {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trail: Vec::new(),
        }
    }

    pub fn stack_underflow() -> Self {
        Self::new(ErrorKind::StackUnderflow, "not enough operands")
    }

    pub fn type_check(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeCheck, message)
    }

    pub fn range_check(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeCheck, message)
    }

    pub fn invalid_access(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidAccess, message)
    }

    pub fn vm_overflow(requested: usize, available: usize) -> Self {
        Self::new(
            ErrorKind::VmOverflow,
            format!("requested {} units, {} available", requested, available),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Call frames captured when the exception was raised, innermost first.
    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    pub(crate) fn with_trail(mut self, trail: Vec<String>) -> Self {
        self.trail = trail;
        self
    }

    /// Ledger cost of keeping this record alive.
    pub(crate) fn memory_size(&self) -> MemorySize {
        let bytes = self.message.len() + self.trail.iter().map(String::len).sum::<usize>();
        MemorySize {
            bytes,
            pointers: self.trail.len(),
            ..MemorySize::default()
        }
    }
}

pub type Result<T, E = Exception> = core::result::Result<T, E>;
