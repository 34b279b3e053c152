use crate::Memory;
use crate::errors::{ErrorKind, Exception, Result};
use crate::memory::MemoryType;
use crate::values::{ParamType, Value};
use crate::vm::ValueContainer;
use smallvec::SmallVec;

/// Parameters matched by a signature, top of the stack first.
pub type Params = SmallVec<[Value; 4]>;

/// The stack operators read their operands from and write their results to.
///
/// Items are charged to the ledger as system memory, `INITIAL_CAPACITY`
/// slots up front and `INCREMENT` more at a time.
///
/// # Examples
///
/// ```ignore
/// use psbots_core::vm::OperandStack;
///
/// let mut stack = OperandStack::new(&mut memory)?;
/// stack.push(&mut memory, Value::integer(1))?;
/// stack.push(&mut memory, Value::integer(2))?;
/// stack.popush(&mut memory, 2, &[Value::integer(3)])?;
/// assert_eq!(stack.peek(0), Some(&Value::integer(3)));
/// ```
#[derive(Debug)]
pub struct OperandStack {
    container: ValueContainer,
}

impl OperandStack {
    pub const INITIAL_CAPACITY: usize = 64;
    pub const INCREMENT: usize = 64;

    pub(crate) fn new(memory: &mut Memory) -> Result<Self> {
        Ok(Self {
            container: ValueContainer::new(
                &mut memory.ledger,
                MemoryType::System,
                ValueContainer::VALUE_SLOT,
                Self::INITIAL_CAPACITY,
                Self::INCREMENT,
            )?,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.container.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    /// Items from bottom to top.
    #[inline]
    pub fn items(&self) -> &[Value] {
        self.container.items()
    }

    /// Value `depth` positions below the top (0 is the top).
    #[inline]
    pub fn peek(&self, depth: usize) -> Option<&Value> {
        self.container.peek(depth)
    }

    /// Validate the top of the stack against `signature` (top first) and
    /// return the matched values, top first.
    ///
    /// Nothing is popped and the returned copies are not retained: the caller
    /// pins them if it mutates the stack while still using them.
    ///
    /// # Errors
    ///
    /// - `stackunderflow` if there are fewer items than parameters.
    /// - `typecheck` naming the first mismatching position.
    pub fn check(&self, signature: &[ParamType]) -> Result<Params> {
        if signature.len() > self.len() {
            return Err(Exception::stack_underflow());
        }
        let mut params = Params::with_capacity(signature.len());
        for (depth, expected) in signature.iter().enumerate() {
            let value = self.peek(depth).ok_or_else(Exception::stack_underflow)?;
            if !expected.accepts(value) {
                return Err(Exception::type_check(format!(
                    "operand {} should be {}, found {}",
                    depth,
                    expected,
                    value.kind()
                )));
            }
            params.push(value.clone());
        }
        Ok(params)
    }

    /// Distance from the top to the nearest mark.
    ///
    /// # Errors
    ///
    /// `unmatchedmark` if no mark is on the stack.
    pub fn find_mark(&self) -> Result<usize> {
        self.items()
            .iter()
            .rev()
            .position(Value::is_mark)
            .ok_or_else(|| Exception::new(ErrorKind::UnmatchedMark, "no mark on the operand stack"))
    }

    /// Atomically pop `pop_count` items and push `values` (bottom to top).
    pub fn popush(&mut self, memory: &mut Memory, pop_count: usize, values: &[Value]) -> Result<()> {
        self.container.popush(memory, pop_count, values)
    }

    pub fn push(&mut self, memory: &mut Memory, value: Value) -> Result<()> {
        self.container.push(memory, value)
    }

    pub fn pop(&mut self, memory: &mut Memory, count: usize) -> Result<()> {
        self.container.pop(memory, count)
    }

    pub fn clear(&mut self, memory: &mut Memory) {
        self.container.clear(memory);
    }

    pub(crate) fn dispose(self, memory: &mut Memory) {
        self.container.dispose(memory);
    }
}
