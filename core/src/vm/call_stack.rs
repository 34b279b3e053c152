//! The call stack: pending work plus per-frame continuation data.
//!
//! Each frame holds the value being executed and a [`FrameData`] record with
//! the operator continuation state, the cursor used by strings and blocks,
//! lazily allocated locals and, for operators that intercept exceptions, a
//! stashed exception. Frames are addressed by their index from the bottom so
//! an operator keeps addressing its own frame after pushing more work.

use crate::Memory;
use crate::errors::{Exception, Result};
use crate::memory::{Ledger, MemorySize, MemoryType};
use crate::values::Value;
use crate::vm::{PendingException, ValueContainer};
use core::fmt;

/// Continuation state of an operator frame.
///
/// The legal transitions are:
///
/// | from | to |
/// |---|---|
/// | `Unknown` | `FirstCall` |
/// | `FirstCall` | `Pop`, `Running(n)`, `CallBeforePop` |
/// | `Running(n)` | `Running(m)`, `Pop`, `CallBeforePop` |
/// | `CallBeforePop` | `FirstCall`, `Popping(m)`, `Pop` |
/// | `Popping(n)` | `Popping(m)`, `Pop` |
/// | `Pop` | none |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// Frame not initialized yet.
    Unknown,
    /// About to run for the first time.
    FirstCall,
    /// Operator-defined step, always positive.
    Running(i64),
    /// One more invocation when the frame is popped, even with an exception
    /// pending.
    CallBeforePop,
    /// Operator-defined popping step, always below -1.
    Popping(i64),
    /// Removed on the next cycle without invoking the operator.
    Pop,
}

impl OperatorState {
    /// Whether the state carries a legal payload.
    pub fn is_valid(self) -> bool {
        match self {
            OperatorState::Running(step) => step > 0,
            OperatorState::Popping(step) => step < -1,
            _ => true,
        }
    }

    pub fn can_become(self, next: OperatorState) -> bool {
        use OperatorState::*;
        if !next.is_valid() {
            return false;
        }
        matches!(
            (self, next),
            (Unknown, FirstCall)
                | (FirstCall, Pop | Running(_) | CallBeforePop)
                | (Running(_), Running(_) | Pop | CallBeforePop)
                | (CallBeforePop, FirstCall | Popping(_) | Pop)
                | (Popping(_), Popping(_) | Pop)
        )
    }

    /// Integer encoding: 0 for `FirstCall`, -1 for `CallBeforePop`, the step
    /// otherwise. Sentinels have none.
    pub fn as_integer(self) -> Option<i64> {
        match self {
            OperatorState::FirstCall => Some(0),
            OperatorState::CallBeforePop => Some(-1),
            OperatorState::Running(step) | OperatorState::Popping(step) => Some(step),
            OperatorState::Unknown | OperatorState::Pop => None,
        }
    }

    pub fn from_integer(step: i64) -> Self {
        match step {
            0 => OperatorState::FirstCall,
            -1 => OperatorState::CallBeforePop,
            step if step > 0 => OperatorState::Running(step),
            step => OperatorState::Popping(step),
        }
    }

    /// States in which the frame is unwinding.
    pub fn is_popping(self) -> bool {
        matches!(self, OperatorState::CallBeforePop | OperatorState::Popping(_))
    }
}

impl fmt::Display for OperatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_integer() {
            Some(step) => write!(f, "{}", step),
            None if *self == OperatorState::Pop => write!(f, "pop"),
            None => write!(f, "unknown"),
        }
    }
}

/// Host iterator pulled one value per cycle.
struct Producer(Box<dyn Iterator<Item = Value>>);

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Producer(..)")
    }
}

#[derive(Debug)]
struct FrameData {
    state: OperatorState,
    cursor: usize,
    /// System dictionary, created on first write.
    locals: Option<Value>,
    stash: Option<PendingException>,
    producer: Option<Producer>,
}

impl FrameData {
    fn new() -> Self {
        Self {
            state: OperatorState::Unknown,
            cursor: 0,
            locals: None,
            stash: None,
            producer: None,
        }
    }

    fn dispose(self, memory: &mut Memory) {
        if let Some(locals) = self.locals {
            memory.release(&locals);
        }
        if let Some(stash) = self.stash {
            stash.discharge(&mut memory.ledger);
        }
    }
}

/// Read-only view of one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub value: &'a Value,
    pub state: OperatorState,
    pub cursor: usize,
    pub has_locals: bool,
    /// The frame pulls its work from a host producer.
    pub producer: bool,
}

#[derive(Debug)]
pub struct CallStack {
    container: ValueContainer,
    frames: Vec<FrameData>,
}

impl CallStack {
    pub const INITIAL_CAPACITY: usize = 32;
    pub const INCREMENT: usize = 32;

    /// A frame costs its value plus the continuation state and cursor.
    const FRAME_SLOT: MemorySize = ValueContainer::VALUE_SLOT.plus(MemorySize {
        bytes: 0,
        integers: 2,
        pointers: 0,
        values: 0,
    });

    pub(crate) fn new(memory: &mut Memory) -> Result<Self> {
        Ok(Self {
            container: ValueContainer::new(
                &mut memory.ledger,
                MemoryType::System,
                Self::FRAME_SLOT,
                Self::INITIAL_CAPACITY,
                Self::INCREMENT,
            )?,
            frames: Vec::with_capacity(Self::INITIAL_CAPACITY),
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

    pub fn top(&self) -> Option<&Value> {
        self.container.peek(0)
    }

    /// Index of the top frame.
    pub fn top_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.container.get(index)
    }

    /// Frames from the top down.
    pub fn frames(&self) -> impl Iterator<Item = Frame<'_>> {
        self.container
            .items()
            .iter()
            .zip(&self.frames)
            .rev()
            .map(|(value, data)| Frame {
                value,
                state: data.state,
                cursor: data.cursor,
                has_locals: data.locals.is_some(),
                producer: data.producer.is_some(),
            })
    }

    pub(crate) fn push(&mut self, memory: &mut Memory, value: Value) -> Result<()> {
        self.container.push(memory, value)?;
        self.frames.push(FrameData::new());
        Ok(())
    }

    /// Queue a producer. Its frame holds `null` and the cursor counts the
    /// values pulled so far.
    pub(crate) fn push_producer(
        &mut self,
        memory: &mut Memory,
        producer: Box<dyn Iterator<Item = Value>>,
    ) -> Result<()> {
        self.container.push(memory, Value::NULL)?;
        self.frames.push(FrameData {
            producer: Some(Producer(producer)),
            ..FrameData::new()
        });
        Ok(())
    }

    pub fn is_producer(&self, index: usize) -> bool {
        self.data(index).producer.is_some()
    }

    /// Pull the next value of a producer frame.
    pub(crate) fn produce(&mut self, index: usize) -> Option<Value> {
        let data = self.data_mut(index);
        let value = data.producer.as_mut()?.0.next()?;
        data.cursor += 1;
        Some(value)
    }

    /// Remove the top frame with its locals.
    pub(crate) fn pop(&mut self, memory: &mut Memory) -> Result<()> {
        self.container.pop(memory, 1)?;
        if let Some(data) = self.frames.pop() {
            data.dispose(memory);
        }
        Ok(())
    }

    /// Replace the top frame with a fresh one executing `value`.
    pub(crate) fn replace_top(&mut self, memory: &mut Memory, value: Value) -> Result<()> {
        self.container.popush(memory, 1, &[value])?;
        if let Some(data) = self.frames.last_mut() {
            core::mem::replace(data, FrameData::new()).dispose(memory);
        }
        Ok(())
    }

    fn data(&self, index: usize) -> &FrameData {
        self.frames
            .get(index)
            .unwrap_or_else(|| panic!("no call frame at index {}", index))
    }

    fn data_mut(&mut self, index: usize) -> &mut FrameData {
        self.frames
            .get_mut(index)
            .unwrap_or_else(|| panic!("no call frame at index {}", index))
    }

    pub fn state(&self, index: usize) -> OperatorState {
        self.data(index).state
    }

    /// Move the frame to `next`, refusing transitions the continuation
    /// protocol does not allow.
    ///
    /// # Errors
    ///
    /// `internal` on an illegal transition. The state is left unchanged.
    pub(crate) fn set_state(&mut self, index: usize, next: OperatorState) -> Result<()> {
        let data = self.data_mut(index);
        if !data.state.can_become(next) {
            return Err(Exception::internal(format!(
                "illegal continuation transition from {} to {}",
                data.state, next
            )));
        }
        data.state = next;
        Ok(())
    }

    pub fn cursor(&self, index: usize) -> usize {
        self.data(index).cursor
    }

    pub(crate) fn set_cursor(&mut self, index: usize, cursor: usize) {
        self.data_mut(index).cursor = cursor;
    }

    pub fn local<'m>(&self, memory: &'m Memory, index: usize, name: &str) -> Option<&'m Value> {
        let locals = self.data(index).locals.as_ref()?;
        let id = locals.heap_id()?;
        memory.dictionary(id).get(name)
    }

    pub(crate) fn set_local(
        &mut self,
        memory: &mut Memory,
        index: usize,
        name: &str,
        value: Value,
    ) -> Result<()> {
        let locals = match &self.data(index).locals {
            Some(locals) => locals.clone(),
            None => {
                let id = memory.new_dictionary(MemoryType::System, || {
                    vec![format!("locals of call frame {}", index)]
                })?;
                let locals = Value::dictionary(id, true);
                self.data_mut(index).locals = Some(locals.clone());
                locals
            }
        };
        let Some(id) = locals.heap_id() else {
            return Err(Exception::internal("frame locals are not a dictionary"));
        };
        memory.with_dictionary(id, |dictionary, memory| {
            dictionary.define(memory, name, value)
        })
    }

    /// Force the frame to `Pop` outside the transition table. Used when a
    /// pop-time invocation fails: the frame gets no further invocation.
    pub(crate) fn abandon(&mut self, index: usize) {
        self.data_mut(index).state = OperatorState::Pop;
    }

    /// Keep `pending` on the frame. A record stashed earlier is discharged.
    pub(crate) fn stash(&mut self, ledger: &mut Ledger, index: usize, pending: PendingException) {
        if let Some(previous) = self.data_mut(index).stash.replace(pending) {
            previous.discharge(ledger);
        }
    }

    pub(crate) fn take_stash(&mut self, index: usize) -> Option<PendingException> {
        self.data_mut(index).stash.take()
    }

    pub(crate) fn clear(&mut self, memory: &mut Memory) -> Result<()> {
        while !self.is_empty() {
            self.pop(memory)?;
        }
        Ok(())
    }

    pub(crate) fn dispose(mut self, memory: &mut Memory) -> Result<()> {
        self.clear(memory)?;
        self.container.dispose(memory);
        Ok(())
    }
}
