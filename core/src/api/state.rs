//! The interpreter state.

use super::{HostBuilder, StateOptions};
use crate::Memory;
use crate::errors::{ErrorKind, Exception, Result};
use crate::memory::{MemorySnapshot, MemoryType};
use crate::stdlib::registry;
use crate::values::{ArrayAccess, DebugSource, Value, ValueData, ValueKind, format_value};
use crate::vm::{
    CallStack, DictionaryStack, Frame, OperandStack, OperatorState, PendingException,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Work handed to [`State::exec`].
pub enum Executable {
    /// Source text, tokenized one token per cycle.
    Source { text: String, origin: String },
    /// Values executed in order, as a block would be.
    Values(Vec<Value>),
    /// Values produced on demand, one per cycle. The producer is dropped
    /// once exhausted or when an exception unwinds its frame.
    Producer(Box<dyn Iterator<Item = Value>>),
}

impl Executable {
    pub fn source(text: impl Into<String>) -> Self {
        Executable::Source {
            text: text.into(),
            origin: "-".to_string(),
        }
    }
}

/// One interpreter instance: memory, stacks and the pending exception.
///
/// A state is strictly single-threaded. Hosts drive it with [`State::cycle`]
/// (one unit of work) or the bounded [`State::run`] loop, and must call
/// [`State::destroy`] to check that nothing leaked.
///
/// # Example
///
/// ```
/// use psbots_core::api::{Executable, State, StateOptions};
/// use psbots_core::values::Value;
///
/// let mut state = State::new(StateOptions::default()).unwrap();
/// state.exec(Executable::source("1 2 add")).unwrap();
/// state.run_to_completion().unwrap();
/// assert_eq!(state.operands(), &[Value::integer(3)]);
/// state.destroy().unwrap();
/// ```
#[derive(Debug)]
pub struct State {
    options: StateOptions,
    pub(crate) memory: Memory,
    pub(crate) operands: OperandStack,
    pub(crate) calls: CallStack,
    pub(crate) dictionaries: DictionaryStack,
    pub(crate) exception: Option<PendingException>,
    /// Nesting of `{` while a block is being defined.
    pub(crate) block_depth: usize,
    pub(crate) cycling: bool,
    /// Frame of the operator being invoked.
    pub(crate) current_frame: Option<usize>,
}

impl State {
    pub fn new(options: StateOptions) -> Result<Self> {
        Self::with_host(options, |_| Ok(()))
    }

    /// Create a state whose host scope is filled by `init`.
    ///
    /// # Errors
    ///
    /// `vmoverflow` when the memory capacity cannot hold the bootstrap
    /// structures, or whatever `init` reports.
    pub fn with_host(
        options: StateOptions,
        init: impl FnOnce(&mut HostBuilder<'_>) -> Result<()>,
    ) -> Result<Self> {
        let mut memory = Memory::new(options.max_memory, options.debug_memory);
        let operands = OperandStack::new(&mut memory)?;
        let calls = CallStack::new(&mut memory)?;
        let mut dictionaries = DictionaryStack::new(&mut memory)?;

        let host = memory.new_dictionary(MemoryType::System, || vec!["host".to_string()])?;
        let mut builder = HostBuilder::new(&mut memory, host);
        let built = init(&mut builder);
        builder.finish();
        built?;

        let system = memory.new_dictionary(MemoryType::System, || vec!["system".to_string()])?;
        for operator in registry().iter() {
            let value = Value::operator(Arc::clone(operator));
            memory.with_dictionary(system, |dictionary, memory| {
                dictionary.define(memory, operator.name(), value)
            })?;
        }
        let global = memory.new_dictionary(MemoryType::System, || vec!["global".to_string()])?;
        let user = memory.new_dictionary(MemoryType::System, || vec!["user".to_string()])?;

        let scopes = [
            Value::dictionary(host, false),
            Value::dictionary(system, false),
            Value::dictionary(global, true),
            Value::dictionary(user, true),
        ];
        let installed = dictionaries.install(&mut memory, scopes.clone());
        memory.release_all(&scopes);
        installed?;

        debug!(
            used = memory.ledger().used(),
            operators = registry().len(),
            "state created"
        );
        Ok(Self {
            options,
            memory,
            operands,
            calls,
            dictionaries,
            exception: None,
            block_depth: 0,
            cycling: false,
            current_frame: None,
        })
    }

    pub fn options(&self) -> &StateOptions {
        &self.options
    }

    // ========================================================================
    // Host API
    // ========================================================================

    /// Queue work on the call stack.
    pub fn exec(&mut self, executable: Executable) -> Result<()> {
        if self.cycling {
            return Err(Exception::new(ErrorKind::Busy, "state is cycling"));
        }
        match executable {
            Executable::Source { text, origin } => {
                let text: Arc<str> = Arc::from(text);
                let source = Arc::new(DebugSource::new(origin, Arc::clone(&text)));
                let value = Value::source(text).with_debug_source(Some(source));
                self.calls.push(&mut self.memory, value)
            }
            Executable::Values(values) => self.exec_values(&values),
            Executable::Producer(producer) => self.calls.push_producer(&mut self.memory, producer),
        }
    }

    fn exec_values(&mut self, values: &[Value]) -> Result<()> {
        let block = self.create_array(ArrayAccess::Block, values)?;
        let pushed = self.calls.push(&mut self.memory, block.clone());
        self.memory.release(&block);
        pushed
    }

    /// Run at most `max_cycles` cycles and return how many were run.
    ///
    /// Stops early once the call stack is empty. A raised exception is left
    /// pending for inspection unless `throw_on_exception` is set.
    pub fn run(&mut self, max_cycles: usize) -> Result<usize> {
        let mut count = 0;
        while count < max_cycles && !self.calls.is_empty() {
            self.cycle()?;
            count += 1;
        }
        if self.options.throw_on_exception {
            if let Some(pending) = &self.exception {
                return Err(pending.exception().clone());
            }
        }
        Ok(count)
    }

    /// Run until the call stack is empty, within `default_max_cycles`.
    ///
    /// # Errors
    ///
    /// `limitcheck` when the budget runs out with work left, plus what
    /// [`State::run`] reports.
    pub fn run_to_completion(&mut self) -> Result<usize> {
        let budget = self.options.default_max_cycles.unwrap_or(usize::MAX);
        let count = self.run(budget)?;
        if !self.calls.is_empty() {
            return Err(Exception::new(
                ErrorKind::LimitCheck,
                format!("{} cycles were not enough", budget),
            ));
        }
        Ok(count)
    }

    pub fn exception(&self) -> Option<&Exception> {
        self.exception.as_ref().map(PendingException::exception)
    }

    /// Drop the pending exception. Fatal exceptions cannot be cleared.
    pub fn clear_exception(&mut self) -> Option<Exception> {
        self.intercept()
    }

    /// Release everything and check that no memory is left.
    ///
    /// # Errors
    ///
    /// `internal` if the ledger does not return to zero, which means
    /// containers leaked (typically through reference cycles).
    pub fn destroy(mut self) -> Result<()> {
        if let Some(pending) = self.exception.take() {
            pending.discharge(&mut self.memory.ledger);
        }
        self.calls.dispose(&mut self.memory)?;
        self.operands.dispose(&mut self.memory);
        self.dictionaries.dispose(&mut self.memory);

        let snapshot = self.memory.snapshot();
        let live = self.memory.live_containers();
        if snapshot.used != 0 || live != 0 {
            warn!(used = snapshot.used, live, "memory leaked");
            return Err(Exception::internal(format!(
                "{} units leaked in {} containers",
                snapshot.used, live
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Operand stack, bottom to top.
    pub fn operands(&self) -> &[Value] {
        self.operands.items()
    }

    /// Call stack frames, top first.
    pub fn frames(&self) -> impl Iterator<Item = Frame<'_>> {
        self.calls.frames()
    }

    /// Dictionary stack, bottom (host scope) to top.
    pub fn dictionaries(&self) -> &[Value] {
        self.dictionaries.items()
    }

    pub fn memory(&self) -> MemorySnapshot {
        self.memory.snapshot()
    }

    pub fn format_value(&self, value: &Value) -> String {
        format_value(&self.memory, value)
    }

    /// Elements of an array value.
    pub fn array_items(&self, array: &Value) -> Result<&[Value]> {
        match array.data() {
            ValueData::Array { id, .. } => Ok(self.memory.array(*id).items()),
            _ => Err(Exception::type_check(format!(
                "expected an array, found {}",
                array.kind()
            ))),
        }
    }

    /// Value bound to `name` in a dictionary value.
    pub fn dictionary_get(&self, dictionary: &Value, name: &str) -> Result<Option<&Value>> {
        match dictionary.data() {
            ValueData::Dictionary { id, .. } => Ok(self.memory.dictionary(*id).get(name)),
            _ => Err(Exception::type_check(format!(
                "expected a dictionary, found {}",
                dictionary.kind()
            ))),
        }
    }

    /// Sorted names of a dictionary value.
    pub fn dictionary_names(&self, dictionary: &Value) -> Result<Vec<Arc<str>>> {
        match dictionary.data() {
            ValueData::Dictionary { id, .. } => Ok(self.memory.dictionary(*id).names()),
            _ => Err(Exception::type_check(format!(
                "expected a dictionary, found {}",
                dictionary.kind()
            ))),
        }
    }

    // ========================================================================
    // Operator API: operand stack
    // ========================================================================

    pub fn push(&mut self, value: Value) -> Result<()> {
        self.operands.push(&mut self.memory, value)
    }

    /// Atomically pop `pop_count` operands and push `values`.
    pub fn popush(&mut self, pop_count: usize, values: &[Value]) -> Result<()> {
        self.operands.popush(&mut self.memory, pop_count, values)
    }

    pub fn pop(&mut self, count: usize) -> Result<()> {
        self.operands.pop(&mut self.memory, count)
    }

    /// Like [`State::popush`] for a value returned by one of the `create_*`
    /// methods: the creator reference is released whatever the outcome.
    pub fn popush_created(&mut self, pop_count: usize, created: Value) -> Result<()> {
        let result = self.operands.popush(&mut self.memory, pop_count, &[created.clone()]);
        self.memory.release(&created);
        result
    }

    /// Drop a reference obtained from one of the `create_*` methods.
    pub fn release(&mut self, created: &Value) {
        self.memory.release(created);
    }

    /// Distance from the top of the operand stack to the nearest mark.
    pub fn find_mark(&self) -> Result<usize> {
        self.operands.find_mark()
    }

    pub fn clear_operands(&mut self) {
        self.operands.clear(&mut self.memory);
    }

    // ========================================================================
    // Operator API: containers
    // ========================================================================

    /// New user array. The caller owns the returned reference.
    pub fn create_array(&mut self, access: ArrayAccess, items: &[Value]) -> Result<Value> {
        let trail = self.allocation_trail();
        let id = self
            .memory
            .new_array(MemoryType::User, items, 0, move || trail)?;
        Ok(Value::array(id, access))
    }

    /// New user array of `len` copies of `fill`. Nothing is built when the
    /// budget cannot hold it.
    pub fn create_filled_array(
        &mut self,
        access: ArrayAccess,
        len: usize,
        fill: &Value,
    ) -> Result<Value> {
        let trail = self.allocation_trail();
        let id = self
            .memory
            .new_filled_array(MemoryType::User, len, fill, move || trail)?;
        Ok(Value::array(id, access))
    }

    /// New writable user dictionary. The caller owns the returned reference.
    pub fn create_dictionary(&mut self) -> Result<Value> {
        let trail = self.allocation_trail();
        let id = self
            .memory
            .new_dictionary(MemoryType::User, move || trail)?;
        Ok(Value::dictionary(id, true))
    }

    /// Replace one element of a mutable array.
    pub fn set_array_item(&mut self, array: &Value, index: usize, item: Value) -> Result<()> {
        let id = match array.data() {
            ValueData::Array { id, writable: true } => *id,
            ValueData::Array { .. } => {
                return Err(Exception::invalid_access("array is read-only"));
            }
            _ => return Err(Exception::type_check("expected an array")),
        };
        self.memory
            .with_array(id, |container, memory| container.set(memory, index, item))
    }

    /// Bind `name` in a writable dictionary.
    pub fn define(&mut self, dictionary: &Value, name: &str, value: Value) -> Result<()> {
        let id = match dictionary.data() {
            ValueData::Dictionary { id, writable: true } => *id,
            ValueData::Dictionary { .. } => {
                return Err(Exception::invalid_access("dictionary is read-only"));
            }
            _ => return Err(Exception::type_check("expected a dictionary")),
        };
        self.memory.with_dictionary(id, |dictionary, memory| {
            dictionary.define(memory, name, value)
        })
    }

    // ========================================================================
    // Operator API: dictionary stack
    // ========================================================================

    pub fn begin(&mut self, dictionary: Value) -> Result<()> {
        self.dictionaries.begin(&mut self.memory, dictionary)
    }

    pub fn end(&mut self) -> Result<()> {
        self.dictionaries.end(&mut self.memory)
    }

    /// Innermost scope.
    pub fn current_dictionary(&self) -> Result<&Value> {
        self.dictionaries
            .top()
            .ok_or_else(|| Exception::internal("dictionary stack is empty"))
    }

    pub fn lookup(&self, name: &str) -> Result<Value> {
        self.dictionaries.lookup(&self.memory, name).cloned()
    }

    /// The scope defining `name` and the bound value.
    pub fn locate(&self, name: &str) -> Option<(Value, Value)> {
        self.dictionaries
            .locate(&self.memory, name)
            .map(|(scope, value)| (scope.clone(), value.clone()))
    }

    // ========================================================================
    // Operator API: call stack and continuation
    // ========================================================================

    fn current_frame(&self) -> Result<usize> {
        self.current_frame
            .ok_or_else(|| Exception::internal("no operator is being invoked"))
    }

    /// The operator value being invoked.
    pub fn current_operator(&self) -> Result<Value> {
        let index = self.current_frame()?;
        self.calls
            .value(index)
            .cloned()
            .ok_or_else(|| Exception::internal("current frame vanished"))
    }

    /// Queue `value` for execution above the current operator.
    pub fn call(&mut self, value: Value) -> Result<()> {
        self.calls.push(&mut self.memory, value)
    }

    pub fn operator_state(&self) -> Result<OperatorState> {
        Ok(self.calls.state(self.current_frame()?))
    }

    /// Move the current operator to `next`.
    ///
    /// # Errors
    ///
    /// `internal` when the continuation protocol forbids the transition.
    pub fn set_operator_state(&mut self, next: OperatorState) -> Result<()> {
        let index = self.current_frame()?;
        self.calls.set_state(index, next)
    }

    pub fn local(&self, name: &str) -> Result<Option<Value>> {
        let index = self.current_frame()?;
        Ok(self.calls.local(&self.memory, index, name).cloned())
    }

    /// Like [`State::local`], failing when the local was never set.
    pub fn expect_local(&self, name: &str) -> Result<Value> {
        self.local(name)?
            .ok_or_else(|| Exception::internal(format!("missing operator local {}", name)))
    }

    pub fn set_local(&mut self, name: &str, value: Value) -> Result<()> {
        let index = self.current_frame()?;
        self.calls.set_local(&mut self.memory, index, name, value)
    }

    /// Whether a loop operator is running below the current frame.
    pub fn in_loop(&self) -> bool {
        let below = self.current_frame.unwrap_or(self.calls.len());
        self.calls
            .frames()
            .skip(self.calls.len() - below)
            .any(|frame| {
                frame.state != OperatorState::Pop
                    && frame
                        .value
                        .as_operator()
                        .is_some_and(|operator| operator.is_loop())
            })
    }

    /// Enter block definition mode (`{`).
    pub(crate) fn open_block(&mut self) {
        self.block_depth += 1;
    }

    /// Leave block definition mode (`}`).
    pub(crate) fn close_block(&mut self) {
        self.block_depth = self.block_depth.saturating_sub(1);
    }

    // ========================================================================
    // Operator API: exceptions
    // ========================================================================

    pub fn exception_kind(&self) -> Option<ErrorKind> {
        self.exception.as_ref().map(PendingException::kind)
    }

    /// Clear the pending exception and return it. Fatal exceptions stay.
    pub fn intercept(&mut self) -> Option<Exception> {
        if self.exception_kind()?.is_fatal() {
            return None;
        }
        let pending = self.exception.take()?;
        let exception = pending.discharge(&mut self.memory.ledger);
        debug!(kind = %exception.kind(), "exception cleared");
        Some(exception)
    }

    /// Set the pending exception aside in the current frame so more work can
    /// run. Fatal exceptions are never set aside.
    pub fn stash_exception(&mut self) -> Result<()> {
        let index = self.current_frame()?;
        if self.exception_kind().is_some_and(ErrorKind::is_fatal) {
            return Ok(());
        }
        if let Some(pending) = self.exception.take() {
            self.calls.stash(&mut self.memory.ledger, index, pending);
        }
        Ok(())
    }

    /// Bring back the exception set aside by [`State::stash_exception`].
    /// An exception raised in the meantime wins.
    pub fn restore_exception(&mut self) -> Result<()> {
        let index = self.current_frame()?;
        if let Some(stashed) = self.calls.take_stash(index) {
            if self.exception.is_some() {
                stashed.discharge(&mut self.memory.ledger);
            } else {
                self.exception = Some(stashed);
            }
        }
        Ok(())
    }

    /// Make `exception` pending, with the current call trail.
    pub(crate) fn raise(&mut self, exception: Exception) {
        if self.exception_kind().is_some_and(ErrorKind::is_fatal) {
            debug!(kind = %exception.kind(), "ignored while a fatal exception is pending");
            return;
        }
        let exception = exception.with_trail(self.trail());
        debug!(kind = %exception.kind(), message = exception.message(), "exception raised");
        self.block_depth = 0;
        if let Some(previous) = self.exception.take() {
            previous.discharge(&mut self.memory.ledger);
        }
        self.exception = Some(PendingException::charge(&mut self.memory.ledger, exception));
    }

    fn allocation_trail(&self) -> Vec<String> {
        if self.memory.ledger().is_debug() {
            self.trail()
        } else {
            Vec::new()
        }
    }

    /// Description of every call frame, innermost first.
    pub(crate) fn trail(&self) -> Vec<String> {
        self.calls.frames().map(|frame| self.describe(&frame)).collect()
    }

    fn describe(&self, frame: &Frame<'_>) -> String {
        let value = frame.value;
        let text = match value.kind() {
            _ if frame.producer => format!("producer@{}", frame.cursor),
            ValueKind::String if value.is_executable() => format!("source@{}", frame.cursor),
            ValueKind::Array if value.is_block() => format!("block@{}", frame.cursor),
            _ => self.format_value(value),
        };
        match value.debug_source() {
            Some(source) => format!("{} ({})", text, source),
            None => text,
        }
    }
}
