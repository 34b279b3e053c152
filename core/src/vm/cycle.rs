//! The single-step interpreter cycle.
//!
//! [`State::cycle`] looks at the top of the call stack and performs exactly
//! one unit of work:
//!
//! 1. with an exception pending, an operator frame that asked for a pop-time
//!    invocation gets it; any other frame is discarded,
//! 2. operators are dispatched through the continuation protocol,
//! 3. executable names are resolved, executable strings yield one token,
//! 4. blocks and host producers yield one element,
//! 5. anything else moves to the operand stack.

use crate::api::State;
use crate::errors::{ErrorKind, Exception, Result};
use crate::memory::HeapId;
use crate::parser;
use crate::values::{DebugSource, Implementation, Operator, OperatorBody, Value, ValueData};
use crate::vm::OperatorState;
use std::sync::Arc;
use tracing::trace;

impl State {
    /// Perform one unit of work.
    ///
    /// Returns whether work remains on the call stack. Failures of hosted
    /// code are not returned: they become the pending exception.
    ///
    /// # Errors
    ///
    /// `busy` when called while the state is already cycling (from inside an
    /// operator).
    pub fn cycle(&mut self) -> Result<bool> {
        if self.cycling {
            return Err(Exception::new(ErrorKind::Busy, "state is already cycling"));
        }
        let Some(index) = self.calls.top_index() else {
            return Ok(false);
        };
        self.cycling = true;
        let result = self.step(index);
        self.cycling = false;
        if let Err(exception) = result {
            self.raise(exception);
        }
        Ok(!self.calls.is_empty())
    }

    fn step(&mut self, index: usize) -> Result<()> {
        let value = self
            .calls
            .value(index)
            .cloned()
            .ok_or_else(|| Exception::internal("top call frame vanished"))?;
        let state = self.calls.state(index);
        trace!(frame = index, kind = %value.kind(), %state, "cycle");

        if self.exception.is_some() {
            return match value.as_operator() {
                Some(operator) if state.is_popping() => self.step_operator(index, operator),
                _ => self.calls.pop(&mut self.memory),
            };
        }

        if self.calls.is_producer(index) {
            return self.step_producer(index);
        }
        match value.data() {
            ValueData::Operator(operator) => self.step_operator(index, operator),
            ValueData::Name(name) if value.is_executable() => self.step_name(&value, name),
            ValueData::String(text) if value.is_executable() => {
                self.step_source(index, &value, text)
            }
            ValueData::Array { id, .. } if value.is_block() => self.step_block(index, *id),
            _ => {
                self.operands.push(&mut self.memory, value.clone())?;
                self.calls.pop(&mut self.memory)
            }
        }
    }

    fn step_operator(&mut self, index: usize, operator: &Arc<Operator>) -> Result<()> {
        let (signature, implementation) = match operator.body() {
            OperatorBody::Constant(value) => {
                self.operands.push(&mut self.memory, value.clone())?;
                return self.calls.pop(&mut self.memory);
            }
            OperatorBody::Function {
                signature,
                implementation,
            } => (*signature, *implementation),
        };

        match self.calls.state(index) {
            OperatorState::Pop => self.calls.pop(&mut self.memory),
            OperatorState::Unknown => {
                let params = self.operands.check(signature)?;
                self.calls.set_state(index, OperatorState::FirstCall)?;
                self.memory.retain_all(&params)?;
                let result = self.invoke(index, implementation, &params);
                self.memory.release_all(&params);
                result?;
                self.settle(index, OperatorState::FirstCall)
            }
            state => {
                if let Err(exception) = self.invoke(index, implementation, &[]) {
                    // A failed pop-time invocation was the last one.
                    if state.is_popping() {
                        self.calls.abandon(index);
                    }
                    return Err(exception);
                }
                self.settle(index, state)
            }
        }
    }

    fn invoke(
        &mut self,
        index: usize,
        implementation: Implementation,
        params: &[Value],
    ) -> Result<()> {
        let previous = self.current_frame.replace(index);
        let result = implementation(self, params);
        self.current_frame = previous;
        result
    }

    /// Apply the implicit transitions after an invocation: an operator that
    /// left `FirstCall` or `CallBeforePop` untouched is done. A finished
    /// frame is removed right away when nothing was queued above it.
    fn settle(&mut self, index: usize, invoked_in: OperatorState) -> Result<()> {
        let mut state = self.calls.state(index);
        if state == invoked_in
            && matches!(state, OperatorState::FirstCall | OperatorState::CallBeforePop)
        {
            self.calls.set_state(index, OperatorState::Pop)?;
            state = OperatorState::Pop;
        }
        if state == OperatorState::Pop && self.calls.top_index() == Some(index) {
            self.calls.pop(&mut self.memory)?;
        }
        Ok(())
    }

    fn step_name(&mut self, token: &Value, name: &Arc<str>) -> Result<()> {
        if self.block_depth > 0 && name.as_ref() != "{" && name.as_ref() != "}" {
            self.operands.push(&mut self.memory, token.clone())?;
            return self.calls.pop(&mut self.memory);
        }
        let resolved = self.dictionaries.lookup(&self.memory, name)?.clone();
        let resolved = match resolved.debug_source() {
            Some(_) => resolved,
            None => resolved.with_debug_source(token.debug_source().cloned()),
        };
        self.calls.replace_top(&mut self.memory, resolved)
    }

    fn step_source(&mut self, index: usize, source: &Value, text: &Arc<str>) -> Result<()> {
        let cursor = self.calls.cursor(index);
        let Some(token) = parser::next_token(text, cursor)? else {
            return self.calls.pop(&mut self.memory);
        };
        let origin = source
            .debug_source()
            .map(|debug| Arc::clone(&debug.origin))
            .unwrap_or_else(|| Arc::from("-"));
        let debug = DebugSource {
            origin,
            offset: token.span.start,
            length: token.span.len(),
            source: Arc::clone(text),
        };
        let end = token.end();
        let value = token.value.with_debug_source(Some(Arc::new(debug)));
        if value.is_executable() {
            self.calls.push(&mut self.memory, value)?;
        } else {
            self.operands.push(&mut self.memory, value)?;
        }
        self.calls.set_cursor(index, end);
        Ok(())
    }

    fn step_producer(&mut self, index: usize) -> Result<()> {
        let Some(item) = self.calls.produce(index) else {
            return self.calls.pop(&mut self.memory);
        };
        if !item.is_executable() || item.is_block() {
            self.operands.push(&mut self.memory, item)
        } else {
            self.calls.push(&mut self.memory, item)
        }
    }

    fn step_block(&mut self, index: usize, id: HeapId) -> Result<()> {
        let cursor = self.calls.cursor(index);
        let (item, len) = {
            let items = self.memory.array(id).items();
            (items.get(cursor).cloned(), items.len())
        };
        let Some(item) = item else {
            return self.calls.pop(&mut self.memory);
        };
        let last = cursor + 1 == len;
        if !item.is_executable() || item.is_block() {
            self.operands.push(&mut self.memory, item)?;
            if last {
                return self.calls.pop(&mut self.memory);
            }
        } else if last {
            return self.calls.replace_top(&mut self.memory, item);
        } else {
            self.calls.push(&mut self.memory, item)?;
        }
        self.calls.set_cursor(index, cursor + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{Executable, State, StateOptions};
    use crate::errors::{ErrorKind, Exception, Result};
    use crate::values::{ArrayAccess, Implementation, Operator, Value};
    use crate::vm::OperatorState;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn run(source: &str) -> State {
        crate::test_utils::init_test_logging();
        let mut state = State::new(StateOptions::default()).unwrap();
        state.exec(Executable::source(source)).unwrap();
        state.run(10_000).unwrap();
        state
    }

    #[test]
    fn test_literals_move_to_operands() {
        let state = run("1 \"two\" /three");
        assert_eq!(
            state.operands(),
            &[
                Value::integer(1),
                Value::string("two"),
                Value::literal_name("three")
            ]
        );
        assert!(state.exception().is_none());
        state.destroy().unwrap();
    }

    #[test]
    fn test_one_token_per_cycle() {
        let mut state = State::new(StateOptions::default()).unwrap();
        state.exec(Executable::source("1 2")).unwrap();

        assert!(state.cycle().unwrap());
        assert_eq!(state.operands(), &[Value::integer(1)]);
        assert!(state.cycle().unwrap());
        assert_eq!(state.operands().len(), 2);
        // The exhausted source is popped on its own cycle.
        assert!(!state.cycle().unwrap());
        assert!(!state.cycle().unwrap());
        state.destroy().unwrap();
    }

    #[test]
    fn test_undefined_name_unwinds() {
        let state = run("1 nope 2");
        let exception = state.exception().unwrap();
        assert_eq!(exception.kind(), ErrorKind::Undefined);
        assert_eq!(exception.message(), "nope");
        assert_eq!(state.operands(), &[Value::integer(1)]);
        assert_eq!(state.frames().count(), 0);
        state.destroy().unwrap();
    }

    #[test]
    fn test_trail_names_the_failing_frames() {
        let state = run("{ 1 0 div } exec");
        let exception = state.exception().unwrap();
        assert_eq!(exception.kind(), ErrorKind::UndefinedResult);
        assert!(exception.trail()[0].starts_with("-div-"));
        // The block tail-called `div`, only `exec` remains below it.
        assert!(exception.trail().iter().any(|frame| frame.starts_with("-exec-")));
        assert!(exception.trail().last().unwrap().starts_with("source@"));
        state.destroy().unwrap();
    }

    #[test]
    fn test_debug_source_is_propagated_to_resolved_operators() {
        let mut state = State::new(StateOptions::default()).unwrap();
        state
            .exec(Executable::Source {
                text: "1 pop".to_string(),
                origin: "main.ps".to_string(),
            })
            .unwrap();
        state.run(3).unwrap();

        let frame = state.frames().next().unwrap();
        let debug = frame.value.debug_source().unwrap();
        assert_eq!(debug.origin.as_ref(), "main.ps");
        assert_eq!(debug.text(), "pop");
        state.run(10).unwrap();
        state.destroy().unwrap();
    }

    #[test]
    fn test_reentrant_cycle_is_busy() {
        let mut state = State::new(StateOptions::default()).unwrap();
        state.cycling = true;
        let error = state.cycle().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Busy);
        state.cycling = false;
        state.destroy().unwrap();
    }

    // ========================================================================
    // Continuation protocol
    // ========================================================================

    fn operator(name: &'static str, implementation: Implementation) -> Value {
        Value::operator(Arc::new(Operator::function(name, &[], implementation)))
    }

    fn run_values(values: Vec<Value>) -> State {
        crate::test_utils::init_test_logging();
        let mut state = State::new(StateOptions::default()).unwrap();
        state.exec(Executable::Values(values)).unwrap();
        state.run(1_000).unwrap();
        state
    }

    /// Queues failing work, then waits in `Running(1)`.
    fn wait_on_failure(state: &mut State, _params: &[Value]) -> Result<()> {
        match state.operator_state()? {
            OperatorState::FirstCall => {
                state.call(Value::name("nope"))?;
                state.set_operator_state(OperatorState::Running(1))
            }
            _ => state.push(Value::integer(-1)),
        }
    }

    /// Pushes the integer encoding of every state it is invoked in.
    fn walk_popping_steps(state: &mut State, _params: &[Value]) -> Result<()> {
        let current = state.operator_state()?;
        if let Some(step) = current.as_integer() {
            state.push(Value::integer(step))?;
        }
        match current {
            OperatorState::FirstCall => state.set_operator_state(OperatorState::CallBeforePop),
            OperatorState::CallBeforePop => state.set_operator_state(OperatorState::Popping(-2)),
            OperatorState::Popping(-2) => state.set_operator_state(OperatorState::Popping(-3)),
            _ => state.set_operator_state(OperatorState::Pop),
        }
    }

    /// Queues failing work and asks for a pop-time invocation.
    fn hook_on_failure(state: &mut State, _params: &[Value]) -> Result<()> {
        match state.operator_state()? {
            OperatorState::FirstCall => {
                state.call(Value::name("nope"))?;
                state.set_operator_state(OperatorState::CallBeforePop)
            }
            _ => state.push(Value::integer(-1)),
        }
    }

    fn fail_at_pop_time(state: &mut State, _params: &[Value]) -> Result<()> {
        match state.operator_state()? {
            OperatorState::FirstCall => state.set_operator_state(OperatorState::CallBeforePop),
            OperatorState::CallBeforePop => {
                state.push(Value::integer(-1))?;
                Err(Exception::range_check("cleanup failed"))
            }
            other => Err(Exception::internal(format!("invoked again in {}", other))),
        }
    }

    fn fail_in_popping_step(state: &mut State, _params: &[Value]) -> Result<()> {
        match state.operator_state()? {
            OperatorState::FirstCall => state.set_operator_state(OperatorState::CallBeforePop),
            OperatorState::CallBeforePop => state.set_operator_state(OperatorState::Popping(-2)),
            OperatorState::Popping(-2) => {
                state.push(Value::integer(-2))?;
                Err(Exception::range_check("cleanup failed"))
            }
            other => Err(Exception::internal(format!("invoked again in {}", other))),
        }
    }

    fn jump_to_popping(state: &mut State, _params: &[Value]) -> Result<()> {
        state.set_operator_state(OperatorState::Popping(-2))
    }

    #[test]
    fn test_running_frame_is_discarded_while_unwinding() {
        let state = run_values(vec![operator("waiter", wait_on_failure)]);
        assert_eq!(state.exception().unwrap().kind(), ErrorKind::Undefined);
        assert!(state.operands().is_empty());
        assert_eq!(state.frames().count(), 0);
        state.destroy().unwrap();
    }

    #[test]
    fn test_popping_steps_run_without_exception() {
        let state = run_values(vec![operator("walker", walk_popping_steps)]);
        assert!(state.exception().is_none());
        assert_eq!(
            state.operands(),
            &[
                Value::integer(0),
                Value::integer(-1),
                Value::integer(-2),
                Value::integer(-3)
            ]
        );
        assert_eq!(state.frames().count(), 0);
        state.destroy().unwrap();
    }

    #[test]
    fn test_pop_time_invocation_runs_once_with_exception_pending() {
        let state = run_values(vec![operator("hook", hook_on_failure)]);
        assert_eq!(state.exception().unwrap().kind(), ErrorKind::Undefined);
        assert_eq!(state.operands(), &[Value::integer(-1)]);
        assert_eq!(state.frames().count(), 0);
        state.destroy().unwrap();
    }

    #[test]
    fn test_failing_pop_time_invocation_unwinds() {
        let state = run_values(vec![operator("cleanup", fail_at_pop_time)]);
        let exception = state.exception().unwrap();
        assert_eq!(exception.kind(), ErrorKind::RangeCheck);
        assert_eq!(exception.message(), "cleanup failed");
        assert_eq!(state.operands(), &[Value::integer(-1)]);
        assert_eq!(state.frames().count(), 0);
        state.destroy().unwrap();
    }

    #[test]
    fn test_failing_popping_step_unwinds() {
        let state = run_values(vec![operator("cleanup", fail_in_popping_step)]);
        assert_eq!(state.exception().unwrap().kind(), ErrorKind::RangeCheck);
        assert_eq!(state.operands(), &[Value::integer(-2)]);
        assert_eq!(state.frames().count(), 0);
        state.destroy().unwrap();
    }

    #[test]
    fn test_illegal_transition_is_fatal() {
        crate::test_utils::init_test_logging();
        let mut state = State::new(StateOptions::default()).unwrap();
        let body = state
            .create_array(ArrayAccess::Block, &[operator("jumper", jump_to_popping)])
            .unwrap();
        state
            .exec(Executable::Values(vec![body.clone(), Value::name("stopped")]))
            .unwrap();
        state.release(&body);
        state.run(1_000).unwrap();

        assert_eq!(state.exception().unwrap().kind(), ErrorKind::Internal);
        // Neither `stopped` nor the host can clear it.
        assert!(state.operands().is_empty());
        assert!(state.clear_exception().is_none());
        assert_eq!(state.exception().unwrap().kind(), ErrorKind::Internal);
        assert_eq!(state.frames().count(), 0);
        state.destroy().unwrap();
    }
}
