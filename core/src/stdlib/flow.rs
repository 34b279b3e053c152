//! Flow Operators
//!
//! Execution: exec, if, ifelse
//! Loops: repeat, loop, break
//! Exceptions: stop, stopped, finally
//! Binding: bind
//!
//! Operators that run code queue it on the call stack and come back through
//! the continuation state instead of recursing. Loops and interceptors ask
//! for a [`OperatorState::CallBeforePop`] invocation so they see the pending
//! exception before their frame goes away.

use super::{Registry, boolean_param, integer_param, param, to_index};
use crate::api::State;
use crate::errors::{ErrorKind, Exception, Result};
use crate::values::{ArrayAccess, Operator, ParamType, Value, ValueData};
use crate::vm::OperatorState;

// ============================================================================
// Execution
// ============================================================================

/// Executable values are queued, anything else stays on the operand stack.
fn flow_exec(state: &mut State, params: &[Value]) -> Result<()> {
    let value = param(params, 0)?;
    if value.is_executable() {
        state.call(value.clone())?;
        state.pop(1)?;
    }
    Ok(())
}

fn flow_if(state: &mut State, params: &[Value]) -> Result<()> {
    let block = param(params, 0)?;
    if boolean_param(params, 1)? {
        state.call(block.clone())?;
    }
    state.pop(2)
}

fn flow_ifelse(state: &mut State, params: &[Value]) -> Result<()> {
    let otherwise = param(params, 0)?;
    let then = param(params, 1)?;
    let chosen = if boolean_param(params, 2)? { then } else { otherwise };
    state.call(chosen.clone())?;
    state.pop(3)
}

// ============================================================================
// Loops
// ============================================================================

/// Common pop-time handling of loops: `break` ends the loop, any other
/// exception keeps unwinding and a normal return starts the next iteration.
fn next_iteration(state: &mut State) -> Result<()> {
    match state.exception_kind() {
        None => state.set_operator_state(OperatorState::FirstCall),
        Some(ErrorKind::Break) => {
            state.intercept();
            Ok(())
        }
        Some(_) => Ok(()),
    }
}

/// `n block repeat`
fn flow_repeat(state: &mut State, params: &[Value]) -> Result<()> {
    if !params.is_empty() {
        let block = param(params, 0)?.clone();
        let count = integer_param(params, 1)?;
        to_index(count)?;
        state.set_local("block", block)?;
        state.set_local("count", Value::integer(count))?;
        state.pop(2)?;
    }

    match state.operator_state()? {
        OperatorState::FirstCall => {
            let remaining = state
                .expect_local("count")?
                .as_integer()
                .ok_or_else(|| Exception::internal("repeat count is not an integer"))?;
            if remaining == 0 {
                return Ok(());
            }
            state.set_local("count", Value::integer(remaining - 1))?;
            let block = state.expect_local("block")?;
            state.call(block)?;
            state.set_operator_state(OperatorState::CallBeforePop)
        }
        OperatorState::CallBeforePop => next_iteration(state),
        other => Err(Exception::internal(format!("repeat invoked in state {}", other))),
    }
}

/// `block loop` runs until `break` (or another exception).
fn flow_loop(state: &mut State, params: &[Value]) -> Result<()> {
    if !params.is_empty() {
        state.set_local("block", param(params, 0)?.clone())?;
        state.pop(1)?;
    }

    match state.operator_state()? {
        OperatorState::FirstCall => {
            let block = state.expect_local("block")?;
            state.call(block)?;
            state.set_operator_state(OperatorState::CallBeforePop)
        }
        OperatorState::CallBeforePop => next_iteration(state),
        other => Err(Exception::internal(format!("loop invoked in state {}", other))),
    }
}

fn flow_break(state: &mut State, _params: &[Value]) -> Result<()> {
    if !state.in_loop() {
        return Err(Exception::new(ErrorKind::InvalidBreak, "break outside of a loop"));
    }
    Err(Exception::new(ErrorKind::Break, ""))
}

// ============================================================================
// Exceptions
// ============================================================================

fn flow_stop(_state: &mut State, _params: &[Value]) -> Result<()> {
    Err(Exception::new(ErrorKind::Stop, ""))
}

/// `block stopped` pushes `true` if the block raised, `false` otherwise.
/// `break` is left to the enclosing loop.
fn flow_stopped(state: &mut State, params: &[Value]) -> Result<()> {
    match state.operator_state()? {
        OperatorState::FirstCall => {
            state.call(param(params, 0)?.clone())?;
            state.pop(1)?;
            state.set_operator_state(OperatorState::CallBeforePop)
        }
        OperatorState::CallBeforePop => match state.exception_kind() {
            None => state.push(Value::FALSE),
            Some(kind) if kind.is_fatal() || kind == ErrorKind::Break => Ok(()),
            Some(_) => {
                state.intercept();
                state.push(Value::TRUE)
            }
        },
        other => Err(Exception::internal(format!("stopped invoked in state {}", other))),
    }
}

/// Step of `finally` running the finalizer.
const FINALIZING: OperatorState = OperatorState::Popping(-2);

/// `body finalizer finally` runs the finalizer whether or not the body
/// raised, then lets the body's exception continue.
fn flow_finally(state: &mut State, params: &[Value]) -> Result<()> {
    match state.operator_state()? {
        OperatorState::FirstCall => {
            let finalizer = param(params, 0)?.clone();
            let body = param(params, 1)?.clone();
            state.set_local("finalizer", finalizer)?;
            state.call(body)?;
            state.pop(2)?;
            state.set_operator_state(OperatorState::CallBeforePop)
        }
        OperatorState::CallBeforePop => {
            state.stash_exception()?;
            let finalizer = state.expect_local("finalizer")?;
            state.call(finalizer)?;
            state.set_operator_state(FINALIZING)
        }
        FINALIZING => {
            state.restore_exception()?;
            state.set_operator_state(OperatorState::Pop)
        }
        other => Err(Exception::internal(format!("finally invoked in state {}", other))),
    }
}

// ============================================================================
// Binding
// ============================================================================

/// Index in the copy whose nested block is being bound, -1 when none.
fn pending_index(state: &State) -> Result<Option<usize>> {
    Ok(state
        .local("pending")?
        .and_then(|pending| pending.as_integer())
        .and_then(|index| usize::try_from(index).ok()))
}

fn finish_bind(state: &mut State, target: &Value) -> Result<()> {
    let items = state.array_items(target)?.to_vec();
    let block = state.create_array(ArrayAccess::Block, &items)?;
    state.popush_created(0, block)
}

/// `block bind` replaces executable names bound to operators by the
/// operators, nested blocks included.
///
/// The block is copied into a mutable local and walked one element per
/// invocation: `Running(n)` processes element `n - 1`. Nested blocks are
/// bound by queuing another `bind` and collecting its result on the next
/// invocation.
fn flow_bind(state: &mut State, params: &[Value]) -> Result<()> {
    if !params.is_empty() {
        let items = state.array_items(param(params, 0)?)?.to_vec();
        let target = state.create_array(ArrayAccess::Mutable, &items)?;
        let stored = state.set_local("target", target.clone());
        state.release(&target);
        stored?;
        state.pop(1)?;
        if items.is_empty() {
            return finish_bind(state, &target);
        }
        return state.set_operator_state(OperatorState::Running(1));
    }

    let OperatorState::Running(step) = state.operator_state()? else {
        return Err(Exception::internal("bind resumed outside of a running step"));
    };
    let target = state.expect_local("target")?;

    if let Some(index) = pending_index(state)? {
        let bound = state
            .operands()
            .last()
            .cloned()
            .ok_or_else(Exception::stack_underflow)?;
        state.set_array_item(&target, index, bound)?;
        state.pop(1)?;
        state.set_local("pending", Value::integer(-1))?;
    }

    let index = to_index(step - 1)?;
    let Some(item) = state.array_items(&target)?.get(index).cloned() else {
        finish_bind(state, &target)?;
        return state.set_operator_state(OperatorState::Pop);
    };

    match item.data() {
        ValueData::Name(name) if item.is_executable() => {
            if let Some((_, value)) = state.locate(name) {
                if value.as_operator().is_some() {
                    let bound = value.with_debug_source(item.debug_source().cloned());
                    state.set_array_item(&target, index, bound)?;
                }
            }
        }
        _ if item.is_block() => {
            let bind = state.current_operator()?;
            state.push(item.clone())?;
            state.call(bind)?;
            state.set_local("pending", Value::integer(step - 1))?;
        }
        _ => {}
    }
    state.set_operator_state(OperatorState::Running(step + 1))
}

pub fn register(registry: &mut Registry) {
    registry.register(
        Operator::function("exec", &[ParamType::Any], flow_exec)
            .sample("1 exec", "1")
            .sample("{ 1 2 add } exec", "3")
            .sample("1 2 /add load exec", "3")
            .sample_fails("exec", ErrorKind::StackUnderflow),
    );
    registry.register(
        Operator::function("if", &[ParamType::Block, ParamType::Boolean], flow_if)
            .sample("true { 1 } if", "1")
            .sample("false { 1 } if", "")
            .sample_fails("1 { 1 } if", ErrorKind::TypeCheck)
            .sample_fails("true [ 1 ] if", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function(
            "ifelse",
            &[ParamType::Block, ParamType::Block, ParamType::Boolean],
            flow_ifelse,
        )
        .sample("true { 1 } { 2 } ifelse", "1")
        .sample("false { 1 } { 2 } ifelse", "2")
        .sample_fails("null { 1 } { 2 } ifelse", ErrorKind::TypeCheck),
    );

    registry.register(
        Operator::function("repeat", &[ParamType::Block, ParamType::Integer], flow_repeat)
            .looping()
            .sample("4 { 1 } repeat", "1 1 1 1")
            .sample("0 { 1 } repeat", "")
            .sample("2 { 2 { 1 } repeat } repeat", "1 1 1 1")
            .sample("5 { 1 break } repeat", "1")
            .sample_fails("-1 { 1 } repeat", ErrorKind::RangeCheck)
            .sample_fails("2 { 1 0 div } repeat", ErrorKind::UndefinedResult),
    );
    registry.register(
        Operator::function("loop", &[ParamType::Block], flow_loop)
            .looping()
            .sample("0 { 1 add dup 3 eq { break } if } loop", "3")
            .sample("{ { break } { 1 } finally } loop", "1")
            .sample_fails("{ stop } loop", ErrorKind::Stop),
    );
    registry.register(
        Operator::function("break", &[], flow_break)
            .sample("{ 1 break 2 } loop", "1")
            .sample_fails("break", ErrorKind::InvalidBreak)
            .sample_fails("{ break } exec", ErrorKind::InvalidBreak),
    );

    registry.register(
        Operator::function("stop", &[], flow_stop)
            .sample("1 { stop } stopped", "1 true")
            .sample_fails("stop", ErrorKind::Stop),
    );
    registry.register(
        Operator::function("stopped", &[ParamType::Block], flow_stopped)
            .sample("{ 1 } stopped", "1 false")
            .sample("{ 1 0 div } stopped", "1 0 true")
            .sample("{ nope } stopped", "true")
            .sample("{ { break } stopped } loop", "")
            .sample_fails("1 stopped", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function("finally", &[ParamType::Block, ParamType::Block], flow_finally)
            .sample("{ 1 } { 2 } finally", "1 2")
            .sample("{ { 1 0 div } { 2 } finally } stopped", "1 0 2 true")
            .sample_fails("{ stop } { 2 } finally", ErrorKind::Stop),
    );
    registry.register(
        Operator::function("bind", &[ParamType::Block], flow_bind)
            .sample("{ 1 2 add } bind exec", "3")
            .sample("{ add } bind 0 get", "/add load")
            .sample("{ { add } } bind 0 get 0 get", "/add load")
            .sample("{ nope } bind 0 get", "{ nope } 0 get")
            .sample("{ } bind length", "0")
            .sample_fails("[ 1 ] bind", ErrorKind::TypeCheck),
    );
}
