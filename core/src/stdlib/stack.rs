//! Stack Operators
//!
//! Operators: pop, dup, exch, clear, count, index, roll

use super::{Registry, integer_param, param, to_index};
use crate::api::State;
use crate::errors::{ErrorKind, Exception, Result};
use crate::values::{Operator, ParamType, Value};

fn stack_pop(state: &mut State, _params: &[Value]) -> Result<()> {
    state.pop(1)
}

fn stack_dup(state: &mut State, params: &[Value]) -> Result<()> {
    let top = param(params, 0)?.clone();
    state.push(top)
}

fn stack_exch(state: &mut State, params: &[Value]) -> Result<()> {
    let top = param(params, 0)?.clone();
    let below = param(params, 1)?.clone();
    state.popush(2, &[top, below])
}

fn stack_clear(state: &mut State, _params: &[Value]) -> Result<()> {
    state.clear_operands();
    Ok(())
}

fn stack_count(state: &mut State, _params: &[Value]) -> Result<()> {
    let count = state.operands().len() as i64;
    state.push(Value::integer(count))
}

/// `any_n ... any_0 n index` copies `any_n` to the top.
fn stack_index(state: &mut State, params: &[Value]) -> Result<()> {
    let depth = to_index(integer_param(params, 0)?)?;
    let operands = state.operands();
    let value = operands
        .len()
        .checked_sub(depth + 2)
        .map(|position| operands[position].clone())
        .ok_or_else(|| Exception::range_check(format!("no operand at depth {}", depth)))?;
    state.popush(1, &[value])
}

/// `any_n-1 ... any_0 n j roll` rotates the top `n` operands by `j`
/// positions towards the top.
fn stack_roll(state: &mut State, params: &[Value]) -> Result<()> {
    let shift = integer_param(params, 0)?;
    let count = to_index(integer_param(params, 1)?)?;
    let operands = state.operands();
    if count + 2 > operands.len() {
        return Err(Exception::stack_underflow());
    }
    let start = operands.len() - 2 - count;
    let mut rolled = operands[start..operands.len() - 2].to_vec();
    if count > 0 {
        let steps = shift.rem_euclid(count as i64) as usize;
        rolled.rotate_right(steps);
    }
    state.popush(count + 2, &rolled)
}

pub fn register(registry: &mut Registry) {
    registry.register(
        Operator::function("pop", &[ParamType::Any], stack_pop)
            .sample("1 2 pop", "1")
            .sample_fails("pop", ErrorKind::StackUnderflow),
    );
    registry.register(
        Operator::function("dup", &[ParamType::Any], stack_dup)
            .sample("1 dup", "1 1")
            .sample("\"s\" dup", "\"s\" \"s\"")
            .sample_fails("dup", ErrorKind::StackUnderflow),
    );
    registry.register(
        Operator::function("exch", &[ParamType::Any, ParamType::Any], stack_exch)
            .sample("1 2 exch", "2 1")
            .sample_fails("1 exch", ErrorKind::StackUnderflow),
    );
    registry.register(
        Operator::function("clear", &[], stack_clear)
            .sample("1 2 clear", "")
            .sample("clear", ""),
    );
    registry.register(
        Operator::function("count", &[], stack_count)
            .sample("count", "0")
            .sample("1 2 count", "1 2 2"),
    );
    registry.register(
        Operator::function("index", &[ParamType::Integer], stack_index)
            .sample("1 2 3 0 index", "1 2 3 3")
            .sample("1 2 3 2 index", "1 2 3 1")
            .sample_fails("1 2 3 3 index", ErrorKind::RangeCheck)
            .sample_fails("1 -1 index", ErrorKind::RangeCheck)
            .sample_fails("1 /a index", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function("roll", &[ParamType::Integer, ParamType::Integer], stack_roll)
            .sample("1 2 3 3 1 roll", "3 1 2")
            .sample("1 2 3 3 -1 roll", "2 3 1")
            .sample("1 2 3 2 0 roll", "1 2 3")
            .sample("1 2 3 0 5 roll", "1 2 3")
            .sample_fails("1 2 3 -1 1 roll", ErrorKind::RangeCheck)
            .sample_fails("1 2 3 1 roll", ErrorKind::StackUnderflow),
    );
}
