//! Math Operators
//!
//! Arithmetic: add, sub, mul, div, mod, neg, abs
//! Comparisons: eq, neq, lt, gt
//! Logic: not, and, or
//!
//! Arithmetic is on 64-bit integers; results that do not fit are reported
//! as `undefinedresult`.

use super::{Registry, integer_param, param};
use crate::api::State;
use crate::errors::{ErrorKind, Exception, Result};
use crate::values::{Operator, ParamType, Value, ValueData};

const INTEGERS: &[ParamType] = &[ParamType::Integer, ParamType::Integer];
const ANY_TWO: &[ParamType] = &[ParamType::Any, ParamType::Any];

fn overflow(operation: &str) -> Exception {
    Exception::new(
        ErrorKind::UndefinedResult,
        format!("{} overflows 64-bit integers", operation),
    )
}

/// Apply `operation` to the two integer operands (deeper one first).
fn binary(
    state: &mut State,
    params: &[Value],
    name: &str,
    operation: impl FnOnce(i64, i64) -> Option<i64>,
) -> Result<()> {
    let right = integer_param(params, 0)?;
    let left = integer_param(params, 1)?;
    let result = operation(left, right).ok_or_else(|| overflow(name))?;
    state.popush(2, &[Value::integer(result)])
}

// ============================================================================
// Arithmetic
// ============================================================================

fn math_add(state: &mut State, params: &[Value]) -> Result<()> {
    binary(state, params, "add", i64::checked_add)
}

fn math_sub(state: &mut State, params: &[Value]) -> Result<()> {
    binary(state, params, "sub", i64::checked_sub)
}

fn math_mul(state: &mut State, params: &[Value]) -> Result<()> {
    binary(state, params, "mul", i64::checked_mul)
}

/// Integer division, truncating toward zero.
fn math_div(state: &mut State, params: &[Value]) -> Result<()> {
    if integer_param(params, 0)? == 0 {
        return Err(Exception::new(ErrorKind::UndefinedResult, "division by zero"));
    }
    binary(state, params, "div", i64::checked_div)
}

fn math_mod(state: &mut State, params: &[Value]) -> Result<()> {
    if integer_param(params, 0)? == 0 {
        return Err(Exception::new(ErrorKind::UndefinedResult, "division by zero"));
    }
    binary(state, params, "mod", i64::checked_rem)
}

fn math_neg(state: &mut State, params: &[Value]) -> Result<()> {
    let value = integer_param(params, 0)?;
    let result = value.checked_neg().ok_or_else(|| overflow("neg"))?;
    state.popush(1, &[Value::integer(result)])
}

fn math_abs(state: &mut State, params: &[Value]) -> Result<()> {
    let value = integer_param(params, 0)?;
    let result = value.checked_abs().ok_or_else(|| overflow("abs"))?;
    state.popush(1, &[Value::integer(result)])
}

// ============================================================================
// Comparisons
// ============================================================================

/// Strings and names compare by text, containers by identity.
fn equals(left: &Value, right: &Value) -> bool {
    match (left.data(), right.data()) {
        (ValueData::String(a) | ValueData::Name(a), ValueData::String(b) | ValueData::Name(b)) => {
            a == b
        }
        _ => left.same_as(right),
    }
}

fn math_eq(state: &mut State, params: &[Value]) -> Result<()> {
    let result = equals(param(params, 1)?, param(params, 0)?);
    state.popush(2, &[Value::boolean(result)])
}

fn math_neq(state: &mut State, params: &[Value]) -> Result<()> {
    let result = !equals(param(params, 1)?, param(params, 0)?);
    state.popush(2, &[Value::boolean(result)])
}

fn math_lt(state: &mut State, params: &[Value]) -> Result<()> {
    let result = integer_param(params, 1)? < integer_param(params, 0)?;
    state.popush(2, &[Value::boolean(result)])
}

fn math_gt(state: &mut State, params: &[Value]) -> Result<()> {
    let result = integer_param(params, 1)? > integer_param(params, 0)?;
    state.popush(2, &[Value::boolean(result)])
}

// ============================================================================
// Logic
// ============================================================================

/// Booleans are combined logically, integers bitwise.
fn logic(
    state: &mut State,
    params: &[Value],
    booleans: fn(bool, bool) -> bool,
    integers: fn(i64, i64) -> i64,
) -> Result<()> {
    let right = param(params, 0)?;
    let left = param(params, 1)?;
    let result = match (left.data(), right.data()) {
        (ValueData::Boolean(a), ValueData::Boolean(b)) => Value::boolean(booleans(*a, *b)),
        (ValueData::Integer(a), ValueData::Integer(b)) => Value::integer(integers(*a, *b)),
        _ => {
            return Err(Exception::type_check(format!(
                "expected two booleans or two integers, found {} and {}",
                left.kind(),
                right.kind()
            )));
        }
    };
    state.popush(2, &[result])
}

fn math_not(state: &mut State, params: &[Value]) -> Result<()> {
    let value = param(params, 0)?;
    let result = match value.data() {
        ValueData::Boolean(b) => Value::boolean(!b),
        ValueData::Integer(n) => Value::integer(!n),
        _ => {
            return Err(Exception::type_check(format!(
                "expected a boolean or an integer, found {}",
                value.kind()
            )));
        }
    };
    state.popush(1, &[result])
}

fn math_and(state: &mut State, params: &[Value]) -> Result<()> {
    logic(state, params, |a, b| a && b, |a, b| a & b)
}

fn math_or(state: &mut State, params: &[Value]) -> Result<()> {
    logic(state, params, |a, b| a || b, |a, b| a | b)
}

pub fn register(registry: &mut Registry) {
    registry.register(
        Operator::function("add", INTEGERS, math_add)
            .sample("1 2 add", "3")
            .sample("-1 1 add", "0")
            .sample_fails("9223372036854775807 1 add", ErrorKind::UndefinedResult)
            .sample_fails("1 \"2\" add", ErrorKind::TypeCheck)
            .sample_fails("1 add", ErrorKind::StackUnderflow),
    );
    registry.register(
        Operator::function("sub", INTEGERS, math_sub)
            .sample("5 3 sub", "2")
            .sample_fails("-9223372036854775808 1 sub", ErrorKind::UndefinedResult),
    );
    registry.register(
        Operator::function("mul", INTEGERS, math_mul)
            .sample("6 7 mul", "42")
            .sample_fails("9223372036854775807 2 mul", ErrorKind::UndefinedResult),
    );
    registry.register(
        Operator::function("div", INTEGERS, math_div)
            .sample("7 2 div", "3")
            .sample("-7 2 div", "-3")
            .sample_fails("1 0 div", ErrorKind::UndefinedResult),
    );
    registry.register(
        Operator::function("mod", INTEGERS, math_mod)
            .sample("7 3 mod", "1")
            .sample("-7 3 mod", "-1")
            .sample_fails("1 0 mod", ErrorKind::UndefinedResult),
    );
    registry.register(
        Operator::function("neg", &[ParamType::Integer], math_neg)
            .sample("3 neg", "-3")
            .sample_fails("-9223372036854775808 neg", ErrorKind::UndefinedResult),
    );
    registry.register(
        Operator::function("abs", &[ParamType::Integer], math_abs)
            .sample("-3 abs", "3")
            .sample("3 abs", "3"),
    );

    registry.register(
        Operator::function("eq", ANY_TWO, math_eq)
            .sample("1 1 eq", "true")
            .sample("1 2 eq", "false")
            .sample("\"a\" /a eq", "true")
            .sample("1 \"1\" eq", "false"),
    );
    registry.register(
        Operator::function("neq", ANY_TWO, math_neq)
            .sample("1 2 neq", "true")
            .sample("/a /a neq", "false"),
    );
    registry.register(
        Operator::function("lt", INTEGERS, math_lt)
            .sample("1 2 lt", "true")
            .sample("2 2 lt", "false"),
    );
    registry.register(
        Operator::function("gt", INTEGERS, math_gt)
            .sample("3 2 gt", "true")
            .sample("2 2 gt", "false"),
    );

    registry.register(
        Operator::function("not", &[ParamType::Any], math_not)
            .sample("true not", "false")
            .sample("0 not", "-1")
            .sample_fails("null not", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function("and", ANY_TWO, math_and)
            .sample("true false and", "false")
            .sample("12 10 and", "8")
            .sample_fails("true 1 and", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function("or", ANY_TWO, math_or)
            .sample("true false or", "true")
            .sample("12 10 or", "14")
            .sample_fails("1 null or", ErrorKind::TypeCheck),
    );
}
