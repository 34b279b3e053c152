//! Dictionary Operators
//!
//! Operators: dict, def, begin, end, load, where, known, currentdict

use super::{Registry, integer_param, name_param, param, to_index};
use crate::api::State;
use crate::errors::{ErrorKind, Exception, Result};
use crate::values::{Operator, ParamType, Value};

/// `n dict` creates an empty dictionary. The size is only validated:
/// dictionaries grow on demand.
fn dictionary_dict(state: &mut State, params: &[Value]) -> Result<()> {
    to_index(integer_param(params, 0)?)?;
    let dictionary = state.create_dictionary()?;
    state.popush_created(1, dictionary)
}

/// `/name value def` binds in the current dictionary.
fn dictionary_def(state: &mut State, params: &[Value]) -> Result<()> {
    let value = param(params, 0)?.clone();
    let name = name_param(params, 1)?;
    let scope = state.current_dictionary()?.clone();
    state.define(&scope, name, value)?;
    state.pop(2)
}

fn dictionary_begin(state: &mut State, params: &[Value]) -> Result<()> {
    state.begin(param(params, 0)?.clone())?;
    state.pop(1)
}

fn dictionary_end(state: &mut State, _params: &[Value]) -> Result<()> {
    state.end()
}

fn dictionary_load(state: &mut State, params: &[Value]) -> Result<()> {
    let value = state.lookup(name_param(params, 0)?)?;
    state.popush(1, &[value])
}

/// `/name where` pushes the defining dictionary and `true`, or `false`.
fn dictionary_where(state: &mut State, params: &[Value]) -> Result<()> {
    match state.locate(name_param(params, 0)?) {
        Some((scope, _)) => state.popush(1, &[scope, Value::TRUE]),
        None => state.popush(1, &[Value::FALSE]),
    }
}

fn dictionary_known(state: &mut State, params: &[Value]) -> Result<()> {
    let name = name_param(params, 0)?;
    let known = state.dictionary_get(param(params, 1)?, name)?.is_some();
    state.popush(2, &[Value::boolean(known)])
}

fn dictionary_currentdict(state: &mut State, _params: &[Value]) -> Result<()> {
    let scope = state.current_dictionary()?.clone();
    state.push(scope)
}

pub fn register(registry: &mut Registry) {
    registry.register(
        Operator::function("dict", &[ParamType::Integer], dictionary_dict)
            .sample("10 dict length", "0")
            .sample_fails("-1 dict", ErrorKind::RangeCheck),
    );
    registry.register(
        Operator::function("def", &[ParamType::Any, ParamType::Name], dictionary_def)
            .sample("<< >> begin /a 1 def a end", "1")
            .sample("<< >> begin /a 1 def /a 2 def a end", "2")
            .sample_fails("<< >> begin 1 2 def end", ErrorKind::TypeCheck)
            .sample_fails("1 def", ErrorKind::StackUnderflow),
    );
    registry.register(
        Operator::function("begin", &[ParamType::Dictionary], dictionary_begin)
            .sample("<< /a 1 >> begin a end", "1")
            .sample("<< /a 1 >> begin << /a 2 >> begin a end a end", "2 1")
            .sample_fails("1 begin", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function("end", &[], dictionary_end)
            .sample("<< >> begin end", "")
            .sample_fails("end", ErrorKind::DictStackUnderflow),
    );
    registry.register(
        Operator::function("load", &[ParamType::Name], dictionary_load)
            .sample("<< /a 2 >> begin /a load end", "2")
            .sample("<< /a { 1 } >> begin /a load length end", "1")
            .sample_fails("/nope load", ErrorKind::Undefined),
    );
    registry.register(
        Operator::function("where", &[ParamType::Name], dictionary_where)
            .sample("/add where exch pop", "true")
            .sample("/nope where", "false")
            .sample("<< /a 1 >> begin /a where pop /a get end", "1"),
    );
    registry.register(
        Operator::function(
            "known",
            &[ParamType::Name, ParamType::Dictionary],
            dictionary_known,
        )
        .sample("<< /a 1 >> /a known", "true")
        .sample("<< /a 1 >> /b known", "false")
        .sample_fails("[ ] /a known", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function("currentdict", &[], dictionary_currentdict)
            .sample("<< /a 1 >> begin currentdict /a get end", "1")
            .sample("<< >> begin currentdict length end", "0"),
    );
}
