//! Array Operators
//!
//! Operators: array, aload, astore, length, get, put
//!
//! `length`, `get` and `put` also accept dictionaries (name keys) and, for
//! reading, strings (byte codes).

use super::{Registry, integer_param, param, to_index};
use crate::api::State;
use crate::errors::{ErrorKind, Exception, Result};
use crate::values::{ArrayAccess, Operator, ParamType, Value, ValueData};

fn out_of_range(index: i64, len: usize) -> Exception {
    Exception::range_check(format!("index {} is outside 0..{}", index, len))
}

fn array_array(state: &mut State, params: &[Value]) -> Result<()> {
    let size = to_index(integer_param(params, 0)?)?;
    let array = state.create_filled_array(ArrayAccess::Mutable, size, &Value::NULL)?;
    state.popush_created(1, array)
}

/// `array aload` pushes every element, then the array itself.
fn array_aload(state: &mut State, params: &[Value]) -> Result<()> {
    let array = param(params, 0)?;
    let mut values = state.array_items(array)?.to_vec();
    values.push(array.clone());
    state.popush(1, &values)
}

/// `any_0 ... any_n-1 array astore` fills the array from the stack.
fn array_astore(state: &mut State, params: &[Value]) -> Result<()> {
    let array = param(params, 0)?.clone();
    let len = state.array_items(&array)?.len();
    let operands = state.operands();
    if operands.len() < len + 1 {
        return Err(Exception::stack_underflow());
    }
    let values = operands[operands.len() - 1 - len..operands.len() - 1].to_vec();
    for (index, value) in values.into_iter().enumerate() {
        state.set_array_item(&array, index, value)?;
    }
    state.popush(len + 1, &[array])
}

fn array_length(state: &mut State, params: &[Value]) -> Result<()> {
    let value = param(params, 0)?;
    let len = match value.data() {
        ValueData::Array { .. } => state.array_items(value)?.len(),
        ValueData::Dictionary { .. } => state.dictionary_names(value)?.len(),
        ValueData::String(text) | ValueData::Name(text) => text.len(),
        _ => {
            return Err(Exception::type_check(format!(
                "{} has no length",
                value.kind()
            )));
        }
    };
    state.popush(1, &[Value::integer(len as i64)])
}

fn array_get(state: &mut State, params: &[Value]) -> Result<()> {
    let key = param(params, 0)?;
    let container = param(params, 1)?;
    let item = match container.data() {
        ValueData::Array { .. } => {
            let index = key
                .as_integer()
                .ok_or_else(|| Exception::type_check("array index must be an integer"))?;
            let items = state.array_items(container)?;
            usize::try_from(index)
                .ok()
                .and_then(|position| items.get(position))
                .cloned()
                .ok_or_else(|| out_of_range(index, items.len()))?
        }
        ValueData::String(text) => {
            let index = key
                .as_integer()
                .ok_or_else(|| Exception::type_check("string index must be an integer"))?;
            usize::try_from(index)
                .ok()
                .and_then(|position| text.as_bytes().get(position))
                .map(|&byte| Value::integer(i64::from(byte)))
                .ok_or_else(|| out_of_range(index, text.len()))?
        }
        ValueData::Dictionary { .. } => {
            let name = key
                .as_name()
                .ok_or_else(|| Exception::type_check("dictionary key must be a name"))?;
            state
                .dictionary_get(container, name)?
                .cloned()
                .ok_or_else(|| Exception::new(ErrorKind::Undefined, name.to_string()))?
        }
        _ => {
            return Err(Exception::type_check(format!(
                "cannot get from {}",
                container.kind()
            )));
        }
    };
    state.popush(2, &[item])
}

fn array_put(state: &mut State, params: &[Value]) -> Result<()> {
    let value = param(params, 0)?.clone();
    let key = param(params, 1)?;
    let container = param(params, 2)?;
    match container.data() {
        ValueData::Array { .. } => {
            let index = key
                .as_integer()
                .ok_or_else(|| Exception::type_check("array index must be an integer"))?;
            let len = state.array_items(container)?.len();
            let position = usize::try_from(index)
                .ok()
                .filter(|&position| position < len)
                .ok_or_else(|| out_of_range(index, len))?;
            state.set_array_item(container, position, value)?;
        }
        ValueData::Dictionary { .. } => {
            let name = key
                .as_name()
                .ok_or_else(|| Exception::type_check("dictionary key must be a name"))?;
            state.define(container, name, value)?;
        }
        ValueData::String(_) => {
            return Err(Exception::invalid_access("strings are read-only"));
        }
        _ => {
            return Err(Exception::type_check(format!(
                "cannot put into {}",
                container.kind()
            )));
        }
    }
    state.pop(3)
}

pub fn register(registry: &mut Registry) {
    registry.register(
        Operator::function("array", &[ParamType::Integer], array_array)
            .sample("2 array length", "2")
            .sample("1 array aload pop", "null")
            .sample_fails("-1 array", ErrorKind::RangeCheck),
    );
    registry.register(
        Operator::function("aload", &[ParamType::Array], array_aload)
            .sample("[ 1 2 3 ] aload pop", "1 2 3")
            .sample("{ 1 add } aload pop", "{ 1 add } 0 get { 1 add } 1 get")
            .sample_fails("1 aload", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function("astore", &[ParamType::MutableArray], array_astore)
            .sample("1 2 2 array astore aload pop", "1 2")
            .sample("0 array astore length", "0")
            .sample_fails("1 2 array astore", ErrorKind::StackUnderflow)
            .sample_fails("1 2 [ 0 0 ] astore", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function("length", &[ParamType::Any], array_length)
            .sample("[ 1 2 3 ] length", "3")
            .sample("\"abc\" length", "3")
            .sample("/ab length", "2")
            .sample("<< /a 1 >> length", "1")
            .sample_fails("1 length", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function("get", &[ParamType::Any, ParamType::Any], array_get)
            .sample("[ 1 2 3 ] 1 get", "2")
            .sample("\"A\" 0 get", "65")
            .sample("<< /a 1 >> /a get", "1")
            .sample_fails("[ 1 ] 1 get", ErrorKind::RangeCheck)
            .sample_fails("[ 1 ] -1 get", ErrorKind::RangeCheck)
            .sample_fails("[ 1 ] /a get", ErrorKind::TypeCheck)
            .sample_fails("<< >> /a get", ErrorKind::Undefined)
            .sample_fails("1 0 get", ErrorKind::TypeCheck),
    );
    registry.register(
        Operator::function(
            "put",
            &[ParamType::Any, ParamType::Any, ParamType::Any],
            array_put,
        )
        .sample("3 array dup 0 42 put aload pop", "42 null null")
        .sample("<< >> dup /a 1 put /a get", "1")
        .sample_fails("[ 1 ] 0 2 put", ErrorKind::InvalidAccess)
        .sample_fails("1 array 1 2 put", ErrorKind::RangeCheck)
        .sample_fails("\"a\" 0 66 put", ErrorKind::InvalidAccess)
        .sample_fails("1 0 2 put", ErrorKind::TypeCheck),
    );
}
