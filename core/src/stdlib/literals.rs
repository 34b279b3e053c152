//! Literal Operators
//!
//! Constants: true, false, null, mark, [, <<
//! Builders: ], {, }, >>
//! Marks: cleartomark, counttomark

use super::Registry;
use crate::api::State;
use crate::errors::{ErrorKind, Exception, Result};
use crate::values::{ArrayAccess, Operator, Value};

/// Values above the nearest mark, bottom to top.
fn above_mark(state: &State) -> Result<Vec<Value>> {
    let count = state.find_mark()?;
    let operands = state.operands();
    Ok(operands[operands.len() - count..].to_vec())
}

// ============================================================================
// Arrays and blocks
// ============================================================================

fn literal_array_close(state: &mut State, _params: &[Value]) -> Result<()> {
    let items = above_mark(state)?;
    let array = state.create_array(ArrayAccess::Literal, &items)?;
    state.popush_created(items.len() + 1, array)
}

fn literal_block_open(state: &mut State, _params: &[Value]) -> Result<()> {
    state.push(Value::MARK)?;
    state.open_block();
    Ok(())
}

fn literal_block_close(state: &mut State, _params: &[Value]) -> Result<()> {
    let items = above_mark(state)?;
    let block = state.create_array(ArrayAccess::Block, &items)?;
    state.popush_created(items.len() + 1, block)?;
    state.close_block();
    Ok(())
}

// ============================================================================
// Dictionaries
// ============================================================================

fn literal_dictionary_close(state: &mut State, _params: &[Value]) -> Result<()> {
    let items = above_mark(state)?;
    if items.len() % 2 != 0 {
        return Err(Exception::range_check("dictionary literal needs key value pairs"));
    }
    let mut entries = Vec::with_capacity(items.len() / 2);
    for pair in items.chunks_exact(2) {
        let name = pair[0].as_name().ok_or_else(|| {
            Exception::type_check(format!("dictionary key must be a name, found {}", pair[0].kind()))
        })?;
        entries.push((name, &pair[1]));
    }

    let dictionary = state.create_dictionary()?;
    for (name, value) in entries {
        if let Err(error) = state.define(&dictionary, name, value.clone()) {
            state.release(&dictionary);
            return Err(error);
        }
    }
    state.popush_created(items.len() + 1, dictionary)
}

// ============================================================================
// Marks
// ============================================================================

fn literal_cleartomark(state: &mut State, _params: &[Value]) -> Result<()> {
    let count = state.find_mark()?;
    state.pop(count + 1)
}

fn literal_counttomark(state: &mut State, _params: &[Value]) -> Result<()> {
    let count = state.find_mark()?;
    state.push(Value::integer(count as i64))
}

pub fn register(registry: &mut Registry) {
    registry.register(Operator::constant("true", Value::TRUE).sample("true", "1 1 eq"));
    registry.register(Operator::constant("false", Value::FALSE).sample("false", "1 2 eq"));
    registry.register(Operator::constant("null", Value::NULL).sample("null", "1 array 0 get"));
    registry.register(Operator::constant("mark", Value::MARK).sample("mark", "["));

    registry.register(
        Operator::constant("[", Value::MARK)
            .sample("[", "<<")
            .sample("[ 1 2 counttomark", "mark 1 2 2"),
    );
    registry.register(
        Operator::function("]", &[], literal_array_close)
            .sample("[ 1 2 ] length", "2")
            .sample("[ ] length", "0")
            .sample("[ 1 2 ] aload pop", "1 2")
            .sample_fails("1 2 ]", ErrorKind::UnmatchedMark),
    );
    registry.register(
        Operator::function("{", &[], literal_block_open)
            .sample("{ 1 2 } length", "2")
            .sample("{ 1 add } 0 get", "1")
            .sample("{ { 1 } } 0 get 0 get", "1"),
    );
    registry.register(
        Operator::function("}", &[], literal_block_close)
            .sample("{ } length", "0")
            .sample("{ 2 3 add } exec", "5")
            .sample_fails("1 }", ErrorKind::UnmatchedMark),
    );

    registry.register(
        Operator::constant("<<", Value::MARK).sample("<< counttomark", "mark 0"),
    );
    registry.register(
        Operator::function(">>", &[], literal_dictionary_close)
            .sample("<< /a 1 /b 2 >> length", "2")
            .sample("<< /a 1 >> /a get", "1")
            .sample("<< /a 1 /a 2 >> /a get", "2")
            .sample_fails("<< /a >>", ErrorKind::RangeCheck)
            .sample_fails("<< 1 2 >>", ErrorKind::TypeCheck)
            .sample_fails("/a 1 >>", ErrorKind::UnmatchedMark),
    );

    registry.register(
        Operator::function("cleartomark", &[], literal_cleartomark)
            .sample("1 mark 2 3 cleartomark", "1")
            .sample_fails("1 2 3 cleartomark", ErrorKind::UnmatchedMark),
    );
    registry.register(
        Operator::function("counttomark", &[], literal_counttomark)
            .sample("mark counttomark", "mark 0")
            .sample("1 mark 2 3 counttomark", "1 mark 2 3 2")
            .sample_fails("1 counttomark", ErrorKind::UnmatchedMark),
    );
}
