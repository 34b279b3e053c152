//! Tests for rendering values as source text

use crate::Memory;
use crate::memory::MemoryType;
use crate::values::{ArrayAccess, Value, format_value, format_values};

fn memory() -> Memory {
    Memory::new(None, false)
}

#[test]
fn test_display_scalars() {
    let memory = memory();
    assert_eq!(format_value(&memory, &Value::integer(-42)), "-42");
    assert_eq!(format_value(&memory, &Value::TRUE), "true");
    assert_eq!(format_value(&memory, &Value::NULL), "null");
    assert_eq!(format_value(&memory, &Value::MARK), "-mark-");
}

#[test]
fn test_display_names() {
    let memory = memory();
    assert_eq!(format_value(&memory, &Value::name("add")), "add");
    assert_eq!(format_value(&memory, &Value::literal_name("add")), "/add");
}

#[test]
fn test_display_string_escapes() {
    let memory = memory();
    let value = Value::string("say \"hi\"\n\\");
    assert_eq!(format_value(&memory, &value), r#""say \"hi\"\n\\""#);
}

#[test]
fn test_display_arrays_and_blocks() {
    let mut memory = memory();
    let items = [Value::integer(1), Value::name("dup")];
    let id = memory
        .new_array(MemoryType::User, &items, 0, Vec::new)
        .unwrap();

    let literal = Value::array(id, ArrayAccess::Literal);
    let block = Value::array(id, ArrayAccess::Block);
    assert_eq!(format_value(&memory, &literal), "[ 1 dup ]");
    assert_eq!(format_value(&memory, &block), "{ 1 dup }");
    assert_eq!(
        format_values(&memory, [&literal, &Value::integer(2)]),
        "[ 1 dup ] 2"
    );

    memory.release(&literal);
    assert_eq!(memory.snapshot().used, 0);
}

#[test]
fn test_display_dictionary_sorts_keys() {
    let mut memory = memory();
    let id = memory.new_dictionary(MemoryType::User, Vec::new).unwrap();
    memory
        .with_dictionary(id, |dictionary, memory| {
            dictionary.define(memory, "b", Value::integer(2))?;
            dictionary.define(memory, "a", Value::string("x"))
        })
        .unwrap();

    let value = Value::dictionary(id, true);
    assert_eq!(format_value(&memory, &value), r#"<< /a "x" /b 2 >>"#);

    memory.release(&value);
    assert_eq!(memory.snapshot().used, 0);
}

#[test]
fn test_display_self_reference_is_bounded() {
    let mut memory = memory();
    let id = memory
        .new_array(MemoryType::User, &[Value::NULL], 0, Vec::new)
        .unwrap();
    let array = Value::array(id, ArrayAccess::Mutable);
    memory
        .with_array(id, |container, memory| container.set(memory, 0, array.clone()))
        .unwrap();

    let text = format_value(&memory, &array);
    assert!(text.starts_with("[ [ [ "));
    assert!(text.contains("[ ... ]"));
}
