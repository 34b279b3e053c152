use super::*;
use crate::errors::ErrorKind;
use crate::values::ArrayAccess;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn no_trail() -> Vec<String> {
    Vec::new()
}

#[test]
fn test_string_content_is_charged_once() {
    let mut memory = Memory::new(None, false);
    let text = Value::string("abc");

    memory.retain(&text).unwrap();
    let charged = memory.snapshot().string;
    assert_eq!(charged, 3 + MemorySize::INTEGER_WEIGHT);

    // A second token with the same text shares the interned content.
    let same = Value::string(Arc::<str>::from("abc"));
    memory.retain(&same).unwrap();
    assert_eq!(memory.snapshot().string, charged);
    assert_eq!(memory.refcount(&text), 2);

    memory.release(&text);
    assert_eq!(memory.snapshot().string, charged);
    memory.release(&same);
    assert_eq!(memory.snapshot().used, 0);
}

#[test]
fn test_untracked_values_are_free() {
    let mut memory = Memory::new(Some(0), false);
    for value in [
        Value::NULL,
        Value::TRUE,
        Value::integer(7),
        Value::name("add"),
        Value::MARK,
    ] {
        memory.retain(&value).unwrap();
        assert_eq!(memory.refcount(&value), 0);
        memory.release(&value);
    }
    assert_eq!(memory.snapshot().used, 0);
}

#[test]
fn test_retain_all_is_all_or_nothing() {
    // Room for "abc" (11 units) but not for "defgh" as well (13 units).
    let mut memory = Memory::new(Some(20), false);
    let values = [Value::string("abc"), Value::string("defgh")];

    let error = memory.retain_all(&values).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::VmOverflow);
    assert_eq!(memory.snapshot().used, 0);
    assert_eq!(memory.refcount(&values[0]), 0);
}

#[test]
fn test_release_cascades_through_nested_containers() {
    let mut memory = Memory::new(None, false);
    let inner = memory.new_dictionary(MemoryType::User, no_trail).unwrap();
    let inner = Value::dictionary(inner, true);
    memory
        .with_dictionary(inner.heap_id().unwrap(), |dictionary, memory| {
            dictionary.define(memory, "greeting", Value::string("hello"))
        })
        .unwrap();

    let outer = memory
        .new_array(MemoryType::User, &[inner.clone(), Value::integer(1)], 0, no_trail)
        .unwrap();
    let outer = Value::array(outer, ArrayAccess::Literal);
    assert_eq!(memory.refcount(&inner), 2);

    memory.release(&inner);
    assert_eq!(memory.live_containers(), 2);

    memory.release(&outer);
    assert_eq!(memory.live_containers(), 0);
    assert_eq!(memory.snapshot().used, 0);
}

#[test]
fn test_failed_array_allocation_leaves_ledger_untouched() {
    // Exactly one slot, nothing left for the string content.
    let slot = ValueContainer::VALUE_SLOT.cost();
    let mut memory = Memory::new(Some(slot), false);

    let error = memory
        .new_array(MemoryType::User, &[Value::string("x")], 0, no_trail)
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::VmOverflow);
    assert_eq!(memory.snapshot().used, 0);
    assert_eq!(memory.live_containers(), 0);
}

#[test]
fn test_reference_count_matches_slots_holding_the_value() {
    let mut memory = Memory::new(None, false);
    let shared = memory.new_array(MemoryType::User, &[], 0, no_trail).unwrap();
    let shared = Value::array(shared, ArrayAccess::Mutable);

    let holder = memory
        .new_array(
            MemoryType::User,
            &[shared.clone(), shared.clone(), Value::NULL],
            0,
            no_trail,
        )
        .unwrap();
    let holder = Value::array(holder, ArrayAccess::Mutable);
    // Creator reference plus two slots.
    assert_eq!(memory.refcount(&shared), 3);

    memory
        .with_array(holder.heap_id().unwrap(), |container, memory| {
            container.set(memory, 0, Value::integer(0))
        })
        .unwrap();
    assert_eq!(memory.refcount(&shared), 2);

    memory.release(&holder);
    assert_eq!(memory.refcount(&shared), 1);
    memory.release(&shared);
    assert_eq!(memory.snapshot().used, 0);
}

#[test]
fn test_debug_mode_records_allocation_trails() {
    let mut memory = Memory::new(None, true);
    let id = memory
        .new_dictionary(MemoryType::User, || vec!["-dict-".to_string()])
        .unwrap();

    let snapshot = memory.snapshot();
    assert_eq!(snapshot.trails.len(), 1);
    assert_eq!(snapshot.trails[0].id, id);
    assert_eq!(snapshot.trails[0].trail, vec!["-dict-".to_string()]);

    memory.release(&Value::dictionary(id, true));
    assert!(memory.snapshot().trails.is_empty());
}
