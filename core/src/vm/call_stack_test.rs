use super::{CallStack, OperatorState, PendingException};
use crate::Memory;
use crate::errors::{ErrorKind, Exception};
use crate::values::Value;
use pretty_assertions::assert_eq;

use OperatorState::*;

const ALL_STATES: [OperatorState; 8] = [
    Unknown,
    FirstCall,
    Running(1),
    Running(7),
    CallBeforePop,
    Popping(-2),
    Popping(-9),
    Pop,
];

fn allowed(from: OperatorState, to: OperatorState) -> bool {
    matches!(
        (from, to),
        (Unknown, FirstCall)
            | (FirstCall, Pop | Running(_) | CallBeforePop)
            | (Running(_), Running(_) | Pop | CallBeforePop)
            | (CallBeforePop, FirstCall | Popping(_) | Pop)
            | (Popping(_), Popping(_) | Pop)
    )
}

#[test]
fn test_transition_table() {
    for from in ALL_STATES {
        for to in ALL_STATES {
            assert_eq!(
                from.can_become(to),
                allowed(from, to),
                "{:?} -> {:?}",
                from,
                to
            );
        }
    }
}

#[test]
fn test_payloads_are_validated() {
    assert!(!FirstCall.can_become(Running(0)));
    assert!(!FirstCall.can_become(Running(-3)));
    assert!(!CallBeforePop.can_become(Popping(-1)));
    assert!(!CallBeforePop.can_become(Popping(4)));
}

#[test]
fn test_integer_encoding() {
    assert_eq!(FirstCall.as_integer(), Some(0));
    assert_eq!(CallBeforePop.as_integer(), Some(-1));
    assert_eq!(Running(3).as_integer(), Some(3));
    assert_eq!(Popping(-4).as_integer(), Some(-4));
    assert_eq!(Pop.as_integer(), None);
    for step in [-5, -1, 0, 1, 5] {
        assert_eq!(OperatorState::from_integer(step).as_integer(), Some(step));
    }
}

#[test]
fn test_illegal_transition_is_internal_and_keeps_state() {
    let mut memory = Memory::new(None, false);
    let mut calls = CallStack::new(&mut memory).unwrap();
    calls.push(&mut memory, Value::integer(1)).unwrap();

    calls.set_state(0, FirstCall).unwrap();
    let error = calls.set_state(0, Popping(-2)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Internal);
    assert_eq!(calls.state(0), FirstCall);

    calls.set_state(0, Pop).unwrap();
    assert!(calls.set_state(0, FirstCall).is_err());
    calls.dispose(&mut memory).unwrap();
    assert_eq!(memory.snapshot().used, 0);
}

#[test]
fn test_frames_are_listed_top_first() {
    let mut memory = Memory::new(None, false);
    let mut calls = CallStack::new(&mut memory).unwrap();
    calls.push(&mut memory, Value::name("a")).unwrap();
    calls.push(&mut memory, Value::name("b")).unwrap();
    calls.set_cursor(0, 4);

    let frames: Vec<_> = calls.frames().map(|frame| (frame.value.clone(), frame.cursor)).collect();
    assert_eq!(
        frames,
        vec![(Value::name("b"), 0), (Value::name("a"), 4)]
    );
    assert_eq!(calls.top_index(), Some(1));
    calls.dispose(&mut memory).unwrap();
}

#[test]
fn test_locals_are_released_with_the_frame() {
    let mut memory = Memory::new(None, false);
    let mut calls = CallStack::new(&mut memory).unwrap();
    let baseline = memory.snapshot().used;

    calls.push(&mut memory, Value::name("op")).unwrap();
    assert_eq!(calls.local(&memory, 0, "count"), None);
    calls
        .set_local(&mut memory, 0, "count", Value::integer(3))
        .unwrap();
    calls
        .set_local(&mut memory, 0, "label", Value::string("loop"))
        .unwrap();
    assert_eq!(calls.local(&memory, 0, "count"), Some(&Value::integer(3)));
    assert!(calls.frames().next().unwrap().has_locals);

    calls.pop(&mut memory).unwrap();
    assert_eq!(memory.snapshot().used, baseline);
    assert_eq!(memory.live_containers(), 0);
    calls.dispose(&mut memory).unwrap();
}

#[test]
fn test_replace_top_resets_the_frame() {
    let mut memory = Memory::new(None, false);
    let mut calls = CallStack::new(&mut memory).unwrap();
    calls.push(&mut memory, Value::name("first")).unwrap();
    calls.set_state(0, FirstCall).unwrap();
    calls.set_cursor(0, 2);
    calls
        .set_local(&mut memory, 0, "x", Value::integer(1))
        .unwrap();

    calls.replace_top(&mut memory, Value::name("second")).unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls.top(), Some(&Value::name("second")));
    assert_eq!(calls.state(0), Unknown);
    assert_eq!(calls.cursor(0), 0);
    assert_eq!(calls.local(&memory, 0, "x"), None);
    assert_eq!(memory.live_containers(), 0);
    calls.dispose(&mut memory).unwrap();
}

#[test]
fn test_stashed_exception_is_discharged_with_the_frame() {
    let mut memory = Memory::new(None, false);
    let mut calls = CallStack::new(&mut memory).unwrap();
    let baseline = memory.snapshot().used;
    calls.push(&mut memory, Value::name("finally")).unwrap();

    let pending = PendingException::charge(&mut memory.ledger, Exception::range_check("kept"));
    calls.stash(&mut memory.ledger, 0, pending);
    assert!(memory.snapshot().used > baseline);

    calls.pop(&mut memory).unwrap();
    assert_eq!(memory.snapshot().used, baseline);
    calls.dispose(&mut memory).unwrap();
}

#[test]
fn test_stashing_twice_discharges_the_earlier_record() {
    let mut memory = Memory::new(None, false);
    let mut calls = CallStack::new(&mut memory).unwrap();
    calls.push(&mut memory, Value::name("finally")).unwrap();
    let baseline = memory.snapshot().used;

    let first = PendingException::charge(&mut memory.ledger, Exception::range_check("first"));
    calls.stash(&mut memory.ledger, 0, first);
    let after_first = memory.snapshot().used;
    let second = PendingException::charge(&mut memory.ledger, Exception::range_check("other"));
    calls.stash(&mut memory.ledger, 0, second);
    assert_eq!(memory.snapshot().used, after_first);

    let kept = calls.take_stash(0).unwrap();
    assert_eq!(kept.exception().message(), "other");
    kept.discharge(&mut memory.ledger);
    assert_eq!(memory.snapshot().used, baseline);
    calls.dispose(&mut memory).unwrap();
}

#[test]
fn test_abandon_bypasses_the_transition_table() {
    let mut memory = Memory::new(None, false);
    let mut calls = CallStack::new(&mut memory).unwrap();
    calls.push(&mut memory, Value::name("stopped")).unwrap();
    calls.set_state(0, FirstCall).unwrap();
    calls.set_state(0, CallBeforePop).unwrap();
    calls.set_state(0, Popping(-2)).unwrap();

    calls.abandon(0);
    assert_eq!(calls.state(0), Pop);
    assert!(calls.set_state(0, Popping(-3)).is_err());
    calls.dispose(&mut memory).unwrap();
}
