//! Memory accounting as seen by a host: budgets, atomic failures, reference
//! counts and leak detection.

use psbots::{ErrorKind, Executable, State, StateOptions, Value};
use pretty_assertions::assert_eq;

mod cases;

fn bounded(extra: usize) -> State {
    // Measure what an idle state needs, then allow `extra` more units.
    let baseline = State::new(StateOptions::default()).unwrap();
    let used = baseline.memory().used;
    baseline.destroy().unwrap();

    State::new(StateOptions {
        max_memory: Some(used + extra),
        default_max_cycles: Some(cases::MAX_CYCLES),
        ..StateOptions::default()
    })
    .unwrap()
}

#[test]
fn test_ledger_returns_to_zero() {
    let mut state = State::new(cases::options()).unwrap();
    state
        .exec(Executable::source(
            "/d << /a [ 1 2 \"three\" ] /b { 4 } >> def d /a get aload pop d",
        ))
        .unwrap();
    state.run_to_completion().unwrap();
    assert!(state.memory().user > 0);
    assert!(state.memory().string > 0);
    state.destroy().unwrap();
}

#[test]
fn test_user_memory_is_released_with_the_last_reference() {
    let mut state = State::new(cases::options()).unwrap();
    state
        .exec(Executable::source("[ \"a\" [ \"b\" ] ] dup"))
        .unwrap();
    state.run_to_completion().unwrap();
    let held = state.memory();
    assert!(held.user > 0);

    state.exec(Executable::source("pop")).unwrap();
    state.run_to_completion().unwrap();
    assert_eq!(state.memory().user, held.user);

    state.exec(Executable::source("pop")).unwrap();
    state.run_to_completion().unwrap();
    assert_eq!(state.memory().user, 0);
    assert_eq!(state.memory().string, 0);
    state.destroy().unwrap();
}

#[test]
fn test_overflow_is_raised_in_hosted_code() {
    let mut state = bounded(256);
    state
        .exec(Executable::source("1 1000 array"))
        .unwrap();
    state.run_to_completion().unwrap();

    let exception = state.exception().unwrap();
    assert_eq!(exception.kind(), ErrorKind::VmOverflow);
    // The failed operator left its operands alone.
    assert_eq!(state.operands(), &[Value::integer(1), Value::integer(1000)]);
    assert_eq!(state.memory().user, 0);
    state.destroy().unwrap();
}

#[test]
fn test_overflow_can_be_intercepted() {
    let mut state = bounded(256);
    state
        .exec(Executable::source("{ 1000 array } stopped"))
        .unwrap();
    state.run_to_completion().unwrap();
    assert!(state.exception().is_none());
    assert_eq!(state.operands(), &[Value::integer(1000), Value::TRUE]);
    state.destroy().unwrap();
}

#[test]
fn test_operand_stack_growth_is_atomic() {
    // Enough for the script, not for a second block of 64 operand slots.
    let mut state = bounded(1024);
    // The 65th operand (the mark of `[`) needs the operand stack to grow.
    state
        .exec(Executable::source("0 63 { 1 } repeat [ 1 2 ] aload"))
        .unwrap();
    state.run_to_completion().unwrap();

    let exception = state.exception().unwrap();
    assert_eq!(exception.kind(), ErrorKind::VmOverflow);
    assert_eq!(state.operands().len(), 64);
    state.destroy().unwrap();
}

#[test]
fn test_exhaustion_inside_stopped_unwinds() {
    let mut state = bounded(1024);
    state
        .exec(Executable::source("{ { 1 } loop } stopped"))
        .unwrap();
    // `stopped` intercepts the overflow but has no room left to push `true`.
    state.run_to_completion().unwrap();

    let exception = state.exception().unwrap();
    assert_eq!(exception.kind(), ErrorKind::VmOverflow);
    assert_eq!(state.frames().count(), 0);
    assert_eq!(state.operands().len(), 64);
    state.destroy().unwrap();
}

#[test]
fn test_huge_array_request_overflows() {
    let mut state = bounded(1 << 20);
    state
        .exec(Executable::source("9223372036854775807 array"))
        .unwrap();
    state.run_to_completion().unwrap();

    let exception = state.exception().unwrap();
    assert_eq!(exception.kind(), ErrorKind::VmOverflow);
    assert_eq!(state.operands(), &[Value::integer(i64::MAX)]);
    assert_eq!(state.memory().user, 0);
    state.destroy().unwrap();
}

#[test]
fn test_huge_array_request_overflows_without_a_budget() {
    let mut state = State::new(cases::options()).unwrap();
    state
        .exec(Executable::source("{ 9223372036854775807 array } stopped"))
        .unwrap();
    state.run_to_completion().unwrap();
    assert!(state.exception().is_none());
    assert_eq!(
        state.operands(),
        &[Value::integer(i64::MAX), Value::TRUE]
    );
    state.destroy().unwrap();
}

#[test]
fn test_reference_cycles_are_reported_as_leaks() {
    let mut state = State::new(cases::options()).unwrap();
    state
        .exec(Executable::source("1 array dup dup 0 exch put"))
        .unwrap();
    state.run_to_completion().unwrap();
    assert!(state.exception().is_none());

    let error = state.destroy().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Internal);
}

#[test]
fn test_debug_mode_keeps_allocation_trails() {
    let mut state = State::new(StateOptions {
        debug_memory: true,
        ..cases::options()
    })
    .unwrap();
    state
        .exec(Executable::Source {
            text: "{ 1 array } exec".to_string(),
            origin: "trail.ps".to_string(),
        })
        .unwrap();
    state.run_to_completion().unwrap();

    let snapshot = state.memory();
    let user_trails: Vec<_> = snapshot
        .trails
        .iter()
        .filter(|trail| trail.memory_type == psbots::memory::MemoryType::User)
        .collect();
    assert_eq!(user_trails.len(), 1);
    assert!(user_trails[0].trail[0].starts_with("-array-"));
    state.destroy().unwrap();
}
