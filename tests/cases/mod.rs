#![allow(dead_code, unused_macros)]

use psbots::{ErrorKind, Executable, State, StateOptions};

/// Cycle budget for every test run; a script that needs more is looping.
pub const MAX_CYCLES: usize = 100_000;

pub fn options() -> StateOptions {
    StateOptions {
        default_max_cycles: Some(MAX_CYCLES),
        ..StateOptions::default()
    }
}

/// Run `source` to completion in a fresh state.
pub fn run(source: &str) -> State {
    let mut state = State::new(options()).expect("state creation");
    state.exec(Executable::source(source)).expect("exec");
    state.run_to_completion().expect("run to completion");
    state
}

/// Operand stack, bottom to top, as source text.
pub fn stack(state: &State) -> String {
    state
        .operands()
        .iter()
        .map(|value| state.format_value(value))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn expect_stack(source: &str, expected: &str) {
    let state = run(source);
    if let Some(exception) = state.exception() {
        panic!("{:?} raised {} ({})", source, exception.name(), exception.message());
    }
    pretty_assertions::assert_eq!(stack(&state), expected, "stack after {:?}", source);
    state.destroy().expect("no leak");
}

pub fn expect_raises(source: &str, kind: ErrorKind, expected: &str) {
    let state = run(source);
    let raised = state.exception().map(|exception| exception.kind());
    pretty_assertions::assert_eq!(raised, Some(kind), "condition raised by {:?}", source);
    pretty_assertions::assert_eq!(stack(&state), expected, "stack after {:?}", source);
    state.destroy().expect("no leak");
}

/// Declares a test running `input` and checking the final operand stack,
/// and optionally the raised condition.
macro_rules! test_case {
    ($name:ident, input: $input:expr, stack: $stack:expr $(,)?) => {
        #[test]
        fn $name() {
            $crate::cases::expect_stack($input, $stack);
        }
    };
    ($name:ident, input: $input:expr, raises: $kind:expr, stack: $stack:expr $(,)?) => {
        #[test]
        fn $name() {
            $crate::cases::expect_raises($input, $kind, $stack);
        }
    };
}
