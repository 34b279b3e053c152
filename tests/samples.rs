//! Every builtin operator documents itself with samples. Running a sample's
//! input must behave exactly like running its output: same operand stack and
//! same memory usage per category, or the declared condition.

use psbots::stdlib::registry;
use psbots::values::{Expected, Sample};
use psbots::{Executable, State, StateOptions};

#[macro_use]
mod cases;

struct Outcome {
    stack: String,
    totals: (usize, usize, usize),
    state: State,
}

fn execute(source: &str) -> Result<Outcome, String> {
    let mut state = State::new(cases::options()).map_err(|error| error.to_string())?;
    state
        .exec(Executable::source(source))
        .map_err(|error| error.to_string())?;
    state
        .run_to_completion()
        .map_err(|error| format!("did not complete: {}", error))?;
    let memory = state.memory();
    Ok(Outcome {
        stack: cases::stack(&state),
        totals: (memory.system, memory.user, memory.string),
        state,
    })
}

fn check(sample: &Sample) -> Result<(), String> {
    let input = execute(sample.input)?;
    let result = match sample.output {
        Expected::Stack(output) => {
            if let Some(exception) = input.state.exception() {
                return Err(format!("raised {}: {}", exception.name(), exception.message()));
            }
            let expected = execute(output)?;
            let result = if input.stack != expected.stack {
                Err(format!("stack `{}`, expected `{}`", input.stack, expected.stack))
            } else if input.totals != expected.totals {
                Err(format!(
                    "memory (system, user, string) {:?}, expected {:?}",
                    input.totals, expected.totals
                ))
            } else {
                Ok(())
            };
            expected
                .state
                .destroy()
                .map_err(|error| format!("output leaked: {}", error))?;
            result
        }
        Expected::Raises(kind) => match input.state.exception() {
            Some(exception) if exception.kind() == kind => Ok(()),
            Some(exception) => Err(format!("raised {}, expected {}", exception.name(), kind)),
            None => Err(format!("completed with `{}`, expected {}", input.stack, kind)),
        },
    };
    input
        .state
        .destroy()
        .map_err(|error| format!("input leaked: {}", error))?;
    result
}

#[test]
fn test_operator_samples() {
    let mut failures = Vec::new();
    let mut checked = 0;
    for operator in registry().iter() {
        for sample in operator.samples() {
            checked += 1;
            if let Err(reason) = check(sample) {
                failures.push(format!("{} `{}`: {}", operator.name(), sample.input, reason));
            }
        }
    }
    assert!(checked > registry().len());
    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

#[test]
fn test_samples_start_from_a_clean_state() {
    // A sample output of "" must leave nothing behind.
    let outcome = execute("").unwrap();
    assert_eq!(outcome.stack, "");
    assert_eq!(outcome.totals.1, 0);
    assert_eq!(outcome.totals.2, 0);
    outcome.state.destroy().unwrap();
}

test_case!(
    samples_compare_formatted_stacks,
    input: "<< /b 2 /a 1 >>",
    stack: "<< /a 1 /b 2 >>",
);
