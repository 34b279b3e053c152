//! psbots - an embeddable, PostScript-like stack interpreter
//!
//! # Overview
//!
//! Hosted code manipulates an operand stack, resolves executable names
//! through a stack of dictionaries and runs one step at a time under the
//! control of the host. Typical uses are scriptable bots, rule engines and
//! any place where untrusted scripts must run within a memory and time
//! budget.
//!
//! # Quick Start
//!
//! ```
//! use psbots::{Executable, State, StateOptions, Value};
//!
//! let mut state = State::with_host(StateOptions::default(), |host| {
//!     host.define("width", Value::integer(80))
//! })
//! .unwrap();
//!
//! state.exec(Executable::source("width 2 div")).unwrap();
//! state.run_to_completion().unwrap();
//! assert_eq!(state.operands(), &[Value::integer(40)]);
//! state.destroy().unwrap();
//! ```
//!
//! # Budgets
//!
//! [`StateOptions::max_memory`] caps what the ledger grants (a failing
//! allocation raises `vmoverflow` inside the hosted code) and
//! [`State::run`] takes the number of cycles to run, so a host never hands
//! control over for good.
//!
//! # Errors
//!
//! Conditions raised by hosted code do not surface as Rust errors: they are
//! left pending on the state (see [`State::exception`]) unless
//! [`StateOptions::throw_on_exception`] is set.

pub use psbots_core::{api, errors, memory, parser, stdlib, values, vm};

pub use psbots_core::api::{Executable, HostBuilder, State, StateOptions};
pub use psbots_core::errors::{ErrorKind, Exception};
pub use psbots_core::values::Value;
