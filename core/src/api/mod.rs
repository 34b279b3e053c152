//! Public API for hosting the interpreter.
//!
//! A host creates a [`State`], optionally filling its host scope through a
//! [`HostBuilder`], queues work with [`State::exec`] and drives it with
//! [`State::cycle`] or [`State::run`].
//!
//! # Example
//!
//! ```
//! use psbots_core::api::{Executable, State, StateOptions};
//! use psbots_core::values::Value;
//!
//! let mut state = State::with_host(StateOptions::default(), |host| {
//!     host.define("answer", Value::integer(42))
//! })
//! .unwrap();
//!
//! state.exec(Executable::source("answer 1 add")).unwrap();
//! state.run_to_completion().unwrap();
//! assert_eq!(state.operands(), &[Value::integer(43)]);
//! state.destroy().unwrap();
//! ```

pub mod host;
pub mod options;
pub mod state;

pub use host::HostBuilder;
pub use options::StateOptions;
pub use state::{Executable, State};
