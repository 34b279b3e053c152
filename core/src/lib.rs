//! Embeddable stack interpreter for a PostScript-like language.
//!
//! Values flow through an operand stack, executable tokens are resolved
//! through a stack of dictionaries and pending work lives on a call stack
//! that the host drives one cycle at a time. All memory is accounted for by
//! a ledger, so a host can cap what hosted code allocates and check that
//! nothing leaked when a state is destroyed.
//!
//! Start with [`api::State`].

pub mod api;
pub mod errors;
pub mod memory;
pub mod parser;
pub mod stdlib;
pub mod values;
pub mod vm;

pub use memory::Memory;
