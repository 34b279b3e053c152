mod call_stack;
mod container;
mod cycle;
mod dictionary;
mod dictionary_stack;
mod operand_stack;
mod pending;

pub use call_stack::{CallStack, Frame, OperatorState};
pub use container::ValueContainer;
pub use dictionary::Dictionary;
pub use dictionary_stack::DictionaryStack;
pub use operand_stack::{OperandStack, Params};
pub use pending::PendingException;

#[cfg(test)]
mod call_stack_test;
