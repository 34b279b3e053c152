pub mod display;
pub mod operator;
pub mod value;

pub use display::{Formatted, format_value, format_values};
pub use operator::{Expected, Implementation, Operator, OperatorBody, ParamType, Sample};
pub use value::{ArrayAccess, DebugSource, Value, ValueData, ValueKind};

#[cfg(test)]
mod display_test;
