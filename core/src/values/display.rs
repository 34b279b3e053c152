//! Rendering values back to source text.

use crate::Memory;
use crate::values::{ArrayAccess, Value, ValueData};
use core::fmt;

/// Containers nested deeper than this are abbreviated, which also keeps
/// self-referencing arrays printable.
const MAX_DEPTH: usize = 16;

fn escape_string(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '"' => vec!['\\', '"'],
            '\\' => vec!['\\', '\\'],
            '\n' => vec!['\\', 'n'],
            '\t' => vec!['\\', 't'],
            c => vec![c],
        })
        .collect()
}

/// Displays a value the way it would be written in source.
pub struct Formatted<'a> {
    memory: &'a Memory,
    value: &'a Value,
    depth: usize,
}

impl<'a> Formatted<'a> {
    pub fn new(memory: &'a Memory, value: &'a Value) -> Self {
        Self {
            memory,
            value,
            depth: 0,
        }
    }

    fn nested(&self, value: &'a Value) -> Self {
        Self {
            memory: self.memory,
            value,
            depth: self.depth + 1,
        }
    }
}

impl fmt::Display for Formatted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.data() {
            ValueData::Null => write!(f, "null"),
            ValueData::Boolean(value) => write!(f, "{}", value),
            ValueData::Integer(value) => write!(f, "{}", value),
            ValueData::String(text) => write!(f, "\"{}\"", escape_string(text)),
            ValueData::Name(name) if self.value.is_executable() => write!(f, "{}", name),
            ValueData::Name(name) => write!(f, "/{}", name),
            ValueData::Mark => write!(f, "-mark-"),
            ValueData::Operator(operator) => write!(f, "-{}-", operator.name()),
            ValueData::Array { id, .. } => {
                let (open, close) = match self.value.array_access() {
                    Some(ArrayAccess::Block) => ("{", "}"),
                    _ => ("[", "]"),
                };
                if self.depth >= MAX_DEPTH {
                    return write!(f, "{} ... {}", open, close);
                }
                write!(f, "{}", open)?;
                for item in self.memory.array(*id).items() {
                    write!(f, " {}", self.nested(item))?;
                }
                write!(f, " {}", close)
            }
            ValueData::Dictionary { id, .. } => {
                if self.depth >= MAX_DEPTH {
                    return write!(f, "<< ... >>");
                }
                let dictionary = self.memory.dictionary(*id);
                write!(f, "<<")?;
                for name in dictionary.names() {
                    if let Some(value) = dictionary.get(&name) {
                        write!(f, " /{} {}", name, self.nested(value))?;
                    }
                }
                write!(f, " >>")
            }
        }
    }
}

/// Source text of `value`.
pub fn format_value(memory: &Memory, value: &Value) -> String {
    Formatted::new(memory, value).to_string()
}

/// Source text of a sequence of values, separated by spaces.
pub fn format_values<'v>(memory: &Memory, values: impl IntoIterator<Item = &'v Value>) -> String {
    values
        .into_iter()
        .map(|value| format_value(memory, value))
        .collect::<Vec<_>>()
        .join(" ")
}
