use crate::api::State;
use crate::errors::{ErrorKind, Result};
use crate::values::{ArrayAccess, Value, ValueKind};
use core::fmt;

/// Native implementation of a function operator.
///
/// `params` holds the values matched by the operator's signature, top of the
/// operand stack first. It is empty on every invocation but the first.
pub type Implementation = fn(state: &mut State, params: &[Value]) -> Result<()>;

/// Expected type (and permission) of one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Any,
    Null,
    Boolean,
    Integer,
    String,
    Name,
    Mark,
    Operator,
    /// Any array, whatever its permissions.
    Array,
    /// Executable read-only array.
    Block,
    MutableArray,
    Dictionary,
    /// Writable dictionary.
    MutableDictionary,
}

impl ParamType {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::Any => true,
            ParamType::Null => value.kind() == ValueKind::Null,
            ParamType::Boolean => value.kind() == ValueKind::Boolean,
            ParamType::Integer => value.kind() == ValueKind::Integer,
            ParamType::String => value.kind() == ValueKind::String,
            ParamType::Name => value.kind() == ValueKind::Name,
            ParamType::Mark => value.kind() == ValueKind::Mark,
            ParamType::Operator => value.kind() == ValueKind::Operator,
            ParamType::Array => value.kind() == ValueKind::Array,
            ParamType::Block => value.array_access() == Some(ArrayAccess::Block),
            ParamType::MutableArray => value.array_access() == Some(ArrayAccess::Mutable),
            ParamType::Dictionary => value.kind() == ValueKind::Dictionary,
            ParamType::MutableDictionary => {
                value.kind() == ValueKind::Dictionary && !value.is_read_only()
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamType::Any => "any",
            ParamType::Null => "null",
            ParamType::Boolean => "boolean",
            ParamType::Integer => "integer",
            ParamType::String => "string",
            ParamType::Name => "name",
            ParamType::Mark => "mark",
            ParamType::Operator => "operator",
            ParamType::Array => "array",
            ParamType::Block => "block",
            ParamType::MutableArray => "mutable array",
            ParamType::Dictionary => "dictionary",
            ParamType::MutableDictionary => "mutable dictionary",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expected outcome of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// Source producing the same operand stack and memory usage.
    Stack(&'static str),
    /// The input must fail with this condition.
    Raises(ErrorKind),
}

/// Executable documentation: running `input` behaves like `output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub input: &'static str,
    pub output: Expected,
}

#[derive(Clone)]
pub enum OperatorBody {
    Constant(Value),
    Function {
        /// Top of the operand stack first.
        signature: &'static [ParamType],
        implementation: Implementation,
    },
}

/// A named, registered unit of behaviour.
#[derive(Clone)]
pub struct Operator {
    name: &'static str,
    body: OperatorBody,
    samples: Vec<Sample>,
    is_loop: bool,
}

impl Operator {
    pub fn constant(name: &'static str, value: Value) -> Self {
        Self {
            name,
            body: OperatorBody::Constant(value),
            samples: Vec::new(),
            is_loop: false,
        }
    }

    pub fn function(
        name: &'static str,
        signature: &'static [ParamType],
        implementation: Implementation,
    ) -> Self {
        Self {
            name,
            body: OperatorBody::Function {
                signature,
                implementation,
            },
            samples: Vec::new(),
            is_loop: false,
        }
    }

    /// Marks the operator as a loop: `break` targets its frames.
    pub fn looping(mut self) -> Self {
        self.is_loop = true;
        self
    }

    pub fn sample(mut self, input: &'static str, output: &'static str) -> Self {
        self.samples.push(Sample {
            input,
            output: Expected::Stack(output),
        });
        self
    }

    pub fn sample_fails(mut self, input: &'static str, kind: ErrorKind) -> Self {
        self.samples.push(Sample {
            input,
            output: Expected::Raises(kind),
        });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn body(&self) -> &OperatorBody {
        &self.body
    }

    pub fn signature(&self) -> &'static [ParamType] {
        match self.body {
            OperatorBody::Constant(_) => &[],
            OperatorBody::Function { signature, .. } => signature,
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn is_loop(&self) -> bool {
        self.is_loop
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}-", self.name)
    }
}

/// Operators are compared by identity: two registrations with the same name
/// are different operators.
impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }
}
