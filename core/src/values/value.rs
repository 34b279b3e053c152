use crate::memory::HeapId;
use crate::values::Operator;
use core::fmt;
use std::sync::Arc;

/// Where a value came from in the source text. Diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSource {
    /// Name of the origin (file name or host-supplied label).
    pub origin: Arc<str>,
    /// Byte offset of the token in `source`.
    pub offset: usize,
    /// Byte length of the token.
    pub length: usize,
    /// Whole source text the token belongs to.
    pub source: Arc<str>,
}

impl DebugSource {
    pub fn new(origin: impl Into<Arc<str>>, source: impl Into<Arc<str>>) -> Self {
        let source = source.into();
        Self {
            origin: origin.into(),
            offset: 0,
            length: source.len(),
            source,
        }
    }

    /// Sub-range of the same source, relative to this one.
    pub fn slice(&self, offset: usize, length: usize) -> Self {
        Self {
            origin: Arc::clone(&self.origin),
            offset: self.offset + offset,
            length,
            source: Arc::clone(&self.source),
        }
    }

    pub fn text(&self) -> &str {
        self.source
            .get(self.offset..self.offset + self.length)
            .unwrap_or_default()
    }
}

impl fmt::Display for DebugSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.origin, self.offset)
    }
}

/// Type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    String,
    Name,
    Mark,
    Operator,
    Array,
    Dictionary,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::String => "string",
            ValueKind::Name => "name",
            ValueKind::Mark => "mark",
            ValueKind::Operator => "operator",
            ValueKind::Array => "array",
            ValueKind::Dictionary => "dictionary",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Permission flavour of an array value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayAccess {
    /// Executable and read-only: deferred code.
    Block,
    /// Read-only data.
    Literal,
    /// Writable data.
    Mutable,
}

/// Payload of a [`Value`].
///
/// Strings, arrays and dictionaries are tracked: holding one in a container
/// means holding a reference counted by [`crate::Memory`]. Everything else is
/// plain data.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueData {
    Null,
    Boolean(bool),
    Integer(i64),
    String(Arc<str>),
    Name(Arc<str>),
    Mark,
    Operator(Arc<Operator>),
    Array { id: HeapId, writable: bool },
    Dictionary { id: HeapId, writable: bool },
}

/// A first-class datum exchanged between stacks and operators.
///
/// Values are immutable; permission combinations are fixed by the
/// constructors (strings are always read-only, an executable array is always
/// read-only, and so on).
#[derive(Debug, Clone)]
pub struct Value {
    data: ValueData,
    executable: bool,
    debug_source: Option<Arc<DebugSource>>,
}

static_assertions::assert_impl_all!(Value: Send, Sync, Clone);

impl Value {
    pub const NULL: Value = Value::plain(ValueData::Null);
    pub const MARK: Value = Value::plain(ValueData::Mark);
    pub const TRUE: Value = Value::plain(ValueData::Boolean(true));
    pub const FALSE: Value = Value::plain(ValueData::Boolean(false));

    const fn plain(data: ValueData) -> Self {
        Self {
            data,
            executable: false,
            debug_source: None,
        }
    }

    pub const fn boolean(value: bool) -> Self {
        Self::plain(ValueData::Boolean(value))
    }

    pub const fn integer(value: i64) -> Self {
        Self::plain(ValueData::Integer(value))
    }

    /// A string literal.
    pub fn string(text: impl Into<Arc<str>>) -> Self {
        Self::plain(ValueData::String(text.into()))
    }

    /// Source text to be tokenized and executed.
    pub fn source(text: impl Into<Arc<str>>) -> Self {
        Self {
            executable: true,
            ..Self::string(text)
        }
    }

    /// An executable name, resolved through the dictionary stack.
    pub fn name(text: impl Into<Arc<str>>) -> Self {
        Self {
            data: ValueData::Name(text.into()),
            executable: true,
            debug_source: None,
        }
    }

    /// A literal name (`/name`).
    pub fn literal_name(text: impl Into<Arc<str>>) -> Self {
        Self::plain(ValueData::Name(text.into()))
    }

    pub fn operator(operator: Arc<Operator>) -> Self {
        Self {
            data: ValueData::Operator(operator),
            executable: true,
            debug_source: None,
        }
    }

    pub fn array(id: HeapId, access: ArrayAccess) -> Self {
        Self {
            data: ValueData::Array {
                id,
                writable: access == ArrayAccess::Mutable,
            },
            executable: access == ArrayAccess::Block,
            debug_source: None,
        }
    }

    pub fn dictionary(id: HeapId, writable: bool) -> Self {
        Self::plain(ValueData::Dictionary { id, writable })
    }

    pub fn with_debug_source(mut self, debug_source: Option<Arc<DebugSource>>) -> Self {
        self.debug_source = debug_source;
        self
    }

    pub fn data(&self) -> &ValueData {
        &self.data
    }

    pub fn kind(&self) -> ValueKind {
        match self.data {
            ValueData::Null => ValueKind::Null,
            ValueData::Boolean(_) => ValueKind::Boolean,
            ValueData::Integer(_) => ValueKind::Integer,
            ValueData::String(_) => ValueKind::String,
            ValueData::Name(_) => ValueKind::Name,
            ValueData::Mark => ValueKind::Mark,
            ValueData::Operator(_) => ValueKind::Operator,
            ValueData::Array { .. } => ValueKind::Array,
            ValueData::Dictionary { .. } => ValueKind::Dictionary,
        }
    }

    pub fn is_executable(&self) -> bool {
        self.executable
    }

    pub fn is_read_only(&self) -> bool {
        match self.data {
            ValueData::Array { writable, .. } | ValueData::Dictionary { writable, .. } => !writable,
            _ => true,
        }
    }

    pub fn debug_source(&self) -> Option<&Arc<DebugSource>> {
        self.debug_source.as_ref()
    }

    /// Whether holding this value involves a reference count.
    pub fn is_tracked(&self) -> bool {
        matches!(
            self.data,
            ValueData::String(_) | ValueData::Array { .. } | ValueData::Dictionary { .. }
        )
    }

    pub fn array_access(&self) -> Option<ArrayAccess> {
        match self.data {
            ValueData::Array { writable: true, .. } => Some(ArrayAccess::Mutable),
            ValueData::Array { .. } if self.executable => Some(ArrayAccess::Block),
            ValueData::Array { .. } => Some(ArrayAccess::Literal),
            _ => None,
        }
    }

    pub fn is_block(&self) -> bool {
        self.array_access() == Some(ArrayAccess::Block)
    }

    pub fn is_mark(&self) -> bool {
        matches!(self.data, ValueData::Mark)
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self.data {
            ValueData::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.data {
            ValueData::Integer(value) => Some(value),
            _ => None,
        }
    }

    /// Text of a string or a name.
    pub fn as_text(&self) -> Option<&Arc<str>> {
        match &self.data {
            ValueData::String(text) | ValueData::Name(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Arc<str>> {
        match &self.data {
            ValueData::Name(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_operator(&self) -> Option<&Arc<Operator>> {
        match &self.data {
            ValueData::Operator(operator) => Some(operator),
            _ => None,
        }
    }

    pub fn heap_id(&self) -> Option<HeapId> {
        match self.data {
            ValueData::Array { id, .. } | ValueData::Dictionary { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Same datum, ignoring permissions and debug information.
    pub fn same_as(&self, other: &Value) -> bool {
        match (&self.data, &other.data) {
            (ValueData::Array { id: a, .. }, ValueData::Array { id: b, .. })
            | (ValueData::Dictionary { id: a, .. }, ValueData::Dictionary { id: b, .. }) => a == b,
            (a, b) => a == b,
        }
    }
}

impl PartialEq for Value {
    /// Debug sources do not take part in equality.
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.executable == other.executable
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::integer(value)
    }
}
