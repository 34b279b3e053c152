//! Builder for the host scope.

use crate::Memory;
use crate::errors::Result;
use crate::memory::{HeapId, MemoryType};
use crate::values::{ArrayAccess, Value};

/// Builder for the read-only host dictionary.
///
/// Names defined here are visible to hosted code but are resolved after the
/// builtins, so they cannot shadow them.
///
/// # Example
///
/// ```
/// use psbots_core::api::{State, StateOptions};
/// use psbots_core::values::Value;
///
/// let state = State::with_host(StateOptions::default(), |host| {
///     host.define("width", Value::integer(80))?;
///     let palette = host.array(&[Value::string("red"), Value::string("blue")])?;
///     host.define("palette", palette)
/// })
/// .unwrap();
/// state.destroy().unwrap();
/// ```
pub struct HostBuilder<'s> {
    memory: &'s mut Memory,
    scope: HeapId,
    /// Values created by the builder, released once it is done.
    created: Vec<Value>,
}

impl<'s> HostBuilder<'s> {
    pub(crate) fn new(memory: &'s mut Memory, scope: HeapId) -> Self {
        Self {
            memory,
            scope,
            created: Vec::new(),
        }
    }

    /// Bind `name` in the host scope.
    pub fn define(&mut self, name: &str, value: Value) -> Result<()> {
        self.memory
            .with_dictionary(self.scope, |dictionary, memory| {
                dictionary.define(memory, name, value)
            })
    }

    fn create(&mut self, items: &[Value], access: ArrayAccess) -> Result<Value> {
        let id = self.memory.new_array(MemoryType::System, items, 0, || {
            vec!["host scope".to_string()]
        })?;
        let value = Value::array(id, access);
        self.created.push(value.clone());
        Ok(value)
    }

    /// A read-only array to be bound with [`HostBuilder::define`].
    pub fn array(&mut self, items: &[Value]) -> Result<Value> {
        self.create(items, ArrayAccess::Literal)
    }

    /// A block to be bound with [`HostBuilder::define`].
    pub fn block(&mut self, items: &[Value]) -> Result<Value> {
        self.create(items, ArrayAccess::Block)
    }

    pub(crate) fn finish(self) {
        self.memory.release_all(&self.created);
    }
}
