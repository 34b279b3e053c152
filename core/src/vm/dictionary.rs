use crate::Memory;
use crate::errors::Result;
use crate::memory::{Ledger, MemorySize, MemoryType};
use crate::values::Value;
use hashbrown::HashMap;
use std::sync::Arc;

/// A name to value mapping living in the heap.
///
/// Each entry is charged to the ledger when it is created; replacing the
/// value of an existing entry costs nothing beyond retaining the new value.
#[derive(Debug)]
pub struct Dictionary {
    entries: HashMap<Arc<str>, Value>,
    memory_type: MemoryType,
}

impl Dictionary {
    /// Fixed cost of an empty dictionary.
    pub const HEADER: MemorySize = MemorySize {
        bytes: 0,
        integers: 1,
        pointers: 2,
        values: 0,
    };

    pub(crate) fn new(memory_type: MemoryType) -> Self {
        Self {
            entries: HashMap::new(),
            memory_type,
        }
    }

    fn slot_size(name: &str) -> MemorySize {
        MemorySize {
            bytes: name.len(),
            pointers: 1,
            values: 1,
            ..MemorySize::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entry names in lexicographic order.
    pub fn names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<Arc<str>> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_ref(), value))
    }

    /// Bind `name` to `value`, creating the entry if needed.
    pub(crate) fn define(&mut self, memory: &mut Memory, name: &str, value: Value) -> Result<()> {
        if let Some(slot) = self.entries.get_mut(name) {
            memory.retain(&value)?;
            let previous = core::mem::replace(slot, value);
            memory.release(&previous);
            return Ok(());
        }
        let size = Self::slot_size(name);
        memory.ledger.allocate(size, self.memory_type)?;
        if let Err(error) = memory.retain(&value) {
            memory.ledger.release(size, self.memory_type);
            return Err(error);
        }
        self.entries.insert(Arc::from(name), value);
        Ok(())
    }

    /// Give back the entries and header, handing the (still retained) values
    /// to the caller.
    pub(crate) fn into_values(self, ledger: &mut Ledger) -> Vec<Value> {
        let mut values = Vec::with_capacity(self.entries.len());
        for (name, value) in self.entries {
            ledger.release(Self::slot_size(&name), self.memory_type);
            values.push(value);
        }
        ledger.release(Self::HEADER, self.memory_type);
        values
    }
}
