//! Memory ledger and reference-counted heap.
//!
//! [`Memory`] joins the two and owns the only API that changes reference
//! counts: [`Memory::retain`] and [`Memory::release`]. Every container calls
//! `retain` before storing a value and `release` after dropping one.
//! Primitive values (null, booleans, integers, names, marks, operators) are
//! copied freely and never touch the ledger.

mod heap;
mod ledger;

pub use heap::HeapId;
pub use ledger::{AllocationTrail, Ledger, MemorySize, MemorySnapshot, MemoryType};

pub(crate) use heap::{Heap, HeapObject};

use crate::errors::Result;
use crate::values::{Value, ValueData};
use crate::vm::{Dictionary, ValueContainer};

#[derive(Debug)]
pub struct Memory {
    pub(crate) ledger: Ledger,
    pub(crate) heap: Heap,
}

impl Memory {
    pub fn new(total: Option<usize>, debug: bool) -> Self {
        Self {
            ledger: Ledger::new(total, debug),
            heap: Heap::default(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        self.ledger.snapshot()
    }

    /// Take one reference on a tracked value.
    ///
    /// Only the first reference to a string content can fail (it is charged
    /// to the ledger); container references never allocate.
    pub fn retain(&mut self, value: &Value) -> Result<()> {
        match value.data() {
            ValueData::String(text) => self.ledger.add_string_ref(text),
            ValueData::Array { id, .. } | ValueData::Dictionary { id, .. } => {
                self.heap.add_ref(*id);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Retain every value, or none of them.
    pub fn retain_all(&mut self, values: &[Value]) -> Result<()> {
        for (index, value) in values.iter().enumerate() {
            if let Err(error) = self.retain(value) {
                for retained in &values[..index] {
                    self.release(retained);
                }
                return Err(error);
            }
        }
        Ok(())
    }

    /// Drop one reference on a tracked value, disposing of containers whose
    /// count reaches zero (and, transitively, of what they held).
    pub fn release(&mut self, value: &Value) {
        let mut pending = vec![value.clone()];
        while let Some(value) = pending.pop() {
            match value.data() {
                ValueData::String(text) => self.ledger.release_string(text),
                ValueData::Array { id, .. } | ValueData::Dictionary { id, .. } => {
                    if let Some(object) = self.heap.release(*id) {
                        self.ledger.forget_trail(*id);
                        match object {
                            HeapObject::Array(container) => {
                                pending.extend(container.into_items(&mut self.ledger));
                            }
                            HeapObject::Dictionary(dictionary) => {
                                pending.extend(dictionary.into_values(&mut self.ledger));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    pub fn release_all(&mut self, values: &[Value]) {
        for value in values {
            self.release(value);
        }
    }

    /// Current reference count of a tracked value, 0 for untracked ones.
    pub fn refcount(&self, value: &Value) -> usize {
        match value.data() {
            ValueData::String(text) => self.ledger.string_refs(text),
            ValueData::Array { id, .. } | ValueData::Dictionary { id, .. } => {
                self.heap.refcount(*id)
            }
            _ => 0,
        }
    }

    /// Allocate an array holding `items`. The caller owns the initial
    /// reference.
    pub(crate) fn new_array(
        &mut self,
        memory_type: MemoryType,
        items: &[Value],
        increment: usize,
        trail: impl FnOnce() -> Vec<String>,
    ) -> Result<HeapId> {
        let mut container = ValueContainer::new(
            &mut self.ledger,
            memory_type,
            ValueContainer::VALUE_SLOT,
            items.len(),
            increment,
        )?;
        if let Err(error) = container.popush(self, 0, items) {
            container.dispose(self);
            return Err(error);
        }
        Ok(self.store_array(container, memory_type, trail))
    }

    /// Allocate a fixed-size array of `len` copies of `fill`. The ledger is
    /// charged before any slot exists.
    pub(crate) fn new_filled_array(
        &mut self,
        memory_type: MemoryType,
        len: usize,
        fill: &Value,
        trail: impl FnOnce() -> Vec<String>,
    ) -> Result<HeapId> {
        let mut container = ValueContainer::new(
            &mut self.ledger,
            memory_type,
            ValueContainer::VALUE_SLOT,
            len,
            0,
        )?;
        if let Err(error) = container.fill(self, fill, len) {
            container.dispose(self);
            return Err(error);
        }
        Ok(self.store_array(container, memory_type, trail))
    }

    fn store_array(
        &mut self,
        container: ValueContainer,
        memory_type: MemoryType,
        trail: impl FnOnce() -> Vec<String>,
    ) -> HeapId {
        let id = self.heap.allocate(HeapObject::Array(container));
        if self.ledger.is_debug() {
            self.ledger.record_trail(id, memory_type, trail());
        }
        id
    }

    /// Allocate an empty dictionary. The caller owns the initial reference.
    pub(crate) fn new_dictionary(
        &mut self,
        memory_type: MemoryType,
        trail: impl FnOnce() -> Vec<String>,
    ) -> Result<HeapId> {
        self.ledger.allocate(Dictionary::HEADER, memory_type)?;
        let id = self
            .heap
            .allocate(HeapObject::Dictionary(Dictionary::new(memory_type)));
        if self.ledger.is_debug() {
            self.ledger.record_trail(id, memory_type, trail());
        }
        Ok(id)
    }

    /// # Panics
    ///
    /// Panics if `id` does not address an array.
    pub fn array(&self, id: HeapId) -> &ValueContainer {
        match self.heap.get(id) {
            HeapObject::Array(container) => container,
            HeapObject::Dictionary(_) => panic!("{} is not an array", id),
        }
    }

    /// # Panics
    ///
    /// Panics if `id` does not address a dictionary.
    pub fn dictionary(&self, id: HeapId) -> &Dictionary {
        match self.heap.get(id) {
            HeapObject::Dictionary(dictionary) => dictionary,
            HeapObject::Array(_) => panic!("{} is not a dictionary", id),
        }
    }

    /// Mutate an array while keeping the rest of the memory reachable.
    pub(crate) fn with_array<R>(
        &mut self,
        id: HeapId,
        f: impl FnOnce(&mut ValueContainer, &mut Memory) -> R,
    ) -> R {
        let HeapObject::Array(mut container) = self.heap.check_out(id) else {
            panic!("{} is not an array", id);
        };
        let result = f(&mut container, self);
        self.heap.check_in(id, HeapObject::Array(container));
        result
    }

    /// Mutate a dictionary while keeping the rest of the memory reachable.
    pub(crate) fn with_dictionary<R>(
        &mut self,
        id: HeapId,
        f: impl FnOnce(&mut Dictionary, &mut Memory) -> R,
    ) -> R {
        let HeapObject::Dictionary(mut dictionary) = self.heap.check_out(id) else {
            panic!("{} is not a dictionary", id);
        };
        let result = f(&mut dictionary, self);
        self.heap.check_in(id, HeapObject::Dictionary(dictionary));
        result
    }

    /// Number of live heap containers.
    pub fn live_containers(&self) -> usize {
        self.heap.live()
    }
}

#[cfg(test)]
mod memory_test;
