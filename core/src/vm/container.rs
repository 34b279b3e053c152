use crate::Memory;
use crate::errors::{ErrorKind, Exception, Result};
use crate::memory::{Ledger, MemorySize, MemoryType};
use crate::values::Value;

/// A growable sequence of values charged to the memory ledger.
///
/// The container starts with `initial_capacity` slots and grows by blocks of
/// `increment` slots, each block being a separate ledger allocation. When the
/// length falls back below a granted block, the block is released. A
/// container with an increment of zero is fixed-size.
///
/// Every operation that stores values retains them first and every operation
/// that drops values releases them last, so a value moved within the same
/// container is never freed in between. Failed operations leave the
/// container untouched.
///
/// The end of `items` is the top when the container is used as a stack.
#[derive(Debug)]
pub struct ValueContainer {
    items: Vec<Value>,
    initial_capacity: usize,
    increment: usize,
    capacity: usize,
    /// Ledger cost of one slot.
    slot: MemorySize,
    memory_type: MemoryType,
}

impl ValueContainer {
    /// Slot cost of a plain value sequence (arrays).
    pub const VALUE_SLOT: MemorySize = MemorySize {
        bytes: 0,
        integers: 0,
        pointers: 1,
        values: 1,
    };

    pub(crate) fn new(
        ledger: &mut Ledger,
        memory_type: MemoryType,
        slot: MemorySize,
        initial_capacity: usize,
        increment: usize,
    ) -> Result<Self> {
        let size = slot.times(initial_capacity);
        ledger.check_available(size)?;
        let mut items = Vec::new();
        if items.try_reserve_exact(initial_capacity).is_err() {
            return Err(Exception::new(
                ErrorKind::VmOverflow,
                format!("cannot reserve {} slots", initial_capacity),
            ));
        }
        ledger.allocate(size, memory_type)?;
        Ok(Self {
            items,
            initial_capacity,
            increment,
            capacity: initial_capacity,
            slot,
            memory_type,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of slots currently charged to the ledger.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn increment(&self) -> usize {
        self.increment
    }

    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    /// Items from bottom to top.
    #[inline]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Value `depth` positions below the top (0 is the top).
    #[inline]
    pub fn peek(&self, depth: usize) -> Option<&Value> {
        self.items
            .len()
            .checked_sub(depth + 1)
            .map(|index| &self.items[index])
    }

    /// Capacity needed to hold `len` items under the growth policy.
    fn capacity_for(&self, len: usize) -> Result<usize> {
        if len <= self.initial_capacity {
            return Ok(self.initial_capacity);
        }
        if self.increment == 0 {
            return Err(Exception::new(
                ErrorKind::LimitCheck,
                format!("fixed-size container is limited to {} items", self.initial_capacity),
            ));
        }
        let blocks = (len - self.initial_capacity).div_ceil(self.increment);
        Ok(self.initial_capacity + blocks * self.increment)
    }

    /// Atomically remove the top `pop_count` items and push `values` (bottom
    /// to top).
    ///
    /// The ledger is consulted before anything moves: on failure neither the
    /// items nor the reference counts change.
    pub fn popush(&mut self, memory: &mut Memory, pop_count: usize, values: &[Value]) -> Result<()> {
        if pop_count > self.items.len() {
            return Err(Exception::stack_underflow());
        }
        let new_len = self.items.len() - pop_count + values.len();
        let new_capacity = self.capacity_for(new_len)?;
        memory.retain_all(values)?;
        if new_capacity > self.capacity {
            let growth = self.slot.times(new_capacity - self.capacity);
            if let Err(error) = memory.ledger.allocate(growth, self.memory_type) {
                memory.release_all(values);
                return Err(error);
            }
        }
        let split = self.items.len() - pop_count;
        let popped: Vec<Value> = self.items.drain(split..).collect();
        self.items.extend_from_slice(values);
        if new_capacity < self.capacity {
            memory
                .ledger
                .release(self.slot.times(self.capacity - new_capacity), self.memory_type);
        }
        self.capacity = new_capacity;
        memory.release_all(&popped);
        Ok(())
    }

    pub fn push(&mut self, memory: &mut Memory, value: Value) -> Result<()> {
        self.popush(memory, 0, &[value])
    }

    /// Remove the top `count` items.
    pub fn pop(&mut self, memory: &mut Memory, count: usize) -> Result<()> {
        self.popush(memory, count, &[])
    }

    /// Replace the item at `index` (from the bottom).
    pub fn set(&mut self, memory: &mut Memory, index: usize, value: Value) -> Result<()> {
        if index >= self.items.len() {
            return Err(Exception::range_check(format!(
                "index {} out of bounds (length: {})",
                index,
                self.items.len()
            )));
        }
        memory.retain(&value)?;
        let previous = core::mem::replace(&mut self.items[index], value);
        memory.release(&previous);
        Ok(())
    }

    /// Append `count` copies of `value` without growing. On failure the
    /// copies already stored stay in the container.
    pub(crate) fn fill(&mut self, memory: &mut Memory, value: &Value, count: usize) -> Result<()> {
        let fits = self
            .items
            .len()
            .checked_add(count)
            .is_some_and(|len| len <= self.capacity);
        if !fits {
            return Err(Exception::new(
                ErrorKind::LimitCheck,
                format!("{} more items exceed a capacity of {}", count, self.capacity),
            ));
        }
        for _ in 0..count {
            memory.retain(value)?;
            self.items.push(value.clone());
        }
        Ok(())
    }

    pub fn clear(&mut self, memory: &mut Memory) {
        let len = self.items.len();
        // Shrinking never allocates.
        if let Err(error) = self.popush(memory, len, &[]) {
            panic!("clearing a container failed: {}", error);
        }
    }

    /// Release every item, then the slots themselves.
    pub(crate) fn dispose(mut self, memory: &mut Memory) {
        self.clear(memory);
        memory
            .ledger
            .release(self.slot.times(self.capacity), self.memory_type);
    }

    /// Give back the slots and hand the (still retained) items to the caller,
    /// which becomes responsible for releasing them.
    pub(crate) fn into_items(self, ledger: &mut Ledger) -> Vec<Value> {
        ledger.release(self.slot.times(self.capacity), self.memory_type);
        self.items
    }
}
