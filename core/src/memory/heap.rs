//! Reference-counted storage for shareable containers.
//!
//! Arrays and dictionaries live in slots addressed by [`HeapId`]. A slot
//! starts with a reference count of 1 (the creator's reference) and is freed
//! when the count drops to zero. Freed slots are recycled through a free list.

use crate::vm::{Dictionary, ValueContainer};
use core::fmt;

/// Handle to a heap slot. Only meaningful for the state that allocated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u32);

impl HeapId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) enum HeapObject {
    Array(ValueContainer),
    Dictionary(Dictionary),
}

#[derive(Debug)]
struct HeapEntry {
    refcount: usize,
    /// `None` while the object is checked out for mutation.
    object: Option<HeapObject>,
}

#[derive(Debug, Default)]
pub(crate) struct Heap {
    entries: Vec<Option<HeapEntry>>,
    free_list: Vec<HeapId>,
}

impl Heap {
    pub(crate) fn allocate(&mut self, object: HeapObject) -> HeapId {
        let entry = HeapEntry {
            refcount: 1,
            object: Some(object),
        };
        if let Some(id) = self.free_list.pop() {
            self.entries[id.index()] = Some(entry);
            id
        } else {
            let id = HeapId(
                u32::try_from(self.entries.len()).unwrap_or_else(|_| panic!("heap exhausted")),
            );
            self.entries.push(Some(entry));
            id
        }
    }

    fn entry(&self, id: HeapId) -> &HeapEntry {
        self.entries
            .get(id.index())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("dangling heap reference {}", id))
    }

    fn entry_mut(&mut self, id: HeapId) -> &mut HeapEntry {
        self.entries
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("dangling heap reference {}", id))
    }

    pub(crate) fn refcount(&self, id: HeapId) -> usize {
        self.entry(id).refcount
    }

    pub(crate) fn add_ref(&mut self, id: HeapId) {
        self.entry_mut(id).refcount += 1;
    }

    /// Drop one reference. Returns the object once the last one is gone.
    ///
    /// # Panics
    ///
    /// Panics when the slot is already free or the object is checked out:
    /// both mean a reference was released more often than it was taken.
    pub(crate) fn release(&mut self, id: HeapId) -> Option<HeapObject> {
        let entry = self.entry_mut(id);
        entry.refcount -= 1;
        if entry.refcount > 0 {
            return None;
        }
        let object = self.entries[id.index()]
            .take()
            .and_then(|entry| entry.object)
            .unwrap_or_else(|| panic!("releasing {} while it is checked out", id));
        self.free_list.push(id);
        Some(object)
    }

    pub(crate) fn get(&self, id: HeapId) -> &HeapObject {
        self.entry(id)
            .object
            .as_ref()
            .unwrap_or_else(|| panic!("{} is checked out", id))
    }

    /// Move the object out of its slot so it can be mutated alongside the
    /// rest of the memory. Must be followed by [`Heap::check_in`].
    pub(crate) fn check_out(&mut self, id: HeapId) -> HeapObject {
        self.entry_mut(id)
            .object
            .take()
            .unwrap_or_else(|| panic!("{} is already checked out", id))
    }

    pub(crate) fn check_in(&mut self, id: HeapId, object: HeapObject) {
        let entry = self.entry_mut(id);
        debug_assert!(entry.object.is_none(), "{} was not checked out", id);
        entry.object = Some(object);
    }

    /// Number of live slots.
    pub(crate) fn live(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Dictionary;
    use crate::memory::MemoryType;

    fn dictionary() -> HeapObject {
        HeapObject::Dictionary(Dictionary::new(MemoryType::User))
    }

    #[test]
    fn test_starts_with_one_reference() {
        let mut heap = Heap::default();
        let id = heap.allocate(dictionary());
        assert_eq!(heap.refcount(id), 1);
        assert_eq!(heap.live(), 1);
    }

    #[test]
    fn test_release_frees_at_zero_and_recycles() {
        let mut heap = Heap::default();
        let id = heap.allocate(dictionary());
        heap.add_ref(id);

        assert!(heap.release(id).is_none());
        assert!(heap.release(id).is_some());
        assert_eq!(heap.live(), 0);

        let reused = heap.allocate(dictionary());
        assert_eq!(reused, id);
    }

    #[test]
    #[should_panic(expected = "dangling heap reference")]
    fn test_release_past_zero_is_fatal() {
        let mut heap = Heap::default();
        let id = heap.allocate(dictionary());
        heap.release(id);
        heap.release(id);
    }
}
