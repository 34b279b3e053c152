//! Bounded allocation accounting.
//!
//! The ledger never owns memory itself: every container asks it before
//! committing a size change and tells it when space is given back. Checks and
//! commits are separate so that callers can validate a whole operation before
//! mutating anything.

use super::HeapId;
use crate::errors::{Exception, Result};
use hashbrown::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Abstract size of an allocation, combined into a single cost by fixed
/// per-unit weights.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemorySize {
    pub bytes: usize,
    pub integers: usize,
    pub pointers: usize,
    pub values: usize,
}

impl MemorySize {
    pub const INTEGER_WEIGHT: usize = 8;
    pub const POINTER_WEIGHT: usize = 8;
    pub const VALUE_WEIGHT: usize = 16;

    pub const fn bytes(bytes: usize) -> Self {
        Self {
            bytes,
            integers: 0,
            pointers: 0,
            values: 0,
        }
    }

    /// Cost of `count` copies of this size. Saturates instead of wrapping,
    /// so an absurd count is rejected by the ledger.
    pub const fn times(self, count: usize) -> Self {
        Self {
            bytes: self.bytes.saturating_mul(count),
            integers: self.integers.saturating_mul(count),
            pointers: self.pointers.saturating_mul(count),
            values: self.values.saturating_mul(count),
        }
    }

    pub const fn plus(self, other: MemorySize) -> Self {
        Self {
            bytes: self.bytes.saturating_add(other.bytes),
            integers: self.integers.saturating_add(other.integers),
            pointers: self.pointers.saturating_add(other.pointers),
            values: self.values.saturating_add(other.values),
        }
    }

    /// Single weighted cost used by the ledger.
    pub const fn cost(&self) -> usize {
        self.bytes
            .saturating_add(self.integers.saturating_mul(Self::INTEGER_WEIGHT))
            .saturating_add(self.pointers.saturating_mul(Self::POINTER_WEIGHT))
            .saturating_add(self.values.saturating_mul(Self::VALUE_WEIGHT))
    }
}

/// Accounting category of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryType {
    /// Engine structures: stacks, permanent dictionaries, frame locals.
    System,
    /// Containers created by hosted code.
    User,
    /// Interned string contents.
    String,
}

impl MemoryType {
    const fn index(self) -> usize {
        match self {
            MemoryType::System => 0,
            MemoryType::User => 1,
            MemoryType::String => 2,
        }
    }
}

/// Where a heap container was allocated, recorded in debug mode only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationTrail {
    pub id: HeapId,
    pub memory_type: MemoryType,
    /// Call trail at allocation time, innermost frame first.
    pub trail: Vec<String>,
}

/// Read-only copy of the ledger counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub used: usize,
    pub peak: usize,
    pub total: Option<usize>,
    pub system: usize,
    pub user: usize,
    pub string: usize,
    /// Live containers, sorted by id. Empty unless debug mode is enabled.
    pub trails: Vec<AllocationTrail>,
}

impl MemorySnapshot {
    pub fn by_type(&self, memory_type: MemoryType) -> usize {
        match memory_type {
            MemoryType::System => self.system,
            MemoryType::User => self.user,
            MemoryType::String => self.string,
        }
    }
}

#[derive(Debug)]
pub struct Ledger {
    total: Option<usize>,
    used: usize,
    peak: usize,
    by_type: [usize; 3],
    /// Interned string contents and their reference counts.
    strings: HashMap<Arc<str>, usize>,
    trails: Option<HashMap<HeapId, AllocationTrail>>,
}

impl Ledger {
    pub fn new(total: Option<usize>, debug: bool) -> Self {
        Self {
            total,
            used: 0,
            peak: 0,
            by_type: [0; 3],
            strings: HashMap::new(),
            trails: debug.then(HashMap::new),
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn total(&self) -> Option<usize> {
        self.total
    }

    /// Remaining budget, `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.total.map(|total| total - self.used)
    }

    pub fn by_type(&self, memory_type: MemoryType) -> usize {
        self.by_type[memory_type.index()]
    }

    pub fn is_debug(&self) -> bool {
        self.trails.is_some()
    }

    /// Pure check: would `size` fit in the remaining budget?
    pub fn check_available(&self, size: MemorySize) -> Result<()> {
        let cost = size.cost();
        let available = self
            .available()
            .unwrap_or_else(|| usize::MAX - self.used);
        if cost > available || cost == usize::MAX {
            debug!(cost, available, "allocation rejected");
            return Err(Exception::vm_overflow(cost, available));
        }
        Ok(())
    }

    /// Commit an allocation. Nothing is recorded when the check fails.
    pub fn allocate(&mut self, size: MemorySize, memory_type: MemoryType) -> Result<()> {
        self.check_available(size)?;
        let cost = size.cost();
        self.used += cost;
        self.by_type[memory_type.index()] += cost;
        self.peak = self.peak.max(self.used);
        Ok(())
    }

    /// Give back a previous allocation.
    ///
    /// # Panics
    ///
    /// Panics if more is released than was allocated: this can only be an
    /// engine defect.
    pub fn release(&mut self, size: MemorySize, memory_type: MemoryType) {
        let cost = size.cost();
        let slot = &mut self.by_type[memory_type.index()];
        assert!(
            cost <= *slot && cost <= self.used,
            "ledger underflow: releasing {} units of {:?} with {} in use",
            cost,
            memory_type,
            *slot
        );
        *slot -= cost;
        self.used -= cost;
    }

    fn string_size(text: &str) -> MemorySize {
        MemorySize {
            bytes: text.len(),
            integers: 1,
            ..MemorySize::default()
        }
    }

    /// Reference a string content. Only the first reference is charged.
    pub fn add_string_ref(&mut self, text: &Arc<str>) -> Result<()> {
        if let Some(count) = self.strings.get_mut(text) {
            *count += 1;
            return Ok(());
        }
        self.allocate(Self::string_size(text), MemoryType::String)?;
        self.strings.insert(Arc::clone(text), 1);
        Ok(())
    }

    /// Drop a string reference, freeing the content with the last one.
    ///
    /// # Panics
    ///
    /// Panics if the string is not referenced.
    pub fn release_string(&mut self, text: &str) {
        let count = self
            .strings
            .get_mut(text)
            .unwrap_or_else(|| panic!("releasing unreferenced string {:?}", text));
        *count -= 1;
        if *count == 0 {
            self.strings.remove(text);
            self.release(Self::string_size(text), MemoryType::String);
        }
    }

    /// Number of live references to a string content.
    pub fn string_refs(&self, text: &str) -> usize {
        self.strings.get(text).copied().unwrap_or(0)
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub(crate) fn record_trail(&mut self, id: HeapId, memory_type: MemoryType, trail: Vec<String>) {
        if let Some(trails) = &mut self.trails {
            trails.insert(
                id,
                AllocationTrail {
                    id,
                    memory_type,
                    trail,
                },
            );
        }
    }

    pub(crate) fn forget_trail(&mut self, id: HeapId) {
        if let Some(trails) = &mut self.trails {
            trails.remove(&id);
        }
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        let mut trails: Vec<AllocationTrail> = self
            .trails
            .iter()
            .flat_map(|trails| trails.values().cloned())
            .collect();
        trails.sort_by_key(|trail| trail.id);
        MemorySnapshot {
            used: self.used,
            peak: self.peak,
            total: self.total,
            system: self.by_type(MemoryType::System),
            user: self.by_type(MemoryType::User),
            string: self.by_type(MemoryType::String),
            trails,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_allocate_and_release() {
        let mut ledger = Ledger::new(None, false);
        let size = MemorySize {
            values: 2,
            ..MemorySize::default()
        };

        ledger.allocate(size, MemoryType::User).unwrap();
        assert_eq!(ledger.used(), 2 * MemorySize::VALUE_WEIGHT);
        assert_eq!(ledger.by_type(MemoryType::User), ledger.used());

        ledger.release(size, MemoryType::User);
        assert_eq!(ledger.used(), 0);
        assert_eq!(ledger.peak(), 2 * MemorySize::VALUE_WEIGHT);
    }

    #[test]
    fn test_rejected_allocation_changes_nothing() {
        let mut ledger = Ledger::new(Some(10), false);
        ledger.allocate(MemorySize::bytes(6), MemoryType::System).unwrap();

        let error = ledger
            .allocate(MemorySize::bytes(5), MemoryType::System)
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::VmOverflow);
        assert_eq!(ledger.used(), 6);
        assert_eq!(ledger.peak(), 6);

        assert!(ledger.check_available(MemorySize::bytes(4)).is_ok());
    }

    #[test]
    fn test_oversized_requests_saturate_and_are_rejected() {
        let size = MemorySize {
            values: 1,
            ..MemorySize::default()
        }
        .times(usize::MAX / 4);
        assert_eq!(size.cost(), usize::MAX);

        let mut ledger = Ledger::new(None, false);
        let error = ledger.allocate(size, MemoryType::User).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::VmOverflow);
        assert_eq!(ledger.used(), 0);
    }

    #[test]
    fn test_strings_are_charged_once() {
        let mut ledger = Ledger::new(None, false);
        let text: Arc<str> = Arc::from("hello");

        ledger.add_string_ref(&text).unwrap();
        let charged = ledger.used();
        assert_eq!(charged, 5 + MemorySize::INTEGER_WEIGHT);

        ledger.add_string_ref(&Arc::from("hello")).unwrap();
        assert_eq!(ledger.used(), charged);
        assert_eq!(ledger.string_refs("hello"), 2);

        ledger.release_string("hello");
        assert_eq!(ledger.used(), charged);
        ledger.release_string("hello");
        assert_eq!(ledger.used(), 0);
        assert_eq!(ledger.string_count(), 0);
    }

    #[test]
    #[should_panic(expected = "ledger underflow")]
    fn test_release_past_zero_is_fatal() {
        let mut ledger = Ledger::new(None, false);
        ledger.release(MemorySize::bytes(1), MemoryType::User);
    }
}
