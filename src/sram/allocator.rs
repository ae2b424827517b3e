//! Two-ended bump allocator over one SRAM bank's worth of address space.
//! See spec.md §4.1.

use serde::{Deserialize, Serialize};

use crate::errors::{PassError, PassResult};

/// Which end of the address space an allocation should be biased towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationPreference {
    Start,
    End,
}

/// One live allocation. Kept around for `free` lookups and for ordering the
/// free-gap scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AllocationRecord {
    tag: String,
    offset: u32,
    size: u32,
}

/// Per-bank bump allocator. Allocations are requested with a preference for
/// which end of the space to grow from; successive same-preference
/// allocations with no intervening frees pack contiguously from that end,
/// matching a classic bump allocator. `free` removes a specific record,
/// which may leave a hole — the next allocation's gap scan will reuse it.
///
/// Cheaply cloneable by design: this is the state speculative strategy
/// attempts clone, try allocations against, and either adopt or discard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SramAllocator {
    capacity: u32,
    // Kept sorted by offset; invariant checked in debug builds.
    allocations: Vec<AllocationRecord>,
}

impl SramAllocator {
    /// Creates an allocator over `capacity` bytes of one SRAM bank.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            allocations: Vec::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Total bytes currently allocated, across both ends.
    pub fn bytes_in_use(&self) -> u32 {
        self.allocations.iter().map(|a| a.size).sum()
    }

    /// Attempts to allocate `size` bytes, biased towards `pref`. Returns
    /// `(true, offset)` on success or `(false, 0)` if no gap is large
    /// enough. `tag` identifies the owner for later `free` calls (e.g.
    /// "ple", "input", "weights", "outputs").
    pub fn allocate(&mut self, size: u32, pref: AllocationPreference, tag: &str) -> (bool, u32) {
        if size == 0 {
            return (true, 0);
        }
        match self.find_gap(size, pref) {
            Some(offset) => {
                let idx = self
                    .allocations
                    .binary_search_by_key(&offset, |a| a.offset)
                    .unwrap_err();
                self.allocations.insert(
                    idx,
                    AllocationRecord {
                        tag: tag.to_string(),
                        offset,
                        size,
                    },
                );
                (true, offset)
            }
            None => (false, 0),
        }
    }

    /// Releases the allocation at `offset` previously returned for `tag`.
    /// Fatal per spec.md §4.1: freeing an offset that is not currently
    /// allocated aborts compilation rather than silently no-op'ing.
    pub fn free(&mut self, tag: &str, offset: u32) -> PassResult<()> {
        let idx = self
            .allocations
            .iter()
            .position(|a| a.offset == offset && a.tag == tag);
        match idx {
            Some(idx) => {
                self.allocations.remove(idx);
                Ok(())
            }
            None => Err(PassError::IllegalConfig(format!(
                "free() of unknown SRAM allocation: tag={tag:?} offset={offset}"
            ))),
        }
    }

    /// Scans the gaps between (and around) current allocations for one of
    /// at least `size` bytes, searching from the low end for `Start` and
    /// from the high end for `End`.
    fn find_gap(&self, size: u32, pref: AllocationPreference) -> Option<u32> {
        // Boundaries: 0, each allocation's [offset, offset+size), capacity.
        let mut cursor = 0u32;
        let mut gaps: Vec<(u32, u32)> = Vec::with_capacity(self.allocations.len() + 1);
        for a in &self.allocations {
            if a.offset > cursor {
                gaps.push((cursor, a.offset));
            }
            cursor = cursor.max(a.offset + a.size);
        }
        if cursor < self.capacity {
            gaps.push((cursor, self.capacity));
        }

        match pref {
            AllocationPreference::Start => gaps
                .into_iter()
                .find(|(start, end)| end - start >= size)
                .map(|(start, _)| start),
            AllocationPreference::End => gaps
                .into_iter()
                .rev()
                .find(|(start, end)| end - start >= size)
                .map(|(_, end)| end - size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_start_allocations_grow_upward_from_zero() {
        let mut a = SramAllocator::new(1024);
        let (ok1, off1) = a.allocate(100, AllocationPreference::Start, "a");
        let (ok2, off2) = a.allocate(50, AllocationPreference::Start, "b");
        assert!(ok1 && ok2);
        assert_eq!(off1, 0);
        assert_eq!(off2, 100);
    }

    #[test]
    fn successive_end_allocations_grow_downward_from_top() {
        let mut a = SramAllocator::new(1024);
        let (ok1, off1) = a.allocate(100, AllocationPreference::End, "a");
        let (ok2, off2) = a.allocate(50, AllocationPreference::End, "b");
        assert!(ok1 && ok2);
        assert_eq!(off1, 924);
        assert_eq!(off2, 874);
    }

    #[test]
    fn allocation_fails_when_ends_would_overlap() {
        let mut a = SramAllocator::new(100);
        let (ok1, _) = a.allocate(60, AllocationPreference::Start, "a");
        assert!(ok1);
        let (ok2, _) = a.allocate(60, AllocationPreference::End, "b");
        assert!(!ok2);
    }

    #[test]
    fn free_of_unknown_offset_is_fatal() {
        let mut a = SramAllocator::new(100);
        let err = a.free("a", 0).unwrap_err();
        assert!(matches!(err, PassError::IllegalConfig(_)));
    }

    #[test]
    fn free_then_reallocate_reuses_the_hole() {
        let mut a = SramAllocator::new(100);
        let (_, off) = a.allocate(40, AllocationPreference::Start, "a");
        a.allocate(20, AllocationPreference::Start, "b");
        a.free("a", off).unwrap();
        let (ok, off2) = a.allocate(30, AllocationPreference::Start, "c");
        assert!(ok);
        assert_eq!(off2, 0);
    }

    #[test]
    fn freeing_every_allocation_restores_an_empty_allocator() {
        let empty = SramAllocator::new(256);
        let mut a = empty.clone();
        let (_, off_ple) = a.allocate(16, AllocationPreference::Start, "ple");
        let (_, off_in) = a.allocate(64, AllocationPreference::Start, "input");
        let (_, off_w) = a.allocate(32, AllocationPreference::End, "weights");
        a.free("weights", off_w).unwrap();
        a.free("input", off_in).unwrap();
        a.free("ple", off_ple).unwrap();
        assert_eq!(a, empty);
    }
}
