//! Numeric identifier allocation within an inclusive range.

use std::collections::BTreeSet;

/// Free-space tracker for one numeric-id pool.
#[derive(Debug, Clone)]
pub struct IdSpace {
    start: u64,
    end: u64,
    allocated: BTreeSet<u64>,
}

impl IdSpace {
    /// Create a space over `start..=end`. Callers guarantee `start <= end`.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            allocated: BTreeSet::new(),
        }
    }

    pub fn bounds(&self) -> (u64, u64) {
        (self.start, self.end)
    }

    /// Reserve the lowest free identifier.
    pub fn allocate(&mut self) -> Option<u64> {
        let mut cursor = self.start;
        for &value in self.allocated.range(self.start..=self.end) {
            if value > cursor {
                break;
            }
            cursor = value.checked_add(1)?;
        }
        if cursor > self.end {
            return None;
        }
        self.allocated.insert(cursor);
        Some(cursor)
    }

    /// Reserve a specific identifier. Returns false if it is out of range or
    /// already taken.
    pub fn insert(&mut self, value: u64) -> bool {
        (self.start..=self.end).contains(&value) && self.allocated.insert(value)
    }

    pub fn remove(&mut self, value: u64) -> bool {
        self.allocated.remove(&value)
    }

    pub fn capacity(&self) -> u128 {
        u128::from(self.end - self.start) + 1
    }

    pub fn used(&self) -> u128 {
        self.allocated.len() as u128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_ascending() {
        let mut space = IdSpace::new(100, 200);
        assert_eq!(space.allocate(), Some(100));
        assert_eq!(space.allocate(), Some(101));
        assert_eq!(space.allocate(), Some(102));
    }

    #[test]
    fn fills_lowest_hole_first() {
        let mut space = IdSpace::new(1, 10);
        for _ in 0..5 {
            space.allocate();
        }
        assert!(space.remove(2));
        assert!(space.remove(4));
        assert_eq!(space.allocate(), Some(2));
        assert_eq!(space.allocate(), Some(4));
        assert_eq!(space.allocate(), Some(6));
    }

    #[test]
    fn exhaustion() {
        let mut space = IdSpace::new(7, 8);
        assert_eq!(space.allocate(), Some(7));
        assert_eq!(space.allocate(), Some(8));
        assert_eq!(space.allocate(), None);
    }

    #[test]
    fn full_u64_range_does_not_overflow() {
        let mut space = IdSpace::new(u64::MAX - 1, u64::MAX);
        assert_eq!(space.allocate(), Some(u64::MAX - 1));
        assert_eq!(space.allocate(), Some(u64::MAX));
        assert_eq!(space.allocate(), None);
        assert_eq!(space.capacity(), 2);
    }

    #[test]
    fn insert_respects_range_and_uniqueness() {
        let mut space = IdSpace::new(10, 20);
        assert!(space.insert(15));
        assert!(!space.insert(15));
        assert!(!space.insert(9));
        assert!(!space.insert(21));
        assert_eq!(space.allocate(), Some(10));
        assert_eq!(space.used(), 2);
    }
}
