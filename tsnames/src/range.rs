//! Identifier range table.
//!
//! A section stores its definitions as non-overlapping closed ranges
//! `[first, last]`, each with one name. The table is keyed by `first`, so a
//! point lookup is a single ordered-map search.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::LineError;

/// One contiguous range of values sharing a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// First value of the range.
    pub first: u64,
    /// Last value of the range (inclusive).
    pub last: u64,
    /// Associated name.
    pub name: String,
}

impl Entry {
    /// Check if a value is inside the range.
    pub fn contains(&self, value: u64) -> bool {
        value >= self.first && value <= self.last
    }

    /// Iterate over every value of the range, without overflowing at `u64::MAX`.
    pub fn values(&self) -> impl Iterator<Item = u64> {
        self.first..=self.last
    }
}

/// Ordered set of non-overlapping ranges, indexed by first value.
#[derive(Debug, Clone, Default)]
pub struct RangeTable {
    entries: BTreeMap<u64, Entry>,
}

impl RangeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if a range is free, ie. no value is defined in `[first, last]`.
    pub fn free_range(&self, first: u64, last: u64) -> bool {
        // First entry which is "not less" than 'first'.
        let mut after = self.entries.range(first..);
        if let Some((&start, _)) = after.next() {
            if start <= last {
                // An existing range starts inside [first..last].
                return false;
            }
        }

        // The previous range may end inside [first..last].
        let mut before = self.entries.range(..first);
        if let Some((_, prev)) = before.next_back() {
            if prev.last >= first {
                return false;
            }
        }

        true
    }

    /// Insert a new range. The table is left untouched on error.
    pub fn insert(&mut self, first: u64, last: u64, name: impl Into<String>) -> Result<(), LineError> {
        if last < first {
            return Err(LineError::ReversedRange { first, last });
        }
        if !self.free_range(first, last) {
            return Err(LineError::Overlap { first, last });
        }
        self.entries.insert(first, Entry { first, last, name: name.into() });
        Ok(())
    }

    /// Find the range containing a value.
    pub fn lookup(&self, value: u64) -> Option<&Entry> {
        self.entries
            .range((Bound::Unbounded, Bound::Included(value)))
            .next_back()
            .map(|(_, entry)| entry)
            .filter(|entry| entry.contains(value))
    }

    /// Get the range starting exactly at `first`.
    pub fn get(&self, first: u64) -> Option<&Entry> {
        self.entries.get(&first)
    }

    /// All ranges, by increasing first value.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RangeTable {
        let mut table = RangeTable::new();
        table.insert(0x00, 0x0F, "Reserved").unwrap();
        table.insert(100, 100, "Some Name").unwrap();
        table.insert(200, 299, "Range Name").unwrap();
        table
    }

    #[test]
    fn test_lookup_inside_ranges() {
        let table = sample();
        for v in 0x00..=0x0F {
            assert_eq!(table.lookup(v).unwrap().name, "Reserved");
        }
        assert_eq!(table.lookup(100).unwrap().name, "Some Name");
        assert_eq!(table.lookup(200).unwrap().name, "Range Name");
        assert_eq!(table.lookup(250).unwrap().name, "Range Name");
        assert_eq!(table.lookup(299).unwrap().name, "Range Name");
    }

    #[test]
    fn test_lookup_in_gaps() {
        let table = sample();
        assert!(table.lookup(0x10).is_none());
        assert!(table.lookup(99).is_none());
        assert!(table.lookup(101).is_none());
        assert!(table.lookup(199).is_none());
        assert!(table.lookup(300).is_none());
        assert!(table.lookup(u64::MAX).is_none());
    }

    #[test]
    fn test_lookup_empty() {
        let table = RangeTable::new();
        assert!(table.lookup(0).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_overlap_rejected_without_mutation() {
        let mut table = sample();
        let before: Vec<Entry> = table.iter().cloned().collect();

        // Starts inside an existing range.
        assert!(matches!(table.insert(250, 400, "X"), Err(LineError::Overlap { .. })));
        // Ends inside an existing range.
        assert!(matches!(table.insert(150, 200, "X"), Err(LineError::Overlap { .. })));
        // Covers an existing range.
        assert!(matches!(table.insert(50, 150, "X"), Err(LineError::Overlap { .. })));
        // Inside an existing range.
        assert!(matches!(table.insert(210, 220, "X"), Err(LineError::Overlap { .. })));
        // Same single value.
        assert!(matches!(table.insert(100, 100, "X"), Err(LineError::Overlap { .. })));

        let after: Vec<Entry> = table.iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_adjacent_ranges_accepted() {
        let mut table = sample();
        assert!(table.insert(0x10, 99, "Before").is_ok());
        assert!(table.insert(101, 199, "Between").is_ok());
        assert!(table.insert(300, u64::MAX, "Top").is_ok());
        assert_eq!(table.len(), 6);
        assert_eq!(table.lookup(u64::MAX).unwrap().name, "Top");
    }

    #[test]
    fn test_reversed_range() {
        let mut table = RangeTable::new();
        assert_eq!(
            table.insert(10, 5, "X"),
            Err(LineError::ReversedRange { first: 10, last: 5 })
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_entry_values_at_top_of_range() {
        let entry = Entry { first: u64::MAX - 2, last: u64::MAX, name: "Top".into() };
        let values: Vec<u64> = entry.values().collect();
        assert_eq!(values, vec![u64::MAX - 2, u64::MAX - 1, u64::MAX]);
    }
}
