//! Index of extended values.
//!
//! Some sections contain values wider than their nominal bit width, for
//! instance a 8-bit stream type combined with a registration id in the upper
//! bits. The index maps the truncated ("short") value to every range whose
//! values project onto it, so that all full-width variants of one short code
//! can be enumerated.
//!
//! The index only stores the `first` key of each range; the [`RangeTable`]
//! remains the owner of the entries.

use std::collections::BTreeMap;

use crate::range::{Entry, RangeTable};

/// Mask keeping the `bits` low-order bits. `0` and `64` keep everything.
pub fn lsb_mask(bits: usize) -> u64 {
    if bits == 0 || bits >= 64 {
        u64::MAX
    } else {
        u64::MAX >> (64 - bits)
    }
}

/// Ranges with more values than this are not expanded in the index.
const MAX_INDEXED_SPAN: u64 = 0xFFFF;

/// Multimap from short value to the first value of the matching ranges.
#[derive(Debug, Clone, Default)]
pub struct ExtendedIndex {
    bits: usize,
    mask: u64,
    short_entries: BTreeMap<u64, Vec<u64>>,
    // Ranges which are checked for every short value.
    wide_entries: Vec<u64>,
}

impl ExtendedIndex {
    /// Build the index of a table with the given nominal bit width.
    ///
    /// `bits` must be lower than 64, otherwise no value can be extended and
    /// the index is empty.
    pub fn build(table: &RangeTable, bits: usize) -> Self {
        let mut index = Self {
            bits,
            mask: lsb_mask(bits),
            short_entries: BTreeMap::new(),
            wide_entries: Vec::new(),
        };
        if bits == 0 || bits >= 64 {
            return index;
        }

        for entry in table.iter() {
            let span = entry.last - entry.first;
            if span >= index.mask || span > MAX_INDEXED_SPAN {
                index.wide_entries.push(entry.first);
                continue;
            }
            // Short values of a narrow range are contiguous modulo 2^bits.
            let start = entry.first & index.mask;
            for offset in 0..=span {
                let short = (start + offset) & index.mask;
                index.short_entries.entry(short).or_default().push(entry.first);
            }
        }
        index
    }

    pub fn is_empty(&self) -> bool {
        self.short_entries.is_empty() && self.wide_entries.is_empty()
    }

    /// Number of (short value, range) records, wide ranges counting once.
    pub fn len(&self) -> usize {
        self.short_entries.values().map(Vec::len).sum::<usize>() + self.wide_entries.len()
    }

    /// Nominal bit width the index was built with.
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// All full-width values whose short projection equals `value & mask`,
    /// with the range they belong to, by increasing value.
    pub fn values_for<'a>(&self, table: &'a RangeTable, value: u64) -> Vec<(u64, &'a Entry)> {
        let mut result = Vec::new();
        if self.bits == 0 || self.bits >= 64 {
            return result;
        }

        let base = value & self.mask;
        let increment = 1u64 << self.bits;
        let max = u64::MAX - increment;

        let mut keys: Vec<u64> = self
            .short_entries
            .get(&base)
            .into_iter()
            .flatten()
            .chain(self.wide_entries.iter())
            .copied()
            .collect();
        keys.sort_unstable();
        keys.dedup();

        for entry in keys.into_iter().filter_map(|first| table.get(first)) {
            let mut full = (entry.first & !self.mask) | base;
            while full <= entry.last {
                if full >= entry.first {
                    result.push((full, entry));
                }
                if full > max {
                    break; // avoid integer overflow
                }
                full += increment;
            }
        }
        result
    }
}
