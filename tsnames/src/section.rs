//! Named sections of a names registry.
//!
//! A section groups the ranges of one identifier space (table ids, descriptor
//! tags, stream types...) with its bit width and an optional "superclass"
//! section which is searched when a value is not found locally.

use std::collections::HashMap;

use crate::extended::{lsb_mask, ExtendedIndex};
use crate::range::{Entry, RangeTable};

/// Maximum number of inheritance levels, guards against `inherit` cycles.
pub const MAX_INHERIT: usize = 16;

/// Normalized form of a section name, used as lookup key.
pub fn normalize_section_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Problem found while resolving a section after a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionIssue {
    /// The inheritance chain references a section which does not exist.
    MissingParent(String),
    /// No bit width found in the section or its ancestors.
    NoBits,
    /// `extended` flag disagrees with the values actually present.
    ExtendedMismatch { declared: bool, found: bool },
}

/// One section of a names registry.
#[derive(Debug, Clone, Default)]
pub struct Section {
    name: String,
    declared_bits: usize,
    bits: usize,
    mask: u64,
    declared_extended: bool,
    extended: bool,
    inherit: String,
    entries: RangeTable,
    short_entries: ExtendedIndex,
}

impl Section {
    /// Create an empty section. `name` is kept as written in the source.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), mask: u64::MAX, ..Self::default() }
    }

    /// Section name as written in its first header.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved bit width, 0 when unresolved.
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Bit width declared by a `bits` directive in this section, 0 if none.
    pub fn declared_bits(&self) -> usize {
        self.declared_bits
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// True when some values are wider than the bit width.
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn declared_extended(&self) -> bool {
        self.declared_extended
    }

    /// Name of the "superclass" section, empty if none.
    pub fn inherit(&self) -> &str {
        &self.inherit
    }

    pub fn entries(&self) -> &RangeTable {
        &self.entries
    }

    pub fn extended_index(&self) -> &ExtendedIndex {
        &self.short_entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut RangeTable {
        &mut self.entries
    }

    pub(crate) fn set_declared_bits(&mut self, bits: usize) {
        self.declared_bits = bits;
    }

    pub(crate) fn set_inherit(&mut self, inherit: impl Into<String>) {
        self.inherit = inherit.into();
    }

    pub(crate) fn set_declared_extended(&mut self, extended: bool) {
        self.declared_extended = extended;
    }

    /// Find the range containing a value in this section only.
    ///
    /// An unresolved section (no bit width) yields nothing.
    pub fn lookup(&self, value: u64) -> Option<&Entry> {
        if self.bits == 0 {
            return None;
        }
        self.entries.lookup(value)
    }

    /// All extended values sharing the short projection of `value`.
    ///
    /// Without extended index, only `value` itself is reported, if defined.
    pub fn extended_values_for(&self, value: u64) -> Vec<(u64, &Entry)> {
        if self.bits == 0 {
            return Vec::new();
        }
        if self.short_entries.is_empty() {
            self.entries.lookup(value).map(|e| (value, e)).into_iter().collect()
        } else {
            self.short_entries.values_for(&self.entries, value)
        }
    }
}

/// Find the bit width of a section, walking its inheritance chain.
fn resolve_bits(sections: &HashMap<String, Section>, key: &str) -> Result<usize, SectionIssue> {
    let Some(mut section) = sections.get(key) else {
        return Err(SectionIssue::NoBits);
    };
    for _ in 0..MAX_INHERIT {
        if section.declared_bits > 0 {
            return Ok(section.declared_bits);
        }
        if section.inherit.is_empty() {
            break;
        }
        match sections.get(&normalize_section_name(&section.inherit)) {
            Some(parent) => section = parent,
            None => return Err(SectionIssue::MissingParent(section.inherit.clone())),
        }
    }
    Err(SectionIssue::NoBits)
}

/// Resolve bit width, mask and extended values of every section.
///
/// Returns the issues found, per normalized section name. The extended value
/// index of each section is rebuilt from scratch.
pub(crate) fn resolve_sections(sections: &mut HashMap<String, Section>) -> Vec<(String, SectionIssue)> {
    let mut issues = Vec::new();

    let resolved: Vec<(String, Result<usize, SectionIssue>)> = sections
        .keys()
        .map(|key| (key.clone(), resolve_bits(sections, key)))
        .collect();

    for (key, bits) in resolved {
        let Some(section) = sections.get_mut(&key) else {
            continue;
        };
        match bits {
            Ok(bits) => {
                section.bits = bits;
                section.mask = lsb_mask(bits);
            }
            Err(issue) => {
                section.bits = 0;
                section.mask = u64::MAX;
                section.extended = false;
                section.short_entries = ExtendedIndex::default();
                issues.push((key, issue));
                continue;
            }
        }

        // Only check 'last', it is greater than 'first'.
        let mask = section.mask;
        section.extended = section.entries.iter().any(|e| e.last & !mask != 0);
        if section.extended != section.declared_extended {
            issues.push((
                key.clone(),
                SectionIssue::ExtendedMismatch { declared: section.declared_extended, found: section.extended },
            ));
        }

        section.short_entries = if section.extended {
            ExtendedIndex::build(&section.entries, section.bits)
        } else {
            ExtendedIndex::default()
        };
    }

    issues
}
