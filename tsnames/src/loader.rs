//! Parser for `.names` configuration documents.
//!
//! ```text
//! # comment
//! [SectionName]
//! bits = 8
//! inherit = OtherSection
//! extended = true
//! 0x00-0x0F = Reserved
//! 100       = Some Name
//! 200-299   = Range Name
//! ```
//!
//! The parser merges the document into an existing set of sections. It never
//! stops on a bad line: every error is logged with the source name and line
//! number, counted, and the line is skipped. After [`MAX_ERRORS`] errors the
//! rest of the document is ignored.

use std::collections::{HashMap, HashSet};

use log::error;

use crate::error::LineError;
use crate::section::{normalize_section_name, Section};

/// Number of errors after which a document is abandoned.
pub const MAX_ERRORS: usize = 20;

/// Characters ignored inside integers ("thousands separators").
const IGNORED_CHARS: &[char] = &['.', ',', '_'];

/// A range which was added to a section, to be notified to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AddedRange {
    /// Normalized section name.
    pub key: String,
    /// Section name as written in the section header.
    pub section: String,
    pub first: u64,
    pub last: u64,
    pub name: String,
}

/// Result of parsing one document.
#[derive(Debug, Default)]
pub(crate) struct ParseOutcome {
    pub errors: usize,
    pub aborted: bool,
    /// Normalized names of all sections which appear in the document.
    pub touched: HashSet<String>,
    /// Added ranges, in line order.
    pub added: Vec<AddedRange>,
}

/// Per-document parser state.
struct Parser<'a> {
    sections: &'a mut HashMap<String, Section>,
    current: Option<String>,
    bits_seen: HashSet<String>,
    inherit_seen: HashSet<String>,
    outcome: ParseOutcome,
}

/// Parse a document and merge its content into `sections`.
///
/// `source` is only used in log messages.
pub(crate) fn parse_document(sections: &mut HashMap<String, Section>, source: &str, text: &str) -> ParseOutcome {
    let mut parser = Parser {
        sections,
        current: None,
        bits_seen: HashSet::new(),
        inherit_seen: HashSet::new(),
        outcome: ParseOutcome::default(),
    };

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if let Err(e) = parser.line(line) {
            error!("{}: invalid line {}: {} ({})", source, index + 1, line, e);
            parser.outcome.errors += 1;
            if parser.outcome.errors >= MAX_ERRORS {
                error!("{}: too many errors, giving up", source);
                parser.outcome.aborted = true;
                break;
            }
        }
    }

    parser.outcome
}

impl Parser<'_> {
    fn line(&mut self, line: &str) -> Result<(), LineError> {
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            return self.section_header(name);
        }

        let key = self.current.clone().ok_or(LineError::NoSection)?;
        self.definition(&key, line)
    }

    fn section_header(&mut self, name: &str) -> Result<(), LineError> {
        let name = name.trim();
        let key = normalize_section_name(name);
        if key.is_empty() {
            self.current = None;
            return Err(LineError::EmptySectionName);
        }
        self.sections.entry(key.clone()).or_insert_with(|| Section::new(name));
        self.outcome.touched.insert(key.clone());
        self.current = Some(key);
        Ok(())
    }

    fn definition(&mut self, key: &str, line: &str) -> Result<(), LineError> {
        let (range, value) = match line.split_once('=') {
            Some((range, value)) if !range.trim().is_empty() => (range.trim(), value.trim()),
            _ => return Err(LineError::MissingEqual),
        };

        let Some(section) = self.sections.get_mut(key) else {
            return Err(LineError::NoSection);
        };

        // Directives, not values.
        if range.eq_ignore_ascii_case("bits") {
            let bits = parse_integer(value)
                .filter(|b| (1..=64).contains(b))
                .ok_or_else(|| LineError::InvalidBits(value.to_string()))? as usize;
            let previous = section.declared_bits();
            if self.bits_seen.contains(key) || (previous != 0 && previous != bits) {
                return Err(LineError::DuplicateBits { previous, value: value.to_string() });
            }
            self.bits_seen.insert(key.to_string());
            section.set_declared_bits(bits);
            return Ok(());
        }
        if range.eq_ignore_ascii_case("inherit") {
            let previous = section.inherit();
            if self.inherit_seen.contains(key)
                || (!previous.is_empty() && normalize_section_name(previous) != normalize_section_name(value))
            {
                return Err(LineError::DuplicateInherit { previous: previous.to_string(), value: value.to_string() });
            }
            self.inherit_seen.insert(key.to_string());
            if section.inherit().is_empty() {
                section.set_inherit(value);
            }
            return Ok(());
        }
        if range.eq_ignore_ascii_case("extended") {
            let extended = parse_bool(value).ok_or_else(|| LineError::InvalidExtended(value.to_string()))?;
            section.set_declared_extended(extended);
            return Ok(());
        }

        let (first, last) = parse_range(range)?;
        if value.is_empty() {
            return Err(LineError::MissingName(range.to_string()));
        }
        section.entries_mut().insert(first, last, value)?;

        self.outcome.added.push(AddedRange {
            key: key.to_string(),
            section: section.name().to_string(),
            first,
            last,
            name: value.to_string(),
        });
        Ok(())
    }
}

/// Parse an unsigned integer, decimal or `0x` hexadecimal, ignoring `.,_`.
pub fn parse_integer(text: &str) -> Option<u64> {
    let cleaned: String = text.trim().chars().filter(|c| !IGNORED_CHARS.contains(c)).collect();
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok()
    } else {
        if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        cleaned.parse().ok()
    }
}

/// Parse `first[-last]`.
pub fn parse_range(text: &str) -> Result<(u64, u64), LineError> {
    let invalid = || LineError::InvalidRange(text.to_string());
    match text.split_once('-') {
        None => {
            let value = parse_integer(text).ok_or_else(invalid)?;
            Ok((value, value))
        }
        Some((first, last)) => {
            let first = parse_integer(first).ok_or_else(invalid)?;
            let last = parse_integer(last).ok_or_else(invalid)?;
            if last < first {
                return Err(LineError::ReversedRange { first, last });
            }
            Ok((first, last))
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
