//! A names registry, built from one primary source and merged extensions.
//!
//! All section data sits behind one mutex. Public operations take the lock;
//! the `*_locked` helpers expect it to be held by the caller. Visitors and
//! subscribers are always called after the lock is released, so that they
//! can query the same registry.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::error::LoadError;
use crate::format::{format_name, hexa_digits, NamesFlags};
use crate::loader::{parse_document, parse_integer, AddedRange};
use crate::range::Entry;
use crate::section::{normalize_section_name, resolve_sections, Section, SectionIssue, MAX_INHERIT};
use crate::search::SourceLocator;
use crate::visitor::{NamesVisitor, Subscriptions};

/// Outcome of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Invalid lines and structural errors.
    pub errors: usize,
    /// Non-fatal diagnostics.
    pub warnings: usize,
    /// Number of ranges added.
    pub added: usize,
    /// The source was abandoned after too many errors.
    pub aborted: bool,
}

impl MergeReport {
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    fn failed() -> Self {
        Self { errors: 1, ..Self::default() }
    }
}

/// Result of a search by name along an inheritance chain.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NameMatch {
    Exact(u64),
    Abbreviated(u64),
    Ambiguous(Vec<String>),
    Unknown,
}

/// Section data of a registry, protected by the registry mutex.
#[derive(Debug, Default)]
pub(crate) struct NamesData {
    source_path: Option<PathBuf>,
    sections: HashMap<String, Section>,
    error_count: usize,
    warning_count: usize,
    loaded_sources: Vec<String>,
}

/// A names registry.
pub struct NamesFile {
    source_name: String,
    merge_extensions: bool,
    locator: Arc<dyn SourceLocator>,
    data: Mutex<NamesData>,
    subscriptions: Mutex<Subscriptions>,
}

impl fmt::Debug for NamesFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamesFile")
            .field("source_name", &self.source_name)
            .field("merge_extensions", &self.merge_extensions)
            .finish_non_exhaustive()
    }
}

type Pending = Vec<AddedRange>;

impl NamesFile {
    /// Create an empty registry. Nothing is loaded until a merge.
    pub fn new(source_name: impl Into<String>, locator: Arc<dyn SourceLocator>, merge_extensions: bool) -> Self {
        Self {
            source_name: source_name.into(),
            merge_extensions,
            locator,
            data: Mutex::new(NamesData::default()),
            subscriptions: Mutex::new(Subscriptions::default()),
        }
    }

    /// Create a registry and load its primary source through `locator`.
    ///
    /// A missing source is logged and counted as an error, the registry is
    /// then empty.
    pub fn open(source_name: impl Into<String>, locator: Arc<dyn SourceLocator>, merge_extensions: bool) -> Self {
        let file = Self::new(source_name, locator, merge_extensions);
        {
            let mut data = file.data.lock();
            file.load_locked(&mut data, &[]);
        }
        file
    }

    pub(crate) fn lock_data(&self) -> MutexGuard<'_, NamesData> {
        self.data.lock()
    }

    /// Load the primary source, then `extensions` when the registry accepts
    /// them. Returns the ranges to notify once the lock is released.
    pub(crate) fn load_locked(&self, data: &mut NamesData, extensions: &[String]) -> Pending {
        let mut pending = Pending::new();

        match self.locator.locate(&self.source_name) {
            Some(path) => {
                data.source_path = Some(path.clone());
                pending.extend(self.merge_file_locked(data, &path).1);
            }
            None => {
                error!("{}", LoadError::NotFound(self.source_name.clone()));
                data.error_count += 1;
            }
        }

        if self.merge_extensions {
            for name in extensions {
                pending.extend(self.merge_configuration_file_locked(data, name).1);
            }
        }
        pending
    }

    pub(crate) fn merge_configuration_file_locked(&self, data: &mut NamesData, name: &str) -> (MergeReport, Pending) {
        match self.locator.locate(name) {
            Some(path) => self.merge_file_locked(data, &path),
            None => {
                error!("{}", LoadError::NotFound(name.to_string()));
                data.error_count += 1;
                (MergeReport::failed(), Pending::new())
            }
        }
    }

    fn merge_file_locked(&self, data: &mut NamesData, path: &Path) -> (MergeReport, Pending) {
        match std::fs::read_to_string(path) {
            Ok(text) => self.merge_text_locked(data, &path.display().to_string(), &text),
            Err(source) => {
                error!("{}", LoadError::Io { path: path.to_path_buf(), source });
                data.error_count += 1;
                (MergeReport::failed(), Pending::new())
            }
        }
    }

    fn merge_text_locked(&self, data: &mut NamesData, source: &str, text: &str) -> (MergeReport, Pending) {
        debug!("loading names from {} into {}", source, self.source_name);

        let outcome = parse_document(&mut data.sections, source, text);
        let mut report = MergeReport {
            errors: outcome.errors,
            warnings: 0,
            added: outcome.added.len(),
            aborted: outcome.aborted,
        };

        // Resolution covers all sections, report only what this source touched.
        for (key, issue) in resolve_sections(&mut data.sections) {
            if !outcome.touched.contains(&key) {
                continue;
            }
            let name = data.sections.get(&key).map_or(key.as_str(), Section::name);
            match issue {
                SectionIssue::MissingParent(parent) => {
                    error!("{}: section [{}] inherits from unknown section [{}]", source, name, parent);
                    report.errors += 1;
                }
                SectionIssue::NoBits => {
                    error!("{}: no number of bits in section [{}]", source, name);
                    report.errors += 1;
                }
                SectionIssue::ExtendedMismatch { declared, found } => {
                    warn!(
                        "{}: section [{}] is declared with extended = {} but extended values are {}",
                        source,
                        name,
                        declared,
                        if found { "present" } else { "absent" }
                    );
                    report.warnings += 1;
                }
            }
        }

        data.error_count += report.errors;
        data.warning_count += report.warnings;
        data.loaded_sources.push(source.to_string());
        debug!(
            "{}: {} ranges added, {} errors, {} warnings",
            source, report.added, report.errors, report.warnings
        );

        (report, outcome.added)
    }

    /// Merge a file, given by path. Existing definitions are never replaced.
    pub fn merge_file(&self, path: impl AsRef<Path>) -> MergeReport {
        let (report, pending) = {
            let mut data = self.data.lock();
            self.merge_file_locked(&mut data, path.as_ref())
        };
        self.notify(pending);
        report
    }

    /// Merge a source found through the locator of this registry.
    pub fn merge_configuration_file(&self, name: &str) -> MergeReport {
        let (report, pending) = {
            let mut data = self.data.lock();
            self.merge_configuration_file_locked(&mut data, name)
        };
        self.notify(pending);
        report
    }

    /// Merge an in-memory document. `source` is used in log messages.
    pub fn merge_str(&self, source: &str, text: &str) -> MergeReport {
        let (report, pending) = {
            let mut data = self.data.lock();
            self.merge_text_locked(&mut data, source, text)
        };
        self.notify(pending);
        report
    }

    /// Call subscribers for every value of the added ranges, in order.
    pub(crate) fn notify(&self, pending: Pending) {
        if pending.is_empty() {
            return;
        }

        let mut targets: HashMap<String, Vec<Arc<dyn NamesVisitor>>> = HashMap::new();
        {
            let mut subscriptions = self.subscriptions.lock();
            if subscriptions.is_empty() {
                return;
            }
            for added in &pending {
                if !targets.contains_key(&added.key) {
                    targets.insert(added.key.clone(), subscriptions.targets(&added.key));
                }
            }
        }

        for added in &pending {
            let Some(visitors) = targets.get(&added.key).filter(|v| !v.is_empty()) else {
                continue;
            };
            for value in added.first..=added.last {
                for visitor in visitors {
                    visitor.handle_name_value(&added.section, value, &added.name);
                }
            }
        }
    }

    /// Find a value along the inheritance chain of a section.
    ///
    /// At most `MAX_INHERIT` sections are searched. Returns the last section
    /// which was searched and the name, if found.
    /// `None` when the section, or one of its ancestors, does not exist.
    fn find_locked<'a>(data: &'a NamesData, section: &str, value: u64) -> Option<(&'a Section, Option<&'a str>)> {
        let mut key = normalize_section_name(section);
        let mut levels = MAX_INHERIT;
        loop {
            let section = data.sections.get(&key)?;
            if let Some(entry) = section.lookup(value) {
                return Some((section, Some(entry.name.as_str())));
            }
            if section.inherit().is_empty() || levels <= 1 {
                return Some((section, None));
            }
            levels -= 1;
            key = normalize_section_name(section.inherit());
        }
    }

    /// The section and its existing ancestors, at most `MAX_INHERIT` of them.
    fn chain_locked<'a>(data: &'a NamesData, section: &str) -> Vec<&'a Section> {
        let mut chain = Vec::new();
        let mut key = normalize_section_name(section);
        while chain.len() < MAX_INHERIT {
            let Some(section) = data.sections.get(&key) else {
                break;
            };
            chain.push(section);
            if section.inherit().is_empty() {
                break;
            }
            key = normalize_section_name(section.inherit());
        }
        chain
    }

    /// Name of a value in a section or its ancestors.
    pub fn resolve_name(&self, section: &str, value: u64) -> Option<String> {
        let data = self.data.lock();
        Self::find_locked(&data, section, value).and_then(|(_, name)| name.map(str::to_string))
    }

    /// Name of `value1`, or of `value2` when `value1` has none.
    ///
    /// No fallback happens when the section does not exist.
    pub fn resolve_name_with_fallback(&self, section: &str, value1: u64, value2: u64) -> Option<String> {
        let data = self.data.lock();
        match Self::find_locked(&data, section, value1) {
            None => None,
            Some((_, Some(name))) => Some(name.to_string()),
            Some((_, None)) => Self::find_locked(&data, section, value2).and_then(|(_, name)| name.map(str::to_string)),
        }
    }

    pub fn name_exists(&self, section: &str, value: u64) -> bool {
        let data = self.data.lock();
        matches!(Self::find_locked(&data, section, value), Some((_, Some(_))))
    }

    /// Formatted name of a value. With `bits == 0`, the bit width of the
    /// section is used.
    pub fn name_from_section(
        &self,
        section: &str,
        value: u64,
        flags: NamesFlags,
        bits: usize,
        alternate: u64,
    ) -> String {
        let data = self.data.lock();
        match Self::find_locked(&data, section, value) {
            None => format_name(value, None, flags, bits, alternate),
            Some((found, name)) => {
                format_name(value, name, flags, if bits != 0 { bits } else { found.bits() }, alternate)
            }
        }
    }

    /// Formatted name of `value1`, or of `value2` when `value1` has none.
    pub fn name_from_section_with_fallback(
        &self,
        section: &str,
        value1: u64,
        value2: u64,
        flags: NamesFlags,
        bits: usize,
        alternate: u64,
    ) -> String {
        let data = self.data.lock();
        match Self::find_locked(&data, section, value1) {
            None => format_name(value1, None, flags, bits, alternate),
            Some((found, Some(name))) => {
                format_name(value1, Some(name), flags, if bits != 0 { bits } else { found.bits() }, alternate)
            }
            Some((_, None)) => match Self::find_locked(&data, section, value2) {
                None => format_name(value2, None, flags, bits, alternate),
                Some((found, name)) => {
                    format_name(value2, name, flags, if bits != 0 { bits } else { found.bits() }, alternate)
                }
            },
        }
    }

    fn match_name_locked(
        data: &NamesData,
        section: &str,
        name: &str,
        case_sensitive: bool,
        abbreviated: bool,
    ) -> NameMatch {
        if name.is_empty() {
            return NameMatch::Unknown;
        }
        let folded = |text: &str| if case_sensitive { text.to_string() } else { text.to_lowercase() };
        let wanted = folded(name);

        let mut candidates: Vec<&Entry> = Vec::new();
        for sec in Self::chain_locked(data, section).into_iter().filter(|s| s.bits() != 0) {
            for entry in sec.entries().iter() {
                let candidate = folded(&entry.name);
                if candidate == wanted {
                    return NameMatch::Exact(entry.first);
                }
                if abbreviated && candidate.starts_with(&wanted) {
                    candidates.push(entry);
                }
            }
        }

        match candidates.as_slice() {
            [] => NameMatch::Unknown,
            [entry] => NameMatch::Abbreviated(entry.first),
            _ => NameMatch::Ambiguous(candidates.iter().map(|e| e.name.clone()).collect()),
        }
    }

    /// Value of a name in a section or its ancestors.
    ///
    /// An exact match wins, otherwise a unique abbreviation when `abbreviated`
    /// is set. When no name matches, `name` is parsed as an integer (decimal
    /// or `0x` hexadecimal).
    pub fn value_from_name(&self, section: &str, name: &str, case_sensitive: bool, abbreviated: bool) -> Option<u64> {
        let data = self.data.lock();
        match Self::match_name_locked(&data, section, name, case_sensitive, abbreviated) {
            NameMatch::Exact(value) | NameMatch::Abbreviated(value) => Some(value),
            NameMatch::Ambiguous(_) | NameMatch::Unknown => parse_integer(name),
        }
    }

    /// Message explaining why a name has no value, `None` when it has one.
    pub fn name_error(&self, section: &str, name: &str, case_sensitive: bool, abbreviated: bool) -> Option<String> {
        let data = self.data.lock();
        let designator = data
            .sections
            .get(&normalize_section_name(section))
            .map_or(section, |s| s.name());
        match Self::match_name_locked(&data, section, name, case_sensitive, abbreviated) {
            NameMatch::Exact(_) | NameMatch::Abbreviated(_) => None,
            NameMatch::Unknown => Some(format!("unknown {} \"{}\"", designator, name)),
            NameMatch::Ambiguous(names) => Some(format!(
                "ambiguous {} \"{}\", could be one of {}",
                designator,
                name,
                names.join(", ")
            )),
        }
    }

    /// Names of the bits of a bit-mask value, joined with `separator`.
    ///
    /// Every entry of the section whose first value is fully contained in
    /// `value` is named. The remaining set bits are printed as numbers.
    pub fn bit_mask_names(&self, section: &str, value: u64, separator: &str, hexa: bool) -> String {
        let data = self.data.lock();
        let section = data.sections.get(&normalize_section_name(section)).filter(|s| s.bits() != 0);

        let mut names = Vec::new();
        let mut done = 0u64;
        if let Some(section) = section {
            if value == 0 {
                return section.lookup(0).map(|e| e.name.clone()).unwrap_or_default();
            }
            for entry in section.entries().iter() {
                if entry.first != 0 && value & entry.first == entry.first {
                    done |= entry.first;
                    names.push(entry.name.clone());
                }
            }
        }

        let digits = section.map_or(16, |s| hexa_digits(s.bits()));
        let mut rest = value & !done;
        while rest != 0 {
            let bit = rest & rest.wrapping_neg();
            rest &= !bit;
            names.push(if hexa { format!("0x{:0width$X}", bit, width = digits) } else { bit.to_string() });
        }
        names.join(separator)
    }

    /// Resolved bit width of a section, `None` if the section does not exist.
    pub fn section_bits(&self, section: &str) -> Option<usize> {
        self.data.lock().sections.get(&normalize_section_name(section)).map(Section::bits)
    }

    /// Names of all sections, as written in their headers, sorted.
    pub fn section_names(&self) -> Vec<String> {
        let data = self.data.lock();
        let mut names: Vec<String> = data.sections.values().map(|s| s.name().to_string()).collect();
        names.sort();
        names
    }

    /// Number of errors since the registry was created.
    pub fn error_count(&self) -> usize {
        self.data.lock().error_count
    }

    pub fn warning_count(&self) -> usize {
        self.data.lock().warning_count
    }

    /// Name of the primary source, as requested.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Path of the primary source, once found.
    pub fn source_path(&self) -> Option<PathBuf> {
        self.data.lock().source_path.clone()
    }

    /// Every source merged so far, primary first.
    pub fn loaded_sources(&self) -> Vec<String> {
        self.data.lock().loaded_sources.clone()
    }

    /// Whether extension sources are merged into this registry.
    pub fn merges_extensions(&self) -> bool {
        self.merge_extensions
    }

    /// Visit every value of a section and its ancestors.
    ///
    /// Returns the number of visited values, including the one for which the
    /// visitor returned `false`.
    pub fn visit_all_in_section(&self, visitor: &dyn NamesVisitor, section: &str) -> usize {
        let ranges: Vec<(String, Entry)> = {
            let data = self.data.lock();
            Self::chain_locked(&data, section)
                .into_iter()
                .filter(|s| s.bits() != 0)
                .flat_map(|s| s.entries().iter().map(move |e| (s.name().to_string(), e.clone())))
                .collect()
        };

        let mut count = 0;
        for (section, entry) in &ranges {
            for value in entry.values() {
                count += 1;
                if !visitor.handle_name_value(section, value, &entry.name) {
                    return count;
                }
            }
        }
        count
    }

    /// Visit every extended value of a section and its ancestors sharing the
    /// short projection of `value`. In a section without extended values,
    /// only `value` itself is visited, if defined.
    pub fn visit_extended_values_for(&self, visitor: &dyn NamesVisitor, section: &str, value: u64) -> usize {
        let values: Vec<(String, u64, String)> = {
            let data = self.data.lock();
            Self::chain_locked(&data, section)
                .into_iter()
                .flat_map(|s| {
                    s.extended_values_for(value)
                        .into_iter()
                        .map(move |(v, e)| (s.name().to_string(), v, e.name.clone()))
                })
                .collect()
        };

        let mut count = 0;
        for (section, value, name) in &values {
            count += 1;
            if !visitor.handle_name_value(section, *value, name) {
                break;
            }
        }
        count
    }

    /// Be notified of every value added by future merges in a section, or in
    /// all sections when `section` is empty.
    ///
    /// Only a weak reference is kept, dropping the visitor unsubscribes it.
    pub fn subscribe(&self, visitor: &Arc<dyn NamesVisitor>, section: &str) {
        self.subscriptions.lock().subscribe(visitor, &normalize_section_name(section));
    }

    /// Cancel a subscription. An empty `section` cancels all of them.
    pub fn unsubscribe(&self, visitor: &Arc<dyn NamesVisitor>, section: &str) {
        self.subscriptions.lock().unsubscribe(visitor, &normalize_section_name(section));
    }
}
