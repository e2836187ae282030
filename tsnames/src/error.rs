//! Error types for the names registry.
//!
//! Malformed `.names` content never surfaces as an `Err` from the query
//! surface. These types describe what went wrong on a given line or source so
//! that the loader can log and count it.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to decode one line of a `.names` source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    /// Definition line found before any `[section]` header.
    #[error("definition outside of any section")]
    NoSection,

    /// Section header with an empty name.
    #[error("empty section name")]
    EmptySectionName,

    /// Definition line without `=`, or with nothing before it.
    #[error("expected 'key = value'")]
    MissingEqual,

    /// Range definition with an empty name.
    #[error("missing name for range {0}")]
    MissingName(String),

    /// Range specification which is not `first[-last]`.
    #[error("invalid range '{0}'")]
    InvalidRange(String),

    /// Range whose last value is lower than its first value.
    #[error("invalid range 0x{first:X}-0x{last:X}, last is lower than first")]
    ReversedRange { first: u64, last: u64 },

    /// Range intersecting a range which is already defined in the section.
    #[error("range 0x{first:X}-0x{last:X} overlaps with an existing range")]
    Overlap { first: u64, last: u64 },

    /// `bits = N` with a value which is not in 1..=64.
    #[error("invalid bits value '{0}'")]
    InvalidBits(String),

    /// Second `bits` clause in the same section during one load.
    #[error("duplicated bits clauses {previous} and {value}")]
    DuplicateBits { previous: usize, value: String },

    /// Second `inherit` clause in the same section during one load.
    #[error("duplicated inherit clauses {previous} and {value}")]
    DuplicateInherit { previous: String, value: String },

    /// `extended = X` where X is not a boolean.
    #[error("invalid extended value '{0}'")]
    InvalidExtended(String),
}

/// Failure to open or read a whole source.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The locator could not find the source on the search path.
    #[error("configuration file '{0}' not found")]
    NotFound(String),

    /// The file exists but could not be read.
    #[error("error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to load the catalog configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration {path:?}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
