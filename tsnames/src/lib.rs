//! Names registry for MPEG transport stream identifiers.
//!
//! This crate turns numeric identifiers (table ids, descriptor tags, stream
//! types, IEEE OUIs, device ids...) into human-readable names, using `.names`
//! configuration files.
//!
//! # File Format
//!
//! ```text
//! # comment
//! [TableId]
//! bits = 8
//! 0x00 = PAT
//! 0x01 = CAT
//! 0x80-0x8F = ECM
//!
//! [MyTableId]
//! inherit = TableId
//! extended = true
//! 0x0180 = Private ECM
//! ```
//!
//! Each `[section]` is a set of non-overlapping ranges. A section may
//! `inherit` from another one, which is searched when a value is not found.
//! Values wider than `bits` are "extended" values, all variants of a short
//! value can be enumerated.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tsnames::{NamesFile, NamesFlags, SearchPath};
//!
//! let names = NamesFile::new("example", Arc::new(SearchPath::default()), false);
//! let report = names.merge_str("example.names", "[TableId]\nbits = 8\n0x00 = PAT\n0x02 = PMT\n");
//! assert!(report.is_ok());
//!
//! assert_eq!(names.resolve_name("TableId", 0x02).as_deref(), Some("PMT"));
//! assert_eq!(names.name_from_section("TableId", 0x02, NamesFlags::NAME_VALUE, 0, 0), "PMT (0x02)");
//! assert_eq!(names.name_from_section("TableId", 0x42, NamesFlags::NAME, 0, 0), "unknown (0x42)");
//! ```
//!
//! # Catalog
//!
//! A [`NamesCatalog`] caches registries by source name, gives access to the
//! [`Predefined`] ones and merges extension sources into the registries which
//! accept them:
//!
//! - [`NamesCatalog::instance`]: registry of any source
//! - [`NamesCatalog::predefined`]: DTV, IP, OUI, Dektec, HiDes registries
//! - [`NamesCatalog::register_extension_file`]: add an extension at run time
//! - [`register_names_file!`]: add an extension at compile time

pub mod catalog;
pub mod config;
pub mod error;
pub mod extended;
pub mod format;
pub mod loader;
pub mod names_file;
pub mod range;
pub mod search;
pub mod section;
pub mod visitor;

#[doc(hidden)]
pub use inventory;

pub use catalog::{name_from_dtv, name_from_oui, NamesCatalog, Predefined};
pub use config::CatalogConfig;
pub use error::{ConfigError, LineError, LoadError};
pub use format::{format_name, NamesFlags};
pub use names_file::{MergeReport, NamesFile};
pub use range::{Entry, RangeTable};
pub use search::{SearchPath, SourceLocator};
pub use section::Section;
pub use visitor::NamesVisitor;
