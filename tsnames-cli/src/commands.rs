//! Subcommand handlers.

use std::io::{self, Write};
use std::sync::Arc;

use log::{debug, error, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tsnames::format::hexa_digits;
use tsnames::{NamesCatalog, NamesFile, NamesVisitor, Predefined};

use crate::context::{lookup_flags, Commands, OutputFormat};

/// Status of a command, turned into the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Success,
    Failure,
}

/// One value of a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ValueRow {
    pub section: String,
    pub value: u64,
    pub name: String,
}

/// Find the registry of a command line source.
pub(crate) fn open_source(catalog: &NamesCatalog, source: &str) -> Option<Arc<NamesFile>> {
    match source.strip_prefix('@') {
        Some(name) => match Predefined::from_name(name) {
            Some(which) => Some(catalog.predefined(which)),
            None => {
                warn!("unknown predefined registry @{}", name);
                None
            }
        },
        None => Some(catalog.instance(source, true)),
    }
}

pub(crate) fn run(catalog: &NamesCatalog, command: Commands, out: &mut dyn Write) -> io::Result<Status> {
    match command {
        Commands::Lookup { source, section, value, fallback, layout, decimal, hexa, bits, no_unknown } => {
            let Some(file) = open_source(catalog, &source) else {
                return Ok(Status::Failure);
            };
            let flags = lookup_flags(layout, decimal, hexa, no_unknown);
            let text = match fallback {
                Some(value2) => file.name_from_section_with_fallback(&section, value, value2, flags, bits, 0),
                None => file.name_from_section(&section, value, flags, bits, 0),
            };
            writeln!(out, "{}", text)?;
            Ok(Status::Success)
        }
        Commands::Value { source, section, name, case_sensitive, exact } => {
            let Some(file) = open_source(catalog, &source) else {
                return Ok(Status::Failure);
            };
            match file.value_from_name(&section, &name, case_sensitive, !exact) {
                Some(value) => {
                    let width = hexa_digits(file.section_bits(&section).unwrap_or(0)).max(1);
                    writeln!(out, "0x{:0width$X} ({})", value, value, width = width)?;
                    Ok(Status::Success)
                }
                None => {
                    let message = file.name_error(&section, &name, case_sensitive, !exact);
                    error!("{}", message.unwrap_or_else(|| format!("no value for \"{}\"", name)));
                    Ok(Status::Failure)
                }
            }
        }
        Commands::Bitmask { source, section, value, separator, decimal } => {
            let Some(file) = open_source(catalog, &source) else {
                return Ok(Status::Failure);
            };
            writeln!(out, "{}", file.bit_mask_names(&section, value, &separator, !decimal))?;
            Ok(Status::Success)
        }
        Commands::List { source, section, limit, output } => {
            let Some(file) = open_source(catalog, &source) else {
                return Ok(Status::Failure);
            };
            let rows = collect_rows(limit, |visitor| file.visit_all_in_section(visitor, &section));
            print_rows(out, &rows, file.section_bits(&section).unwrap_or(0), output)?;
            Ok(Status::Success)
        }
        Commands::Extended { source, section, value, output } => {
            let Some(file) = open_source(catalog, &source) else {
                return Ok(Status::Failure);
            };
            let rows = collect_rows(None, |visitor| file.visit_extended_values_for(visitor, &section, value));
            print_rows(out, &rows, file.section_bits(&section).unwrap_or(0), output)?;
            Ok(Status::Success)
        }
        Commands::Check { sources } => {
            let mut status = Status::Success;
            for source in &sources {
                let Some(file) = open_source(catalog, source) else {
                    status = Status::Failure;
                    continue;
                };
                writeln!(
                    out,
                    "{}: {} sections, {} errors, {} warnings",
                    source,
                    file.section_names().len(),
                    file.error_count(),
                    file.warning_count()
                )?;
                if file.error_count() > 0 {
                    status = Status::Failure;
                }
            }
            Ok(status)
        }
        Commands::Sections { source } => {
            let Some(file) = open_source(catalog, &source) else {
                return Ok(Status::Failure);
            };
            for name in file.section_names() {
                match file.section_bits(&name) {
                    Some(bits) if bits > 0 => writeln!(out, "{} ({} bits)", name, bits)?,
                    _ => writeln!(out, "{} (unresolved)", name)?,
                }
            }
            Ok(Status::Success)
        }
    }
}

/// Run a visit and collect the visited values, up to `limit`.
fn collect_rows(limit: Option<usize>, visit: impl FnOnce(&dyn NamesVisitor) -> usize) -> Vec<ValueRow> {
    let rows = Mutex::new(Vec::new());
    let visitor = |section: &str, value: u64, name: &str| {
        let mut rows = rows.lock();
        rows.push(ValueRow { section: section.to_string(), value, name: name.to_string() });
        limit.map_or(true, |limit| rows.len() < limit)
    };
    let count = visit(&visitor);
    debug!("{} values visited", count);
    rows.into_inner()
}

fn print_rows(out: &mut dyn Write, rows: &[ValueRow], bits: usize, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                writeln!(out, "No value found.")?;
                return Ok(());
            }
            let width = hexa_digits(bits).max(1);
            for row in rows {
                writeln!(out, "0x{:0width$X}  {:<20} {}", row.value, row.section, row.name, width = width)?;
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(rows).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            writeln!(out, "{}", json)?;
        }
        OutputFormat::Csv => {
            writeln!(out, "section,value,name")?;
            for row in rows {
                writeln!(out, "{},{},{}", csv_field(&row.section), row.value, csv_field(&row.name))?;
            }
        }
    }
    Ok(())
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
