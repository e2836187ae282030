use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_num::maybe_hex;
use tsnames::NamesFlags;

#[derive(Debug, Parser)]
#[clap(name = "tsnames")]
#[clap(about = "tsnames looks up MPEG-TS identifiers in .names registries.", long_about = None)]
#[clap(author = "maleicacid")]
#[clap(version)]
pub(crate) struct Cli {
    /// Configuration file.{n}
    /// Defaults to `tsnames.toml` in the current directory, if present.
    #[clap(short = 'f', long, global = true)]
    pub config: Option<PathBuf>,

    /// Additional directory where .names files are searched.
    #[clap(short = 'I', long = "search-path", value_name = "DIR", global = true)]
    pub search_paths: Vec<PathBuf>,

    /// Extension .names file merged into the registries.
    #[clap(short = 'e', long = "extension", value_name = "FILE", global = true)]
    pub extensions: Vec<String>,

    /// Enable debug logging.
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to daily files in this directory.
    #[clap(long, value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Output format for value listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Layout of a looked-up name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Layout {
    /// Name only
    Name,
    /// "name (value)"
    #[default]
    NameValue,
    /// "value (name)"
    ValueName,
    /// Name when known, value otherwise
    NameOrValue,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Look up the name of a value.{n}
    /// SOURCE is a file path, a name searched on the search path,
    /// or a predefined registry: @dtv, @ip, @oui, @dektec, @hides.
    Lookup {
        source: String,
        section: String,
        /// Value, decimal or 0x hexadecimal.
        #[clap(value_parser = maybe_hex::<u64>)]
        value: u64,
        /// Value to use when the first one has no name.
        #[clap(long, value_parser = maybe_hex::<u64>)]
        fallback: Option<u64>,
        #[clap(value_enum, long, default_value_t = Layout::NameValue)]
        layout: Layout,
        /// Display the value in decimal.
        #[clap(short, long)]
        decimal: bool,
        /// Display the value in hexadecimal (default unless --decimal).
        #[clap(short = 'x', long)]
        hexa: bool,
        /// Number of significant bits of the value, section width if 0.
        #[clap(short, long, default_value_t = 0)]
        bits: usize,
        /// Print nothing for unknown values.
        #[clap(long)]
        no_unknown: bool,
    },
    /// Find the value of a name.{n}
    /// A unique abbreviation of a name is accepted, integers are returned as is.
    Value {
        source: String,
        section: String,
        name: String,
        /// Match names case-sensitively.
        #[clap(short, long)]
        case_sensitive: bool,
        /// Do not accept abbreviated names.
        #[clap(long)]
        exact: bool,
    },
    /// Name the bits of a bit-mask value.
    Bitmask {
        source: String,
        section: String,
        #[clap(value_parser = maybe_hex::<u64>)]
        value: u64,
        #[clap(long, default_value = "|")]
        separator: String,
        /// Display unnamed bits in decimal.
        #[clap(short, long)]
        decimal: bool,
    },
    /// List all values of a section and its ancestors.
    List {
        source: String,
        section: String,
        /// Stop after this many values.
        #[clap(long)]
        limit: Option<usize>,
        #[clap(value_enum, short, long, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// List all extended values which share the short form of a value.
    Extended {
        source: String,
        section: String,
        #[clap(value_parser = maybe_hex::<u64>)]
        value: u64,
        #[clap(value_enum, short, long, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Load registries and report their errors.{n}
    /// The exit code is non-zero when any registry has errors.
    Check {
        #[clap(required = true)]
        sources: Vec<String>,
    },
    /// List the sections of a registry with their bit width.
    Sections { source: String },
}

/// Formatting flags for a lookup.
pub(crate) fn lookup_flags(layout: Layout, decimal: bool, hexa: bool, no_unknown: bool) -> NamesFlags {
    let mut flags = match layout {
        Layout::Name => NamesFlags::NAME,
        Layout::NameValue => NamesFlags::NAME_VALUE,
        Layout::ValueName => NamesFlags::VALUE_NAME,
        Layout::NameOrValue => NamesFlags::NAME_OR_VALUE,
    };
    if decimal {
        flags |= NamesFlags::DECIMAL;
    }
    if hexa {
        flags |= NamesFlags::HEXA;
    }
    if no_unknown {
        flags |= NamesFlags::NO_UNKNOWN;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lookup() {
        let cli = Cli::try_parse_from([
            "tsnames", "lookup", "@dtv", "TableId", "0x42", "--fallback", "66", "--layout", "value-name", "-d",
        ])
        .unwrap();
        match cli.command {
            Commands::Lookup { source, section, value, fallback, layout, decimal, hexa, bits, no_unknown } => {
                assert_eq!(source, "@dtv");
                assert_eq!(section, "TableId");
                assert_eq!(value, 0x42);
                assert_eq!(fallback, Some(66));
                assert_eq!(layout, Layout::ValueName);
                assert!(decimal);
                assert!(!hexa);
                assert_eq!(bits, 0);
                assert!(!no_unknown);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "tsnames", "sections", "local.names", "-I", "/a", "--search-path", "/b", "-e", "x.names", "-v",
        ])
        .unwrap();
        assert_eq!(cli.search_paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(cli.extensions, vec!["x.names"]);
        assert!(cli.verbose);
        assert!(cli.config.is_none());
        assert!(matches!(cli.command, Commands::Sections { .. }));
    }

    #[test]
    fn test_parse_list_and_check() {
        let cli = Cli::try_parse_from(["tsnames", "list", "@oui", "OUI", "--limit", "10", "-o", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List { limit: Some(10), output: OutputFormat::Json, .. }
        ));

        let cli = Cli::try_parse_from(["tsnames", "check", "a.names", "b.names"]).unwrap();
        assert!(matches!(cli.command, Commands::Check { ref sources } if sources.len() == 2));

        assert!(Cli::try_parse_from(["tsnames", "check"]).is_err());
        assert!(Cli::try_parse_from(["tsnames", "lookup", "@dtv", "TableId", "xyz"]).is_err());
    }

    #[test]
    fn test_parse_value_and_bitmask() {
        let cli = Cli::try_parse_from(["tsnames", "value", "@dtv", "TableId", "pm", "-c"]).unwrap();
        match cli.command {
            Commands::Value { name, case_sensitive, exact, .. } => {
                assert_eq!(name, "pm");
                assert!(case_sensitive);
                assert!(!exact);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["tsnames", "bitmask", "@dtv", "Flags", "0x81", "--separator", ", "]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Bitmask { value: 0x81, ref separator, decimal: false, .. } if separator == ", "
        ));
    }

    #[test]
    fn test_lookup_flags() {
        assert_eq!(lookup_flags(Layout::Name, false, false, false), NamesFlags::NAME);
        assert_eq!(
            lookup_flags(Layout::ValueName, true, true, false),
            NamesFlags::VALUE_NAME | NamesFlags::DECIMAL | NamesFlags::HEXA
        );
        assert_eq!(
            lookup_flags(Layout::NameValue, false, false, true),
            NamesFlags::NAME_VALUE | NamesFlags::NO_UNKNOWN
        );
    }
}
