//! tsnames: look up MPEG-TS identifiers in `.names` registries.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error};
use tsnames::{CatalogConfig, ConfigError, NamesCatalog};

mod commands;
mod context;
mod logging;

use commands::Status;
use context::Cli;

/// Configuration file used when `--config` is not given, if present.
const DEFAULT_CONFIG: &str = "tsnames.toml";

/// Configuration file format: the catalog configuration plus logging.
#[derive(Debug, serde::Deserialize, Default)]
struct ConfigFile {
    #[serde(flatten)]
    catalog: CatalogConfig,
    #[serde(default)]
    logging: LoggingSection,
}

#[derive(Debug, serde::Deserialize, Default)]
struct LoggingSection {
    log_dir: Option<String>,
    retention_days: Option<u64>,
    level: Option<String>,
}

fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Toml { path: path.to_path_buf(), source })
}

/// Merge command line options into the file configuration.
/// Command line values come after the configured ones.
fn apply_args(config: &mut CatalogConfig, cli: &Cli) {
    config.search.paths.extend(cli.search_paths.iter().cloned());
    for name in &cli.extensions {
        if !config.extensions.files.contains(name) {
            config.extensions.files.push(name.clone());
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load config file: explicit path > auto-detect > default
    let config_path = cli.config.clone().or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG);
        default_path.exists().then_some(default_path)
    });
    let mut file_config = match &config_path {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ConfigFile::default(),
    };

    // Command line takes precedence
    let log_dir = cli.log_dir.clone().or_else(|| file_config.logging.log_dir.as_ref().map(PathBuf::from));
    let retention_days = file_config.logging.retention_days.unwrap_or(7);
    let _guard = match logging::init_logging(
        log_dir.as_deref(),
        retention_days,
        cli.verbose,
        file_config.logging.level.as_deref(),
    ) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = &config_path {
        debug!("Loaded config from: {}", path.display());
    }

    apply_args(&mut file_config.catalog, &cli);
    let catalog = NamesCatalog::from_config(&file_config.catalog);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let status = commands::run(&catalog, cli.command, &mut out).and_then(|status| out.flush().map(|_| status));

    match status {
        Ok(Status::Success) => ExitCode::SUCCESS,
        Ok(Status::Failure) => ExitCode::FAILURE,
        Err(e) => {
            error!("output error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_logging() {
        let config: ConfigFile = toml::from_str(
            r#"
            [search]
            paths = ["/usr/share/tsnames"]

            [extensions]
            files = ["local.names"]

            [logging]
            log_dir = "logs"
            level = "info"
            "#,
        )
        .unwrap();
        assert_eq!(config.catalog.search.paths, vec![PathBuf::from("/usr/share/tsnames")]);
        assert_eq!(config.catalog.extensions.files, vec!["local.names"]);
        assert_eq!(config.logging.log_dir.as_deref(), Some("logs"));
        assert_eq!(config.logging.level.as_deref(), Some("info"));
        assert!(config.logging.retention_days.is_none());
    }

    #[test]
    fn test_load_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_config(&dir.path().join("none.toml")), Err(ConfigError::Io { .. })));

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[logging]\nretention_days = \"soon\"\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn test_apply_args() {
        let cli = Cli::try_parse_from(["tsnames", "-I", "/extra", "-e", "a.names", "-e", "b.names", "sections", "@dtv"])
            .unwrap();
        let text = "[search]\npaths = [\"/conf\"]\n[extensions]\nfiles = [\"a.names\"]\n";
        let mut config = CatalogConfig::from_toml(text).unwrap();
        apply_args(&mut config, &cli);
        assert_eq!(config.search.paths, vec![PathBuf::from("/conf"), PathBuf::from("/extra")]);
        assert_eq!(config.extensions.files, vec!["a.names", "b.names"]);
    }
}
