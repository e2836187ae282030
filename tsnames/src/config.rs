//! Catalog configuration file.
//!
//! ```toml
//! [search]
//! paths = ["/usr/share/tsnames", "./names"]
//!
//! [extensions]
//! files = ["local.names"]
//!
//! [predefined]
//! dtv = "dtv.names"
//! oui = "/opt/ieee/oui.names"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable naming the configuration of the global catalog.
pub const CONFIG_ENV: &str = "TSNAMES_CONFIG";

/// Configuration of a [`NamesCatalog`](crate::NamesCatalog).
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct CatalogConfig {
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub extensions: ExtensionsSection,
    #[serde(default)]
    pub predefined: PredefinedSection,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct SearchSection {
    /// Directories searched after `TSNAMES_PATH`.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ExtensionsSection {
    /// Extension sources merged into registries which accept them.
    #[serde(default)]
    pub files: Vec<String>,
}

/// Source name overrides of the predefined registries.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct PredefinedSection {
    pub dtv: Option<String>,
    pub ip: Option<String>,
    pub oui: Option<String>,
    pub dektec: Option<String>,
    pub hides: Option<String>,
}

impl CatalogConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Toml { path: path.to_path_buf(), source })
    }

    /// Configuration named by [`CONFIG_ENV`], default one when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = CatalogConfig::from_toml("").unwrap();
        assert_eq!(config, CatalogConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config = CatalogConfig::from_toml(
            r#"
            [search]
            paths = ["/usr/share/tsnames", "names"]

            [extensions]
            files = ["a.names", "b.names"]

            [predefined]
            dtv = "my-dtv.names"
            hides = "/opt/hides.names"
            "#,
        )
        .unwrap();

        assert_eq!(config.search.paths, vec![PathBuf::from("/usr/share/tsnames"), PathBuf::from("names")]);
        assert_eq!(config.extensions.files, vec!["a.names", "b.names"]);
        assert_eq!(config.predefined.dtv.as_deref(), Some("my-dtv.names"));
        assert_eq!(config.predefined.hides.as_deref(), Some("/opt/hides.names"));
        assert!(config.predefined.oui.is_none());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(CatalogConfig::load(&missing), Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[search]\npaths = 3\n").unwrap();
        assert!(matches!(CatalogConfig::load(&bad), Err(ConfigError::Toml { .. })));

        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[extensions]\nfiles = [\"x.names\"]\n").unwrap();
        assert_eq!(CatalogConfig::load(&good).unwrap().extensions.files, vec!["x.names"]);
    }
}
