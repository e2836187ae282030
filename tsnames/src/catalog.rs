//! Catalog of names registries.
//!
//! The catalog creates registries on demand, caches them by source name and
//! keeps the list of extension sources which are merged into the registries
//! that accept them. Extensions registered after a registry was loaded are
//! merged into it in place.
//!
//! Applications normally use one [`NamesCatalog`] shared as an `Arc`. A
//! process-wide instance is available through [`NamesCatalog::global`]. It is
//! created on first access, from the file named by `TSNAMES_CONFIG` when set,
//! and lives until the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::CatalogConfig;
use crate::format::NamesFlags;
use crate::names_file::NamesFile;
use crate::search::{SearchPath, SourceLocator};

const PREDEFINED_COUNT: usize = 5;

/// Well-known registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predefined {
    /// Digital TV identifiers (tables, descriptors, stream types...).
    Dtv,
    /// Internet protocols.
    Ip,
    /// IEEE Organizationally Unique Identifiers.
    Oui,
    /// Dektec devices.
    Dektec,
    /// HiDes devices.
    Hides,
}

impl Predefined {
    pub const ALL: [Predefined; PREDEFINED_COUNT] = [Self::Dtv, Self::Ip, Self::Oui, Self::Dektec, Self::Hides];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short name, as used on command lines.
    pub fn name(self) -> &'static str {
        match self {
            Self::Dtv => "dtv",
            Self::Ip => "ip",
            Self::Oui => "oui",
            Self::Dektec => "dektec",
            Self::Hides => "hides",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Source name used when the configuration does not override it.
    pub fn default_source(self) -> &'static str {
        match self {
            Self::Dtv => "dtv.names",
            Self::Ip => "ip.names",
            Self::Oui => "oui.names",
            Self::Dektec => "dektec.names",
            Self::Hides => "hides.names",
        }
    }

    /// Only the DTV registry receives extensions.
    pub fn merges_extensions(self) -> bool {
        matches!(self, Self::Dtv)
    }
}

/// Static registration of an extension source, see [`register_names_file!`].
pub struct NamesFileReg(pub &'static str);
inventory::collect!(NamesFileReg);

/// Register an extension source at compile time.
///
/// The file is merged into the registries of the global catalog which accept
/// extensions.
///
/// ```ignore
/// tsnames::register_names_file!("myplugin.names");
/// ```
#[macro_export]
macro_rules! register_names_file {
    ($name:expr) => {
        $crate::inventory::submit! { $crate::catalog::NamesFileReg($name) }
    };
}

struct CatalogState {
    files: HashMap<String, Arc<NamesFile>>,
    predefined: [Option<Arc<NamesFile>>; PREDEFINED_COUNT],
    extensions: Vec<String>,
}

/// Cache of registries and list of extension sources.
pub struct NamesCatalog {
    locator: Arc<dyn SourceLocator>,
    predefined_sources: [String; PREDEFINED_COUNT],
    state: Mutex<CatalogState>,
}

static GLOBAL: Lazy<Arc<NamesCatalog>> = Lazy::new(|| {
    let config = CatalogConfig::from_env().unwrap_or_else(|e| {
        error!("{}", e);
        CatalogConfig::default()
    });
    let catalog = NamesCatalog::from_config(&config);
    for reg in inventory::iter::<NamesFileReg> {
        catalog.register_extension_file(reg.0);
    }
    Arc::new(catalog)
});

impl NamesCatalog {
    /// Empty catalog, sources are found through `locator`.
    pub fn new(locator: Arc<dyn SourceLocator>) -> Self {
        Self {
            locator,
            predefined_sources: Predefined::ALL.map(|p| p.default_source().to_string()),
            state: Mutex::new(CatalogState {
                files: HashMap::new(),
                predefined: Default::default(),
                extensions: Vec::new(),
            }),
        }
    }

    /// Catalog searching `TSNAMES_PATH` and the configured directories, with
    /// the configured extensions and predefined source names.
    pub fn from_config(config: &CatalogConfig) -> Self {
        let mut catalog = Self::new(Arc::new(SearchPath::from_env(config.search.paths.iter().cloned())));

        let overrides = [
            &config.predefined.dtv,
            &config.predefined.ip,
            &config.predefined.oui,
            &config.predefined.dektec,
            &config.predefined.hides,
        ];
        for (slot, name) in catalog.predefined_sources.iter_mut().zip(overrides) {
            if let Some(name) = name {
                *slot = name.clone();
            }
        }

        for name in &config.extensions.files {
            catalog.register_extension_file(name);
        }
        catalog
    }

    /// The process-wide catalog.
    pub fn global() -> Arc<NamesCatalog> {
        GLOBAL.clone()
    }

    pub fn locator(&self) -> &Arc<dyn SourceLocator> {
        &self.locator
    }

    /// Source name of a predefined registry.
    pub fn predefined_source(&self, which: Predefined) -> &str {
        &self.predefined_sources[which.index()]
    }

    /// Registry of a source, loaded on first request.
    ///
    /// `merge_extensions` only applies when the registry is created.
    pub fn instance(&self, source: &str, merge_extensions: bool) -> Arc<NamesFile> {
        let mut state = self.state.lock();
        if let Some(file) = state.files.get(source) {
            return file.clone();
        }

        // The new registry is published with its data locked, concurrent
        // users wait for the end of the load on the registry lock only.
        let file = Arc::new(NamesFile::new(source, self.locator.clone(), merge_extensions));
        let pending = {
            let mut data = file.lock_data();
            state.files.insert(source.to_string(), file.clone());
            let extensions = state.extensions.clone();
            drop(state);

            debug!("loading names registry {}", source);
            file.load_locked(&mut data, &extensions)
        };
        file.notify(pending);
        file
    }

    /// A predefined registry.
    pub fn predefined(&self, which: Predefined) -> Arc<NamesFile> {
        if let Some(file) = &self.state.lock().predefined[which.index()] {
            return file.clone();
        }
        let file = self.instance(self.predefined_source(which), which.merges_extensions());
        self.state.lock().predefined[which.index()].get_or_insert(file).clone()
    }

    /// A predefined registry by index in [`Predefined::ALL`].
    pub fn predefined_by_index(&self, index: usize) -> Option<Arc<NamesFile>> {
        match Predefined::from_index(index) {
            Some(which) => Some(self.predefined(which)),
            None => {
                error!("invalid index {} of predefined names file", index);
                None
            }
        }
    }

    /// Forget a predefined registry. It is reloaded on next request.
    pub fn unregister_predefined(&self, which: Predefined) {
        let mut state = self.state.lock();
        if let Some(file) = state.predefined[which.index()].take() {
            state.files.retain(|_, f| !Arc::ptr_eq(f, &file));
        }
    }

    /// Add an extension source. It is immediately merged into the loaded
    /// predefined registries which accept extensions. Other registries only
    /// get it when they are created. Registering twice does nothing.
    pub fn register_extension_file(&self, name: &str) {
        let targets: Vec<Arc<NamesFile>> = {
            let mut state = self.state.lock();
            if state.extensions.iter().any(|e| e == name) {
                debug!("names extension {} already registered", name);
                return;
            }
            debug!("registering names extension {}", name);
            state.extensions.push(name.to_string());
            state.predefined.iter().flatten().filter(|f| f.merges_extensions()).cloned().collect()
        };

        for file in targets {
            file.merge_configuration_file(name);
        }
    }

    /// Remove an extension source from the list. Registries where it was
    /// already merged keep its definitions.
    pub fn unregister_extension_file(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.extensions.len();
        state.extensions.retain(|e| e != name);
        state.extensions.len() != before
    }

    /// Registered extension sources, in registration order.
    pub fn extension_files(&self) -> Vec<String> {
        self.state.lock().extensions.clone()
    }
}

/// Formatted name from the DTV registry of the global catalog.
pub fn name_from_dtv(section: &str, value: u64, flags: NamesFlags) -> String {
    NamesCatalog::global()
        .predefined(Predefined::Dtv)
        .name_from_section(section, value, flags, 0, 0)
}

/// Formatted name of an IEEE OUI from the global catalog.
pub fn name_from_oui(oui: u32, flags: NamesFlags) -> String {
    NamesCatalog::global()
        .predefined(Predefined::Oui)
        .name_from_section("OUI", u64::from(oui), flags, 24, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    crate::register_names_file!("tsnames-static-test.names");

    fn setup(files: &[(&str, &str)]) -> (TempDir, NamesCatalog) {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in files {
            fs::write(dir.path().join(name), text).unwrap();
        }
        let catalog = NamesCatalog::new(Arc::new(SearchPath::new([dir.path()])));
        (dir, catalog)
    }

    #[test]
    fn test_predefined_indexes() {
        for (i, p) in Predefined::ALL.iter().enumerate() {
            assert_eq!(p.index(), i);
            assert_eq!(Predefined::from_index(i), Some(*p));
            assert_eq!(Predefined::from_name(p.name()), Some(*p));
        }
        assert_eq!(Predefined::from_index(5), None);
        assert_eq!(Predefined::from_name("DTV"), Some(Predefined::Dtv));
        assert_eq!(Predefined::from_name("xyz"), None);
        assert!(Predefined::Dtv.merges_extensions());
        assert!(!Predefined::Oui.merges_extensions());
    }

    #[test]
    fn test_instance_is_cached() {
        let (_dir, catalog) = setup(&[("a.names", "[S]\nbits = 8\n1 = One\n")]);
        let first = catalog.instance("a.names", false);
        let second = catalog.instance("a.names", true);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.merges_extensions());
        assert_eq!(first.resolve_name("S", 1).as_deref(), Some("One"));

        let missing = catalog.instance("missing.names", false);
        assert_eq!(missing.error_count(), 1);
        assert!(Arc::ptr_eq(&missing, &catalog.instance("missing.names", false)));
    }

    #[test]
    fn test_predefined_shares_the_cache() {
        let (_dir, catalog) = setup(&[("dtv.names", "[S]\nbits = 8\n")]);
        let dtv = catalog.predefined(Predefined::Dtv);
        assert!(Arc::ptr_eq(&dtv, &catalog.instance("dtv.names", false)));
        assert!(Arc::ptr_eq(&dtv, &catalog.predefined(Predefined::Dtv)));
        assert!(Arc::ptr_eq(&dtv, &catalog.predefined_by_index(0).unwrap()));
        assert!(catalog.predefined_by_index(42).is_none());
    }

    #[test]
    fn test_extension_registered_after_load_is_merged_in_place() {
        let (_dir, catalog) = setup(&[
            ("dtv.names", "[TableId]\nbits = 8\n0x00 = PAT\n"),
            ("oui.names", "[OUI]\nbits = 24\n"),
            ("ext.names", "[TableId]\n0xFE = Private\n"),
        ]);
        let dtv = catalog.predefined(Predefined::Dtv);
        let oui = catalog.predefined(Predefined::Oui);
        assert_eq!(dtv.resolve_name("TableId", 0xFE), None);

        catalog.register_extension_file("ext.names");
        assert_eq!(dtv.resolve_name("TableId", 0xFE).as_deref(), Some("Private"));
        assert!(Arc::ptr_eq(&dtv, &catalog.predefined(Predefined::Dtv)));
        assert_eq!(oui.loaded_sources().len(), 1);
        assert_eq!(dtv.error_count(), 0);
    }

    #[test]
    fn test_extension_not_merged_live_into_other_registries() {
        let (_dir, catalog) = setup(&[
            ("custom.names", "[T]\nbits = 8\n1 = One\n"),
            ("later.names", "[T]\nbits = 8\n1 = One\n"),
            ("ext.names", "[T]\n2 = Two\n"),
        ]);
        let custom = catalog.instance("custom.names", true);
        catalog.register_extension_file("ext.names");
        assert_eq!(custom.resolve_name("T", 2), None);
        assert_eq!(custom.loaded_sources().len(), 1);

        // Registries created afterwards get it at load time.
        let later = catalog.instance("later.names", true);
        assert_eq!(later.resolve_name("T", 2).as_deref(), Some("Two"));
    }

    #[test]
    fn test_extension_registered_before_load() {
        let (dir, catalog) = setup(&[
            ("dtv.names", "[TableId]\nbits = 8\n0x00 = PAT\n"),
            ("ext.names", "[TableId]\n0xFE = Private\n"),
        ]);
        catalog.register_extension_file("ext.names");
        let dtv = catalog.predefined(Predefined::Dtv);
        assert_eq!(dtv.resolve_name("TableId", 0xFE).as_deref(), Some("Private"));
        assert_eq!(
            dtv.loaded_sources(),
            vec![
                dir.path().join("dtv.names").display().to_string(),
                dir.path().join("ext.names").display().to_string(),
            ]
        );
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let (_dir, catalog) = setup(&[
            ("dtv.names", "[TableId]\nbits = 8\n"),
            ("ext.names", "[TableId]\n0xFE = Private\n"),
        ]);
        let dtv = catalog.predefined(Predefined::Dtv);
        catalog.register_extension_file("ext.names");
        catalog.register_extension_file("ext.names");
        assert_eq!(catalog.extension_files(), vec!["ext.names"]);
        assert_eq!(dtv.error_count(), 0);
        assert_eq!(dtv.loaded_sources().len(), 2);

        assert!(catalog.unregister_extension_file("ext.names"));
        assert!(!catalog.unregister_extension_file("ext.names"));
        assert!(catalog.extension_files().is_empty());
        // Already merged definitions stay.
        assert_eq!(dtv.resolve_name("TableId", 0xFE).as_deref(), Some("Private"));
    }

    #[test]
    fn test_unregister_predefined() {
        let (dir, catalog) = setup(&[("ip.names", "[Protocol]\nbits = 8\n6 = TCP\n")]);
        let ip = catalog.predefined(Predefined::Ip);
        catalog.unregister_predefined(Predefined::Ip);

        fs::write(dir.path().join("ip.names"), "[Protocol]\nbits = 8\n6 = TCP\n17 = UDP\n").unwrap();
        let reloaded = catalog.predefined(Predefined::Ip);
        assert!(!Arc::ptr_eq(&ip, &reloaded));
        assert_eq!(ip.resolve_name("Protocol", 17), None);
        assert_eq!(reloaded.resolve_name("Protocol", 17).as_deref(), Some("UDP"));
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("custom-dtv.names"), "[S]\nbits = 8\n1 = One\n").unwrap();
        fs::write(dir.path().join("extra.names"), "[S]\n2 = Two\n").unwrap();

        let config = CatalogConfig::from_toml(&format!(
            "[search]\npaths = [{:?}]\n[extensions]\nfiles = [\"extra.names\"]\n\
             [predefined]\ndtv = \"custom-dtv.names\"\n",
            dir.path().display().to_string()
        ))
        .unwrap();
        let catalog = NamesCatalog::from_config(&config);
        assert_eq!(catalog.predefined_source(Predefined::Dtv), "custom-dtv.names");
        assert_eq!(catalog.predefined_source(Predefined::Oui), "oui.names");
        assert_eq!(catalog.extension_files(), vec!["extra.names"]);

        let dtv = catalog.predefined(Predefined::Dtv);
        assert_eq!(dtv.resolve_name("S", 1).as_deref(), Some("One"));
        assert_eq!(dtv.resolve_name("S", 2).as_deref(), Some("Two"));
        assert!(catalog.locator().locate("custom-dtv").is_some());
    }

    #[test]
    fn test_concurrent_instances() {
        let mut text = String::from("[S]\nbits = 16\n");
        for i in 0..2000 {
            text.push_str(&format!("{} = Value {}\n", i, i));
        }
        let (_dir, catalog) = setup(&[("big.names", text.as_str())]);
        let catalog = Arc::new(catalog);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let catalog = catalog.clone();
                std::thread::spawn(move || {
                    let file = catalog.instance("big.names", false);
                    assert_eq!(file.resolve_name("S", 1999).as_deref(), Some("Value 1999"));
                    file
                })
            })
            .collect();
        let files: Vec<Arc<NamesFile>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(files.iter().all(|f| Arc::ptr_eq(f, &files[0])));
        assert_eq!(files[0].loaded_sources().len(), 1);
    }

    #[test]
    fn test_static_registration_in_global_catalog() {
        let global = NamesCatalog::global();
        assert!(global.extension_files().iter().any(|f| f == "tsnames-static-test.names"));
        assert!(Arc::ptr_eq(&global, &NamesCatalog::global()));
        assert!(Path::new(global.predefined_source(Predefined::Hides)).extension().is_some());
    }
}
