//! Location of `.names` sources.

use std::path::{Path, PathBuf};

/// Environment variable holding additional search directories, in the
/// platform path list format.
pub const SEARCH_PATH_ENV: &str = "TSNAMES_PATH";

/// Default extension of names sources.
pub const NAMES_EXTENSION: &str = "names";

/// Turns a source name into a readable file path.
pub trait SourceLocator: Send + Sync {
    /// Find a source. `None` when it does not exist anywhere.
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

/// Ordered list of directories where sources are searched.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// Search only in the given directories, in order.
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self { dirs: dirs.into_iter().map(Into::into).collect() }
    }

    /// Directories from [`SEARCH_PATH_ENV`], then `extra`, then the directory
    /// of the running executable.
    pub fn from_env<I, P>(extra: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut dirs = Vec::new();

        if let Some(paths) = std::env::var_os(SEARCH_PATH_ENV) {
            dirs.extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }

        dirs.extend(extra.into_iter().map(Into::into));

        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                dirs.push(dir.to_path_buf());
            }
        }

        Self { dirs }
    }

    /// Append a directory at the end of the search path.
    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Candidate file names for a source: as is, then with the default extension.
    ///
    /// A simple name is never tried as is, it could match an executable of
    /// the search path (`ip` for instance).
    fn candidates(name: &str) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if !is_simple_name(name) {
            candidates.push(PathBuf::from(name));
        }
        if Path::new(name).extension().map_or(true, |ext| ext != NAMES_EXTENSION) {
            candidates.push(PathBuf::from(format!("{}.{}", name, NAMES_EXTENSION)));
        }
        candidates
    }
}

/// A name without directory nor extension.
fn is_simple_name(name: &str) -> bool {
    !name.contains(&['/', '\\', '.'][..])
}

impl SourceLocator for SearchPath {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }

        let path = Path::new(name);
        if !is_simple_name(name) && path.is_file() {
            return Some(path.to_path_buf());
        }
        if path.is_absolute() {
            return None;
        }

        self.dirs.iter().find_map(|dir| {
            Self::candidates(name)
                .into_iter()
                .map(|candidate| dir.join(candidate))
                .find(|full| full.is_file())
        })
    }
}
