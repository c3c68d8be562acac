use crate::search_dir::SearchDirectories;
use std::path::PathBuf;

/// Name of the per-user directory under `$XDG_CACHE_HOME`.
pub const APP_NAME: &str = "iconboard";

/// File name of the persisted icon index log.
pub const CACHE_FILE_NAME: &str = "icon-index.bin";

/// Icon shown when nothing better can be found.
pub const DEFAULT_PLACEHOLDER: &str = "unknown";

/// Number of stale log records at which the log is reset on shutdown.
pub const DEFAULT_BAD_ENTRY_THRESHOLD: usize = 10;

/// Settings for [crate::Icons] and the caches it owns.
///
/// # Example
///
/// ```
/// use iconboard::IconConfig;
///
/// let config = IconConfig::default()
///     .with_search_dirs(["/opt/board/icons"])
///     .with_cache_file("/tmp/board/icon-index.bin")
///     .with_placeholder("image-missing");
///
/// assert_eq!(config.placeholder, "image-missing");
/// ```
#[derive(Debug, Clone)]
pub struct IconConfig {
    pub search_dirs: SearchDirectories,
    pub cache_file: PathBuf,
    pub placeholder: String,
    pub bad_entry_threshold: usize,
    /// Threads for background lookups; `0` lets rayon decide.
    pub worker_threads: usize,
}

impl IconConfig {
    pub fn with_search_dirs<I, P>(mut self, directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_dirs = directories.into();
        self
    }

    pub fn with_cache_file(mut self, cache_file: impl Into<PathBuf>) -> Self {
        self.cache_file = cache_file.into();
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn with_bad_entry_threshold(mut self, threshold: usize) -> Self {
        self.bad_entry_threshold = threshold;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            search_dirs: SearchDirectories::default(),
            cache_file: default_cache_file(),
            placeholder: DEFAULT_PLACEHOLDER.into(),
            bad_entry_threshold: DEFAULT_BAD_ENTRY_THRESHOLD,
            worker_threads: 0,
        }
    }
}

/// `$XDG_CACHE_HOME/iconboard/icon-index.bin`, or the same under the temporary directory
/// if there is no cache home.
pub fn default_cache_file() -> PathBuf {
    let cache_home = xdg::BaseDirectories::new()
        .cache_home
        .unwrap_or_else(std::env::temp_dir);

    cache_home.join(APP_NAME).join(CACHE_FILE_NAME)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_cache_file_is_namespaced() {
        let file = default_cache_file();

        assert!(file.ends_with("iconboard/icon-index.bin"));
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = IconConfig::default()
            .with_search_dirs(["/a", "/b"])
            .with_bad_entry_threshold(3)
            .with_worker_threads(2);

        assert_eq!(config.search_dirs.dirs.len(), 2);
        assert_eq!(config.bad_entry_threshold, 3);
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.placeholder, DEFAULT_PLACEHOLDER);
    }
}
