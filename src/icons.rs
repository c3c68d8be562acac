use crate::config::IconConfig;
use crate::icon::Icon;
use crate::icon_cache::{IconCache, ThumbnailError};
use crate::index_cache::{CacheError, IndexCache};
use crate::loader::{IconLoader, LoaderError};
use crate::theme::{IconIndex, ThemeBuildError};
use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;

/// Owns the whole icon pipeline: the theme index, the persistent index cache and the
/// in-memory icon cache on top of it.
///
/// Create one per application and hand out references (or the `Arc`s) to whatever needs icons.
pub struct Icons {
    config: IconConfig,
    index: Arc<IconIndex>,
    index_cache: Arc<IndexCache>,
    cache: Arc<IconCache>,
}

impl Icons {
    /// Opens the icon index log and sets up the caches. No theme is indexed yet.
    ///
    /// This fails only when the log can't be used at all, which leaves an application
    /// unable to draw most of its icons.
    pub fn open(config: IconConfig) -> Result<Self, CacheError> {
        let index = Arc::new(IconIndex::new(config.search_dirs.clone()));
        let index_cache = Arc::new(IndexCache::open(&config, Arc::clone(&index))?);
        let cache = Arc::new(IconCache::new(
            Arc::clone(&index_cache),
            config.placeholder.clone(),
        ));

        Ok(Self {
            config,
            index,
            index_cache,
            cache,
        })
    }

    /// Switches to another theme.
    ///
    /// The theme is indexed again, and icons loaded so far are forgotten. If the theme can't
    /// be indexed nothing changes, and icons keep being drawn as before.
    ///
    /// Resolved paths in the index cache are kept: every record is keyed by its theme name,
    /// so answers for the old theme can't be served for the new one, and switching back
    /// needs no rescan.
    pub fn set_theme(&self, theme: &str) -> Result<(), ThemeBuildError> {
        if let Err(e) = self.index.build(theme) {
            #[cfg(feature = "log")]
            log::info!("not switching to icon theme {theme:?}: {e}");

            return Err(e);
        }

        self.cache.clear();

        Ok(())
    }

    pub fn icon(&self, icon_name: &str, scale: u32, theme: &str) -> Option<Icon> {
        self.cache.icon(icon_name, scale, theme)
    }

    pub fn thumbnail(&self, path: &Path, scale: u32) -> Result<RgbaImage, ThumbnailError> {
        self.cache.thumbnail(path, scale)
    }

    /// A loader for background lookups, using the configured number of worker threads.
    pub fn loader<Id>(&self) -> Result<IconLoader<Id>, LoaderError> {
        IconLoader::new(Arc::clone(&self.cache), self.config.worker_threads)
    }

    pub fn config(&self) -> &IconConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<IconIndex> {
        &self.index
    }

    pub fn index_cache(&self) -> &Arc<IndexCache> {
        &self.index_cache
    }

    pub fn cache(&self) -> &Arc<IconCache> {
        &self.cache
    }

    /// Empties every cache and closes the log. Using the icons again afterwards reopens it.
    pub fn shutdown(&self) {
        self.cache.clear();
        self.index_cache.shutdown();
        self.index.clear();
    }
}
