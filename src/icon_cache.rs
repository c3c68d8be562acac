use crate::icon::{Icon, alias};
use crate::index_cache::IndexCache;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loaded icons, keyed by alias, in front of an [IndexCache].
///
/// Nothing is ever evicted; the whole map is dropped with [IconCache::clear] when the
/// theme changes or the application shuts down.
pub struct IconCache {
    index_cache: Arc<IndexCache>,
    placeholder: String,
    icons: RwLock<HashMap<String, Icon>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("could not load {path:?}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{0:?} has no pixels")]
    Empty(PathBuf),
}

impl IconCache {
    pub fn new(index_cache: Arc<IndexCache>, placeholder: impl Into<String>) -> Self {
        Self {
            index_cache,
            placeholder: placeholder.into(),
            icons: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up and loads an icon.
    ///
    /// If the icon can't be found, the placeholder icon is used instead, and remembered
    /// under the alias of the icon that was asked for. Returns `None` only when even the
    /// placeholder is missing.
    pub fn icon(&self, icon_name: &str, scale: u32, theme: &str) -> Option<Icon> {
        let theme = &self.index_cache.index().resolve_theme(theme);
        let alias = alias(icon_name, theme, scale);

        if let Some(icon) = self.icons.read().get(&alias) {
            return Some(icon.clone());
        }

        let icon = self.load(icon_name, scale, theme).or_else(|| {
            #[cfg(feature = "log")]
            log::debug!("no icon for {alias}, using {:?}", self.placeholder);

            self.load(&self.placeholder, scale, theme)
        })?;

        self.icons.write().insert(alias, icon.clone());

        Some(icon)
    }

    /// The icon remembered for this request, without looking anything up.
    pub fn cached(&self, icon_name: &str, scale: u32, theme: &str) -> Option<Icon> {
        self.icons
            .read()
            .get(&alias(
                icon_name,
                &self.index_cache.index().resolve_theme(theme),
                scale,
            ))
            .cloned()
    }

    /// Loads an image file as a square thumbnail of `scale` pixels.
    ///
    /// The image is cropped to its centered square first. Large images are first shrunk
    /// quickly to twice the target size and only then filtered properly. A `scale` of zero
    /// keeps the cropped size.
    pub fn thumbnail(&self, path: &Path, scale: u32) -> Result<RgbaImage, ThumbnailError> {
        thumbnail(path, scale)
    }

    pub fn len(&self) -> usize {
        self.icons.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.read().is_empty()
    }

    pub fn clear(&self) {
        self.icons.write().clear();
    }

    pub fn index_cache(&self) -> &Arc<IndexCache> {
        &self.index_cache
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    fn load(&self, icon_name: &str, scale: u32, theme: &str) -> Option<Icon> {
        let path = self.index_cache.icon(icon_name, scale, theme)?;

        let icon = Icon::load(&path);
        if icon.is_none() {
            #[cfg(feature = "log")]
            log::warn!("could not load icon file {path:?}");
        }

        icon
    }
}

pub fn thumbnail(path: &Path, scale: u32) -> Result<RgbaImage, ThumbnailError> {
    let image = image::open(path).map_err(|source| ThumbnailError::Load {
        path: path.to_owned(),
        source,
    })?;

    let side = image.width().min(image.height());
    if side == 0 {
        return Err(ThumbnailError::Empty(path.to_owned()));
    }

    let x = (image.width() - side) / 2;
    let y = (image.height() - side) / 2;
    let square: DynamicImage = image.crop_imm(x, y, side, side);

    if scale == 0 || scale == side {
        return Ok(square.into_rgba8());
    }

    let square = match scale.checked_mul(2) {
        Some(double) if side > double => square.resize_exact(double, double, FilterType::Nearest),
        _ => square,
    };

    Ok(square
        .resize_exact(scale, scale, FilterType::Triangle)
        .into_rgba8())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::IconConfig;
    use crate::icon::IconImage;
    use crate::theme::IconIndex;
    use image::Rgba;
    use tempfile::TempDir;

    /// A `hicolor` theme with `folder` at 48px and the `unknown` placeholder.
    fn setup() -> (TempDir, IconCache) {
        let dir = tempfile::tempdir().unwrap();
        let theme = dir.path().join("icons/hicolor");
        std::fs::create_dir_all(theme.join("48x48/places")).unwrap();
        std::fs::create_dir_all(theme.join("48x48/status")).unwrap();
        std::fs::write(
            theme.join("index.theme"),
            "[Icon Theme]\nName=Hicolor\nDirectories=48x48/places,48x48/status\n",
        )
        .unwrap();

        RgbaImage::new(48, 48)
            .save(theme.join("48x48/places/folder.png"))
            .unwrap();
        std::fs::write(
            theme.join("48x48/status/unknown.svg"),
            r#"<svg width="48" height="48"></svg>"#,
        )
        .unwrap();

        let config = IconConfig::default()
            .with_search_dirs([dir.path().join("icons")])
            .with_cache_file(dir.path().join("icon-index.bin"));

        let index = Arc::new(IconIndex::new(config.search_dirs.clone()));
        index.build("hicolor").unwrap();
        let index_cache = Arc::new(IndexCache::open(&config, index).unwrap());

        (dir, IconCache::new(index_cache, config.placeholder))
    }

    #[test]
    fn icon_is_memoized() {
        let (_dir, cache) = setup();

        assert!(cache.cached("folder", 48, "hicolor").is_none());

        let icon = cache.icon("folder", 48, "hicolor").unwrap();
        assert_eq!(icon.scale, 48);
        assert!(matches!(icon.image, IconImage::Raster(_)));

        let again = cache.icon("folder", 48, "hicolor").unwrap();
        assert_eq!(again.path, icon.path);
        assert!(cache.cached("folder", 48, "hicolor").is_some());
        assert_eq!(cache.index_cache().resolutions(), 1);
    }

    #[test]
    fn placeholder_is_memoized_under_the_requested_alias() {
        let (_dir, cache) = setup();

        let icon = cache.icon("no-such-icon", 48, "hicolor").unwrap();
        assert!(icon.is_svg());
        assert!(icon.path.ends_with("48x48/status/unknown.svg"));

        // one scan for the missing icon, one for the placeholder
        assert_eq!(cache.index_cache().resolutions(), 2);

        let again = cache.icon("no-such-icon", 48, "hicolor").unwrap();
        assert_eq!(again.path, icon.path);
        assert_eq!(cache.index_cache().resolutions(), 2);

        // the placeholder itself is never written to the log
        assert!(cache.index_cache().record("unknown_hicolor_48").is_none());
    }

    #[test]
    fn stale_record_falls_back_to_the_placeholder() {
        let (dir, cache) = setup();
        let gone = dir.path().join("gone.png");
        RgbaImage::new(48, 48).save(&gone).unwrap();

        let index_cache = cache.index_cache();
        index_cache.write("trash", 48, "hicolor", &gone).unwrap();
        index_cache.shutdown();
        std::fs::remove_file(&gone).unwrap();

        // asked for through the default theme, memoized under hicolor
        let icon = cache.icon("trash", 48, "").unwrap();
        assert!(icon.path.ends_with("48x48/status/unknown.svg"));
        assert_eq!(index_cache.bad_entries(), 1);
        assert!(cache.cached("trash", 48, "hicolor").is_some());
    }

    #[test]
    fn missing_placeholder_gives_no_icon() {
        let (_dir, cache) = setup();

        assert!(cache.icon("no-such-icon", 48, "breeze").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let (_dir, cache) = setup();

        cache.icon("folder", 48, "hicolor").unwrap();
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.cached("folder", 48, "hicolor").is_none());
    }

    #[test]
    fn thumbnail_crops_to_the_center() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");

        // red left and right thirds, green middle
        let wide = RgbaImage::from_fn(300, 100, |x, _| {
            if (100..200).contains(&x) {
                Rgba([0, 255, 0, 255])
            } else {
                Rgba([255, 0, 0, 255])
            }
        });
        wide.save(&path).unwrap();

        let thumb = thumbnail(&path, 10).unwrap();
        assert_eq!(thumb.dimensions(), (10, 10));
        assert!(thumb.pixels().all(|p| p[0] < 16 && p[1] > 240));

        let full = thumbnail(&path, 0).unwrap();
        assert_eq!(full.dimensions(), (100, 100));

        let enlarged = thumbnail(&path, 150).unwrap();
        assert_eq!(enlarged.dimensions(), (150, 150));
    }

    #[test]
    fn thumbnail_of_a_non_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not an image").unwrap();

        assert!(matches!(
            thumbnail(&path, 32),
            Err(ThumbnailError::Load { .. })
        ));
        assert!(thumbnail(&dir.path().join("missing.png"), 32).is_err());
    }
}
