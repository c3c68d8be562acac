use crate::probe::{Content, classify};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extensions tried for every theme directory, in priority order.
pub const EXTENSIONS: [&str; 2] = ["png", "svg"];

/// A candidate file that was read successfully, along with its native scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconMatch {
    pub path: PathBuf,
    /// Pixel width of the icon. For SVGs, the width of its viewport.
    pub scale: u32,
    pub file_type: FileType,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileType {
    Png,
    Svg,
}

impl FileType {
    pub fn from_path_ext(path: &Path) -> Option<Self> {
        let ext = path.extension()?;
        let ext = ext.to_str()?;

        if ext.eq_ignore_ascii_case("png") {
            Some(FileType::Png)
        } else if ext.eq_ignore_ascii_case("svg") {
            Some(FileType::Svg)
        } else {
            None
        }
    }
}

/// Composite cache key of one icon request: `name_theme_scale`.
pub fn alias(name: &str, theme: &str, scale: u32) -> String {
    format!("{name}_{theme}_{scale}")
}

/// An icon that was loaded into memory and is ready to be drawn.
///
/// Cloning is cheap; the pixel data or SVG source is shared.
#[derive(Debug, Clone)]
pub struct Icon {
    pub path: PathBuf,
    pub scale: u32,
    pub image: IconImage,
}

#[derive(Debug, Clone)]
pub enum IconImage {
    Raster(Arc<RgbaImage>),
    /// SVG source text, left to the renderer to rasterize at whatever size it needs.
    Svg(Arc<str>),
}

impl Icon {
    /// Loads the file behind a resolved path.
    ///
    /// Files are told apart the same way [crate::probe::read_icon_file] does, so a file
    /// whose scale was read as a raster image is also loaded as one. Plain-text links are not
    /// followed here; resolved paths already point past them.
    pub fn load(path: &Path) -> Option<Icon> {
        let bytes = std::fs::read(path).ok()?;

        let image = match classify(&bytes) {
            Content::Svg => IconImage::Svg(String::from_utf8_lossy(&bytes).into()),
            Content::Binary => {
                let decoded = image::load_from_memory(&bytes).ok()?;
                IconImage::Raster(Arc::new(decoded.into_rgba8()))
            }
            Content::Link => return None,
        };

        let scale = match &image {
            IconImage::Raster(raster) => raster.width(),
            IconImage::Svg(source) => crate::probe::svg_scale(source).ok()?,
        };

        Some(Icon {
            path: path.to_owned(),
            scale,
            image,
        })
    }

    pub fn from_raster(path: &Path, raster: RgbaImage) -> Icon {
        Icon {
            path: path.to_owned(),
            scale: raster.width(),
            image: IconImage::Raster(Arc::new(raster)),
        }
    }

    pub fn is_svg(&self) -> bool {
        matches!(self.image, IconImage::Svg(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn alias_joins_name_theme_and_scale() {
        assert_eq!(alias("folder", "hicolor", 48), "folder_hicolor_48");
        assert_eq!(alias("folder", "", 0), "folder__0");
    }

    #[test]
    fn file_type_from_extension() {
        assert_eq!(FileType::from_path_ext("a/b.PNG".as_ref()), Some(FileType::Png));
        assert_eq!(FileType::from_path_ext("a/b.svg".as_ref()), Some(FileType::Svg));
        assert_eq!(FileType::from_path_ext("a/b.xpm".as_ref()), None);
        assert_eq!(FileType::from_path_ext("a/b".as_ref()), None);
    }

    #[test]
    fn load_png_and_svg() {
        let dir = tempfile::tempdir().unwrap();

        let png = dir.path().join("a.png");
        RgbaImage::new(16, 16).save(&png).unwrap();
        let icon = Icon::load(&png).unwrap();
        assert_eq!(icon.scale, 16);
        assert!(!icon.is_svg());

        let svg = dir.path().join("b.svg");
        std::fs::write(&svg, r#"<svg viewBox="0 0 32 32"></svg>"#).unwrap();
        let icon = Icon::load(&svg).unwrap();
        assert_eq!(icon.scale, 32);
        assert!(icon.is_svg());

        assert!(Icon::load(&dir.path().join("missing.png")).is_none());
    }

    #[test]
    fn load_tells_files_apart_like_read_icon_file() {
        let dir = tempfile::tempdir().unwrap();

        // svg markup, but non-ascii early on: binary, and not a decodable image
        let accented = dir.path().join("accented.svg");
        std::fs::write(
            &accented,
            "<svg width=\"48\" height=\"48\"><title>caf\u{e9}</title></svg>",
        )
        .unwrap();
        assert!(crate::probe::read_icon_file(&accented).is_err());
        assert!(Icon::load(&accented).is_none());

        // a plain-text link is not an image by itself
        let link = dir.path().join("link.png");
        std::fs::write(&link, "../real.png").unwrap();
        assert!(Icon::load(&link).is_none());
    }
}
