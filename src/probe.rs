//! Reading candidate icon files to find out their native size.

use crate::icon::{FileType, IconMatch};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// How many plain-text "symlink" files are followed before giving up.
pub const MAX_LINK_HOPS: usize = 1;

/// Content is binary if any of its first this many bytes is outside ASCII.
const SNIFF_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("could not read {path:?}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0:?} links to yet another link")]
    TooManyHops(PathBuf),
    #[error("{0:?} is an empty link")]
    EmptyLink(PathBuf),
    #[error("malformed svg")]
    Svg(#[from] quick_xml::Error),
    #[error("malformed svg attribute")]
    SvgAttribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("document root is not <svg>")]
    NotSvg,
    #[error("unrecognised image data")]
    Image(#[from] image::ImageError),
    #[error("icon has no size")]
    ZeroScale,
}

pub(crate) enum Content {
    Binary,
    Svg,
    Link,
}

pub(crate) fn classify(bytes: &[u8]) -> Content {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if !head.is_ascii() {
        return Content::Binary;
    }

    let text = bytes.trim_ascii_start();
    if text.starts_with(b"<svg") || text.starts_with(b"<?xml") {
        Content::Svg
    } else {
        Content::Link
    }
}

/// Reads an icon file and determines its scale, following at most [MAX_LINK_HOPS] links.
///
/// Some themes ship "symlinks" as plain-text files holding a relative path to the real icon.
/// The returned match points at the file that was finally read, not at the link.
pub fn read_icon_file(path: &Path) -> Result<IconMatch, ProbeError> {
    let mut path = path.to_owned();
    let mut hops = 0;

    loop {
        let bytes = std::fs::read(&path).map_err(|source| ProbeError::Unreadable {
            path: path.clone(),
            source,
        })?;

        let (scale, sniffed_type) = match classify(&bytes) {
            Content::Binary => (raster_width(&bytes)?, FileType::Png),
            Content::Svg => (svg_scale(&String::from_utf8_lossy(&bytes))?, FileType::Svg),
            Content::Link => {
                if hops == MAX_LINK_HOPS {
                    return Err(ProbeError::TooManyHops(path));
                }
                hops += 1;

                path = resolve_link(&path, &String::from_utf8_lossy(&bytes))?;
                continue;
            }
        };

        if scale == 0 {
            return Err(ProbeError::ZeroScale);
        }

        let file_type = FileType::from_path_ext(&path).unwrap_or(sniffed_type);
        return Ok(IconMatch {
            path,
            scale,
            file_type,
        });
    }
}

/// Resolves the target of a plain-text link relative to the directory holding the link.
///
/// Every leading `../` moves one directory up.
pub fn resolve_link(link: &Path, target: &str) -> Result<PathBuf, ProbeError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ProbeError::EmptyLink(link.to_owned()));
    }
    if Path::new(target).is_absolute() {
        return Ok(target.into());
    }

    let mut dir = link.parent().map(Path::to_owned).unwrap_or_default();
    let mut rest = target;
    loop {
        if let Some(r) = rest.strip_prefix("../") {
            dir.pop();
            rest = r;
        } else if let Some(r) = rest.strip_prefix("./") {
            rest = r;
        } else {
            break;
        }
    }

    Ok(dir.join(rest))
}

fn raster_width(bytes: &[u8]) -> Result<u32, ProbeError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    let (width, _height) = reader.into_dimensions()?;

    Ok(width)
}

/// The scale of an SVG icon, which is its width.
pub fn svg_scale(source: &str) -> Result<u32, ProbeError> {
    let (width, _height) = svg_size(source)?;

    Ok(width)
}

/// Width and height of an SVG document.
///
/// `width` and `height` attributes of the root element are used unless a four-component
/// `viewBox` is present, which takes precedence.
pub fn svg_size(source: &str) -> Result<(u32, u32), ProbeError> {
    let mut reader = Reader::from_str(source);

    loop {
        match reader.read_event()? {
            Event::Start(root) | Event::Empty(root) => {
                if root.local_name().as_ref() != b"svg" {
                    return Err(ProbeError::NotSvg);
                }
                return root_size(&root);
            }
            Event::Eof => return Err(ProbeError::NotSvg),
            _ => {}
        }
    }
}

fn root_size(root: &BytesStart) -> Result<(u32, u32), ProbeError> {
    let mut width = 0.0;
    let mut height = 0.0;
    let mut view_box = None;

    for attr in root.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;

        match attr.key.as_ref() {
            b"width" => width = parse_length(&value).unwrap_or(width),
            b"height" => height = parse_length(&value).unwrap_or(height),
            b"viewBox" => view_box = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(view_box) = view_box {
        let parts = view_box
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>();

        if let Ok([_, _, w, h]) = parts.as_deref() {
            width = *w;
            height = *h;
        }
    }

    Ok((to_pixels(width), to_pixels(height)))
}

/// Parses the number at the front of an SVG length such as `24`, `24.5` or `24px`.
fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.ends_with('%') {
        return None;
    }

    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());

    value[..end].parse().ok()
}

fn to_pixels(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}
