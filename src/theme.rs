use crate::icon::EXTENSIONS;
use crate::search_dir::SearchDirectories;
use crate::theme::ThemeParseError::MissingRequiredAttribute;
use freedesktop_entry_parser::low_level::{EntryIter, SectionBytes};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Theme name that is resolved by the platform instead of an `index.theme`.
pub const SYSTEM_THEME: &str = "system";

/// Maps theme names to the icon directories their `index.theme` declares.
///
/// Themes are indexed on demand with [IconIndex::build]. Once built, an index is only read,
/// so [IconIndex::icon_index] may be called from any number of threads.
pub struct IconIndex {
    search_dirs: SearchDirectories,
    themes: RwLock<HashMap<String, ThemeIndex>>,
    default_theme: RwLock<Option<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ThemeBuildError {
    #[error("theme name is empty")]
    EmptyName,
    #[error("the `system` theme has no index")]
    SystemTheme,
    #[error("no index.theme for theme `{0}` in any search directory")]
    NotFound(String),
    #[error("could not read {path:?}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid index.theme")]
    Parse(#[from] ThemeParseError),
}

impl IconIndex {
    pub fn new(search_dirs: SearchDirectories) -> Self {
        Self {
            search_dirs,
            themes: RwLock::new(HashMap::new()),
            default_theme: RwLock::new(None),
        }
    }

    pub fn search_dirs(&self) -> &SearchDirectories {
        &self.search_dirs
    }

    /// Parses the `index.theme` of a theme, replacing whatever was indexed for it before.
    ///
    /// The first theme that builds successfully becomes the default theme.
    pub fn build(&self, theme_name: &str) -> Result<(), ThemeBuildError> {
        if theme_name.is_empty() {
            return Err(ThemeBuildError::EmptyName);
        }
        if theme_name == SYSTEM_THEME {
            return Err(ThemeBuildError::SystemTheme);
        }

        let root = self
            .search_dirs
            .find_theme(theme_name)
            .ok_or_else(|| ThemeBuildError::NotFound(theme_name.into()))?;

        let index = ThemeIndex::parse_from_dir(&root)?;

        #[cfg(feature = "log")]
        log::debug!(
            "indexed theme {theme_name:?} at {root:?} with {} directories",
            index.directories.len()
        );

        self.themes.write().insert(theme_name.into(), index);

        let mut default_theme = self.default_theme.write();
        if default_theme.is_none() {
            *default_theme = Some(theme_name.into());
        }

        Ok(())
    }

    /// Every path an icon named `icon_name` may live at in `theme`, in lookup priority order.
    ///
    /// Directories come in the order the theme lists them, and within a directory `png` goes before `svg`.
    /// An empty theme name means the default theme. Nothing is checked on disk.
    pub fn icon_index(&self, icon_name: &str, theme: &str) -> Vec<PathBuf> {
        let theme = self.resolve_theme(theme);
        let themes = self.themes.read();

        let Some(index) = themes.get(&theme) else {
            return Vec::new();
        };

        let file_names = EXTENSIONS.map(|ext| format!("{icon_name}.{ext}"));

        index
            .directories
            .iter()
            .flat_map(|directory| {
                let dir = index.root.join(directory);
                file_names.iter().map(move |file_name| dir.join(file_name))
            })
            .collect()
    }

    /// The theme a lookup in `theme` actually uses: the default theme for an empty name.
    ///
    /// An empty name stays empty while no theme was built.
    pub fn resolve_theme(&self, theme: &str) -> String {
        if theme.is_empty() {
            self.default_theme().unwrap_or_default()
        } else {
            theme.to_owned()
        }
    }

    pub fn contains(&self, theme: &str) -> bool {
        self.themes.read().contains_key(theme)
    }

    pub fn theme(&self, theme: &str) -> Option<ThemeIndex> {
        self.themes.read().get(theme).cloned()
    }

    pub fn default_theme(&self) -> Option<String> {
        self.default_theme.read().clone()
    }

    /// Forgets every indexed theme, including the default.
    pub fn clear(&self) {
        self.themes.write().clear();
        *self.default_theme.write() = None;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ThemeParseError {
    #[error("missing Icon Theme index or section")]
    NotAnIconTheme,
    #[error("missing attribute `{0}`")]
    MissingRequiredAttribute(&'static str),
    #[error("the theme lists no directories")]
    NoDirectories,
    #[error("the input wasn't in utf-8")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("invalid format for a freedesktop entry file")]
    ParseError(#[from] freedesktop_entry_parser::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeIndex {
    /// Display name, or the directory name if the index does not have one.
    pub name: String,
    /// The theme directory, `{search_dir}/{internal name}`.
    pub root: PathBuf,
    /// Icon subdirectories, in the order the index lists them.
    pub directories: Vec<String>,
}

impl ThemeIndex {
    pub fn parse_from_dir(root: &Path) -> Result<Self, ThemeBuildError> {
        let path = root.join("index.theme");
        let bytes = std::fs::read(&path).map_err(|source| ThemeBuildError::Unreadable {
            path: path.clone(),
            source,
        })?;

        let (name, directories) = parse_directories(&bytes)?;
        let name = name.unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Ok(Self {
            name,
            root: root.to_owned(),
            directories,
        })
    }
}

/// Reads the theme name and its `Directories` list from an `index.theme`.
///
/// Legacy indices that are nothing but a bare `Directories=` line are accepted too.
pub fn parse_directories(bytes: &[u8]) -> Result<(Option<String>, Vec<String>), ThemeParseError> {
    let (name, directories) = match parse_icon_theme_section(bytes) {
        Ok(found) => found,
        Err(_e) => {
            #[cfg(feature = "log")]
            log::debug!("index.theme is not an entry file ({_e}), scanning for Directories=");

            (None, scan_directories_line(str::from_utf8(bytes)?)?)
        }
    };

    let mut unique: Vec<String> = Vec::with_capacity(directories.len());
    for directory in directories {
        // values may carry trailing whitespace or a stray `\r`
        let directory = directory.trim();
        if !directory.is_empty() && !unique.iter().any(|d| d == directory) {
            unique.push(directory.into());
        }
    }

    if unique.is_empty() {
        return Err(ThemeParseError::NoDirectories);
    }

    Ok((name, unique))
}

fn parse_icon_theme_section(
    bytes: &[u8],
) -> Result<(Option<String>, Vec<String>), ThemeParseError> {
    let mut entry: EntryIter = freedesktop_entry_parser::low_level::parse_entry(bytes);

    let icon_theme_section: SectionBytes = entry
        .find(|section| {
            section
                .as_ref()
                .map(|s| s.title == b"Icon Theme")
                .unwrap_or(true)
        })
        .ok_or(ThemeParseError::NotAnIconTheme)??;

    let name = find_attr(&icon_theme_section, "Name")?;
    let mut directories = find_attr_req(&icon_theme_section, "Directories")?
        .split(',')
        .map(str::to_owned)
        .collect::<Vec<_>>();
    // hi-dpi variants of the regular directories
    if let Some(scaled) = find_attr(&icon_theme_section, "ScaledDirectories")? {
        directories.extend(scaled.split(',').map(str::to_owned));
    }

    Ok((name.map(Into::into), directories))
}

fn scan_directories_line(text: &str) -> Result<Vec<String>, ThemeParseError> {
    text.lines()
        .find_map(|line| line.trim_start().strip_prefix("Directories="))
        .map(|value| value.split(',').map(str::to_owned).collect())
        .ok_or(MissingRequiredAttribute("Directories"))
}

fn find_attr<'a>(
    section: &'a SectionBytes,
    name: &str,
) -> Result<Option<&'a str>, std::str::Utf8Error> {
    section
        .attrs
        .iter()
        .find(|attr| attr.name == name.as_bytes() && attr.param.is_none())
        .map(|attr| str::from_utf8(attr.value))
        .transpose()
}

fn find_attr_req<'a>(
    section: &'a SectionBytes,
    name: &'static str,
) -> Result<&'a str, ThemeParseError> {
    find_attr(section, name)?.ok_or(MissingRequiredAttribute(name))
}
