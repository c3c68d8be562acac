use std::path::PathBuf;

/// Icon themes are looked for in a set of directories.
///
/// By default, that is `$HOME/.icons`, `$XDG_DATA_DIRS/icons` and `/usr/share/pixmaps`.
/// Applications may further add their own icon directories to this list.
/// The default list may be obtained using the `Default` implementation on `SearchDirectories` or its `default` method.
///
/// To add directories to the instance, use [SearchDirectories::append].
///
/// To construct a new `SearchDirectories` from a list, use the `From` implementation or construct it by hand.
///
/// # Example
///
/// ```
/// use iconboard::SearchDirectories;
///
/// let dirs = SearchDirectories::from(["/opt/board/icons"]);
/// assert_eq!(dirs.dirs.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SearchDirectories {
    pub dirs: Vec<PathBuf>,
}

impl SearchDirectories {
    pub fn default() -> Self {
        <Self as Default>::default()
    }

    /// Add a list of directories to the end of this `SearchDirectories`
    ///
    /// # Example
    ///
    /// ```
    /// use iconboard::SearchDirectories;
    ///
    /// let dirs = SearchDirectories::from(["/usr/share/icons"]).append(["/home/root/.icons"]);
    /// assert_eq!(dirs.dirs.len(), 2);
    /// ```
    pub fn append<I, P>(mut self, directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.dirs.extend(directories.into_iter().map(Into::into));
        self
    }

    /// Finds the directory of a theme, which is the first `{dir}/{theme}` holding an `index.theme`.
    pub fn find_theme(&self, theme_name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|base_dir| base_dir.join(theme_name))
            .find(|theme_dir| theme_dir.join("index.theme").is_file())
    }
}

/// Anything that turns into an iterator of things that can become paths, can be turned into a `SearchDirectories`.
impl<I, P> From<I> for SearchDirectories
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    fn from(value: I) -> Self {
        let dirs = value.into_iter().map(Into::into).collect();

        SearchDirectories { dirs }
    }
}

impl Default for SearchDirectories {
    fn default() -> Self {
        // "By default, apps should look in $HOME/.icons (for backwards compatibility),
        // in $XDG_DATA_DIRS/icons
        // and in /usr/share/pixmaps (in that order)."

        let xdg = xdg::BaseDirectories::new();

        let mut directories = vec![];

        if let Some(home) = std::env::home_dir() {
            directories.push(home.join(".icons"));
        }

        xdg.data_dirs
            .into_iter()
            .map(|data_dir| data_dir.join("icons"))
            .for_each(|dir| directories.push(dir));

        directories.push("/usr/share/pixmaps".into());

        directories.into()
    }
}
