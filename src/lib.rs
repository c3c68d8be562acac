//! Icons for a desktop icon board: finding them in icon themes, and remembering where they were found.
//!
//! Scanning theme directories for every icon of every folder view is slow, and a board draws
//! the same few hundred icons over and over. `iconboard` resolves each icon once, keeps the
//! answer in a small log file under `$XDG_CACHE_HOME`, and keeps loaded icons in memory.
//!
//! # Quick start
//!
//! ```no_run
//! use iconboard::{IconConfig, Icons};
//!
//! let icons = Icons::open(IconConfig::default())?;
//! icons.set_theme("hicolor")?;
//!
//! if let Some(folder) = icons.icon("folder", 48, "hicolor") {
//!     println!("folder icon is at {:?}", folder.path);
//! }
//!
//! icons.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # High level design
//!
//! Finding an icon goes through three layers, each usable on its own:
//!
//! 1.  *Indexing themes*:
//!
//!     Each icon theme lives in a directory in the root of one of the [SearchDirectories].
//!     Its `index.theme` lists the subdirectories holding icons.
//!     [IconIndex] parses it and turns an icon name into the list of files it could be.
//!
//! 2.  *Resolving and remembering*:
//!
//!     [IndexCache] reads the candidates to learn their size, following plain-text links and
//!     reading SVG dimensions, and picks the best one for the requested scale.
//!     The answer is appended to a versioned log file, so later runs skip the scan entirely.
//!
//! 3.  *Loading*:
//!
//!     [IconCache] loads the resolved file and keeps it in memory. If nothing could be
//!     found, a placeholder icon stands in. [IconLoader] runs these lookups on worker
//!     threads for views that must not wait on the disk.
//!
//! [Icons] wires the three together.

mod config;
mod icon;
pub mod icon_cache;
mod icons;
pub mod index_cache;
pub mod loader;
pub mod probe;
pub mod record;
mod search_dir;
pub mod theme;

pub use config::*;
pub use icon::*;
pub use icon_cache::{IconCache, ThumbnailError};
pub use icons::Icons;
pub use index_cache::{CacheError, IndexCache, WriteOutcome};
pub use loader::{IconLoader, IconReady, IconRequest};
pub use search_dir::*;
pub use theme::{IconIndex, ThemeBuildError};
