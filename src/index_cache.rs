use crate::config::IconConfig;
use crate::icon::{IconMatch, alias};
use crate::probe;
use crate::record::{FORMAT_VERSION, IconRecord, RecordError};
use crate::theme::IconIndex;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Resolves icon names to files on disk and remembers every answer in a log file,
/// so that later runs don't have to scan theme directories again.
///
/// Lookups only need a read lock on the in-memory map. Appends to the log are
/// serialized by the mutex that owns the file.
pub struct IndexCache {
    cache_file: PathBuf,
    placeholder: String,
    bad_entry_threshold: usize,
    index: Arc<IconIndex>,
    records: RwLock<HashMap<String, IconRecord>>,
    /// `None` once the cache was shut down; the next access opens the log again.
    log: Mutex<Option<File>>,
    valid: AtomicBool,
    bad_entries: AtomicUsize,
    resolutions: AtomicUsize,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("could not create cache directory {path:?}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not open icon index log {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("icon index log has format version {found}, expected {}", FORMAT_VERSION)]
    VersionMismatch { found: u8 },
    #[error("i/o error on the icon index log")]
    Io(#[from] std::io::Error),
    #[error("could not encode record")]
    Record(#[from] RecordError),
}

/// What [IndexCache::write] did with a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Appended,
    AlreadyPresent,
    /// Placeholder icons, empty names and empty or non-utf-8 paths are never persisted.
    Rejected,
}

impl IndexCache {
    /// Opens the log at `config.cache_file`, creating it and its directory if needed.
    ///
    /// Fails if the directory or file can't be created, or if the log was written by
    /// another format version.
    pub fn open(config: &IconConfig, index: Arc<IconIndex>) -> Result<Self, CacheError> {
        let cache = Self {
            cache_file: config.cache_file.clone(),
            placeholder: config.placeholder.clone(),
            bad_entry_threshold: config.bad_entry_threshold,
            index,
            records: RwLock::new(HashMap::new()),
            log: Mutex::new(None),
            valid: AtomicBool::new(false),
            bad_entries: AtomicUsize::new(0),
            resolutions: AtomicUsize::new(0),
        };

        let file = cache.load()?;
        *cache.log.lock() = Some(file);
        cache.valid.store(true, Ordering::Release);

        Ok(cache)
    }

    /// The file an icon resolves to.
    ///
    /// Remembered answers are returned as-is. Otherwise the theme directories are scanned
    /// for the best match, which is then persisted. An empty `theme` means the default
    /// theme, and the answer is remembered under that theme's name.
    pub fn icon(&self, icon_name: &str, scale: u32, theme: &str) -> Option<PathBuf> {
        if let Err(_e) = self.ensure_valid() {
            #[cfg(feature = "log")]
            log::warn!("icon index log unavailable: {_e}");

            return None;
        }

        let theme = &self.index.resolve_theme(theme);
        let alias = alias(icon_name, theme, scale);
        if let Some(record) = self.records.read().get(&alias) {
            return Some(record.file_path.clone());
        }

        let found = self.best_match(icon_name, scale, theme)?;

        match self.write(icon_name, scale, theme, &found.path) {
            Ok(_) => {}
            Err(_e) => {
                #[cfg(feature = "log")]
                log::warn!("could not remember {alias}: {_e}");
            }
        }

        Some(found.path)
    }

    /// Picks the best candidate for an icon.
    ///
    /// With a `scale` of zero the largest icon wins. Otherwise the first icon of exactly
    /// that scale wins, and failing that, the largest one.
    pub fn best_match(&self, icon_name: &str, scale: u32, theme: &str) -> Option<IconMatch> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);

        pick_best(self.match_list(icon_name, theme), scale)
    }

    /// All candidates of an icon that exist and could be read, in candidate order.
    pub fn match_list(&self, icon_name: &str, theme: &str) -> Vec<IconMatch> {
        self.index
            .icon_index(icon_name, theme)
            .iter()
            .filter(|candidate| candidate.exists())
            .filter_map(|candidate| match probe::read_icon_file(candidate) {
                Ok(found) => Some(found),
                Err(_e) => {
                    #[cfg(feature = "log")]
                    log::debug!("skipping candidate {candidate:?}: {_e}");

                    None
                }
            })
            .collect()
    }

    /// Persists that an icon resolves to `file_path`.
    ///
    /// The record is flushed to disk before this returns. Aliases that are already known
    /// are left alone, including those whose file has gone missing since.
    pub fn write(
        &self,
        icon_name: &str,
        scale: u32,
        theme: &str,
        file_path: &Path,
    ) -> Result<WriteOutcome, CacheError> {
        if icon_name.is_empty()
            || icon_name == self.placeholder
            || file_path.as_os_str().is_empty()
            || file_path.to_str().is_none()
        {
            return Ok(WriteOutcome::Rejected);
        }

        let record = IconRecord {
            alias: alias(icon_name, &self.index.resolve_theme(theme), scale),
            file_path: file_path.to_owned(),
        };

        let mut slot = self.log.lock();
        let file = self.log_file(&mut slot)?;

        if self.records.read().contains_key(&record.alias) {
            return Ok(WriteOutcome::AlreadyPresent);
        }

        let mut bytes = Vec::new();
        record.encode(&mut bytes)?;
        file.write_all(&bytes)?;
        file.sync_data()?;

        self.records.write().insert(record.alias.clone(), record);

        Ok(WriteOutcome::Appended)
    }

    pub fn record(&self, alias: &str) -> Option<IconRecord> {
        self.records.read().get(alias).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Records in the log that point at files which no longer exist.
    ///
    /// They are still served until the log is reset, so that an alias is never
    /// appended twice.
    pub fn bad_entries(&self) -> usize {
        self.bad_entries.load(Ordering::Relaxed)
    }

    /// How many times theme directories were scanned for an icon.
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn index(&self) -> &Arc<IconIndex> {
        &self.index
    }

    /// Truncates the log to just its version byte and forgets every record.
    pub fn reset(&self) -> Result<(), CacheError> {
        let mut slot = self.log.lock();
        let file = self.log_file(&mut slot)?;

        truncate(file)?;
        self.records.write().clear();
        self.bad_entries.store(0, Ordering::Relaxed);

        #[cfg(feature = "log")]
        log::info!("icon index log {:?} was reset", self.cache_file);

        Ok(())
    }

    /// Closes the log and forgets every record.
    ///
    /// If too many records went stale, the log is reset first.
    pub fn shutdown(&self) {
        let mut slot = self.log.lock();
        self.valid.store(false, Ordering::Release);

        if let Some(mut file) = slot.take() {
            let bad_entries = self.bad_entries();

            if bad_entries >= self.bad_entry_threshold {
                #[cfg(feature = "log")]
                log::info!("{bad_entries} stale records in {:?}, resetting", self.cache_file);

                if let Err(_e) = truncate(&mut file) {
                    #[cfg(feature = "log")]
                    log::warn!("could not reset icon index log: {_e}");
                }
            }
        }

        self.records.write().clear();
        self.bad_entries.store(0, Ordering::Relaxed);
    }

    fn ensure_valid(&self) -> Result<(), CacheError> {
        if self.is_valid() {
            return Ok(());
        }

        let mut slot = self.log.lock();
        self.log_file(&mut slot)?;

        Ok(())
    }

    fn log_file<'a>(&self, slot: &'a mut Option<File>) -> Result<&'a mut File, CacheError> {
        let file = match slot.take() {
            Some(file) => file,
            None => self.load()?,
        };
        self.valid.store(true, Ordering::Release);

        Ok(slot.insert(file))
    }

    /// Opens the log and reads every record in it into memory.
    fn load(&self) -> Result<File, CacheError> {
        let path = &self.cache_file;

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| CacheError::CacheDir {
                path: dir.to_owned(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(|source| CacheError::Open {
                path: path.clone(),
                source,
            })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let Some((&version, body)) = bytes.split_first() else {
            file.write_all(&[FORMAT_VERSION])?;
            file.sync_data()?;

            return Ok(file);
        };

        if version != FORMAT_VERSION {
            return Err(CacheError::VersionMismatch { found: version });
        }

        let mut records = self.records.write();
        let mut bad_entries = 0;
        let mut input = body;

        loop {
            let offset = bytes.len() - input.len();

            match IconRecord::decode(&mut input) {
                Ok(Some(record)) => {
                    if !record.file_path.exists() {
                        #[cfg(feature = "log")]
                        log::debug!("stale record {} -> {:?}", record.alias, record.file_path);

                        bad_entries += 1;
                    }

                    records.entry(record.alias.clone()).or_insert(record);
                }
                Ok(None) => break,
                Err(_e) => {
                    // a torn append; anything written after it would be unreadable
                    #[cfg(feature = "log")]
                    log::warn!("dropping unreadable tail of {path:?} at byte {offset}: {_e}");

                    file.set_len(offset as u64)?;
                    file.sync_data()?;
                    bad_entries += 1;
                    break;
                }
            }
        }

        self.bad_entries.store(bad_entries, Ordering::Relaxed);

        #[cfg(feature = "log")]
        log::info!(
            "opened icon index log {path:?}: {} records, {bad_entries} stale",
            records.len()
        );

        Ok(file)
    }
}

fn pick_best(matches: Vec<IconMatch>, scale: u32) -> Option<IconMatch> {
    let mut best: Option<IconMatch> = None;

    for candidate in matches {
        if scale != 0 && candidate.scale == scale {
            return Some(candidate);
        }

        if best.as_ref().is_none_or(|best| candidate.scale > best.scale) {
            best = Some(candidate);
        }
    }

    best
}

fn truncate(file: &mut File) -> std::io::Result<()> {
    file.set_len(1)?;
    file.sync_data()
}
