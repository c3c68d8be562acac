//! Background icon lookups for views that must never block on the filesystem.
//!
//! A view asks the [IconLoader] for an icon. If it is already in memory it is returned
//! right away; otherwise a lookup is started on a worker thread and `None` is returned.
//! The view later calls [IconLoader::poll] on its own thread to collect finished lookups,
//! so results are only ever delivered there, one at a time.
//!
//! ```no_run
//! use iconboard::{IconLoader, IconRequest, Icons, IconConfig};
//!
//! let icons = Icons::open(IconConfig::default())?;
//! let mut loader = icons.loader()?;
//!
//! if loader.request(7, IconRequest::named("folder", 48, "hicolor")).is_none() {
//!     // draw nothing for now, and pick the icon up on a later frame:
//!     for ready in loader.poll() {
//!         println!("item {} got {:?}", ready.id, ready.icon.map(|i| i.path));
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::icon::{Icon, alias};
use crate::icon_cache::{self, IconCache};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconRequest {
    /// A themed icon, as [IconCache::icon] resolves it.
    Named {
        name: String,
        scale: u32,
        theme: String,
    },
    /// A square preview of an image file.
    Thumbnail { path: PathBuf, scale: u32 },
}

impl IconRequest {
    pub fn named(name: impl Into<String>, scale: u32, theme: impl Into<String>) -> Self {
        IconRequest::Named {
            name: name.into(),
            scale,
            theme: theme.into(),
        }
    }

    pub fn thumbnail(path: impl Into<PathBuf>, scale: u32) -> Self {
        IconRequest::Thumbnail {
            path: path.into(),
            scale,
        }
    }

    /// Requests with equal keys share one lookup.
    fn key(&self) -> String {
        match self {
            IconRequest::Named { name, scale, theme } => alias(name, theme, *scale),
            IconRequest::Thumbnail { path, scale } => format!("{}_{scale}", path.display()),
        }
    }

    fn resolve(&self, cache: &IconCache) -> Option<Icon> {
        match self {
            IconRequest::Named { name, scale, theme } => cache.icon(name, *scale, theme),
            IconRequest::Thumbnail { path, scale } => match icon_cache::thumbnail(path, *scale) {
                Ok(image) => Some(Icon::from_raster(path, image)),
                Err(_e) => {
                    #[cfg(feature = "log")]
                    log::debug!("no thumbnail for {path:?}: {_e}");

                    None
                }
            },
        }
    }
}

/// A finished lookup for the item that asked for it.
#[derive(Debug, Clone)]
pub struct IconReady<Id> {
    pub id: Id,
    /// `None` if nothing, not even the placeholder, could be found.
    pub icon: Option<Icon>,
}

struct Completion {
    key: String,
    generation: u64,
    is_thumbnail: bool,
    icon: Option<Icon>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("could not start icon loader threads")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub struct IconLoader<Id> {
    cache: Arc<IconCache>,
    pool: ThreadPool,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    /// Items waiting for each in-flight lookup.
    pending: HashMap<String, Vec<Id>>,
    thumbnails: HashMap<String, Icon>,
    generation: u64,
}

impl<Id> IconLoader<Id> {
    /// Starts a loader with `threads` workers, or as many as rayon sees fit for `0`.
    pub fn new(cache: Arc<IconCache>, threads: usize) -> Result<Self, LoaderError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("icon-loader-{i}"))
            .build()?;
        let (sender, receiver) = unbounded();

        Ok(Self {
            cache,
            pool,
            sender,
            receiver,
            pending: HashMap::new(),
            thumbnails: HashMap::new(),
            generation: 0,
        })
    }

    /// Returns the icon if it is already loaded, and otherwise starts loading it for `id`.
    pub fn request(&mut self, id: Id, request: IconRequest) -> Option<Icon> {
        let cached = match &request {
            IconRequest::Named { name, scale, theme } => self.cache.cached(name, *scale, theme),
            IconRequest::Thumbnail { .. } => self.thumbnails.get(&request.key()).cloned(),
        };
        if cached.is_some() {
            return cached;
        }

        let key = request.key();
        if let Some(waiting) = self.pending.get_mut(&key) {
            waiting.push(id);
            return None;
        }
        self.pending.insert(key.clone(), vec![id]);

        let cache = Arc::clone(&self.cache);
        let sender = self.sender.clone();
        let generation = self.generation;

        self.pool.spawn(move || {
            let icon = request.resolve(&cache);
            let completion = Completion {
                key,
                generation,
                is_thumbnail: matches!(request, IconRequest::Thumbnail { .. }),
                icon,
            };

            // the loader is gone; nobody is waiting for this
            let _ = sender.send(completion);
        });

        None
    }

    /// Collects every lookup that finished since the last call, without blocking.
    pub fn poll(&mut self) -> Vec<IconReady<Id>>
    where
        Id: Clone,
    {
        let completions: Vec<_> = self.receiver.try_iter().collect();

        self.deliver(completions)
    }

    /// Like [IconLoader::poll], but first waits up to `timeout` for a lookup to finish.
    pub fn wait(&mut self, timeout: Duration) -> Vec<IconReady<Id>>
    where
        Id: Clone,
    {
        let first = match self.receiver.recv_timeout(timeout) {
            Ok(completion) => completion,
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return Vec::new(),
        };

        let completions: Vec<_> = std::iter::once(first)
            .chain(self.receiver.try_iter())
            .collect();

        self.deliver(completions)
    }

    /// Forgets every in-flight lookup and loaded thumbnail.
    ///
    /// Lookups that are still running will finish, but their results are dropped.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.pending.clear();
        self.thumbnails.clear();
    }

    /// Number of distinct lookups still running.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn deliver(&mut self, completions: Vec<Completion>) -> Vec<IconReady<Id>>
    where
        Id: Clone,
    {
        let mut ready = Vec::new();

        for completion in completions {
            if completion.generation != self.generation {
                #[cfg(feature = "log")]
                log::debug!("dropping outdated icon lookup {}", completion.key);

                continue;
            }

            let Some(waiting) = self.pending.remove(&completion.key) else {
                continue;
            };

            if completion.is_thumbnail {
                if let Some(icon) = &completion.icon {
                    self.thumbnails.insert(completion.key, icon.clone());
                }
            }

            ready.extend(waiting.into_iter().map(|id| IconReady {
                id,
                icon: completion.icon.clone(),
            }));
        }

        ready
    }
}
