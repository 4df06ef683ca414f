//! Off-clock image loading.
//!
//! A [`LoadJob`] carries a path and a single-use [`Handoff`]. Whatever runs
//! the job decodes the image (or takes it from the shared [`ImageCache`]) and
//! publishes the outcome through the handoff, which is the only way a load
//! result reaches an actor.

use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use image::RgbaImage;
use lru::LruCache;
use tracing::{debug, trace, warn};

use crate::actor::Shared;
use crate::error::LoadError;

pub type LoadResult = Result<Arc<RgbaImage>, LoadError>;

// Decodes an image to RGBA8 and applies EXIF orientation if available.
fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage, LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let img = image::ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?
        .decode()
        .map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    let mut img = img.to_rgba8();

    let orientation: u16 = read_orientation(path).unwrap_or(1);
    match orientation {
        1 => {}
        2 => img = image::imageops::flip_horizontal(&img),
        3 => img = image::imageops::rotate180(&img),
        4 => img = image::imageops::flip_vertical(&img),
        5 => {
            // transpose
            img = image::imageops::rotate90(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        6 => img = image::imageops::rotate90(&img),
        7 => {
            // transverse
            img = image::imageops::rotate270(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        8 => img = image::imageops::rotate270(&img),
        _ => {}
    }

    if img.width() == 0 || img.height() == 0 {
        return Err(LoadError::EmptyImage(path.to_path_buf()));
    }
    Ok(img)
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    trace!(orientation = o, path = %path.display(), "exif orientation");
    Some(o)
}

/// Recently decoded images, shared by every actor using the same loader.
/// Actors hold an `Arc` to the pixels, so eviction never pulls an image out
/// from under one.
pub struct ImageCache {
    entries: Mutex<LruCache<PathBuf, Arc<RgbaImage>>>,
}

impl ImageCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, path: &Path) -> Option<Arc<RgbaImage>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached pixels for `path`, decoding on a miss. Failures are not cached.
    /// The decode runs without holding the lock.
    pub fn get_or_decode(&self, path: &Path) -> LoadResult {
        if let Some(hit) = self.get(path) {
            debug!(path = %path.display(), "image cache hit");
            return Ok(hit);
        }
        let decoded = Arc::new(decode_rgba8_apply_exif(path)?);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(path.to_path_buf(), decoded.clone());
        Ok(decoded)
    }
}

/// Single-use channel from a load worker back to its actor.
///
/// Dropping a handoff without publishing counts as
/// [`LoadError::Abandoned`], so a panicking or never-started worker still
/// lets the actor move on.
pub struct Handoff {
    path: PathBuf,
    shared: Option<Arc<Shared>>,
}

impl Handoff {
    pub(crate) fn new(path: PathBuf, shared: Arc<Shared>) -> Self {
        Self {
            path,
            shared: Some(shared),
        }
    }

    /// Store the outcome, then release the actor from `Loading`.
    ///
    /// Returns `false` if the actor had already stopped waiting (load
    /// timeout); the result is discarded in that case.
    pub fn publish(mut self, result: LoadResult) -> bool {
        match self.shared.take() {
            Some(shared) => shared.publish(result),
            None => false,
        }
    }
}

impl Drop for Handoff {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            warn!(path = %self.path.display(), "load handoff dropped without a result");
            shared.publish(Err(LoadError::Abandoned(self.path.clone())));
        }
    }
}

pub struct LoadJob {
    pub path: PathBuf,
    pub handoff: Handoff,
}

/// Runs load jobs away from the animation clock.
pub trait LoadDispatch: Send + Sync {
    fn dispatch(&self, job: LoadJob);
}

#[derive(Debug, Clone)]
pub enum Backend {
    /// One short-lived OS thread per job.
    Thread,
    /// `spawn_blocking` on the given runtime.
    Tokio(tokio::runtime::Handle),
}

/// Cache-backed loader used in production.
#[derive(Clone)]
pub struct ImageLoader {
    cache: Arc<ImageCache>,
    backend: Backend,
}

impl ImageLoader {
    pub fn new(cache: Arc<ImageCache>, backend: Backend) -> Self {
        Self { cache, backend }
    }

    pub fn threaded(cache: Arc<ImageCache>) -> Self {
        Self::new(cache, Backend::Thread)
    }

    pub fn on_runtime(handle: tokio::runtime::Handle, cache: Arc<ImageCache>) -> Self {
        Self::new(cache, Backend::Tokio(handle))
    }
}

fn run_job(cache: &ImageCache, job: LoadJob) {
    let LoadJob { path, handoff } = job;
    let result = cache.get_or_decode(&path);
    match &result {
        Ok(img) => debug!(path = %path.display(), w = img.width(), h = img.height(), "loaded"),
        Err(err) => warn!(error = %err, "load failed"),
    }
    if !handoff.publish(result) {
        debug!(path = %path.display(), "load finished after the actor gave up");
    }
}

impl LoadDispatch for ImageLoader {
    fn dispatch(&self, job: LoadJob) {
        let cache = self.cache.clone();
        match &self.backend {
            Backend::Thread => {
                let spawned = thread::Builder::new()
                    .name("kenburns-load".into())
                    .spawn(move || run_job(&cache, job));
                // On failure the closure, and with it the handoff, is dropped.
                if let Err(err) = spawned {
                    warn!(error = %err, "failed to spawn load thread");
                }
            }
            Backend::Tokio(handle) => {
                handle.spawn_blocking(move || run_job(&cache, job));
            }
        }
    }
}
