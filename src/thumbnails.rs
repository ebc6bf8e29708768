// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Disk-backed thumbnail cache with bounded background generation
//!
//! Freshness is derived by comparing modification times of the source image
//! and its cache file. This is best-effort staleness detection, not a content
//! hash: a rewrite that leaves the source mtime untouched goes unnoticed.

use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ThumbnailOptions;
use crate::{files, RelabelError, Result};

/// Shared handle to one thumbnail generation.
///
/// Cloned handles refer to the same generation; `wait` blocks the calling
/// thread until it settles.
#[derive(Clone)]
pub struct ThumbnailHandle {
    state: Arc<HandleState>,
}

struct HandleState {
    slot: Mutex<Option<std::result::Result<PathBuf, String>>>,
    ready: Condvar,
}

impl ThumbnailHandle {
    fn pending() -> Self {
        Self {
            state: Arc::new(HandleState {
                slot: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    fn resolved(path: PathBuf) -> Self {
        Self {
            state: Arc::new(HandleState {
                slot: Mutex::new(Some(Ok(path))),
                ready: Condvar::new(),
            }),
        }
    }

    fn settle(&self, result: std::result::Result<PathBuf, String>) {
        let mut slot = lock_ignoring_poison(&self.state.slot);
        *slot = Some(result);
        self.state.ready.notify_all();
    }

    /// Whether the generation has settled
    pub fn is_done(&self) -> bool {
        lock_ignoring_poison(&self.state.slot).is_some()
    }

    /// Block until the generation settles and return the cache file path
    pub fn wait(&self) -> Result<PathBuf> {
        let mut slot = lock_ignoring_poison(&self.state.slot);
        while slot.is_none() {
            slot = self
                .state
                .ready
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        match slot.as_ref() {
            Some(Ok(path)) => Ok(path.clone()),
            Some(Err(reason)) => Err(RelabelError::Thumbnail(reason.clone())),
            None => unreachable!("slot checked above"),
        }
    }

    /// True when both handles refer to the same generation
    pub fn same_as(&self, other: &ThumbnailHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

struct Job {
    source: PathBuf,
    cache_path: PathBuf,
    handle: ThumbnailHandle,
}

/// Generation settings and bookkeeping shared with the worker threads
struct GenContext {
    size: u32,
    quality: u8,
    error_quality: u8,
    inflight: Mutex<HashMap<PathBuf, ThumbnailHandle>>,
    failed: Mutex<HashSet<PathBuf>>,
}

/// Generate and cache thumbnails on disk for faster gallery rendering.
///
/// For a given canonical source path at most one generation runs at a time;
/// concurrent `queue` calls for the same key share one handle.
pub struct ThumbnailCache {
    cache_dir: PathBuf,
    ctx: Arc<GenContext>,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThumbnailCache {
    /// Create the cache directory and spawn the worker pool
    pub fn new(cache_dir: &Path, options: &ThumbnailOptions) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;

        let ctx = Arc::new(GenContext {
            size: options.size,
            quality: options.quality,
            error_quality: options.error_quality,
            inflight: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashSet::new()),
        });

        let (tx, rx) = channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..options.workers.max(1))
            .map(|i| {
                let rx = Arc::clone(&rx);
                let ctx = Arc::clone(&ctx);
                std::thread::Builder::new()
                    .name(format!("thumb-worker-{}", i))
                    .spawn(move || worker_loop(rx, ctx))
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        info!(
            "Thumbnail cache at {:?} ({} workers, {}px)",
            cache_dir,
            workers.len(),
            options.size
        );

        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
            ctx,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    /// Return the cached thumbnail path, generating synchronously if stale.
    ///
    /// Decode failures never surface as errors; the entry becomes an "ERR"
    /// placeholder and its path is returned. Only a failure to persist even
    /// the placeholder is reported.
    pub fn get(&self, path: &Path) -> Result<PathBuf> {
        let source = canonical(path);
        let cache_path = self.cache_path_for(&source);

        if is_cache_valid(&source, &cache_path) {
            return Ok(cache_path);
        }

        self.ctx.generate(&source, &cache_path)
    }

    /// Queue generation on the worker pool and return a handle to await.
    ///
    /// A fresh cache entry yields an already-resolved handle. While a
    /// generation for the same canonical path is in flight, its existing
    /// handle is returned instead of queueing duplicate work.
    pub fn queue(&self, path: &Path) -> ThumbnailHandle {
        let source = canonical(path);
        let cache_path = self.cache_path_for(&source);

        if is_cache_valid(&source, &cache_path) {
            return ThumbnailHandle::resolved(cache_path);
        }

        let mut inflight = self.ctx.lock_inflight();
        if let Some(existing) = inflight.get(&source) {
            if !existing.is_done() {
                return existing.clone();
            }
        }

        let handle = ThumbnailHandle::pending();
        let job = Job {
            source: source.clone(),
            cache_path,
            handle: handle.clone(),
        };

        let undelivered = {
            let sender = lock_ignoring_poison(&self.sender);
            match sender.as_ref() {
                Some(tx) => tx.send(job).err().map(|e| e.0),
                None => Some(job),
            }
        };

        match undelivered {
            None => {
                inflight.insert(source, handle.clone());
            }
            Some(job) => {
                drop(inflight);
                warn!("Worker pool unavailable; generating thumbnail on the calling thread");
                let result = self.ctx.generate(&job.source, &job.cache_path);
                job.handle.settle(result.map_err(|e| e.to_string()));
            }
        }

        handle
    }

    /// Delete every cached thumbnail.
    ///
    /// Does not block on or cancel in-flight generations.
    pub fn clear(&self) {
        let pattern = self.cache_dir.join("*.jpg");
        match glob::glob(&pattern.to_string_lossy()) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if let Err(e) = std::fs::remove_file(&entry) {
                        warn!("Failed to delete cached thumbnail {:?}: {}", entry, e);
                    }
                }
            }
            Err(e) => warn!("Invalid cache glob pattern: {}", e),
        }
    }

    /// Drain the worker pool, waiting for queued generations to finish.
    /// Idempotent; also invoked on drop.
    pub fn shutdown(&self) {
        let sender = lock_ignoring_poison(&self.sender).take();
        drop(sender);

        let handles = std::mem::take(&mut *lock_ignoring_poison(&self.workers));
        for handle in handles {
            if handle.join().is_err() {
                error!("Thumbnail worker panicked during shutdown");
            }
        }
    }

    /// Whether this cache file is an error placeholder (for introspection)
    pub fn is_error_entry(&self, cache_path: &Path) -> bool {
        self.ctx.lock_failed().contains(cache_path)
    }

    /// Cache directory root
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Deterministic cache file path for a canonical source path
    fn cache_path_for(&self, source: &Path) -> PathBuf {
        let digest = blake3::hash(source.to_string_lossy().as_bytes());
        self.cache_dir.join(format!("{}.jpg", digest.to_hex()))
    }
}

impl Drop for ThumbnailCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: Arc<Mutex<Receiver<Job>>>, ctx: Arc<GenContext>) {
    loop {
        let job = {
            let guard = lock_ignoring_poison(&rx);
            guard.recv()
        };

        let job = match job {
            Ok(job) => job,
            Err(_) => break,
        };

        let result = ctx.generate(&job.source, &job.cache_path);
        job.handle.settle(result.map_err(|e| e.to_string()));

        // Clear the registry entry once the generation settles, but only if
        // it still refers to this generation.
        let mut inflight = ctx.lock_inflight();
        if let Some(current) = inflight.get(&job.source) {
            if current.same_as(&job.handle) {
                inflight.remove(&job.source);
            }
        }
    }
}

impl GenContext {
    fn lock_inflight(&self) -> MutexGuard<'_, HashMap<PathBuf, ThumbnailHandle>> {
        lock_ignoring_poison(&self.inflight)
    }

    fn lock_failed(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        lock_ignoring_poison(&self.failed)
    }

    /// Produce the cache file, converting any decode/resize/encode failure
    /// into an "ERR" placeholder.
    fn generate(&self, source: &Path, cache_path: &Path) -> Result<PathBuf> {
        if !files::is_supported_image(source) {
            warn!("Unsupported format {:?}", source);
            return self.write_error_thumbnail(cache_path, "unsupported format");
        }

        match self.render(source, cache_path) {
            Ok(()) => {
                self.lock_failed().remove(cache_path);
                Ok(cache_path.to_path_buf())
            }
            Err(e) => {
                error!("Failed to create thumbnail for {:?}: {}", source, e);
                self.write_error_thumbnail(cache_path, &e.to_string())
            }
        }
    }

    fn render(&self, source: &Path, cache_path: &Path) -> Result<()> {
        let mut decoder = ImageReader::open(source)?
            .with_guessed_format()?
            .into_decoder()?;
        let orientation = decoder
            .orientation()
            .unwrap_or(Orientation::NoTransforms);
        let mut img = DynamicImage::from_decoder(decoder)?;
        img.apply_orientation(orientation);

        // Shrink to fit, never enlarge
        let img = if img.width() > self.size || img.height() > self.size {
            img.thumbnail(self.size, self.size)
        } else {
            img
        };

        let img = match img {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => img,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };

        self.encode_jpeg(&img, cache_path, self.quality)
    }

    /// Flat background with a centered red "ERR" marker, encoded at the
    /// lower placeholder quality. The entry is recorded as failed.
    fn write_error_thumbnail(&self, cache_path: &Path, reason: &str) -> Result<PathBuf> {
        if let Some(parent) = cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut img = RgbImage::from_pixel(self.size, self.size, Rgb([230, 230, 230]));
        draw_err_marker(&mut img);

        self.encode_jpeg(&DynamicImage::ImageRgb8(img), cache_path, self.error_quality)?;
        self.lock_failed().insert(cache_path.to_path_buf());
        debug!("Wrote error placeholder {:?}: {}", cache_path, reason);
        Ok(cache_path.to_path_buf())
    }

    /// Encode to a temporary file in the cache directory and atomically
    /// rename it into place, mirroring the tag catalog's persistence.
    fn encode_jpeg(&self, img: &DynamicImage, cache_path: &Path, quality: u8) -> Result<()> {
        let tmp = tmp_path(cache_path);
        let written = (|| -> Result<()> {
            let file = std::fs::File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            img.write_with_encoder(encoder)?;
            writer
                .into_inner()
                .map_err(|e| e.into_error())?
                .sync_all()?;
            Ok(())
        })();

        match written {
            Ok(()) => {
                std::fs::rename(&tmp, cache_path)?;
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp);
                Err(e)
            }
        }
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Absolute, symlink-resolved identity key; falls back to an absolutized
/// path when the source does not exist (generation then yields a
/// placeholder, same as any other unreadable source).
fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

/// Cache file valid only while its mtime is at least the source's mtime
fn is_cache_valid(source: &Path, cache_path: &Path) -> bool {
    if !cache_path.exists() {
        return false;
    }
    let source_mtime = std::fs::metadata(source).and_then(|m| m.modified());
    let cache_mtime = std::fs::metadata(cache_path).and_then(|m| m.modified());
    match (source_mtime, cache_mtime) {
        (Ok(src), Ok(cache)) => cache >= src,
        _ => false,
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique sibling path so concurrent writers never share a temporary file
fn tmp_path(cache_path: &Path) -> PathBuf {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = cache_path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", n));
    cache_path.with_file_name(name)
}

const GLYPH_COLS: u32 = 5;
const GLYPH_ROWS: u32 = 7;
const GLYPH_E: [u8; 7] = [
    0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111,
];
const GLYPH_R: [u8; 7] = [
    0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001,
];

fn draw_err_marker(img: &mut RgbImage) {
    let glyphs = [GLYPH_E, GLYPH_R, GLYPH_R];
    let scale = (img.width() / 50).max(1);
    let advance = (GLYPH_COLS + 1) * scale;
    let text_width = advance * glyphs.len() as u32 - scale;
    let text_height = GLYPH_ROWS * scale;
    let origin_x = img.width().saturating_sub(text_width) / 2;
    let origin_y = img.height().saturating_sub(text_height) / 2;

    for (index, glyph) in glyphs.iter().enumerate() {
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_COLS {
                if bits & (1 << (GLYPH_COLS - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = origin_x + index as u32 * advance + col * scale + dx;
                        let y = origin_y + row as u32 * scale + dy;
                        if x < img.width() && y < img.height() {
                            img.put_pixel(x, y, Rgb([200, 0, 0]));
                        }
                    }
                }
            }
        }
    }
}
