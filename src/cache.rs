//! In-memory cache of loaded representations.
//!
//! Opening the same thumbnail twice (grid cell, then detail view) should not
//! read and decode it twice. This module keeps a **weak** index from content
//! hash to the [`RepresentationData`] currently held by some caller.
//!
//! # Design
//!
//! Callers receive an `Arc<RepresentationData>`; the cache itself only
//! stores a [`Weak`] pointer. When the last caller drops its `Arc`, the data
//! is freed and the cache slot goes dead. There is no size limit and no
//! eviction policy: memory use is bounded by what callers are holding.
//!
//! Dead slots are pruned whenever a new entry is inserted.
//!
//! ## Concurrency
//!
//! The index lock is held only for lookup and insertion, never across disk
//! I/O. Two threads loading the same missing identifier at once may both
//! read from the [`ContentStore`]; both get byte-identical data and the last
//! insert wins the slot.
//!
//! ## Bypassing the cache
//!
//! With `[cache] enabled = false` in `config.toml` every load goes straight
//! to disk and nothing is indexed.

use crate::store::ContentStore;
use image::DynamicImage;
use image::imageops::FilterType;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use tracing::{debug, warn};

/// The bytes of one representation plus its lazily decoded image.
pub struct RepresentationData {
    identifier: String,
    bytes: Vec<u8>,
    image: OnceLock<Option<DynamicImage>>,
}

impl RepresentationData {
    pub fn new(identifier: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            identifier: identifier.into(),
            bytes,
            image: OnceLock::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The decoded image, decoded on first access. `None` when the bytes are
    /// not a decodable image.
    pub fn image(&self) -> Option<&DynamicImage> {
        self.image
            .get_or_init(|| match image::load_from_memory(&self.bytes) {
                Ok(img) => Some(img),
                Err(e) => {
                    warn!(identifier = %self.identifier, error = %e, "cannot decode representation");
                    None
                }
            })
            .as_ref()
    }

    /// A Lanczos-resampled copy of [`image`](Self::image) with both edges
    /// multiplied by `scale`. Edges never drop below one pixel.
    pub fn image_scaled(&self, scale: f64) -> Option<DynamicImage> {
        if !scale.is_finite() || scale <= 0.0 {
            return None;
        }
        let img = self.image()?;
        let width = ((img.width() as f64 * scale).round() as u32).max(1);
        let height = ((img.height() as f64 * scale).round() as u32).max(1);
        Some(img.resize_exact(width, height, FilterType::Lanczos3))
    }
}

impl fmt::Debug for RepresentationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepresentationData")
            .field("identifier", &self.identifier)
            .field("len", &self.bytes.len())
            .field("decoded", &self.image.get().is_some())
            .finish()
    }
}

/// Counts of cache lookups, for reporting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} loaded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} loaded", self.misses)
        }
    }
}

/// Weak index of live [`RepresentationData`] keyed by content hash.
pub struct RepresentationCache {
    store: ContentStore,
    enabled: bool,
    entries: Mutex<HashMap<String, Weak<RepresentationData>>>,
    stats: Mutex<CacheStats>,
}

impl RepresentationCache {
    pub fn new(store: ContentStore, enabled: bool) -> Self {
        Self {
            store,
            enabled,
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Return the live data for `identifier`, or read it from the store.
    ///
    /// `None` means the blob is not in the store (a dangling representation)
    /// or could not be read; callers treat it as "unavailable".
    pub fn load(&self, identifier: &str) -> Option<Arc<RepresentationData>> {
        if self.enabled {
            if let Some(live) = self.lookup(identifier) {
                self.record(CacheStats::hit);
                debug!(identifier, "representation cache hit");
                return Some(live);
            }
        }

        self.record(CacheStats::miss);
        let bytes = self.store.load(identifier)?;
        let data = Arc::new(RepresentationData::new(identifier, bytes));
        if self.enabled {
            self.insert(identifier, &data);
        }
        debug!(identifier, "representation loaded from store");
        Some(data)
    }

    /// Number of index slots whose data is still alive.
    pub fn live_entries(&self) -> usize {
        self.lock_entries()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, identifier: &str) -> Option<Arc<RepresentationData>> {
        self.lock_entries().get(identifier).and_then(Weak::upgrade)
    }

    fn insert(&self, identifier: &str, data: &Arc<RepresentationData>) {
        let mut entries = self.lock_entries();
        entries.retain(|_, w| w.strong_count() > 0);
        entries.insert(identifier.to_string(), Arc::downgrade(data));
    }

    fn record(&self, f: fn(&mut CacheStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Weak<RepresentationData>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sha256_hex;
    use crate::test_helpers::png_bytes;
    use tempfile::TempDir;

    fn cache_with(blobs: &[&[u8]], enabled: bool) -> (TempDir, RepresentationCache, Vec<String>) {
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::new(tmp.path().join("images"));
        let ids = blobs
            .iter()
            .map(|b| {
                let id = sha256_hex(b);
                store.store(b, &id).unwrap();
                id
            })
            .collect();
        (tmp, RepresentationCache::new(store, enabled), ids)
    }

    // =========================================================================
    // Weak index behavior
    // =========================================================================

    #[test]
    fn load_missing_returns_none() {
        let (_tmp, cache, _) = cache_with(&[], true);
        assert!(cache.load(&sha256_hex(b"nothing")).is_none());
    }

    #[test]
    fn load_returns_stored_bytes() {
        let (_tmp, cache, ids) = cache_with(&[b"hello"], true);
        let data = cache.load(&ids[0]).unwrap();
        assert_eq!(data.bytes(), b"hello");
        assert_eq!(data.identifier(), ids[0]);
    }

    #[test]
    fn held_entry_is_shared() {
        let (_tmp, cache, ids) = cache_with(&[b"hello"], true);
        let first = cache.load(&ids[0]).unwrap();
        let second = cache.load(&ids[0]).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn dropped_entry_expires_and_reloads() {
        let (_tmp, cache, ids) = cache_with(&[b"hello"], true);
        let first = cache.load(&ids[0]).unwrap();
        assert_eq!(cache.live_entries(), 1);
        drop(first);
        assert_eq!(cache.live_entries(), 0);

        let again = cache.load(&ids[0]).unwrap();
        assert_eq!(again.bytes(), b"hello");
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn dead_slots_pruned_on_insert() {
        let (_tmp, cache, ids) = cache_with(&[b"a", b"b"], true);
        drop(cache.load(&ids[0]));
        let _b = cache.load(&ids[1]).unwrap();
        assert_eq!(cache.lock_entries().len(), 1);
    }

    #[test]
    fn disabled_cache_never_shares() {
        let (_tmp, cache, ids) = cache_with(&[b"hello"], false);
        let first = cache.load(&ids[0]).unwrap();
        let second = cache.load(&ids[0]).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.bytes(), second.bytes());
        assert_eq!(cache.live_entries(), 0);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn concurrent_loads_of_same_identifier_agree() {
        let blob = png_bytes(32, 32);
        let (_tmp, cache, ids) = cache_with(&[&blob], true);
        let id = &ids[0];

        let (a, b) = std::thread::scope(|s| {
            let t1 = s.spawn(|| cache.load(id).unwrap());
            let t2 = s.spawn(|| cache.load(id).unwrap());
            (t1.join().unwrap(), t2.join().unwrap())
        });
        assert_eq!(a.bytes(), b.bytes());
        assert_eq!(a.bytes(), blob.as_slice());
    }

    // =========================================================================
    // Decoded image
    // =========================================================================

    #[test]
    fn image_decoded_lazily() {
        let data = RepresentationData::new("x", png_bytes(20, 10));
        assert!(format!("{data:?}").contains("decoded: false"));
        let img = data.image().unwrap();
        assert_eq!((img.width(), img.height()), (20, 10));
        assert!(format!("{data:?}").contains("decoded: true"));
    }

    #[test]
    fn undecodable_bytes_have_no_image() {
        let data = RepresentationData::new("x", b"not an image".to_vec());
        assert!(data.image().is_none());
        assert!(data.image_scaled(0.5).is_none());
    }

    #[test]
    fn image_scaled_multiplies_edges() {
        let data = RepresentationData::new("x", png_bytes(20, 10));
        let half = data.image_scaled(0.5).unwrap();
        assert_eq!((half.width(), half.height()), (10, 5));
        let tiny = data.image_scaled(0.01).unwrap();
        assert_eq!((tiny.width(), tiny.height()), (1, 1));
        assert!(data.image_scaled(0.0).is_none());
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_all_loaded() {
        let stats = CacheStats {
            hits: 0,
            misses: 3,
        };
        assert_eq!(format!("{stats}"), "3 loaded");
    }

    #[test]
    fn cache_stats_display_mixed() {
        let stats = CacheStats {
            hits: 4,
            misses: 1,
        };
        assert_eq!(format!("{stats}"), "4 cached, 1 loaded (5 total)");
    }
}
