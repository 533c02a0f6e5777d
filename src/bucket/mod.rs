//! Per-bucket primitives: the reader/writer memory-ordering protocol and the async/sync find
//! operations of `dc_hash_tbl.c`'s `store_key`/`store_val`/`store_key_val`/`load_key`/`load_val`
//! and their `_GEN`/`_AVX2` scan variants.
//!
//! A [`Bucket`] is eight slots wide, cache-line aligned, with keys and values held in separate
//! parallel arrays so a key scan never touches the value array. All slot mutation goes through
//! `AtomicU32` rather than a lock: correctness comes from the ordering discipline below, not from
//! mutual exclusion.

use core::sync::atomic::{self, AtomicU32, Ordering};

use cfg_if::cfg_if;

use crate::SENTINEL;

/// Number of (key, value) slots per bucket.
pub const BUCKET_SLOTS: usize = 8;

cfg_if! {
    if #[cfg(all(target_arch = "x86_64", target_feature = "avx2", feature = "simd"))] {
        mod simd;
        use simd as imp;
    } else {
        mod scalar;
        use scalar as imp;
    }
}

/// A cache-line-aligned, fixed-capacity group of slots.
///
/// `repr(C)` pins `keys` as the first field so its address coincides with the bucket's, which
/// the SIMD back-end relies on for a single 32-byte vector load across all eight keys.
#[repr(C, align(64))]
pub struct Bucket {
    keys: [AtomicU32; BUCKET_SLOTS],
    vals: [AtomicU32; BUCKET_SLOTS],
}

impl Bucket {
    /// A bucket with every slot set to the sentinel, as if freshly cleared.
    pub fn empty() -> Bucket {
        Bucket {
            keys: core::array::from_fn(|_| AtomicU32::new(SENTINEL)),
            vals: core::array::from_fn(|_| AtomicU32::new(0)),
        }
    }

    /// Reset every slot to the sentinel, with a trailing full fence.
    ///
    /// The fence is what makes the clear visible to a reader's subsequent acquire loads without
    /// that reader having synchronized with the writer any other way.
    pub fn init(&self) {
        for key in &self.keys {
            key.store(SENTINEL, Ordering::Release);
        }
        atomic::fence(Ordering::SeqCst);
    }

    #[inline]
    fn load_key(&self, pos: usize) -> u32 {
        self.keys[pos].load(Ordering::Acquire)
    }

    #[inline]
    fn load_val_relaxed(&self, pos: usize) -> u32 {
        self.vals[pos].load(Ordering::Relaxed)
    }

    /// Load the value at `pos`, but only if the key there still matches `key`.
    ///
    /// Implements the reader's "value (relaxed) then key (acquire) recheck" half of the
    /// protocol: `None` means the slot changed underfoot and the caller should retry.
    #[inline]
    fn load_val_checked(&self, pos: usize, key: u32) -> Option<u32> {
        let val = self.load_val_relaxed(pos);
        if self.load_key(pos) == key {
            Some(val)
        } else {
            None
        }
    }

    /// Writer-only: publish `(key, value)` at `pos`. Value first (relaxed), key last (release).
    pub fn store_key_val(&self, pos: usize, key: u32, val: u32) {
        self.vals[pos].store(val, Ordering::Relaxed);
        self.keys[pos].store(key, Ordering::Release);
    }

    /// Writer-only: clear the key at `pos`, leaving the value untouched.
    pub fn delete_key(&self, pos: usize) {
        self.keys[pos].store(SENTINEL, Ordering::Release);
    }

    /// Async find: the position of `key` in this bucket, or `None`.
    ///
    /// "Async" means a reader may call this without any synchronization with the writer; the
    /// result is a snapshot that may already be stale by the time it's used, which is why
    /// callers needing a trustworthy value go through [`find_value_in_pair_sync`] instead.
    #[inline]
    pub fn find_key(&self, key: u32) -> Option<usize> {
        imp::find_key(self, key)
    }

    /// The position of a sentinel (empty) slot, or `None` if the bucket is full.
    #[inline]
    pub fn find_vacancy(&self) -> Option<usize> {
        self.find_key(SENTINEL)
    }

    /// Count of slots whose key equals `key`.
    #[inline]
    pub fn count_key(&self, key: u32) -> u32 {
        imp::count_key(self, key)
    }

    /// Whether every slot is occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.find_vacancy().is_none()
    }

    /// Number of occupied slots in this bucket.
    pub fn used_count(&self) -> u32 {
        BUCKET_SLOTS as u32 - self.count_key(SENTINEL)
    }

    /// The raw key at `pos`, regardless of occupancy.
    ///
    /// Writer-only use: callers (cuckoo relocation) only call this on buckets already known to
    /// be full, where every slot is occupied by definition.
    pub(crate) fn key_at(&self, pos: usize) -> u32 {
        self.load_key(pos)
    }

    /// The `(key, value)` at `pos` if occupied, or `None` if that slot holds the sentinel.
    ///
    /// Writer-only use: `walk` and `verify` are the only callers, and both require the unique
    /// `&mut Table` that rules out a concurrent writer mutating this bucket underfoot.
    pub(crate) fn entry_at(&self, pos: usize) -> Option<(u32, u32)> {
        let key = self.load_key(pos);
        if key == SENTINEL {
            None
        } else {
            Some((key, self.load_val_relaxed(pos)))
        }
    }

    /// Move the entry at `src_pos` of `self` into `dst_pos` of `dst`, then clear it here.
    ///
    /// Between the two stores a reader may observe the key in both buckets at once; this overlap
    /// is intentional and non-transactional, not a bug to fix.
    pub fn move_entry_to(&self, src_pos: usize, dst: &Bucket, dst_pos: usize) {
        let key = self.load_key(src_pos);
        let val = self.load_val_relaxed(src_pos);
        dst.store_key_val(dst_pos, key, val);
        self.delete_key(src_pos);
    }
}

/// Async find over a bucket pair: which bucket (0 or 1) holds `key`, and at what position.
pub fn find_key_in_pair(buckets: [&Bucket; 2], key: u32) -> Option<(usize, usize)> {
    for (which, bucket) in buckets.into_iter().enumerate() {
        if let Some(pos) = bucket.find_key(key) {
            return Some((which, pos));
        }
    }
    None
}

/// Which of the pair has more slots matching `key`, and the two counts.
///
/// Ties favor bucket 0, matching `which_one_most`'s `n[0] >= n[1]`. Returns `None` if neither
/// bucket has a match (both counts zero).
pub fn which_has_more(buckets: [&Bucket; 2], key: u32) -> Option<(usize, [u32; 2])> {
    let counts = [buckets[0].count_key(key), buckets[1].count_key(key)];
    let which = if counts[0] >= counts[1] { 0 } else { 1 };
    if counts[which] == 0 {
        None
    } else {
        Some((which, counts))
    }
}

/// Sync, reader-safe find-and-read over a bucket pair.
///
/// Scans both buckets for `key`; if found, validates the value under the acquire/relaxed/acquire
/// dance of [`Bucket::load_val_checked`]. A stale read restarts the whole pair scan, bounded by
/// `MAX_SYNC_RETRY` attempts, after which the read gives up and reports not-found rather than
/// retry forever against a pathologically busy writer.
pub fn find_value_in_pair_sync(buckets: [&Bucket; 2], key: u32) -> Option<(usize, u32)> {
    const MAX_SYNC_RETRY: u32 = 5;

    let mut attempts = 0;
    'retry: loop {
        for (which, bucket) in buckets.into_iter().enumerate() {
            if let Some(pos) = bucket.find_key(key) {
                match bucket.load_val_checked(pos, key) {
                    Some(val) => return Some((which, val)),
                    None => {
                        attempts += 1;
                        if attempts >= MAX_SYNC_RETRY {
                            return None;
                        }
                        continue 'retry;
                    }
                }
            }
        }
        return None;
    }
}
