//! Table lifecycle and the public insert/find/delete/walk/verify surface, matching
//! `dc_hash_tbl.c`'s `dcht_hash_table_*`, `dcht_hash_add*`, `dcht_hash_find*`, `dcht_hash_del*`,
//! `dcht_hash_walk`, and (for `verify`'s shape) `dcht_hash_utest`.

use crate::bucket::{self, Bucket, BUCKET_SLOTS};
use crate::cuckoo;
use crate::error::Error;
use crate::event::{Event, EventHook};
use crate::hash;
use crate::prefetch;
use crate::{CACHE_LINE_SIZE, DEFAULT_FOLLOW_DEPTH, MIN_ENTRIES, SENTINEL};

/// A bucket pair: the two candidate bucket indices of a key, as returned by
/// [`Table::prefetch`] and consumed by the `_in_buckets` variants to skip recomputing the hash.
pub type BucketPair = (u32, u32);

/// The cuckoo hash table itself.
///
/// Readers use the `&self` methods ([`find`](Table::find), [`find_in_buckets`](Table::find_in_buckets),
/// [`prefetch`](Table::prefetch)) from any thread given a shared `&Table` — these only ever touch
/// the buckets through `AtomicU32` operations. Mutation ([`insert`](Table::insert),
/// [`delete`](Table::delete), [`clean`](Table::clean), [`walk`](Table::walk),
/// [`verify`](Table::verify)) requires `&mut Table`, which the borrow checker can only ever hand
/// to one caller at a time — the single-writer discipline the original leaves to convention is a
/// compile-time guarantee here, for every caller that goes through safe Rust.
pub struct Table {
    buckets: Box<[Bucket]>,
    mask: u32,
    max_entries: usize,
    current_entries: usize,
    follow_depth: u32,
    logger: slog::Logger,
    event_hook: Option<EventHook>,
}

impl Table {
    /// Bytes of bucket storage a table sized for `max_entries` unique keys requires.
    ///
    /// Pure. `max_entries` is clamped up to [`MIN_ENTRIES`]; the bucket count is the smallest
    /// power of two so that `N * B` covers `max_entries` at an ~0.8 load factor.
    pub fn size_bytes(max_entries: usize) -> usize {
        bucket_count_for(max_entries) as usize * core::mem::size_of::<Bucket>()
    }

    /// Allocate a cache-line-aligned bucket array and initialize it, sized for `max_entries`.
    ///
    /// Convenience wrapper around the raw-memory [`Table::init`] that lets `Box` own the
    /// allocation instead of a caller-supplied region.
    pub fn create(max_entries: usize) -> Table {
        let bucket_count = bucket_count_for(max_entries);
        let buckets: Box<[Bucket]> = (0..bucket_count).map(|_| Bucket::empty()).collect();
        for bk in buckets.iter() {
            bk.init();
        }
        Table {
            buckets,
            mask: bucket_count - 1,
            max_entries: max_entries.max(MIN_ENTRIES),
            current_entries: 0,
            follow_depth: DEFAULT_FOLLOW_DEPTH,
            logger: discard_logger(),
            event_hook: None,
        }
    }

    /// Take ownership of a caller-supplied, cache-line-aligned memory region as bucket storage.
    ///
    /// `size` must be at least [`Table::size_bytes`]`(max_entries)`. On success, `mem` is owned
    /// by the returned `Table` for the rest of its lifetime (freed when the `Table` drops).
    ///
    /// # Safety
    ///
    /// `mem` must point to a region of at least `size` bytes, valid for reads and writes, not
    /// aliased by any other live reference, and originally obtained from an allocator compatible
    /// with `Bucket`'s layout (size and alignment of `Table::size_bytes(max_entries)` bytes at
    /// `align_of::<Bucket>()`). The caller gives up the right to use `mem` through any other
    /// handle once this call succeeds.
    pub unsafe fn init(mem: *mut u8, size: usize, max_entries: usize) -> Result<Table, Error> {
        if (mem as usize) % CACHE_LINE_SIZE != 0 {
            return Err(Error::InvalidAlignment);
        }
        let needed = Table::size_bytes(max_entries);
        if size < needed {
            return Err(Error::TooSmall);
        }
        let bucket_count = bucket_count_for(max_entries);
        let buckets = Box::from_raw(core::slice::from_raw_parts_mut(
            mem.cast::<Bucket>(),
            bucket_count as usize,
        ));
        for bk in buckets.iter() {
            bk.init();
        }
        Ok(Table {
            buckets,
            mask: bucket_count - 1,
            max_entries: max_entries.max(MIN_ENTRIES),
            current_entries: 0,
            follow_depth: DEFAULT_FOLLOW_DEPTH,
            logger: discard_logger(),
            event_hook: None,
        })
    }

    /// Attach a structured logger, replacing the default `Discard` drain.
    pub fn with_logger(mut self, logger: slog::Logger) -> Table {
        self.logger = logger;
        self
    }

    /// Override the cuckoo follow-depth (default [`DEFAULT_FOLLOW_DEPTH`]).
    pub fn with_follow_depth(mut self, depth: u32) -> Table {
        self.follow_depth = depth;
        self
    }

    /// Install (or remove, with `None`) the debug event hook.
    ///
    /// Only ever invoked synchronously from the writer thread, inside `insert`/`delete`.
    pub fn set_event_hook(&mut self, hook: Option<EventHook>) {
        self.event_hook = hook;
    }

    /// The configured maximum number of entries this table was sized for.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// The number of entries currently stored. Writer-private bookkeeping; readers must not rely
    /// on this being current with respect to concurrent writer activity.
    pub fn current_entries(&self) -> usize {
        self.current_entries
    }

    /// Reset every bucket to the sentinel and zero the entry count. Writer-only.
    pub fn clean(&mut self) {
        for bk in self.buckets.iter() {
            bk.init();
        }
        self.current_entries = 0;
        debug!(self.logger, "table cleaned"; "buckets" => self.buckets.len());
    }

    /// Number of occupied slots in the bucket at `bucket_idx`.
    ///
    /// `bucket_idx` is a raw index as returned by [`Table::prefetch`] or a [`BucketPair`] half,
    /// not a key. Panics if `bucket_idx` is out of range for this table's bucket array.
    pub fn bucket_used_count(&self, bucket_idx: u32) -> u32 {
        self.buckets[bucket_idx as usize].used_count()
    }

    /// Compute `key`'s bucket pair and issue prefetch hints on both candidate buckets.
    pub fn prefetch(&self, key: u32) -> BucketPair {
        let pair = hash::bucket_indices(key, self.mask);
        prefetch::bucket(&self.buckets[pair.0 as usize]);
        prefetch::bucket(&self.buckets[pair.1 as usize]);
        pair
    }

    /// Look up `key`, computing its bucket pair first.
    pub fn find(&self, key: u32) -> Result<u32, Error> {
        self.find_in_buckets(hash::bucket_indices(key, self.mask), key)
    }

    /// Look up `key` in an already-computed bucket pair (e.g. from [`Table::prefetch`]).
    pub fn find_in_buckets(&self, pair: BucketPair, key: u32) -> Result<u32, Error> {
        let buckets = pair_refs(&self.buckets, pair);
        let result = bucket::find_value_in_pair_sync(buckets, key)
            .map(|(_, val)| val)
            .ok_or(Error::NotFound);
        trace!(self.logger, "find"; "key" => key, "ok" => result.is_ok());
        result
    }

    /// Insert `(key, value)`, computing the bucket pair first. Writer-only.
    ///
    /// If `key` already exists in the pair: when `skip_update` is `false`, its value is
    /// overwritten in place (without touching `current_entries`); when `true`, the existing entry
    /// is left untouched and this returns `Ok(())` without changing the table. Otherwise, the
    /// entry is placed in the bucket with more vacancies, falling back to cuckoo relocation when
    /// both candidate buckets are full.
    pub fn insert(&mut self, key: u32, value: u32, skip_update: bool) -> Result<(), Error> {
        self.insert_in_buckets(hash::bucket_indices(key, self.mask), key, value, skip_update)
    }

    /// Insert into an already-computed bucket pair. Writer-only.
    pub fn insert_in_buckets(
        &mut self,
        pair: BucketPair,
        key: u32,
        value: u32,
        skip_update: bool,
    ) -> Result<(), Error> {
        if key == SENTINEL {
            return Err(Error::InvalidKey);
        }

        let buckets = pair_refs(&self.buckets, pair);

        if !skip_update {
            if let Some((which, pos)) = bucket::find_key_in_pair(buckets, key) {
                buckets[which].store_key_val(pos, key, value);
                notify(&mut self.event_hook, Event::UpdateValue, pair_index(pair, which), pos);
                trace!(self.logger, "update"; "key" => key);
                return Ok(());
            }
        }

        if let Some((which, _)) = bucket::which_has_more(buckets, SENTINEL) {
            let pos = buckets[which]
                .find_vacancy()
                .expect("which_has_more(SENTINEL) guarantees a vacancy in the winning bucket");
            buckets[which].store_key_val(pos, key, value);
            self.current_entries += 1;
            trace!(self.logger, "insert"; "key" => key, "bucket" => pair_index(pair, which));
            return Ok(());
        }

        debug!(self.logger, "bucket pair full"; "key" => key, "i0" => pair.0, "i1" => pair.1);
        notify(&mut self.event_hook, Event::BucketFull, pair.0, 0);

        for &bucket_idx in &[pair.0, pair.1] {
            if let Some(pos) = cuckoo::replace(
                &self.buckets,
                self.mask,
                bucket_idx,
                self.follow_depth,
                &mut self.event_hook,
            ) {
                self.buckets[bucket_idx as usize].store_key_val(pos, key, value);
                notify(&mut self.event_hook, Event::CuckooReplaced, bucket_idx, pos);
                self.current_entries += 1;
                debug!(self.logger, "cuckoo relocation freed a slot"; "key" => key, "bucket" => bucket_idx);
                return Ok(());
            }
        }

        debug!(self.logger, "insert failed: no space"; "key" => key, "depth" => self.follow_depth);
        Err(Error::NoSpace)
    }

    /// Delete `key`, computing its bucket pair first. Writer-only.
    pub fn delete(&mut self, key: u32) -> Result<(), Error> {
        self.delete_in_buckets(hash::bucket_indices(key, self.mask), key)
    }

    /// Delete `key` from an already-computed bucket pair. Writer-only.
    pub fn delete_in_buckets(&mut self, pair: BucketPair, key: u32) -> Result<(), Error> {
        let buckets = pair_refs(&self.buckets, pair);
        match bucket::find_key_in_pair(buckets, key) {
            Some((which, pos)) => {
                buckets[which].delete_key(pos);
                self.current_entries -= 1;
                trace!(self.logger, "delete"; "key" => key);
                Ok(())
            }
            None => Err(Error::NotFound),
        }
    }

    /// Visit every occupied slot in bucket-index, then slot-index order. Writer-only snapshot
    /// iteration: `visit` receives `(key, value)` and returning `true` stops the walk early.
    pub fn walk<F: FnMut(u32, u32) -> bool>(&mut self, mut visit: F) {
        for bk in self.buckets.iter() {
            for pos in 0..BUCKET_SLOTS {
                if let Some((key, val)) = bk.entry_at(pos) {
                    if visit(key, val) {
                        return;
                    }
                }
            }
        }
    }

    /// Consistency check used in tests: every occupied slot's key resolves (via its own hash) to
    /// the bucket it's actually stored in, no key appears twice, and the live count matches
    /// `current_entries`.
    pub fn verify(&mut self) -> Result<(), Error> {
        let mask = self.mask;
        let mut seen = std::collections::HashSet::new();
        let mut live = 0usize;
        let mut corrupt = false;

        for (bucket_idx, bk) in self.buckets.iter().enumerate() {
            for pos in 0..BUCKET_SLOTS {
                if let Some((key, _val)) = bk.entry_at(pos) {
                    let (i0, i1) = hash::bucket_indices(key, mask);
                    let belongs = bucket_idx as u32 == i0 || bucket_idx as u32 == i1;
                    if !belongs || !seen.insert(key) {
                        corrupt = true;
                    }
                    live += 1;
                }
            }
        }

        if corrupt || live != self.current_entries {
            debug!(self.logger, "verify failed";
                "live" => live, "current_entries" => self.current_entries, "corrupt" => corrupt);
            return Err(Error::Corrupt);
        }
        Ok(())
    }

}

/// Borrow both buckets of a pair from `buckets`, without tying the result to the rest of
/// whatever struct `buckets` came from — letting callers still mutate sibling fields (the event
/// hook, the entry count) while these references are alive.
fn pair_refs(buckets: &[Bucket], pair: BucketPair) -> [&Bucket; 2] {
    [&buckets[pair.0 as usize], &buckets[pair.1 as usize]]
}

fn pair_index(pair: BucketPair, which: usize) -> u32 {
    if which == 0 {
        pair.0
    } else {
        pair.1
    }
}

fn notify(hook: &mut Option<EventHook>, event: Event, bucket_idx: u32, pos: usize) {
    if let Some(f) = hook {
        f(event, bucket_idx, pos);
    }
}

fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// Bucket count for `max_entries`, clamped to [`MIN_ENTRIES`] and rounded up to a power of two at
/// an ~0.8 load factor, matching `dcht_hash_table_size`'s sizing arithmetic.
fn bucket_count_for(max_entries: usize) -> u32 {
    let max_entries = max_entries.max(MIN_ENTRIES);
    let slots_needed = (max_entries * 10 + 7) / 8; // ceil(max_entries / 0.8)
    let buckets_needed = (slots_needed + BUCKET_SLOTS - 1) / BUCKET_SLOTS;
    buckets_needed.next_power_of_two().max(2) as u32
}
