//! Generic, architecture-independent bucket scan, matching `dc_hash_tbl.c`'s `_GEN` functions.

use super::{Bucket, BUCKET_SLOTS};

pub(super) fn find_key(bk: &Bucket, key: u32) -> Option<usize> {
    (0..BUCKET_SLOTS).find(|&pos| bk.load_key(pos) == key)
}

pub(super) fn count_key(bk: &Bucket, key: u32) -> u32 {
    (0..BUCKET_SLOTS)
        .filter(|&pos| bk.load_key(pos) == key)
        .count() as u32
}
