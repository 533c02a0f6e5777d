//! AVX2 bucket scan, matching `dc_hash_tbl.c`'s `_AVX2` functions.
//!
//! One 256-bit load pulls all eight keys of a bucket at once; a broadcast compare plus
//! `movemask` turns the slot-by-slot loop of [`super::scalar`] into a handful of vector
//! instructions. Unlike the original's 8-wide-with-one-reserved-lane bucket, this crate's bucket
//! has no reserved lane, so the comparison mask is used unmasked (no `KEY32_MASK`-style AND).

use core::arch::x86_64::{
    __m256i, _mm256_cmpeq_epi32, _mm256_load_si256, _mm256_movemask_epi8, _mm256_set1_epi32,
};

use super::Bucket;

#[inline]
fn load_keys(bk: &Bucket) -> __m256i {
    // Safe: `Bucket` is `repr(C, align(64))` with `keys` as its first field, so this pointer is
    // 32-byte aligned and `AtomicU32` shares `u32`'s layout.
    unsafe { _mm256_load_si256(bk.keys.as_ptr().cast()) }
}

pub(super) fn find_key(bk: &Bucket, key: u32) -> Option<usize> {
    unsafe {
        let search = _mm256_set1_epi32(key as i32);
        let cmp = _mm256_cmpeq_epi32(search, load_keys(bk));
        let mask = _mm256_movemask_epi8(cmp) as u32;
        if mask == 0 {
            None
        } else {
            Some((mask.trailing_zeros() / 4) as usize)
        }
    }
}

pub(super) fn count_key(bk: &Bucket, key: u32) -> u32 {
    unsafe {
        let search = _mm256_set1_epi32(key as i32);
        let cmp = _mm256_cmpeq_epi32(search, load_keys(bk));
        let mask = _mm256_movemask_epi8(cmp) as u32;
        mask.count_ones() / 4
    }
}
