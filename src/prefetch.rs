//! Non-temporal prefetch hints, matching `dc_hash_tbl.c`'s `prefetch()` (`__builtin_prefetch`).

use crate::bucket::Bucket;

#[cfg(target_arch = "x86_64")]
#[inline]
pub(crate) fn bucket(bk: &Bucket) {
    use core::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
    unsafe { _mm_prefetch((bk as *const Bucket).cast(), _MM_HINT_T0) };
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub(crate) fn bucket(_bk: &Bucket) {}
