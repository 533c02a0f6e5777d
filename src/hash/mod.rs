//! Dual-hash bucket-pair addressing.
//!
//! Every key maps to exactly two candidate buckets, derived from two independent 32-bit mixers.
//! The mixer itself is architecture-dispatched at compile time: hardware CRC32C on `x86_64` when
//! the `simd` feature and the `sse4.2` target feature are both present, FNV-1a everywhere else.
//! This mirrors `dc_hash_tbl.c`'s own `#if defined(__x86_64__)` split between its AVX2 section
//! (which also defines `hash32` as `_mm_crc32_u32`) and its generic section (FNV-1a).

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(all(target_arch = "x86_64", target_feature = "sse4.2", feature = "simd"))] {
        mod crc32c;
        use crc32c::mix32 as mix;
    } else {
        mod fnv1a;
        use fnv1a::mix32 as mix;
    }
}

/// Bound on re-derivation attempts before a colliding pair of indices is treated as a broken
/// hash family rather than bad luck. Matches `dc_hash_tbl.c`'s `retry = 10`.
const MAX_HASH_RETRY: u32 = 10;

/// Compute the pair of candidate bucket indices for `key`.
///
/// `mask` is `nb_buckets - 1` where `nb_buckets` is a power of two. Bucket index 0 is reserved
/// and never returned; the returned indices are always distinct and in `1..=mask`.
///
/// # Panics
///
/// Panics if either mixer fails to escape a collision with its prior index within
/// [`MAX_HASH_RETRY`] attempts. A sound mixer never reaches this; it exists only to turn a
/// broken hash family into a loud failure instead of silent bucket aliasing.
pub fn bucket_indices(key: u32, mask: u32) -> (u32, u32) {
    let mut x = mix(0xdead_beef, key);
    x = mix(x, key.swap_bytes());
    let mut pos0 = x & mask;
    let mut attempts = 0;
    while pos0 == 0 {
        attempts += 1;
        if attempts > MAX_HASH_RETRY {
            hash_family_broken();
        }
        x = mix(x, key);
        pos0 = x & mask;
    }

    let mut y = (key ^ x).swap_bytes();
    let mut pos1 = y & mask;
    attempts = 0;
    while pos1 == 0 || pos1 == pos0 {
        attempts += 1;
        if attempts > MAX_HASH_RETRY {
            hash_family_broken();
        }
        y = mix(y, !key.swap_bytes());
        pos1 = y & mask;
    }

    (pos0, pos1)
}

#[cold]
#[inline(never)]
fn hash_family_broken() -> ! {
    panic!("hash family exhausted its retry bound deriving distinct bucket indices; the mixer is broken");
}
