//! Hardware CRC32C mixer, matching `dc_hash_tbl.c`'s `hash32` on `__x86_64__`.

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::_mm_crc32_u32;

/// Mix `value` into `seed` using the CRC32C instruction.
///
/// Safe to call unconditionally: this module is only compiled when `sse4.2` is enabled at
/// compile time (see the `cfg_if!` in `hash/mod.rs`), so the intrinsic is always available.
#[inline]
pub fn mix32(seed: u32, value: u32) -> u32 {
    unsafe { _mm_crc32_u32(seed, value) }
}
