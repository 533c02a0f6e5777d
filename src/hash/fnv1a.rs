//! FNV-1a mixer, matching `dc_hash_tbl.c`'s generic-architecture `hash32`.
//!
//! The C original reinterprets `{init, val}` as an 8-byte buffer and folds it byte-by-byte; we do
//! the same over the native-endian byte representation of the two words so the diffusion
//! characteristics match.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

#[inline]
pub fn mix32(seed: u32, value: u32) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in seed.to_ne_bytes().into_iter().chain(value.to_ne_bytes()) {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avalanches_on_single_bit_flip() {
        let base = mix32(0xdead_beef, 1);
        let mut differing_bits_total = 0u32;
        for bit in 0..32 {
            let flipped = mix32(0xdead_beef, 1 ^ (1 << bit));
            differing_bits_total += (base ^ flipped).count_ones();
        }
        // A well-diffusing mixer flips roughly half the output bits per input bit flip; demand
        // only that it isn't pathologically close to zero (i.e. the mixer isn't the identity).
        assert!(differing_bits_total > 32 * 4);
    }
}
