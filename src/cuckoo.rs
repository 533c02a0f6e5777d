//! Bounded-depth cuckoo relocation, matching `dc_hash_tbl.c`'s `cuckoo_replace`.

use crate::bucket::{Bucket, BUCKET_SLOTS};
use crate::event::{Event, EventHook};
use crate::hash;
use crate::prefetch;

/// Try to free a slot in `buckets[bucket_idx]` by displacing one of its occupied entries to that
/// entry's alternate bucket, recursing up to `depth` times when the alternate is itself full.
///
/// Returns the now-vacant position in `buckets[bucket_idx]`, or `None` if nothing frees within
/// the depth bound. Slots are scanned in ascending order and the first one with a path to a
/// vacancy wins, so the outcome is deterministic for a given table state.
///
/// # Preconditions
///
/// Callers only invoke this on a bucket already confirmed full (`Bucket::is_full`), so every
/// slot is occupied and `Bucket::key_at` never observes a sentinel here.
pub(crate) fn replace(
    buckets: &[Bucket],
    mask: u32,
    bucket_idx: u32,
    depth: u32,
    hook: &mut Option<EventHook>,
) -> Option<usize> {
    let bk = &buckets[bucket_idx as usize];

    // Compute and prefetch the alternate bucket of every occupied slot up front, as the source
    // does, so the direct and recursive passes below don't stall on cold cache lines.
    let mut alternate_idx = [0u32; BUCKET_SLOTS];
    for (i, slot) in alternate_idx.iter_mut().enumerate() {
        let key = bk.key_at(i);
        let (i0, i1) = hash::bucket_indices(key, mask);
        *slot = if i0 == bucket_idx { i1 } else { i0 };
        prefetch::bucket(&buckets[*slot as usize]);
    }

    // Direct pass: does any alternate already have a vacancy?
    for (i, &alt_idx) in alternate_idx.iter().enumerate() {
        let alt = &buckets[alt_idx as usize];
        if let Some(pos) = alt.find_vacancy() {
            bk.move_entry_to(i, alt, pos);
            notify(hook, Event::MovedEntry, bucket_idx, i);
            return Some(i);
        }
    }

    // Recursive pass: can an alternate free a slot by relocating one of its own entries?
    if depth > 0 {
        for (i, &alt_idx) in alternate_idx.iter().enumerate() {
            if let Some(pos) = replace(buckets, mask, alt_idx, depth - 1, hook) {
                let alt = &buckets[alt_idx as usize];
                bk.move_entry_to(i, alt, pos);
                notify(hook, Event::MovedEntry, bucket_idx, i);
                return Some(i);
            }
        }
    }

    None
}

fn notify(hook: &mut Option<EventHook>, event: Event, bucket_idx: u32, pos: usize) {
    if let Some(f) = hook {
        f(event, bucket_idx, pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::bucket_indices;

    /// Build a small table-shaped buckets array and adversarially fill two paired buckets full,
    /// then confirm relocation frees a slot in one of them.
    #[test]
    fn frees_a_slot_when_alternate_has_room() {
        use std::collections::HashMap;

        let mask = 0xf; // 16 buckets, indices 1..=15 usable (0 reserved)
        let buckets: Vec<Bucket> = (0..=mask).map(|_| Bucket::empty()).collect();

        // Group keys by their (unordered) candidate pair until some pair collects at least
        // BUCKET_SLOTS keys, then fill one of that pair's buckets completely.
        let mut groups: HashMap<(u32, u32), Vec<u32>> = HashMap::new();
        let (a, keys) = (1u32..200_000)
            .find_map(|key| {
                let (i0, i1) = bucket_indices(key, mask);
                let pair = (i0.min(i1), i0.max(i1));
                let group = groups.entry(pair).or_default();
                group.push(key);
                if group.len() == BUCKET_SLOTS {
                    Some((i0, group.clone()))
                } else {
                    None
                }
            })
            .expect("adversarial pair should exist within search bound");

        for (i, &k) in keys.iter().enumerate() {
            buckets[a as usize].store_key_val(i, k, k * 10);
        }
        assert!(buckets[a as usize].is_full());

        let mut hook: Option<EventHook> = None;
        let freed = replace(&buckets, mask, a, 3, &mut hook);
        assert!(freed.is_some(), "relocation should free a slot in a full bucket");
        assert!(!buckets[a as usize].is_full());

        // Every one of the original keys should still be found across the pair (none lost).
        for key in keys {
            let (i0, i1) = bucket_indices(key, mask);
            let found_a = buckets[i0 as usize].find_key(key).is_some();
            let found_b = buckets[i1 as usize].find_key(key).is_some();
            assert!(found_a || found_b, "key {key} disappeared during relocation");
        }
    }
}
