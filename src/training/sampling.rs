//! Deterministic sampling for bagging and feature subsampling.
//!
//! All randomness flows from `Xoshiro256PlusPlus` generators seeded from a
//! `u64`, so a fixed global seed reproduces training exactly. Per-tree seeds
//! are derived with a SplitMix64 mix of the global seed and the tree index,
//! which keeps tree streams independent of scheduling order.

use rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::dataset::FeatureId;

/// Derive the RNG seed for one tree from the global seed and tree index.
pub fn derive_tree_seed(global_seed: u64, tree_index: usize) -> u64 {
    // SplitMix64 finalizer over seed + (index+1) * golden gamma.
    let mut z = global_seed
        .wrapping_add((tree_index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Classic bagging: draw `n_rows` row indices with replacement, then sort
/// for cache-friendly column access. Sorting does not affect split
/// statistics.
pub fn bootstrap_sample(n_rows: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<u32> {
    let mut rows: Vec<u32> = (0..n_rows)
        .map(|_| rng.gen_range(0..n_rows) as u32)
        .collect();
    rows.sort_unstable();
    rows
}

/// Draw `k` distinct feature ids without replacement (partial Fisher-Yates),
/// returned in ascending order so candidate evaluation order is canonical.
pub fn sample_features(
    n_features: usize,
    k: usize,
    rng: &mut Xoshiro256PlusPlus,
) -> Vec<FeatureId> {
    let mut ids: Vec<FeatureId> = (0..n_features as FeatureId).collect();
    if k >= n_features {
        return ids;
    }
    for i in 0..k {
        let j = rng.gen_range(i..n_features);
        ids.swap(i, j);
    }
    let mut sampled = ids[..k].to_vec();
    sampled.sort_unstable();
    sampled
}
