use std::collections::BTreeMap;

use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

use crate::features::FeatureSet;
use crate::pairs::{Pair, PairSet};

/// One correspondence: feature index `i` in the first image of the pair,
/// feature index `j` in the second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndMatch {
    pub i: u32,
    pub j: u32,
}

/// Match set keyed by canonical pair, in deterministic order for export.
pub type PairwiseMatches = BTreeMap<Pair, Vec<IndMatch>>;

/// Per-pair descriptor matching strategy.
pub trait DescriptorMatcher: Send + Sync {
    fn match_pair(&self, a: &FeatureSet, b: &FeatureSet) -> Vec<IndMatch>;
}

/// Brute-force L2 matcher with the nearest-neighbor distance-ratio test:
/// a correspondence is kept iff d1 < ratio * d2, where d1 and d2 are the
/// distances to the nearest and second-nearest neighbor. Equality is
/// rejected. Distances are compared squared, which preserves the test.
pub struct BruteForceMatcher {
    pub dist_ratio: f32,
}

impl BruteForceMatcher {
    pub fn new(dist_ratio: f32) -> BruteForceMatcher {
        BruteForceMatcher { dist_ratio }
    }
}

fn l2_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

impl DescriptorMatcher for BruteForceMatcher {
    fn match_pair(&self, a: &FeatureSet, b: &FeatureSet) -> Vec<IndMatch> {
        let ratio_sq = self.dist_ratio * self.dist_ratio;
        let mut matches = Vec::new();
        for (ia, da) in a.descriptors.iter().enumerate() {
            let mut best: Option<(usize, f32)> = None;
            let mut second: Option<f32> = None;
            for (ib, db) in b.descriptors.iter().enumerate() {
                let d = l2_sq(da, db);
                match best {
                    None => best = Some((ib, d)),
                    Some((_, best_d)) if d < best_d => {
                        second = Some(best_d);
                        best = Some((ib, d));
                    }
                    Some(_) => {
                        if second.is_none_or(|s| d < s) {
                            second = Some(d);
                        }
                    }
                }
            }
            if let (Some((ib, d1)), Some(d2)) = (best, second) {
                if d1 < ratio_sq * d2 {
                    matches.push(IndMatch {
                        i: ia as u32,
                        j: ib as u32,
                    });
                }
            }
        }
        matches
    }
}

/// Matches every selected pair. Pairs whose feature sets are unavailable
/// (the image failed to decode) are skipped, as are pairs with no accepted
/// correspondence.
pub fn match_pairs(
    pairs: &PairSet,
    features: &[Option<FeatureSet>],
    matcher: &dyn DescriptorMatcher,
) -> PairwiseMatches {
    let pairs: Vec<Pair> = pairs.iter().copied().collect();
    pairs
        .par_iter()
        .progress_count(pairs.len() as u64)
        .filter_map(|&(i, j)| {
            let a = features.get(i as usize)?.as_ref()?;
            let b = features.get(j as usize)?.as_ref()?;
            let found = matcher.match_pair(a, b);
            (!found.is_empty()).then_some(((i, j), found))
        })
        .collect()
}
