use pairwise_matching::features::{FeatureSet, KeyPoint};
use pairwise_matching::matching::{BruteForceMatcher, DescriptorMatcher, IndMatch};

fn feature_set(descs: Vec<Vec<f32>>) -> FeatureSet {
    let keypoints = (0..descs.len())
        .map(|i| KeyPoint {
            x: i as f32,
            y: 0.0,
            scale: 1.0,
            orientation: 0.0,
        })
        .collect();
    FeatureSet {
        keypoints,
        descriptors: descs,
    }
}

#[test]
fn test_ratio_boundary_rejected() {
    // Nearest distance 3, second nearest 5: d1 == 0.6 * d2 exactly, so
    // the correspondence must be rejected at ratio 0.6.
    let a = feature_set(vec![vec![0.0, 0.0]]);
    let b = feature_set(vec![vec![3.0, 0.0], vec![5.0, 0.0]]);

    let matcher = BruteForceMatcher::new(0.6);
    assert!(matcher.match_pair(&a, &b).is_empty());

    // A slightly looser ratio accepts it.
    let matcher = BruteForceMatcher::new(0.7);
    assert_eq!(
        matcher.match_pair(&a, &b),
        vec![IndMatch { i: 0, j: 0 }]
    );
}

#[test]
fn test_nearest_and_second_nearest_selection() {
    let a = feature_set(vec![vec![0.0, 0.0]]);
    // Candidates at distances 10, 1, 7: nearest is index 1, second is 7.
    let b = feature_set(vec![
        vec![10.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 7.0],
    ]);
    let matcher = BruteForceMatcher::new(0.6);
    // 1 < 0.6 * 7, accepted against the true second-nearest.
    assert_eq!(
        matcher.match_pair(&a, &b),
        vec![IndMatch { i: 0, j: 1 }]
    );
}

#[test]
fn test_single_candidate_has_no_second_neighbor() {
    // With one candidate the ratio test cannot run; no match is produced.
    let a = feature_set(vec![vec![0.0, 0.0]]);
    let b = feature_set(vec![vec![0.1, 0.0]]);
    let matcher = BruteForceMatcher::new(0.6);
    assert!(matcher.match_pair(&a, &b).is_empty());
}

#[test]
fn test_all_ambiguous_matches_rejected() {
    // Two candidates at the same distance: d1 == d2, never below ratio * d2.
    let a = feature_set(vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
    let b = feature_set(vec![vec![2.0, 0.0], vec![0.0, 2.0]]);
    let matcher = BruteForceMatcher::new(0.99);
    assert!(matcher.match_pair(&a, &b).is_empty());
}
