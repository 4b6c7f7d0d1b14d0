use pairwise_matching::pairs::{contiguous_with_overlap, exhaustive_pairs, predefined_pairs};

#[test]
fn test_exhaustive_count_and_order() {
    for n in 2..8usize {
        let pairs = exhaustive_pairs(n);
        assert_eq!(pairs.len(), n * (n - 1) / 2);
        for &(i, j) in &pairs {
            assert!(i < j);
            assert!((j as usize) < n);
        }
    }
}

#[test]
fn test_exhaustive_trivial_sizes() {
    assert!(exhaustive_pairs(0).is_empty());
    assert!(exhaustive_pairs(1).is_empty());
}

#[test]
fn test_overlap_membership() {
    let n = 10;
    let w = 3;
    let pairs = contiguous_with_overlap(n, w);
    for i in 0..n as u32 {
        for j in 0..n as u32 {
            let expected = j > i && (j - i) as usize <= w;
            assert_eq!(pairs.contains(&(i, j)), expected, "pair ({}, {})", i, j);
        }
    }
}

#[test]
fn test_overlap_larger_than_sequence() {
    // A window wider than the sequence degenerates to exhaustive.
    assert_eq!(contiguous_with_overlap(5, 100), exhaustive_pairs(5));
}

#[test]
fn test_predefined_parses_and_canonicalizes() {
    let text = "0 1\n# comment\n\n3 2\n1 0\n";
    let pairs = predefined_pairs(text, 4).unwrap();
    // (1, 0) collapses onto (0, 1); (3, 2) is stored smaller-first.
    assert_eq!(pairs.len(), 2);
    assert!(pairs.contains(&(0, 1)));
    assert!(pairs.contains(&(2, 3)));
}

#[test]
fn test_predefined_rejects_bad_entries() {
    assert!(predefined_pairs("0 9", 4).is_err()); // out of range
    assert!(predefined_pairs("2 2", 4).is_err()); // self pair
    assert!(predefined_pairs("0 1 2", 4).is_err()); // wrong arity
    assert!(predefined_pairs("a b", 4).is_err()); // not numbers
}

#[test]
fn test_predefined_empty_text_is_empty_set() {
    assert!(predefined_pairs("", 4).unwrap().is_empty());
}
