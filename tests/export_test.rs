use pairwise_matching::export::{adjacency_svg, matches_from_string, matches_to_string};
use pairwise_matching::matching::{IndMatch, PairwiseMatches};

fn sample_matches() -> PairwiseMatches {
    let mut matches = PairwiseMatches::new();
    matches.insert(
        (0, 1),
        vec![
            IndMatch { i: 4, j: 9 },
            IndMatch { i: 1, j: 2 },
            IndMatch { i: 7, j: 0 },
        ],
    );
    matches.insert((0, 3), vec![IndMatch { i: 0, j: 0 }]);
    matches.insert((2, 3), vec![IndMatch { i: 5, j: 5 }, IndMatch { i: 6, j: 6 }]);
    matches
}

#[test]
fn test_round_trip_preserves_pairs_and_order() {
    let original = sample_matches();
    let text = matches_to_string(&original);
    let reloaded = matches_from_string(&text).unwrap();
    // Same pairs, same correspondence sequences, same order.
    assert_eq!(original, reloaded);
    // And a second export is byte-identical.
    assert_eq!(text, matches_to_string(&reloaded));
}

#[test]
fn test_empty_set_round_trips() {
    let empty = PairwiseMatches::new();
    assert_eq!(matches_from_string(&matches_to_string(&empty)).unwrap(), empty);
}

#[test]
fn test_import_rejects_garbage() {
    assert!(matches_from_string("0 1\nnot a count\n").is_err());
    assert!(matches_from_string("0 1\n2\n3 4\n").is_err()); // truncated list
    assert!(matches_from_string("0\n").is_err()); // bad header
}

#[test]
fn test_adjacency_marks_matched_cells() {
    let svg = adjacency_svg(4, &sample_matches());
    // Background rect plus one cell per pair with correspondences.
    assert_eq!(svg.matches("<rect").count(), 1 + 3);
    assert!(svg.contains("fill=\"blue\""));

    let empty = adjacency_svg(4, &PairwiseMatches::new());
    assert_eq!(empty.matches("<rect").count(), 1);
}
