use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Unordered image pair, always stored with the smaller index first.
pub type Pair = (u32, u32);

/// Canonical, duplicate-free pair set with deterministic iteration order.
pub type PairSet = BTreeSet<Pair>;

/// All pairs (i, j) with i < j, for n images. Count is n * (n - 1) / 2.
pub fn exhaustive_pairs(n: usize) -> PairSet {
    let mut pairs = PairSet::new();
    for i in 0..n as u32 {
        for j in i + 1..n as u32 {
            pairs.insert((i, j));
        }
    }
    pairs
}

/// Pairs of a temporally ordered sequence: (i, j) with 0 < j - i <= overlap.
pub fn contiguous_with_overlap(n: usize, overlap: usize) -> PairSet {
    let mut pairs = PairSet::new();
    for i in 0..n as u32 {
        for j in i + 1..(i as usize + 1 + overlap).min(n) as u32 {
            pairs.insert((i, j));
        }
    }
    pairs
}

/// Parses an explicit pair list, one `i j` pair per whitespace-separated
/// line. Blank lines and `#` comments are skipped. Malformed entries,
/// self pairs and indices outside [0, n) fail fast rather than being
/// silently dropped.
pub fn predefined_pairs(text: &str, n: usize) -> Result<PairSet> {
    let mut pairs = PairSet::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(Error::Parse(format!(
                "pair list line {}: expected two indices, got {:?}",
                lineno + 1,
                line
            )));
        }
        let i: u32 = fields[0]
            .parse()
            .map_err(|_| Error::Parse(format!("pair list line {}: bad index {:?}", lineno + 1, fields[0])))?;
        let j: u32 = fields[1]
            .parse()
            .map_err(|_| Error::Parse(format!("pair list line {}: bad index {:?}", lineno + 1, fields[1])))?;
        if i == j {
            return Err(Error::Parse(format!(
                "pair list line {}: image {} paired with itself",
                lineno + 1,
                i
            )));
        }
        if i as usize >= n || j as usize >= n {
            return Err(Error::Parse(format!(
                "pair list line {}: index out of range for {} images",
                lineno + 1,
                n
            )));
        }
        pairs.insert((i.min(j), i.max(j)));
    }
    Ok(pairs)
}
