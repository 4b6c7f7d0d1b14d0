use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::matching::{IndMatch, PairwiseMatches};

/// Serializes a match set to its stable text form. Per pair: a header
/// line `i j`, a count line, then one `a b` line per correspondence.
/// Pairs are emitted in canonical ascending order and correspondences in
/// their stored order, so export and re-import round-trip exactly.
pub fn matches_to_string(matches: &PairwiseMatches) -> String {
    let mut out = String::new();
    for ((i, j), list) in matches {
        let _ = writeln!(out, "{} {}", i, j);
        let _ = writeln!(out, "{}", list.len());
        for m in list {
            let _ = writeln!(out, "{} {}", m.i, m.j);
        }
    }
    out
}

/// Inverse of `matches_to_string`.
pub fn matches_from_string(text: &str) -> Result<PairwiseMatches> {
    let mut matches = PairwiseMatches::new();
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    while let Some(header) = lines.next() {
        let pair = parse_two(header)?;
        let count: usize = lines
            .next()
            .ok_or_else(|| Error::Parse(format!("pair {:?}: missing count line", pair)))?
            .trim()
            .parse()
            .map_err(|_| Error::Parse(format!("pair {:?}: bad count line", pair)))?;
        let mut list = Vec::with_capacity(count);
        for _ in 0..count {
            let (a, b) = parse_two(lines.next().ok_or_else(|| {
                Error::Parse(format!("pair {:?}: truncated correspondence list", pair))
            })?)?;
            list.push(IndMatch { i: a, j: b });
        }
        matches.insert(pair, list);
    }
    Ok(matches)
}

fn parse_two(line: &str) -> Result<(u32, u32)> {
    let mut it = line.split_whitespace();
    let a = it
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::Parse(format!("expected two indices, got {:?}", line)))?;
    let b = it
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::Parse(format!("expected two indices, got {:?}", line)))?;
    if it.next().is_some() {
        return Err(Error::Parse(format!("expected two indices, got {:?}", line)));
    }
    Ok((a, b))
}

const CELL: usize = 5;

/// Renders the n x n adjacency diagnostic: cell (i, j) is filled when the
/// pair has at least one correspondence in the match set.
pub fn adjacency_svg(n: usize, matches: &PairwiseMatches) -> String {
    let side = n * CELL;
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{side}\" height=\"{side}\">"
    );
    let _ = writeln!(
        svg,
        "  <rect width=\"{side}\" height=\"{side}\" fill=\"white\" stroke=\"black\"/>"
    );
    for ((i, j), list) in matches {
        if list.is_empty() {
            continue;
        }
        let _ = writeln!(
            svg,
            "  <rect x=\"{}\" y=\"{}\" width=\"{CELL}\" height=\"{CELL}\" fill=\"blue\"/>",
            *j as usize * CELL,
            *i as usize * CELL,
        );
    }
    let _ = writeln!(svg, "</svg>");
    svg
}
