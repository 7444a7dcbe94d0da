//! Three-way line merge
//!
//! The classic diff3 construction: two Myers diffs (base→ours and
//! base→theirs) provide line matchings; base lines matched on both sides
//! are stable anchors, and the regions between anchors are compared as
//! chunks. A chunk changed on one side takes that side; the same change on
//! both sides is taken once; different changes on both sides produce a
//! conflict bracketed by markers:
//!
//! ```text
//! <<<<<<< ours
//! ...our lines...
//! =======
//! ...their lines...
//! >>>>>>> theirs
//! ```

use crate::artifacts::diff::myers::{Edit, MyersDiff};
use bytes::Bytes;
use std::collections::HashMap;

pub const CONFLICT_OURS_MARKER: &str = "<<<<<<< ours";
pub const CONFLICT_SEPARATOR: &str = "=======";
pub const CONFLICT_THEIRS_MARKER: &str = ">>>>>>> theirs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff3Result {
    pub content: Bytes,
    pub clean: bool,
}

/// Merge `ours` and `theirs` relative to their common ancestor `base`
pub fn merge(base: &[u8], ours: &[u8], theirs: &[u8]) -> Diff3Result {
    let base_lines = split_lines(base);
    let our_lines = split_lines(ours);
    let their_lines = split_lines(theirs);

    let our_matches = match_map(&base_lines, &our_lines);
    let their_matches = match_map(&base_lines, &their_lines);

    let mut output: Vec<u8> = Vec::new();
    let mut clean = true;

    // cursors into the three line vectors (0-based)
    let mut b = 0usize;
    let mut o = 0usize;
    let mut t = 0usize;

    loop {
        if b >= base_lines.len() && o >= our_lines.len() && t >= their_lines.len() {
            break;
        }

        // a stable line: the current base line maps to the current line on
        // both sides
        if b < base_lines.len()
            && our_matches.get(&b) == Some(&o)
            && their_matches.get(&b) == Some(&t)
        {
            output.extend_from_slice(base_lines[b]);
            b += 1;
            o += 1;
            t += 1;
            continue;
        }

        // unstable chunk: scan forward to the next base line anchored on
        // both sides
        let mut next_b = b;
        let (next_o, next_t) = loop {
            match next_b < base_lines.len() {
                true => {
                    if let (Some(&matched_o), Some(&matched_t)) =
                        (our_matches.get(&next_b), their_matches.get(&next_b))
                        && matched_o >= o
                        && matched_t >= t
                    {
                        break (matched_o, matched_t);
                    }
                    next_b += 1;
                }
                false => break (our_lines.len(), their_lines.len()),
            }
        };

        let base_chunk = &base_lines[b..next_b];
        let our_chunk = &our_lines[o..next_o];
        let their_chunk = &their_lines[t..next_t];

        if chunks_equal(our_chunk, their_chunk) {
            // both sides made the same change (or neither did)
            emit(&mut output, our_chunk);
        } else if chunks_equal(base_chunk, our_chunk) {
            // only theirs changed
            emit(&mut output, their_chunk);
        } else if chunks_equal(base_chunk, their_chunk) {
            // only ours changed
            emit(&mut output, our_chunk);
        } else {
            clean = false;
            output.extend_from_slice(format!("{CONFLICT_OURS_MARKER}\n").as_bytes());
            emit(&mut output, our_chunk);
            output.extend_from_slice(format!("{CONFLICT_SEPARATOR}\n").as_bytes());
            emit(&mut output, their_chunk);
            output.extend_from_slice(format!("{CONFLICT_THEIRS_MARKER}\n").as_bytes());
        }

        b = next_b;
        o = next_o;
        t = next_t;
    }

    Diff3Result {
        content: Bytes::from(output),
        clean,
    }
}

/// Split into lines keeping each terminator attached
fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (i, &byte) in content.iter().enumerate() {
        if byte == b'\n' {
            lines.push(&content[start..=i]);
            start = i + 1;
        }
    }
    if start < content.len() {
        lines.push(&content[start..]);
    }

    lines
}

/// Map base line index -> other side line index, from the Equal edits of a
/// Myers diff (both converted back to 0-based)
fn match_map(base: &[&[u8]], other: &[&[u8]]) -> HashMap<usize, usize> {
    MyersDiff::new(base, other)
        .diff()
        .into_iter()
        .filter_map(|edit| match edit {
            Edit::Equal { line_a, line_b } => Some((line_a.number - 1, line_b.number - 1)),
            _ => None,
        })
        .collect()
}

fn chunks_equal(a: &[&[u8]], b: &[&[u8]]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

fn emit(output: &mut Vec<u8>, chunk: &[&[u8]]) {
    for line in chunk {
        output.extend_from_slice(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_non_overlapping_edits_merge_cleanly() {
        let base = b"one\ntwo\nthree\n";
        let ours = b"ONE\ntwo\nthree\n";
        let theirs = b"one\ntwo\nTHREE\n";

        let result = merge(base, ours, theirs);
        assert!(result.clean);
        assert_eq!(result.content.as_ref(), b"ONE\ntwo\nTHREE\n");
    }

    #[test]
    fn test_same_change_on_both_sides_is_taken_once() {
        let base = b"a\nb\n";
        let both = b"a\nB\n";

        let result = merge(base, both, both);
        assert!(result.clean);
        assert_eq!(result.content.as_ref(), b"a\nB\n");
    }

    #[test]
    fn test_one_side_unchanged_takes_the_other() {
        let base = b"x\ny\n";
        let theirs = b"x\ny\nz\n";

        let result = merge(base, base, theirs);
        assert!(result.clean);
        assert_eq!(result.content.as_ref(), theirs);
    }

    #[test]
    fn test_competing_edits_produce_markers() {
        let base = b"hello\n";
        let ours = b"main\n";
        let theirs = b"feat\n";

        let result = merge(base, ours, theirs);
        assert!(!result.clean);
        assert_eq!(
            result.content.as_ref(),
            b"<<<<<<< ours\nmain\n=======\nfeat\n>>>>>>> theirs\n"
        );
    }

    #[test]
    fn test_conflict_keeps_surrounding_stable_lines() {
        let base = b"keep\nmid\nend\n";
        let ours = b"keep\nours\nend\n";
        let theirs = b"keep\ntheirs\nend\n";

        let result = merge(base, ours, theirs);
        assert!(!result.clean);
        assert_eq!(
            result.content.as_ref(),
            b"keep\n<<<<<<< ours\nours\n=======\ntheirs\n>>>>>>> theirs\nend\n"
        );
    }

    #[test]
    fn test_both_added_same_file() {
        let result = merge(b"", b"same\n", b"same\n");
        assert!(result.clean);
        assert_eq!(result.content.as_ref(), b"same\n");
    }

    #[test]
    fn test_split_lines_keeps_terminators() {
        let lines = split_lines(b"a\nb");
        assert_eq!(lines, vec![b"a\n".as_slice(), b"b".as_slice()]);
    }
}
