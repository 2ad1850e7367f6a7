//! Query matching over flagged lines.
//!
//! Only lines that hold a flag are searched. Matching is case-insensitive
//! and collects every non-overlapping occurrence per line, scanning lines
//! in ascending order.
//!
//! Columns are character offsets into the lowercased line, which equal the
//! original offsets for any text whose lowercase form has the same length.

use std::ops::Range;

use serde::Serialize;

/// One occurrence of the query on a flagged line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub line: usize,
    /// Start column (inclusive).
    pub start: usize,
    /// End column (exclusive).
    pub end: usize,
}

/// Find every occurrence of `query` on the given `(line, text)` pairs.
///
/// `lines` must be in ascending line order; the result follows it. An
/// empty query matches nothing.
pub fn find_matches<'a, I>(lines: I, query: &str) -> Vec<SearchMatch>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for (line, text) in lines {
        let haystack = text.to_lowercase();
        let mut from = 0;
        while let Some(offset) = haystack[from..].find(&needle) {
            let byte_start = from + offset;
            let byte_end = byte_start + needle.len();
            let start = haystack[..byte_start].chars().count();
            let len = needle.chars().count();
            matches.push(SearchMatch {
                line,
                start,
                end: start + len,
            });
            from = byte_end;
        }
    }
    matches
}

/// Distinct matched lines, ascending.
pub fn matched_lines(matches: &[SearchMatch]) -> Vec<usize> {
    let mut lines: Vec<usize> = matches.iter().map(|m| m.line).collect();
    lines.dedup();
    lines
}

/// True if any match lies on a line inside `viewport` (end-exclusive).
pub fn any_visible(matches: &[SearchMatch], viewport: &Range<usize>) -> bool {
    matches.iter().any(|m| viewport.contains(&m.line))
}

/// The match whose line is nearest `cursor_line`.
///
/// Ties keep the earliest match in scan order: a later match replaces the
/// current pick only if it is strictly closer.
pub fn nearest_match(matches: &[SearchMatch], cursor_line: usize) -> Option<&SearchMatch> {
    let mut best: Option<(&SearchMatch, usize)> = None;
    for m in matches {
        let distance = m.line.abs_diff(cursor_line);
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((m, distance)),
        }
    }
    best.map(|(m, _)| m)
}
