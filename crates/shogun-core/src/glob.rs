//! Single-segment glob matching for `contract.allowed_files` /
//! `forbidden_files`.
//!
//! `*` matches any run of characters that does not contain `/` — it never
//! crosses a path separator (§3.3). There is no `**`, `?`, or character
//! class support; the patterns are meant to describe "any file directly
//! under this directory" style contracts, not arbitrary shell globs.

/// Returns `true` if `pattern` matches `path` under single-segment `*`
/// semantics: `path` and `pattern` are split on `/`; they must have the same
/// number of segments, and each segment must match literally except where
/// the pattern segment contains `*`, which matches zero or more non-`/`
/// characters within that segment.
#[must_use]
pub fn matches(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    if pattern_segments.len() != path_segments.len() {
        return false;
    }
    pattern_segments
        .iter()
        .zip(path_segments.iter())
        .all(|(pat, seg)| segment_matches(pat, seg))
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == segment;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = segment;

    if let Some(first) = parts.first() {
        if !rest.starts_with(first) {
            return false;
        }
        rest = &rest[first.len()..];
    }
    if let Some(last) = parts.last() {
        if parts.len() > 1 {
            if !rest.ends_with(last) {
                return false;
            }
            rest = &rest[..rest.len() - last.len()];
        }
    }

    for middle in &parts[1.min(parts.len())..parts.len().saturating_sub(1)] {
        if middle.is_empty() {
            continue;
        }
        match rest.find(middle) {
            Some(idx) => rest = &rest[idx + middle.len()..],
            None => return false,
        }
    }
    true
}

/// Returns `true` if `path` matches at least one pattern in `patterns`.
#[must_use]
pub fn matches_any(patterns: &[String], path: &str) -> bool {
    patterns.iter().any(|p| matches(p, path))
}
