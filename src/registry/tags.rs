//! Tag policy: pinned-vs-floating classification and the ordering used for
//! advisory tag listings.
//!
//! Both are heuristics kept as plain functions so the rules stay easy to
//! test and tune.

use std::cmp::Ordering;

/// Tags that registries routinely repoint; never considered pinned.
const FLOATING_TAGS: [&str; 10] = [
    "latest", "stable", "main", "master", "edge", "dev", "nightly", "beta", "alpha", "rc",
];

/// Tags listed first, in this order, by [`sort_tags`].
pub const PRIORITY_TAGS: [&str; 5] = ["latest", "stable", "lts", "main", "master"];

/// Maximum number of tags returned by a listing.
pub const MAX_LISTED_TAGS: usize = 50;

/// Classify a tag as a pinned release (`1.22.4`, `v2.0.0-rc1`) or a
/// floating one (`latest`, `nightly`). Ambiguous tags count as floating.
#[must_use]
pub fn is_pinned_version(tag: &str) -> bool {
    let lower = tag.to_ascii_lowercase();
    if FLOATING_TAGS.contains(&lower.as_str()) {
        return false;
    }

    let has_digit = tag.chars().any(|c| c.is_ascii_digit());
    has_digit && (tag.contains('.') || tag.contains('-') || starts_with_version_number(tag))
}

/// Matches `^v?\d`.
fn starts_with_version_number(tag: &str) -> bool {
    let rest = tag.strip_prefix('v').unwrap_or(tag);
    rest.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Order tags for display: priority tags first, then the rest newest-looking
/// first using numeric-aware comparison, truncated to [`MAX_LISTED_TAGS`].
#[must_use]
pub fn sort_tags(mut tags: Vec<String>) -> Vec<String> {
    tags.sort_by(|a, b| compare_tags(a, b));
    tags.truncate(MAX_LISTED_TAGS);
    tags
}

fn compare_tags(a: &str, b: &str) -> Ordering {
    let rank = |t: &str| PRIORITY_TAGS.iter().position(|p| *p == t);
    match (rank(a), rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => natural_cmp(b, a),
    }
}

/// Compare strings treating runs of ASCII digits as numbers, so `1.10`
/// sorts after `1.9`.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (is_numeric(l), is_numeric(r)) {
                    (true, true) => compare_numeric(l, r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_numeric(chunk: &str) -> bool {
    chunk.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

fn compare_numeric(l: &str, r: &str) -> Ordering {
    let l = l.trim_start_matches('0');
    let r = r.trim_start_matches('0');
    l.len().cmp(&r.len()).then_with(|| l.cmp(r))
}

/// Splits a string into alternating digit / non-digit runs.
struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.as_bytes().first()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .bytes()
            .position(|b| b.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}
