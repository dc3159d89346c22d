//! Dotted path helpers.
//!
//! A path like `debug.db.url` walks map keys from the root; a segment that
//! parses as a non-negative integer may index into a sequence. The empty path
//! addresses the root.

use crate::domain::error::{DomainError, DomainResult};

/// Marker for "absolute from root" in relative resolution contexts.
pub const ABSOLUTE_PREFIX: char = '^';

/// Path separator.
pub const SEPARATOR: char = '.';

/// Split a dotted path into its segments.
///
/// `""` yields no segments. Empty segments (`a..b`, `.a`, `a.`) are rejected.
pub fn segments(path: &str) -> DomainResult<Vec<&str>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = path.split(SEPARATOR).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(DomainError::invalid_path(path, "empty path segment"));
    }
    Ok(parts)
}

/// Strip the absolute marker, reporting whether it was present.
pub fn strip_absolute(path: &str) -> (bool, &str) {
    match path.strip_prefix(ABSOLUTE_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, path),
    }
}

/// Join a parent path and a child segment.
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}{SEPARATOR}{child}")
    }
}

/// Interpret a segment as a sequence index.
pub fn as_index(segment: &str) -> Option<usize> {
    if segment.chars().all(|c| c.is_ascii_digit()) {
        segment.parse().ok()
    } else {
        None
    }
}

/// True if `path` ends with all of `suffix`'s segments (whole segments only).
pub fn ends_with_segments(path: &str, suffix: &[&str]) -> bool {
    if suffix.is_empty() {
        return false;
    }
    let parts: Vec<&str> = path.split(SEPARATOR).collect();
    parts.len() >= suffix.len() && parts[parts.len() - suffix.len()..] == *suffix
}

/// True if `path` equals `prefix` or lies below it.
pub fn is_within(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || (path.starts_with(prefix) && path[prefix.len()..].starts_with(SEPARATOR))
}
