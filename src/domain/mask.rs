//! Glob-like masks over dotted paths.
//!
//! `*` matches exactly one segment, `**` matches zero or more segments.
//! Inside a segment `*` and `?` behave as wildcards that never cross a dot
//! (`db_*.url`).

use std::fmt;

use regex::Regex;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::path::SEPARATOR;

#[derive(Debug, Clone)]
enum MaskSegment {
    /// `*`
    One,
    /// `**`
    Many,
    Literal(String),
    Pattern(Regex),
}

impl MaskSegment {
    fn matches(&self, segment: &str) -> bool {
        match self {
            MaskSegment::One => true,
            MaskSegment::Many => true,
            MaskSegment::Literal(lit) => lit == segment,
            MaskSegment::Pattern(re) => re.is_match(segment),
        }
    }
}

/// A compiled mask pattern.
#[derive(Debug, Clone)]
pub struct Mask {
    raw: String,
    segments: Vec<MaskSegment>,
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Mask {
    pub fn new(raw: &str) -> DomainResult<Self> {
        let invalid = |reason: &str| DomainError::InvalidMask {
            mask: raw.to_string(),
            reason: reason.to_string(),
        };
        if raw.trim().is_empty() {
            return Err(invalid("empty mask"));
        }
        let mut segments = Vec::new();
        for part in raw.split(SEPARATOR) {
            let segment = match part {
                "" => return Err(invalid("empty segment")),
                "*" => MaskSegment::One,
                "**" => MaskSegment::Many,
                p if p.contains('*') || p.contains('?') => {
                    if p.contains("**") {
                        return Err(invalid("'**' must be a whole segment"));
                    }
                    MaskSegment::Pattern(segment_regex(p).map_err(|e| invalid(&e.to_string()))?)
                }
                p => MaskSegment::Literal(p.to_string()),
            };
            segments.push(segment);
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True if the whole dotted `path` matches this mask.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split(SEPARATOR).collect()
        };
        match_from(&self.segments, &parts)
    }
}

fn match_from(mask: &[MaskSegment], path: &[&str]) -> bool {
    match mask.split_first() {
        None => path.is_empty(),
        Some((MaskSegment::Many, rest)) => {
            (0..=path.len()).any(|skip| match_from(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => segment.matches(head) && match_from(rest, tail),
            None => false,
        },
    }
}

fn segment_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str("[^.]*"),
            '?' => re.push_str("[^.]"),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}

/// Compile several raw masks.
pub fn compile_masks<S: AsRef<str>>(raw: &[S]) -> DomainResult<Vec<Mask>> {
    raw.iter().map(|m| Mask::new(m.as_ref())).collect()
}

/// True if no masks are given or at least one matches.
pub fn any_match(masks: &[Mask], path: &str) -> bool {
    masks.is_empty() || masks.iter().any(|m| m.matches(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("env.**", "env.db.user", true)]
    #[case("env.**", "env", true)]
    #[case("env.**", "prod.db.user", false)]
    #[case("*.db.user", "env.db.user", true)]
    #[case("*.db.user", "a.b.db.user", false)]
    #[case("**.user", "a.b.db.user", true)]
    #[case("**", "", true)]
    #[case("x.**.c", "x.c", true)]
    #[case("x.**.c", "x.a.b.c", true)]
    #[case("db_*.url", "db_main.url", true)]
    #[case("db_*.url", "cache.url", false)]
    #[case("svc?", "svc1", true)]
    #[case("svc?", "svc12", false)]
    fn test_mask_matching(#[case] mask: &str, #[case] path: &str, #[case] expected: bool) {
        let mask = Mask::new(mask).unwrap();
        assert_eq!(mask.matches(path), expected, "{mask} vs {path}");
    }

    #[test]
    fn given_empty_segment_when_compiling_then_rejects() {
        assert!(matches!(
            Mask::new("env..x"),
            Err(DomainError::InvalidMask { .. })
        ));
        assert!(Mask::new("").is_err());
        assert!(Mask::new("a**.b").is_err());
    }

    #[test]
    fn given_no_masks_when_filtering_then_everything_passes() {
        assert!(any_match(&[], "whatever.path"));
    }
}
