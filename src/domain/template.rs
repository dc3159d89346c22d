//! Template expression syntax: `${{ ACTION:ARG }}`.
//!
//! Only the syntax lives here; actions are dispatched by the template engine.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

pub const OPEN: &str = "${{";
pub const CLOSE: &str = "}}";

/// One expression found in a string scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateExpr {
    /// Byte range of the full `${{ ... }}` text in the scanned string
    pub span: Range<usize>,
    /// The full expression text
    pub raw: String,
    pub action: String,
    /// Argument text, trimmed
    pub arg: String,
}

/// Syntax error while scanning a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSyntaxError {
    pub expression: String,
    pub reason: String,
}

fn inner_regex() -> &'static Regex {
    static INNER: OnceLock<Regex> = OnceLock::new();
    INNER.get_or_init(|| Regex::new(r"(?s)^\s*([A-Za-z_][A-Za-z0-9_]*)\s*:(.*)$").unwrap())
}

/// Cheap check used to pick scalars worth scanning.
pub fn contains_template(text: &str) -> bool {
    text.contains(OPEN)
}

/// Find every expression in `text`, left to right.
pub fn scan(text: &str) -> Result<Vec<TemplateExpr>, TemplateSyntaxError> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(OPEN) {
        let start = cursor + offset;
        let body_start = start + OPEN.len();
        let Some(close_offset) = text[body_start..].find(CLOSE) else {
            return Err(TemplateSyntaxError {
                expression: text[start..].to_string(),
                reason: "missing closing '}}'".to_string(),
            });
        };
        let body_end = body_start + close_offset;
        let end = body_end + CLOSE.len();
        let raw = &text[start..end];
        let body = &text[body_start..body_end];

        if body.contains(OPEN) {
            return Err(TemplateSyntaxError {
                expression: raw.to_string(),
                reason: "nested expression".to_string(),
            });
        }
        let Some(caps) = inner_regex().captures(body) else {
            return Err(TemplateSyntaxError {
                expression: raw.to_string(),
                reason: "expected ACTION:ARG".to_string(),
            });
        };

        found.push(TemplateExpr {
            span: start..end,
            raw: raw.to_string(),
            action: caps[1].to_string(),
            arg: caps[2].trim().to_string(),
        });
        cursor = end;
    }

    Ok(found)
}

/// True if the trimmed text consists of exactly this one expression.
pub fn is_whole_value(text: &str, exprs: &[TemplateExpr]) -> bool {
    match exprs {
        [only] => text.trim() == only.raw,
        _ => false,
    }
}

/// Split an `env` argument into name and optional default at the first `:`.
pub fn split_default(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once(':') {
        Some((name, default)) => (name.trim(), Some(default.trim())),
        None => (arg.trim(), None),
    }
}
