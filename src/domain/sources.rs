//! Source documents: YAML and `.env` text into raw nodes.
//!
//! Pure parsing only, reading files is done by the caller.

use std::fmt;

use indexmap::IndexMap;
use serde_yaml::Value;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{Node, NodeMap, Scalar};

/// Kind of a merged source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Yaml,
    EnvFile,
    Mapping,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Yaml => write!(f, "yaml"),
            SourceKind::EnvFile => write!(f, "env"),
            SourceKind::Mapping => write!(f, "mapping"),
        }
    }
}

/// Record of one source merged into a tree, in merge order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub name: String,
    pub kind: SourceKind,
}

/// Parse a YAML document into a node of any shape.
///
/// An empty document is an empty map. Empty mapping keys are rejected.
pub fn parse_yaml_document(content: &str, source_name: &str) -> DomainResult<Node> {
    if content.trim().is_empty() {
        return Ok(Node::default());
    }
    let value: Value = serde_yaml::from_str(content).map_err(|e| DomainError::SourceFormat {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })?;
    let node = match Node::from_yaml_value(value)? {
        Node::Scalar(Scalar::Null) => Node::default(),
        node => node,
    };
    if let Some(parent) = node.empty_key_parent() {
        return Err(DomainError::empty_key(source_name, &parent));
    }
    Ok(node)
}

/// Parse a YAML document that must be a mapping at the top level.
pub fn parse_yaml_source(content: &str, source_name: &str) -> DomainResult<Node> {
    let node = parse_yaml_document(content, source_name)?;
    if !node.is_map() {
        return Err(DomainError::SourceFormat {
            source_name: source_name.to_string(),
            message: "top level of a configuration source must be a mapping".to_string(),
        });
    }
    Ok(node)
}

/// Parse `.env` content into ordered `KEY -> value` pairs.
///
/// Accepts `KEY=value` and `export KEY=value`; blank lines and `#` comments
/// are skipped, surrounding quotes and trailing comments are stripped.
pub fn parse_env_document(
    content: &str,
    source_name: &str,
) -> DomainResult<IndexMap<String, String>> {
    let mut variables = IndexMap::new();

    for (lineno, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let rest = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        match parse_env_line(rest) {
            Some((key, value)) if !key.is_empty() => {
                variables.insert(key.to_string(), value);
            }
            _ => {
                return Err(DomainError::SourceFormat {
                    source_name: source_name.to_string(),
                    message: format!("line {}: expected KEY=VALUE", lineno + 1),
                })
            }
        }
    }

    Ok(variables)
}

/// Turn env pairs into a flat map node of string scalars.
pub fn env_to_node(variables: IndexMap<String, String>) -> Node {
    Node::Map(
        variables
            .into_iter()
            .map(|(k, v)| (k, Node::Scalar(Scalar::Str(v))))
            .collect::<NodeMap>(),
    )
}

/// Parse a single environment variable line.
/// Returns (key, value) with trailing comments and quotes stripped from value.
fn parse_env_line(line: &str) -> Option<(&str, String)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    let value = strip_trailing_comment(value);
    let value = strip_quotes(value);

    Some((key, value))
}

/// Strip trailing comment from a value, respecting quotes.
/// `'value'  # comment` → `'value'`
/// `'val#ue'` → `'val#ue'`
fn strip_trailing_comment(s: &str) -> &str {
    let s = s.trim();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for (i, b) in s.bytes().enumerate() {
        match b {
            b'\'' if !in_double_quote => in_single_quote = !in_single_quote,
            b'"' if !in_single_quote => in_double_quote = !in_double_quote,
            b'#' if !in_single_quote && !in_double_quote => {
                return s[..i].trim_end();
            }
            _ => {}
        }
    }
    s
}

/// Strip surrounding quotes (single or double) from a value.
fn strip_quotes(s: &str) -> String {
    let s = s.trim();
    let quoted = (s.starts_with('"') && s.ends_with('"'))
        || (s.starts_with('\'') && s.ends_with('\''));
    if quoted && s.len() >= 2 {
        return s[1..s.len() - 1].to_string();
    }
    s.to_string()
}
