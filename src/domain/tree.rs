//! Path-addressable configuration tree.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::mask::{any_match, Mask};
use crate::domain::node::{Node, NodeMap, Scalar};
use crate::domain::path::{self, as_index, ends_with_segments, join, segments, strip_absolute};
use crate::domain::sources::{SourceKind, SourceRecord};
use crate::domain::template::contains_template;

/// Hierarchical configuration built from merged sources.
///
/// The root is always a map. Paths are dotted (`debug.db.url`); a leading
/// `^` is accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    root: Node,
    sources: Vec<SourceRecord>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a map node.
    pub fn from_node(root: Node) -> DomainResult<Self> {
        let mut tree = Self::new();
        tree.merge_source("mapping", SourceKind::Mapping, root)?;
        Ok(tree)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    /// Sources merged so far, oldest first.
    pub fn sources(&self) -> &[SourceRecord] {
        &self.sources
    }

    /// Deep-merge a raw mapping into the root; later values win.
    ///
    /// Rejects non-map roots and maps with an empty key anywhere below.
    pub fn merge(&mut self, raw: Node) -> DomainResult<()> {
        self.merge_named("merge", raw)
    }

    /// Merge and record a named source.
    #[instrument(level = "debug", skip(self, raw))]
    pub fn merge_source(&mut self, name: &str, kind: SourceKind, raw: Node) -> DomainResult<()> {
        self.merge_named(name, raw)?;
        self.sources.push(SourceRecord {
            name: name.to_string(),
            kind,
        });
        debug!("merged source {} ({}), {} total", name, kind, self.sources.len());
        Ok(())
    }

    fn merge_named(&mut self, source_name: &str, raw: Node) -> DomainResult<()> {
        if !raw.is_map() {
            return Err(DomainError::SourceFormat {
                source_name: source_name.to_string(),
                message: "top level of a configuration source must be a mapping".to_string(),
            });
        }
        if let Some(parent) = raw.empty_key_parent() {
            return Err(DomainError::empty_key(source_name, &parent));
        }
        self.root.merge(raw);
        Ok(())
    }

    pub fn get(&self, path: &str) -> DomainResult<&Node> {
        let (_, path) = strip_absolute(path);
        let mut current = &self.root;
        for segment in segments(path)? {
            current = current
                .child(segment)
                .ok_or_else(|| DomainError::path_not_found(path))?;
        }
        Ok(current)
    }

    pub fn get_mut(&mut self, path: &str) -> DomainResult<&mut Node> {
        let (_, path) = strip_absolute(path);
        let mut current = &mut self.root;
        for segment in segments(path)? {
            current = current
                .child_mut(segment)
                .ok_or_else(|| DomainError::path_not_found(path))?;
        }
        Ok(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Write `value` at `path`, creating intermediate maps.
    ///
    /// Scalars (and sequences addressed by a non-index segment) standing in the
    /// way are replaced by maps. An index equal to a sequence's length appends.
    pub fn set(&mut self, path: &str, value: impl Into<Node>) -> DomainResult<()> {
        let value = value.into();
        let (_, path) = strip_absolute(path);
        let segs = segments(path)?;
        let Some((last, parents)) = segs.split_last() else {
            if !value.is_map() {
                return Err(DomainError::invalid_path(path, "root must be a mapping"));
            }
            self.root = value;
            return Ok(());
        };

        let mut current = &mut self.root;
        for segment in parents {
            current = descend_or_create(current, segment, path)?;
        }
        *descend_or_create(current, last, path)? = value;
        trace!("set {}", path);
        Ok(())
    }

    /// Remove and return the node at `path`.
    pub fn remove(&mut self, path: &str) -> DomainResult<Node> {
        let (_, path) = strip_absolute(path);
        let segs = segments(path)?;
        let Some((last, parents)) = segs.split_last() else {
            return Err(DomainError::invalid_path(path, "cannot remove the root"));
        };
        let parent = self.get_mut(&parents.join("."))?;
        let removed = match parent {
            Node::Map(map) => map.shift_remove(*last),
            Node::Seq(items) => match as_index(last) {
                Some(idx) if idx < items.len() => Some(items.remove(idx)),
                _ => None,
            },
            Node::Scalar(_) => None,
        };
        removed.ok_or_else(|| DomainError::path_not_found(path))
    }

    /// Independent copy of the map at `path`.
    ///
    /// The addressed node must be a map, since a tree's root always is.
    /// Sequences and scalars are copied with `get(path)?.clone()` or
    /// converted with [`ConfigTree::extract`]; anything else is `InvalidPath`.
    pub fn subtree(&self, path: &str) -> DomainResult<ConfigTree> {
        let node = self.get(path)?;
        if !node.is_map() {
            return Err(DomainError::invalid_path(path, "subtree root must be a mapping"));
        }
        Ok(ConfigTree {
            root: node.clone(),
            sources: self.sources.clone(),
        })
    }

    /// Convert the node at `path` into a typed model.
    pub fn extract<T: DeserializeOwned>(&self, path: &str) -> DomainResult<T> {
        self.get(path)?.to(path)
    }

    /// Convert the whole tree into a typed model.
    pub fn to<T: DeserializeOwned>(&self) -> DomainResult<T> {
        self.root.to("")
    }

    /// Top-level keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys()
    }

    /// Top-level values.
    pub fn values(&self) -> impl Iterator<Item = &Node> {
        self.root.values()
    }

    /// Top-level key/value pairs.
    pub fn items(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.root.items()
    }

    /// Dotted keys down to `depth` segments; `None` yields every leaf path.
    ///
    /// Empty containers count as leaves. The iterator works on a snapshot
    /// taken now, so later writes do not show up in it.
    pub fn paths(&self, depth: Option<usize>) -> Paths {
        let mut out = Vec::new();
        collect_paths(&self.root, "", 0, depth, &mut out);
        Paths {
            inner: out.into_iter(),
        }
    }

    /// Every scalar leaf by dotted path, depth-first. Sequence elements use
    /// their index as segment; empty containers are skipped.
    pub fn flatten(&self) -> IndexMap<String, Scalar> {
        let mut out = IndexMap::new();
        flatten_into(&self.root, "", &mut out);
        out
    }

    /// Every node below the root with its path, pre-order, in natural order.
    pub fn walk(&self) -> Vec<(String, &Node)> {
        let mut out = Vec::new();
        walk_into(&self.root, "", &mut out);
        out
    }

    /// Nodes whose path ends with the segments of `suffix`, restricted to
    /// paths matching at least one of `masks` (none means no restriction).
    ///
    /// Results keep natural order: map insertion order (source-merge order),
    /// then depth-first.
    pub fn find_by_suffix(&self, suffix: &str, masks: &[Mask]) -> DomainResult<Vec<(String, &Node)>> {
        let wanted = segments(suffix)?;
        if wanted.is_empty() {
            return Err(DomainError::invalid_path(suffix, "empty suffix"));
        }
        Ok(self
            .walk()
            .into_iter()
            .filter(|(p, _)| any_match(masks, p) && ends_with_segments(p, &wanted))
            .collect())
    }

    /// Paths of string scalars at or below `prefix` that hold a template.
    pub fn template_paths(&self, prefix: &str) -> Vec<String> {
        let (_, prefix) = strip_absolute(prefix);
        let Ok(start) = self.get(prefix) else {
            return Vec::new();
        };
        let mut nodes = vec![(prefix.to_string(), start)];
        walk_into(start, prefix, &mut nodes);
        nodes
            .into_iter()
            .filter(|(p, n)| path::is_within(p, prefix) && n.as_str().is_some_and(contains_template))
            .map(|(p, _)| p)
            .collect()
    }

    /// Render the tree as YAML text.
    pub fn to_yaml_string(&self) -> DomainResult<String> {
        self.root.to_yaml_string()
    }
}

/// Snapshot iterator over dotted paths.
#[derive(Debug, Clone)]
pub struct Paths {
    inner: std::vec::IntoIter<String>,
}

impl Iterator for Paths {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Paths {}

fn descend_or_create<'a>(node: &'a mut Node, segment: &str, full: &str) -> DomainResult<&'a mut Node> {
    let index = as_index(segment);
    if let (Some(len), Some(idx)) = (node.as_seq().map(<[Node]>::len), index) {
        if idx > len {
            return Err(DomainError::invalid_path(
                full,
                format!("index {idx} out of range for sequence of length {len}"),
            ));
        }
    } else if !node.is_map() {
        *node = Node::Map(NodeMap::new());
    }

    match node {
        Node::Seq(items) => {
            let idx = index.unwrap_or(items.len());
            if idx == items.len() {
                items.push(Node::default());
            }
            Ok(&mut items[idx])
        }
        Node::Map(map) => Ok(map.entry(segment.to_string()).or_default()),
        Node::Scalar(_) => Err(DomainError::invalid_path(full, "cannot descend into a scalar")),
    }
}

fn children(node: &Node) -> Vec<(String, &Node)> {
    match node {
        Node::Map(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Node::Seq(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        Node::Scalar(_) => Vec::new(),
    }
}

fn walk_into<'a>(node: &'a Node, prefix: &str, out: &mut Vec<(String, &'a Node)>) {
    for (key, child) in children(node) {
        let child_path = join(prefix, &key);
        out.push((child_path.clone(), child));
        walk_into(child, &child_path, out);
    }
}

fn collect_paths(node: &Node, prefix: &str, level: usize, depth: Option<usize>, out: &mut Vec<String>) {
    for (key, child) in children(node) {
        let child_path = join(prefix, &key);
        let is_leaf = children(child).is_empty();
        if is_leaf || depth == Some(level + 1) {
            out.push(child_path);
        } else {
            collect_paths(child, &child_path, level + 1, depth, out);
        }
    }
}

fn flatten_into(node: &Node, prefix: &str, out: &mut IndexMap<String, Scalar>) {
    for (key, child) in children(node) {
        let child_path = join(prefix, &key);
        match child {
            Node::Scalar(s) => {
                out.insert(child_path, s.clone());
            }
            container => flatten_into(container, &child_path, out),
        }
    }
}
