//! Ownership addressing: re-findable textual locations for instances
//! inside a hierarchical container.
//!
//! A path is the owning root's display name followed by the chain of
//! sibling indices leading down to the entity, `Root/2/0/1`. An entity
//! with no parent addresses itself by bare name. Paths are only valid
//! against the load they were computed from; the indices silently shift if
//! the hierarchy is reordered between compute and resolve, which is why
//! the plan builder recomputes them on every refresh and the executor
//! resolves them against a freshly reloaded root.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::{ContainerGraph, NodeId};

const SEPARATOR: char = '/';

/// String-encoded index-chain address of an entity within one container
/// load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerPath(String);

impl OwnerPath {
    pub fn new(path: impl Into<String>) -> Self {
        OwnerPath(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the path addresses a parentless entity by bare name.
    pub fn is_root_level(&self) -> bool {
        !self.0.contains(SEPARATOR)
    }
}

impl fmt::Display for OwnerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OwnerPathError {
    #[error("owner path {path:?} has malformed segment {segment:?}")]
    MalformedSegment { path: String, segment: String },
    #[error("owner path {path:?} index {index} out of range under {node:?}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        node: String,
    },
    #[error("no top-level entity named {name:?} for owner path {path:?}")]
    RootNotFound { path: String, name: String },
}

/// Compute the address of `node` within its container.
pub fn owner_path<G>(graph: &G, node: NodeId) -> OwnerPath
where
    G: ContainerGraph + ?Sized,
{
    let Some(parent) = graph.parent(node) else {
        return OwnerPath(graph.node_name(node));
    };

    let mut segments = vec![graph.sibling_index(node).to_string()];
    let mut current = parent;
    while let Some(above) = graph.parent(current) {
        segments.push(graph.sibling_index(current).to_string());
        current = above;
    }
    segments.push(graph.node_name(current));
    segments.reverse();
    OwnerPath(segments.join("/"))
}

/// Walk a previously computed path down from `root`. The first segment is
/// the root's display name and is skipped; the rest are child indices.
pub fn resolve_in_root<G>(
    graph: &G,
    root: NodeId,
    path: &OwnerPath,
) -> Result<NodeId, OwnerPathError>
where
    G: ContainerGraph + ?Sized,
{
    let mut node = root;
    for segment in path.as_str().split(SEPARATOR).skip(1) {
        if segment.is_empty() {
            continue;
        }
        let index: usize =
            segment
                .parse()
                .map_err(|_| OwnerPathError::MalformedSegment {
                    path: path.as_str().to_string(),
                    segment: segment.to_string(),
                })?;
        node = graph
            .child_at(node, index)
            .ok_or_else(|| OwnerPathError::IndexOutOfRange {
                path: path.as_str().to_string(),
                index,
                node: graph.node_name(node),
            })?;
    }
    Ok(node)
}

/// Scene-side resolution: a separator-free path names a top-level entity
/// directly; otherwise the prefix before the first separator selects the
/// top-level entity and the index chain resolves beneath it.
pub fn resolve_among_top_level<G>(graph: &G, path: &OwnerPath) -> Result<NodeId, OwnerPathError>
where
    G: ContainerGraph + ?Sized,
{
    let raw = path.as_str();
    let name = match raw.find(SEPARATOR) {
        Some(first) => &raw[..first],
        None => raw,
    };
    let root = graph
        .top_level()
        .into_iter()
        .find(|node| graph.node_name(*node) == name)
        .ok_or_else(|| OwnerPathError::RootNotFound {
            path: raw.to_string(),
            name: name.to_string(),
        })?;
    if name.len() == raw.len() {
        return Ok(root);
    }
    resolve_in_root(graph, root, path)
}
