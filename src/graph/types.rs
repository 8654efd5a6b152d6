//! Core types for the unified dependency graph.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::project::ProjectId;
use crate::value::Properties;

/// The kind of a relationship in the graph.
///
/// Edges point in the direction of data flow: a source feeds the target
/// built from it, a library feeds the modules that link against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Source → Target: the target lists this file after glob and
    /// defaults resolution.
    BuildsFrom,
    /// Target → Target: the destination names the origin in one of its
    /// dependency properties.
    DependsOn,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::BuildsFrom => write!(f, "builds_from"),
            EdgeKind::DependsOn => write!(f, "depends_on"),
        }
    }
}

/// Data stored on a graph edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeData {
    pub kind: EdgeKind,
}

impl EdgeData {
    pub fn new(kind: EdgeKind) -> Self {
        Self { kind }
    }
}

/// Data stored in a graph node.
///
/// Node identity is the path for sources and the name for targets; the
/// two share one namespace of identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeData {
    /// A source file contributing to at least one target.
    Source {
        /// Tree-relative, stable path.
        path: String,
        /// File extension without the dot (empty if none).
        extension: String,
        /// Project the file belongs to.
        project: ProjectId,
    },
    /// A declared module.
    Target {
        /// Globally unique module name.
        name: String,
        /// The declaring keyword, e.g. `cc_library`.
        module_type: String,
        /// Post-defaults-merge property bag.
        properties: Properties,
    },
}

impl NodeData {
    /// The identifier this node occupies in the shared namespace.
    pub fn id(&self) -> &str {
        match self {
            NodeData::Source { path, .. } => path,
            NodeData::Target { name, .. } => name,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            NodeData::Source { .. } => "source",
            NodeData::Target { .. } => "target",
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, NodeData::Source { .. })
    }

    pub fn is_target(&self) -> bool {
        matches!(self, NodeData::Target { .. })
    }
}

/// Statistics about a built graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub source_count: usize,
    pub target_count: usize,
}
