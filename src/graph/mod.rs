//! Graph module — the structural backbone of bgraph.
//!
//! Provides the node/edge data model, the petgraph-backed engine with
//! its indexes, the deterministic builder, and the versioned on-disk
//! format.

pub mod builder;
pub mod engine;
pub mod persistence;
pub mod types;

pub use builder::{
    build_graph, build_tree, build_tree_named, load_tree, BuildOutcome, LoadedTree,
    DEFAULT_BLUEPRINT_NAME, DEPENDENCY_KEYS, SOURCE_DIR_KEYS, SOURCE_EXCLUDE_KEYS,
    SOURCE_KEYS,
};
pub use engine::BuildGraph;
pub use persistence::{
    AttrValue, PersistedEdge, PersistedGraph, PersistedNode, FORMAT_VERSION,
};
pub use types::{EdgeData, EdgeKind, GraphStats, NodeData};
