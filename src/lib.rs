//! # bgraph
//!
//! Unified dependency graphs for Android blueprint trees.
//!
//! bgraph parses a tree of blueprint build files, resolves `defaults`
//! merging, glob patterns and cross-module name references, and builds
//! one immutable graph linking every source file to the targets built
//! from it. Queries then answer reachability questions over that graph:
//! which targets consume a file, which files feed a target, and what two
//! targets share.
//!
//! ## Key properties
//!
//! - **Deterministic**: the same tree always produces the same graph,
//!   regardless of parse parallelism.
//! - **Immutable once built**: queries are lock-free reads; any number
//!   may run concurrently.
//! - **Persistent**: graphs survive on disk in a versioned format.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use bgraph::{build_tree, find_dependencies};
//!
//! // Parse every blueprint under the tree and build the graph.
//! let outcome = build_tree(Path::new("aosp")).unwrap();
//!
//! // Which targets consume this file?
//! let report = find_dependencies(&outcome.graph, "main.cc", None).unwrap();
//! for hit in report.hits {
//!     println!("{} ({}) at distance {}", hit.name, hit.module_type, hit.distance);
//! }
//! ```

pub mod defaults;
pub mod error;
pub mod graph;
pub mod parser;
pub mod project;
pub mod query;
pub mod value;

// Re-exports for convenience
pub use error::{BGraphError, BuildDiagnostic, ParseError, Result};

// Data model re-exports
pub use value::{Properties, PropertyValue};

// Pipeline re-exports
pub use defaults::resolve_defaults;
pub use graph::{
    build_graph, build_tree, build_tree_named, load_tree, BuildGraph, BuildOutcome,
    EdgeKind, GraphStats, LoadedTree, NodeData, DEFAULT_BLUEPRINT_NAME, FORMAT_VERSION,
};
pub use parser::{parse_blueprint, ModuleDeclaration, ParsedBlueprint};
pub use project::{FileLister, Project, ProjectId, ProjectSet, WalkLister};

// Query re-exports
pub use query::render::{render_common, render_dependencies, render_sources, OutputMode};
pub use query::{
    find_common, find_dependencies, find_sources, find_target, CommonReport,
    DependencyReport, QueryError, SourceHit, SourceReport, TargetHit,
};
