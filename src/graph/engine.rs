//! The graph engine — petgraph storage plus the indexes every query
//! goes through.
//!
//! A `BuildGraph` is write-once: the builder populates it, calls
//! [`BuildGraph::finish`], and from then on it is only read. Concurrent
//! readers share it freely; nothing here takes a lock.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::types::{EdgeData, EdgeKind, GraphStats, NodeData};
use crate::project::ProjectId;
use crate::value::Properties;

/// The unified dependency graph over one blueprint tree.
#[derive(Debug)]
pub struct BuildGraph {
    /// Directed storage; edges point in the direction of data flow.
    graph: DiGraph<NodeData, EdgeData>,
    /// Name index: target name → node.
    name_index: std::collections::HashMap<String, NodeIndex>,
    /// Path index: full source path → node.
    path_index: std::collections::HashMap<String, NodeIndex>,
    /// All source paths, sorted; backs suffix matching.
    source_paths: Vec<(String, NodeIndex)>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_index: std::collections::HashMap::new(),
            path_index: std::collections::HashMap::new(),
            source_paths: Vec::new(),
        }
    }

    // ─── Construction ───────────────────────────────────────────

    /// Add a target node. The builder guarantees name uniqueness before
    /// calling this.
    pub fn add_target(
        &mut self,
        name: String,
        module_type: String,
        properties: Properties,
    ) -> NodeIndex {
        debug_assert!(!self.name_index.contains_key(&name));
        let idx = self.graph.add_node(NodeData::Target {
            name: name.clone(),
            module_type,
            properties,
        });
        self.name_index.insert(name, idx);
        idx
    }

    /// Add a source node, or reuse the existing node for the same path.
    pub fn intern_source(
        &mut self,
        path: String,
        extension: String,
        project: ProjectId,
    ) -> NodeIndex {
        if let Some(&idx) = self.path_index.get(&path) {
            return idx;
        }
        let idx = self.graph.add_node(NodeData::Source {
            path: path.clone(),
            extension,
            project,
        });
        self.path_index.insert(path.clone(), idx);
        self.source_paths.push((path, idx));
        idx
    }

    /// Add an edge, once: a second identical (from, to) pair is a no-op.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, EdgeData::new(kind));
        }
    }

    /// Seal the graph: sort the suffix table. Call once, after all
    /// nodes and edges are in.
    pub fn finish(&mut self) {
        self.source_paths.sort();
    }

    // ─── Lookup ─────────────────────────────────────────────────

    pub fn node(&self, idx: NodeIndex) -> &NodeData {
        &self.graph[idx]
    }

    /// The target node with exactly this name.
    pub fn target(&self, name: &str) -> Option<NodeIndex> {
        self.name_index.get(name).copied()
    }

    /// The source node with exactly this path.
    pub fn source(&self, path: &str) -> Option<NodeIndex> {
        self.path_index.get(path).copied()
    }

    /// Source nodes whose path equals or ends with the fragment, in
    /// path order.
    pub fn sources_ending_with(&self, fragment: &str) -> Vec<NodeIndex> {
        self.source_paths
            .iter()
            .filter(|(path, _)| path.ends_with(fragment))
            .map(|(_, idx)| *idx)
            .collect()
    }

    /// Neighbors along `dir`, with the connecting edge kind.
    pub fn neighbors(
        &self,
        idx: NodeIndex,
        dir: Direction,
    ) -> impl Iterator<Item = (NodeIndex, EdgeKind)> + '_ {
        self.graph.edges_directed(idx, dir).map(move |edge| {
            let other = match dir {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            };
            (other, edge.weight().kind)
        })
    }

    // ─── Enumeration ────────────────────────────────────────────

    /// All nodes in insertion order (a pure function of tree content
    /// given the builder's project ordering).
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &NodeData)> + '_ {
        self.graph
            .node_indices()
            .map(move |idx| (idx, &self.graph[idx]))
    }

    /// All edges as (from-id, to-id, kind) triples, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, EdgeKind)> + '_ {
        self.graph.edge_references().map(move |edge| {
            (
                self.graph[edge.source()].id(),
                self.graph[edge.target()].id(),
                edge.weight().kind,
            )
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn stats(&self) -> GraphStats {
        let source_count = self.source_paths.len();
        GraphStats {
            total_nodes: self.graph.node_count(),
            total_edges: self.graph.edge_count(),
            source_count,
            target_count: self.graph.node_count() - source_count,
        }
    }
}

impl Default for BuildGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BuildGraph {
        let mut graph = BuildGraph::new();
        let lib = graph.add_target("libfoo".into(), "cc_library".into(), Properties::new());
        let src = graph.intern_source(
            "proj/a.cc".into(),
            "cc".into(),
            ProjectId::new("proj"),
        );
        graph.add_edge(src, lib, EdgeKind::BuildsFrom);
        graph.finish();
        graph
    }

    #[test]
    fn test_lookup_by_name_and_path() {
        let graph = sample();
        assert!(graph.target("libfoo").is_some());
        assert!(graph.target("proj/a.cc").is_none());
        assert!(graph.source("proj/a.cc").is_some());
        assert_eq!(graph.stats().source_count, 1);
        assert_eq!(graph.stats().target_count, 1);
    }

    #[test]
    fn test_intern_source_reuses_nodes() {
        let mut graph = sample();
        let first = graph.source("proj/a.cc").unwrap();
        let again = graph.intern_source(
            "proj/a.cc".into(),
            "cc".into(),
            ProjectId::new("proj"),
        );
        assert_eq!(first, again);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut graph = sample();
        let src = graph.source("proj/a.cc").unwrap();
        let lib = graph.target("libfoo").unwrap();
        graph.add_edge(src, lib, EdgeKind::BuildsFrom);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_suffix_matching() {
        let mut graph = BuildGraph::new();
        graph.intern_source("projA/main.cc".into(), "cc".into(), ProjectId::new("A"));
        graph.intern_source("projB/main.cc".into(), "cc".into(), ProjectId::new("B"));
        graph.intern_source("projA/other.cc".into(), "cc".into(), ProjectId::new("A"));
        graph.finish();

        assert_eq!(graph.sources_ending_with("main.cc").len(), 2);
        assert_eq!(graph.sources_ending_with("projA/main.cc").len(), 1);
        assert_eq!(graph.sources_ending_with("absent.cc").len(), 0);
    }
}
