//! Query engine — read-only traversal over a completed graph.
//!
//! Ambiguity is data, not control flow: every operation returns a typed
//! result with distinct `NotFound` / `TooManyNodes` failures so callers
//! can branch without catching anything. Nothing here mutates the graph,
//! so any number of queries may run concurrently against one instance.

pub mod render;

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use petgraph::Direction;
use serde::Serialize;
use thiserror::Error;

use crate::graph::{BuildGraph, NodeData};
use crate::project::ProjectId;

/// Typed query failures. Neither is fatal to the query session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("no node matches `{0}`")]
    NotFound(String),
    /// Reported with the match count so the caller can narrow the
    /// query with a longer path fragment.
    #[error("{count} nodes match `{query}`; narrow the query with a longer path fragment")]
    TooManyNodes { query: String, count: usize },
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// A target reached from a query origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetHit {
    pub name: String,
    pub module_type: String,
    /// Hop count from the origin (shortest path).
    pub distance: usize,
}

/// A source file reached from a query origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceHit {
    pub path: String,
    pub extension: String,
    pub project: ProjectId,
    /// Hop count from the origin (shortest path).
    pub distance: usize,
}

/// Result of [`find_dependencies`].
#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    /// The fragment the caller asked about.
    pub query: String,
    /// Full path of the resolved origin source.
    pub origin: String,
    pub radius: Option<usize>,
    /// Ascending distance, ties broken by name.
    pub hits: Vec<TargetHit>,
}

/// Result of [`find_sources`].
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub target: String,
    /// Sorted by path.
    pub hits: Vec<SourceHit>,
}

/// Result of [`find_common`].
#[derive(Debug, Clone, Serialize)]
pub struct CommonReport {
    pub target_a: String,
    pub target_b: String,
    /// Intersection of both source sets; distance is the minimum of
    /// the two per-target distances.
    pub hits: Vec<SourceHit>,
}

/// Locate the nearest target reachable from a source path fragment.
///
/// An exact full-path match resolves immediately no matter how many
/// other paths share the fragment as a suffix. Otherwise the fragment
/// must select exactly one source — or, failing that, exactly one of
/// the matched sources must reach a target within `radius`.
pub fn find_target(
    graph: &BuildGraph,
    fragment: &str,
    radius: usize,
) -> QueryResult<TargetHit> {
    if let Some(idx) = graph.source(fragment) {
        return nearest_target(graph, idx, radius)
            .ok_or_else(|| QueryError::NotFound(fragment.to_string()));
    }

    let candidates = graph.sources_ending_with(fragment);
    match candidates.len() {
        0 => Err(QueryError::NotFound(fragment.to_string())),
        1 => nearest_target(graph, candidates[0], radius)
            .ok_or_else(|| QueryError::NotFound(fragment.to_string())),
        count => {
            let mut reached: Vec<TargetHit> = candidates
                .iter()
                .filter_map(|&idx| nearest_target(graph, idx, radius))
                .collect();
            if reached.len() == 1 {
                Ok(reached.remove(0))
            } else {
                Err(QueryError::TooManyNodes {
                    query: fragment.to_string(),
                    count,
                })
            }
        }
    }
}

/// Every target reachable from the resolved source, with its shortest
/// hop distance. `radius` bounds the walk; `None` walks the whole
/// reachable subgraph.
pub fn find_dependencies(
    graph: &BuildGraph,
    source_query: &str,
    radius: Option<usize>,
) -> QueryResult<DependencyReport> {
    let origin = resolve_source(graph, source_query)?;
    let distances = bfs_distances(graph, origin, Direction::Outgoing, radius);

    let mut hits: Vec<TargetHit> = distances
        .iter()
        .filter_map(|(&idx, &distance)| match graph.node(idx) {
            NodeData::Target {
                name, module_type, ..
            } => Some(TargetHit {
                name: name.clone(),
                module_type: module_type.clone(),
                distance,
            }),
            NodeData::Source { .. } => None,
        })
        .collect();
    hits.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.name.cmp(&b.name)));

    Ok(DependencyReport {
        query: source_query.to_string(),
        origin: graph.node(origin).id().to_string(),
        radius,
        hits,
    })
}

/// Every source file feeding the named target, walking dependency
/// edges backward transitively.
pub fn find_sources(graph: &BuildGraph, target_query: &str) -> QueryResult<SourceReport> {
    let origin = graph
        .target(target_query)
        .ok_or_else(|| QueryError::NotFound(target_query.to_string()))?;
    let distances = bfs_distances(graph, origin, Direction::Incoming, None);

    let mut hits: Vec<SourceHit> = distances
        .iter()
        .filter_map(|(&idx, &distance)| match graph.node(idx) {
            NodeData::Source {
                path,
                extension,
                project,
            } => Some(SourceHit {
                path: path.clone(),
                extension: extension.clone(),
                project: project.clone(),
                distance,
            }),
            NodeData::Target { .. } => None,
        })
        .collect();
    hits.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(SourceReport {
        target: target_query.to_string(),
        hits,
    })
}

/// The source files two targets share, annotated with the minimum of
/// the two distances-from-origin.
pub fn find_common(
    graph: &BuildGraph,
    target_a: &str,
    target_b: &str,
) -> QueryResult<CommonReport> {
    let sources_a = find_sources(graph, target_a)?;
    let sources_b = find_sources(graph, target_b)?;

    let by_path: HashMap<&str, &SourceHit> = sources_b
        .hits
        .iter()
        .map(|hit| (hit.path.as_str(), hit))
        .collect();

    let hits = sources_a
        .hits
        .iter()
        .filter_map(|hit| {
            by_path.get(hit.path.as_str()).map(|other| SourceHit {
                distance: hit.distance.min(other.distance),
                ..hit.clone()
            })
        })
        .collect();

    Ok(CommonReport {
        target_a: target_a.to_string(),
        target_b: target_b.to_string(),
        hits,
    })
}

/// Resolve a path fragment to exactly one source node.
fn resolve_source(graph: &BuildGraph, fragment: &str) -> QueryResult<NodeIndex> {
    if let Some(idx) = graph.source(fragment) {
        return Ok(idx);
    }
    let candidates = graph.sources_ending_with(fragment);
    match candidates.len() {
        0 => Err(QueryError::NotFound(fragment.to_string())),
        1 => Ok(candidates[0]),
        count => Err(QueryError::TooManyNodes {
            query: fragment.to_string(),
            count,
        }),
    }
}

/// The nearest reachable target within `radius` hops; distance ties go
/// to the lexically smallest name.
fn nearest_target(graph: &BuildGraph, origin: NodeIndex, radius: usize) -> Option<TargetHit> {
    let distances = bfs_distances(graph, origin, Direction::Outgoing, Some(radius));
    distances
        .iter()
        .filter_map(|(&idx, &distance)| match graph.node(idx) {
            NodeData::Target {
                name, module_type, ..
            } => Some(TargetHit {
                name: name.clone(),
                module_type: module_type.clone(),
                distance,
            }),
            NodeData::Source { .. } => None,
        })
        .min_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.name.cmp(&b.name)))
}

/// Breadth-first distances from `origin` along `dir`. A node already
/// visited at a shorter distance is never revisited. The origin itself
/// is included at distance zero.
pub(crate) fn bfs_distances(
    graph: &BuildGraph,
    origin: NodeIndex,
    dir: Direction,
    radius: Option<usize>,
) -> HashMap<NodeIndex, usize> {
    let mut distances: HashMap<NodeIndex, usize> = HashMap::new();
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();

    visited.insert(origin);
    distances.insert(origin, 0);
    queue.push_back((origin, 0));

    while let Some((idx, distance)) = queue.pop_front() {
        if radius.is_some_and(|r| distance >= r) {
            continue;
        }
        for (next, _) in graph.neighbors(idx, dir) {
            if visited.insert(next) {
                distances.insert(next, distance + 1);
                queue.push_back((next, distance + 1));
            }
        }
    }

    distances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::build_graph;
    use crate::parser::ModuleDeclaration;
    use crate::project::{Project, ProjectSet};
    use crate::value::{Properties, PropertyValue};

    fn strings(items: &[&str]) -> PropertyValue {
        PropertyValue::List(
            items
                .iter()
                .map(|s| PropertyValue::String(s.to_string()))
                .collect(),
        )
    }

    fn decl(
        project: &str,
        line: usize,
        module_type: &str,
        name: &str,
        props: Vec<(&str, PropertyValue)>,
    ) -> ModuleDeclaration {
        let mut properties = Properties::new();
        properties.insert("name", PropertyValue::String(name.into()));
        for (key, value) in props {
            properties.insert(key, value);
        }
        ModuleDeclaration {
            module_type: module_type.into(),
            properties,
            origin_project: ProjectId::new(project),
            origin_line: line,
        }
    }

    fn project(root: &str, files: &[&str]) -> Project {
        Project::new(
            ProjectId::new(root),
            root,
            files.iter().map(|f| f.to_string()),
        )
    }

    /// `a.cc`, `b.cc` feed `libfoo`; `main.cc` and `libfoo` feed
    /// `foobin`.
    fn scenario_a() -> BuildGraph {
        let projects =
            ProjectSet::from_iter([project("app", &["a.cc", "b.cc", "main.cc"])]);
        let modules = vec![
            decl(
                "app",
                1,
                "cc_library",
                "libfoo",
                vec![("srcs", strings(&["a.cc", "b.cc"]))],
            ),
            decl(
                "app",
                8,
                "cc_binary",
                "foobin",
                vec![
                    ("srcs", strings(&["main.cc"])),
                    ("static_libs", strings(&["libfoo"])),
                ],
            ),
        ];
        build_graph(modules, &projects).unwrap().graph
    }

    #[test]
    fn test_find_dependencies_distances() {
        let graph = scenario_a();
        let report = find_dependencies(&graph, "a.cc", None).unwrap();

        assert_eq!(report.origin, "app/a.cc");
        let hits: Vec<(&str, usize)> = report
            .hits
            .iter()
            .map(|h| (h.name.as_str(), h.distance))
            .collect();
        assert_eq!(hits, vec![("libfoo", 1), ("foobin", 2)]);
    }

    #[test]
    fn test_distances_are_shortest_paths() {
        // Diamond plus a shortcut: common.cc feeds lib1, lib2 and bin
        // directly; lib1 and lib2 both feed bin.
        let projects = ProjectSet::from_iter([project("p", &["common.cc"])]);
        let modules = vec![
            decl(
                "p",
                1,
                "cc_library",
                "lib1",
                vec![("srcs", strings(&["common.cc"]))],
            ),
            decl(
                "p",
                5,
                "cc_library",
                "lib2",
                vec![("srcs", strings(&["common.cc"]))],
            ),
            decl(
                "p",
                9,
                "cc_binary",
                "bin",
                vec![
                    ("srcs", strings(&["common.cc"])),
                    ("static_libs", strings(&["lib1", "lib2"])),
                ],
            ),
        ];
        let graph = build_graph(modules, &projects).unwrap().graph;

        let report = find_dependencies(&graph, "common.cc", None).unwrap();
        let hits: Vec<(&str, usize)> = report
            .hits
            .iter()
            .map(|h| (h.name.as_str(), h.distance))
            .collect();
        // bin is two hops through either library but one hop directly.
        assert_eq!(hits, vec![("bin", 1), ("lib1", 1), ("lib2", 1)]);
    }

    #[test]
    fn test_find_target_unique_fragment() {
        let graph = scenario_a();
        let hit = find_target(&graph, "a.cc", 1).unwrap();
        assert_eq!(hit.name, "libfoo");
        assert_eq!(hit.distance, 1);
    }

    #[test]
    fn test_find_target_radius_bounds_the_walk() {
        let graph = scenario_a();
        // Radius zero reaches no target at all.
        let err = find_target(&graph, "a.cc", 0).unwrap_err();
        assert_eq!(err, QueryError::NotFound("a.cc".into()));
    }

    #[test]
    fn test_find_target_ambiguous_fragment() {
        let projects = ProjectSet::from_iter([
            project("projA", &["main.cc"]),
            project("projB", &["main.cc"]),
        ]);
        let modules = vec![
            decl(
                "projA",
                1,
                "cc_binary",
                "bin_a",
                vec![("srcs", strings(&["main.cc"]))],
            ),
            decl(
                "projB",
                1,
                "cc_binary",
                "bin_b",
                vec![("srcs", strings(&["main.cc"]))],
            ),
        ];
        let graph = build_graph(modules, &projects).unwrap().graph;

        let err = find_target(&graph, "main.cc", 1).unwrap_err();
        assert_eq!(
            err,
            QueryError::TooManyNodes {
                query: "main.cc".into(),
                count: 2,
            }
        );

        // A longer fragment resolves uniquely.
        let hit = find_target(&graph, "projA/main.cc", 1).unwrap();
        assert_eq!(hit.name, "bin_a");
    }

    #[test]
    fn test_exact_path_match_beats_suffix_ambiguity() {
        // `main.cc` exists both as a full path (root project) and as
        // the suffix of `projA/main.cc`.
        let projects = ProjectSet::from_iter([
            project(".", &["main.cc"]),
            project("projA", &["main.cc"]),
        ]);
        let modules = vec![
            decl(
                ".",
                1,
                "cc_binary",
                "rootbin",
                vec![("srcs", strings(&["main.cc"]))],
            ),
            decl(
                "projA",
                1,
                "cc_binary",
                "bin_a",
                vec![("srcs", strings(&["main.cc"]))],
            ),
        ];
        let graph = build_graph(modules, &projects).unwrap().graph;

        let hit = find_target(&graph, "main.cc", 1).unwrap();
        assert_eq!(hit.name, "rootbin");
    }

    #[test]
    fn test_ambiguous_fragment_with_one_live_candidate() {
        // Two suffix matches, but only one of them feeds any target.
        let projects = ProjectSet::from_iter([
            project("projA", &["util.cc"]),
            project("projB", &["util.cc", "used.cc"]),
        ]);
        let modules = vec![decl(
            "projB",
            1,
            "cc_library",
            "libused",
            vec![("srcs", strings(&["util.cc"]))],
        )];
        let mut graph = build_graph(modules, &projects).unwrap().graph;
        // An orphan source with no outgoing edges.
        graph.intern_source("projA/util.cc".into(), "cc".into(), ProjectId::new("projA"));
        graph.finish();

        let hit = find_target(&graph, "util.cc", 1).unwrap();
        assert_eq!(hit.name, "libused");
    }

    #[test]
    fn test_find_target_not_found() {
        let graph = scenario_a();
        assert_eq!(
            find_target(&graph, "absent.cc", 3).unwrap_err(),
            QueryError::NotFound("absent.cc".into())
        );
    }

    #[test]
    fn test_find_sources_collects_transitively() {
        let graph = scenario_a();
        let report = find_sources(&graph, "foobin").unwrap();

        let paths: Vec<&str> = report.hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["app/a.cc", "app/b.cc", "app/main.cc"]);

        let main = report
            .hits
            .iter()
            .find(|h| h.path == "app/main.cc")
            .unwrap();
        assert_eq!(main.distance, 1);
        assert_eq!(main.extension, "cc");
        assert_eq!(main.project, ProjectId::new("app"));

        let a = report.hits.iter().find(|h| h.path == "app/a.cc").unwrap();
        assert_eq!(a.distance, 2);
    }

    #[test]
    fn test_find_sources_unknown_target() {
        let graph = scenario_a();
        assert_eq!(
            find_sources(&graph, "ghost").unwrap_err(),
            QueryError::NotFound("ghost".into())
        );
    }

    #[test]
    fn test_find_common_intersects_with_min_distance() {
        let graph = scenario_a();
        // libfoo's sources are {a.cc, b.cc}; foobin's include them
        // transitively plus main.cc.
        let report = find_common(&graph, "libfoo", "foobin").unwrap();

        let hits: Vec<(&str, usize)> = report
            .hits
            .iter()
            .map(|h| (h.path.as_str(), h.distance))
            .collect();
        // Distance 1 from libfoo, 2 from foobin: the minimum wins.
        assert_eq!(hits, vec![("app/a.cc", 1), ("app/b.cc", 1)]);
    }

    #[test]
    fn test_queries_leave_the_graph_intact() {
        let graph = scenario_a();
        let before: Vec<String> = graph.nodes().map(|(_, n)| n.id().to_string()).collect();

        let _ = find_dependencies(&graph, "a.cc", None);
        let _ = find_sources(&graph, "foobin");
        let _ = find_target(&graph, "nothing.cc", 2);

        let after: Vec<String> = graph.nodes().map(|(_, n)| n.id().to_string()).collect();
        assert_eq!(before, after);
    }
}
