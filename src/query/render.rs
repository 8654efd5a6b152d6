//! Output rendering — pure mappings from query results to strings.
//!
//! Two modes: a fixed-width text table and a graph-exchange (DOT) form
//! carrying the queried subgraph. Both are deterministic for identical
//! inputs; node and edge lines in the DOT form are sorted.

use std::collections::BTreeSet;

use petgraph::Direction;

use super::{bfs_distances, CommonReport, DependencyReport, SourceReport};
use crate::graph::BuildGraph;

/// How a query result should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    GraphExchange,
}

/// Render the targets consuming a source file.
pub fn render_dependencies(
    graph: &BuildGraph,
    report: &DependencyReport,
    mode: OutputMode,
) -> String {
    match mode {
        OutputMode::Table => {
            let rows: Vec<Vec<String>> = report
                .hits
                .iter()
                .map(|hit| {
                    vec![
                        hit.name.clone(),
                        hit.module_type.clone(),
                        hit.distance.to_string(),
                    ]
                })
                .collect();
            text_table(
                &format!("Targets consuming {}", report.origin),
                &["Target", "Type", "Distance"],
                &rows,
            )
        }
        OutputMode::GraphExchange => {
            let ids = match graph.source(&report.origin) {
                Some(origin) => closure_ids(graph, origin, Direction::Outgoing, report.radius),
                None => report.hits.iter().map(|h| h.name.clone()).collect(),
            };
            dot(graph, &[report.origin.as_str()], &ids)
        }
    }
}

/// Render the source files feeding a target.
pub fn render_sources(graph: &BuildGraph, report: &SourceReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Table => {
            let rows: Vec<Vec<String>> = report
                .hits
                .iter()
                .map(|hit| {
                    vec![
                        hit.path.clone(),
                        hit.extension.clone(),
                        hit.project.to_string(),
                        hit.distance.to_string(),
                    ]
                })
                .collect();
            text_table(
                &format!("Sources for target {}", report.target),
                &["Path", "Extension", "Project", "Distance"],
                &rows,
            )
        }
        OutputMode::GraphExchange => {
            let ids = match graph.target(&report.target) {
                Some(origin) => closure_ids(graph, origin, Direction::Incoming, None),
                None => report.hits.iter().map(|h| h.path.clone()).collect(),
            };
            dot(graph, &[report.target.as_str()], &ids)
        }
    }
}

/// Render the intersection of two targets' source sets.
pub fn render_common(graph: &BuildGraph, report: &CommonReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Table => {
            let rows: Vec<Vec<String>> = report
                .hits
                .iter()
                .map(|hit| {
                    vec![
                        hit.path.clone(),
                        hit.extension.clone(),
                        hit.distance.to_string(),
                    ]
                })
                .collect();
            text_table(
                &format!(
                    "Sources shared by {} and {}",
                    report.target_a, report.target_b
                ),
                &["Path", "Extension", "Distance"],
                &rows,
            )
        }
        OutputMode::GraphExchange => {
            let mut ids: BTreeSet<String> =
                report.hits.iter().map(|h| h.path.clone()).collect();
            ids.insert(report.target_a.clone());
            ids.insert(report.target_b.clone());
            dot(
                graph,
                &[report.target_a.as_str(), report.target_b.as_str()],
                &ids,
            )
        }
    }
}

/// Node ids of the traversal closure a query walked.
fn closure_ids(
    graph: &BuildGraph,
    origin: petgraph::graph::NodeIndex,
    dir: Direction,
    radius: Option<usize>,
) -> BTreeSet<String> {
    bfs_distances(graph, origin, dir, radius)
        .keys()
        .map(|&idx| graph.node(idx).id().to_string())
        .collect()
}

/// Emit the subgraph over `ids` in DOT form. Query origins are drawn
/// boxed and red.
fn dot(graph: &BuildGraph, origins: &[&str], ids: &BTreeSet<String>) -> String {
    let mut out = String::from("digraph bgraph {\n");

    for id in ids {
        if origins.contains(&id.as_str()) {
            out.push_str(&format!("    \"{}\" [shape=box, color=red];\n", escape(id)));
        } else {
            out.push_str(&format!("    \"{}\";\n", escape(id)));
        }
    }

    let mut edge_lines: Vec<String> = graph
        .edges()
        .filter(|(from, to, _)| ids.contains(*from) && ids.contains(*to))
        .map(|(from, to, kind)| {
            format!(
                "    \"{}\" -> \"{}\" [label=\"{kind}\"];\n",
                escape(from),
                escape(to)
            )
        })
        .collect();
    edge_lines.sort();
    for line in edge_lines {
        out.push_str(&line);
    }

    out.push_str("}\n");
    out
}

fn escape(id: &str) -> String {
    id.replace('"', "\\\"")
}

/// A fixed-width text table with a title row.
fn text_table(title: &str, headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    out.push_str(title);
    out.push('\n');

    let mut header_line = String::new();
    let mut rule_line = String::new();
    for (i, header) in headers.iter().enumerate() {
        header_line.push_str(&format!(" {:<width$} ", header, width = widths[i]));
        rule_line.push_str(&format!(" {} ", "-".repeat(widths[i])));
    }
    out.push_str(header_line.trim_end());
    out.push('\n');
    out.push_str(rule_line.trim_end());
    out.push('\n');

    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            line.push_str(&format!(" {:<width$} ", cell, width = widths[i]));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::build_graph;
    use crate::parser::ModuleDeclaration;
    use crate::project::{Project, ProjectId, ProjectSet};
    use crate::query::{find_common, find_dependencies, find_sources};
    use crate::value::{Properties, PropertyValue};

    fn strings(items: &[&str]) -> PropertyValue {
        PropertyValue::List(
            items
                .iter()
                .map(|s| PropertyValue::String(s.to_string()))
                .collect(),
        )
    }

    fn fixture() -> BuildGraph {
        let projects = ProjectSet::from_iter([Project::new(
            ProjectId::new("app"),
            "app",
            ["a.cc", "b.cc", "main.cc"].map(String::from),
        )]);
        let mut lib = Properties::new();
        lib.insert("name", PropertyValue::String("libfoo".into()));
        lib.insert("srcs", strings(&["a.cc", "b.cc"]));
        let mut bin = Properties::new();
        bin.insert("name", PropertyValue::String("foobin".into()));
        bin.insert("srcs", strings(&["main.cc"]));
        bin.insert("static_libs", strings(&["libfoo"]));
        let modules = vec![
            ModuleDeclaration {
                module_type: "cc_library".into(),
                properties: lib,
                origin_project: ProjectId::new("app"),
                origin_line: 1,
            },
            ModuleDeclaration {
                module_type: "cc_binary".into(),
                properties: bin,
                origin_project: ProjectId::new("app"),
                origin_line: 8,
            },
        ];
        build_graph(modules, &projects).unwrap().graph
    }

    #[test]
    fn test_dependency_table() {
        let graph = fixture();
        let report = find_dependencies(&graph, "a.cc", None).unwrap();
        let table = render_dependencies(&graph, &report, OutputMode::Table);

        assert!(table.starts_with("Targets consuming app/a.cc"));
        assert!(table.contains("libfoo"));
        assert!(table.contains("cc_library"));
        let libfoo_line = table.lines().find(|l| l.contains("libfoo")).unwrap();
        let foobin_line = table.lines().find(|l| l.contains("foobin")).unwrap();
        assert!(libfoo_line.trim_end().ends_with('1'));
        assert!(foobin_line.trim_end().ends_with('2'));
    }

    #[test]
    fn test_dependency_dot_marks_origin() {
        let graph = fixture();
        let report = find_dependencies(&graph, "a.cc", None).unwrap();
        let dot = render_dependencies(&graph, &report, OutputMode::GraphExchange);

        assert!(dot.starts_with("digraph bgraph {"));
        assert!(dot.contains("\"app/a.cc\" [shape=box, color=red];"));
        assert!(dot.contains("\"app/a.cc\" -> \"libfoo\" [label=\"builds_from\"];"));
        assert!(dot.contains("\"libfoo\" -> \"foobin\" [label=\"depends_on\"];"));
        // The origin's sibling sources are not part of the queried
        // subgraph.
        assert!(!dot.contains("app/b.cc"));
    }

    #[test]
    fn test_sources_dot_includes_intermediate_targets() {
        let graph = fixture();
        let report = find_sources(&graph, "foobin").unwrap();
        let dot = render_sources(&graph, &report, OutputMode::GraphExchange);

        assert!(dot.contains("\"foobin\" [shape=box, color=red];"));
        assert!(dot.contains("\"libfoo\""));
        assert!(dot.contains("\"app/a.cc\" -> \"libfoo\""));
    }

    #[test]
    fn test_common_table() {
        let graph = fixture();
        let report = find_common(&graph, "libfoo", "foobin").unwrap();
        let table = render_common(&graph, &report, OutputMode::Table);

        assert!(table.starts_with("Sources shared by libfoo and foobin"));
        assert!(table.contains("app/a.cc"));
        assert!(table.contains("app/b.cc"));
        assert!(!table.contains("main.cc"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let graph = fixture();
        let report = find_sources(&graph, "foobin").unwrap();

        let first = render_sources(&graph, &report, OutputMode::GraphExchange);
        let second = render_sources(&graph, &report, OutputMode::GraphExchange);
        assert_eq!(first, second);

        let table_a = render_sources(&graph, &report, OutputMode::Table);
        let table_b = render_sources(&graph, &report, OutputMode::Table);
        assert_eq!(table_a, table_b);
    }
}
