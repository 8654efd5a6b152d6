//! Versioned on-disk graph format.
//!
//! A persisted graph is a header plus flat node and edge tables, encoded
//! with bincode. Loaders reject any version they do not recognize;
//! loading rebuilds every in-memory index.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::BuildGraph;
use super::types::{EdgeKind, NodeData};
use crate::error::{BGraphError, Result};
use crate::project::ProjectId;
use crate::value::{Properties, PropertyValue};

/// Current format version. Bump on any schema change.
pub const FORMAT_VERSION: u32 = 1;

/// A node attribute: a string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrValue {
    Str(String),
    List(Vec<String>),
}

/// One row of the node table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedNode {
    pub id: String,
    /// `"source"` or `"target"`.
    pub kind: String,
    pub attributes: BTreeMap<String, AttrValue>,
}

/// One row of the edge table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// The complete persisted form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedGraph {
    pub version: u32,
    pub nodes: Vec<PersistedNode>,
    pub edges: Vec<PersistedEdge>,
}

const MODULE_TYPE_ATTR: &str = "module_type";
const PATH_ATTR: &str = "path";
const EXTENSION_ATTR: &str = "extension";
const PROJECT_ATTR: &str = "project";

impl BuildGraph {
    /// Flatten into the persisted row form.
    pub fn to_persisted(&self) -> PersistedGraph {
        let nodes = self
            .nodes()
            .map(|(_, data)| {
                let mut attributes = BTreeMap::new();
                match data {
                    NodeData::Source {
                        path,
                        extension,
                        project,
                    } => {
                        attributes.insert(PATH_ATTR.into(), AttrValue::Str(path.clone()));
                        attributes
                            .insert(EXTENSION_ATTR.into(), AttrValue::Str(extension.clone()));
                        attributes.insert(
                            PROJECT_ATTR.into(),
                            AttrValue::Str(project.as_str().to_string()),
                        );
                    }
                    NodeData::Target {
                        module_type,
                        properties,
                        ..
                    } => {
                        attributes
                            .insert(MODULE_TYPE_ATTR.into(), AttrValue::Str(module_type.clone()));
                        // Only string-shaped snapshots survive; bools,
                        // integers and nested blocks are display-only in
                        // a live process.
                        for (key, value) in properties.iter() {
                            if key == MODULE_TYPE_ATTR {
                                continue;
                            }
                            match value {
                                PropertyValue::String(s) => {
                                    attributes.insert(key.clone(), AttrValue::Str(s.clone()));
                                }
                                PropertyValue::List(_) => {
                                    let items: Vec<String> = value
                                        .string_items()
                                        .iter()
                                        .map(|s| s.to_string())
                                        .collect();
                                    attributes.insert(key.clone(), AttrValue::List(items));
                                }
                                _ => {}
                            }
                        }
                    }
                }
                PersistedNode {
                    id: data.id().to_string(),
                    kind: data.kind_str().to_string(),
                    attributes,
                }
            })
            .collect();

        let edges = self
            .edges()
            .map(|(from, to, kind)| PersistedEdge {
                from: from.to_string(),
                to: to.to_string(),
                kind,
            })
            .collect();

        PersistedGraph {
            version: FORMAT_VERSION,
            nodes,
            edges,
        }
    }

    /// Rebuild a graph (and all its indexes) from persisted rows.
    pub fn from_persisted(persisted: PersistedGraph) -> Result<Self> {
        if persisted.version != FORMAT_VERSION {
            return Err(BGraphError::GraphLoad(format!(
                "unrecognized graph format version {} (expected {FORMAT_VERSION})",
                persisted.version
            )));
        }

        let mut graph = BuildGraph::new();
        let mut indexes: HashMap<String, NodeIndex> = HashMap::new();

        for node in persisted.nodes {
            if indexes.contains_key(&node.id) {
                return Err(BGraphError::GraphLoad(format!(
                    "duplicate node id `{}`",
                    node.id
                )));
            }
            let idx = match node.kind.as_str() {
                "source" => {
                    let extension = attr_str(&node.attributes, EXTENSION_ATTR).unwrap_or_default();
                    let project = attr_str(&node.attributes, PROJECT_ATTR).unwrap_or_default();
                    graph.intern_source(node.id.clone(), extension, ProjectId::new(project))
                }
                "target" => {
                    let module_type =
                        attr_str(&node.attributes, MODULE_TYPE_ATTR).unwrap_or_default();
                    let mut properties = Properties::new();
                    for (key, value) in &node.attributes {
                        if key == MODULE_TYPE_ATTR {
                            continue;
                        }
                        match value {
                            AttrValue::Str(s) => {
                                properties.insert(key.clone(), PropertyValue::String(s.clone()))
                            }
                            AttrValue::List(items) => properties.insert(
                                key.clone(),
                                PropertyValue::List(
                                    items
                                        .iter()
                                        .map(|s| PropertyValue::String(s.clone()))
                                        .collect(),
                                ),
                            ),
                        }
                    }
                    graph.add_target(node.id.clone(), module_type, properties)
                }
                other => {
                    return Err(BGraphError::GraphLoad(format!(
                        "unknown node kind `{other}` for `{}`",
                        node.id
                    )))
                }
            };
            indexes.insert(node.id, idx);
        }

        for edge in persisted.edges {
            let from = indexes.get(&edge.from).ok_or_else(|| {
                BGraphError::GraphLoad(format!("edge references missing node `{}`", edge.from))
            })?;
            let to = indexes.get(&edge.to).ok_or_else(|| {
                BGraphError::GraphLoad(format!("edge references missing node `{}`", edge.to))
            })?;
            graph.add_edge(*from, *to, edge.kind);
        }

        graph.finish();
        Ok(graph)
    }

    /// Write the graph to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let encoded = bincode::serialize(&self.to_persisted())
            .map_err(|err| BGraphError::GraphLoad(format!("unable to encode graph: {err}")))?;
        fs::write(path, encoded)?;
        debug!(path = %path.display(), "graph saved");
        Ok(())
    }

    /// Read a graph from disk, rejecting unknown versions.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let persisted: PersistedGraph = bincode::deserialize(&bytes)
            .map_err(|err| BGraphError::GraphLoad(format!("corrupt graph file: {err}")))?;
        Self::from_persisted(persisted)
    }
}

fn attr_str(attributes: &BTreeMap<String, AttrValue>, key: &str) -> Option<String> {
    match attributes.get(key) {
        Some(AttrValue::Str(s)) => Some(s.clone()),
        _ => None,
    }
}
