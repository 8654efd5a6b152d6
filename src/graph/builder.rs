//! Graph builder — turns defaults-merged module declarations plus
//! project indexes into one immutable dependency graph.
//!
//! Blueprint parsing fans out across worker threads; the merge itself is
//! a serial reduction over projects sorted by root path, so the finished
//! graph is a pure function of tree content, independent of parse
//! scheduling.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::engine::BuildGraph;
use super::types::EdgeKind;
use crate::defaults::resolve_defaults;
use crate::error::{BGraphError, BuildDiagnostic, Result};
use crate::parser::{parse_blueprint, ModuleDeclaration, ParsedBlueprint};
use crate::project::{FileLister, Project, ProjectId, ProjectSet, WalkLister};

/// Conventional blueprint file name.
pub const DEFAULT_BLUEPRINT_NAME: &str = "Android.bp";

/// Properties whose values name source files (literals or globs).
pub const SOURCE_KEYS: &[&str] = &["srcs"];

/// Properties whose values exclude previously matched source files.
pub const SOURCE_EXCLUDE_KEYS: &[&str] = &["exclude_srcs"];

/// Properties whose values name directories; every file beneath one
/// contributes.
pub const SOURCE_DIR_KEYS: &[&str] = &[
    "include_dirs",
    "local_include_dirs",
    "export_include_dirs",
];

/// Properties whose values name other modules.
pub const DEPENDENCY_KEYS: &[&str] = &[
    "shared_libs",
    "static_libs",
    "header_libs",
    "whole_static_libs",
    "required",
    "system_shared_libs",
];

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    // `*` stays inside one path component; `**` spans directories.
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A finished graph plus the non-fatal issues met while building it.
#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: BuildGraph,
    pub diagnostics: Vec<BuildDiagnostic>,
}

/// Build the graph from defaults-merged declarations and project
/// indexes. Fails only on identifier-uniqueness violations.
pub fn build_graph(
    mut modules: Vec<ModuleDeclaration>,
    projects: &ProjectSet,
) -> Result<BuildOutcome> {
    // Pin the merge order: projects by root path, declarations by file
    // order within a project.
    modules.sort_by(|a, b| {
        let root_a = sort_root(a, projects);
        let root_b = sort_root(b, projects);
        root_a.cmp(root_b).then(a.origin_line.cmp(&b.origin_line))
    });

    let mut graph = BuildGraph::new();
    let mut diagnostics = Vec::new();

    // Step 1: one target per declaration, names globally unique.
    let mut declared: HashMap<String, String> = HashMap::new();
    let mut target_indexes: Vec<Option<petgraph::graph::NodeIndex>> =
        Vec::with_capacity(modules.len());
    for module in &modules {
        let Some(name) = module.name().map(str::to_string) else {
            // The parser rejects unnamed modules; this only triggers on
            // hand-built declarations.
            warn!(project = %module.origin_project, "skipping module without a name");
            target_indexes.push(None);
            continue;
        };
        let origin = origin_of(module);
        if let Some(first) = declared.insert(name.clone(), origin.clone()) {
            return Err(BGraphError::DuplicateName {
                name,
                first,
                second: origin,
            });
        }
        let idx = graph.add_target(name, module.module_type.clone(), module.properties.clone());
        target_indexes.push(Some(idx));
    }

    // Step 2: source edges.
    for (module, target_idx) in modules.iter().zip(&target_indexes) {
        let Some(target_idx) = *target_idx else {
            continue;
        };
        match projects.get(&module.origin_project) {
            Some(project) => {
                resolve_sources(&mut graph, module, target_idx, project, &mut diagnostics)?
            }
            None => warn!(
                project = %module.origin_project,
                module = module.name().unwrap_or_default(),
                "no project index; source properties left unresolved"
            ),
        }
    }

    // Step 3: dependency edges.
    for (module, target_idx) in modules.iter().zip(&target_indexes) {
        let Some(target_idx) = *target_idx else {
            continue;
        };
        resolve_dependencies(&mut graph, module, target_idx, &mut diagnostics);
    }

    // Step 4: seal the indexes.
    graph.finish();

    let stats = graph.stats();
    info!(
        targets = stats.target_count,
        sources = stats.source_count,
        edges = stats.total_edges,
        "graph built"
    );
    Ok(BuildOutcome { graph, diagnostics })
}

fn sort_root<'a>(module: &'a ModuleDeclaration, projects: &'a ProjectSet) -> &'a str {
    projects
        .get(&module.origin_project)
        .map(Project::root_path)
        .unwrap_or_else(|| module.origin_project.as_str())
}

fn origin_of(module: &ModuleDeclaration) -> String {
    format!("{} (line {})", module.origin_project, module.origin_line)
}

fn resolve_sources(
    graph: &mut BuildGraph,
    module: &ModuleDeclaration,
    target_idx: petgraph::graph::NodeIndex,
    project: &Project,
    diagnostics: &mut Vec<BuildDiagnostic>,
) -> Result<()> {
    let module_name = module.name().unwrap_or_default();

    // Exclusions are gathered up front and subtracted from every
    // inclusion match.
    let mut excluded: BTreeSet<&str> = BTreeSet::new();
    for (key, value) in module.properties.iter() {
        if !SOURCE_EXCLUDE_KEYS.contains(&key.as_str()) {
            continue;
        }
        for pattern in value.string_items() {
            let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
            if is_glob(pattern) {
                if let Ok(compiled) = Pattern::new(pattern) {
                    excluded.extend(
                        project
                            .files()
                            .filter(|f| compiled.matches_with(f, GLOB_OPTIONS)),
                    );
                }
            } else if project.contains_file(pattern) {
                excluded.insert(pattern);
            }
        }
    }

    for (key, value) in module.properties.iter() {
        if SOURCE_KEYS.contains(&key.as_str()) {
            for pattern in value.string_items() {
                let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
                if is_glob(pattern) {
                    let compiled = match Pattern::new(pattern) {
                        Ok(compiled) => compiled,
                        Err(err) => {
                            debug!(module = module_name, pattern, %err, "invalid glob");
                            diagnostics.push(BuildDiagnostic::UnresolvedReference {
                                module: module_name.to_string(),
                                reference: pattern.to_string(),
                            });
                            continue;
                        }
                    };
                    // Zero matches is not an error; it just yields no
                    // edges.
                    let matches: Vec<String> = project
                        .files()
                        .filter(|f| compiled.matches_with(f, GLOB_OPTIONS))
                        .filter(|f| !excluded.contains(f))
                        .map(str::to_string)
                        .collect();
                    for relative in matches {
                        attach_source(graph, project, &relative, target_idx)?;
                    }
                } else if project.contains_file(pattern) {
                    if !excluded.contains(pattern) {
                        attach_source(graph, project, pattern, target_idx)?;
                    }
                } else {
                    diagnostics.push(BuildDiagnostic::UnresolvedReference {
                        module: module_name.to_string(),
                        reference: pattern.to_string(),
                    });
                }
            }
        } else if SOURCE_DIR_KEYS.contains(&key.as_str()) {
            for dir in value.string_items() {
                let dir = dir.strip_prefix("./").unwrap_or(dir);
                let prefix = format!("{}/", dir.trim_end_matches('/'));
                let matches: Vec<String> = project
                    .files()
                    .filter(|f| f.starts_with(&prefix))
                    .filter(|f| !excluded.contains(f))
                    .map(str::to_string)
                    .collect();
                for relative in matches {
                    attach_source(graph, project, &relative, target_idx)?;
                }
            }
        }
    }
    Ok(())
}

fn attach_source(
    graph: &mut BuildGraph,
    project: &Project,
    relative: &str,
    target_idx: petgraph::graph::NodeIndex,
) -> Result<()> {
    let path = project.full_path(relative);
    // Sources and targets share one identifier namespace.
    if graph.target(&path).is_some() {
        return Err(BGraphError::DuplicateName {
            name: path,
            first: "a target declaration".to_string(),
            second: format!("a source file in {}", project.id()),
        });
    }
    let extension = Path::new(relative)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source_idx = graph.intern_source(path, extension, project.id().clone());
    graph.add_edge(source_idx, target_idx, EdgeKind::BuildsFrom);
    Ok(())
}

fn resolve_dependencies(
    graph: &mut BuildGraph,
    module: &ModuleDeclaration,
    target_idx: petgraph::graph::NodeIndex,
    diagnostics: &mut Vec<BuildDiagnostic>,
) {
    let module_name = module.name().unwrap_or_default();
    for (key, value) in module.properties.iter() {
        if !DEPENDENCY_KEYS.contains(&key.as_str()) {
            continue;
        }
        for dependency in value.string_items() {
            match graph.target(dependency) {
                // The dependency feeds the declaring module.
                Some(dep_idx) => graph.add_edge(dep_idx, target_idx, EdgeKind::DependsOn),
                None => diagnostics.push(BuildDiagnostic::UnresolvedReference {
                    module: module_name.to_string(),
                    reference: dependency.to_string(),
                }),
            }
        }
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(&['*', '?', '['][..])
}

// ─── Tree loading ───────────────────────────────────────────────

/// Everything read off one blueprint tree, before defaults resolution.
pub struct LoadedTree {
    pub modules: Vec<ModuleDeclaration>,
    pub projects: ProjectSet,
    pub diagnostics: Vec<BuildDiagnostic>,
}

/// Discover and parse every blueprint under `root`.
///
/// Each directory holding a blueprint file becomes one project; parsing
/// runs in parallel per project, file listings come from the supplied
/// collaborator.
pub fn load_tree(
    root: &Path,
    blueprint_name: &str,
    lister: &(dyn FileLister + Sync),
) -> Result<LoadedTree> {
    let blueprints = scan_blueprints(root, blueprint_name);
    info!(count = blueprints.len(), root = %root.display(), "found blueprint files");

    type ParsedProject = (String, ParsedBlueprint, Project);
    let parsed: Mutex<Vec<ParsedProject>> = Mutex::new(Vec::with_capacity(blueprints.len()));

    blueprints.par_iter().for_each(|blueprint_path| {
        let project_dir = blueprint_path.parent().unwrap_or(root);
        let relative_root = relative_name(root, project_dir);
        let project_id = ProjectId::new(relative_root.clone());

        let source = match fs::read_to_string(blueprint_path) {
            Ok(source) => source,
            Err(err) => {
                warn!(file = %blueprint_path.display(), %err, "unable to read blueprint");
                return;
            }
        };

        let display_path = relative_name(root, blueprint_path);
        let parsed_file = match parse_blueprint(&source, &display_path, &project_id) {
            Ok(parsed_file) => parsed_file,
            Err(err) => {
                warn!(file = %display_path, %err, "blueprint failed to parse");
                let mut lost = ParsedBlueprint::default();
                lost.diagnostics.push(err);
                lost
            }
        };

        let files = match lister.list_files(project_dir) {
            Ok(files) => files,
            Err(err) => {
                warn!(project = %project_id, %err, "file listing failed");
                Vec::new()
            }
        };
        // Blueprint files (this project's own and any nested project's)
        // are never source candidates.
        let nested = format!("/{blueprint_name}");
        let files = files
            .into_iter()
            .filter(|f| f != blueprint_name && !f.ends_with(&nested))
            .collect::<Vec<_>>();
        let project = Project::new(project_id, relative_root.clone(), files);

        if let Ok(mut collected) = parsed.lock() {
            collected.push((relative_root, parsed_file, project));
        }
    });

    let mut parsed = parsed.into_inner().unwrap_or_default();
    parsed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut tree = LoadedTree {
        modules: Vec::new(),
        projects: ProjectSet::new(),
        diagnostics: Vec::new(),
    };
    for (_, parsed_file, project) in parsed {
        tree.modules.extend(parsed_file.modules);
        tree.diagnostics.extend(
            parsed_file
                .diagnostics
                .into_iter()
                .map(BuildDiagnostic::SkippedModule),
        );
        tree.projects.insert(project);
    }
    Ok(tree)
}

/// Load, resolve defaults and build in one step, with the default
/// file lister and blueprint name.
pub fn build_tree(root: &Path) -> Result<BuildOutcome> {
    build_tree_named(root, DEFAULT_BLUEPRINT_NAME)
}

/// [`build_tree`] for trees whose blueprint files go by another name.
pub fn build_tree_named(root: &Path, blueprint_name: &str) -> Result<BuildOutcome> {
    let tree = load_tree(root, blueprint_name, &WalkLister)?;
    let mut diagnostics = tree.diagnostics;

    let (modules, defaults_diagnostics) = resolve_defaults(tree.modules)?;
    diagnostics.extend(defaults_diagnostics);

    let outcome = build_graph(modules, &tree.projects)?;
    diagnostics.extend(outcome.diagnostics);
    Ok(BuildOutcome {
        graph: outcome.graph,
        diagnostics,
    })
}

fn scan_blueprints(root: &Path, blueprint_name: &str) -> Vec<PathBuf> {
    let mut blueprints: Vec<PathBuf> = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter(|entry| {
            entry
                .path()
                .file_name()
                .is_some_and(|name| name == blueprint_name)
        })
        .map(|entry| entry.into_path())
        .collect();
    blueprints.sort();
    blueprints
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let name = relative.to_string_lossy().replace('\\', "/");
    if name.is_empty() {
        ".".to_string()
    } else {
        name
    }
}
