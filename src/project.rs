//! Project index — per-project file listings used for glob expansion.
//!
//! A project is one directory holding exactly one blueprint file plus the
//! files that blueprint may reference. The index is built from a listing
//! supplied by a [`FileLister`] collaborator; the core never scans the
//! filesystem on its own, so listings can equally come from a VCS
//! manifest or a test fixture.

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io;
use std::path::Path;

/// Stable identifier of a project inside one tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One project: its root path and the set of files beneath it.
///
/// Immutable once created. The `files` set (relative, `/`-separated
/// paths) is the only input glob resolution ever consults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    id: ProjectId,
    root_path: String,
    files: BTreeSet<String>,
}

impl Project {
    pub fn new(
        id: ProjectId,
        root_path: impl Into<String>,
        files: impl IntoIterator<Item = String>,
    ) -> Self {
        let files = files
            .into_iter()
            .map(|f| f.strip_prefix("./").map(str::to_string).unwrap_or(f))
            .collect();
        Self {
            id,
            root_path: root_path.into(),
            files,
        }
    }

    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Relative file paths, in sorted order.
    pub fn files(&self) -> impl Iterator<Item = &str> + '_ {
        self.files.iter().map(String::as_str)
    }

    pub fn contains_file(&self, relative: &str) -> bool {
        self.files.contains(relative)
    }

    /// Join a project-relative path onto the project root.
    pub fn full_path(&self, relative: &str) -> String {
        if self.root_path.is_empty() || self.root_path == "." {
            relative.to_string()
        } else {
            format!("{}/{}", self.root_path.trim_end_matches('/'), relative)
        }
    }
}

/// All projects of one tree, addressable by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSet {
    projects: HashMap<ProjectId, Project>,
}

impl ProjectSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, project: Project) {
        self.projects.insert(project.id().clone(), project);
    }

    pub fn get(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Projects sorted by root path. The graph builder merges in this
    /// order so the finished graph does not depend on parse scheduling.
    pub fn sorted_by_root(&self) -> Vec<&Project> {
        let mut projects: Vec<&Project> = self.projects.values().collect();
        projects.sort_by(|a, b| a.root_path.cmp(&b.root_path));
        projects
    }
}

impl FromIterator<Project> for ProjectSet {
    fn from_iter<T: IntoIterator<Item = Project>>(iter: T) -> Self {
        let mut set = ProjectSet::new();
        for project in iter {
            set.insert(project);
        }
        set
    }
}

/// Collaborator that enumerates the files beneath a project root.
pub trait FileLister {
    /// Relative (`/`-separated) paths of every file under `root`.
    fn list_files(&self, root: &Path) -> io::Result<Vec<String>>;
}

/// Default lister: walks the directory tree, honoring .gitignore and
/// skipping hidden files.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkLister;

impl FileLister for WalkLister {
    fn list_files(&self, root: &Path) -> io::Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .build()
        {
            let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(files: &[&str]) -> Project {
        Project::new(
            ProjectId::new("bionic/linker"),
            "bionic/linker",
            files.iter().map(|f| f.to_string()),
        )
    }

    #[test]
    fn test_files_are_sorted_and_normalized() {
        let project = project(&["./b.cc", "a.cc"]);
        let files: Vec<&str> = project.files().collect();
        assert_eq!(files, vec!["a.cc", "b.cc"]);
        assert!(project.contains_file("b.cc"));
    }

    #[test]
    fn test_full_path_join() {
        let project = project(&["src/a.cc"]);
        assert_eq!(project.full_path("src/a.cc"), "bionic/linker/src/a.cc");

        let root = Project::new(ProjectId::new("."), ".", vec!["top.cc".to_string()]);
        assert_eq!(root.full_path("top.cc"), "top.cc");
    }

    #[test]
    fn test_sorted_by_root() {
        let mut set = ProjectSet::new();
        set.insert(Project::new(ProjectId::new("z"), "zebra", vec![]));
        set.insert(Project::new(ProjectId::new("a"), "alpha", vec![]));
        set.insert(Project::new(ProjectId::new("m"), "middle", vec![]));

        let roots: Vec<&str> = set.sorted_by_root().iter().map(|p| p.root_path()).collect();
        assert_eq!(roots, vec!["alpha", "middle", "zebra"]);
    }

    #[test]
    fn test_walk_lister() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.cc"), "").unwrap();
        std::fs::write(dir.path().join("sub/b.cc"), "").unwrap();

        let mut files = WalkLister.list_files(dir.path()).unwrap();
        files.sort();
        assert_eq!(files, vec!["a.cc".to_string(), "sub/b.cc".to_string()]);
    }
}
