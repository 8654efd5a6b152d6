//! Error taxonomy for bgraph.
//!
//! Fatal conditions abort graph construction or a query session and are
//! carried by [`BGraphError`]. Non-fatal conditions (a malformed module,
//! an unresolved reference) are collected as [`BuildDiagnostic`]s and
//! reported without aborting the build.

use thiserror::Error;

/// A syntax error in one blueprint file.
///
/// Parse errors are scoped to the file (or the module inside it) that
/// produced them; the rest of the tree still builds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{file}:{line}:{column}: {message}")]
pub struct ParseError {
    /// Path of the blueprint file being parsed.
    pub file: String,
    /// 1-indexed line of the offending token.
    pub line: usize,
    /// 1-indexed column of the offending token.
    pub column: usize,
    /// Human-readable cause.
    pub message: String,
}

/// Fatal errors of the build and query sessions.
#[derive(Error, Debug)]
pub enum BGraphError {
    /// A blueprint file was malformed beyond recovery.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The `defaults` reference chain loops back on itself.
    #[error("defaults cycle: {}", .0.join(" -> "))]
    DefaultsCycle(Vec<String>),

    /// Two modules (or a module and a source file) share one identifier.
    #[error("duplicate name `{name}` declared in {first} and {second}")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },

    /// A persisted graph could not be decoded or has an unknown version.
    #[error("unable to load graph: {0}")]
    GraphLoad(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BGraphError>;

/// Non-fatal issues collected while building a graph.
///
/// Diagnostics are returned alongside the finished graph so callers can
/// log or display them; resolution proceeds by omission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildDiagnostic {
    /// A `defaults` entry names a module absent from the name table.
    UnresolvedDefaults { module: String, reference: String },
    /// A dependency or literal source path resolved to nothing.
    UnresolvedReference { module: String, reference: String },
    /// A module was dropped during parsing; the rest of its file survived.
    SkippedModule(ParseError),
}

impl std::fmt::Display for BuildDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildDiagnostic::UnresolvedDefaults { module, reference } => {
                write!(f, "module `{module}`: unresolved defaults `{reference}`")
            }
            BuildDiagnostic::UnresolvedReference { module, reference } => {
                write!(f, "module `{module}`: unresolved reference `{reference}`")
            }
            BuildDiagnostic::SkippedModule(err) => write!(f, "skipped module: {err}"),
        }
    }
}
