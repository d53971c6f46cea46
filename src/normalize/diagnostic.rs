//! Diagnostic types for tree-to-graph normalization.
//!
//! Normalization is best-effort by default: a problem with one entity subtree is recorded
//! here and that subtree is passed through unnormalized, while the rest of the tree is
//! still normalized. Under [`ErrorPolicy::FailFast`](crate::config::ErrorPolicy) the error
//! kinds are returned as `Err` instead.

use crate::{ident::Ident, value::Keyword};

/// Location of a value inside the response tree, e.g. `people > 1 > person/address`.
pub type TreePath = Vec<String>;

fn render_path(path: &TreePath) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(" > ")
    }
}

/// Diagnostic information produced during normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeDiagnostic {
    /// A join whose query has no annotation. The data under it stays embedded in the
    /// output tree.
    UnannotatedJoin { path: TreePath, key: Keyword },

    /// An entity whose ident could not be resolved (malformed rule result or absent ident
    /// field). Its subtree is passed through unnormalized.
    MalformedIdent { path: TreePath, message: String },

    /// An ident that already appears on the current traversal path. Emitted as a reference
    /// without recursing again. Expected for self-referential schemas.
    CycleDetected { path: TreePath, ident: Ident },

    /// The entity nesting depth reached the configured safety cutoff.
    DepthLimit { path: TreePath, depth: usize },

    /// No union branch matched the entity data.
    UnmatchedUnion { path: TreePath, key: Keyword },

    /// A join whose value is neither a map, a list, a reference nor null.
    UnexpectedJoinValue { path: TreePath, key: Keyword },
}

impl NormalizeDiagnostic {
    pub fn path(&self) -> &TreePath {
        match self {
            Self::UnannotatedJoin { path, .. }
            | Self::MalformedIdent { path, .. }
            | Self::CycleDetected { path, .. }
            | Self::DepthLimit { path, .. }
            | Self::UnmatchedUnion { path, .. }
            | Self::UnexpectedJoinValue { path, .. } => path,
        }
    }

    /// Diagnostics that a fail-fast policy would have turned into errors.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::MalformedIdent { .. } | Self::DepthLimit { .. })
    }

    /// Informational diagnostics describe supported situations, not defects.
    pub fn is_info(&self) -> bool {
        matches!(self, Self::CycleDetected { .. })
    }

    pub fn is_unannotated_join(&self) -> bool {
        matches!(self, Self::UnannotatedJoin { .. })
    }
}

impl std::fmt::Display for NormalizeDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnannotatedJoin { path, key } => write!(
                f,
                "Warning: join {key} at {} has no ident annotation; data left unnormalized",
                render_path(path)
            ),
            Self::MalformedIdent { path, message } => {
                write!(f, "Error: malformed ident at {}: {message}", render_path(path))
            }
            Self::CycleDetected { path, ident } => {
                write!(f, "Info: {ident} repeats at {}", render_path(path))
            }
            Self::DepthLimit { path, depth } => write!(
                f,
                "Error: depth limit {depth} reached at {}",
                render_path(path)
            ),
            Self::UnmatchedUnion { path, key } => write!(
                f,
                "Warning: no branch of union {key} matches the data at {}",
                render_path(path)
            ),
            Self::UnexpectedJoinValue { path, key } => write!(
                f,
                "Warning: join {key} at {} holds a scalar",
                render_path(path)
            ),
        }
    }
}
