use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::directory::{DirectoryError, OrganizationDirectory};
use crate::domain::organization::{OrganizationId, OrganizationPath};

pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Why an ancestor walk stopped before reaching a node without a parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HierarchyDiagnostic {
    Cycle { revisited: OrganizationId },
    DepthExceeded { max_depth: usize },
    MissingParent { child: OrganizationId, parent: OrganizationId },
}

impl fmt::Display for HierarchyDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { revisited } => {
                write!(f, "organization hierarchy cycles back to `{revisited}`; walk stopped")
            }
            Self::DepthExceeded { max_depth } => {
                write!(f, "organization hierarchy deeper than {max_depth} levels; walk stopped")
            }
            Self::MissingParent { child, parent } => {
                write!(f, "parent `{parent}` of organization `{child}` was not found; walk stopped")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: OrganizationPath,
    pub diagnostics: Vec<HierarchyDiagnostic>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("organization `{0}` not found")]
    OrganizationNotFound(OrganizationId),
    #[error(transparent)]
    Lookup(#[from] DirectoryError),
}

/// Walks parent links from `organization_id` to the root.
///
/// The walk is iterative and bounded: a revisited id or a path longer than
/// `max_depth` ends it with a diagnostic instead of looping.
pub async fn resolve_ancestor_path<D>(
    directory: &D,
    organization_id: &OrganizationId,
    max_depth: usize,
) -> Result<ResolvedPath, HierarchyError>
where
    D: OrganizationDirectory + ?Sized,
{
    let max_depth = max_depth.max(1);
    let Some(start) = directory.organization(organization_id).await? else {
        return Err(HierarchyError::OrganizationNotFound(organization_id.clone()));
    };

    let mut visited = HashSet::from([start.id.clone()]);
    let mut nodes = vec![start];
    let mut diagnostics = Vec::new();

    loop {
        let Some(current) = nodes.last() else {
            break;
        };
        let Some(parent_id) = current.parent_id.clone() else {
            break;
        };
        let current_id = current.id.clone();

        if visited.contains(&parent_id) {
            diagnostics.push(HierarchyDiagnostic::Cycle { revisited: parent_id });
            break;
        }

        if nodes.len() >= max_depth {
            diagnostics.push(HierarchyDiagnostic::DepthExceeded { max_depth });
            break;
        }

        match directory.organization(&parent_id).await? {
            Some(parent) => {
                visited.insert(parent.id.clone());
                nodes.push(parent);
            }
            None => {
                diagnostics.push(HierarchyDiagnostic::MissingParent {
                    child: current_id,
                    parent: parent_id,
                });
                break;
            }
        }
    }

    for diagnostic in &diagnostics {
        warn!(
            event_name = "approval.hierarchy.walk_truncated",
            organization_id = %organization_id,
            diagnostic = %diagnostic,
            "organization hierarchy walk stopped early"
        );
    }

    Ok(ResolvedPath { path: OrganizationPath::new(nodes), diagnostics })
}
