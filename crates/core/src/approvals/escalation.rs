use tracing::debug;

use crate::directory::{find_approver_in_organization, DirectoryError, OrganizationDirectory};
use crate::domain::approval::StepResolution;
use crate::domain::organization::{ApproverCandidate, OrganizationNode, OrganizationPath};
use crate::matrix::{normalize_role, ApprovalLevel, ApprovalMatrix};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LevelResolution {
    pub candidate: ApproverCandidate,
    pub resolution: StepResolution,
}

/// Searches for the approver of one level, escalating for required levels.
///
/// Order: the target organization, then each ancestor beyond it, then the
/// alternate roles of each required role across target and ancestors, then
/// the final fallback roles at the root.
pub(crate) async fn resolve_level<D>(
    directory: &D,
    matrix: &ApprovalMatrix,
    path: &OrganizationPath,
    target: &OrganizationNode,
    level: &ApprovalLevel,
) -> Result<Option<LevelResolution>, DirectoryError>
where
    D: OrganizationDirectory + ?Sized,
{
    let ancestors = path.ancestors_after(&target.id);

    if let Some(candidate) =
        find_approver_in_organization(directory, matrix, &target.id, &level.roles).await?
    {
        return Ok(Some(LevelResolution { candidate, resolution: StepResolution::Direct }));
    }

    if !level.required {
        return Ok(None);
    }

    for ancestor in ancestors {
        if let Some(candidate) =
            find_approver_in_organization(directory, matrix, &ancestor.id, &level.roles).await?
        {
            debug!(
                event_name = "approval.level.escalated_to_ancestor",
                level = level.order,
                from_organization = %target.id,
                to_organization = %ancestor.id,
                "required role found higher in hierarchy"
            );
            return Ok(Some(LevelResolution {
                candidate,
                resolution: StepResolution::AncestorEscalation,
            }));
        }
    }

    let primary_roles: Vec<String> = level.roles.iter().map(|role| normalize_role(role)).collect();
    for role in &level.roles {
        let alternates: Vec<String> = matrix
            .escalation
            .alternates_for(role)
            .iter()
            .filter(|alternate| !primary_roles.contains(&normalize_role(alternate)))
            .cloned()
            .collect();
        if alternates.is_empty() {
            continue;
        }

        for node in std::iter::once(target).chain(ancestors) {
            if let Some(candidate) =
                find_approver_in_organization(directory, matrix, &node.id, &alternates).await?
            {
                debug!(
                    event_name = "approval.level.alternate_role",
                    level = level.order,
                    role = %role,
                    alternate = %candidate.role,
                    organization = %node.id,
                    "required role substituted by alternate"
                );
                return Ok(Some(LevelResolution {
                    candidate,
                    resolution: StepResolution::AlternateRole,
                }));
            }
        }
    }

    let fallback_roles = &matrix.escalation.final_fallback_roles;
    if let Some(root) = path.root() {
        if let Some(candidate) =
            find_approver_in_organization(directory, matrix, &root.id, fallback_roles).await?
        {
            debug!(
                event_name = "approval.level.final_fallback",
                level = level.order,
                organization = %root.id,
                role = %candidate.role,
                "required role satisfied by final fallback"
            );
            return Ok(Some(LevelResolution {
                candidate,
                resolution: StepResolution::FinalFallback,
            }));
        }
    }

    Ok(None)
}
