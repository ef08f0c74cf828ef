//! Read-only view of the organization directory the approval engine queries.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::organization::{ApproverCandidate, OrganizationId, OrganizationNode, PersonId};
use crate::matrix::{normalize_role, ApprovalMatrix};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
    #[error("directory returned malformed data: {0}")]
    Decode(String),
}

#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn organization(
        &self,
        id: &OrganizationId,
    ) -> Result<Option<OrganizationNode>, DirectoryError>;

    /// Active holders of any of `roles` in the given organization.
    async fn role_holders(
        &self,
        organization_id: &OrganizationId,
        roles: &[String],
    ) -> Result<Vec<ApproverCandidate>, DirectoryError>;
}

/// Picks the approver for `roles` in one organization.
///
/// When several people qualify the most senior role wins (per the matrix role
/// ranks), then the role listed first, then the lowest person id.
pub async fn find_approver_in_organization<D>(
    directory: &D,
    matrix: &ApprovalMatrix,
    organization_id: &OrganizationId,
    roles: &[String],
) -> Result<Option<ApproverCandidate>, DirectoryError>
where
    D: OrganizationDirectory + ?Sized,
{
    let roles: Vec<String> = roles.iter().filter(|role| !role.trim().is_empty()).cloned().collect();
    if roles.is_empty() {
        return Ok(None);
    }

    let mut holders = directory.role_holders(organization_id, &roles).await?;
    let role_position = |role: &str| {
        let key = normalize_role(role);
        roles.iter().position(|candidate| normalize_role(candidate) == key).unwrap_or(usize::MAX)
    };

    holders.retain(|holder| role_position(&holder.role) != usize::MAX);
    holders.sort_by(|left, right| {
        matrix
            .role_rank(&right.role)
            .cmp(&matrix.role_rank(&left.role))
            .then_with(|| role_position(&left.role).cmp(&role_position(&right.role)))
            .then_with(|| left.person_id.cmp(&right.person_id))
    });

    Ok(holders.into_iter().next())
}

#[derive(Clone, Debug)]
struct RoleAssignment {
    person_id: PersonId,
    person_name: String,
    organization_id: OrganizationId,
    role: String,
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryOrganizationDirectory {
    organizations: HashMap<OrganizationId, OrganizationNode>,
    assignments: Vec<RoleAssignment>,
    failing: HashSet<OrganizationId>,
    failing_role_lookups: HashSet<(OrganizationId, String)>,
}

impl InMemoryOrganizationDirectory {
    pub fn with_organization(
        mut self,
        id: &str,
        name: &str,
        parent_id: Option<&str>,
    ) -> Self {
        let node = OrganizationNode::new(id, name, parent_id);
        self.organizations.insert(node.id.clone(), node);
        self
    }

    pub fn with_role_holder(
        mut self,
        organization_id: &str,
        role: &str,
        person_id: &str,
        person_name: &str,
    ) -> Self {
        self.assignments.push(RoleAssignment {
            person_id: PersonId(person_id.to_string()),
            person_name: person_name.to_string(),
            organization_id: OrganizationId(organization_id.to_string()),
            role: role.to_string(),
        });
        self
    }

    /// Every lookup touching `organization_id` fails as unavailable.
    pub fn with_failure_on(mut self, organization_id: &str) -> Self {
        self.failing.insert(OrganizationId(organization_id.to_string()));
        self
    }

    /// Role holder lookups in `organization_id` that ask for `role` fail as
    /// unavailable. The organization node itself still resolves.
    pub fn with_role_lookup_failure_on(mut self, organization_id: &str, role: &str) -> Self {
        self.failing_role_lookups
            .insert((OrganizationId(organization_id.to_string()), normalize_role(role)));
        self
    }

    fn check_available(&self, id: &OrganizationId) -> Result<(), DirectoryError> {
        if self.failing.contains(id) {
            return Err(DirectoryError::Unavailable(format!("lookup for organization `{id}` failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl OrganizationDirectory for InMemoryOrganizationDirectory {
    async fn organization(
        &self,
        id: &OrganizationId,
    ) -> Result<Option<OrganizationNode>, DirectoryError> {
        self.check_available(id)?;
        Ok(self.organizations.get(id).cloned())
    }

    async fn role_holders(
        &self,
        organization_id: &OrganizationId,
        roles: &[String],
    ) -> Result<Vec<ApproverCandidate>, DirectoryError> {
        self.check_available(organization_id)?;
        let wanted: HashSet<String> = roles.iter().map(|role| normalize_role(role)).collect();
        if let Some((_, role)) = self
            .failing_role_lookups
            .iter()
            .find(|(failing_org, role)| failing_org == organization_id && wanted.contains(role))
        {
            return Err(DirectoryError::Unavailable(format!(
                "`{role}` lookup for organization `{organization_id}` failed"
            )));
        }
        let organization_name = self
            .organizations
            .get(organization_id)
            .map(|node| node.name.clone())
            .unwrap_or_else(|| organization_id.0.clone());

        Ok(self
            .assignments
            .iter()
            .filter(|assignment| &assignment.organization_id == organization_id)
            .filter(|assignment| wanted.contains(&normalize_role(&assignment.role)))
            .map(|assignment| ApproverCandidate {
                person_id: assignment.person_id.clone(),
                person_name: assignment.person_name.clone(),
                role: assignment.role.clone(),
                organization_id: assignment.organization_id.clone(),
                organization_name: organization_name.clone(),
            })
            .collect())
    }
}
