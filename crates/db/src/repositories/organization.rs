use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use vestry_core::directory::{DirectoryError, OrganizationDirectory};
use vestry_core::domain::organization::{
    ApproverCandidate, OrganizationId, OrganizationNode, PersonId,
};
use vestry_core::matrix::normalize_role;

use super::RepositoryError;
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRecord {
    pub id: PersonId,
    pub display_name: String,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleAssignmentRecord {
    pub id: String,
    pub organization_id: OrganizationId,
    pub member_id: PersonId,
    pub role: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RoleAssignmentRecord {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.started_at <= at && self.ended_at.map_or(true, |ended| ended > at)
    }
}

/// Organization directory backed by the `organization`, `member` and
/// `role_assignment` tables.
pub struct SqlOrganizationDirectory {
    pool: DbPool,
}

impl SqlOrganizationDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save_organization(&self, node: &OrganizationNode) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO organization (id, name, parent_id, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 parent_id = excluded.parent_id",
        )
        .bind(&node.id.0)
        .bind(&node.name)
        .bind(node.parent_id.as_ref().map(|parent| parent.0.as_str()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_member(&self, member: &MemberRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO member (id, display_name, active, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 display_name = excluded.display_name,
                 active = excluded.active",
        )
        .bind(&member.id.0)
        .bind(&member.display_name)
        .bind(i64::from(member.active))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_role_assignment(
        &self,
        assignment: &RoleAssignmentRecord,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO role_assignment (id, organization_id, member_id, role, started_at, ended_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 organization_id = excluded.organization_id,
                 member_id = excluded.member_id,
                 role = excluded.role,
                 started_at = excluded.started_at,
                 ended_at = excluded.ended_at",
        )
        .bind(&assignment.id)
        .bind(&assignment.organization_id.0)
        .bind(&assignment.member_id.0)
        .bind(normalize_role(&assignment.role))
        .bind(assignment.started_at.to_rfc3339())
        .bind(assignment.ended_at.map(|ended| ended.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_organization(
        &self,
        id: &OrganizationId,
    ) -> Result<Option<OrganizationNode>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, parent_id FROM organization WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_organization(r)?)),
            None => Ok(None),
        }
    }

    /// Holders of `roles` in one organization whose assignment is active at `at`
    /// and whose membership is active.
    pub async fn role_holders_at(
        &self,
        organization_id: &OrganizationId,
        roles: &[String],
        at: DateTime<Utc>,
    ) -> Result<Vec<ApproverCandidate>, RepositoryError> {
        let roles: BTreeSet<String> =
            roles.iter().map(|role| normalize_role(role)).filter(|role| !role.is_empty()).collect();
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; roles.len()].join(", ");
        let sql = format!(
            "SELECT ra.id, ra.organization_id, ra.member_id, ra.role, ra.started_at, ra.ended_at,
                    m.display_name, o.name AS organization_name
             FROM role_assignment ra
             JOIN member m ON m.id = ra.member_id
             JOIN organization o ON o.id = ra.organization_id
             WHERE ra.organization_id = ? AND m.active = 1 AND ra.role IN ({placeholders})
             ORDER BY ra.member_id, ra.role"
        );

        let mut query = sqlx::query(&sql).bind(&organization_id.0);
        for role in &roles {
            query = query.bind(role);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut holders = Vec::with_capacity(rows.len());
        for row in &rows {
            let assignment = row_to_assignment(row)?;
            if !assignment.is_active_at(at) {
                continue;
            }
            let person_name: String =
                row.try_get("display_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let organization_name: String = row
                .try_get("organization_name")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;

            holders.push(ApproverCandidate {
                person_id: assignment.member_id,
                person_name,
                role: assignment.role,
                organization_id: assignment.organization_id,
                organization_name,
            });
        }

        debug!(
            event_name = "directory.sql.role_holders",
            organization_id = %organization_id,
            scanned = rows.len(),
            active = holders.len(),
            "loaded role holders"
        );

        Ok(holders)
    }
}

#[async_trait]
impl OrganizationDirectory for SqlOrganizationDirectory {
    async fn organization(
        &self,
        id: &OrganizationId,
    ) -> Result<Option<OrganizationNode>, DirectoryError> {
        Ok(self.find_organization(id).await?)
    }

    async fn role_holders(
        &self,
        organization_id: &OrganizationId,
        roles: &[String],
    ) -> Result<Vec<ApproverCandidate>, DirectoryError> {
        Ok(self.role_holders_at(organization_id, roles, Utc::now()).await?)
    }
}

fn row_to_organization(row: &sqlx::sqlite::SqliteRow) -> Result<OrganizationNode, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let parent_id: Option<String> =
        row.try_get("parent_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(OrganizationNode {
        id: OrganizationId(id),
        name,
        parent_id: parent_id.filter(|parent| !parent.trim().is_empty()).map(OrganizationId),
    })
}

fn row_to_assignment(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<RoleAssignmentRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let organization_id: String =
        row.try_get("organization_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let member_id: String =
        row.try_get("member_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role: String = row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let started_at_str: String =
        row.try_get("started_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let ended_at_str: Option<String> =
        row.try_get("ended_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let started_at = parse_timestamp(&id, "started_at", &started_at_str)?;
    let ended_at = ended_at_str
        .as_deref()
        .map(|value| parse_timestamp(&id, "ended_at", value))
        .transpose()?;

    Ok(RoleAssignmentRecord {
        id,
        organization_id: OrganizationId(organization_id),
        member_id: PersonId(member_id),
        role,
        started_at,
        ended_at,
    })
}

fn parse_timestamp(id: &str, column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).map_err(|e| {
        RepositoryError::Decode(format!("role_assignment `{id}` has invalid {column}: {e}"))
    })
}
