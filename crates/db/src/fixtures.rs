use chrono::Utc;
use serde::Serialize;
use sqlx::Executor;
use tracing::info;

use vestry_core::domain::organization::{OrganizationId, PersonId};

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlOrganizationDirectory};

/// Organizations in the demo hierarchy as `(id, name, parent_id)`.
const SEED_ORGANIZATIONS: &[(&str, &str, Option<&str>)] = &[
    ("org-root", "Grace Church", None),
    ("org-music", "Music Department", Some("org-root")),
    ("org-choir", "Choir Team", Some("org-music")),
    ("org-youth", "Youth Department", Some("org-root")),
    ("org-youth-worship", "Youth Worship Team", Some("org-youth")),
    ("org-facilities", "Facilities Department", Some("org-root")),
];

/// Role holders that must resolve as active approvers.
const SEED_ACTIVE_HOLDERS: &[SeedHolderContract] = &[
    SeedHolderContract::new("org-root", "senior_pastor", "p-pastor"),
    SeedHolderContract::new("org-root", "parish_head", "p-parish"),
    SeedHolderContract::new("org-root", "committee_chair", "p-chair"),
    SeedHolderContract::new("org-root", "finance_chair", "p-finance"),
    SeedHolderContract::new("org-music", "department_head", "p-music-head"),
    SeedHolderContract::new("org-choir", "team_lead", "p-choir-lead"),
    SeedHolderContract::new("org-youth", "department_head", "p-youth-head"),
    SeedHolderContract::new("org-youth-worship", "team_lead", "p-youth-lead"),
    SeedHolderContract::new("org-facilities", "department_head", "p-facilities-head"),
];

/// Assignments present in the data that must never resolve: an ended term
/// and a deactivated member.
const SEED_INACTIVE_HOLDERS: &[SeedHolderContract] = &[
    SeedHolderContract::new("org-choir", "team_lead", "p-former-lead"),
    SeedHolderContract::new("org-choir", "department_head", "p-retired"),
];

const SEED_MEMBER_COUNT: i64 = 11;

/// Demo church directory used by `vestry seed` and the integration tests.
pub struct DemoDirectoryDataset;

impl DemoDirectoryDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_directory.sql");

    /// Load the demo directory. Safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        info!(
            event_name = "db.fixtures.demo_directory_loaded",
            organizations = SEED_ORGANIZATIONS.len(),
            approvers = SEED_ACTIVE_HOLDERS.len(),
            "demo directory loaded"
        );

        Ok(SeedResult {
            organizations: SEED_ORGANIZATIONS.iter().map(|(id, _, _)| *id).collect(),
            active_approvers: SEED_ACTIVE_HOLDERS.len(),
        })
    }

    /// Check the seeded rows against the demo contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();
        let directory = SqlOrganizationDirectory::new(pool.clone());
        let now = Utc::now();

        for (id, name, parent) in SEED_ORGANIZATIONS {
            let node = directory.find_organization(&OrganizationId((*id).to_string())).await?;
            let matches = node.is_some_and(|node| {
                node.name == *name
                    && node.parent_id.as_ref().map(|parent| parent.0.as_str()) == *parent
            });
            checks.push((format!("organization:{id}"), matches));
        }

        let member_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM member").fetch_one(pool).await?;
        checks.push(("member-count".to_string(), member_count >= SEED_MEMBER_COUNT));

        for holder in SEED_ACTIVE_HOLDERS {
            let resolved = holder.resolves(&directory, now).await?;
            checks.push((holder.label("active"), resolved));
        }

        for holder in SEED_INACTIVE_HOLDERS {
            let resolved = holder.resolves(&directory, now).await?;
            checks.push((holder.label("inactive"), !resolved));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the demo rows, leaving any other directory data in place.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_orgs = sql_array_from_ids(
            &SEED_ORGANIZATIONS.iter().map(|(id, _, _)| *id).collect::<Vec<_>>(),
        );
        sqlx::query(&format!("DELETE FROM role_assignment WHERE organization_id IN {quoted_orgs}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM organization WHERE id IN {quoted_orgs}"))
            .execute(&mut *tx)
            .await?;
        let quoted_members = sql_array_from_ids(
            &SEED_ACTIVE_HOLDERS
                .iter()
                .chain(SEED_INACTIVE_HOLDERS)
                .map(|holder| holder.member_id)
                .collect::<Vec<_>>(),
        );
        sqlx::query(&format!("DELETE FROM member WHERE id IN {quoted_members}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedHolderContract {
    organization_id: &'static str,
    role: &'static str,
    member_id: &'static str,
}

impl SeedHolderContract {
    const fn new(organization_id: &'static str, role: &'static str, member_id: &'static str) -> Self {
        Self { organization_id, role, member_id }
    }

    fn label(&self, kind: &str) -> String {
        format!("{kind}:{}:{}:{}", self.organization_id, self.role, self.member_id)
    }

    async fn resolves(
        &self,
        directory: &SqlOrganizationDirectory,
        at: chrono::DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let holders = directory
            .role_holders_at(
                &OrganizationId(self.organization_id.to_string()),
                &[self.role.to_string()],
                at,
            )
            .await?;
        let member = PersonId(self.member_id.to_string());
        Ok(holders.iter().any(|holder| holder.person_id == member))
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub organizations: Vec<&'static str>,
    pub active_approvers: usize,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
