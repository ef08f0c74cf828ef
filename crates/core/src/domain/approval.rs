use serde::{Deserialize, Serialize};

use crate::domain::organization::{OrganizationId, PersonId};
use crate::domain::request::RequestPriority;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Escalated,
}

/// How the approver of a step was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResolution {
    Direct,
    AncestorEscalation,
    AlternateRole,
    FinalFallback,
}

impl StepResolution {
    pub fn is_escalated(&self) -> bool {
        !matches!(self, Self::Direct)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub step_order: u32,
    pub approver_id: PersonId,
    pub approver_name: String,
    pub role: String,
    pub required_roles: Vec<String>,
    pub organization_id: OrganizationId,
    pub organization_name: String,
    pub status: ApprovalStatus,
    pub required: bool,
    pub parallel: bool,
    pub timeout_hours: u32,
    pub resolution: StepResolution,
}

/// A required level for which escalation found nobody.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedLevel {
    pub step_order: u32,
    pub required_roles: Vec<String>,
    pub target_organization_id: OrganizationId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalFlowPreview {
    pub matched_rule_id: String,
    pub matrix_fingerprint: String,
    pub priority: RequestPriority,
    pub steps: Vec<ApprovalStep>,
    pub total_steps: usize,
    pub total_timeout_hours: u32,
    pub estimated_days: u32,
    pub unresolved_levels: Vec<UnresolvedLevel>,
    pub warnings: Vec<String>,
}

impl ApprovalFlowPreview {
    pub fn approver_ids(&self) -> Vec<&PersonId> {
        self.steps.iter().map(|step| &step.approver_id).collect()
    }

    pub fn has_gaps(&self) -> bool {
        !self.unresolved_levels.is_empty()
    }
}
