//! Approval flow generation.
//!
//! Turns a spending request into an ordered, annotated list of pending
//! approval steps: match the matrix rule, walk the requester's organization
//! hierarchy, resolve (and if needed escalate) one approver per level, then
//! collapse approvers who would otherwise sign twice.

mod escalation;

use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::directory::{DirectoryError, OrganizationDirectory};
use crate::domain::approval::{
    ApprovalFlowPreview, ApprovalStatus, ApprovalStep, StepResolution, UnresolvedLevel,
};
use crate::domain::organization::{OrganizationId, OrganizationNode, OrganizationPath, PersonId};
use crate::domain::request::{SpendingCategory, SpendingRequest, UnknownVariant};
use crate::hierarchy::{resolve_ancestor_path, HierarchyError, DEFAULT_MAX_DEPTH};
use crate::matrix::{ApprovalMatrix, TargetScope, DEFAULT_TIMEOUT_HOURS};

use escalation::{resolve_level, LevelResolution};

pub const HOURS_PER_BUSINESS_DAY: u32 = 24;
pub const DEFAULT_LONG_DURATION_DAYS: u32 = 7;

/// What to do when a required level ends up without an approver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingApproverPolicy {
    #[default]
    Warn,
    Block,
}

impl FromStr for MissingApproverPolicy {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "block" => Ok(Self::Block),
            _ => Err(UnknownVariant { kind: "missing approver policy", value: value.to_string() }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSettings {
    pub max_hierarchy_depth: usize,
    pub default_timeout_hours: u32,
    pub long_duration_warning_days: u32,
    pub missing_approver_policy: MissingApproverPolicy,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            max_hierarchy_depth: DEFAULT_MAX_DEPTH,
            default_timeout_hours: DEFAULT_TIMEOUT_HOURS,
            long_duration_warning_days: DEFAULT_LONG_DURATION_DAYS,
            missing_approver_policy: MissingApproverPolicy::Warn,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("invalid spending request: {0}")]
    InvalidRequest(String),
    #[error("no applicable approval rule for category `{category}` and amount {amount}")]
    NoMatchingRule { category: SpendingCategory, amount: Decimal },
    #[error("organization `{0}` not found")]
    OrganizationNotFound(OrganizationId),
    #[error("directory lookup failed: {0}")]
    Lookup(#[from] DirectoryError),
    #[error("{} required approval level(s) have no approver", levels.len())]
    UnresolvedRequiredLevels { levels: Vec<UnresolvedLevel> },
}

impl FlowError {
    /// Stable machine-readable class, one per operator fix.
    pub fn class(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::NoMatchingRule { .. } => "no_matching_rule",
            Self::OrganizationNotFound(_) => "organization_not_found",
            Self::Lookup(_) => "lookup_failure",
            Self::UnresolvedRequiredLevels { .. } => "unresolved_approvers",
        }
    }
}

impl From<HierarchyError> for FlowError {
    fn from(value: HierarchyError) -> Self {
        match value {
            HierarchyError::OrganizationNotFound(id) => Self::OrganizationNotFound(id),
            HierarchyError::Lookup(error) => Self::Lookup(error),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct CollapsedDuplicate {
    approver_id: PersonId,
    approver_name: String,
    dropped_order: u32,
    kept_order: u32,
}

/// Stateless approval planner over a directory and a matrix.
pub struct ApprovalFlowGenerator<D> {
    directory: D,
    matrix: ApprovalMatrix,
    matrix_fingerprint: String,
    settings: FlowSettings,
}

impl<D> ApprovalFlowGenerator<D>
where
    D: OrganizationDirectory,
{
    pub fn new(directory: D, matrix: ApprovalMatrix) -> Self {
        let matrix_fingerprint = matrix.fingerprint();
        Self { directory, matrix, matrix_fingerprint, settings: FlowSettings::default() }
    }

    pub fn with_settings(mut self, settings: FlowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn matrix(&self) -> &ApprovalMatrix {
        &self.matrix
    }

    pub async fn generate(
        &self,
        request: &SpendingRequest,
    ) -> Result<ApprovalFlowPreview, FlowError> {
        if request.amount <= Decimal::ZERO {
            return Err(FlowError::InvalidRequest(format!(
                "amount must be greater than zero (got {})",
                request.amount
            )));
        }
        // matrix bands are inclusive whole-unit ranges
        if !request.amount.fract().is_zero() {
            return Err(FlowError::InvalidRequest(format!(
                "amount must be a whole currency unit (got {})",
                request.amount
            )));
        }

        info!(
            event_name = "approval.flow.generate_started",
            organization_id = %request.organization_id,
            requester_id = %request.requester_id,
            category = %request.category,
            amount = %request.amount,
            "generating approval flow"
        );

        let resolved = resolve_ancestor_path(
            &self.directory,
            &request.organization_id,
            self.settings.max_hierarchy_depth,
        )
        .await?;
        let path = resolved.path;

        let rule = self
            .matrix
            .find_rule(request.amount, request.category, Some(&request.organization_id))
            .ok_or(FlowError::NoMatchingRule { category: request.category, amount: request.amount })?;
        debug!(
            event_name = "approval.flow.rule_matched",
            rule_id = %rule.id,
            levels = rule.levels.len(),
            path_depth = path.len(),
            "approval matrix rule matched"
        );

        let mut levels: Vec<_> = rule.levels.iter().collect();
        levels.sort_by_key(|level| level.order);

        let mut diagnostics: Vec<String> =
            resolved.diagnostics.iter().map(|diagnostic| diagnostic.to_string()).collect();
        let mut planned = Vec::with_capacity(levels.len());
        let mut unresolved = Vec::new();

        for level in levels {
            let Some(target) = target_node(&path, level.target) else {
                warn!(
                    event_name = "approval.level.target_unresolved",
                    level = level.order,
                    "approval level skipped, target organization unresolved"
                );
                diagnostics.push(format!(
                    "approval level {} skipped: target organization could not be resolved",
                    level.order
                ));
                continue;
            };

            match resolve_level(&self.directory, &self.matrix, &path, target, level).await? {
                Some(LevelResolution { candidate, resolution }) => planned.push(ApprovalStep {
                    step_order: level.order,
                    approver_id: candidate.person_id,
                    approver_name: candidate.person_name,
                    role: candidate.role,
                    required_roles: level.roles.clone(),
                    organization_id: candidate.organization_id,
                    organization_name: candidate.organization_name,
                    status: ApprovalStatus::Pending,
                    required: level.required,
                    parallel: level.parallel,
                    timeout_hours: level.effective_timeout_hours(self.settings.default_timeout_hours),
                    resolution,
                }),
                None if level.required => {
                    warn!(
                        event_name = "approval.level.unresolved",
                        level = level.order,
                        roles = ?level.roles,
                        "no approver found for required level after escalation"
                    );
                    unresolved.push(UnresolvedLevel {
                        step_order: level.order,
                        required_roles: level.roles.clone(),
                        target_organization_id: target.id.clone(),
                    });
                }
                None => {
                    debug!(
                        event_name = "approval.level.optional_omitted",
                        level = level.order,
                        "optional level has no approver and was omitted"
                    );
                }
            }
        }

        let (steps, duplicates) = collapse_duplicate_approvers(planned);

        if self.settings.missing_approver_policy == MissingApproverPolicy::Block
            && !unresolved.is_empty()
        {
            return Err(FlowError::UnresolvedRequiredLevels { levels: unresolved });
        }

        let total_timeout_hours: u32 = steps.iter().map(|step| step.timeout_hours).sum();
        let estimated_days = total_timeout_hours.div_ceil(HOURS_PER_BUSINESS_DAY);
        let warnings = build_warnings(
            &steps,
            &unresolved,
            &duplicates,
            estimated_days,
            self.settings.long_duration_warning_days,
            diagnostics,
        );

        info!(
            event_name = "approval.flow.generated",
            rule_id = %rule.id,
            steps = steps.len(),
            unresolved = unresolved.len(),
            estimated_days,
            "approval flow generated"
        );

        Ok(ApprovalFlowPreview {
            matched_rule_id: rule.id.clone(),
            matrix_fingerprint: self.matrix_fingerprint.clone(),
            priority: request.priority,
            total_steps: steps.len(),
            steps,
            total_timeout_hours,
            estimated_days,
            unresolved_levels: unresolved,
            warnings,
        })
    }
}

fn target_node(path: &OrganizationPath, scope: TargetScope) -> Option<&OrganizationNode> {
    match scope {
        TargetScope::Own => path.own(),
        TargetScope::Parent => path.parent(),
        TargetScope::Root => path.root(),
    }
}

/// Keeps only the highest-order step of each approver, ascending by order.
fn collapse_duplicate_approvers(
    mut planned: Vec<ApprovalStep>,
) -> (Vec<ApprovalStep>, Vec<CollapsedDuplicate>) {
    planned.sort_by(|left, right| right.step_order.cmp(&left.step_order));

    let mut kept: Vec<ApprovalStep> = Vec::with_capacity(planned.len());
    let mut seen: HashSet<PersonId> = HashSet::new();
    let mut duplicates = Vec::new();

    for step in planned {
        if seen.insert(step.approver_id.clone()) {
            kept.push(step);
            continue;
        }

        let kept_order = kept
            .iter()
            .find(|existing| existing.approver_id == step.approver_id)
            .map(|existing| existing.step_order)
            .unwrap_or(step.step_order);
        duplicates.push(CollapsedDuplicate {
            approver_id: step.approver_id,
            approver_name: step.approver_name,
            dropped_order: step.step_order,
            kept_order,
        });
    }

    kept.sort_by_key(|step| step.step_order);
    duplicates.sort_by_key(|duplicate| duplicate.dropped_order);
    (kept, duplicates)
}

fn build_warnings(
    steps: &[ApprovalStep],
    unresolved: &[UnresolvedLevel],
    duplicates: &[CollapsedDuplicate],
    estimated_days: u32,
    long_duration_days: u32,
    diagnostics: Vec<String>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if !unresolved.is_empty() {
        let orders =
            unresolved.iter().map(|level| level.step_order.to_string()).collect::<Vec<_>>();
        warnings.push(format!(
            "no approver found for {} required step(s) (levels {})",
            unresolved.len(),
            orders.join(", ")
        ));
    }

    for duplicate in duplicates {
        warnings.push(format!(
            "duplicate approver {} ({}) across steps {} and {}; kept step {}",
            duplicate.approver_name,
            duplicate.approver_id,
            duplicate.dropped_order,
            duplicate.kept_order,
            duplicate.kept_order
        ));
    }

    let escalated = steps.iter().filter(|step| step.resolution.is_escalated()).count();
    if escalated > 0 {
        warnings.push(format!("{escalated} step(s) resolved through escalation"));
    }

    if estimated_days > long_duration_days {
        warnings.push(format!(
            "estimated duration of {estimated_days} days exceeds {long_duration_days} days"
        ));
    }

    warnings.extend(diagnostics);
    warnings
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use super::{ApprovalFlowGenerator, FlowError, FlowSettings, MissingApproverPolicy};
    use crate::directory::{DirectoryError, InMemoryOrganizationDirectory};
    use crate::domain::approval::{ApprovalStatus, StepResolution};
    use crate::domain::organization::OrganizationId;
    use crate::domain::request::{RequestPriority, SpendingCategory, SpendingRequest};
    use crate::matrix::{ApprovalLevel, ApprovalMatrix, ApprovalMatrixRule, TargetScope};

    fn church() -> InMemoryOrganizationDirectory {
        InMemoryOrganizationDirectory::default()
            .with_organization("org-root", "Grace Church", None)
            .with_organization("org-music", "Music Department", Some("org-root"))
            .with_organization("org-choir", "Choir Team", Some("org-music"))
    }

    fn request(amount: i64, category: SpendingCategory) -> SpendingRequest {
        SpendingRequest::new("p-requester", "org-choir", Decimal::new(amount, 0), category)
            .with_description("hymnals and sheet music")
    }

    fn generator(directory: InMemoryOrganizationDirectory) -> ApprovalFlowGenerator<InMemoryOrganizationDirectory> {
        ApprovalFlowGenerator::new(directory, ApprovalMatrix::builtin())
    }

    #[tokio::test]
    async fn small_supplies_request_routes_to_own_team_lead() {
        let directory = church().with_role_holder("org-choir", "team_lead", "p-choir-lead", "Park Hana");

        let preview = generator(directory)
            .generate(&request(80_000, SpendingCategory::Supplies))
            .await
            .expect("flow");

        assert_eq!(preview.matched_rule_id, "operating-small");
        assert_eq!(preview.total_steps, 1);
        let step = &preview.steps[0];
        assert_eq!(step.step_order, 1);
        assert_eq!(step.approver_id.0, "p-choir-lead");
        assert_eq!(step.organization_name, "Choir Team");
        assert_eq!(step.status, ApprovalStatus::Pending);
        assert_eq!(step.resolution, StepResolution::Direct);
        assert_eq!(preview.estimated_days, 1);
        assert!(preview.warnings.is_empty(), "unexpected warnings: {:?}", preview.warnings);
    }

    #[tokio::test]
    async fn missing_department_head_escalates_to_parent_organization() {
        let directory = church()
            .with_role_holder("org-music", "department_head", "p-music-head", "Kim Sora")
            .with_role_holder("org-root", "parish_head", "p-parish", "Choi Daniel");

        let preview = generator(directory)
            .generate(&request(300_000, SpendingCategory::Supplies))
            .await
            .expect("flow");

        assert_eq!(preview.matched_rule_id, "operating-medium");
        assert_eq!(preview.total_steps, 2);
        assert_eq!(preview.steps[0].approver_id.0, "p-music-head");
        assert_eq!(preview.steps[0].organization_name, "Music Department");
        assert_eq!(preview.steps[0].resolution, StepResolution::AncestorEscalation);
        assert_eq!(preview.steps[1].approver_id.0, "p-parish");
        assert_eq!(preview.steps[1].organization_name, "Grace Church");
        assert!(preview.warnings.iter().any(|warning| warning.contains("2 step(s) resolved through escalation")));
    }

    #[tokio::test]
    async fn escalated_step_sits_strictly_higher_than_its_target() {
        let directory = church()
            .with_role_holder("org-music", "department_head", "p-music-head", "Kim Sora")
            .with_role_holder("org-root", "parish_head", "p-parish", "Choi Daniel");
        let generator = generator(directory);

        let preview = generator.generate(&request(300_000, SpendingCategory::Supplies)).await.expect("flow");
        let path = ["org-choir", "org-music", "org-root"];
        let position = |id: &OrganizationId| path.iter().position(|candidate| *candidate == id.0);

        // level 1 targets own (index 0), level 2 targets parent (index 1)
        assert!(position(&preview.steps[0].organization_id) > Some(0));
        assert!(position(&preview.steps[1].organization_id) > Some(1));
    }

    #[tokio::test]
    async fn construction_request_reports_unfilled_final_level() {
        let directory = church()
            .with_role_holder("org-choir", "department_head", "p-choir-head", "Yoon Seo")
            .with_role_holder("org-music", "parish_head", "p-parish", "Choi Daniel")
            .with_role_holder("org-root", "committee_chair", "p-chair", "Han Mirae");

        let preview = generator(directory)
            .generate(&request(2_000_000, SpendingCategory::Construction))
            .await
            .expect("flow");

        assert_eq!(preview.matched_rule_id, "facilities-construction");
        assert_eq!(preview.total_steps, 3);
        assert_eq!(
            preview.steps.iter().map(|step| step.step_order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(preview.unresolved_levels.len(), 1);
        assert_eq!(preview.unresolved_levels[0].step_order, 4);
        assert!(preview
            .warnings
            .iter()
            .any(|warning| warning.starts_with("no approver found for 1 required step")));
        assert_eq!(preview.total_timeout_hours, 96);
        assert_eq!(preview.estimated_days, 4);
    }

    #[tokio::test]
    async fn small_other_request_uses_generic_rule() {
        let directory =
            church().with_role_holder("org-choir", "department_head", "p-choir-head", "Yoon Seo");

        let preview = generator(directory)
            .generate(&request(10_000, SpendingCategory::Other))
            .await
            .expect("flow");

        assert_eq!(preview.matched_rule_id, "other-general");
        assert_eq!(preview.total_steps, 1);
        assert_eq!(preview.steps[0].approver_id.0, "p-choir-head");
    }

    #[tokio::test]
    async fn person_holding_two_levels_signs_once_at_higher_step() {
        let directory = church()
            .with_role_holder("org-choir", "department_head", "p-kim", "Kim Sora")
            .with_role_holder("org-root", "parish_head", "p-kim", "Kim Sora");

        let preview = generator(directory)
            .generate(&request(300_000, SpendingCategory::Supplies))
            .await
            .expect("flow");

        assert_eq!(preview.total_steps, 1);
        assert_eq!(preview.steps[0].step_order, 2);
        assert_eq!(preview.steps[0].role, "parish_head");
        assert!(preview
            .warnings
            .iter()
            .any(|warning| warning.contains("duplicate approver Kim Sora (p-kim) across steps 1 and 2")));
    }

    #[tokio::test]
    async fn unknown_organization_fails_with_reference_error() {
        let mut unknown = request(80_000, SpendingCategory::Supplies);
        unknown.organization_id = OrganizationId("org-missing".to_string());

        let error = generator(church()).generate(&unknown).await.expect_err("unknown org");

        assert_eq!(error, FlowError::OrganizationNotFound(OrganizationId("org-missing".to_string())));
        assert_eq!(error.class(), "organization_not_found");
    }

    #[tokio::test]
    async fn unroutable_request_fails_with_configuration_error() {
        let matrix = ApprovalMatrix::new(vec![ApprovalMatrixRule {
            id: "supplies-only".to_string(),
            categories: BTreeSet::from([SpendingCategory::Supplies]),
            min_amount: None,
            max_amount: None,
            organization_id: None,
            priority: 0,
            levels: vec![ApprovalLevel::new(1, &["team_lead"], TargetScope::Own)],
        }]);

        let error = ApprovalFlowGenerator::new(church(), matrix)
            .generate(&request(80_000, SpendingCategory::Salary))
            .await
            .expect_err("no rule");

        assert!(matches!(error, FlowError::NoMatchingRule { category: SpendingCategory::Salary, .. }));
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected() {
        let error = generator(church())
            .generate(&request(0, SpendingCategory::Supplies))
            .await
            .expect_err("zero amount");

        assert_eq!(error.class(), "invalid_request");
    }

    #[tokio::test]
    async fn amount_between_whole_unit_tiers_is_rejected_as_invalid_request() {
        let mut between_tiers = request(80_000, SpendingCategory::Supplies);
        between_tiers.amount = Decimal::new(10_000_050, 2);

        let error = generator(church()).generate(&between_tiers).await.expect_err("fractional amount");

        assert!(matches!(error, FlowError::InvalidRequest(ref message) if message.contains("100000.50")));
        assert_eq!(error.class(), "invalid_request");
    }

    #[tokio::test]
    async fn zero_minor_units_count_as_whole_amount() {
        let directory = church().with_role_holder("org-choir", "team_lead", "p-choir-lead", "Park Hana");
        let mut whole = request(80_000, SpendingCategory::Supplies);
        whole.amount = Decimal::new(10_000_000, 2);

        let preview = generator(directory).generate(&whole).await.expect("flow");

        assert_eq!(preview.matched_rule_id, "operating-small");
    }

    #[tokio::test]
    async fn directory_failure_during_hierarchy_walk_propagates() {
        let directory = church()
            .with_role_holder("org-root", "parish_head", "p-parish", "Choi Daniel")
            .with_failure_on("org-music");
        let generator = generator(directory);

        let error = generator
            .generate(&request(300_000, SpendingCategory::Supplies))
            .await
            .expect_err("lookup failure");

        assert!(matches!(error, FlowError::Lookup(DirectoryError::Unavailable(_))));
    }

    async fn escalation_lookup_error(directory: InMemoryOrganizationDirectory) -> FlowError {
        generator(directory)
            .generate(&request(50_000, SpendingCategory::Equipment))
            .await
            .expect_err("lookup failure")
    }

    #[tokio::test]
    async fn role_lookup_failure_in_ancestor_search_propagates() {
        let directory = church().with_role_lookup_failure_on("org-music", "department_head");

        let error = escalation_lookup_error(directory).await;

        assert!(matches!(
            error,
            FlowError::Lookup(DirectoryError::Unavailable(ref message)) if message.contains("org-music")
        ));
        assert_eq!(error.class(), "lookup_failure");
    }

    #[tokio::test]
    async fn role_lookup_failure_in_alternate_role_search_propagates() {
        let directory = church().with_role_lookup_failure_on("org-choir", "team_lead");

        let error = escalation_lookup_error(directory).await;

        assert!(matches!(
            error,
            FlowError::Lookup(DirectoryError::Unavailable(ref message)) if message.contains("team_lead")
        ));
    }

    #[tokio::test]
    async fn role_lookup_failure_in_final_fallback_search_propagates() {
        let directory = church().with_role_lookup_failure_on("org-root", "senior_pastor");

        let error = escalation_lookup_error(directory).await;

        assert!(matches!(
            error,
            FlowError::Lookup(DirectoryError::Unavailable(ref message)) if message.contains("senior_pastor")
        ));
    }

    #[tokio::test]
    async fn role_lookup_failure_is_not_reached_when_direct_holder_exists() {
        let directory = church()
            .with_role_holder("org-choir", "department_head", "p-choir-head", "Yoon Seo")
            .with_role_lookup_failure_on("org-root", "senior_pastor");

        let preview = generator(directory)
            .generate(&request(50_000, SpendingCategory::Equipment))
            .await
            .expect("flow");

        assert_eq!(preview.steps[0].approver_id.0, "p-choir-head");
    }

    #[tokio::test]
    async fn repeated_generation_is_deterministic() {
        let directory = church()
            .with_role_holder("org-choir", "department_head", "p-b", "Second Head")
            .with_role_holder("org-choir", "department_head", "p-a", "First Head")
            .with_role_holder("org-root", "parish_head", "p-parish", "Choi Daniel");
        let generator = generator(directory);
        let request = request(300_000, SpendingCategory::Supplies);

        let first = generator.generate(&request).await.expect("first");
        let second = generator.generate(&request).await.expect("second");

        assert_eq!(first, second);
        assert_eq!(first.steps[0].approver_id.0, "p-a");
    }

    #[tokio::test]
    async fn single_node_path_resolves_parent_and_root_targets_to_itself() {
        let directory = InMemoryOrganizationDirectory::default()
            .with_organization("org-root", "Grace Church", None)
            .with_role_holder("org-root", "treasurer", "p-treasurer", "Treasurer")
            .with_role_holder("org-root", "elder", "p-elder", "Elder")
            .with_role_holder("org-root", "senior_pastor", "p-pastor", "Pastor");
        let matrix = ApprovalMatrix::new(vec![ApprovalMatrixRule {
            id: "three-scopes".to_string(),
            categories: BTreeSet::from([SpendingCategory::Event]),
            min_amount: None,
            max_amount: None,
            organization_id: None,
            priority: 0,
            levels: vec![
                ApprovalLevel::new(1, &["treasurer"], TargetScope::Own),
                ApprovalLevel::new(2, &["elder"], TargetScope::Parent),
                ApprovalLevel::new(3, &["senior_pastor"], TargetScope::Root),
            ],
        }]);
        let request =
            SpendingRequest::new("p-requester", "org-root", Decimal::new(5_000, 0), SpendingCategory::Event);

        let preview = ApprovalFlowGenerator::new(directory, matrix).generate(&request).await.expect("flow");

        assert_eq!(preview.total_steps, 3);
        assert!(preview.steps.iter().all(|step| step.organization_id.0 == "org-root"));
        assert!(preview.steps.iter().all(|step| step.resolution == StepResolution::Direct));
    }

    #[tokio::test]
    async fn alternate_role_fills_missing_department_head() {
        let directory = church().with_role_holder("org-choir", "team_lead", "p-lead", "Park Hana");

        let preview = generator(directory)
            .generate(&request(50_000, SpendingCategory::Equipment))
            .await
            .expect("flow");

        assert_eq!(preview.matched_rule_id, "equipment-small");
        assert_eq!(preview.steps[0].approver_id.0, "p-lead");
        assert_eq!(preview.steps[0].role, "team_lead");
        assert_eq!(preview.steps[0].resolution, StepResolution::AlternateRole);
        assert_eq!(preview.steps[0].required_roles, vec!["department_head".to_string()]);
    }

    #[tokio::test]
    async fn final_fallback_uses_senior_role_at_root() {
        let directory =
            church().with_role_holder("org-root", "senior_pastor", "p-pastor", "Rev. Jung");

        let preview = generator(directory)
            .generate(&request(50_000, SpendingCategory::Equipment))
            .await
            .expect("flow");

        assert_eq!(preview.steps[0].approver_id.0, "p-pastor");
        assert_eq!(preview.steps[0].organization_name, "Grace Church");
        assert_eq!(preview.steps[0].resolution, StepResolution::FinalFallback);
    }

    #[tokio::test]
    async fn optional_level_without_approver_is_omitted_silently() {
        let directory = church().with_role_holder("org-choir", "team_lead", "p-lead", "Park Hana");
        let matrix = ApprovalMatrix::new(vec![ApprovalMatrixRule {
            id: "optional-second".to_string(),
            categories: BTreeSet::from([SpendingCategory::Ministry]),
            min_amount: None,
            max_amount: None,
            organization_id: None,
            priority: 0,
            levels: vec![
                ApprovalLevel::new(1, &["team_lead"], TargetScope::Own),
                ApprovalLevel::new(2, &["parish_head"], TargetScope::Parent).optional().parallel(),
            ],
        }])
        .with_escalation(ApprovalMatrix::builtin().escalation);

        let preview = ApprovalFlowGenerator::new(directory, matrix)
            .generate(&request(1_000, SpendingCategory::Ministry))
            .await
            .expect("flow");

        assert_eq!(preview.total_steps, 1);
        assert!(preview.unresolved_levels.is_empty());
        assert!(preview.warnings.is_empty());
    }

    #[tokio::test]
    async fn block_policy_turns_unfilled_required_level_into_error() {
        let directory = church().with_role_holder("org-choir", "department_head", "p-head", "Yoon Seo");
        let generator = generator(directory).with_settings(FlowSettings {
            missing_approver_policy: MissingApproverPolicy::Block,
            ..FlowSettings::default()
        });

        let error = generator
            .generate(&request(300_000, SpendingCategory::Supplies))
            .await
            .expect_err("parish head missing");

        assert!(matches!(error, FlowError::UnresolvedRequiredLevels { ref levels } if levels.len() == 1));
        assert_eq!(error.class(), "unresolved_approvers");
    }

    #[tokio::test]
    async fn long_flows_carry_duration_warning() {
        let directory = church()
            .with_role_holder("org-choir", "department_head", "p-choir-head", "Yoon Seo")
            .with_role_holder("org-music", "parish_head", "p-parish", "Choi Daniel")
            .with_role_holder("org-root", "committee_chair", "p-chair", "Han Mirae")
            .with_role_holder("org-root", "senior_pastor", "p-pastor", "Rev. Jung");
        let generator = generator(directory).with_settings(FlowSettings {
            long_duration_warning_days: 5,
            ..FlowSettings::default()
        });

        let preview = generator
            .generate(&request(2_000_000, SpendingCategory::Facilities))
            .await
            .expect("flow");

        assert_eq!(preview.total_timeout_hours, 168);
        assert_eq!(preview.estimated_days, 7);
        assert!(preview.warnings.contains(&"estimated duration of 7 days exceeds 5 days".to_string()));
    }

    #[tokio::test]
    async fn hierarchy_cycle_surfaces_as_warning() {
        let directory = InMemoryOrganizationDirectory::default()
            .with_organization("org-a", "Team A", Some("org-b"))
            .with_organization("org-b", "Dept B", Some("org-a"))
            .with_role_holder("org-a", "team_lead", "p-lead", "Lead");
        let request =
            SpendingRequest::new("p-requester", "org-a", Decimal::new(1_000, 0), SpendingCategory::Event)
                .with_priority(RequestPriority::Urgent);

        let preview = generator(directory).generate(&request).await.expect("flow");

        assert_eq!(preview.priority, RequestPriority::Urgent);
        assert_eq!(preview.total_steps, 1);
        assert!(preview.warnings.iter().any(|warning| warning.contains("cycles back to `org-a`")));
    }

    #[tokio::test]
    async fn steps_are_strictly_ordered_with_unique_approvers() {
        let directory = church()
            .with_role_holder("org-choir", "department_head", "p-1", "One")
            .with_role_holder("org-music", "parish_head", "p-2", "Two")
            .with_role_holder("org-root", "committee_chair", "p-3", "Three")
            .with_role_holder("org-root", "senior_pastor", "p-1", "One");

        let preview = generator(directory)
            .generate(&request(5_000_000, SpendingCategory::Construction))
            .await
            .expect("flow");

        let orders: Vec<u32> = preview.steps.iter().map(|step| step.step_order).collect();
        assert!(orders.windows(2).all(|pair| pair[0] < pair[1]));
        let approvers: BTreeSet<_> = preview.approver_ids().into_iter().collect();
        assert_eq!(approvers.len(), preview.total_steps);
        assert_eq!(orders, vec![2, 3, 4]);
    }
}
