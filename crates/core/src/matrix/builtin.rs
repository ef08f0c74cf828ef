use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use super::{ApprovalLevel, ApprovalMatrix, ApprovalMatrixRule, EscalationPolicy, TargetScope};
use crate::domain::request::SpendingCategory::{self, *};

const OPERATING: &[SpendingCategory] = &[Ministry, Supplies, Event, Equipment, Maintenance, Utilities];

pub(super) fn church_matrix() -> ApprovalMatrix {
    let rules = vec![
        rule("operating-small", &[Ministry, Supplies, Event], None, Some(100_000), 10, vec![
            ApprovalLevel::new(1, &["team_lead"], TargetScope::Own),
        ]),
        rule("equipment-small", &[Equipment, Maintenance, Utilities], None, Some(100_000), 10, vec![
            ApprovalLevel::new(1, &["department_head"], TargetScope::Own),
        ]),
        rule("operating-medium", OPERATING, Some(100_001), Some(500_000), 10, vec![
            ApprovalLevel::new(1, &["department_head"], TargetScope::Own),
            ApprovalLevel::new(2, &["parish_head"], TargetScope::Parent),
        ]),
        rule("operating-large", OPERATING, Some(500_001), None, 10, vec![
            ApprovalLevel::new(1, &["department_head"], TargetScope::Own),
            ApprovalLevel::new(2, &["parish_head"], TargetScope::Parent),
            ApprovalLevel::new(3, &["committee_chair"], TargetScope::Root).with_timeout_hours(48),
        ]),
        rule("facilities-construction", &[Construction, Facilities], None, None, 20, vec![
            ApprovalLevel::new(1, &["department_head"], TargetScope::Own),
            ApprovalLevel::new(2, &["parish_head"], TargetScope::Parent),
            ApprovalLevel::new(3, &["committee_chair"], TargetScope::Root).with_timeout_hours(48),
            ApprovalLevel::new(4, &["senior_pastor"], TargetScope::Root).with_timeout_hours(72),
        ]),
        rule("payroll", &[Salary, Bonus, Benefits], None, None, 30, vec![
            ApprovalLevel::new(1, &["committee_chair", "finance_chair"], TargetScope::Root),
            ApprovalLevel::new(2, &["senior_pastor"], TargetScope::Root).with_timeout_hours(48),
        ]),
        rule("other-general", &[Other], None, Some(50_000), 0, vec![
            ApprovalLevel::new(1, &["department_head", "team_lead"], TargetScope::Own),
        ]),
        rule("other-large", &[Other], Some(50_001), None, 0, vec![
            ApprovalLevel::new(1, &["department_head"], TargetScope::Own),
            ApprovalLevel::new(2, &["parish_head"], TargetScope::Parent),
        ]),
    ];

    ApprovalMatrix::new(rules).with_escalation(escalation_policy()).with_role_ranks(role_ranks())
}

fn escalation_policy() -> EscalationPolicy {
    let alternate_roles = BTreeMap::from([
        (
            "department_head".to_string(),
            strings(&["deputy_head", "team_lead", "leader"]),
        ),
        ("parish_head".to_string(), strings(&["deputy_parish_head", "department_head"])),
        (
            "committee_chair".to_string(),
            strings(&["vice_chair", "secretary_general", "secretary"]),
        ),
    ]);

    EscalationPolicy {
        alternate_roles,
        final_fallback_roles: strings(&["senior_pastor", "chair", "president", "secretary_general"]),
    }
}

fn role_ranks() -> BTreeMap<String, u8> {
    [
        ("leader", 1),
        ("secretary", 1),
        ("team_lead", 2),
        ("deputy_head", 3),
        ("department_head", 4),
        ("deputy_parish_head", 5),
        ("parish_head", 6),
        ("finance_chair", 7),
        ("vice_chair", 7),
        ("secretary_general", 8),
        ("committee_chair", 8),
        ("chair", 9),
        ("president", 9),
        ("senior_pastor", 10),
    ]
    .into_iter()
    .map(|(role, rank)| (role.to_string(), rank))
    .collect()
}

fn rule(
    id: &str,
    categories: &[SpendingCategory],
    min_amount: Option<i64>,
    max_amount: Option<i64>,
    priority: i32,
    levels: Vec<ApprovalLevel>,
) -> ApprovalMatrixRule {
    ApprovalMatrixRule {
        id: id.to_string(),
        categories: categories.iter().copied().collect::<BTreeSet<_>>(),
        min_amount: min_amount.map(|value| Decimal::new(value, 0)),
        max_amount: max_amount.map(|value| Decimal::new(value, 0)),
        organization_id: None,
        priority,
        levels,
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
