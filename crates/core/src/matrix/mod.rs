//! Approval matrix: the rule table mapping a spending category and amount
//! band (optionally scoped to one organization) to ordered approval levels.

mod builtin;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::organization::OrganizationId;
use crate::domain::request::SpendingCategory;

pub const DEFAULT_TIMEOUT_HOURS: u32 = 24;

/// Which organization on the requester's path a level searches first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetScope {
    #[default]
    Own,
    Parent,
    Root,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLevel {
    pub order: u32,
    pub roles: Vec<String>,
    #[serde(default)]
    pub target: TargetScope,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_hours: Option<u32>,
}

fn default_required() -> bool {
    true
}

impl ApprovalLevel {
    pub fn new(order: u32, roles: &[&str], target: TargetScope) -> Self {
        Self {
            order,
            roles: roles.iter().map(|role| role.to_string()).collect(),
            target,
            required: true,
            parallel: false,
            timeout_hours: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn with_timeout_hours(mut self, hours: u32) -> Self {
        self.timeout_hours = Some(hours);
        self
    }

    pub fn effective_timeout_hours(&self, default_hours: u32) -> u32 {
        self.timeout_hours.unwrap_or(default_hours)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalMatrixRule {
    pub id: String,
    pub categories: BTreeSet<SpendingCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub priority: i32,
    pub levels: Vec<ApprovalLevel>,
}

impl ApprovalMatrixRule {
    /// Bounds are inclusive on both ends.
    pub fn matches(
        &self,
        amount: Decimal,
        category: SpendingCategory,
        organization_id: Option<&OrganizationId>,
    ) -> bool {
        if !self.categories.contains(&category) {
            return false;
        }

        if let Some(min_amount) = self.min_amount {
            if amount < min_amount {
                return false;
            }
        }

        if let Some(max_amount) = self.max_amount {
            if amount > max_amount {
                return false;
            }
        }

        if let Some(scope) = &self.organization_id {
            if organization_id != Some(scope) {
                return false;
            }
        }

        true
    }
}

/// Substitute roles tried when a required approver cannot be found.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    #[serde(default)]
    pub alternate_roles: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub final_fallback_roles: Vec<String>,
}

impl EscalationPolicy {
    pub fn alternates_for(&self, role: &str) -> &[String] {
        let key = normalize_role(role);
        self.alternate_roles
            .iter()
            .find(|(candidate, _)| normalize_role(candidate) == key)
            .map(|(_, alternates)| alternates.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalMatrix {
    pub rules: Vec<ApprovalMatrixRule>,
    #[serde(default)]
    pub escalation: EscalationPolicy,
    #[serde(default)]
    pub role_ranks: BTreeMap<String, u8>,
}

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("could not read approval matrix `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse approval matrix: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("approval matrix validation failed: {0}")]
    Validation(String),
}

impl ApprovalMatrix {
    pub fn new(rules: Vec<ApprovalMatrixRule>) -> Self {
        Self { rules, escalation: EscalationPolicy::default(), role_ranks: BTreeMap::new() }
    }

    pub fn with_escalation(mut self, escalation: EscalationPolicy) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn with_role_ranks(mut self, role_ranks: BTreeMap<String, u8>) -> Self {
        self.role_ranks = role_ranks;
        self
    }

    pub fn builtin() -> Self {
        builtin::church_matrix()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, MatrixError> {
        let matrix = toml::from_str::<Self>(raw)?;
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn load(path: &Path) -> Result<Self, MatrixError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| MatrixError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), MatrixError> {
        if self.rules.is_empty() {
            return Err(MatrixError::Validation("matrix must declare at least one rule".to_string()));
        }

        let mut seen_ids = HashSet::new();
        for rule in &self.rules {
            validate_rule(rule)?;
            if !seen_ids.insert(rule.id.as_str()) {
                return Err(MatrixError::Validation(format!("duplicate rule id `{}`", rule.id)));
            }
        }

        Ok(())
    }

    /// Highest priority wins; equal priorities fall back to declaration order.
    pub fn find_rule(
        &self,
        amount: Decimal,
        category: SpendingCategory,
        organization_id: Option<&OrganizationId>,
    ) -> Option<&ApprovalMatrixRule> {
        let mut eligible: Vec<(usize, &ApprovalMatrixRule)> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.matches(amount, category, organization_id))
            .collect();
        eligible.sort_by(|(left_index, left), (right_index, right)| {
            right.priority.cmp(&left.priority).then_with(|| left_index.cmp(right_index))
        });
        eligible.into_iter().next().map(|(_, rule)| rule)
    }

    pub fn role_rank(&self, role: &str) -> u8 {
        let key = normalize_role(role);
        self.role_ranks
            .iter()
            .find(|(candidate, _)| normalize_role(candidate) == key)
            .map(|(_, rank)| *rank)
            .unwrap_or(0)
    }

    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&canonical).to_hex().to_string()
    }
}

fn validate_rule(rule: &ApprovalMatrixRule) -> Result<(), MatrixError> {
    if rule.id.trim().is_empty() {
        return Err(MatrixError::Validation("rule id must not be empty".to_string()));
    }

    if rule.categories.is_empty() {
        return Err(MatrixError::Validation(format!(
            "rule `{}` must list at least one category",
            rule.id
        )));
    }

    for bound in [rule.min_amount, rule.max_amount].into_iter().flatten() {
        if bound < Decimal::ZERO {
            return Err(MatrixError::Validation(format!(
                "rule `{}` has a negative amount bound",
                rule.id
            )));
        }
    }

    if let (Some(min_amount), Some(max_amount)) = (rule.min_amount, rule.max_amount) {
        if min_amount > max_amount {
            return Err(MatrixError::Validation(format!(
                "rule `{}` has min_amount {min_amount} above max_amount {max_amount}",
                rule.id
            )));
        }
    }

    if rule.levels.is_empty() {
        return Err(MatrixError::Validation(format!(
            "rule `{}` must declare at least one level",
            rule.id
        )));
    }

    for (expected_order, level) in (1..).zip(&rule.levels) {
        if level.order != expected_order {
            return Err(MatrixError::Validation(format!(
                "rule `{}` level orders must ascend from 1 without gaps (expected {expected_order}, found {})",
                rule.id, level.order
            )));
        }

        if level.roles.iter().all(|role| role.trim().is_empty()) {
            return Err(MatrixError::Validation(format!(
                "rule `{}` level {} must name at least one role",
                rule.id, level.order
            )));
        }

        if level.timeout_hours == Some(0) {
            return Err(MatrixError::Validation(format!(
                "rule `{}` level {} timeout_hours must be greater than zero",
                rule.id, level.order
            )));
        }
    }

    Ok(())
}

/// Role names compare trimmed and case-insensitively.
pub fn normalize_role(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
