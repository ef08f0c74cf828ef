use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::json;

use crate::commands::{load_config, CommandResult};
use vestry_core::config::{ConfigOverrides, LoadOptions};
use vestry_core::domain::organization::OrganizationId;
use vestry_core::domain::request::SpendingCategory;
use vestry_core::matrix::{ApprovalMatrix, ApprovalMatrixRule};

#[derive(Debug, Clone, Default)]
pub struct RulesArgs {
    pub category: Option<String>,
    pub amount: Option<String>,
    pub organization: Option<String>,
    pub matrix: Option<PathBuf>,
}

/// Lists matrix rules, or reports the single rule a category and amount select.
pub fn run(args: RulesArgs) -> CommandResult {
    let options = LoadOptions {
        overrides: ConfigOverrides { matrix_path: args.matrix.clone(), ..ConfigOverrides::default() },
        ..LoadOptions::default()
    };
    let config = match load_config("rules", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let matrix = match config.load_matrix() {
        Ok(matrix) => matrix,
        Err(error) => {
            return CommandResult::failure(
                "rules",
                "config_validation",
                format!("approval matrix issue: {error}"),
                2,
            )
        }
    };

    let category = match args.category.as_deref().map(SpendingCategory::from_str).transpose() {
        Ok(category) => category,
        Err(error) => return CommandResult::failure("rules", "invalid_request", error.to_string(), 7),
    };

    match args.amount.as_deref() {
        Some(raw_amount) => {
            let Some(category) = category else {
                return CommandResult::failure(
                    "rules",
                    "invalid_request",
                    "--amount requires --category",
                    7,
                );
            };
            let amount = match Decimal::from_str(raw_amount.trim()) {
                Ok(amount) => amount,
                Err(_) => {
                    return CommandResult::failure(
                        "rules",
                        "invalid_request",
                        format!("amount `{raw_amount}` is not a decimal number"),
                        7,
                    )
                }
            };
            let organization = args.organization.map(OrganizationId);
            match_rule(&matrix, amount, category, organization.as_ref())
        }
        None => list_rules(&matrix, category),
    }
}

fn match_rule(
    matrix: &ApprovalMatrix,
    amount: Decimal,
    category: SpendingCategory,
    organization: Option<&OrganizationId>,
) -> CommandResult {
    match matrix.find_rule(amount, category, organization) {
        Some(rule) => CommandResult::success_with_data(
            "rules",
            format!("{category} {amount} matches rule `{}`", rule.id),
            Some(json!({ "fingerprint": matrix.fingerprint(), "rule": rule })),
        ),
        None => CommandResult::failure(
            "rules",
            "no_matching_rule",
            format!("no approval rule covers {category} spending of {amount}"),
            8,
        ),
    }
}

fn list_rules(matrix: &ApprovalMatrix, category: Option<SpendingCategory>) -> CommandResult {
    let rules: Vec<&ApprovalMatrixRule> = matrix
        .rules
        .iter()
        .filter(|rule| category.map_or(true, |category| rule.categories.contains(&category)))
        .collect();

    CommandResult::success_with_data(
        "rules",
        format!("{} rule(s)", rules.len()),
        Some(json!({ "fingerprint": matrix.fingerprint(), "rules": rules })),
    )
}
