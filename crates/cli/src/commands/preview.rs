use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::info;

use crate::commands::{build_runtime, load_config, CommandResult};
use vestry_core::approvals::{ApprovalFlowGenerator, FlowError, MissingApproverPolicy};
use vestry_core::config::{ConfigOverrides, LoadOptions};
use vestry_core::domain::approval::ApprovalFlowPreview;
use vestry_core::domain::request::{RequestPriority, SpendingCategory, SpendingRequest};
use vestry_core::errors::ApplicationError;
use vestry_db::{
    connect_with_settings, migrations, DemoDirectoryDataset, SqlOrganizationDirectory,
};

#[derive(Debug, Clone, Default)]
pub struct PreviewArgs {
    pub organization: String,
    pub amount: String,
    pub category: String,
    pub requester: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub matrix: Option<PathBuf>,
    pub policy: Option<String>,
    pub seed_demo: bool,
}

pub fn run(args: PreviewArgs) -> CommandResult {
    let request = match build_request(&args) {
        Ok(request) => request,
        Err(message) => return CommandResult::failure("preview", "invalid_request", message, 7),
    };
    let missing_approver_policy = match args.policy.as_deref().map(MissingApproverPolicy::from_str)
    {
        None => None,
        Some(Ok(policy)) => Some(policy),
        Some(Err(error)) => {
            return CommandResult::failure("preview", "invalid_request", error.to_string(), 7)
        }
    };

    let options = LoadOptions {
        overrides: ConfigOverrides {
            matrix_path: args.matrix.clone(),
            missing_approver_policy,
            ..ConfigOverrides::default()
        },
        ..LoadOptions::default()
    };
    let config = match load_config("preview", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let matrix = match config.load_matrix() {
        Ok(matrix) => matrix,
        Err(error) => {
            return CommandResult::failure(
                "preview",
                "config_validation",
                format!("approval matrix issue: {error}"),
                2,
            )
        }
    };
    let runtime = match build_runtime("preview") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| PreviewFailure::Setup("db_connectivity", error.to_string(), 4))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| PreviewFailure::Setup("migration", error.to_string(), 5))?;
        if args.seed_demo {
            DemoDirectoryDataset::load(&pool)
                .await
                .map_err(|error| PreviewFailure::Setup("seed_execution", error.to_string(), 6))?;
        }

        let generator =
            ApprovalFlowGenerator::new(SqlOrganizationDirectory::new(pool.clone()), matrix)
                .with_settings(config.flow_settings());
        let outcome = generator.generate(&request).await.map_err(PreviewFailure::Flow);

        pool.close().await;
        outcome
    });

    match result {
        Ok(preview) => render_preview(&preview),
        Err(PreviewFailure::Setup(error_class, message, exit_code)) => {
            CommandResult::failure("preview", error_class, message, exit_code)
        }
        Err(PreviewFailure::Flow(error)) => render_flow_error(error),
    }
}

enum PreviewFailure {
    Setup(&'static str, String, u8),
    Flow(FlowError),
}

fn build_request(args: &PreviewArgs) -> Result<SpendingRequest, String> {
    let amount = parse_amount(&args.amount)?;
    let category = SpendingCategory::from_str(&args.category).map_err(|error| error.to_string())?;
    if args.organization.trim().is_empty() {
        return Err("organization must not be empty".to_string());
    }

    let mut request =
        SpendingRequest::new(args.requester.trim(), args.organization.trim(), amount, category);
    if let Some(description) = &args.description {
        request = request.with_description(description.clone());
    }
    if let Some(priority) = &args.priority {
        let priority = RequestPriority::from_str(priority).map_err(|error| error.to_string())?;
        request = request.with_priority(priority);
    }
    Ok(request)
}

/// Accepts `1,200,000` and `1_200_000` as well as plain decimals.
fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let cleaned: String = raw.trim().chars().filter(|ch| *ch != ',' && *ch != '_').collect();
    Decimal::from_str(&cleaned).map_err(|_| format!("amount `{raw}` is not a decimal number"))
}

fn render_preview(preview: &ApprovalFlowPreview) -> CommandResult {
    info!(
        event_name = "cli.preview.generated",
        rule_id = %preview.matched_rule_id,
        total_steps = preview.total_steps,
        warnings = preview.warnings.len(),
        "approval flow previewed"
    );

    let message = format!(
        "{} approval step(s) via rule `{}`, about {} day(s)",
        preview.total_steps, preview.matched_rule_id, preview.estimated_days
    );
    match serde_json::to_value(preview) {
        Ok(data) => CommandResult::success_with_data("preview", message, Some(data)),
        Err(error) => CommandResult::failure("preview", "serialization", error.to_string(), 1),
    }
}

fn render_flow_error(error: FlowError) -> CommandResult {
    let error_class = error.class();
    let detail = error.to_string();
    let interface = ApplicationError::from(error).into_interface(correlation_id());
    CommandResult::failure(
        "preview",
        error_class,
        format!("{} {detail} (correlation id {})", interface.user_message(), interface.correlation_id()),
        8,
    )
}

fn correlation_id() -> String {
    format!("cli-{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{build_request, parse_amount, PreviewArgs};
    use vestry_core::domain::request::{RequestPriority, SpendingCategory};

    fn args() -> PreviewArgs {
        PreviewArgs {
            organization: "org-choir".to_string(),
            amount: "80,000".to_string(),
            category: "Supplies".to_string(),
            requester: "p-requester".to_string(),
            ..PreviewArgs::default()
        }
    }

    #[test]
    fn amount_accepts_grouping_separators() {
        assert_eq!(parse_amount("1,200,000").expect("amount"), Decimal::new(1_200_000, 0));
        assert_eq!(parse_amount(" 2_500.50 ").expect("amount"), Decimal::new(250_050, 2));
        assert!(parse_amount("lots").is_err());
    }

    #[test]
    fn request_is_built_from_arguments() {
        let mut input = args();
        input.priority = Some("urgent".to_string());
        input.description = Some("hymnals".to_string());

        let request = build_request(&input).expect("request");
        assert_eq!(request.category, SpendingCategory::Supplies);
        assert_eq!(request.amount, Decimal::new(80_000, 0));
        assert_eq!(request.priority, RequestPriority::Urgent);
        assert_eq!(request.description, "hymnals");
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut input = args();
        input.category = "fireworks".to_string();

        let error = build_request(&input).expect_err("unknown category");
        assert!(error.contains("fireworks"));
    }
}
