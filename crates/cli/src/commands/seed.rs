use serde_json::json;

use crate::commands::{build_runtime, load_config, CommandResult};
use vestry_core::config::LoadOptions;
use vestry_db::{connect_with_settings, migrations, DemoDirectoryDataset, SeedResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed", LoadOptions::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
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
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = DemoDirectoryDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8))?;

        let verification = DemoDirectoryDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedResult, (&'static str, String, u8)> =
            if verification.all_present {
                Ok(seed_result)
            } else {
                let failed_checks = verification
                    .checks
                    .iter()
                    .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                    .collect::<Vec<_>>();
                Err(("seed_verification", verification_failure_message(&failed_checks), 6u8))
            };

        pool.close().await;
        run_result
    });

    match result {
        Ok(seed) => {
            let message = format!(
                "demo directory loaded: {} organizations, {} active approvers",
                seed.organizations.len(),
                seed.active_approvers
            );
            CommandResult::success_with_data(
                "seed",
                message,
                Some(json!({ "organizations": seed.organizations })),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some demo directory rows failed to load".to_string()
    } else {
        format!("demo directory verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let message = verification_failure_message(&[
            "organization:org-choir",
            "active:org-root:senior_pastor:p-pastor",
        ]);

        assert_eq!(
            message,
            "demo directory verification failed for checks: organization:org-choir, active:org-root:senior_pastor:p-pastor"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_failure_message(&[]), "some demo directory rows failed to load");
    }
}
