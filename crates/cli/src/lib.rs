pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::preview::PreviewArgs;
use commands::rules::RulesArgs;

#[derive(Debug, Parser)]
#[command(
    name = "vestry",
    about = "Vestry expense approval routing CLI",
    long_about = "Preview approval flows for church spending requests, inspect the approval matrix, and manage the organization directory database.",
    after_help = "Examples:\n  vestry seed\n  vestry preview --organization org-choir --amount 300000 --category supplies\n  vestry rules --category construction --amount 2000000\n  vestry config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Generate the approval flow a spending request would follow")]
    Preview {
        #[arg(long, help = "Organization the request is raised from")]
        organization: String,
        #[arg(long, help = "Requested amount in whole currency units")]
        amount: String,
        #[arg(long, help = "Spending category, e.g. supplies, construction, salary")]
        category: String,
        #[arg(long, default_value = "cli-requester", help = "Requesting person id")]
        requester: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, help = "low|normal|high|urgent")]
        priority: Option<String>,
        #[arg(long, help = "Approval matrix TOML file (overrides config)")]
        matrix: Option<PathBuf>,
        #[arg(long, help = "Missing approver policy: warn|block")]
        policy: Option<String>,
        #[arg(long, help = "Load the demo directory before previewing")]
        seed_demo: bool,
    },
    #[command(about = "List approval matrix rules or show which rule a request would match")]
    Rules {
        #[arg(long)]
        category: Option<String>,
        #[arg(long, help = "Match a single rule for this amount (requires --category)")]
        amount: Option<String>,
        #[arg(long)]
        organization: Option<String>,
        #[arg(long, help = "Approval matrix TOML file (overrides config)")]
        matrix: Option<PathBuf>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo church directory into the configured database")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Preview {
            organization,
            amount,
            category,
            requester,
            description,
            priority,
            matrix,
            policy,
            seed_demo,
        } => commands::preview::run(PreviewArgs {
            organization,
            amount,
            category,
            requester,
            description,
            priority,
            matrix,
            policy,
            seed_demo,
        }),
        Command::Rules { category, amount, organization, matrix } => {
            commands::rules::run(RulesArgs { category, amount, organization, matrix })
        }
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Command};

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn preview_arguments_parse() {
        let cli = Cli::try_parse_from([
            "vestry",
            "preview",
            "--organization",
            "org-choir",
            "--amount",
            "300000",
            "--category",
            "supplies",
            "--seed-demo",
        ])
        .expect("parse");

        match cli.command {
            Command::Preview { organization, requester, seed_demo, .. } => {
                assert_eq!(organization, "org-choir");
                assert_eq!(requester, "cli-requester");
                assert!(seed_demo);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
