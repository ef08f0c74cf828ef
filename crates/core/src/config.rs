use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::approvals::{FlowSettings, MissingApproverPolicy, DEFAULT_LONG_DURATION_DAYS};
use crate::hierarchy::DEFAULT_MAX_DEPTH;
use crate::matrix::{ApprovalMatrix, MatrixError, DEFAULT_TIMEOUT_HOURS};

const MAX_HIERARCHY_DEPTH_LIMIT: usize = 256;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub approval: ApprovalConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug)]
pub struct ApprovalConfig {
    pub matrix_path: Option<PathBuf>,
    pub max_hierarchy_depth: usize,
    pub default_timeout_hours: u32,
    pub long_duration_warning_days: u32,
    pub missing_approver_policy: MissingApproverPolicy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub matrix_path: Option<PathBuf>,
    pub missing_approver_policy: Option<MissingApproverPolicy>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://vestry.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            approval: ApprovalConfig {
                matrix_path: None,
                max_hierarchy_depth: DEFAULT_MAX_DEPTH,
                default_timeout_hours: DEFAULT_TIMEOUT_HOURS,
                long_duration_warning_days: DEFAULT_LONG_DURATION_DAYS,
                missing_approver_policy: MissingApproverPolicy::Warn,
            },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("vestry.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            max_hierarchy_depth: self.approval.max_hierarchy_depth,
            default_timeout_hours: self.approval.default_timeout_hours,
            long_duration_warning_days: self.approval.long_duration_warning_days,
            missing_approver_policy: self.approval.missing_approver_policy,
        }
    }

    /// The configured matrix file, or the built-in church matrix when unset.
    pub fn load_matrix(&self) -> Result<ApprovalMatrix, MatrixError> {
        match &self.approval.matrix_path {
            Some(path) => ApprovalMatrix::load(path),
            None => Ok(ApprovalMatrix::builtin()),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(approval) = patch.approval {
            if let Some(matrix_path) = approval.matrix_path {
                self.approval.matrix_path = Some(matrix_path);
            }
            if let Some(max_hierarchy_depth) = approval.max_hierarchy_depth {
                self.approval.max_hierarchy_depth = max_hierarchy_depth;
            }
            if let Some(default_timeout_hours) = approval.default_timeout_hours {
                self.approval.default_timeout_hours = default_timeout_hours;
            }
            if let Some(long_duration_warning_days) = approval.long_duration_warning_days {
                self.approval.long_duration_warning_days = long_duration_warning_days;
            }
            if let Some(policy) = approval.missing_approver_policy {
                self.approval.missing_approver_policy = policy;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("VESTRY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("VESTRY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("VESTRY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("VESTRY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("VESTRY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let log_level = read_env("VESTRY_LOGGING_LEVEL").or_else(|| read_env("VESTRY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("VESTRY_LOGGING_FORMAT").or_else(|| read_env("VESTRY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("VESTRY_APPROVAL_MATRIX_PATH") {
            self.approval.matrix_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("VESTRY_APPROVAL_MAX_HIERARCHY_DEPTH") {
            self.approval.max_hierarchy_depth =
                parse_usize("VESTRY_APPROVAL_MAX_HIERARCHY_DEPTH", &value)?;
        }
        if let Some(value) = read_env("VESTRY_APPROVAL_DEFAULT_TIMEOUT_HOURS") {
            self.approval.default_timeout_hours =
                parse_u32("VESTRY_APPROVAL_DEFAULT_TIMEOUT_HOURS", &value)?;
        }
        if let Some(value) = read_env("VESTRY_APPROVAL_LONG_DURATION_WARNING_DAYS") {
            self.approval.long_duration_warning_days =
                parse_u32("VESTRY_APPROVAL_LONG_DURATION_WARNING_DAYS", &value)?;
        }
        if let Some(value) = read_env("VESTRY_APPROVAL_MISSING_APPROVER_POLICY") {
            self.approval.missing_approver_policy =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "VESTRY_APPROVAL_MISSING_APPROVER_POLICY".to_string(),
                    value: value.clone(),
                })?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(matrix_path) = overrides.matrix_path {
            self.approval.matrix_path = Some(matrix_path);
        }
        if let Some(policy) = overrides.missing_approver_policy {
            self.approval.missing_approver_policy = policy;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_logging(&self.logging)?;
        validate_approval(&self.approval)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("vestry.toml"), PathBuf::from("config/vestry.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_approval(approval: &ApprovalConfig) -> Result<(), ConfigError> {
    if approval.max_hierarchy_depth == 0 || approval.max_hierarchy_depth > MAX_HIERARCHY_DEPTH_LIMIT
    {
        return Err(ConfigError::Validation(format!(
            "approval.max_hierarchy_depth must be in range 1..={MAX_HIERARCHY_DEPTH_LIMIT}"
        )));
    }

    if approval.default_timeout_hours == 0 {
        return Err(ConfigError::Validation(
            "approval.default_timeout_hours must be greater than zero".to_string(),
        ));
    }

    if approval.long_duration_warning_days == 0 {
        return Err(ConfigError::Validation(
            "approval.long_duration_warning_days must be greater than zero".to_string(),
        ));
    }

    if let Some(path) = &approval.matrix_path {
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "approval.matrix_path `{}` does not exist",
                path.display()
            )));
        }
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
    approval: Option<ApprovalPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalPatch {
    matrix_path: Option<PathBuf>,
    max_hierarchy_depth: Option<usize>,
    default_timeout_hours: Option<u32>,
    long_duration_warning_days: Option<u32>,
    missing_approver_policy: Option<MissingApproverPolicy>,
}
