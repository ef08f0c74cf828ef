use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use vestry_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let matrix_path = config
        .approval
        .matrix_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<builtin>".to_string());
    let matrix_fingerprint = match config.load_matrix() {
        Ok(matrix) => matrix.fingerprint(),
        Err(error) => format!("<invalid: {error}>"),
    };

    let entries = [
        (
            "database.url",
            config.database.url.clone(),
            source("database.url", &["VESTRY_DATABASE_URL"]),
        ),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            source("database.max_connections", &["VESTRY_DATABASE_MAX_CONNECTIONS"]),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            source("database.timeout_secs", &["VESTRY_DATABASE_TIMEOUT_SECS"]),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", &["VESTRY_LOGGING_LEVEL", "VESTRY_LOG_LEVEL"]),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            source("logging.format", &["VESTRY_LOGGING_FORMAT", "VESTRY_LOG_FORMAT"]),
        ),
        (
            "approval.matrix_path",
            matrix_path,
            source("approval.matrix_path", &["VESTRY_APPROVAL_MATRIX_PATH"]),
        ),
        (
            "approval.max_hierarchy_depth",
            config.approval.max_hierarchy_depth.to_string(),
            source("approval.max_hierarchy_depth", &["VESTRY_APPROVAL_MAX_HIERARCHY_DEPTH"]),
        ),
        (
            "approval.default_timeout_hours",
            config.approval.default_timeout_hours.to_string(),
            source("approval.default_timeout_hours", &["VESTRY_APPROVAL_DEFAULT_TIMEOUT_HOURS"]),
        ),
        (
            "approval.long_duration_warning_days",
            config.approval.long_duration_warning_days.to_string(),
            source(
                "approval.long_duration_warning_days",
                &["VESTRY_APPROVAL_LONG_DURATION_WARNING_DAYS"],
            ),
        ),
        (
            "approval.missing_approver_policy",
            format!("{:?}", config.approval.missing_approver_policy),
            source(
                "approval.missing_approver_policy",
                &["VESTRY_APPROVAL_MISSING_APPROVER_POLICY"],
            ),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.into_iter().map(|(key, value, source)| render_line(key, &value, source)));
    lines.push(format!("- approval matrix fingerprint = {matrix_fingerprint}"));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("vestry.toml"), PathBuf::from("config/vestry.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
