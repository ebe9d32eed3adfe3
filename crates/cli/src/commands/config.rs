use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use skelly_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: EXIT_CONFIG,
                output: format!("config validation failed: {error}"),
            };
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> Field {
    Field { key, env_keys, value }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        field("database.url", &["SKELLY_DATABASE_URL"], config.database.url.clone()),
        field(
            "database.max_connections",
            &["SKELLY_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            &["SKELLY_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        field(
            "slack.bot_token",
            &["SKELLY_SLACK_BOT_TOKEN", "SKELLY_BOT_TOKEN"],
            redact_token(config.slack.bot_token.expose_secret()),
        ),
        field(
            "slack.signing_secret",
            &["SKELLY_SLACK_SIGNING_SECRET", "SKELLY_SIGNING_SECRET"],
            redact_secret(config.slack.signing_secret.as_ref()),
        ),
        field("slack.api_base_url", &["SKELLY_SLACK_API_BASE_URL"], config.slack.api_base_url.clone()),
        field("slack.command", &["SKELLY_SLACK_COMMAND"], config.slack.command.clone()),
        field(
            "server.bind_address",
            &["SKELLY_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field("server.port", &["SKELLY_SERVER_PORT", "SKELLY_PORT"], config.server.port.to_string()),
        field(
            "server.route_prefix",
            &["SKELLY_SERVER_ROUTE_PREFIX"],
            config.server.route_prefix.clone(),
        ),
        field(
            "server.graceful_shutdown_secs",
            &["SKELLY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field("emoji.source_url", &["SKELLY_EMOJI_SOURCE_URL"], config.emoji.source_url.clone()),
        field(
            "emoji.refresh_interval_secs",
            &["SKELLY_EMOJI_REFRESH_INTERVAL_SECS"],
            config.emoji.refresh_interval_secs.to_string(),
        ),
        field(
            "emoji.skip_load",
            &["SKELLY_EMOJI_SKIP_LOAD", "SKIP_LOAD"],
            config.emoji.skip_load.to_string(),
        ),
        field(
            "reactions.variant",
            &["SKELLY_REACTIONS_VARIANT"],
            config.reactions.variant.as_str().to_string(),
        ),
        field(
            "logging.level",
            &["SKELLY_LOG_LEVEL", "SKELLY_LOGGING_LEVEL", "LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["SKELLY_LOG_FORMAT", "SKELLY_LOGGING_FORMAT"],
            format!("{:?}", config.logging.format).to_lowercase(),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("skelly.toml"), PathBuf::from("config/skelly.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) if !secret.expose_secret().trim().is_empty() => "<redacted>".to_string(),
        _ => "<unset>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("xoxb-123-456"), "xoxb-***");
        assert_eq!(redact_token("  "), "<empty>");
        assert_eq!(redact_token("opaque"), "<redacted>");
    }

    #[test]
    fn nested_keys_are_found_in_toml() {
        let doc: toml::Value = "[server]\nport = 9000\n".parse().expect("toml");
        assert!(contains_path(&doc, "server.port"));
        assert!(!contains_path(&doc, "server.route_prefix"));
    }
}
