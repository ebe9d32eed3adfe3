pub mod config;
pub mod doctor;
pub mod migrate;
pub mod reaction;
pub mod stats;

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use skelly_core::config::{AppConfig, LoadOptions};
use skelly_core::reactor::{CollaboratorError, ReactionStore};
use skelly_core::{AliasCache, EmojiSource, ReactionError};
use skelly_db::{connect_with_config, migrations, DbPool, SqlReactionStore};
use skelly_slack::api::{EmojiDataSource, SlackWebClient};

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DATABASE: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_NOT_FOUND: u8 = 6;
pub const EXIT_ALREADY_EXISTS: u8 = 7;
pub const EXIT_INVALID_INPUT: u8 = 8;
pub const EXIT_UPSTREAM: u8 = 9;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// A successful command's message plus optional structured payload.
pub(crate) struct Outcome {
    pub message: String,
    pub data: Option<Value>,
}

impl Outcome {
    pub fn message(message: impl Into<String>) -> Self {
        Self { message: message.into(), data: None }
    }

    pub fn with_data(message: impl Into<String>, data: &impl Serialize) -> Self {
        Self { message: message.into(), data: serde_json::to_value(data).ok() }
    }
}

#[derive(Debug)]
pub(crate) struct Failure {
    pub class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl Failure {
    pub fn database(error: impl Display) -> Self {
        Self { class: "db_connectivity", message: error.to_string(), exit_code: EXIT_DATABASE }
    }

    pub fn migration(error: impl Display) -> Self {
        Self { class: "migration", message: error.to_string(), exit_code: EXIT_MIGRATION }
    }

    pub fn upstream(error: CollaboratorError) -> Self {
        Self {
            class: "upstream_failure",
            message: format!("{}: {}", error.operation, error.message),
            exit_code: EXIT_UPSTREAM,
        }
    }
}

impl From<ReactionError> for Failure {
    fn from(error: ReactionError) -> Self {
        let exit_code = match &error {
            ReactionError::NotFound { .. } => EXIT_NOT_FOUND,
            ReactionError::AlreadyExists { .. } => EXIT_ALREADY_EXISTS,
            ReactionError::InvalidInput(_) | ReactionError::UnknownAlias { .. } => {
                EXIT_INVALID_INPUT
            }
            ReactionError::UpstreamFailure { .. } => EXIT_UPSTREAM,
            ReactionError::StoreUnavailable { .. } => EXIT_DATABASE,
        };
        Self { class: error.class(), message: error.to_string(), exit_code }
    }
}

impl From<CollaboratorError> for Failure {
    fn from(error: CollaboratorError) -> Self {
        Self::upstream(error)
    }
}

/// What a store-backed command gets to work with.
pub(crate) struct Session {
    pub config: AppConfig,
    pub pool: DbPool,
    pub store: Arc<dyn ReactionStore>,
}

/// Loads config, opens the database with pending migrations applied, runs
/// `work`, and renders its result. Every failure maps onto the documented
/// exit codes.
pub(crate) fn run_with_session<F, Fut>(command: &str, work: F) -> CommandResult
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<Outcome, Failure>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database).await.map_err(Failure::database)?;
        migrations::run_pending(&pool).await.map_err(Failure::migration)?;

        let store: Arc<dyn ReactionStore> = Arc::new(SqlReactionStore::new(pool.clone()));
        let session = Session { config, pool: pool.clone(), store };
        let outcome = work(session).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(outcome) => CommandResult::success_with_data(command, outcome.message, outcome.data),
        Err(failure) => {
            CommandResult::failure(command, failure.class, failure.message, failure.exit_code)
        }
    }
}

pub(crate) fn slack_client(config: &AppConfig) -> Result<Arc<SlackWebClient>, Failure> {
    Ok(Arc::new(SlackWebClient::from_config(&config.slack)?))
}

/// Builds and loads the same alias cache the server uses.
pub(crate) async fn load_aliases(
    config: &AppConfig,
    slack: Arc<SlackWebClient>,
) -> Result<Arc<AliasCache>, Failure> {
    let sources: Vec<Arc<dyn EmojiSource>> =
        vec![Arc::new(EmojiDataSource::new(config.emoji.source_url.clone())?), slack];
    let aliases = Arc::new(AliasCache::new(sources));
    if !config.emoji.skip_load {
        aliases.refresh().await?;
    }
    Ok(aliases)
}
