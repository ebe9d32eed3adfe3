use std::sync::Arc;

use axum::Router;
use skelly_core::config::{AppConfig, ConfigError, LoadOptions};
use skelly_core::reactor::{CollaboratorError, DedupGuard, ReactionStore, ResponseMatcher};
use skelly_core::{AliasCache, Dispatcher, EmojiSource, ReactionAdmin, ReactionError};
use skelly_db::{connect_with_config, migrations, DbPool, SqlReactionStore, SqlResponseLedger};
use skelly_slack::api::{EmojiDataSource, SlackWebClient};
use skelly_slack::commands::CommandRouter;
use skelly_slack::events::trigger_dispatcher;
use skelly_slack::interactions::SubmissionRouter;
use skelly_slack::signature::SignatureVerifier;
use thiserror::Error;
use tracing::{info, warn};

use crate::health::HealthState;
use crate::routes::{self, SlackState};
use crate::services::ReactionService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub aliases: Arc<AliasCache>,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack client setup failed: {0}")]
    SlackClient(String),
    #[error("initial emoji load failed: {0}")]
    EmojiLoad(#[source] ReactionError),
}

impl From<CollaboratorError> for BootstrapError {
    fn from(value: CollaboratorError) -> Self {
        Self::SlackClient(format!("{}: {}", value.operation, value.message))
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        variant = config.reactions.variant.as_str(),
        "starting application bootstrap"
    );
    let signing_secret = config.signing_secret()?.clone();

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let slack = Arc::new(SlackWebClient::from_config(&config.slack)?);
    let sources: Vec<Arc<dyn EmojiSource>> = vec![
        Arc::new(EmojiDataSource::new(config.emoji.source_url.clone())?),
        slack.clone(),
    ];
    let aliases = Arc::new(AliasCache::new(sources));
    if config.emoji.skip_load {
        warn!(
            event_name = "system.bootstrap.emoji_skipped",
            correlation_id = "bootstrap",
            "emoji load skipped; emoji lookups fail until /refresh"
        );
    } else {
        aliases.refresh().await.map_err(BootstrapError::EmojiLoad)?;
    }

    let variant = config.reactions.variant;
    let store: Arc<dyn ReactionStore> = Arc::new(SqlReactionStore::new(db_pool.clone()));
    let ledger = Arc::new(SqlResponseLedger::new(db_pool.clone()));

    let admin = ReactionAdmin::new(variant, store.clone()).with_aliases(aliases.clone());
    let matcher = ResponseMatcher::new(variant, store, aliases.clone(), slack.clone());
    let guard = DedupGuard::new(ledger, slack.clone());
    let dispatcher = Dispatcher::new(variant, matcher, guard, slack.clone());
    let service = ReactionService::new(Arc::new(admin), Arc::new(dispatcher));

    let slack_state = SlackState {
        verifier: Arc::new(SignatureVerifier::new(signing_secret)),
        commands: Arc::new(CommandRouter::new(service.clone(), variant, config.slack.command.clone())),
        submissions: Arc::new(SubmissionRouter::new(service.clone())),
        events: Arc::new(trigger_dispatcher(variant, Arc::new(service))),
        replies: slack,
    };
    let router = routes::router(
        slack_state,
        &config.server.route_prefix,
        HealthState { db_pool: db_pool.clone(), aliases: aliases.clone() },
    );

    Ok(Application { config, db_pool, aliases, router })
}

#[cfg(test)]
mod tests {
    use skelly_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn overrides(signing_secret: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                slack_bot_token: Some("xoxb-test".to_string()),
                slack_signing_secret: signing_secret.map(str::to_string),
                emoji_skip_load: Some(true),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_signing_secret() {
        let result = bootstrap(overrides(None)).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.signing_secret"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_skips_emoji_load() {
        let app = bootstrap(overrides(Some("secret"))).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('reaction', 'sent_response')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("reaction tables exist after bootstrap");
        assert_eq!(table_count, 2);
        assert!(!app.aliases.is_loaded());

        app.db_pool.close().await;
    }
}
