use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use skelly_core::AliasCache;
use skelly_db::DbPool;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub aliases: Arc<AliasCache>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub emoji: HealthCheck,
    pub checked_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    pub detail: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/refresh", get(refresh))
        .with_state(state)
}

/// Readiness follows the database only; an unloaded emoji table is reported but
/// does not fail the probe.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let emoji = if state.aliases.is_loaded() {
        HealthCheck { status: "ready", detail: format!("{} emoji loaded", state.aliases.snapshot().len()) }
    } else {
        HealthCheck { status: "degraded", detail: "emoji data not loaded".to_string() }
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        emoji,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

pub async fn refresh(State(state): State<HealthState>) -> (StatusCode, Json<RefreshResponse>) {
    info!(event_name = "system.refresh.requested", "manually refreshing emoji cache");

    match state.aliases.refresh().await {
        Ok(count) => (
            StatusCode::OK,
            Json(RefreshResponse { status: "ok", detail: format!("refreshed {count} emoji") }),
        ),
        Err(err) => {
            error!(event_name = "system.refresh.failed", error = %err, "manual refresh failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RefreshResponse { status: "error", detail: err.to_string() }),
            )
        }
    }
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use skelly_core::reactor::CollaboratorError;
    use skelly_core::{AliasCache, Emoji, EmojiSource};
    use skelly_db::connect_with_settings;

    use crate::health::{health, refresh, HealthState};

    struct FixedSource(Vec<Emoji>);

    #[async_trait]
    impl EmojiSource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch(&self) -> Result<Vec<Emoji>, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    fn aliases(emojis: Vec<Emoji>) -> Arc<AliasCache> {
        Arc::new(AliasCache::new(vec![Arc::new(FixedSource(emojis))]))
    }

    #[tokio::test]
    async fn health_returns_ready_when_database_is_reachable() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");

        let state = HealthState { db_pool: pool.clone(), aliases: aliases(Vec::new()) };
        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.emoji.status, "degraded");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool, aliases: aliases(Vec::new()) })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
    }

    #[tokio::test]
    async fn refresh_reloads_the_emoji_table() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        let cache = aliases(vec![Emoji::new("wave", vec!["wave".to_string()])]);
        let state = HealthState { db_pool: pool.clone(), aliases: cache.clone() };

        let (status, Json(payload)) = refresh(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.detail, "refreshed 1 emoji");
        assert!(cache.is_loaded());
        pool.close().await;
    }

    #[tokio::test]
    async fn refresh_fails_when_primary_source_is_empty() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        let state = HealthState { db_pool: pool.clone(), aliases: aliases(Vec::new()) };

        let (status, Json(payload)) = refresh(State(state)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(payload.status, "error");
        pool.close().await;
    }
}
