use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::Row;
use tracing::debug;

use skelly_core::domain::reaction::{Audience, Reaction, ReactionKey, ReactionUpdate};
use skelly_core::reactor::{ReactionStore, StoreError};

use super::{store_error, RepositoryError};
use crate::DbPool;

const REACTION_COLUMNS: &str = "channel, emoji, usergroup, usergroup_label, response";

pub struct SqlReactionStore {
    pool: DbPool,
}

impl SqlReactionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn emoji_column(emoji: Option<&str>) -> &str {
    emoji.unwrap_or("")
}

fn row_to_reaction(row: &sqlx::sqlite::SqliteRow) -> Result<Reaction, RepositoryError> {
    let channel: String =
        row.try_get("channel").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let emoji: String = row.try_get("emoji").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let usergroup: String =
        row.try_get("usergroup").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let usergroup_label: String =
        row.try_get("usergroup_label").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let response: String =
        row.try_get("response").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Reaction {
        channel,
        emoji: (!emoji.is_empty()).then_some(emoji),
        audience: Audience::parse(&usergroup),
        audience_label: usergroup_label,
        response,
    })
}

fn decode_all(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Reaction>, StoreError> {
    rows.iter()
        .map(row_to_reaction)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}

#[async_trait::async_trait]
impl ReactionStore for SqlReactionStore {
    async fn find_reactions_by_channel(&self, channel: &str) -> Result<Vec<Reaction>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {REACTION_COLUMNS} FROM reaction WHERE channel = ? ORDER BY id ASC"
        ))
        .bind(channel)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        decode_all(&rows)
    }

    async fn find_reactions(
        &self,
        channel: &str,
        emoji: Option<&str>,
    ) -> Result<Vec<Reaction>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {REACTION_COLUMNS} FROM reaction WHERE channel = ? AND emoji = ? ORDER BY id ASC"
        ))
        .bind(channel)
        .bind(emoji_column(emoji))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        decode_all(&rows)
    }

    async fn find_reaction(&self, key: &ReactionKey) -> Result<Reaction, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {REACTION_COLUMNS} FROM reaction
             WHERE channel = ? AND emoji = ? AND usergroup = ?"
        ))
        .bind(&key.channel)
        .bind(emoji_column(key.emoji.as_deref()))
        .bind(key.audience.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        match row {
            Some(ref row) => row_to_reaction(row).map_err(StoreError::from),
            None => Err(StoreError::NotFound),
        }
    }

    async fn add_reaction(&self, reaction: Reaction) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO reaction (channel, emoji, usergroup, usergroup_label, response,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&reaction.channel)
        .bind(emoji_column(reaction.emoji.as_deref()))
        .bind(reaction.audience.as_str())
        .bind(&reaction.audience_label)
        .bind(&reaction.response)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        debug!(
            event_name = "store.reaction.inserted",
            channel = %reaction.channel,
            "reaction row inserted"
        );
        Ok(())
    }

    async fn update_reaction(
        &self,
        key: &ReactionKey,
        update: ReactionUpdate,
    ) -> Result<(), StoreError> {
        let audience = update.audience.as_ref().unwrap_or(&key.audience);
        let label = update.audience_label.clone().or_else(|| {
            update.audience.as_ref().map(|audience| audience.as_str().to_string())
        });

        let result = sqlx::query(
            "UPDATE reaction
             SET response = ?, usergroup = ?, usergroup_label = COALESCE(?, usergroup_label),
                 updated_at = ?
             WHERE channel = ? AND emoji = ? AND usergroup = ?",
        )
        .bind(&update.response)
        .bind(audience.as_str())
        .bind(label)
        .bind(Utc::now().to_rfc3339())
        .bind(&key.channel)
        .bind(emoji_column(key.emoji.as_deref()))
        .bind(key.audience.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_reactions(&self, key: &ReactionKey) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM reaction WHERE channel = ? AND emoji = ? AND usergroup = ?")
                .bind(&key.channel)
                .bind(emoji_column(key.emoji.as_deref()))
                .bind(key.audience.as_str())
                .execute(&self.pool)
                .await
                .map_err(store_error)?;

        match result.rows_affected() {
            0 => Err(StoreError::NotFound),
            removed => Ok(removed),
        }
    }

    async fn delete_channel_reactions(&self, channel: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM reaction WHERE channel = ?")
            .bind(channel)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        match result.rows_affected() {
            0 => Err(StoreError::NotFound),
            removed => Ok(removed),
        }
    }

    async fn count_channels(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let rows = sqlx::query(
            "SELECT channel, COUNT(*) AS count FROM reaction GROUP BY channel ORDER BY channel",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let channel: String = row
                .try_get("channel")
                .map_err(|e| StoreError::from(RepositoryError::Decode(e.to_string())))?;
            let count: i64 = row
                .try_get("count")
                .map_err(|e| StoreError::from(RepositoryError::Decode(e.to_string())))?;
            counts.insert(channel, count.max(0) as u64);
        }
        Ok(counts)
    }
}
