use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::reaction::{Reaction, ReactionKey, ReactionUpdate, ResponseKey};
use crate::errors::ReactionError;

/// Outcome classes a store backend reports; callers attach the operation and key.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record already exists")]
    AlreadyExists,
    #[error("no matching record")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn context(self, operation: &'static str, key: impl ToString) -> ReactionError {
        match self {
            Self::AlreadyExists => ReactionError::AlreadyExists { operation, key: key.to_string() },
            Self::NotFound => ReactionError::NotFound { operation, key: key.to_string() },
            Self::Unavailable(message) => ReactionError::StoreUnavailable { operation, message },
        }
    }
}

/// Reaction rules. Uniqueness of `(channel, emoji, audience)` is enforced by the
/// backend itself, so `add_reaction` must fail atomically with `AlreadyExists`.
#[async_trait]
pub trait ReactionStore: Send + Sync {
    async fn find_reactions_by_channel(&self, channel: &str) -> Result<Vec<Reaction>, StoreError>;

    /// `emoji = None` returns the channel's discriminator-less rules.
    async fn find_reactions(
        &self,
        channel: &str,
        emoji: Option<&str>,
    ) -> Result<Vec<Reaction>, StoreError>;

    async fn find_reaction(&self, key: &ReactionKey) -> Result<Reaction, StoreError>;

    async fn reaction_exists(&self, key: &ReactionKey) -> Result<Option<Reaction>, StoreError> {
        match self.find_reaction(key).await {
            Ok(reaction) => Ok(Some(reaction)),
            Err(StoreError::NotFound) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn add_reaction(&self, reaction: Reaction) -> Result<(), StoreError>;

    async fn update_reaction(
        &self,
        key: &ReactionKey,
        update: ReactionUpdate,
    ) -> Result<(), StoreError>;

    async fn delete_reactions(&self, key: &ReactionKey) -> Result<u64, StoreError>;

    async fn delete_channel_reactions(&self, channel: &str) -> Result<u64, StoreError>;

    async fn count_channels(&self) -> Result<BTreeMap<String, u64>, StoreError>;
}

/// Sent-response markers. `store_response` is an atomic claim.
#[async_trait]
pub trait ResponseLedger: Send + Sync {
    async fn response_exists(&self, key: &ResponseKey) -> Result<bool, StoreError>;

    async fn store_response(&self, key: &ResponseKey) -> Result<(), StoreError>;

    async fn remove_response(&self, key: &ResponseKey) -> Result<(), StoreError>;
}
