use std::sync::Arc;

use tracing::info;

use crate::domain::reaction::{
    Audience, Reaction, ReactionKey, ReactionUpdate, ReactionVariant,
};
use crate::emoji::normalize_alias;
use crate::errors::ReactionError;

use super::ports::AliasResolver;
use super::store::ReactionStore;

/// Validated create/read/update/delete over reaction rules.
pub struct ReactionAdmin {
    variant: ReactionVariant,
    store: Arc<dyn ReactionStore>,
    aliases: Option<Arc<dyn AliasResolver>>,
}

impl ReactionAdmin {
    pub fn new(variant: ReactionVariant, store: Arc<dyn ReactionStore>) -> Self {
        Self { variant, store, aliases: None }
    }

    /// Emoji given to this admin are resolved to their canonical name before use.
    pub fn with_aliases(mut self, aliases: Arc<dyn AliasResolver>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn variant(&self) -> ReactionVariant {
        self.variant
    }

    pub fn key(
        &self,
        channel: &str,
        emoji: Option<&str>,
        audience: &str,
    ) -> Result<ReactionKey, ReactionError> {
        let channel = channel.trim();
        let emoji = emoji.map(str::trim).filter(|emoji| !emoji.is_empty());

        let key = match self.variant {
            ReactionVariant::PerEmoji => {
                let raw = emoji.ok_or_else(|| {
                    ReactionError::InvalidInput("an emoji is required".to_string())
                })?;
                let canonical = match &self.aliases {
                    Some(aliases) => aliases.resolve_canonical(raw)?,
                    None => normalize_alias(raw),
                };
                ReactionKey::per_emoji(channel, canonical, Audience::parse(audience))
            }
            ReactionVariant::PerChannel => {
                if emoji.is_some() {
                    return Err(ReactionError::InvalidInput(
                        "per-channel reactions do not take an emoji".to_string(),
                    ));
                }
                ReactionKey { audience: Audience::parse(audience), ..ReactionKey::per_channel(channel) }
            }
        };

        key.validate(self.variant)?;
        Ok(key)
    }

    pub async fn view(&self, key: &ReactionKey) -> Result<Reaction, ReactionError> {
        self.store.find_reaction(key).await.map_err(|error| error.context("find_reaction", key))
    }

    pub async fn list(&self, channel: &str) -> Result<Vec<Reaction>, ReactionError> {
        self.store
            .find_reactions_by_channel(channel)
            .await
            .map_err(|error| error.context("find_reactions_by_channel", format!("channel={channel}")))
    }

    pub async fn add(
        &self,
        key: ReactionKey,
        audience_label: Option<String>,
        response: &str,
    ) -> Result<Reaction, ReactionError> {
        require_response(response)?;
        let mut reaction = Reaction::new(key, response);
        if let Some(label) = audience_label.filter(|label| !label.trim().is_empty()) {
            reaction = reaction.with_audience_label(label);
        }

        let key = reaction.key();
        self.store
            .add_reaction(reaction.clone())
            .await
            .map_err(|error| error.context("add_reaction", &key))?;

        info!(event_name = "store.reaction.added", reaction_key = %key, "reaction added");
        Ok(reaction)
    }

    pub async fn update(
        &self,
        key: &ReactionKey,
        update: ReactionUpdate,
    ) -> Result<(), ReactionError> {
        require_response(&update.response)?;
        if self.variant == ReactionVariant::PerChannel
            && update.audience.as_ref().is_some_and(Audience::is_restricted)
        {
            return Err(ReactionError::InvalidInput(
                "per-channel reactions apply to all users".to_string(),
            ));
        }

        self.store
            .update_reaction(key, update)
            .await
            .map_err(|error| error.context("update_reaction", key))?;

        info!(event_name = "store.reaction.updated", reaction_key = %key, "reaction updated");
        Ok(())
    }

    pub async fn delete(&self, key: &ReactionKey) -> Result<u64, ReactionError> {
        let removed = self
            .store
            .delete_reactions(key)
            .await
            .map_err(|error| error.context("delete_reactions", key))?;

        info!(event_name = "store.reaction.deleted", reaction_key = %key, removed, "reactions deleted");
        Ok(removed)
    }

    pub async fn clear(&self, channel: &str) -> Result<u64, ReactionError> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(ReactionError::InvalidInput("channel must not be empty".to_string()));
        }
        let removed = self
            .store
            .delete_channel_reactions(channel)
            .await
            .map_err(|error| error.context("delete_channel_reactions", format!("channel={channel}")))?;

        info!(event_name = "store.reaction.cleared", channel, removed, "channel reactions cleared");
        Ok(removed)
    }
}

fn require_response(response: &str) -> Result<(), ReactionError> {
    if response.trim().is_empty() {
        return Err(ReactionError::InvalidInput("response must not be empty".to_string()));
    }
    Ok(())
}
