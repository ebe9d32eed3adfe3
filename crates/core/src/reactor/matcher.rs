use std::sync::Arc;

use tracing::debug;

use crate::domain::reaction::{Reaction, ReactionVariant, Trigger};
use crate::errors::ReactionError;

use super::ports::{AliasResolver, AudienceDirectory};
use super::store::ReactionStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    /// Canonical emoji for per-emoji rules, `None` for per-channel rules.
    pub emoji: Option<String>,
    pub reactions: Vec<Reaction>,
}

pub struct ResponseMatcher {
    variant: ReactionVariant,
    store: Arc<dyn ReactionStore>,
    aliases: Arc<dyn AliasResolver>,
    audiences: Arc<dyn AudienceDirectory>,
}

impl ResponseMatcher {
    pub fn new(
        variant: ReactionVariant,
        store: Arc<dyn ReactionStore>,
        aliases: Arc<dyn AliasResolver>,
        audiences: Arc<dyn AudienceDirectory>,
    ) -> Self {
        Self { variant, store, aliases, audiences }
    }

    /// Rules that apply to the trigger, in store order. Empty responses are kept
    /// here so the dispatcher can report them as skipped.
    pub async fn match_trigger(&self, trigger: &Trigger) -> Result<MatchResult, ReactionError> {
        let emoji = match self.variant {
            ReactionVariant::PerEmoji => {
                let raw = trigger.emoji.as_deref().ok_or_else(|| {
                    ReactionError::InvalidInput("emoji triggers must name an emoji".to_string())
                })?;
                Some(self.aliases.resolve_canonical(raw)?)
            }
            ReactionVariant::PerChannel => None,
        };

        let candidates = self
            .store
            .find_reactions(&trigger.channel, emoji.as_deref())
            .await
            .map_err(|error| {
                error.context(
                    "find_reactions",
                    format!("channel={} emoji={}", trigger.channel, emoji.as_deref().unwrap_or("-")),
                )
            })?;

        let user_groups = if candidates.iter().any(|reaction| reaction.audience.is_restricted()) {
            self.audiences.groups_containing(&trigger.user).await?
        } else {
            Vec::new()
        };

        let reactions: Vec<Reaction> = candidates
            .into_iter()
            .filter(|reaction| reaction.audience.admits(&user_groups))
            .collect();

        debug!(
            event_name = "reactor.match.completed",
            channel = %trigger.channel,
            emoji = emoji.as_deref().unwrap_or("-"),
            user = %trigger.user,
            user_group_count = user_groups.len(),
            matched = reactions.len(),
            "matched reactions for trigger"
        );

        Ok(MatchResult { emoji, reactions })
    }
}
