use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::reaction::{Reaction, ReactionVariant, ResponseKey, ThreadKey, Trigger};
use crate::errors::ReactionError;

use super::guard::DedupGuard;
use super::matcher::ResponseMatcher;
use super::ports::{MessagePoster, OutboundMessage};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReactionOutcome {
    Sent { message_ts: String },
    SkippedEmpty,
    SkippedAlreadySent,
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchedReaction {
    pub reaction: Reaction,
    #[serde(flatten)]
    pub outcome: ReactionOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// At least one response was posted.
    Sent,
    /// Nothing matched, or everything matched was filtered out.
    Skipped,
    /// Every eligible post failed.
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub state: DispatchState,
    pub response_key: Option<ResponseKey>,
    pub reactions: Vec<DispatchedReaction>,
}

impl DispatchReport {
    fn skipped(reactions: Vec<DispatchedReaction>) -> Self {
        Self { state: DispatchState::Skipped, response_key: None, reactions }
    }

    pub fn sent_count(&self) -> usize {
        self.reactions
            .iter()
            .filter(|item| matches!(item.outcome, ReactionOutcome::Sent { .. }))
            .count()
    }
}

/// Delivers each eligible reaction for a trigger at most once.
///
/// The dedup marker is claimed before the first post. If every post then fails
/// the claim is released so a retried trigger can deliver; after any success the
/// marker stays, trading a possibly missed sibling for never posting twice.
pub struct Dispatcher {
    variant: ReactionVariant,
    matcher: ResponseMatcher,
    guard: DedupGuard,
    poster: Arc<dyn MessagePoster>,
}

impl Dispatcher {
    pub fn new(
        variant: ReactionVariant,
        matcher: ResponseMatcher,
        guard: DedupGuard,
        poster: Arc<dyn MessagePoster>,
    ) -> Self {
        Self { variant, matcher, guard, poster }
    }

    pub async fn dispatch(&self, trigger: &Trigger) -> Result<DispatchReport, ReactionError> {
        let result = self.run(trigger).await;
        match &result {
            Ok(report) => info!(
                event_name = "reactor.dispatch.completed",
                channel = %trigger.channel,
                emoji = trigger.emoji.as_deref().unwrap_or("-"),
                user = %trigger.user,
                ts = %trigger.timestamp.as_str(),
                state = ?report.state,
                sent = report.sent_count(),
                matched = report.reactions.len(),
                "trigger dispatched"
            ),
            Err(error) => warn!(
                event_name = "reactor.dispatch.failed",
                channel = %trigger.channel,
                emoji = trigger.emoji.as_deref().unwrap_or("-"),
                user = %trigger.user,
                ts = %trigger.timestamp.as_str(),
                error_class = error.class(),
                error = %error,
                "trigger dispatch failed"
            ),
        }
        result
    }

    async fn run(&self, trigger: &Trigger) -> Result<DispatchReport, ReactionError> {
        let matched = self.matcher.match_trigger(trigger).await?;

        let eligible = matched.reactions.iter().filter(|reaction| reaction.has_response()).count();
        if eligible == 0 {
            let reactions = matched
                .reactions
                .into_iter()
                .map(|reaction| DispatchedReaction {
                    reaction,
                    outcome: ReactionOutcome::SkippedEmpty,
                })
                .collect();
            return Ok(DispatchReport::skipped(reactions));
        }

        let discriminator = match self.variant {
            ReactionVariant::PerEmoji => matched.emoji.clone().unwrap_or_default(),
            ReactionVariant::PerChannel => trigger.user.clone(),
        };
        let key = self.guard.resolve_key(&trigger.channel, &discriminator, &trigger.timestamp).await?;
        let claimed = self.guard.claim(&key).await?;
        let thread_ts = match &key.timestamp {
            ThreadKey::Ts(ts) => Some(ts.clone()),
            ThreadKey::Unthreaded => None,
        };

        let mut reactions = Vec::with_capacity(matched.reactions.len());
        let mut sent = 0usize;
        for reaction in matched.reactions {
            let outcome = if !reaction.has_response() {
                ReactionOutcome::SkippedEmpty
            } else if !claimed {
                info!(
                    event_name = "reactor.dispatch.duplicate",
                    response_key = %key,
                    "response already sent for trigger; skipping"
                );
                ReactionOutcome::SkippedAlreadySent
            } else {
                let message = OutboundMessage {
                    channel: trigger.channel.clone(),
                    text: reaction.response.clone(),
                    thread_ts: thread_ts.clone(),
                };
                match self.poster.post(message).await {
                    Ok(message_ts) => {
                        sent += 1;
                        info!(
                            event_name = "reactor.dispatch.posted",
                            response_key = %key,
                            audience = %reaction.audience.as_str(),
                            message_ts = %message_ts,
                            "reaction posted"
                        );
                        ReactionOutcome::Sent { message_ts }
                    }
                    Err(error) => {
                        warn!(
                            event_name = "reactor.dispatch.post_failed",
                            response_key = %key,
                            audience = %reaction.audience.as_str(),
                            error = %error,
                            "could not post reaction"
                        );
                        ReactionOutcome::Failed { error: error.to_string() }
                    }
                }
            };
            reactions.push(DispatchedReaction { reaction, outcome });
        }

        let state = if !claimed {
            DispatchState::Skipped
        } else if sent > 0 {
            DispatchState::Sent
        } else {
            if let Err(error) = self.guard.release(&key).await {
                warn!(
                    event_name = "reactor.dispatch.release_failed",
                    response_key = %key,
                    error = %error,
                    "every post failed and the dedup marker could not be released"
                );
            }
            DispatchState::Failed
        };

        Ok(DispatchReport { state, response_key: Some(key), reactions })
    }
}
