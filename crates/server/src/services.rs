use std::sync::Arc;

use async_trait::async_trait;
use skelly_core::reactor::{CollaboratorError, DispatchReport};
use skelly_core::{Dispatcher, Reaction, ReactionAdmin, ReactionError, ReactionKey, ReactionUpdate, Trigger};
use skelly_slack::api::SlackWebClient;
use skelly_slack::commands::{CommandReply, ReactionCommandService, ReactionTarget, SlashCommandPayload};
use skelly_slack::events::{EventContext, TriggerService};
use skelly_slack::interactions::{SubmissionContext, SubmissionReply, SubmissionService};
use tracing::info;

/// Slack-facing operations backed by the reaction admin and the dispatcher.
#[derive(Clone)]
pub struct ReactionService {
    admin: Arc<ReactionAdmin>,
    dispatcher: Arc<Dispatcher>,
}

impl ReactionService {
    pub fn new(admin: Arc<ReactionAdmin>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { admin, dispatcher }
    }

    fn key(&self, channel: &str, target: &ReactionTarget) -> Result<ReactionKey, ReactionError> {
        self.admin.key(channel, target.emoji.as_deref(), target.audience.as_str())
    }
}

#[async_trait]
impl ReactionCommandService for ReactionService {
    async fn list_reactions(&self, channel: &str) -> Result<Vec<Reaction>, ReactionError> {
        self.admin.list(channel).await
    }

    async fn find_reaction(
        &self,
        channel: &str,
        target: &ReactionTarget,
    ) -> Result<Option<Reaction>, ReactionError> {
        let key = self.key(channel, target)?;
        match self.admin.view(&key).await {
            Ok(reaction) => Ok(Some(reaction)),
            Err(ReactionError::NotFound { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

#[async_trait]
impl SubmissionService for ReactionService {
    async fn add_reaction(
        &self,
        context: &SubmissionContext,
        response: &str,
    ) -> Result<(), ReactionError> {
        let key = self.key(&context.channel, &context.target)?;
        // the raw subteam token renders as a group mention in listings
        let label = context.target.audience.is_restricted().then(|| context.target.usergroup.clone());
        self.admin.add(key, label, response).await.map(|_| ())
    }

    async fn update_reaction(
        &self,
        context: &SubmissionContext,
        response: &str,
    ) -> Result<(), ReactionError> {
        let key = self.key(&context.channel, &context.target)?;
        self.admin.update(&key, ReactionUpdate::response(response)).await
    }

    async fn delete_reaction(&self, context: &SubmissionContext) -> Result<u64, ReactionError> {
        let key = self.key(&context.channel, &context.target)?;
        self.admin.delete(&key).await
    }
}

#[async_trait]
impl TriggerService for ReactionService {
    async fn handle_trigger(
        &self,
        trigger: &Trigger,
        ctx: &EventContext,
    ) -> Result<DispatchReport, ReactionError> {
        let report = self.dispatcher.dispatch(trigger).await?;
        info!(
            event_name = "ingress.slack.trigger_handled",
            correlation_id = %ctx.correlation_id,
            channel = %trigger.channel,
            user = %trigger.user,
            state = ?report.state,
            sent = report.sent_count(),
            "trigger dispatched"
        );
        Ok(report)
    }
}

/// Where command and submission replies go once they are computed.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver_command(
        &self,
        payload: &SlashCommandPayload,
        reply: CommandReply,
    ) -> Result<(), CollaboratorError>;

    async fn deliver_submission(&self, reply: SubmissionReply) -> Result<(), CollaboratorError>;
}

#[async_trait]
impl ReplySink for SlackWebClient {
    async fn deliver_command(
        &self,
        payload: &SlashCommandPayload,
        reply: CommandReply,
    ) -> Result<(), CollaboratorError> {
        match reply {
            CommandReply::Respond(message) => self.respond(&payload.response_url, &message).await,
            CommandReply::Ephemeral(message) => {
                self.post_ephemeral(&payload.channel_id, &payload.user_id, &message).await
            }
            CommandReply::OpenModal(view) => self.open_view(&payload.trigger_id, &view).await,
        }
    }

    async fn deliver_submission(&self, reply: SubmissionReply) -> Result<(), CollaboratorError> {
        self.post_ephemeral(&reply.channel, &reply.user, &reply.message).await
    }
}
