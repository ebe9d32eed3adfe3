use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;
use skelly_core::domain::reaction::NONE_SENTINEL;
use skelly_core::reactor::{
    CollaboratorError, DedupGuard, InMemoryResponseLedger, MessagePoster, OutboundMessage,
    ResponseLedger, ResponseMatcher,
};
use skelly_core::{Dispatcher, ReactionAdmin, ReactionUpdate, ThreadKey, Trigger};
use skelly_db::SqlResponseLedger;

use crate::commands::{load_aliases, run_with_session, slack_client, CommandResult, Failure, Outcome, Session};

#[derive(Debug, Clone, Args)]
pub struct ChannelArgs {
    #[arg(long, short = 'c', help = "Slack channel id")]
    pub channel: String,
}

#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    #[arg(long, short = 'c', help = "Slack channel id")]
    pub channel: String,
    #[arg(long, short = 'e', help = "Emoji short name, with or without colons")]
    pub emoji: Option<String>,
    #[arg(long, short = 'g', default_value = NONE_SENTINEL, help = "Usergroup id, or `none` for all users")]
    pub usergroup: String,
    #[arg(long, help = "Resolve the emoji to its canonical name through the emoji cache")]
    pub resolve_emoji: bool,
}

#[derive(Debug, Clone, Args)]
pub struct WriteArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    #[arg(long, short = 'r', help = "Message to respond with")]
    pub response: String,
}

#[derive(Debug, Clone, Args)]
pub struct TriggerArgs {
    #[arg(long, short = 'c', help = "Slack channel id")]
    pub channel: String,
    #[arg(long, short = 'e', help = "Emoji that was added (emoji variant only)")]
    pub emoji: Option<String>,
    #[arg(long, short = 'u', help = "User who triggered the reaction")]
    pub user: String,
    #[arg(long, default_value = NONE_SENTINEL, help = "Message timestamp, or `none` for unthreaded")]
    pub ts: String,
    #[arg(long, help = "Match and report without posting or recording a response")]
    pub dry_run: bool,
}

async fn admin(session: &Session, resolve_emoji: bool) -> Result<ReactionAdmin, Failure> {
    let admin = ReactionAdmin::new(session.config.reactions.variant, session.store.clone());
    if !resolve_emoji {
        return Ok(admin);
    }
    let slack = slack_client(&session.config)?;
    Ok(admin.with_aliases(load_aliases(&session.config, slack).await?))
}

pub fn view(args: &TargetArgs) -> CommandResult {
    run_with_session("reaction.view", |session| async move {
        let admin = admin(&session, args.resolve_emoji).await?;
        let key = admin.key(&args.channel, args.emoji.as_deref(), &args.usergroup)?;
        let reaction = admin.view(&key).await?;
        Ok(Outcome::with_data(format!("reaction for {key}"), &reaction))
    })
}

pub fn list(args: &ChannelArgs) -> CommandResult {
    run_with_session("reaction.list", |session| async move {
        let admin = admin(&session, false).await?;
        let reactions = admin.list(&args.channel).await?;
        Ok(Outcome::with_data(
            format!("{} reaction(s) in channel {}", reactions.len(), args.channel),
            &reactions,
        ))
    })
}

pub fn clear(args: &ChannelArgs) -> CommandResult {
    run_with_session("reaction.clear", |session| async move {
        let admin = admin(&session, false).await?;
        let removed = admin.clear(&args.channel).await?;
        Ok(Outcome::message(format!("cleared {removed} reaction(s) from channel {}", args.channel)))
    })
}

pub fn add(args: &WriteArgs) -> CommandResult {
    run_with_session("reaction.add", |session| async move {
        let target = &args.target;
        let admin = admin(&session, target.resolve_emoji).await?;
        let key = admin.key(&target.channel, target.emoji.as_deref(), &target.usergroup)?;
        let reaction = admin.add(key, None, &args.response).await?;
        Ok(Outcome::with_data("reaction added", &reaction))
    })
}

pub fn update(args: &WriteArgs) -> CommandResult {
    run_with_session("reaction.update", |session| async move {
        let target = &args.target;
        let admin = admin(&session, target.resolve_emoji).await?;
        let key = admin.key(&target.channel, target.emoji.as_deref(), &target.usergroup)?;
        admin.update(&key, ReactionUpdate::response(args.response.as_str())).await?;
        Ok(Outcome::message(format!("updated reaction for {key}")))
    })
}

pub fn delete(args: &TargetArgs) -> CommandResult {
    run_with_session("reaction.delete", |session| async move {
        let admin = admin(&session, args.resolve_emoji).await?;
        let key = admin.key(&args.channel, args.emoji.as_deref(), &args.usergroup)?;
        let removed = admin.delete(&key).await?;
        Ok(Outcome::message(format!("deleted {removed} reaction(s) for {key}")))
    })
}

/// Stands in for Slack when a trigger is only being rehearsed.
struct DryRunPoster;

#[async_trait]
impl MessagePoster for DryRunPoster {
    async fn post(&self, message: OutboundMessage) -> Result<String, CollaboratorError> {
        Ok(format!("dry-run:{}", message.channel))
    }
}

/// Runs the real matching and dedup path for a simulated trigger.
pub fn trigger(args: &TriggerArgs) -> CommandResult {
    run_with_session("reaction.trigger", |session| async move {
        let variant = session.config.reactions.variant;
        let slack = slack_client(&session.config)?;
        let aliases = load_aliases(&session.config, slack.clone()).await?;

        let timestamp = ThreadKey::parse(&args.ts);
        let trigger = match &args.emoji {
            Some(emoji) => Trigger::emoji_added(&args.channel, emoji, &args.user, timestamp),
            None => Trigger::message_typed(&args.channel, &args.user, timestamp),
        };

        let (ledger, poster): (Arc<dyn ResponseLedger>, Arc<dyn MessagePoster>) = if args.dry_run {
            (Arc::new(InMemoryResponseLedger::default()), Arc::new(DryRunPoster))
        } else {
            (Arc::new(SqlResponseLedger::new(session.pool.clone())), slack.clone())
        };

        let matcher = ResponseMatcher::new(variant, session.store.clone(), aliases, slack.clone());
        let guard = DedupGuard::new(ledger, slack);
        let report = Dispatcher::new(variant, matcher, guard, poster).dispatch(&trigger).await?;

        Ok(Outcome::with_data(
            format!("{:?}: {} response(s) sent", report.state, report.sent_count()).to_lowercase(),
            &report,
        ))
    })
}
