use skelly_core::ReactionStats;

use crate::commands::reaction::ChannelArgs;
use crate::commands::{run_with_session, slack_client, CommandResult, Outcome};

pub fn channel(args: &ChannelArgs) -> CommandResult {
    run_with_session("stats.channel", |session| async move {
        let stats = ReactionStats::new(session.store.clone()).channel_stats(&args.channel).await?;
        Ok(Outcome::with_data(
            format!("channel {} has {} reaction(s)", stats.channel, stats.total_rules),
            &stats,
        ))
    })
}

/// Channel names come from Slack; channels it no longer knows are listed by id.
pub fn workspace() -> CommandResult {
    run_with_session("stats.workspace", |session| async move {
        let slack = slack_client(&session.config)?;
        let stats = ReactionStats::new(session.store.clone()).workspace_stats(slack.as_ref()).await?;
        Ok(Outcome::with_data(
            format!("{} channel(s) have reactions", stats.total_channels),
            &stats,
        ))
    })
}
