use std::sync::Arc;

use tracing::warn;

use crate::domain::stats::{ChannelStats, ChannelSummary, WorkspaceStats};
use crate::errors::ReactionError;

use super::ports::ChannelDirectory;
use super::store::ReactionStore;

pub struct ReactionStats {
    store: Arc<dyn ReactionStore>,
}

impl ReactionStats {
    pub fn new(store: Arc<dyn ReactionStore>) -> Self {
        Self { store }
    }

    pub async fn channel_stats(&self, channel: &str) -> Result<ChannelStats, ReactionError> {
        let reactions = self
            .store
            .find_reactions_by_channel(channel)
            .await
            .map_err(|error| error.context("find_reactions_by_channel", format!("channel={channel}")))?;

        Ok(ChannelStats { channel: channel.to_string(), total_rules: reactions.len() as u64 })
    }

    /// Channels the directory cannot describe are still counted, without a name.
    pub async fn workspace_stats(
        &self,
        directory: &dyn ChannelDirectory,
    ) -> Result<WorkspaceStats, ReactionError> {
        let counts = self
            .store
            .count_channels()
            .await
            .map_err(|error| error.context("count_channels", "all channels"))?;

        let mut channels = Vec::with_capacity(counts.len());
        for (id, rules) in counts {
            let name = match directory.channel_name(&id).await {
                Ok(name) => name,
                Err(error) => {
                    warn!(
                        event_name = "reactor.stats.channel_lookup_failed",
                        channel = %id,
                        error = %error,
                        "could not resolve channel name"
                    );
                    None
                }
            };
            channels.push(ChannelSummary { id, name, rules });
        }

        Ok(WorkspaceStats { total_channels: channels.len() as u64, channels })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::ReactionStats;
    use crate::domain::reaction::{Audience, Reaction, ReactionKey};
    use crate::reactor::memory::InMemoryReactionStore;
    use crate::reactor::ports::{ChannelDirectory, CollaboratorError};
    use crate::reactor::store::ReactionStore;

    struct Directory;

    #[async_trait]
    impl ChannelDirectory for Directory {
        async fn channel_name(&self, channel: &str) -> Result<Option<String>, CollaboratorError> {
            match channel {
                "C1" => Ok(Some("general".to_string())),
                _ => Err(CollaboratorError::new("conversations.info", "channel_not_found")),
            }
        }
    }

    #[tokio::test]
    async fn channel_and_workspace_stats() {
        let store = Arc::new(InMemoryReactionStore::default());
        for (channel, emoji) in [("C1", "wave"), ("C1", "smile"), ("C9", "wave")] {
            store
                .add_reaction(Reaction::new(
                    ReactionKey::per_emoji(channel, emoji, Audience::All),
                    "hi",
                ))
                .await
                .expect("add");
        }
        let stats = ReactionStats::new(store);

        assert_eq!(stats.channel_stats("C1").await.expect("channel").total_rules, 2);
        assert_eq!(stats.channel_stats("C2").await.expect("channel").total_rules, 0);

        let workspace = stats.workspace_stats(&Directory).await.expect("workspace");
        assert_eq!(workspace.total_channels, 2);
        assert_eq!(workspace.channels[0].name.as_deref(), Some("general"));
        assert_eq!(workspace.channels[0].rules, 2);
        assert_eq!(workspace.channels[1].id, "C9");
        assert_eq!(workspace.channels[1].name, None);
    }
}
