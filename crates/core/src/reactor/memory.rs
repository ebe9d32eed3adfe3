use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::reaction::{Reaction, ReactionKey, ReactionUpdate, ResponseKey};

use super::store::{ReactionStore, ResponseLedger, StoreError};

fn same_key(reaction: &Reaction, key: &ReactionKey) -> bool {
    reaction.channel == key.channel
        && reaction.emoji == key.emoji
        && reaction.audience.as_str().eq_ignore_ascii_case(key.audience.as_str())
}

/// Rules kept in insertion order behind a single lock, so check-and-insert is atomic.
#[derive(Default)]
pub struct InMemoryReactionStore {
    reactions: RwLock<Vec<Reaction>>,
}

#[async_trait]
impl ReactionStore for InMemoryReactionStore {
    async fn find_reactions_by_channel(&self, channel: &str) -> Result<Vec<Reaction>, StoreError> {
        let reactions = self.reactions.read().await;
        Ok(reactions.iter().filter(|reaction| reaction.channel == channel).cloned().collect())
    }

    async fn find_reactions(
        &self,
        channel: &str,
        emoji: Option<&str>,
    ) -> Result<Vec<Reaction>, StoreError> {
        let reactions = self.reactions.read().await;
        Ok(reactions
            .iter()
            .filter(|reaction| reaction.channel == channel && reaction.emoji.as_deref() == emoji)
            .cloned()
            .collect())
    }

    async fn find_reaction(&self, key: &ReactionKey) -> Result<Reaction, StoreError> {
        let reactions = self.reactions.read().await;
        reactions.iter().find(|reaction| same_key(reaction, key)).cloned().ok_or(StoreError::NotFound)
    }

    async fn add_reaction(&self, reaction: Reaction) -> Result<(), StoreError> {
        let mut reactions = self.reactions.write().await;
        let key = reaction.key();
        if reactions.iter().any(|existing| same_key(existing, &key)) {
            return Err(StoreError::AlreadyExists);
        }
        reactions.push(reaction);
        Ok(())
    }

    async fn update_reaction(
        &self,
        key: &ReactionKey,
        update: ReactionUpdate,
    ) -> Result<(), StoreError> {
        let mut reactions = self.reactions.write().await;
        let position = reactions
            .iter()
            .position(|reaction| same_key(reaction, key))
            .ok_or(StoreError::NotFound)?;

        if let Some(audience) = &update.audience {
            let moved = ReactionKey { audience: audience.clone(), ..key.clone() };
            let collides = reactions
                .iter()
                .enumerate()
                .any(|(index, reaction)| index != position && same_key(reaction, &moved));
            if collides {
                return Err(StoreError::AlreadyExists);
            }
        }

        let reaction = &mut reactions[position];
        reaction.response = update.response;
        if let Some(audience) = update.audience {
            reaction.audience_label =
                update.audience_label.unwrap_or_else(|| audience.as_str().to_string());
            reaction.audience = audience;
        } else if let Some(label) = update.audience_label {
            reaction.audience_label = label;
        }
        Ok(())
    }

    async fn delete_reactions(&self, key: &ReactionKey) -> Result<u64, StoreError> {
        let mut reactions = self.reactions.write().await;
        let before = reactions.len();
        reactions.retain(|reaction| !same_key(reaction, key));
        match (before - reactions.len()) as u64 {
            0 => Err(StoreError::NotFound),
            removed => Ok(removed),
        }
    }

    async fn delete_channel_reactions(&self, channel: &str) -> Result<u64, StoreError> {
        let mut reactions = self.reactions.write().await;
        let before = reactions.len();
        reactions.retain(|reaction| reaction.channel != channel);
        match (before - reactions.len()) as u64 {
            0 => Err(StoreError::NotFound),
            removed => Ok(removed),
        }
    }

    async fn count_channels(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let reactions = self.reactions.read().await;
        let mut counts = BTreeMap::new();
        for reaction in reactions.iter() {
            *counts.entry(reaction.channel.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[derive(Default)]
pub struct InMemoryResponseLedger {
    sent: RwLock<HashSet<ResponseKey>>,
}

#[async_trait]
impl ResponseLedger for InMemoryResponseLedger {
    async fn response_exists(&self, key: &ResponseKey) -> Result<bool, StoreError> {
        Ok(self.sent.read().await.contains(key))
    }

    async fn store_response(&self, key: &ResponseKey) -> Result<(), StoreError> {
        if self.sent.write().await.insert(key.clone()) {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists)
        }
    }

    async fn remove_response(&self, key: &ResponseKey) -> Result<(), StoreError> {
        self.sent.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryReactionStore, InMemoryResponseLedger};
    use crate::domain::reaction::{
        Audience, Reaction, ReactionKey, ReactionUpdate, ResponseKey, ThreadKey,
    };
    use crate::reactor::store::{ReactionStore, ResponseLedger, StoreError};

    fn key(channel: &str, emoji: &str, audience: &str) -> ReactionKey {
        ReactionKey::per_emoji(channel, emoji, Audience::parse(audience))
    }

    #[tokio::test]
    async fn add_then_exists_returns_same_response() {
        let store = InMemoryReactionStore::default();
        store.add_reaction(Reaction::new(key("C1", "wave", "none"), "hello")).await.expect("add");

        let found = store.reaction_exists(&key("C1", "wave", "none")).await.expect("exists");
        assert_eq!(found.map(|reaction| reaction.response), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected_and_original_kept() {
        let store = InMemoryReactionStore::default();
        store.add_reaction(Reaction::new(key("C1", "wave", "G1"), "first")).await.expect("add");

        let error = store
            .add_reaction(Reaction::new(key("C1", "wave", "g1"), "second"))
            .await
            .expect_err("duplicate");
        assert_eq!(error, StoreError::AlreadyExists);

        let stored = store.find_reaction(&key("C1", "wave", "G1")).await.expect("find");
        assert_eq!(stored.response, "first");
    }

    #[tokio::test]
    async fn update_missing_key_is_not_found() {
        let store = InMemoryReactionStore::default();
        let error = store
            .update_reaction(&key("C1", "wave", "none"), ReactionUpdate::response("x"))
            .await
            .expect_err("missing");
        assert_eq!(error, StoreError::NotFound);
    }

    #[tokio::test]
    async fn update_into_existing_audience_collides() {
        let store = InMemoryReactionStore::default();
        store.add_reaction(Reaction::new(key("C1", "wave", "none"), "a")).await.expect("add");
        store.add_reaction(Reaction::new(key("C1", "wave", "G1"), "b")).await.expect("add");

        let update = ReactionUpdate {
            response: "c".to_string(),
            audience: Some(Audience::All),
            audience_label: None,
        };
        let error =
            store.update_reaction(&key("C1", "wave", "G1"), update).await.expect_err("collision");
        assert_eq!(error, StoreError::AlreadyExists);
    }

    #[tokio::test]
    async fn delete_counts_and_removes_only_matching_records() {
        let store = InMemoryReactionStore::default();
        store.add_reaction(Reaction::new(key("C1", "wave", "none"), "a")).await.expect("add");
        store.add_reaction(Reaction::new(key("C1", "smile", "none"), "b")).await.expect("add");

        let removed = store.delete_reactions(&key("C1", "wave", "none")).await.expect("delete");
        assert_eq!(removed, 1);
        assert!(store.reaction_exists(&key("C1", "wave", "none")).await.expect("exists").is_none());
        assert!(store.reaction_exists(&key("C1", "smile", "none")).await.expect("exists").is_some());

        let error = store.delete_reactions(&key("C1", "wave", "none")).await.expect_err("gone");
        assert_eq!(error, StoreError::NotFound);
    }

    #[tokio::test]
    async fn clear_and_count_channels() {
        let store = InMemoryReactionStore::default();
        store.add_reaction(Reaction::new(key("C1", "wave", "none"), "a")).await.expect("add");
        store.add_reaction(Reaction::new(key("C1", "smile", "none"), "b")).await.expect("add");
        store.add_reaction(Reaction::new(key("C2", "wave", "none"), "c")).await.expect("add");

        let counts = store.count_channels().await.expect("count");
        assert_eq!(counts.get("C1"), Some(&2));
        assert_eq!(counts.get("C2"), Some(&1));

        assert_eq!(store.delete_channel_reactions("C1").await.expect("clear"), 2);
        assert_eq!(
            store.delete_channel_reactions("C1").await.expect_err("empty"),
            StoreError::NotFound
        );
    }

    #[tokio::test]
    async fn ledger_store_is_a_one_time_claim() {
        let ledger = InMemoryResponseLedger::default();
        let key = ResponseKey {
            channel: "C1".to_string(),
            discriminator: "wave".to_string(),
            timestamp: ThreadKey::Unthreaded,
        };

        assert!(!ledger.response_exists(&key).await.expect("exists"));
        ledger.store_response(&key).await.expect("first claim");
        assert_eq!(ledger.store_response(&key).await, Err(StoreError::AlreadyExists));

        ledger.remove_response(&key).await.expect("release");
        assert!(!ledger.response_exists(&key).await.expect("exists"));
    }
}
