use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::emoji::Emoji;
use crate::emoji::table::AliasTable;
use crate::errors::ReactionError;
use crate::reactor::ports::{AliasResolver, CollaboratorError};

/// An upstream list of emoji. The first source a cache is built with is the
/// primary one and must return data; later sources may legitimately be empty.
#[async_trait]
pub trait EmojiSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Vec<Emoji>, CollaboratorError>;
}

/// Process-wide alias table. Readers take a cheap `Arc` snapshot; a refresh
/// builds a complete new table and swaps the pointer.
pub struct AliasCache {
    table: RwLock<Arc<AliasTable>>,
    sources: Vec<Arc<dyn EmojiSource>>,
}

impl AliasCache {
    pub fn new(sources: Vec<Arc<dyn EmojiSource>>) -> Self {
        Self { table: RwLock::new(Arc::new(AliasTable::default())), sources }
    }

    /// A cache that is never refreshed from upstream, seeded with a fixed table.
    pub fn with_table(table: AliasTable) -> Self {
        Self { table: RwLock::new(Arc::new(table)), sources: Vec::new() }
    }

    pub fn snapshot(&self) -> Arc<AliasTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_loaded(&self) -> bool {
        !self.snapshot().is_empty()
    }

    /// Fetches every source and replaces the table. On failure the previous
    /// table stays in place.
    pub async fn refresh(&self) -> Result<usize, ReactionError> {
        let mut fetched = Vec::with_capacity(self.sources.len());
        for (index, source) in self.sources.iter().enumerate() {
            let emojis = source.fetch().await?;
            if emojis.is_empty() {
                if index == 0 {
                    return Err(ReactionError::UpstreamFailure {
                        operation: "emoji.refresh",
                        message: format!("primary emoji source `{}` returned no data", source.name()),
                    });
                }
                warn!(
                    event_name = "emoji.cache.source_empty",
                    source = source.name(),
                    "emoji source returned no entries"
                );
            }
            fetched.push(emojis);
        }

        let table = AliasTable::from_sources(fetched);
        let count = table.len();
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(table);

        info!(event_name = "emoji.cache.refreshed", emoji_count = count, "emoji alias cache loaded");
        Ok(count)
    }

    /// Refreshes on a fixed interval until `shutdown` flips to `true` or its
    /// sender is dropped. The first refresh happens one interval from now.
    pub fn spawn_refresh(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!(event_name = "emoji.cache.refresh_stopped", "emoji refresh task stopped");
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(error) = self.refresh().await {
                            warn!(
                                event_name = "emoji.cache.refresh_failed",
                                error = %error,
                                "emoji refresh failed; keeping previous table"
                            );
                        }
                    }
                }
            }
        })
    }
}

impl AliasResolver for AliasCache {
    fn resolve_canonical(&self, alias: &str) -> Result<String, ReactionError> {
        self.snapshot().resolve_canonical(alias)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::watch;

    use super::{AliasCache, EmojiSource};
    use crate::domain::emoji::Emoji;
    use crate::errors::ReactionError;
    use crate::reactor::ports::{AliasResolver, CollaboratorError};

    struct StaticSource {
        name: &'static str,
        emojis: Vec<Emoji>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(name: &'static str, emojis: Vec<Emoji>) -> Arc<Self> {
            Arc::new(Self { name, emojis, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl EmojiSource for StaticSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self) -> Result<Vec<Emoji>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.emojis.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl EmojiSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self) -> Result<Vec<Emoji>, CollaboratorError> {
            Err(CollaboratorError::new("emoji.list", "invalid_auth"))
        }
    }

    fn wave() -> Emoji {
        Emoji::new("wave", vec!["wave".to_string(), "hello".to_string()])
    }

    #[tokio::test]
    async fn refresh_loads_and_merges_sources() {
        let cache = AliasCache::new(vec![
            StaticSource::new("emoji-data", vec![wave()]),
            StaticSource::new("custom", vec![Emoji::from_custom("hi", "alias:wave")]),
        ]);

        assert!(!cache.is_loaded());
        let count = cache.refresh().await.expect("refresh");

        assert_eq!(count, 1);
        assert_eq!(cache.resolve_canonical(":hi:").ok(), Some("wave".to_string()));
    }

    #[tokio::test]
    async fn empty_primary_source_is_rejected() {
        let cache = AliasCache::new(vec![StaticSource::new("emoji-data", Vec::new())]);
        let error = cache.refresh().await.expect_err("empty primary");
        assert!(matches!(error, ReactionError::UpstreamFailure { .. }));
    }

    #[tokio::test]
    async fn empty_custom_source_is_accepted() {
        let cache = AliasCache::new(vec![
            StaticSource::new("emoji-data", vec![wave()]),
            StaticSource::new("custom", Vec::new()),
        ]);
        assert_eq!(cache.refresh().await.ok(), Some(1));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_table() {
        let loaded = AliasCache::new(vec![StaticSource::new("emoji-data", vec![wave()])]);
        loaded.refresh().await.expect("initial load");
        let previous = loaded.snapshot();

        let failing = AliasCache {
            table: std::sync::RwLock::new(previous),
            sources: vec![Arc::new(FailingSource)],
        };
        assert!(failing.refresh().await.is_err());
        assert_eq!(failing.resolve_canonical("hello").ok(), Some("wave".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_task_runs_on_interval_and_stops_on_shutdown() {
        let source = StaticSource::new("emoji-data", vec![wave()]);
        let cache = Arc::new(AliasCache::new(vec![source.clone()]));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = cache.clone().spawn_refresh(Duration::from_secs(60), shutdown_rx);

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert!(source.calls.load(Ordering::SeqCst) >= 1);
        assert!(cache.is_loaded());

        shutdown_tx.send(true).expect("send shutdown");
        handle.await.expect("refresh task joins");
    }
}
