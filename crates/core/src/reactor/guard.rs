use std::sync::Arc;

use crate::domain::reaction::{ResponseKey, ThreadKey};
use crate::errors::ReactionError;

use super::ports::ThreadResolver;
use super::store::{ResponseLedger, StoreError};

pub struct DedupGuard {
    ledger: Arc<dyn ResponseLedger>,
    threads: Arc<dyn ThreadResolver>,
}

impl DedupGuard {
    pub fn new(ledger: Arc<dyn ResponseLedger>, threads: Arc<dyn ThreadResolver>) -> Self {
        Self { ledger, threads }
    }

    /// Builds the marker key, collapsing replies onto their thread parent so a
    /// whole thread shares one key.
    pub async fn resolve_key(
        &self,
        channel: &str,
        discriminator: &str,
        timestamp: &ThreadKey,
    ) -> Result<ResponseKey, ReactionError> {
        let timestamp = match timestamp {
            ThreadKey::Unthreaded => ThreadKey::Unthreaded,
            ThreadKey::Ts(ts) => {
                ThreadKey::parse(&self.threads.resolve_parent_timestamp(channel, ts).await?)
            }
        };

        Ok(ResponseKey {
            channel: channel.to_string(),
            discriminator: discriminator.to_string(),
            timestamp,
        })
    }

    pub async fn should_send(&self, key: &ResponseKey) -> Result<bool, ReactionError> {
        self.ledger
            .response_exists(key)
            .await
            .map(|exists| !exists)
            .map_err(|error| error.context("response_exists", key))
    }

    /// Atomically records the marker. `Ok(false)` means another delivery already
    /// owns this key.
    pub async fn claim(&self, key: &ResponseKey) -> Result<bool, ReactionError> {
        match self.ledger.store_response(key).await {
            Ok(()) => Ok(true),
            Err(StoreError::AlreadyExists) => Ok(false),
            Err(error) => Err(error.context("store_response", key)),
        }
    }

    pub async fn mark_sent(&self, key: &ResponseKey) -> Result<(), ReactionError> {
        self.ledger.store_response(key).await.map_err(|error| error.context("store_response", key))
    }

    pub async fn release(&self, key: &ResponseKey) -> Result<(), ReactionError> {
        self.ledger.remove_response(key).await.map_err(|error| error.context("remove_response", key))
    }
}
