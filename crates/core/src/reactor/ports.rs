use async_trait::async_trait;
use thiserror::Error;

use crate::errors::ReactionError;

/// Failure reported by a remote collaborator, tagged with the call that failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{operation}: {message}")]
pub struct CollaboratorError {
    pub operation: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self { operation, message: message.into() }
    }
}

impl From<CollaboratorError> for ReactionError {
    fn from(value: CollaboratorError) -> Self {
        ReactionError::UpstreamFailure { operation: value.operation, message: value.message }
    }
}

pub trait AliasResolver: Send + Sync {
    fn resolve_canonical(&self, alias: &str) -> Result<String, ReactionError>;
}

#[async_trait]
pub trait AudienceDirectory: Send + Sync {
    async fn groups_containing(&self, user: &str) -> Result<Vec<String>, CollaboratorError>;
}

#[async_trait]
pub trait ThreadResolver: Send + Sync {
    async fn resolve_parent_timestamp(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<String, CollaboratorError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    pub text: String,
    pub thread_ts: Option<String>,
}

#[async_trait]
pub trait MessagePoster: Send + Sync {
    /// Returns the timestamp of the posted message.
    async fn post(&self, message: OutboundMessage) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn channel_name(&self, channel: &str) -> Result<Option<String>, CollaboratorError>;
}
