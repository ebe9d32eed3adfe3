use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ReactionError;

/// Stored in place of an audience or thread timestamp when none applies.
pub const NONE_SENTINEL: &str = "none";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionVariant {
    /// Rules keyed by `(channel, emoji, audience)`, triggered by emoji reactions.
    #[serde(rename = "emoji")]
    PerEmoji,
    /// One rule per channel, triggered by any message typed in it.
    #[serde(rename = "channel")]
    PerChannel,
}

impl ReactionVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerEmoji => "emoji",
            Self::PerChannel => "channel",
        }
    }
}

impl std::str::FromStr for ReactionVariant {
    type Err = ReactionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "emoji" | "per_emoji" => Ok(Self::PerEmoji),
            "channel" | "per_channel" => Ok(Self::PerChannel),
            other => Err(ReactionError::InvalidInput(format!(
                "unsupported reaction variant `{other}` (expected emoji|channel)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Audience {
    All,
    Group(String),
}

impl Audience {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(NONE_SENTINEL) {
            Self::All
        } else {
            Self::Group(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => NONE_SENTINEL,
            Self::Group(id) => id,
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    pub fn admits(&self, user_groups: &[String]) -> bool {
        match self {
            Self::All => true,
            Self::Group(id) => user_groups.iter().any(|group| group.eq_ignore_ascii_case(id)),
        }
    }
}

impl From<String> for Audience {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Audience> for String {
    fn from(value: Audience) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReactionKey {
    pub channel: String,
    pub emoji: Option<String>,
    pub audience: Audience,
}

impl ReactionKey {
    pub fn per_emoji(
        channel: impl Into<String>,
        emoji: impl Into<String>,
        audience: Audience,
    ) -> Self {
        Self { channel: channel.into(), emoji: Some(emoji.into()), audience }
    }

    pub fn per_channel(channel: impl Into<String>) -> Self {
        Self { channel: channel.into(), emoji: None, audience: Audience::All }
    }

    pub fn validate(&self, variant: ReactionVariant) -> Result<(), ReactionError> {
        if self.channel.trim().is_empty() {
            return Err(ReactionError::InvalidInput("channel must not be empty".to_string()));
        }
        match (variant, self.emoji.as_deref()) {
            (ReactionVariant::PerEmoji, None) => Err(ReactionError::InvalidInput(
                "an emoji is required for per-emoji reactions".to_string(),
            )),
            (ReactionVariant::PerEmoji, Some(emoji)) if emoji.trim().is_empty() => Err(
                ReactionError::InvalidInput("an emoji is required for per-emoji reactions".to_string()),
            ),
            (ReactionVariant::PerChannel, Some(_)) => Err(ReactionError::InvalidInput(
                "per-channel reactions do not take an emoji".to_string(),
            )),
            (ReactionVariant::PerChannel, None) if self.audience.is_restricted() => {
                Err(ReactionError::InvalidInput(
                    "per-channel reactions apply to all users".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ReactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel={}", self.channel)?;
        if let Some(emoji) = &self.emoji {
            write!(f, " emoji={emoji}")?;
        }
        write!(f, " audience={}", self.audience.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub channel: String,
    pub emoji: Option<String>,
    pub audience: Audience,
    /// Human readable group handle; `none` when unrestricted.
    pub audience_label: String,
    pub response: String,
}

impl Reaction {
    pub fn new(key: ReactionKey, response: impl Into<String>) -> Self {
        let audience_label = key.audience.as_str().to_string();
        Self {
            channel: key.channel,
            emoji: key.emoji,
            audience: key.audience,
            audience_label,
            response: response.into(),
        }
    }

    pub fn with_audience_label(mut self, label: impl Into<String>) -> Self {
        self.audience_label = label.into();
        self
    }

    pub fn key(&self) -> ReactionKey {
        ReactionKey {
            channel: self.channel.clone(),
            emoji: self.emoji.clone(),
            audience: self.audience.clone(),
        }
    }

    pub fn has_response(&self) -> bool {
        !self.response.trim().is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionUpdate {
    pub response: String,
    pub audience: Option<Audience>,
    pub audience_label: Option<String>,
}

impl ReactionUpdate {
    pub fn response(response: impl Into<String>) -> Self {
        Self { response: response.into(), audience: None, audience_label: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ThreadKey {
    Unthreaded,
    Ts(String),
}

impl ThreadKey {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(NONE_SENTINEL) {
            Self::Unthreaded
        } else {
            Self::Ts(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unthreaded => NONE_SENTINEL,
            Self::Ts(ts) => ts,
        }
    }
}

impl From<String> for ThreadKey {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ThreadKey> for String {
    fn from(value: ThreadKey) -> Self {
        value.as_str().to_string()
    }
}

/// Dedup marker key: one reply per `(channel, discriminator, timestamp)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseKey {
    pub channel: String,
    pub discriminator: String,
    pub timestamp: ThreadKey,
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel={} discriminator={} ts={}",
            self.channel,
            self.discriminator,
            self.timestamp.as_str()
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub channel: String,
    pub emoji: Option<String>,
    pub user: String,
    pub timestamp: ThreadKey,
}

impl Trigger {
    pub fn emoji_added(
        channel: impl Into<String>,
        emoji: impl Into<String>,
        user: impl Into<String>,
        timestamp: ThreadKey,
    ) -> Self {
        Self { channel: channel.into(), emoji: Some(emoji.into()), user: user.into(), timestamp }
    }

    pub fn message_typed(
        channel: impl Into<String>,
        user: impl Into<String>,
        timestamp: ThreadKey,
    ) -> Self {
        Self { channel: channel.into(), emoji: None, user: user.into(), timestamp }
    }
}
