use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use skelly_core::config::SlackConfig;
use skelly_core::reactor::{
    AudienceDirectory, ChannelDirectory, CollaboratorError, MessagePoster, OutboundMessage,
    ThreadResolver,
};
use skelly_core::{Emoji, EmojiSource};
use tracing::debug;

use crate::blocks::{MessageTemplate, ModalView};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UserGroup {
    pub id: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Deserialize)]
struct UserGroupsResponse {
    #[serde(default)]
    usergroups: Vec<UserGroup>,
}

#[derive(Deserialize)]
struct RepliesResponse {
    #[serde(default)]
    messages: Vec<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    thread_ts: Option<String>,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ts: String,
}

#[derive(Deserialize)]
struct ConversationInfoResponse {
    channel: ConversationInfo,
}

#[derive(Deserialize)]
struct ConversationInfo {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct EmojiListResponse {
    #[serde(default)]
    emoji: HashMap<String, String>,
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    link_names: bool,
    unfurl_links: bool,
    unfurl_media: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

/// Bot-token client for the Slack Web API. Every call checks the `ok` flag and
/// reports Slack's `error` code as the failure message.
#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(
        bot_token: SecretString,
        base_url: impl Into<String>,
    ) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| CollaboratorError::new("http.client", error.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url, bot_token })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, CollaboratorError> {
        Self::new(config.bot_token.clone(), config.api_base_url.clone())
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn api_get<T: DeserializeOwned>(
        &self,
        method: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, CollaboratorError> {
        let response = self
            .http
            .get(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|error| CollaboratorError::new(method, error.to_string()))?;
        decode(method, response).await
    }

    async fn api_post<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: &impl Serialize,
    ) -> Result<T, CollaboratorError> {
        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| CollaboratorError::new(method, error.to_string()))?;
        decode(method, response).await
    }

    pub async fn user_groups(&self) -> Result<Vec<UserGroup>, CollaboratorError> {
        let response: UserGroupsResponse =
            self.api_get("usergroups.list", &[("include_users", "true")]).await?;
        Ok(response.usergroups)
    }

    pub async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        message: &MessageTemplate,
    ) -> Result<(), CollaboratorError> {
        let body = json!({
            "channel": channel,
            "user": user,
            "text": message.fallback_text,
            "blocks": message.blocks,
        });
        let _: Value = self.api_post("chat.postEphemeral", &body).await?;
        Ok(())
    }

    pub async fn open_view(
        &self,
        trigger_id: &str,
        view: &ModalView,
    ) -> Result<(), CollaboratorError> {
        let body = json!({ "trigger_id": trigger_id, "view": view });
        let _: Value = self.api_post("views.open", &body).await?;
        Ok(())
    }

    /// Posts to a slash command's `response_url`. Slack acknowledges with either a
    /// plain `ok` or a JSON `{"ok": true}` body.
    pub async fn respond(
        &self,
        response_url: &str,
        message: &MessageTemplate,
    ) -> Result<(), CollaboratorError> {
        const OPERATION: &str = "response_url";
        let response = self
            .http
            .post(response_url)
            .json(message)
            .send()
            .await
            .map_err(|error| CollaboratorError::new(OPERATION, error.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() && acknowledged(body.trim()) {
            return Ok(());
        }
        Err(CollaboratorError::new(OPERATION, format!("status {status}: {}", body.trim())))
    }
}

fn acknowledged(body: &str) -> bool {
    body == "ok"
        || serde_json::from_str::<Value>(body)
            .is_ok_and(|value| value["ok"].as_bool() == Some(true))
}

async fn decode<T: DeserializeOwned>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T, CollaboratorError> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|error| CollaboratorError::new(method, format!("status {status}: {error}")))?;

    if body["ok"].as_bool() != Some(true) {
        let error = body["error"].as_str().unwrap_or("unknown_error");
        return Err(CollaboratorError::new(method, error));
    }
    serde_json::from_value(body).map_err(|error| CollaboratorError::new(method, error.to_string()))
}

#[async_trait]
impl AudienceDirectory for SlackWebClient {
    async fn groups_containing(&self, user: &str) -> Result<Vec<String>, CollaboratorError> {
        let groups = self.user_groups().await?;
        let ids: Vec<String> = groups
            .into_iter()
            .filter(|group| group.users.iter().any(|member| member == user))
            .map(|group| group.id)
            .collect();
        debug!(user = %user, group_count = ids.len(), "resolved usergroups for user");
        Ok(ids)
    }
}

#[async_trait]
impl ThreadResolver for SlackWebClient {
    /// The first message of `conversations.replies` is the thread parent when
    /// `ts` sits in a thread; otherwise `ts` is its own parent.
    async fn resolve_parent_timestamp(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<String, CollaboratorError> {
        let response: RepliesResponse =
            self.api_get("conversations.replies", &[("channel", channel), ("ts", ts)]).await?;
        let parent = response
            .messages
            .into_iter()
            .next()
            .and_then(|message| message.thread_ts)
            .filter(|thread_ts| !thread_ts.is_empty())
            .unwrap_or_else(|| ts.to_owned());
        Ok(parent)
    }
}

#[async_trait]
impl MessagePoster for SlackWebClient {
    async fn post(&self, message: OutboundMessage) -> Result<String, CollaboratorError> {
        let request = PostMessageRequest {
            channel: &message.channel,
            text: &message.text,
            link_names: true,
            unfurl_links: true,
            unfurl_media: true,
            thread_ts: message.thread_ts.as_deref(),
        };
        let response: PostMessageResponse = self.api_post("chat.postMessage", &request).await?;
        Ok(response.ts)
    }
}

#[async_trait]
impl ChannelDirectory for SlackWebClient {
    async fn channel_name(&self, channel: &str) -> Result<Option<String>, CollaboratorError> {
        match self.api_get::<ConversationInfoResponse>("conversations.info", &[("channel", channel)]).await
        {
            Ok(response) => Ok(response.channel.name),
            Err(error) if error.message == "channel_not_found" => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Workspace custom emoji from `emoji.list`. An empty list is normal here.
#[async_trait]
impl EmojiSource for SlackWebClient {
    fn name(&self) -> &'static str {
        "slack-custom"
    }

    async fn fetch(&self) -> Result<Vec<Emoji>, CollaboratorError> {
        let response: EmojiListResponse = self.api_get("emoji.list", &[]).await?;
        let mut custom: Vec<(String, String)> = response.emoji.into_iter().collect();
        custom.sort();
        Ok(custom.iter().map(|(name, value)| Emoji::from_custom(name, value)).collect())
    }
}

/// The public emoji catalogue (`emoji.json` from iamcal/emoji-data).
pub struct EmojiDataSource {
    http: reqwest::Client,
    url: String,
}

impl EmojiDataSource {
    pub fn new(url: impl Into<String>) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| CollaboratorError::new("http.client", error.to_string()))?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl EmojiSource for EmojiDataSource {
    fn name(&self) -> &'static str {
        "emoji-data"
    }

    async fn fetch(&self) -> Result<Vec<Emoji>, CollaboratorError> {
        const OPERATION: &str = "emoji_data.fetch";
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| CollaboratorError::new(OPERATION, error.to_string()))?;
        response
            .json::<Vec<Emoji>>()
            .await
            .map_err(|error| CollaboratorError::new(OPERATION, error.to_string()))
    }
}
