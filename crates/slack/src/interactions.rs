use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use skelly_core::ReactionError;
use thiserror::Error;
use tracing::info;

use crate::blocks::{self, MessageTemplate, RESPONSE_ACTION_ID, RESPONSE_BLOCK_ID};
use crate::commands::{CommandParseError, ModalAction, ModalMetadata, ReactionTarget};

#[derive(Deserialize)]
struct InteractionForm {
    payload: String,
}

#[derive(Deserialize)]
struct InteractionPayload {
    #[serde(rename = "type")]
    kind: String,
    user: InteractionUser,
    #[serde(default)]
    view: Option<ViewPayload>,
}

#[derive(Deserialize)]
struct InteractionUser {
    id: String,
}

#[derive(Deserialize)]
struct ViewPayload {
    callback_id: String,
    #[serde(default)]
    private_metadata: String,
    #[serde(default)]
    state: ViewState,
}

#[derive(Default, Deserialize)]
struct ViewState {
    #[serde(default)]
    values: HashMap<String, HashMap<String, InputValue>>,
}

#[derive(Deserialize)]
struct InputValue {
    #[serde(default)]
    value: Option<String>,
}

/// Who submitted a modal and which reaction it is about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionContext {
    pub user: String,
    pub channel: String,
    pub target: ReactionTarget,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Add { context: SubmissionContext, response: String },
    Update { context: SubmissionContext, response: String },
    Delete { context: SubmissionContext },
}

impl Submission {
    pub fn context(&self) -> &SubmissionContext {
        match self {
            Self::Add { context, .. } | Self::Update { context, .. } | Self::Delete { context } => {
                context
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InteractionError {
    #[error("invalid interaction form: {0}")]
    InvalidForm(String),
    #[error("invalid interaction payload: {0}")]
    InvalidPayload(String),
    #[error("unsupported interaction type `{0}`")]
    Unsupported(String),
    #[error("unsupported submission action `{0}`")]
    UnsupportedAction(String),
    #[error(transparent)]
    Metadata(#[from] CommandParseError),
    #[error("submission has no response value")]
    MissingResponse,
    #[error("submission service failed: {0}")]
    Service(#[from] ReactionError),
}

/// Decodes the `payload=<json>` form Slack posts to the interactivity URL.
/// Only `view_submission` is accepted.
pub fn parse_interaction(body: &[u8]) -> Result<Submission, InteractionError> {
    let form: InteractionForm = serde_urlencoded::from_bytes(body)
        .map_err(|error| InteractionError::InvalidForm(error.to_string()))?;
    let payload: InteractionPayload = serde_json::from_str(&form.payload)
        .map_err(|error| InteractionError::InvalidPayload(error.to_string()))?;

    if payload.kind != "view_submission" {
        return Err(InteractionError::Unsupported(payload.kind));
    }
    let view = payload
        .view
        .ok_or_else(|| InteractionError::InvalidPayload("view_submission without view".to_owned()))?;

    // callback ids may carry a `:suffix`
    let verb = view.callback_id.split(':').next().unwrap_or_default();
    let action = ModalAction::parse(verb)
        .ok_or_else(|| InteractionError::UnsupportedAction(view.callback_id.clone()))?;

    let metadata = ModalMetadata::parse(&view.private_metadata)?;
    let context =
        SubmissionContext { user: payload.user.id, channel: metadata.channel, target: metadata.target };

    let response = view
        .state
        .values
        .get(RESPONSE_BLOCK_ID)
        .and_then(|block| block.get(RESPONSE_ACTION_ID))
        .and_then(|input| input.value.clone())
        .filter(|value| !value.is_empty());

    match action {
        ModalAction::Add => Ok(Submission::Add {
            context,
            response: response.ok_or(InteractionError::MissingResponse)?,
        }),
        ModalAction::Update => Ok(Submission::Update {
            context,
            response: response.ok_or(InteractionError::MissingResponse)?,
        }),
        ModalAction::Delete => Ok(Submission::Delete { context }),
    }
}

#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn add_reaction(
        &self,
        context: &SubmissionContext,
        response: &str,
    ) -> Result<(), ReactionError>;

    async fn update_reaction(
        &self,
        context: &SubmissionContext,
        response: &str,
    ) -> Result<(), ReactionError>;

    async fn delete_reaction(&self, context: &SubmissionContext) -> Result<u64, ReactionError>;
}

/// An ephemeral confirmation for the submitting user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionReply {
    pub channel: String,
    pub user: String,
    pub message: MessageTemplate,
}

pub struct SubmissionRouter<S> {
    service: S,
}

impl<S> SubmissionRouter<S>
where
    S: SubmissionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn handle(&self, submission: &Submission) -> Result<SubmissionReply, InteractionError> {
        let context = submission.context();
        info!(
            event_name = "ingress.slack.submission",
            channel = %context.channel,
            user = %context.user,
            emoji = %context.target.emoji_token(),
            "handling modal submission"
        );

        let outcome = match submission {
            Submission::Add { context, response } => self
                .service
                .add_reaction(context, response)
                .await
                .map(|()| added_text(&context.target)),
            Submission::Update { context, response } => self
                .service
                .update_reaction(context, response)
                .await
                .map(|()| "I've updated the reaction for this channel!".to_owned()),
            Submission::Delete { context } => self
                .service
                .delete_reaction(context)
                .await
                .map(|_| "I've deleted the reaction for this channel!".to_owned()),
        };

        let text = match outcome {
            Ok(text) => text,
            Err(error) if error.is_user_facing() => {
                error.into_interface("modal-submission").user_message().to_owned()
            }
            Err(error) => return Err(InteractionError::Service(error)),
        };

        Ok(SubmissionReply {
            channel: context.channel.clone(),
            user: context.user.clone(),
            message: blocks::notice_message(&text),
        })
    }
}

fn added_text(target: &ReactionTarget) -> String {
    let emoji = match &target.emoji {
        Some(_) => target.emoji_token(),
        None => "messages".to_owned(),
    };
    match &target.handle {
        Some(handle) => format!("Okay, I will respond to {emoji} for users in @{handle}."),
        None => format!("Okay, I will respond to {emoji} for *all users* in this channel."),
    }
}
