use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use skelly_slack::blocks;
use skelly_slack::commands::{CommandReply, CommandRouter, SlashCommandPayload};
use skelly_slack::events::{parse_events_request, EventContext, EventDispatcher, EventsApiRequest, SlackEnvelope};
use skelly_slack::interactions::{parse_interaction, Submission, SubmissionReply, SubmissionRouter};
use skelly_slack::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::health::{self, HealthState};
use crate::services::{ReactionService, ReplySink};

const INTERNAL_ERROR_TEXT: &str = "Sorry, something went wrong on my end. Please retry shortly.";

#[derive(Clone)]
pub struct SlackState {
    pub verifier: Arc<SignatureVerifier>,
    pub commands: Arc<CommandRouter<ReactionService>>,
    pub submissions: Arc<SubmissionRouter<ReactionService>>,
    pub events: Arc<EventDispatcher>,
    pub replies: Arc<dyn ReplySink>,
}

impl SlackState {
    fn authenticate(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), StatusCode> {
        let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
        self.verifier.verify(header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER), body).map_err(
            |error| {
                warn!(
                    event_name = "ingress.slack.signature_rejected",
                    error = %error,
                    "rejecting unsigned or stale request"
                );
                StatusCode::UNAUTHORIZED
            },
        )
    }
}

/// Slack endpoints live under `route_prefix`, which starts and ends with `/`.
pub fn router(slack: SlackState, route_prefix: &str, health: HealthState) -> Router {
    Router::new()
        .route(&format!("{route_prefix}commands"), post(commands))
        .route(&format!("{route_prefix}events"), post(events))
        .route(&format!("{route_prefix}interactions"), post(interactions))
        .with_state(slack)
        .merge(health::router(health))
        .layer(TraceLayer::new_for_http())
}

async fn commands(State(state): State<SlackState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(status) = state.authenticate(&headers, &body) {
        return status.into_response();
    }
    let payload = match SlashCommandPayload::from_form(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(event_name = "ingress.slack.command_rejected", error = %error, "bad slash command form");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    tokio::spawn(process_command(state, payload));
    StatusCode::OK.into_response()
}

async fn process_command(state: SlackState, payload: SlashCommandPayload) {
    let reply = match state.commands.route(&payload).await {
        Ok(reply) => reply,
        Err(err) => {
            let correlation_id = Uuid::new_v4().to_string();
            error!(
                event_name = "ingress.slack.command_failed",
                correlation_id = %correlation_id,
                channel = %payload.channel_id,
                user = %payload.user_id,
                error = %err,
                "slash command failed"
            );
            CommandReply::Ephemeral(blocks::error_message(INTERNAL_ERROR_TEXT, &correlation_id))
        }
    };

    if let Err(err) = state.replies.deliver_command(&payload, reply).await {
        error!(
            event_name = "ingress.slack.reply_failed",
            channel = %payload.channel_id,
            operation = err.operation,
            error = %err.message,
            "could not deliver command reply"
        );
    }
}

async fn events(State(state): State<SlackState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(status) = state.authenticate(&headers, &body) {
        return status.into_response();
    }

    match parse_events_request(&body) {
        Ok(EventsApiRequest::UrlVerification { challenge }) => {
            (StatusCode::OK, challenge).into_response()
        }
        Ok(EventsApiRequest::EventCallback(envelope)) => {
            tokio::spawn(process_event(state, envelope));
            StatusCode::OK.into_response()
        }
        Ok(EventsApiRequest::Unsupported { request_type }) => {
            debug!(
                event_name = "ingress.slack.request_ignored",
                request_type = %request_type,
                "ignoring events api request"
            );
            StatusCode::OK.into_response()
        }
        Err(error) => {
            warn!(event_name = "ingress.slack.event_rejected", error = %error, "bad events payload");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

async fn process_event(state: SlackState, envelope: SlackEnvelope) {
    let ctx = EventContext { correlation_id: envelope.event_id.clone() };
    if let Err(err) = state.events.dispatch(&envelope, &ctx).await {
        error!(
            event_name = "ingress.slack.event_failed",
            correlation_id = %ctx.correlation_id,
            error = %err,
            "event dispatch failed"
        );
    }
}

async fn interactions(
    State(state): State<SlackState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(status) = state.authenticate(&headers, &body) {
        return status.into_response();
    }
    let submission = match parse_interaction(&body) {
        Ok(submission) => submission,
        Err(error) => {
            warn!(
                event_name = "ingress.slack.interaction_rejected",
                error = %error,
                "unsupported or malformed interaction"
            );
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    tokio::spawn(process_submission(state, submission));
    StatusCode::OK.into_response()
}

async fn process_submission(state: SlackState, submission: Submission) {
    let reply = match state.submissions.handle(&submission).await {
        Ok(reply) => reply,
        Err(err) => {
            let correlation_id = Uuid::new_v4().to_string();
            let context = submission.context();
            error!(
                event_name = "ingress.slack.submission_failed",
                correlation_id = %correlation_id,
                channel = %context.channel,
                user = %context.user,
                error = %err,
                "modal submission failed"
            );
            SubmissionReply {
                channel: context.channel.clone(),
                user: context.user.clone(),
                message: blocks::error_message(INTERNAL_ERROR_TEXT, &correlation_id),
            }
        }
    };

    let channel = reply.channel.clone();
    if let Err(err) = state.replies.deliver_submission(reply).await {
        error!(
            event_name = "ingress.slack.reply_failed",
            channel = %channel,
            operation = err.operation,
            error = %err.message,
            "could not deliver submission reply"
        );
    }
}
