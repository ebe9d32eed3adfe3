use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use skelly_core::reactor::DispatchReport;
use skelly_core::{ReactionError, ReactionVariant, ThreadKey, Trigger};
use thiserror::Error;
use tracing::debug;

/// A parsed request to the Events API endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventsApiRequest {
    UrlVerification { challenge: String },
    EventCallback(SlackEnvelope),
    Unsupported { request_type: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("invalid events payload: {0}")]
    InvalidPayload(String),
    #[error("url_verification without challenge")]
    MissingChallenge,
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    event: Option<RawEvent>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    reaction: Option<String>,
    #[serde(default)]
    item: Option<RawItem>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

pub fn parse_events_request(body: &[u8]) -> Result<EventsApiRequest, EventParseError> {
    let raw: RawRequest = serde_json::from_slice(body)
        .map_err(|error| EventParseError::InvalidPayload(error.to_string()))?;

    match raw.kind.as_str() {
        "url_verification" => {
            let challenge = raw.challenge.ok_or(EventParseError::MissingChallenge)?;
            Ok(EventsApiRequest::UrlVerification { challenge })
        }
        "event_callback" => {
            let event = raw.event.ok_or_else(|| {
                EventParseError::InvalidPayload("event_callback without event".to_owned())
            })?;
            Ok(EventsApiRequest::EventCallback(SlackEnvelope {
                event_id: raw.event_id.unwrap_or_default(),
                event: SlackEvent::from_raw(event),
            }))
        }
        _ => Ok(EventsApiRequest::Unsupported { request_type: raw.kind }),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub event_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    ReactionAdded(ReactionAddedEvent),
    MessagePosted(MessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::ReactionAdded(_) => SlackEventType::ReactionAdded,
            Self::MessagePosted(_) => SlackEventType::MessagePosted,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    fn from_raw(raw: RawEvent) -> Self {
        match raw.kind.as_str() {
            "reaction_added" => {
                let item = raw.item.unwrap_or(RawItem { channel: None, ts: None });
                match (item.channel, raw.user, raw.reaction) {
                    (Some(channel_id), Some(user_id), Some(reaction)) => {
                        Self::ReactionAdded(ReactionAddedEvent {
                            channel_id,
                            item_ts: item.ts,
                            user_id,
                            reaction,
                        })
                    }
                    _ => Self::Unsupported { event_type: "reaction_added.incomplete".to_owned() },
                }
            }
            // edits, joins and bot posts (including our own replies) never trigger
            "message" if raw.subtype.is_some() || raw.bot_id.is_some() => Self::Unsupported {
                event_type: format!("message.{}", raw.subtype.as_deref().unwrap_or("bot")),
            },
            "message" => match (raw.channel, raw.user, raw.ts) {
                (Some(channel_id), Some(user_id), Some(ts)) => Self::MessagePosted(MessageEvent {
                    channel_id,
                    user_id,
                    ts,
                    thread_ts: raw.thread_ts,
                }),
                _ => Self::Unsupported { event_type: "message.incomplete".to_owned() },
            },
            _ => Self::Unsupported { event_type: raw.kind },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    ReactionAdded,
    MessagePosted,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionAddedEvent {
    pub channel_id: String,
    /// Timestamp of the message the emoji was added to.
    pub item_ts: Option<String>,
    pub user_id: String,
    pub reaction: String,
}

impl ReactionAddedEvent {
    pub fn trigger(&self) -> Trigger {
        let timestamp = self.item_ts.as_deref().map_or(ThreadKey::Unthreaded, ThreadKey::parse);
        Trigger::emoji_added(&self.channel_id, &self.reaction, &self.user_id, timestamp)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

impl MessageEvent {
    pub fn trigger(&self) -> Trigger {
        let ts = self.thread_ts.as_deref().unwrap_or(&self.ts);
        Trigger::message_typed(&self.channel_id, &self.user_id, ThreadKey::parse(ts))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Dispatched(DispatchReport),
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("trigger handling failed: {0}")]
    Trigger(#[from] ReactionError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            debug!(
                event_name = "ingress.slack.event_ignored",
                event_id = %envelope.event_id,
                correlation_id = %ctx.correlation_id,
                "no handler registered for event"
            );
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers the handler whose events drive the configured variant:
/// emoji reactions for per-emoji rules, typed messages for per-channel rules.
pub fn trigger_dispatcher<S>(variant: ReactionVariant, service: Arc<S>) -> EventDispatcher
where
    S: TriggerService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    match variant {
        ReactionVariant::PerEmoji => dispatcher.register(ReactionAddedHandler::new(service)),
        ReactionVariant::PerChannel => dispatcher.register(MessageHandler::new(service)),
    }
    dispatcher
}

#[async_trait]
pub trait TriggerService: Send + Sync {
    async fn handle_trigger(
        &self,
        trigger: &Trigger,
        ctx: &EventContext,
    ) -> Result<DispatchReport, ReactionError>;
}

pub struct ReactionAddedHandler<S> {
    service: Arc<S>,
}

impl<S> ReactionAddedHandler<S>
where
    S: TriggerService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ReactionAddedHandler<S>
where
    S: TriggerService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ReactionAdded
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ReactionAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let report = self.service.handle_trigger(&event.trigger(), ctx).await?;
        Ok(HandlerResult::Dispatched(report))
    }
}

pub struct MessageHandler<S> {
    service: Arc<S>,
}

impl<S> MessageHandler<S>
where
    S: TriggerService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: TriggerService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::MessagePosted
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::MessagePosted(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let report = self.service.handle_trigger(&event.trigger(), ctx).await?;
        Ok(HandlerResult::Dispatched(report))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;
    use skelly_core::reactor::{DispatchReport, DispatchState};
    use skelly_core::{ReactionError, ReactionVariant, ThreadKey, Trigger};

    use super::{
        parse_events_request, trigger_dispatcher, EventContext, EventDispatcher, EventsApiRequest,
        HandlerResult, MessageEvent, SlackEnvelope, SlackEvent,
    };

    #[derive(Default)]
    struct RecordingService {
        triggers: Mutex<Vec<Trigger>>,
        fail: bool,
    }

    #[async_trait]
    impl super::TriggerService for RecordingService {
        async fn handle_trigger(
            &self,
            trigger: &Trigger,
            _ctx: &EventContext,
        ) -> Result<DispatchReport, ReactionError> {
            self.triggers.lock().expect("triggers lock").push(trigger.clone());
            if self.fail {
                return Err(ReactionError::UpstreamFailure {
                    operation: "conversations.replies",
                    message: "channel_not_found".to_owned(),
                });
            }
            Ok(DispatchReport { state: DispatchState::Skipped, response_key: None, reactions: vec![] })
        }
    }

    fn envelope(body: serde_json::Value) -> SlackEnvelope {
        match parse_events_request(body.to_string().as_bytes()).expect("parse") {
            EventsApiRequest::EventCallback(envelope) => envelope,
            other => panic!("expected event callback, got {other:?}"),
        }
    }

    fn reaction_added(reaction: &str) -> serde_json::Value {
        json!({
            "type": "event_callback",
            "event_id": "Ev1",
            "event": {
                "type": "reaction_added",
                "user": "U1",
                "reaction": reaction,
                "item": {"type": "message", "channel": "C1", "ts": "1730000000.0001"}
            }
        })
    }

    #[test]
    fn url_verification_carries_challenge() {
        let body = json!({"type": "url_verification", "token": "t", "challenge": "abc123"});
        assert_eq!(
            parse_events_request(body.to_string().as_bytes()),
            Ok(EventsApiRequest::UrlVerification { challenge: "abc123".to_owned() })
        );
    }

    #[test]
    fn reaction_added_becomes_emoji_trigger() {
        let SlackEvent::ReactionAdded(event) = envelope(reaction_added("thumbsup")).event else {
            panic!("expected reaction event");
        };

        assert_eq!(
            event.trigger(),
            Trigger::emoji_added("C1", "thumbsup", "U1", ThreadKey::Ts("1730000000.0001".to_owned()))
        );
    }

    #[test]
    fn bot_and_edited_messages_are_not_triggers() {
        let bot = envelope(json!({
            "type": "event_callback",
            "event": {"type": "message", "bot_id": "B1", "channel": "C1", "ts": "1.0", "text": "hi"}
        }));
        assert_eq!(bot.event, SlackEvent::Unsupported { event_type: "message.bot".to_owned() });

        let edited = envelope(json!({
            "type": "event_callback",
            "event": {"type": "message", "subtype": "message_changed", "channel": "C1"}
        }));
        assert_eq!(
            edited.event,
            SlackEvent::Unsupported { event_type: "message.message_changed".to_owned() }
        );
    }

    #[test]
    fn threaded_message_triggers_on_thread_parent() {
        let event = MessageEvent {
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            ts: "2.0".to_owned(),
            thread_ts: Some("1.0".to_owned()),
        };
        assert_eq!(event.trigger().timestamp, ThreadKey::Ts("1.0".to_owned()));
    }

    #[tokio::test]
    async fn emoji_dispatcher_routes_reactions_and_ignores_messages() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = trigger_dispatcher(ReactionVariant::PerEmoji, service.clone());
        assert_eq!(dispatcher.handler_count(), 1);

        let result = dispatcher
            .dispatch(&envelope(reaction_added("wave")), &EventContext::default())
            .await
            .expect("dispatch");
        assert!(matches!(result, HandlerResult::Dispatched(_)));

        let message = envelope(json!({
            "type": "event_callback",
            "event": {"type": "message", "user": "U1", "channel": "C1", "ts": "1.0", "text": "hi"}
        }));
        let result =
            dispatcher.dispatch(&message, &EventContext::default()).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);

        assert_eq!(service.triggers.lock().expect("triggers lock").len(), 1);
    }

    #[tokio::test]
    async fn channel_dispatcher_routes_typed_messages() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = trigger_dispatcher(ReactionVariant::PerChannel, service.clone());

        let message = envelope(json!({
            "type": "event_callback",
            "event": {"type": "message", "user": "U1", "channel": "C1", "ts": "1.0", "text": "hi"}
        }));
        dispatcher.dispatch(&message, &EventContext::default()).await.expect("dispatch");

        let triggers = service.triggers.lock().expect("triggers lock");
        assert_eq!(triggers.as_slice(), &[Trigger::message_typed("C1", "U1", ThreadKey::Ts("1.0".to_owned()))]);
    }

    #[tokio::test]
    async fn trigger_failures_surface_from_dispatch() {
        let service = Arc::new(RecordingService { fail: true, ..RecordingService::default() });
        let dispatcher = trigger_dispatcher(ReactionVariant::PerEmoji, service);

        let result =
            dispatcher.dispatch(&envelope(reaction_added("wave")), &EventContext::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let result = dispatcher
            .dispatch(&envelope(reaction_added("wave")), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }
}
