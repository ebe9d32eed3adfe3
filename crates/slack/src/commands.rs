use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use skelly_core::domain::reaction::NONE_SENTINEL;
use skelly_core::{Audience, Reaction, ReactionError, ReactionVariant};
use thiserror::Error;
use tracing::info;

use crate::blocks::{self, MessageTemplate, ModalView};

/// Form body Slack posts for a slash command.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub response_url: String,
}

impl SlashCommandPayload {
    pub fn from_form(body: &[u8]) -> Result<Self, CommandParseError> {
        serde_urlencoded::from_bytes(body)
            .map_err(|error| CommandParseError::InvalidForm(error.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModalAction {
    Add,
    Update,
    Delete,
}

impl ModalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "add" => Some(Self::Add),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// What a command or modal points at: an emoji (absent for per-channel
/// reactions) and the audience it applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionTarget {
    pub emoji: Option<String>,
    pub audience: Audience,
    /// The usergroup token as typed (`<!subteam^ID|@handle>`) or `none`.
    pub usergroup: String,
    pub handle: Option<String>,
}

impl ReactionTarget {
    pub fn everyone(emoji: Option<String>) -> Self {
        Self { emoji, audience: Audience::All, usergroup: NONE_SENTINEL.to_owned(), handle: None }
    }

    pub fn parse(emoji: Option<&str>, usergroup: &str) -> Result<Self, CommandParseError> {
        let emoji = match emoji {
            Some(token) => Some(
                parse_emoji(token).ok_or_else(|| CommandParseError::InvalidEmoji(token.to_owned()))?,
            ),
            None => None,
        };

        if usergroup.eq_ignore_ascii_case(NONE_SENTINEL) {
            return Ok(Self::everyone(emoji));
        }
        let (id, handle) = parse_usergroup(usergroup)
            .ok_or_else(|| CommandParseError::InvalidUsergroup(usergroup.to_owned()))?;

        Ok(Self {
            emoji,
            audience: Audience::Group(id),
            usergroup: usergroup.to_owned(),
            handle: Some(handle),
        })
    }

    /// `:wave:`, or `none` when the target has no emoji.
    pub fn emoji_token(&self) -> String {
        match &self.emoji {
            Some(emoji) => format!(":{emoji}:"),
            None => NONE_SENTINEL.to_owned(),
        }
    }
}

/// Modal `private_metadata`: `"<action> <emoji> <usergroup> <channel>"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModalMetadata {
    pub action: ModalAction,
    pub channel: String,
    pub target: ReactionTarget,
}

impl ModalMetadata {
    pub fn parse(raw: &str) -> Result<Self, CommandParseError> {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        let [action, emoji, usergroup, channel] = parts.as_slice() else {
            return Err(CommandParseError::InvalidMetadata(raw.to_owned()));
        };
        let action = ModalAction::parse(action)
            .ok_or_else(|| CommandParseError::InvalidMetadata(raw.to_owned()))?;
        let emoji = (!emoji.eq_ignore_ascii_case(NONE_SENTINEL)).then_some(*emoji);

        Ok(Self {
            action,
            channel: (*channel).to_owned(),
            target: ReactionTarget::parse(emoji, usergroup)?,
        })
    }
}

impl fmt::Display for ModalMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.action.as_str(),
            self.target.emoji_token(),
            self.target.usergroup,
            self.channel
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReactionCommand {
    Help,
    List,
    Add(ReactionTarget),
    Update(ReactionTarget),
    Delete(ReactionTarget),
    /// Arguments had the right shape but did not parse; the message says why.
    Rejected { message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("invalid slash command form: {0}")]
    InvalidForm(String),
    #[error("`{0}` is not an emoji")]
    InvalidEmoji(String),
    #[error("`{0}` is not a usergroup")]
    InvalidUsergroup(String),
    #[error("invalid modal metadata `{0}`")]
    InvalidMetadata(String),
}

impl CommandParseError {
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmoji(token) => format!(
                "Sorry, is {token} a valid emoji? Try using the autocomplete, starting with `:` !"
            ),
            Self::InvalidUsergroup(token) => format!(
                "Sorry, is {token} a valid usergroup? Try using the autocomplete, starting with `@` !"
            ),
            Self::InvalidForm(_) | Self::InvalidMetadata(_) => {
                "Sorry, I couldn't understand that request.".to_owned()
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("command service failed: {0}")]
    Service(#[from] ReactionError),
}

/// How the caller should deliver a routed command's answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandReply {
    /// Post to the command's `response_url`.
    Respond(MessageTemplate),
    /// `chat.postEphemeral` to the invoking user.
    Ephemeral(MessageTemplate),
    /// `views.open` with the command's trigger id.
    OpenModal(ModalView),
}

/// Extracts `smile` from `:smile:`. Text around the first colon pair is ignored.
pub fn parse_emoji(token: &str) -> Option<String> {
    let (_, rest) = token.split_once(':')?;
    let (name, _) = rest.split_once(':')?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_owned())
}

/// Extracts `(id, handle)` from Slack's `<!subteam^ID|@handle>` mention.
pub fn parse_usergroup(token: &str) -> Option<(String, String)> {
    let start = token.find("<!subteam^")?;
    let inner = &token[start + "<!subteam^".len()..];
    let inner = &inner[..inner.rfind('>')?];
    let (id, handle) = inner.split_once('|')?;
    let handle = handle.strip_prefix('@')?;
    if id.is_empty() || handle.is_empty() {
        return None;
    }
    Some((id.to_owned(), handle.to_owned()))
}

/// Parses the text after the slash command. Text is lowercased first; any
/// unknown verb or wrong argument count is answered with help.
pub fn parse_command(text: &str, variant: ReactionVariant) -> ReactionCommand {
    let lowered = text.trim().to_lowercase();
    let args: Vec<&str> = lowered.split_whitespace().collect();
    let Some((verb, rest)) = args.split_first() else {
        return ReactionCommand::Help;
    };

    let target = || -> Option<Result<ReactionTarget, CommandParseError>> {
        match (variant, rest) {
            (ReactionVariant::PerEmoji, [emoji]) => {
                Some(ReactionTarget::parse(Some(*emoji), NONE_SENTINEL))
            }
            (ReactionVariant::PerEmoji, [emoji, usergroup]) => {
                Some(ReactionTarget::parse(Some(*emoji), usergroup))
            }
            (ReactionVariant::PerChannel, []) => Some(Ok(ReactionTarget::everyone(None))),
            _ => None,
        }
    };

    let build = |make: fn(ReactionTarget) -> ReactionCommand| match target() {
        Some(Ok(target)) => make(target),
        Some(Err(error)) => ReactionCommand::Rejected { message: error.user_message() },
        None => ReactionCommand::Help,
    };

    match *verb {
        "help" => ReactionCommand::Help,
        "list" if rest.is_empty() => ReactionCommand::List,
        "add" => build(ReactionCommand::Add),
        "update" => build(ReactionCommand::Update),
        "delete" => build(ReactionCommand::Delete),
        _ => ReactionCommand::Help,
    }
}

/// Store lookups a slash command needs before it can answer.
#[async_trait]
pub trait ReactionCommandService: Send + Sync {
    async fn list_reactions(&self, channel: &str) -> Result<Vec<Reaction>, ReactionError>;

    async fn find_reaction(
        &self,
        channel: &str,
        target: &ReactionTarget,
    ) -> Result<Option<Reaction>, ReactionError>;
}

pub struct CommandRouter<S> {
    service: S,
    variant: ReactionVariant,
    command: String,
}

impl<S> CommandRouter<S>
where
    S: ReactionCommandService,
{
    pub fn new(service: S, variant: ReactionVariant, command: impl Into<String>) -> Self {
        Self { service, variant, command: command.into() }
    }

    pub async fn route(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<CommandReply, CommandRouteError> {
        if payload.command != self.command {
            return Err(CommandRouteError::UnsupportedCommand(payload.command.clone()));
        }

        let command_line = format!("{} {}", payload.command, payload.text.trim().to_lowercase());
        let command = parse_command(&payload.text, self.variant);
        info!(
            event_name = "ingress.slack.command",
            channel = %payload.channel_id,
            user = %payload.user_id,
            command = %command_line.trim(),
            "handling slash command"
        );

        let reply = match command {
            ReactionCommand::Help => {
                CommandReply::Respond(blocks::help_message(&self.command, command_line.trim()))
            }
            ReactionCommand::Rejected { message } => {
                CommandReply::Ephemeral(blocks::notice_message(&message))
            }
            ReactionCommand::List => self.list(payload).await?,
            ReactionCommand::Add(target) => self.open(ModalAction::Add, payload, target).await?,
            ReactionCommand::Update(target) => {
                self.open(ModalAction::Update, payload, target).await?
            }
            ReactionCommand::Delete(target) => {
                self.open(ModalAction::Delete, payload, target).await?
            }
        };
        Ok(reply)
    }

    async fn list(&self, payload: &SlashCommandPayload) -> Result<CommandReply, CommandRouteError> {
        let reactions = match self.service.list_reactions(&payload.channel_id).await {
            Ok(reactions) => reactions,
            Err(error) => return user_facing(error),
        };
        if reactions.is_empty() {
            return Ok(CommandReply::Ephemeral(blocks::notice_message(
                "Sorry, no reactions exist for this channel.",
            )));
        }
        Ok(CommandReply::Respond(blocks::reaction_list_message(&reactions)))
    }

    async fn open(
        &self,
        action: ModalAction,
        payload: &SlashCommandPayload,
        target: ReactionTarget,
    ) -> Result<CommandReply, CommandRouteError> {
        let existing = match self.service.find_reaction(&payload.channel_id, &target).await {
            Ok(existing) => existing,
            Err(error) => return user_facing(error),
        };

        let metadata = ModalMetadata { action, channel: payload.channel_id.clone(), target };
        let emoji = metadata.target.emoji_token();
        let usergroup = metadata.target.usergroup.as_str();

        let modal = match (action, existing) {
            (ModalAction::Add, Some(_)) => return Ok(already_exists()),
            (ModalAction::Update | ModalAction::Delete, None) => return Ok(missing()),
            (ModalAction::Add, None) => blocks::reaction_modal(
                action.as_str(),
                "Add a reaction to this channel.",
                metadata.to_string(),
                &emoji,
                usergroup,
                "",
            ),
            (ModalAction::Update, Some(reaction)) => blocks::reaction_modal(
                action.as_str(),
                "Update a reaction in this channel.",
                metadata.to_string(),
                &emoji,
                usergroup,
                &reaction.response,
            ),
            (ModalAction::Delete, Some(_)) => {
                blocks::delete_modal(action.as_str(), metadata.to_string(), &emoji, usergroup)
            }
        };
        Ok(CommandReply::OpenModal(modal))
    }
}

fn already_exists() -> CommandReply {
    CommandReply::Ephemeral(blocks::notice_message(
        "Sorry, that reaction already exists. Did you mean to update?",
    ))
}

fn missing() -> CommandReply {
    CommandReply::Ephemeral(blocks::notice_message(
        "Sorry, that reaction does not exist for this channel. Did you mean to add?",
    ))
}

fn user_facing(error: ReactionError) -> Result<CommandReply, CommandRouteError> {
    if error.is_user_facing() {
        let message = error.into_interface("slash-command").user_message();
        return Ok(CommandReply::Ephemeral(blocks::notice_message(message)));
    }
    Err(CommandRouteError::Service(error))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use skelly_core::{Audience, Reaction, ReactionError, ReactionKey, ReactionVariant};

    use super::{
        parse_command, parse_emoji, parse_usergroup, CommandReply, CommandRouteError,
        CommandRouter, ModalAction, ModalMetadata, ReactionCommand, ReactionCommandService,
        ReactionTarget, SlashCommandPayload,
    };
    use crate::blocks::{Block, MessageTemplate};

    #[derive(Default)]
    struct FakeService {
        reactions: Vec<Reaction>,
        fail_with: Option<ReactionError>,
    }

    #[async_trait]
    impl ReactionCommandService for FakeService {
        async fn list_reactions(&self, channel: &str) -> Result<Vec<Reaction>, ReactionError> {
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            Ok(self.reactions.iter().filter(|r| r.channel == channel).cloned().collect())
        }

        async fn find_reaction(
            &self,
            channel: &str,
            target: &ReactionTarget,
        ) -> Result<Option<Reaction>, ReactionError> {
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            Ok(self
                .reactions
                .iter()
                .find(|r| {
                    r.channel == channel && r.emoji == target.emoji && r.audience == target.audience
                })
                .cloned())
        }
    }

    fn payload(text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: "/skelly".to_owned(),
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_id: "T.1".to_owned(),
            response_url: "https://hooks.slack.com/commands/1".to_owned(),
        }
    }

    fn router(service: FakeService) -> CommandRouter<FakeService> {
        CommandRouter::new(service, ReactionVariant::PerEmoji, "/skelly")
    }

    fn notice_text(message: &MessageTemplate) -> &str {
        match message.blocks.first() {
            Some(Block::Section { text: Some(text), .. }) => text.text(),
            _ => "",
        }
    }

    #[test]
    fn parses_emoji_and_usergroup_tokens() {
        assert_eq!(parse_emoji(":smile:"), Some("smile".to_owned()));
        assert_eq!(parse_emoji(":+1::skin-tone-2:"), Some("+1".to_owned()));
        assert_eq!(parse_emoji("smile"), None);
        assert_eq!(parse_emoji("::"), None);

        assert_eq!(
            parse_usergroup("<!subteam^s0123|@eng-team>"),
            Some(("s0123".to_owned(), "eng-team".to_owned()))
        );
        assert_eq!(parse_usergroup("@eng-team"), None);
        assert_eq!(parse_usergroup("<!subteam^s0123>"), None);
    }

    #[test]
    fn commands_are_lowercased_and_default_to_everyone() {
        let command = parse_command("ADD :Wave:", ReactionVariant::PerEmoji);
        assert_eq!(command, ReactionCommand::Add(ReactionTarget::everyone(Some("wave".to_owned()))));

        let command = parse_command("delete :wave: <!subteam^S1|@eng>", ReactionVariant::PerEmoji);
        let ReactionCommand::Delete(target) = command else {
            panic!("expected delete, got {command:?}");
        };
        assert_eq!(target.audience, Audience::Group("s1".to_owned()));
        assert_eq!(target.handle.as_deref(), Some("eng"));
    }

    #[test]
    fn wrong_arity_or_unknown_verb_falls_back_to_help() {
        for text in ["", "add", "add :a: none extra", "list everything", "frobnicate"] {
            assert_eq!(parse_command(text, ReactionVariant::PerEmoji), ReactionCommand::Help, "{text}");
        }
        assert_eq!(parse_command("list", ReactionVariant::PerEmoji), ReactionCommand::List);
        assert_eq!(parse_command("add :wave:", ReactionVariant::PerChannel), ReactionCommand::Help);
        assert_eq!(
            parse_command("add", ReactionVariant::PerChannel),
            ReactionCommand::Add(ReactionTarget::everyone(None))
        );
    }

    #[test]
    fn malformed_tokens_are_rejected_with_hint() {
        let ReactionCommand::Rejected { message } =
            parse_command("add wave", ReactionVariant::PerEmoji)
        else {
            panic!("expected rejection");
        };
        assert!(message.contains("valid emoji"));

        let ReactionCommand::Rejected { message } =
            parse_command("add :wave: @eng", ReactionVariant::PerEmoji)
        else {
            panic!("expected rejection");
        };
        assert!(message.contains("valid usergroup"));
    }

    #[test]
    fn metadata_round_trips_through_display() {
        let metadata = ModalMetadata {
            action: ModalAction::Update,
            channel: "C1".to_owned(),
            target: ReactionTarget::parse(Some(":wave:"), "<!subteam^s1|@eng>").expect("target"),
        };
        let raw = metadata.to_string();

        assert_eq!(raw, "update :wave: <!subteam^s1|@eng> C1");
        assert_eq!(ModalMetadata::parse(&raw), Ok(metadata));
        assert!(ModalMetadata::parse("update C1").is_err());
    }

    #[test]
    fn slash_command_form_decodes() {
        let body = b"command=%2Fskelly&text=add+%3Awave%3A&channel_id=C1&user_id=U1&trigger_id=T.1&response_url=https%3A%2F%2Fhooks.slack.com%2Fx";
        let payload = SlashCommandPayload::from_form(body).expect("form");

        assert_eq!(payload.command, "/skelly");
        assert_eq!(payload.text, "add :wave:");
        assert_eq!(payload.response_url, "https://hooks.slack.com/x");
    }

    #[tokio::test]
    async fn add_opens_modal_when_reaction_is_new() {
        let router = router(FakeService::default());
        let reply = router.route(&payload("add :wave:")).await.expect("route");

        let CommandReply::OpenModal(modal) = reply else {
            panic!("expected modal, got {reply:?}");
        };
        assert_eq!(modal.callback_id, "add");
        assert_eq!(modal.private_metadata, "add :wave: none C1");
    }

    #[tokio::test]
    async fn add_existing_reaction_suggests_update() {
        let service = FakeService {
            reactions: vec![Reaction::new(ReactionKey::per_emoji("C1", "wave", Audience::All), "hi")],
            ..FakeService::default()
        };
        let reply = router(service).route(&payload("add :wave:")).await.expect("route");

        let CommandReply::Ephemeral(message) = reply else {
            panic!("expected ephemeral, got {reply:?}");
        };
        assert_eq!(notice_text(&message), "Sorry, that reaction already exists. Did you mean to update?");
    }

    #[tokio::test]
    async fn update_missing_reaction_suggests_add() {
        let reply = router(FakeService::default()).route(&payload("update :wave:")).await.expect("route");

        let CommandReply::Ephemeral(message) = reply else {
            panic!("expected ephemeral, got {reply:?}");
        };
        assert!(notice_text(&message).ends_with("Did you mean to add?"));
    }

    #[tokio::test]
    async fn update_prefills_existing_response() {
        let service = FakeService {
            reactions: vec![Reaction::new(ReactionKey::per_emoji("C1", "wave", Audience::All), "hi")],
            ..FakeService::default()
        };
        let reply = router(service).route(&payload("update :wave:")).await.expect("route");

        let CommandReply::OpenModal(modal) = reply else {
            panic!("expected modal, got {reply:?}");
        };
        let payload = serde_json::to_value(&modal).expect("serialize");
        assert_eq!(payload["blocks"][2]["element"]["initial_value"], "hi");
    }

    #[tokio::test]
    async fn list_reports_empty_channel() {
        let reply = router(FakeService::default()).route(&payload("list")).await.expect("route");

        let CommandReply::Ephemeral(message) = reply else {
            panic!("expected ephemeral, got {reply:?}");
        };
        assert_eq!(notice_text(&message), "Sorry, no reactions exist for this channel.");
    }

    #[tokio::test]
    async fn unknown_alias_is_answered_not_raised() {
        let service = FakeService {
            fail_with: Some(ReactionError::UnknownAlias {
                alias: "notanemoji".to_owned(),
                detail: "could not find emoji".to_owned(),
            }),
            ..FakeService::default()
        };
        let reply = router(service).route(&payload("add :notanemoji:")).await.expect("route");
        assert!(matches!(reply, CommandReply::Ephemeral(_)));
    }

    #[tokio::test]
    async fn store_failures_surface_as_errors() {
        let service = FakeService {
            fail_with: Some(ReactionError::StoreUnavailable {
                operation: "find_reactions_by_channel",
                message: "database is locked".to_owned(),
            }),
            ..FakeService::default()
        };
        let error = router(service).route(&payload("list")).await.expect_err("store down");
        assert!(matches!(error, CommandRouteError::Service(ReactionError::StoreUnavailable { .. })));
    }

    #[tokio::test]
    async fn other_commands_are_refused() {
        let mut other = payload("list");
        other.command = "/other".to_owned();
        let error = router(FakeService::default()).route(&other).await.expect_err("unsupported");
        assert_eq!(error, CommandRouteError::UnsupportedCommand("/other".to_owned()));
    }

    #[tokio::test]
    async fn help_echoes_command_line() {
        let reply = router(FakeService::default()).route(&payload("HELP")).await.expect("route");

        let CommandReply::Respond(message) = reply else {
            panic!("expected response_url reply, got {reply:?}");
        };
        assert_eq!(notice_text(&message), "/skelly help");
    }
}
