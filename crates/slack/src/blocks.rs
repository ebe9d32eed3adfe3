use serde::Serialize;
use skelly_core::domain::reaction::NONE_SENTINEL;
use skelly_core::Reaction;

/// Slack renders at most 50 blocks per message; one goes to the list header.
pub const LIST_REACTION_LIMIT: usize = 49;

/// Input block and action ids carrying the response text in reaction modals.
pub const RESPONSE_BLOCK_ID: &str = "reaction.response.v1";
pub const RESPONSE_ACTION_ID: &str = "response";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlainTextInput {
    #[serde(rename = "type")]
    kind: &'static str,
    pub action_id: String,
    pub multiline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,
}

impl PlainTextInput {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self {
            kind: "plain_text_input",
            action_id: action_id.into(),
            multiline: false,
            placeholder: None,
            initial_value: None,
        }
    }

    pub fn multiline(mut self) -> Self {
        self.multiline = true;
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholder = Some(TextObject::plain(text));
        self
    }

    pub fn initial_value(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.initial_value = if value.is_empty() { None } else { Some(value) };
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: PlainTextInput,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, fields) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, fields });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        element: PlainTextInput,
    ) -> Self {
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element,
        });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    fields: Vec<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn field(&mut self, text: impl Into<String>) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> (Option<TextObject>, Vec<TextObject>) {
        (self.text, self.fields)
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// A `views.open` modal. Serializes to Slack's view payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    kind: &'static str,
    pub callback_id: String,
    pub private_metadata: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub close: TextObject,
    pub blocks: Vec<Block>,
}

impl ModalView {
    pub fn new(
        callback_id: impl Into<String>,
        private_metadata: impl Into<String>,
        submit_label: &str,
        template: MessageTemplate,
    ) -> Self {
        Self {
            kind: "modal",
            callback_id: callback_id.into(),
            private_metadata: private_metadata.into(),
            title: TextObject::plain("Skelly"),
            submit: TextObject::plain(submit_label),
            close: TextObject::plain("Close"),
            blocks: template.blocks,
        }
    }
}

/// A single mrkdwn section, used for confirmations and user-facing errors.
pub fn notice_message(text: &str) -> MessageTemplate {
    MessageBuilder::new(text.to_owned())
        .section("reaction.notice.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("reaction.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("reaction.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn help_message(command: &str, command_line: &str) -> MessageTemplate {
    MessageBuilder::new(format!("{command} help"))
        .section("reaction.help.echo.v1", |section| {
            section.mrkdwn(command_line);
        })
        .section("reaction.help.summary.v1", |section| {
            section.mrkdwn(format!(
                "I automatically react to typing.\nHere are some commands you can use the same as `{command} help`."
            ));
        })
        .section("reaction.help.commands.v1", |section| {
            section
                .field("*Command*")
                .field("*Action*")
                .field(format!("{command} help"))
                .field("prints commands and helpful information")
                .field(format!("{command} add :emoji: [@usergroup]"))
                .field("trigger a response when users react with an emoji in the channel");
        })
        .section("reaction.help.commands.more.v1", |section| {
            section
                .field(format!("{command} update :emoji: [@usergroup]"))
                .field("update a reaction in this channel")
                .field(format!("{command} delete :emoji: [@usergroup]"))
                .field("delete a reaction in this channel")
                .field(format!("{command} list"))
                .field("lists all reactions in this channel");
        })
        .build()
}

/// Lists at most [`LIST_REACTION_LIMIT`] reactions under a header.
pub fn reaction_list_message(reactions: &[Reaction]) -> MessageTemplate {
    let mut builder = MessageBuilder::new("Here are all of the reactions for this channel.")
        .section("reaction.list.header.v1", |section| {
            section.mrkdwn("Here are all of the reactions for this channel.");
        });

    for (index, reaction) in reactions.iter().take(LIST_REACTION_LIMIT).enumerate() {
        let emoji = match &reaction.emoji {
            Some(emoji) => format!(":{emoji}: ({emoji})"),
            None => "any message".to_owned(),
        };
        builder = builder.section(format!("reaction.list.item.{index}.v1"), |section| {
            section.mrkdwn(format!(
                "*Emoji*: {emoji} *Usergroup*: {}\n*Response*: {}",
                reaction.audience_label, reaction.response
            ));
        });
    }

    builder.build()
}

/// Add and update modals: emoji and audience summary plus the response input.
pub fn reaction_modal(
    callback_id: &str,
    header: &str,
    private_metadata: String,
    emoji: &str,
    usergroup: &str,
    response: &str,
) -> ModalView {
    let template = MessageBuilder::new(header.to_owned())
        .section("reaction.modal.header.v1", |section| {
            section.mrkdwn(format!(
                "{header} A reaction will trigger a response when an emoji is added to a message by a member of the specified user group."
            ));
        })
        .section("reaction.modal.target.v1", |section| {
            section
                .field(format!("*Emoji*: {emoji}"))
                .field(format!("*Usergroup*: {}", usergroup_display(usergroup)));
        })
        .input(
            RESPONSE_BLOCK_ID,
            "Response",
            PlainTextInput::new(RESPONSE_ACTION_ID)
                .multiline()
                .placeholder("Enter a response to the emoji")
                .initial_value(response),
        )
        .build();

    ModalView::new(callback_id, private_metadata, "Submit", template)
}

pub fn delete_modal(
    callback_id: &str,
    private_metadata: String,
    emoji: &str,
    usergroup: &str,
) -> ModalView {
    let template = MessageBuilder::new("Delete a reaction.")
        .section("reaction.modal.header.v1", |section| {
            section.mrkdwn("Delete a reaction.");
        })
        .section("reaction.modal.emoji.v1", |section| {
            section.field(format!("*Emoji*: {emoji}"));
        })
        .section("reaction.modal.usergroup.v1", |section| {
            section.field(format!("*Usergroup*: {}", usergroup_display(usergroup)));
        })
        .build();

    ModalView::new(callback_id, private_metadata, "Delete", template)
}

fn usergroup_display(usergroup: &str) -> String {
    if usergroup == NONE_SENTINEL {
        format!("{usergroup} (all users)")
    } else {
        usergroup.to_owned()
    }
}
