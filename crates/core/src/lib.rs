pub mod config;
pub mod domain;
pub mod emoji;
pub mod errors;
pub mod reactor;

pub use domain::emoji::Emoji;
pub use domain::reaction::{
    Audience, Reaction, ReactionKey, ReactionUpdate, ReactionVariant, ResponseKey, ThreadKey,
    Trigger,
};
pub use domain::stats::{ChannelStats, ChannelSummary, WorkspaceStats};
pub use emoji::{AliasCache, AliasTable, EmojiSource};
pub use errors::{InterfaceError, ReactionError};
pub use reactor::{Dispatcher, ReactionAdmin, ReactionStats};
