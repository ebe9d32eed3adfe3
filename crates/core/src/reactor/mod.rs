pub mod admin;
pub mod dispatcher;
pub mod guard;
pub mod matcher;
pub mod memory;
pub mod ports;
pub mod stats;
pub mod store;

pub use admin::ReactionAdmin;
pub use dispatcher::{
    DispatchReport, DispatchState, DispatchedReaction, Dispatcher, ReactionOutcome,
};
pub use guard::DedupGuard;
pub use matcher::{MatchResult, ResponseMatcher};
pub use memory::{InMemoryReactionStore, InMemoryResponseLedger};
pub use ports::{
    AliasResolver, AudienceDirectory, ChannelDirectory, CollaboratorError, MessagePoster,
    OutboundMessage, ThreadResolver,
};
pub use stats::ReactionStats;
pub use store::{ReactionStore, ResponseLedger, StoreError};
