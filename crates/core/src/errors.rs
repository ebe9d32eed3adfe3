use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReactionError {
    #[error("{operation}: no reaction found for {key}")]
    NotFound { operation: &'static str, key: String },
    #[error("{operation}: record already exists for {key}")]
    AlreadyExists { operation: &'static str, key: String },
    #[error("could not resolve emoji alias `{alias}`: {detail}")]
    UnknownAlias { alias: String, detail: String },
    #[error("{operation}: store unavailable: {message}")]
    StoreUnavailable { operation: &'static str, message: String },
    #[error("{operation}: upstream call failed: {message}")]
    UpstreamFailure { operation: &'static str, message: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ReactionError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::UnknownAlias { .. } => "unknown_alias",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::UpstreamFailure { .. } => "upstream_failure",
            Self::InvalidInput(_) => "invalid_input",
        }
    }

    /// Conditions the person issuing a command can fix themselves.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::UnknownAlias { .. }
                | Self::InvalidInput(_)
        )
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::UnknownEmoji { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::Missing { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => {
                *id = correlation_id
            }
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unknown emoji: {message}")]
    UnknownEmoji { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("missing: {message}")]
    Missing { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "Sorry, I couldn't understand that request. Try `/skelly help`."
            }
            Self::UnknownEmoji { .. } => "Sorry, I couldn't find that emoji. Is that a valid emoji?",
            Self::Conflict { .. } => "Sorry, that reaction already exists. Did you mean to update?",
            Self::Missing { .. } => {
                "Sorry, that reaction does not exist for this channel. Did you mean to add?"
            }
            Self::ServiceUnavailable { .. } => {
                "Sorry, something went wrong on my end. Please retry shortly."
            }
        }
    }
}

impl From<ReactionError> for InterfaceError {
    fn from(value: ReactionError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            ReactionError::InvalidInput(_) => Self::BadRequest { message, correlation_id },
            ReactionError::UnknownAlias { .. } => Self::UnknownEmoji { message, correlation_id },
            ReactionError::AlreadyExists { .. } => Self::Conflict { message, correlation_id },
            ReactionError::NotFound { .. } => Self::Missing { message, correlation_id },
            ReactionError::StoreUnavailable { .. } | ReactionError::UpstreamFailure { .. } => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{InterfaceError, ReactionError};

    #[test]
    fn already_exists_suggests_update() {
        let interface = ReactionError::AlreadyExists {
            operation: "add_reaction",
            key: "channel=C1 emoji=wave audience=none".to_owned(),
        }
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::Conflict { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "Sorry, that reaction already exists. Did you mean to update?"
        );
    }

    #[test]
    fn not_found_suggests_add() {
        let interface = ReactionError::NotFound {
            operation: "update_reaction",
            key: "channel=C1".to_owned(),
        }
        .into_interface("req-2");

        assert!(interface.user_message().contains("Did you mean to add?"));
    }

    #[test]
    fn store_failures_are_not_user_facing() {
        let error = ReactionError::StoreUnavailable {
            operation: "find_reactions",
            message: "database is locked".to_owned(),
        };
        assert!(!error.is_user_facing());
        assert_eq!(error.class(), "store_unavailable");

        let interface = error.into_interface("req-3");
        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn error_display_carries_operation_context() {
        let error = ReactionError::UpstreamFailure {
            operation: "usergroups.list",
            message: "ratelimited".to_owned(),
        };
        assert_eq!(error.to_string(), "usergroups.list: upstream call failed: ratelimited");
    }
}
