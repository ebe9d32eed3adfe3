use thiserror::Error;

use skelly_core::reactor::StoreError;

pub mod reaction;
pub mod sent_response;

pub use reaction::SqlReactionStore;
pub use sent_response::SqlResponseLedger;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(sqlx::Error::Database(error))
                if error.is_unique_violation() =>
            {
                StoreError::AlreadyExists
            }
            RepositoryError::Database(sqlx::Error::RowNotFound) => StoreError::NotFound,
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

fn store_error(error: sqlx::Error) -> StoreError {
    RepositoryError::Database(error).into()
}
