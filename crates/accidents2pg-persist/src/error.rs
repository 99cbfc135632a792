use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Error connecting to database: {0}")]
    Connection(String),

    #[error("Error saving to database: {0}")]
    Query(String),

    #[error("Invalid table identifier {0:?}")]
    InvalidIdentifier(String),
}

impl From<sqlx::Error> for PersistError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => PersistError::Connection(err.to_string()),
            other => PersistError::Query(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
