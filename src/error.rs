use thiserror::Error;

/// Failure writing to a live connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("write timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Failure talking to the persistence collaborator.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("query build error: {0}")]
    Query(#[from] sea_query::error::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
