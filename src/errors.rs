use thiserror::Error;

/// ***************
/// Store Errors
/// ***************
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Blocking db task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A stored row could not be mapped back into the domain model.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// ***************
/// Relationship Errors
/// ***************
///
/// Every repository operation reports one of these. Business-rule failures are
/// raised before anything is written; `Storage` is passed through untouched and
/// retrying it is up to the caller.
#[derive(Error, Debug)]
pub enum RelationshipError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<diesel::result::Error> for RelationshipError {
    fn from(error: diesel::result::Error) -> Self {
        RelationshipError::Storage(StoreError::Database(error))
    }
}

/// ***************
/// Startup Errors
/// ***************
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Failed to create pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Migrations failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
