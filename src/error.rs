//! Application error types for crm-sync
//!
//! This module defines the error taxonomy used throughout the sync engine.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::models::EntityType;

/// Transport-level errors returned by the remote CRM API
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Network timeout
    #[error("Network timeout")]
    NetworkTimeout,

    /// Connection refused
    #[error("Connection refused")]
    ConnectionRefused,

    /// Rate limited by upstream
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Server error
    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    /// Invalid data received
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Resource not found
    #[error("Resource not found")]
    NotFound,

    /// Unauthorized
    #[error("Unauthorized")]
    Unauthorized,

    /// Generic network error
    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::NetworkTimeout
        } else if err.is_connect() {
            SyncError::ConnectionRefused
        } else if err.is_decode() {
            SyncError::InvalidData(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

/// Access token refresh errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// The OAuth token exchange call failed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The account carries no refresh token
    #[error("Account {0} has no refresh token")]
    MissingRefreshToken(String),

    /// OAuth client id or secret is not configured
    #[error("OAuth client credentials are not configured")]
    MissingClientCredentials,
}

/// Errors that abort one entity type's pagination loop
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// Every attempt for one page failed
    #[error("Failed to fetch {entity} after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Entity type being fetched
        entity: EntityType,
        /// Number of attempts made
        attempts: u32,
        /// Error returned by the final attempt
        last_error: SyncError,
    },
}

/// Association lookup errors
///
/// These never escape the resolver; they downgrade to empty results.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssociationError {
    /// The association batch-read call failed
    #[error("Association lookup {from} -> {to} failed: {source}")]
    Lookup {
        /// Source entity type
        from: EntityType,
        /// Target entity type
        to: EntityType,
        /// Underlying transport error
        source: SyncError,
    },

    /// The object batch-read call failed
    #[error("Object lookup for {entity} failed: {source}")]
    Objects {
        /// Entity type being read
        entity: EntityType,
        /// Underlying transport error
        source: SyncError,
    },
}

/// Event sink write errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Storage backend rejected the write
    #[error("Sink write failed: {0}")]
    Write(String),

    /// Event could not be encoded
    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error, surfaced through the async connection
    #[error("Database error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Stored document could not be encoded or decoded
    #[error("Document error: {0}")]
    Document(#[from] serde_json::Error),
}

impl From<DbError> for SinkError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Document(e) => SinkError::Serialization(e),
            other => SinkError::Write(other.to_string()),
        }
    }
}

/// Application-level error type
///
/// Aggregates the domain-specific error types for the bootstrap path.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}
