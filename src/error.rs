//! Domain error types for the database tool.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use crate::config::ConfigError;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database could not be reached, even after the reconnect loop
    #[error("Database unreachable: {0}")]
    Connectivity(String),

    /// Invalid input data (malformed file, missing field, bad argument)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A dungeon with this UUID is already stored
    #[error("Dungeon {0} already exists in the database")]
    AlreadyExists(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// A migration's statements failed; the ledger was not touched for it
    #[error("Migration {id} failed: {cause}")]
    Execution { id: String, cause: String },

    /// The connection dropped while applying a migration and has since come back.
    /// Nothing was recorded for `id`, so the plan can be restarted.
    #[error("Connection lost while applying {id}; connection restored")]
    Interrupted { id: String },

    /// A SQL dump could not be read or decompressed
    #[error("Failed to parse {file}: {cause}")]
    Parse { file: String, cause: String },

    /// Any other database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Local file system operation failed
    #[error("File system error: {0}")]
    FileSystem(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Whether this error belongs to the validation class (bad input rather than a failing system).
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::AlreadyExists(_))
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        if crate::db::connectivity::is_connectivity_error(&err) {
            AppError::Connectivity(err.to_string())
        } else {
            AppError::Database(err.to_string())
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}
