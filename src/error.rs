//! Error handling module
//!
//! Provides the unified error type for registration, planning and execution.

use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    /// A declared document failed structural validation. Raised at
    /// registration time, before any database interaction.
    #[error("Validation error at `{path}`: {message}")]
    Validation { path: String, message: String },

    /// A computed change is unsafe to apply automatically.
    #[error("Synchronization error: {0}")]
    Synchronization(String),

    /// A schema document could not be located or read.
    #[error("Import error: {0}")]
    Import(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A query returned rows in a shape the engine did not expect.
    #[error("Query error: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper function to create a validation error
pub fn validation_error(path: impl Into<String>, message: impl Into<String>) -> Error {
    Error::Validation {
        path: path.into(),
        message: message.into(),
    }
}

/// Helper function to create a synchronization error
pub fn synchronization_error(message: impl Into<String>) -> Error {
    Error::Synchronization(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_path() {
        let err = validation_error("users.columns.id.type", "type is required");
        assert_eq!(
            err.to_string(),
            "Validation error at `users.columns.id.type`: type is required"
        );
    }
}
