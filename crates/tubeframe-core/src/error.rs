//! Error types for Tubeframe Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
///
/// Errors are `Clone` because a failed SDK load is cached and handed to every
/// later caller of the loader.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // SDK errors
    #[error("Could not load YouTube SDK: {0}")]
    SdkLoad(String),

    // Construction errors
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    #[error("Player construction failed: {0}")]
    Construction(String),

    // Command errors
    #[error("Player command `{command}` failed: {reason}")]
    Command { command: &'static str, reason: String },

    #[error("Player has been destroyed")]
    PlayerDestroyed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a command error
    pub fn command(command: &'static str, reason: impl Into<String>) -> Self {
        Error::Command {
            command,
            reason: reason.into(),
        }
    }

    /// Returns true if a later attempt could succeed.
    ///
    /// SDK load failures are terminal for the loader that produced them.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidContainer(_) | Error::Construction(_) | Error::Command { .. }
        )
    }

    /// Returns the error code for diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::SdkLoad(_) => "SDK_LOAD",
            Error::InvalidContainer(_) => "INVALID_CONTAINER",
            Error::Construction(_) => "CONSTRUCTION",
            Error::Command { .. } => "COMMAND",
            Error::PlayerDestroyed => "DESTROYED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Internal(_) => "INTERNAL",
        }
    }
}
