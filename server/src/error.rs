//! Error types for host actions and configuration loading.

use shared::PlayerId;
use std::path::PathBuf;
use thiserror::Error;

/// A host action (kick, transfer, impulse, ...) could not be carried out.
///
/// Action failures are never fatal to a tick: callers log them and move on
/// to the next player.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The player disconnected or became invalid.
    #[error("player {0} is no longer present")]
    PlayerGone(PlayerId),

    /// The player has no pawn to act on.
    #[error("player {0} has no pawn")]
    NoPawn(PlayerId),

    /// The host refused the action.
    #[error("{action} rejected for player {player}: {reason}")]
    Rejected {
        action: &'static str,
        player: PlayerId,
        reason: String,
    },
}

/// Errors raised while reading or validating the monitor configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
