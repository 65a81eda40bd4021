//! Error taxonomy for the synchronization core
//!
//! None of these are fatal to the server. Validation and unregistered
//! actions drop the offending event, transport failures only affect the
//! recipient that failed.

use shared::{ProtocolError, MIN_NAME_LENGTH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("connection {0} must register a name before acting")]
    UnregisteredAction(u32),

    #[error("failed to deliver to connection {connection_id}: {reason}")]
    Transport { connection_id: u32, reason: String },

    #[error("server full ({0} connections)")]
    Capacity(usize),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl SyncError {
    pub fn name_too_short(name: &str) -> Self {
        SyncError::Validation(format!(
            "name '{}' is shorter than {} characters",
            name, MIN_NAME_LENGTH
        ))
    }

    pub fn non_finite_position() -> Self {
        SyncError::Validation("position coordinates must be finite".to_string())
    }

    /// Message shown to a client when a rejection notice is sent back
    pub fn reason(&self) -> String {
        match self {
            SyncError::Capacity(_) => "Server full".to_string(),
            other => other.to_string(),
        }
    }
}
