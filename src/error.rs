//! Error types for the voice session core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Message shown for any transport failure, whatever the underlying cause
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Session connection failed. Please check your internet \
connection and ensure your API key is correctly configured and has billing enabled.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("{0}")]
    ConfigurationMissing(String),

    #[error("Microphone permission denied: {0}")]
    DevicePermissionDenied(String),

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to close session: {0}")]
    Close(String),

    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),

    #[error("A session is already active")]
    SessionActive,
}

impl AgentError {
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::DeviceUnavailable(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    pub fn invalid_audio<S: Into<String>>(msg: S) -> Self {
        Self::InvalidAudio(msg.into())
    }

    /// Classify a platform audio error as a permission refusal or a missing device
    pub fn from_device(context: &str, err: impl std::fmt::Display) -> Self {
        let description = err.to_string();
        let lowered = description.to_lowercase();
        if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("not authorized")
        {
            Self::DevicePermissionDenied(format!("{}: {}", context, description))
        } else {
            Self::DeviceUnavailable(format!("{}: {}", context, description))
        }
    }

    /// Text surfaced to the presentation layer
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => TRANSPORT_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}
