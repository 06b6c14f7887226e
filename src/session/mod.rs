//! Voice session management
//!
//! This module provides the `SessionManager` that owns:
//! - The remote session handle and its event stream
//! - Microphone capture and forwarding
//! - Response audio scheduling
//! - The conversational status machine and transcript

mod config;
mod handle;
mod manager;
pub mod status;
pub mod transcript;

pub use config::SessionConfig;
pub use handle::{AgentHandle, AgentSnapshot, Command};
pub use manager::{
    AgentEvent, AudioDevices, SessionManager, SystemAudio, MISSING_API_KEY_MESSAGE,
    MISSING_SECRET_MESSAGE,
};
pub use status::{transition, AgentStatus, StatusEvent, StatusMachine};
pub use transcript::{OutputUpdate, Speaker, TranscriptProjection, TranscriptTurn, WaveTrigger};
