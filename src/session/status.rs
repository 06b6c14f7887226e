//! Conversational status state machine
//!
//! Every status change goes through [`transition`], a pure table from
//! (status, event) to the next status. Events that have no entry for the
//! current status are ignored.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AgentStatus {
    #[default]
    Idle,
    Connecting,
    Listening,
    Thinking,
    Speaking,
    Error,
}

impl AgentStatus {
    /// A session handle exists (or is being opened)
    pub fn is_active(self) -> bool {
        !matches!(self, AgentStatus::Idle | AgentStatus::Error)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AgentStatus::Idle => "Idle",
            AgentStatus::Connecting => "Connecting",
            AgentStatus::Listening => "Listening",
            AgentStatus::Thinking => "Thinking",
            AgentStatus::Speaking => "Speaking",
            AgentStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// Start request passed its gates
    StartRequested,
    /// Start request failed a gate or the devices refused
    StartRejected,
    /// Remote service confirmed the session
    SessionOpened,
    /// First output transcription fragment of a new agent turn
    AgentTurnStarted,
    /// An audio payload was scheduled
    AudioReceived,
    /// The active playback set drained
    PlaybackDrained,
    TransportFailed,
    /// Remote side closed the session
    SessionClosed,
    StopRequested,
}

/// Next status for `event` in `from`, or None when the event does not apply
pub fn transition(from: AgentStatus, event: StatusEvent) -> Option<AgentStatus> {
    use AgentStatus::*;
    use StatusEvent::*;

    match (from, event) {
        (Idle | Error, StartRequested) => Some(Connecting),
        (_, StartRejected) => Some(Error),
        (Connecting, SessionOpened) => Some(Listening),
        (Listening, AgentTurnStarted) => Some(Thinking),
        (Listening | Thinking, AudioReceived) => Some(Speaking),
        (Speaking, PlaybackDrained) => Some(Listening),
        (_, TransportFailed) => Some(Error),
        (_, SessionClosed) => Some(Idle),
        (_, StopRequested) => Some(Idle),
        _ => None,
    }
}

/// Current status plus the table
#[derive(Debug, Default)]
pub struct StatusMachine {
    status: AgentStatus,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    /// Apply an event; returns the new status if it changed
    pub fn apply(&mut self, event: StatusEvent) -> Option<AgentStatus> {
        let next = transition(self.status, event)?;
        if next == self.status {
            return None;
        }
        debug!("Status {} -> {} on {:?}", self.status, next, event);
        self.status = next;
        Some(next)
    }
}
