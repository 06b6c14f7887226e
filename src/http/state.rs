use crate::session::AgentHandle;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Handle to the single session manager
    pub agent: AgentHandle,
}

impl AppState {
    pub fn new(agent: AgentHandle) -> Self {
        Self { agent }
    }
}
