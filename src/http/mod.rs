//! HTTP API for external control (web or desktop front-ends)
//!
//! This module provides a REST API over the session manager:
//! - POST /session/start - Open a voice session
//! - POST /session/stop - Stop it and release the devices
//! - GET /session/status - Status, error, cue and access flags
//! - GET /session/transcript - Turns accumulated so far
//! - PUT /config/secret - Save the shared secret
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
