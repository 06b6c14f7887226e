pub mod client;
pub mod messages;

pub use client::{
    LiveConnection, LiveConnector, LiveSession, SessionEvent, WebSocketConnector, WebSocketSession,
    DEFAULT_ENDPOINT,
};
pub use messages::{ServerMessage, SetupMessage, Source, DEFAULT_MODEL};
