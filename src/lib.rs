pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod instruction;
pub mod live;
pub mod playback;
pub mod secret;
pub mod session;

pub use audio::{
    AudioBlock, CaptureBackend, CaptureBackendFactory, CaptureConfig, CapturePipeline, CaptureSource,
    WireAudioChunk,
};
pub use config::Config;
pub use error::{AgentError, Result, TRANSPORT_FAILURE_MESSAGE};
pub use http::{create_router, AppState};
pub use live::{LiveConnector, LiveSession, SessionEvent, SetupMessage, WebSocketConnector};
pub use playback::{BufferId, OutputConfig, OutputDevice, PlaybackBuffer, PlaybackScheduler};
pub use secret::SecretStore;
pub use session::{
    AgentHandle, AgentSnapshot, AgentStatus, AudioDevices, SessionConfig, SessionManager, Speaker,
    SystemAudio, TranscriptTurn,
};
