use std::fmt;
use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::live::DEFAULT_MODEL;
use crate::playback::OutputConfig;

/// Configuration for a voice session manager
#[derive(Clone)]
pub struct SessionConfig {
    /// Remote model identifier
    pub model: String,

    /// Credential for the remote service; start is refused without it
    pub api_key: Option<String>,

    /// Microphone block format
    pub capture: CaptureConfig,

    /// Response audio format
    pub output: OutputConfig,

    /// How long the greeting cue stays raised
    /// Default: 2.5 seconds
    pub wave_cue: Duration,

    /// Pending presentation commands before senders wait
    pub command_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            capture: CaptureConfig::default(),
            output: OutputConfig::default(),
            wave_cue: Duration::from_millis(2500),
            command_queue: 16,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("capture", &self.capture)
            .field("output", &self.output)
            .field("wave_cue", &self.wave_cue)
            .field("command_queue", &self.command_queue)
            .finish()
    }
}
