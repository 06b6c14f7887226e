use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::Result;

/// Sample rate expected by the remote service for microphone audio
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Samples per capture block
pub const CAPTURE_BLOCK_SIZE: usize = 4096;

/// One fixed-size block of mono microphone audio
///
/// Samples are device floats in [-1, 1]; conversion to PCM16 happens when the
/// block is encoded for the wire.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    /// Mono samples, exactly `CaptureConfig::block_size` long
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Capture order, starting at 0 for each activation
    pub sequence: u64,
}

impl AudioBlock {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Rate the blocks are delivered at (device audio is resampled to it)
    pub sample_rate: u32,
    /// Samples per block
    pub block_size: usize,
    /// Blocks buffered between the device thread and the dispatch loop
    pub queue_depth: usize,
    /// Input device name (default device when unset)
    pub device_name: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: INPUT_SAMPLE_RATE,
            block_size: CAPTURE_BLOCK_SIZE,
            queue_depth: 32,
            device_name: None,
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal input stream on a dedicated thread
/// - WavFile: replays a WAV file at real-time pace
#[async_trait::async_trait]
pub trait CaptureBackend: Send {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that yields blocks in capture order
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>>;

    /// Stop capturing and release the device
    ///
    /// No block is produced after this returns.
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    pub fn create(source: &CaptureSource, config: CaptureConfig) -> Box<dyn CaptureBackend> {
        match source {
            CaptureSource::Microphone => Box::new(super::microphone::MicrophoneBackend::new(config)),
            CaptureSource::WavFile(path) => {
                Box::new(super::wav::WavFileBackend::new(path.clone(), config))
            }
        }
    }
}

/// Where capture audio comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CaptureSource {
    /// Default or named input device
    #[default]
    Microphone,
    /// WAV file replayed at real-time pace
    WavFile(PathBuf),
}
