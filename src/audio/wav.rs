use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioBlock, CaptureBackend, CaptureConfig};
use super::capture::BlockFramer;
use crate::error::{AgentError, Result};

/// Replays a WAV file as if it were a microphone
///
/// Blocks are released one block-duration apart so the remote side sees the
/// same cadence a live device would produce.
pub struct WavFileBackend {
    path: PathBuf,
    config: CaptureConfig,
    task: Option<JoinHandle<()>>,
}

impl WavFileBackend {
    pub fn new(path: PathBuf, config: CaptureConfig) -> Self {
        Self {
            path,
            config,
            task: None,
        }
    }
}

/// Read a WAV file as float samples, returning (samples, rate, channels)
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32, u16)> {
    let reader = WavReader::open(path).map_err(|e| {
        AgentError::unavailable(format!("Failed to open WAV file {}: {}", path.display(), e))
    })?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| AgentError::invalid_audio(format!("Failed to read WAV samples: {}", e)))?;

    info!(
        "WAV source loaded: {} ({} Hz, {} ch, {:.1}s)",
        path.display(),
        spec.sample_rate,
        spec.channels,
        samples.len() as f64 / (spec.sample_rate as f64 * spec.channels.max(1) as f64)
    );

    Ok((samples, spec.sample_rate, spec.channels))
}

#[async_trait::async_trait]
impl CaptureBackend for WavFileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>> {
        if self.task.is_some() {
            return Err(AgentError::unavailable("WAV source already capturing"));
        }

        let (samples, rate, channels) = read_wav(&self.path)?;
        let mut framer =
            BlockFramer::new(self.config.block_size, self.config.sample_rate, rate, channels)?;
        let blocks = framer.push(&samples)?;

        let block_duration = std::time::Duration::from_secs_f64(
            self.config.block_size as f64 / self.config.sample_rate as f64,
        );
        let (tx, rx) = mpsc::channel(self.config.queue_depth);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(block_duration);
            for block in blocks {
                ticker.tick().await;
                if tx.send(block).await.is_err() {
                    break;
                }
            }
            info!("WAV source exhausted");
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            info!("WAV source stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    fn name(&self) -> &str {
        "WAV file"
    }
}
