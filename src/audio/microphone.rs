//! Microphone capture with cpal
//!
//! The input stream runs at the device's native format; the block framer
//! downmixes to mono, resamples to 16 kHz and emits 4096-sample blocks from
//! inside the callback using a non-blocking send.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::backend::{AudioBlock, CaptureBackend, CaptureConfig};
use super::capture::{offer_block, BlockFramer};
use super::stream_thread::StreamThread;
use crate::error::{AgentError, Result};

/// Audio device information
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub is_input: bool,
    pub default_sample_rate: u32,
    pub channels: u16,
}

/// List input and output devices on the default host
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();

    let inputs = host
        .input_devices()
        .map_err(|e| AgentError::from_device("Failed to enumerate input devices", e))?;
    for device in inputs {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let (default_sample_rate, channels) = device
            .default_input_config()
            .map(|c| (c.sample_rate().0, c.channels()))
            .unwrap_or((0, 0));
        devices.push(DeviceInfo {
            is_default: default_input.as_deref() == Some(name.as_str()),
            name,
            is_input: true,
            default_sample_rate,
            channels,
        });
    }

    let outputs = host
        .output_devices()
        .map_err(|e| AgentError::from_device("Failed to enumerate output devices", e))?;
    for device in outputs {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let (default_sample_rate, channels) = device
            .default_output_config()
            .map(|c| (c.sample_rate().0, c.channels()))
            .unwrap_or((0, 0));
        devices.push(DeviceInfo {
            is_default: default_output.as_deref() == Some(name.as_str()),
            name,
            is_input: false,
            default_sample_rate,
            channels,
        });
    }

    Ok(devices)
}

fn select_input_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    match name {
        Some(wanted) => host
            .input_devices()
            .map_err(|e| AgentError::from_device("Failed to enumerate input devices", e))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| AgentError::unavailable(format!("Input device '{}' not found", wanted))),
        None => host
            .default_input_device()
            .ok_or_else(|| AgentError::unavailable("No default input device found")),
    }
}

/// Microphone capture backend
pub struct MicrophoneBackend {
    config: CaptureConfig,
    stream: Option<StreamThread>,
    /// Blocks the callback could not queue; reported when capture stops
    dropped: Arc<AtomicU64>,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stream: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn dropped_blocks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>> {
        if self.stream.is_some() {
            return Err(AgentError::unavailable("Microphone already capturing"));
        }

        let (tx, rx) = mpsc::channel(self.config.queue_depth);
        let config = self.config.clone();
        self.dropped.store(0, Ordering::Relaxed);
        let dropped = Arc::clone(&self.dropped);

        let stream = StreamThread::spawn("aura-microphone", move || {
            let host = cpal::default_host();
            let device = select_input_device(&host, config.device_name.as_deref())?;
            let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

            let supported = device
                .default_input_config()
                .map_err(|e| AgentError::from_device("Failed to get input config", e))?;
            let source_rate = supported.sample_rate().0;
            let source_channels = supported.channels();

            info!(
                "Microphone: {} ({} Hz, {} ch → {} Hz mono, {} sample blocks)",
                device_name, source_rate, source_channels, config.sample_rate, config.block_size
            );

            let mut framer = BlockFramer::new(
                config.block_size,
                config.sample_rate,
                source_rate,
                source_channels,
            )?;

            let stream = device
                .build_input_stream(
                    &supported.config(),
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let Ok(blocks) = framer.push(data) else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                            return;
                        };
                        for block in blocks {
                            offer_block(&tx, block, &dropped);
                        }
                    },
                    |err| error!("Microphone stream error: {}", err),
                    None,
                )
                .map_err(|e| AgentError::from_device("Failed to open microphone", e))?;

            stream
                .play()
                .map_err(|e| AgentError::from_device("Failed to start microphone", e))?;

            Ok(stream)
        })
        .await?;

        self.stream = Some(stream);
        info!("Microphone capture started");

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            info!("Stopping microphone capture");
            stream.shutdown().await?;

            let dropped = self.dropped_blocks();
            if dropped > 0 {
                warn!("Microphone dropped {} blocks on a full queue", dropped);
            }
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}
