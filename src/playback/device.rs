//! Audio output device abstraction and the cpal speaker implementation
//!
//! The device exposes a monotonic clock (seconds of audio rendered) and plays
//! buffers at absolute clock times. Completion is reported by `BufferId` on an
//! unbounded channel so the render callback never blocks.

use std::fmt;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::buffer::{PlaybackBuffer, OUTPUT_SAMPLE_RATE};
use crate::audio::StreamThread;
use crate::error::{AgentError, Result};

/// Handle of one scheduled buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer-{}", self.0)
    }
}

/// Configuration for the output device
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Rate of response audio when the payload does not name one
    pub sample_rate: u32,
    /// Channels in response audio payloads
    pub channels: u16,
    /// Output device name (default device when unset)
    pub device_name: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: OUTPUT_SAMPLE_RATE,
            channels: 1,
            device_name: None,
        }
    }
}

/// Audio output device
#[async_trait::async_trait]
pub trait OutputDevice: Send {
    /// Current output clock time in seconds
    fn current_time(&self) -> f64;

    /// Begin playing `buffer` at clock time `at`
    fn start(&mut self, id: BufferId, buffer: PlaybackBuffer, at: f64) -> Result<()>;

    /// Stop a scheduled buffer immediately; no completion is reported for it
    fn stop(&mut self, id: BufferId);

    /// Release the device
    async fn close(&mut self) -> Result<()>;
}

struct Voice {
    id: BufferId,
    buffer: PlaybackBuffer,
    start: f64,
    end: f64,
}

/// Sums scheduled voices into the device's frames and tracks the clock
pub struct VoiceMixer {
    sample_rate: u32,
    frames_rendered: u64,
    voices: Vec<Voice>,
    ended_tx: mpsc::UnboundedSender<BufferId>,
}

impl VoiceMixer {
    pub fn new(sample_rate: u32, ended_tx: mpsc::UnboundedSender<BufferId>) -> Self {
        Self {
            sample_rate,
            frames_rendered: 0,
            voices: Vec::new(),
            ended_tx,
        }
    }

    /// Change the clock rate; only valid before any frame is rendered
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if self.frames_rendered == 0 && sample_rate > 0 {
            self.sample_rate = sample_rate;
        }
    }

    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn add(&mut self, id: BufferId, buffer: PlaybackBuffer, start: f64) {
        let end = start + buffer.duration();
        self.voices.push(Voice {
            id,
            buffer,
            start,
            end,
        });
    }

    pub fn remove(&mut self, id: BufferId) {
        self.voices.retain(|v| v.id != id);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Fill interleaved `out` and report voices that finished
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let now = self.current_time();
            for (c, slot) in frame.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for voice in &self.voices {
                    if now >= voice.start && now < voice.end {
                        acc += voice.buffer.sample_at(c, now - voice.start);
                    }
                }
                *slot = acc.clamp(-1.0, 1.0);
            }
            self.frames_rendered += 1;
        }

        let now = self.current_time();
        let ended_tx = &self.ended_tx;
        self.voices.retain(|voice| {
            if voice.end <= now {
                let _ = ended_tx.send(voice.id);
                false
            } else {
                true
            }
        });
    }
}

/// Speaker output via cpal
pub struct SpeakerOutput {
    mixer: Arc<Mutex<VoiceMixer>>,
    stream: Option<StreamThread>,
}

impl SpeakerOutput {
    pub async fn open(config: &OutputConfig, ended_tx: mpsc::UnboundedSender<BufferId>) -> Result<Self> {
        let mixer = Arc::new(Mutex::new(VoiceMixer::new(config.sample_rate, ended_tx)));
        let render_mixer = Arc::clone(&mixer);
        let device_name = config.device_name.clone();

        let stream = StreamThread::spawn("aura-speaker", move || {
            let host = cpal::default_host();
            let device = select_output_device(&host, device_name.as_deref())?;
            let supported = device
                .default_output_config()
                .map_err(|e| AgentError::from_device("Failed to get output config", e))?;
            let device_rate = supported.sample_rate().0;
            let device_channels = supported.channels() as usize;

            info!(
                "Speaker: {} ({} Hz, {} ch)",
                device.name().unwrap_or_else(|_| "Unknown".to_string()),
                device_rate,
                device_channels
            );

            // The clock runs at the device rate; voices are resampled on read
            render_mixer.lock().set_sample_rate(device_rate);

            let stream = device
                .build_output_stream(
                    &supported.config(),
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        render_mixer.lock().render(data, device_channels)
                    },
                    |err| error!("Speaker stream error: {}", err),
                    None,
                )
                .map_err(|e| AgentError::from_device("Failed to open speaker", e))?;
            stream
                .play()
                .map_err(|e| AgentError::from_device("Failed to start speaker", e))?;
            Ok(stream)
        })
        .await?;

        Ok(Self {
            mixer,
            stream: Some(stream),
        })
    }
}

fn select_output_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    match name {
        Some(wanted) => host
            .output_devices()
            .map_err(|e| AgentError::from_device("Failed to enumerate output devices", e))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| AgentError::unavailable(format!("Output device '{}' not found", wanted))),
        None => host
            .default_output_device()
            .ok_or_else(|| AgentError::unavailable("No default output device found")),
    }
}

#[async_trait::async_trait]
impl OutputDevice for SpeakerOutput {
    fn current_time(&self) -> f64 {
        self.mixer.lock().current_time()
    }

    fn start(&mut self, id: BufferId, buffer: PlaybackBuffer, at: f64) -> Result<()> {
        self.mixer.lock().add(id, buffer, at);
        Ok(())
    }

    fn stop(&mut self, id: BufferId) {
        self.mixer.lock().remove(id);
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            info!("Closing speaker output");
            stream.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixer_clock_advances_per_frame() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut mixer = VoiceMixer::new(100, tx);
        let mut out = vec![0.0f32; 20];

        mixer.render(&mut out, 2);
        assert!((mixer.current_time() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_mixer_plays_voice_at_start_time_and_reports_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut mixer = VoiceMixer::new(10, tx);
        let buffer = PlaybackBuffer::new(vec![vec![0.5; 5]], 10).unwrap();
        mixer.add(BufferId(7), buffer, 0.2);

        let mut out = vec![0.0f32; 10];
        mixer.render(&mut out, 1);

        assert_eq!(&out[..2], &[0.0, 0.0]);
        assert_eq!(&out[2..7], &[0.5; 5]);
        assert_eq!(&out[7..], &[0.0; 3]);
        assert_eq!(rx.try_recv().unwrap(), BufferId(7));
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_removed_voice_is_silent_and_not_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut mixer = VoiceMixer::new(10, tx);
        mixer.add(BufferId(1), PlaybackBuffer::new(vec![vec![0.5; 5]], 10).unwrap(), 0.0);
        mixer.remove(BufferId(1));

        let mut out = vec![0.0f32; 10];
        mixer.render(&mut out, 1);

        assert!(out.iter().all(|&s| s == 0.0));
        assert!(rx.try_recv().is_err());
    }
}
