use crate::audio::pcm::{bytes_to_pcm16, deinterleave, parse_pcm_rate, pcm16_to_float, text_to_bytes};
use crate::audio::WireAudioChunk;
use crate::error::{AgentError, Result};

/// Sample rate of response audio when the payload does not name one
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Decoded, deinterleaved float audio ready to be scheduled
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PlaybackBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() {
            return Err(AgentError::invalid_audio("Playback buffer needs at least one channel"));
        }
        if sample_rate == 0 {
            return Err(AgentError::invalid_audio("Playback buffer sample rate must be non-zero"));
        }
        let frames = channels[0].len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(AgentError::invalid_audio("Playback buffer channels differ in length"));
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Mono buffer of silence lasting `seconds`
    pub fn silence(seconds: f64, sample_rate: u32) -> Result<Self> {
        let frames = (seconds * sample_rate as f64).round() as usize;
        Self::new(vec![vec![0.0; frames]], sample_rate)
    }

    /// Decode interleaved little-endian PCM16 bytes
    pub fn from_pcm16_bytes(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<Self> {
        let pcm = bytes_to_pcm16(bytes)?;
        let samples = pcm16_to_float(&pcm);
        Self::new(deinterleave(&samples, channels.max(1) as usize), sample_rate)
    }

    /// Decode a base64 chunk received from the remote service
    ///
    /// The rate comes from the chunk's MIME descriptor when present.
    pub fn from_wire(chunk: &WireAudioChunk, default_rate: u32, channels: u16) -> Result<Self> {
        let bytes = text_to_bytes(&chunk.data)?;
        let rate = parse_pcm_rate(&chunk.mime_type).unwrap_or(default_rate);
        Self::from_pcm16_bytes(&bytes, rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Linearly interpolated sample of `channel` at `offset` seconds into the buffer
    pub fn sample_at(&self, channel: usize, offset: f64) -> f32 {
        let data = &self.channels[channel.min(self.channels.len() - 1)];
        if offset < 0.0 || data.is_empty() {
            return 0.0;
        }

        let position = offset * self.sample_rate as f64;
        let index = position.floor() as usize;
        if index >= data.len() {
            return 0.0;
        }

        let frac = (position - index as f64) as f32;
        let a = data[index];
        let b = data.get(index + 1).copied().unwrap_or(a);
        a + (b - a) * frac
    }
}
