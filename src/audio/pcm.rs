//! PCM codec: float ↔ 16-bit little-endian PCM, bytes ↔ base64 text
//!
//! Outbound samples are clamped to [-1, 1] and scaled by 32767 (saturating,
//! never wrapping). Inbound samples are divided by 32768.

use base64::Engine;

use crate::error::{AgentError, Result};

/// Scale applied when quantizing float samples
const PCM16_ENCODE_SCALE: f32 = 32767.0;

/// Divisor applied when expanding PCM16 samples to float
const PCM16_DECODE_SCALE: f32 = 32768.0;

/// Convert float samples to PCM16 with saturation
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * PCM16_ENCODE_SCALE) as i16)
        .collect()
}

/// Convert PCM16 samples back to float in [-1, 1)
pub fn pcm16_to_float(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| s as f32 / PCM16_DECODE_SCALE)
        .collect()
}

/// Serialize PCM16 samples as little-endian bytes
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Parse little-endian bytes into PCM16 samples
pub fn bytes_to_pcm16(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(AgentError::invalid_audio(format!(
            "PCM16 payload has odd length ({} bytes)",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect())
}

/// Encode bytes as base64 text for transport
pub fn bytes_to_text(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 transport text back to bytes
pub fn text_to_bytes(text: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| AgentError::invalid_audio(format!("Invalid base64 audio data: {}", e)))
}

/// Split interleaved samples into one vector per channel
///
/// Sample `i` of channel `c` lives at flat index `i * channels + c`. A trailing
/// partial frame is ignored.
pub fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    if channels == 0 {
        return Vec::new();
    }

    let frame_count = samples.len() / channels;
    (0..channels)
        .map(|channel| {
            (0..frame_count)
                .map(|i| samples[i * channels + channel])
                .collect()
        })
        .collect()
}

/// MIME descriptor for mono PCM16 at `sample_rate`
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}

/// Extract the `rate=N` parameter from a PCM MIME descriptor
pub fn parse_pcm_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
}
