//! Sample-rate conversion with rubato
//!
//! Device audio arrives in callback-sized pieces of arbitrary length while the
//! sinc resampler consumes fixed 100 ms chunks, so input is buffered until a
//! full chunk is available.

use rubato::{
    Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{AgentError, Result};

/// Streaming mono resampler
pub struct Resampler {
    source_rate: u32,
    target_rate: u32,
    inner: Option<SincFixedIn<f32>>,
    chunk_size: usize,
    pending: Vec<f32>,
}

impl Resampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(AgentError::unavailable("Sample rate cannot be zero"));
        }

        // 100 ms of source audio per resampler call
        let chunk_size = (source_rate as usize / 10).max(1);
        let inner = if source_rate != target_rate {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let resampler = SincFixedIn::<f32>::new(
                target_rate as f64 / source_rate as f64,
                2.0,
                params,
                chunk_size,
                1,
            )
            .map_err(|e| AgentError::unavailable(format!("Failed to create resampler: {}", e)))?;
            Some(resampler)
        } else {
            None
        };

        Ok(Self {
            source_rate,
            target_rate,
            inner,
            chunk_size,
            pending: Vec::with_capacity(chunk_size * 2),
        })
    }

    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Feed mono samples; returns whatever complete chunks produced
    ///
    /// Input shorter than a chunk is held until the next call.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(input.to_vec());
        };

        self.pending.extend_from_slice(input);

        let mut output = Vec::new();
        while self.pending.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.pending.drain(..self.chunk_size).collect();
            let resampled = inner
                .process(&[chunk], None)
                .map_err(|e| AgentError::invalid_audio(format!("Resampling failed: {}", e)))?;
            if let Some(channel) = resampled.into_iter().next() {
                output.extend(channel);
            }
        }
        Ok(output)
    }

    /// Samples waiting for a full chunk
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}
