//! Capture pipeline: device samples → fixed blocks → wire chunks
//!
//! The framer runs inside the device callback and must stay allocation-light
//! and non-blocking. Encoding to the wire format happens on the dispatch loop
//! and hands the chunk to the transport without waiting on it.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use super::backend::{AudioBlock, CaptureBackend};
use super::pcm::{bytes_to_text, float_to_pcm16, pcm16_to_bytes, pcm_mime_type};
use super::resampler::Resampler;
use crate::error::{AgentError, Result};

/// Text-safe audio payload with its MIME descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAudioChunk {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

impl WireAudioChunk {
    /// Encode a capture block as base64 PCM16
    pub fn from_block(block: &AudioBlock) -> Self {
        let pcm = float_to_pcm16(&block.samples);
        Self {
            mime_type: pcm_mime_type(block.sample_rate),
            data: bytes_to_text(&pcm16_to_bytes(&pcm)),
        }
    }
}

/// Cuts a continuous device stream into fixed-size mono blocks
pub struct BlockFramer {
    block_size: usize,
    sample_rate: u32,
    source_channels: usize,
    resampler: Resampler,
    pending: Vec<f32>,
    next_sequence: u64,
}

impl BlockFramer {
    /// Fails on a zero block size or a zero sample rate
    pub fn new(
        block_size: usize,
        sample_rate: u32,
        source_rate: u32,
        source_channels: u16,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(AgentError::unavailable("Capture block size cannot be zero"));
        }

        Ok(Self {
            block_size,
            sample_rate,
            source_channels: source_channels.max(1) as usize,
            resampler: Resampler::new(source_rate, sample_rate)?,
            pending: Vec::with_capacity(block_size * 2),
            next_sequence: 0,
        })
    }

    /// Feed interleaved device samples; returns every block completed by them
    pub fn push(&mut self, interleaved: &[f32]) -> Result<Vec<AudioBlock>> {
        // First channel only: averaging halves a mic that only feeds one side
        let mono: Vec<f32> = if self.source_channels > 1 {
            interleaved
                .chunks(self.source_channels)
                .map(|frame| frame[0])
                .collect()
        } else {
            interleaved.to_vec()
        };

        let audio = self.resampler.process(&mono)?;
        self.pending.extend_from_slice(&audio);

        let mut blocks = Vec::new();
        while self.pending.len() >= self.block_size {
            let samples: Vec<f32> = self.pending.drain(..self.block_size).collect();
            blocks.push(AudioBlock {
                samples,
                sample_rate: self.sample_rate,
                sequence: self.next_sequence,
            });
            self.next_sequence += 1;
        }
        Ok(blocks)
    }

    /// Samples waiting for the next block
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Send a block from a device callback without ever blocking or logging
///
/// A full queue drops the block and bumps `dropped`; a closed queue means
/// teardown is underway.
pub(crate) fn offer_block(tx: &mpsc::Sender<AudioBlock>, block: AudioBlock, dropped: &AtomicU64) {
    if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(block) {
        dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// An activated capture backend plus wire-encoding state
pub struct CapturePipeline {
    backend: Box<dyn CaptureBackend>,
    blocks_encoded: u64,
}

impl CapturePipeline {
    /// Start the backend; blocks arrive on the returned receiver
    pub async fn activate(
        mut backend: Box<dyn CaptureBackend>,
    ) -> Result<(Self, mpsc::Receiver<AudioBlock>)> {
        info!("Activating capture pipeline ({})", backend.name());
        let blocks = backend.start().await?;

        Ok((
            Self {
                backend,
                blocks_encoded: 0,
            },
            blocks,
        ))
    }

    /// Encode one block for transmission
    pub fn encode(&mut self, block: &AudioBlock) -> WireAudioChunk {
        self.blocks_encoded += 1;
        WireAudioChunk::from_block(block)
    }

    pub fn blocks_encoded(&self) -> u64 {
        self.blocks_encoded
    }

    /// Stop the backend and release the device
    pub async fn deactivate(mut self) -> Result<()> {
        info!(
            "Deactivating capture pipeline ({}, {} blocks sent)",
            self.backend.name(),
            self.blocks_encoded
        );
        self.backend.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm::{bytes_to_pcm16, text_to_bytes};

    #[test]
    fn test_framer_emits_fixed_blocks_in_order() {
        let mut framer = BlockFramer::new(4096, 16000, 16000, 1).unwrap();
        let blocks = framer.push(&vec![0.25f32; 10000]).unwrap();

        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.samples.len() == 4096));
        assert_eq!(blocks[0].sequence, 0);
        assert_eq!(blocks[1].sequence, 1);
        assert_eq!(framer.pending(), 10000 - 2 * 4096);

        let more = framer.push(&vec![0.25f32; 4096]).unwrap();
        assert_eq!(more.len(), 1);
        assert_eq!(more[0].sequence, 2);
    }

    #[test]
    fn test_framer_takes_first_channel() {
        let mut framer = BlockFramer::new(2, 16000, 16000, 2).unwrap();
        let blocks = framer.push(&[0.5, -0.5, 0.25, -0.25]).unwrap();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].samples, vec![0.5, 0.25]);
    }

    #[test]
    fn test_framer_resamples_to_target_rate() {
        let mut framer = BlockFramer::new(1024, 16000, 48000, 1).unwrap();
        // 200 ms at 48 kHz comes out near 3200 samples at 16 kHz
        let blocks = framer.push(&vec![0.0f32; 9600]).unwrap();

        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.sample_rate == 16000));
        assert!(blocks.iter().all(|b| b.samples.len() == 1024));
    }

    #[test]
    fn test_framer_rejects_zero_block_size() {
        assert!(BlockFramer::new(0, 16000, 16000, 1).is_err());
    }

    #[test]
    fn test_framer_rejects_zero_sample_rates() {
        assert!(BlockFramer::new(4096, 0, 48000, 1).is_err());
        assert!(BlockFramer::new(4096, 16000, 0, 1).is_err());
    }

    #[test]
    fn test_offer_block_counts_drops_on_full_queue() {
        let (tx, mut rx) = mpsc::channel(1);
        let dropped = AtomicU64::new(0);
        let block = AudioBlock {
            samples: vec![0.0; 4],
            sample_rate: 16000,
            sequence: 0,
        };

        offer_block(&tx, block.clone(), &dropped);
        offer_block(&tx, block.clone(), &dropped);
        offer_block(&tx, block, &dropped);

        assert_eq!(dropped.load(Ordering::Relaxed), 2);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_wire_chunk_from_block() {
        let block = AudioBlock {
            samples: vec![0.0, 1.0, -1.0, 2.0],
            sample_rate: 16000,
            sequence: 0,
        };
        let chunk = WireAudioChunk::from_block(&block);

        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
        let pcm = bytes_to_pcm16(&text_to_bytes(&chunk.data).unwrap()).unwrap();
        assert_eq!(pcm, vec![0, 32767, -32767, 32767]);
    }
}
