// Tests for capture backend abstractions
//
// These tests verify block framing, capture configuration and the WAV replay
// backend without touching a real audio device.

use std::path::PathBuf;
use std::time::Duration;

use aura_voice::audio::{
    AudioBlock, BlockFramer, CaptureBackendFactory, CaptureConfig, CapturePipeline, CaptureSource,
    CAPTURE_BLOCK_SIZE, INPUT_SAMPLE_RATE,
};
use tempfile::TempDir;

fn write_tone(path: &std::path::Path, frames: usize, rate: u32, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames * channels as usize {
        writer.write_sample(((i % 100) as i16) * 100).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn test_capture_config_default() {
    let config = CaptureConfig::default();

    assert_eq!(config.sample_rate, 16000, "Remote service expects 16kHz input");
    assert_eq!(config.block_size, 4096);
    assert!(config.device_name.is_none());
    assert_eq!(CAPTURE_BLOCK_SIZE, 4096);
    assert_eq!(INPUT_SAMPLE_RATE, 16000);
}

#[test]
fn test_audio_block_duration() {
    let block = AudioBlock {
        samples: vec![0.0; 4096],
        sample_rate: 16000,
        sequence: 0,
    };

    assert_eq!(block.duration(), Duration::from_millis(256));
}

#[test]
fn test_framer_from_stereo_48k_device() {
    let mut framer = BlockFramer::new(CAPTURE_BLOCK_SIZE, INPUT_SAMPLE_RATE, 48000, 2).unwrap();

    // One second of stereo audio at 48kHz
    let blocks = framer.push(&vec![0.1f32; 48000 * 2]).unwrap();

    assert_eq!(blocks.len(), 16000 / CAPTURE_BLOCK_SIZE);
    assert!(blocks.iter().all(|b| b.sample_rate == 16000));
    let sequences: Vec<u64> = blocks.iter().map(|b| b.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
}

#[test]
fn test_factory_selects_backend() {
    let mic = CaptureBackendFactory::create(&CaptureSource::Microphone, CaptureConfig::default());
    assert_eq!(mic.name(), "cpal microphone");
    assert!(!mic.is_capturing());

    let wav = CaptureBackendFactory::create(
        &CaptureSource::WavFile(PathBuf::from("speech.wav")),
        CaptureConfig::default(),
    );
    assert_eq!(wav.name(), "WAV file");
}

#[tokio::test]
async fn test_wav_pipeline_encodes_blocks_in_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    write_tone(&path, 4096 * 3, 16000, 1);

    let backend =
        CaptureBackendFactory::create(&CaptureSource::WavFile(path), CaptureConfig::default());
    let (mut pipeline, mut blocks) = CapturePipeline::activate(backend).await.unwrap();

    let mut sequences = Vec::new();
    for _ in 0..3 {
        let block = blocks.recv().await.unwrap();
        let chunk = pipeline.encode(&block);
        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
        sequences.push(block.sequence);
    }

    assert_eq!(sequences, vec![0, 1, 2]);
    assert_eq!(pipeline.blocks_encoded(), 3);
    pipeline.deactivate().await.unwrap();
}

#[tokio::test]
async fn test_wav_pipeline_resamples_stereo_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stereo.wav");
    write_tone(&path, 48000, 48000, 2);

    let backend =
        CaptureBackendFactory::create(&CaptureSource::WavFile(path), CaptureConfig::default());
    let (pipeline, mut blocks) = CapturePipeline::activate(backend).await.unwrap();

    let block = blocks.recv().await.unwrap();
    assert_eq!(block.samples.len(), CAPTURE_BLOCK_SIZE);
    assert_eq!(block.sample_rate, INPUT_SAMPLE_RATE);

    pipeline.deactivate().await.unwrap();
}

#[tokio::test]
async fn test_deactivate_stops_block_delivery() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("long.wav");
    write_tone(&path, 4096 * 20, 16000, 1);

    let backend =
        CaptureBackendFactory::create(&CaptureSource::WavFile(path), CaptureConfig::default());
    let (pipeline, mut blocks) = CapturePipeline::activate(backend).await.unwrap();
    blocks.recv().await.unwrap();

    pipeline.deactivate().await.unwrap();

    // Whatever was queued drains, then the channel closes
    while blocks.recv().await.is_some() {}
}
