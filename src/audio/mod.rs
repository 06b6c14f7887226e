pub mod backend;
pub mod capture;
pub mod microphone;
pub mod pcm;
pub mod resampler;
pub mod wav;

mod stream_thread;

pub(crate) use stream_thread::StreamThread;

pub use backend::{
    AudioBlock, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource,
    CAPTURE_BLOCK_SIZE, INPUT_SAMPLE_RATE,
};
pub use capture::{BlockFramer, CapturePipeline, WireAudioChunk};
pub use microphone::{list_devices, DeviceInfo, MicrophoneBackend};
pub use resampler::Resampler;
pub use wav::WavFileBackend;
