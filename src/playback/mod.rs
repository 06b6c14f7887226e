pub mod buffer;
pub mod device;
pub mod scheduler;

pub use buffer::{PlaybackBuffer, OUTPUT_SAMPLE_RATE};
pub use device::{BufferId, OutputConfig, OutputDevice, SpeakerOutput, VoiceMixer};
pub use scheduler::{PlaybackScheduler, ScheduledBuffer};
