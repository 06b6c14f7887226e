//! Gapless scheduling of response audio
//!
//! Each buffer starts at `max(now, next_start_time)` so consecutive chunks play
//! back to back regardless of arrival jitter. The active set tracks what is
//! still audible; the dispatch loop treats an empty set as "done speaking".

use std::collections::HashSet;

use tracing::{debug, info};

use super::buffer::PlaybackBuffer;
use super::device::{BufferId, OutputDevice};
use crate::audio::WireAudioChunk;
use crate::error::Result;

/// Placement of one buffer on the output clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledBuffer {
    pub id: BufferId,
    pub start: f64,
    pub end: f64,
}

pub struct PlaybackScheduler {
    device: Box<dyn OutputDevice>,
    active: HashSet<BufferId>,
    next_start_time: f64,
    next_id: u64,
}

impl PlaybackScheduler {
    pub fn new(device: Box<dyn OutputDevice>) -> Self {
        Self {
            device,
            active: HashSet::new(),
            next_start_time: 0.0,
            next_id: 0,
        }
    }

    /// Queue a buffer directly after everything already scheduled
    pub fn schedule(&mut self, buffer: PlaybackBuffer) -> Result<ScheduledBuffer> {
        let now = self.device.current_time();
        let start = self.next_start_time.max(now);
        let end = start + buffer.duration();

        let id = BufferId(self.next_id);
        self.next_id += 1;

        self.device.start(id, buffer, start)?;
        self.active.insert(id);
        self.next_start_time = end;

        debug!("Scheduled {} at {:.3}s..{:.3}s", id, start, end);
        Ok(ScheduledBuffer { id, start, end })
    }

    /// Decode and queue a response chunk
    pub fn schedule_chunk(
        &mut self,
        chunk: &WireAudioChunk,
        default_rate: u32,
        channels: u16,
    ) -> Result<ScheduledBuffer> {
        let buffer = PlaybackBuffer::from_wire(chunk, default_rate, channels)?;
        self.schedule(buffer)
    }

    /// Record that a buffer finished playing
    ///
    /// Returns true when this completion emptied the active set. Ids that are
    /// not active (already cancelled, or never scheduled) change nothing.
    pub fn on_ended(&mut self, id: BufferId) -> bool {
        if !self.active.remove(&id) {
            debug!("Ignoring completion of inactive {}", id);
            return false;
        }
        self.active.is_empty()
    }

    /// Stop everything scheduled and rewind the timeline
    pub fn cancel(&mut self) {
        if !self.active.is_empty() {
            info!("Cancelling {} scheduled buffers", self.active.len());
        }
        for id in self.active.drain() {
            self.device.stop(id);
        }
        self.next_start_time = 0.0;
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    /// Cancel pending audio and release the output device
    pub async fn close(mut self) -> Result<()> {
        self.cancel();
        self.device.close().await
    }
}
