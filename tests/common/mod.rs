// Test doubles for the session manager
//
// Every double records what was called on it in a shared `Log` so tests can
// assert that teardown released each resource.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use aura_voice::audio::{AudioBlock, CaptureBackend, CaptureConfig, WireAudioChunk};
use aura_voice::live::{LiveConnection, LiveConnector, LiveSession, SessionEvent, SetupMessage};
use aura_voice::playback::{BufferId, OutputConfig, OutputDevice, PlaybackBuffer};
use aura_voice::session::AudioDevices;
use aura_voice::{AgentError, Result};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct Log {
    pub connects: usize,
    pub api_keys: Vec<String>,
    pub setups: Vec<serde_json::Value>,
    pub sent: Vec<WireAudioChunk>,
    pub session_closes: usize,
    pub capture_starts: usize,
    pub capture_stops: usize,
    pub output_opens: usize,
    pub output_closes: usize,
    pub started: Vec<(BufferId, f64)>,
    pub stopped: Vec<BufferId>,
    pub clock: f64,
}

pub type SharedLog = Arc<Mutex<Log>>;

pub fn new_log() -> SharedLog {
    Arc::new(Mutex::new(Log::default()))
}

// ----------------------------------------------------------------------------
// Remote session
// ----------------------------------------------------------------------------

pub struct MockConnector {
    pub log: SharedLog,
    /// Test side of the most recent connection's event stream
    pub events: Arc<Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>>,
    pub fail_with: Option<AgentError>,
    /// Returned by every session's close, after it is counted
    pub close_error: Option<AgentError>,
}

impl MockConnector {
    pub fn new(log: SharedLog) -> Self {
        Self {
            log,
            events: Arc::new(Mutex::new(None)),
            fail_with: None,
            close_error: None,
        }
    }
}

impl LiveConnector for MockConnector {
    fn connect(&mut self, api_key: &str, setup: SetupMessage) -> Result<LiveConnection> {
        {
            let mut log = self.log.lock().unwrap();
            log.connects += 1;
            log.api_keys.push(api_key.to_string());
            log.setups.push(serde_json::to_value(&setup).unwrap());
        }
        if let Some(err) = self.fail_with.clone() {
            return Err(err);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(tx);
        Ok(LiveConnection {
            session: Box::new(MockSession {
                log: Arc::clone(&self.log),
                closed: false,
                close_error: self.close_error.clone(),
            }),
            events: rx,
        })
    }
}

pub struct MockSession {
    log: SharedLog,
    closed: bool,
    close_error: Option<AgentError>,
}

impl LiveSession for MockSession {
    fn send_audio(&self, chunk: WireAudioChunk) -> Result<()> {
        if self.closed {
            return Err(AgentError::transport("closed"));
        }
        self.log.lock().unwrap().sent.push(chunk);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().session_closes += 1;
        if self.closed {
            return Err(AgentError::Close("already closed".to_string()));
        }
        self.closed = true;
        match self.close_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// ----------------------------------------------------------------------------
// Audio devices
// ----------------------------------------------------------------------------

pub struct MockCapture {
    log: SharedLog,
    /// Test side of the block stream, filled on start
    pub blocks: Arc<Mutex<Option<mpsc::Sender<AudioBlock>>>>,
    fail_with: Option<AgentError>,
    fail_stop: Option<AgentError>,
    capturing: bool,
}

#[async_trait::async_trait]
impl CaptureBackend for MockCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>> {
        self.log.lock().unwrap().capture_starts += 1;
        if let Some(err) = self.fail_with.clone() {
            return Err(err);
        }
        let (tx, rx) = mpsc::channel(32);
        *self.blocks.lock().unwrap() = Some(tx);
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.log.lock().unwrap().capture_stops += 1;
        self.blocks.lock().unwrap().take();
        self.capturing = false;
        match self.fail_stop.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "mock capture"
    }
}

pub struct MockOutput {
    log: SharedLog,
    fail_close: Option<AgentError>,
}

#[async_trait::async_trait]
impl OutputDevice for MockOutput {
    fn current_time(&self) -> f64 {
        self.log.lock().unwrap().clock
    }

    fn start(&mut self, id: BufferId, _buffer: PlaybackBuffer, at: f64) -> Result<()> {
        self.log.lock().unwrap().started.push((id, at));
        Ok(())
    }

    fn stop(&mut self, id: BufferId) {
        self.log.lock().unwrap().stopped.push(id);
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().output_closes += 1;
        match self.fail_close.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct MockDevices {
    pub log: SharedLog,
    pub blocks: Arc<Mutex<Option<mpsc::Sender<AudioBlock>>>>,
    pub ended: Arc<Mutex<Option<mpsc::UnboundedSender<BufferId>>>>,
    pub capture_error: Option<AgentError>,
    /// Returned by capture stop, after it is counted
    pub capture_stop_error: Option<AgentError>,
    /// Returned by output close, after it is counted
    pub output_close_error: Option<AgentError>,
}

impl MockDevices {
    pub fn new(log: SharedLog) -> Self {
        Self {
            log,
            blocks: Arc::new(Mutex::new(None)),
            ended: Arc::new(Mutex::new(None)),
            capture_error: None,
            capture_stop_error: None,
            output_close_error: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioDevices for MockDevices {
    async fn open_capture(&mut self, _config: &CaptureConfig) -> Result<Box<dyn CaptureBackend>> {
        Ok(Box::new(MockCapture {
            log: Arc::clone(&self.log),
            blocks: Arc::clone(&self.blocks),
            fail_with: self.capture_error.clone(),
            fail_stop: self.capture_stop_error.clone(),
            capturing: false,
        }))
    }

    async fn open_output(
        &mut self,
        _config: &OutputConfig,
        ended: mpsc::UnboundedSender<BufferId>,
    ) -> Result<Box<dyn OutputDevice>> {
        self.log.lock().unwrap().output_opens += 1;
        *self.ended.lock().unwrap() = Some(ended);
        Ok(Box::new(MockOutput {
            log: Arc::clone(&self.log),
            fail_close: self.output_close_error.clone(),
        }))
    }
}

// ----------------------------------------------------------------------------
// Server message builders
// ----------------------------------------------------------------------------

/// Base64 PCM16 payload of `samples` zero samples
pub fn silent_payload(samples: usize) -> String {
    aura_voice::audio::pcm::bytes_to_text(&vec![0u8; samples * 2])
}

pub fn server_message(json: serde_json::Value) -> SessionEvent {
    SessionEvent::Message(Box::new(serde_json::from_value(json).unwrap()))
}

pub fn output_text(text: &str) -> SessionEvent {
    server_message(serde_json::json!({
        "serverContent": { "outputTranscription": { "text": text } }
    }))
}

pub fn input_text(text: &str) -> SessionEvent {
    server_message(serde_json::json!({
        "serverContent": { "inputTranscription": { "text": text } }
    }))
}

/// 0.5 s of 24 kHz audio
pub fn audio_chunk() -> SessionEvent {
    server_message(serde_json::json!({
        "serverContent": { "modelTurn": { "parts": [
            { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": silent_payload(12000) } }
        ] } }
    }))
}

pub fn turn_complete() -> SessionEvent {
    server_message(serde_json::json!({ "serverContent": { "turnComplete": true } }))
}
