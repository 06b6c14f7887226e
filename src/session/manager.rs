//! Session lifecycle manager
//!
//! One task owns the session handle, the capture pipeline, the playback
//! scheduler, the status machine and the transcript. Every input (commands,
//! session events, capture blocks, playback completions, the wave timer) is
//! an event handled to completion by [`SessionManager::dispatch`] before the
//! next one is polled, so none of that state needs a lock.

use anyhow::Result as AnyResult;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::handle::{AgentHandle, AgentSnapshot, Command};
use super::status::{AgentStatus, StatusEvent, StatusMachine};
use super::transcript::TranscriptProjection;
use crate::audio::{
    AudioBlock, CaptureBackend, CaptureBackendFactory, CaptureConfig, CapturePipeline, CaptureSource,
};
use crate::error::{AgentError, Result};
use crate::instruction::system_instruction;
use crate::live::{LiveConnector, LiveSession, ServerMessage, SessionEvent, SetupMessage};
use crate::playback::{BufferId, OutputConfig, OutputDevice, PlaybackScheduler, SpeakerOutput};
use crate::secret::SecretStore;

pub const MISSING_SECRET_MESSAGE: &str =
    "Please set and save a password before starting the session.";
pub const MISSING_API_KEY_MESSAGE: &str =
    "API key not set. Please configure it to use the application.";

/// Opens the audio devices a session needs
#[async_trait::async_trait]
pub trait AudioDevices: Send {
    /// Create (but do not start) the capture backend
    async fn open_capture(&mut self, config: &CaptureConfig) -> Result<Box<dyn CaptureBackend>>;

    /// Open the output device; completions are reported on `ended`
    async fn open_output(
        &mut self,
        config: &OutputConfig,
        ended: mpsc::UnboundedSender<BufferId>,
    ) -> Result<Box<dyn OutputDevice>>;
}

/// Real devices: cpal speaker plus the configured capture source
pub struct SystemAudio {
    source: CaptureSource,
}

impl SystemAudio {
    pub fn new(source: CaptureSource) -> Self {
        Self { source }
    }
}

#[async_trait::async_trait]
impl AudioDevices for SystemAudio {
    async fn open_capture(&mut self, config: &CaptureConfig) -> Result<Box<dyn CaptureBackend>> {
        Ok(CaptureBackendFactory::create(&self.source, config.clone()))
    }

    async fn open_output(
        &mut self,
        config: &OutputConfig,
        ended: mpsc::UnboundedSender<BufferId>,
    ) -> Result<Box<dyn OutputDevice>> {
        Ok(Box::new(SpeakerOutput::open(config, ended).await?))
    }
}

/// One unit of work for the dispatch loop
#[derive(Debug)]
pub enum AgentEvent {
    Command(Command),
    Session(SessionEvent),
    Captured(AudioBlock),
    /// The capture source produced its last block
    CaptureEnded,
    PlaybackEnded(BufferId),
    /// The output device dropped its completion sender
    OutputClosed,
    WaveExpired,
}

pub struct SessionManager {
    config: SessionConfig,
    connector: Box<dyn LiveConnector>,
    devices: Box<dyn AudioDevices>,
    secrets: SecretStore,

    status: StatusMachine,
    error: Option<String>,
    transcript: TranscriptProjection,
    waving_until: Option<Instant>,

    session: Option<Box<dyn LiveSession>>,
    session_events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    capture: Option<CapturePipeline>,
    capture_blocks: Option<mpsc::Receiver<AudioBlock>>,
    playback: Option<PlaybackScheduler>,
    playback_ended: Option<mpsc::UnboundedReceiver<BufferId>>,

    snapshot_tx: watch::Sender<AgentSnapshot>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        connector: Box<dyn LiveConnector>,
        devices: Box<dyn AudioDevices>,
        secrets: SecretStore,
    ) -> Self {
        let initial = AgentSnapshot {
            has_secret: secrets.is_set(),
            ..AgentSnapshot::default()
        };
        let (snapshot_tx, _) = watch::channel(initial);

        Self {
            config,
            connector,
            devices,
            secrets,
            status: StatusMachine::new(),
            error: None,
            transcript: TranscriptProjection::new(),
            waving_until: None,
            session: None,
            session_events: None,
            capture: None,
            capture_blocks: None,
            playback: None,
            playback_ended: None,
            snapshot_tx,
        }
    }

    /// Run the dispatch loop on its own task
    pub fn spawn(self) -> (AgentHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_queue.max(1));
        let handle = AgentHandle::new(command_tx, self.snapshot_tx.subscribe());
        let task = tokio::spawn(self.run(command_rx));
        (handle, task)
    }

    /// Dispatch events until every command sender is gone, then release everything
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!("Session manager running");
        while let Some(event) = self.next_event(&mut commands).await {
            self.dispatch(event).await;
        }
        self.teardown().await;
        info!("Session manager stopped");
    }

    /// Wait for the next event from any source
    ///
    /// Returns None once the command channel is closed.
    pub async fn next_event(&mut self, commands: &mut mpsc::Receiver<Command>) -> Option<AgentEvent> {
        let wave_deadline = self.waving_until;

        tokio::select! {
            event = recv_unbounded(&mut self.session_events) => {
                // A dropped sender means the connection task is gone
                Some(AgentEvent::Session(event.unwrap_or(SessionEvent::Closed(None))))
            }
            id = recv_unbounded(&mut self.playback_ended) => {
                Some(id.map_or(AgentEvent::OutputClosed, AgentEvent::PlaybackEnded))
            }
            block = recv_bounded(&mut self.capture_blocks) => {
                Some(block.map_or(AgentEvent::CaptureEnded, AgentEvent::Captured))
            }
            _ = sleep_until_deadline(wave_deadline) => Some(AgentEvent::WaveExpired),
            command = commands.recv() => command.map(AgentEvent::Command),
        }
    }

    /// Handle one event to completion
    pub async fn dispatch(&mut self, event: AgentEvent) {
        let publish = !matches!(event, AgentEvent::Captured(_));

        match event {
            // Replies go out after the snapshot so callers observe the result
            AgentEvent::Command(Command::Start(reply)) => {
                let result = self.start();
                self.publish();
                let _ = reply.send(result);
            }
            AgentEvent::Command(Command::Stop(reply)) => {
                self.stop().await;
                self.publish();
                let _ = reply.send(());
            }
            AgentEvent::Command(Command::SaveSecret(value, reply)) => {
                let result = self.save_secret(&value);
                self.publish();
                let _ = reply.send(result);
            }
            AgentEvent::Session(SessionEvent::Opened) => self.on_opened().await,
            AgentEvent::Session(SessionEvent::Message(message)) => self.on_message(*message),
            AgentEvent::Session(SessionEvent::Error(cause)) => {
                self.fail(AgentError::transport(cause)).await;
            }
            AgentEvent::Session(SessionEvent::Closed(reason)) => self.on_closed(reason).await,
            AgentEvent::Captured(block) => self.forward_block(block),
            AgentEvent::CaptureEnded => {
                info!("Capture source ended");
                self.capture_blocks = None;
            }
            AgentEvent::PlaybackEnded(id) => self.on_playback_ended(id),
            AgentEvent::OutputClosed => {
                debug!("Output completion channel closed");
                self.playback_ended = None;
            }
            AgentEvent::WaveExpired => {
                debug!("Wave cue expired");
                self.waving_until = None;
            }
        }

        if publish {
            self.publish();
        }
    }

    pub fn status(&self) -> AgentStatus {
        self.status.status()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn transcript(&self) -> &TranscriptProjection {
        &self.transcript
    }

    pub fn playback(&self) -> Option<&PlaybackScheduler> {
        self.playback.as_ref()
    }

    pub fn is_waving(&self) -> bool {
        self.waving_until.is_some()
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            status: self.status.status(),
            error: self.error.clone(),
            transcript: self.transcript.turns().to_vec(),
            waving: self.is_waving(),
            authenticated: self.transcript.is_authenticated(),
            has_secret: self.secrets.is_set(),
        }
    }

    fn start(&mut self) -> Result<()> {
        if self.status().is_active() {
            warn!("Start requested while {}", self.status());
            return Err(AgentError::SessionActive);
        }

        let Some(secret) = self.secrets.get().map(str::to_owned) else {
            return self.reject(AgentError::ConfigurationMissing(MISSING_SECRET_MESSAGE.to_string()));
        };

        self.error = None;
        self.status.apply(StatusEvent::StartRequested);
        info!("Starting voice session");

        let Some(api_key) = self.config.api_key.clone().filter(|k| !k.is_empty()) else {
            return self.reject(AgentError::ConfigurationMissing(MISSING_API_KEY_MESSAGE.to_string()));
        };

        let setup = SetupMessage::new(self.config.model.clone(), system_instruction(&secret));
        match self.connector.connect(&api_key, setup) {
            Ok(connection) => {
                self.session = Some(connection.session);
                self.session_events = Some(connection.events);
                Ok(())
            }
            Err(e) => {
                error!("Failed to open session: {}", e);
                self.reject(e)
            }
        }
    }

    fn reject(&mut self, err: AgentError) -> Result<()> {
        warn!("Session start rejected: {}", err);
        self.error = Some(err.user_message());
        self.status.apply(StatusEvent::StartRejected);
        Err(err)
    }

    async fn on_opened(&mut self) {
        if self.status.apply(StatusEvent::SessionOpened).is_none() {
            debug!("Ignoring open while {}", self.status());
            return;
        }
        info!("Session open, activating audio");

        if let Err(e) = self.activate_audio().await {
            error!("Audio activation failed: {}", e);
            self.teardown().await;
            self.error = Some(e.user_message());
            self.status.apply(StatusEvent::StartRejected);
        }
    }

    async fn activate_audio(&mut self) -> Result<()> {
        let backend = self.devices.open_capture(&self.config.capture).await?;
        let (pipeline, blocks) = CapturePipeline::activate(backend).await?;
        self.capture = Some(pipeline);
        self.capture_blocks = Some(blocks);

        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let device = self.devices.open_output(&self.config.output, ended_tx).await?;
        self.playback = Some(PlaybackScheduler::new(device));
        self.playback_ended = Some(ended_rx);
        Ok(())
    }

    fn on_message(&mut self, message: ServerMessage) {
        let Some(playback) = self.playback.as_mut() else {
            debug!("Ignoring message before output is ready");
            return;
        };

        let sources = message.sources();
        if !sources.is_empty() && self.transcript.merge_sources(sources) {
            debug!("Merged citations into the agent turn");
        }

        if let Some(text) = message.output_text() {
            let update = self.transcript.push_output(text);
            if update.turn_started {
                self.status.apply(StatusEvent::AgentTurnStarted);
            }
        }

        for chunk in message.audio_chunks() {
            match playback.schedule_chunk(chunk, self.config.output.sample_rate, self.config.output.channels) {
                Ok(_) => {
                    self.status.apply(StatusEvent::AudioReceived);
                }
                Err(e) => warn!("Skipping response audio: {}", e),
            }
        }

        if let Some(text) = message.input_text() {
            if self.transcript.push_input(text) {
                self.waving_until = Some(Instant::now() + self.config.wave_cue);
            }
        }

        if message.interrupted() {
            debug!("Remote reported an interruption");
        }

        if message.turn_complete() {
            debug!("Turn complete");
            self.transcript.complete_turn();
        }
    }

    fn forward_block(&mut self, block: AudioBlock) {
        let (Some(pipeline), Some(session)) = (self.capture.as_mut(), self.session.as_ref()) else {
            return;
        };
        let chunk = pipeline.encode(&block);
        if let Err(e) = session.send_audio(chunk) {
            warn!("Dropping capture block {}: {}", block.sequence, e);
        }
    }

    fn on_playback_ended(&mut self, id: BufferId) {
        let Some(playback) = self.playback.as_mut() else {
            return;
        };
        if playback.on_ended(id) {
            debug!("Playback drained");
            self.status.apply(StatusEvent::PlaybackDrained);
        }
    }

    async fn on_closed(&mut self, reason: Option<String>) {
        info!("Session closed by remote: {}", reason.as_deref().unwrap_or("no reason"));
        self.teardown().await;
        self.status.apply(StatusEvent::SessionClosed);
    }

    async fn fail(&mut self, err: AgentError) {
        error!("Session failed: {}", err);
        self.teardown().await;
        self.error = Some(err.user_message());
        self.status.apply(StatusEvent::TransportFailed);
    }

    async fn stop(&mut self) {
        info!("Stopping voice session");
        self.teardown().await;
        self.error = None;
        self.status.apply(StatusEvent::StopRequested);
    }

    fn save_secret(&mut self, value: &str) -> AnyResult<()> {
        self.secrets.save(value)
    }

    /// Release every resource that is present; safe to repeat
    async fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close() {
                warn!("Error closing session: {}", e);
            }
        }
        self.session_events = None;

        if let Some(pipeline) = self.capture.take() {
            if let Err(e) = pipeline.deactivate().await {
                warn!("Error stopping capture: {}", e);
            }
        }
        self.capture_blocks = None;

        if let Some(playback) = self.playback.take() {
            if let Err(e) = playback.close().await {
                warn!("Error closing output: {}", e);
            }
        }
        self.playback_ended = None;

        self.transcript.reset();
        self.waving_until = None;
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

async fn recv_unbounded<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_bounded<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
