use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use super::status::AgentStatus;
use super::transcript::TranscriptTurn;
use crate::error::AgentError;

/// Everything the presentation layer reads
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentSnapshot {
    pub status: AgentStatus,
    /// Human-readable cause of the last failure
    pub error: Option<String>,
    pub transcript: Vec<TranscriptTurn>,
    /// Greeting cue currently raised
    pub waving: bool,
    /// The agent has said the access phrase
    pub authenticated: bool,
    pub has_secret: bool,
}

/// Requests sent to the session manager
#[derive(Debug)]
pub enum Command {
    Start(oneshot::Sender<std::result::Result<(), AgentError>>),
    Stop(oneshot::Sender<()>),
    SaveSecret(String, oneshot::Sender<Result<()>>),
}

/// Cloneable handle to a running session manager
#[derive(Clone)]
pub struct AgentHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<AgentSnapshot>,
}

impl AgentHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>, snapshot: watch::Receiver<AgentSnapshot>) -> Self {
        Self { commands, snapshot }
    }

    /// Request a session; returns once the connection attempt is under way
    ///
    /// Gate failures come back as `AgentError` inside the error.
    pub async fn start(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Start(tx)).await?;
        rx.await.map_err(|_| anyhow!("Session manager stopped"))??;
        Ok(())
    }

    /// Stop the session; returns after every resource is released
    pub async fn stop(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stop(tx)).await?;
        rx.await.map_err(|_| anyhow!("Session manager stopped"))
    }

    pub async fn save_secret(&self, value: impl Into<String>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SaveSecret(value.into(), tx)).await?;
        rx.await.map_err(|_| anyhow!("Session manager stopped"))?
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn status(&self) -> AgentStatus {
        self.snapshot.borrow().status
    }

    /// Watch snapshots as they change
    pub fn subscribe(&self) -> watch::Receiver<AgentSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until a snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<AgentSnapshot>
    where
        F: FnMut(&AgentSnapshot) -> bool,
    {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| anyhow!("Session manager stopped"))?;
        Ok(snapshot.clone())
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("Session manager stopped"))
    }
}
