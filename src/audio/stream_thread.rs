// Dedicated owner thread for cpal streams
//
// cpal streams are not Send on every host, so each one is built, played and
// dropped on its own thread. Stopping joins that thread, which guarantees the
// device callback has been torn down when `stop` returns.

use std::sync::mpsc as std_mpsc;
use std::thread;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{AgentError, Result};

pub(crate) struct StreamThread {
    name: String,
    stop_tx: Option<std_mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamThread {
    /// Build and play a stream on a new thread, returning once it is running
    pub(crate) async fn spawn<S, F>(name: &str, build: F) -> Result<Self>
    where
        S: 'static,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let stream = match build() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Park until stop() or until the owner is dropped
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| AgentError::unavailable(format!("Failed to spawn {} thread: {}", name, e)))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                debug!("{} stream running", name);
                Ok(Self {
                    name: name.to_string(),
                    stop_tx: Some(stop_tx),
                    handle: Some(handle),
                })
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AgentError::unavailable(format!(
                    "{} thread exited before the stream started",
                    name
                )))
            }
        }
    }

    /// Drop the stream and wait for its thread to exit
    pub(crate) fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| AgentError::unavailable(format!("{} thread panicked", self.name)))?;
            debug!("{} stream released", self.name);
        }

        Ok(())
    }

    /// Stop from async code; the join runs on the blocking pool
    pub(crate) async fn shutdown(mut self) -> Result<()> {
        let name = self.name.clone();
        tokio::task::spawn_blocking(move || self.stop())
            .await
            .map_err(|e| AgentError::unavailable(format!("{} shutdown failed: {}", name, e)))?
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to release stream on drop: {}", e);
        }
    }
}
