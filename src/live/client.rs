use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::messages::{RealtimeInputMessage, ServerMessage, SetupMessage};
use crate::audio::WireAudioChunk;
use crate::error::{AgentError, Result};

/// Gemini Live bidirectional streaming endpoint
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Lifecycle and data events of one remote session
#[derive(Debug)]
pub enum SessionEvent {
    /// Setup acknowledged; audio may flow
    Opened,
    Message(Box<ServerMessage>),
    /// Transport failure; no further events follow
    Error(String),
    /// Closed by the remote side (or the stream ended)
    Closed(Option<String>),
}

/// Handle for sending to an open session
pub trait LiveSession: Send {
    /// Queue an audio chunk without waiting for the transport
    fn send_audio(&self, chunk: WireAudioChunk) -> Result<()>;

    /// Ask the transport to close
    fn close(&mut self) -> Result<()>;
}

/// A connection attempt: the send handle plus its event stream
pub struct LiveConnection {
    pub session: Box<dyn LiveSession>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// Opens remote sessions
///
/// `connect` returns immediately; the outcome arrives as `Opened` or `Error`
/// on the connection's event stream.
pub trait LiveConnector: Send {
    fn connect(&mut self, api_key: &str, setup: SetupMessage) -> Result<LiveConnection>;
}

enum Outbound {
    Frame(String),
    Close,
}

/// WebSocket session handle
pub struct WebSocketSession {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl LiveSession for WebSocketSession {
    fn send_audio(&self, chunk: WireAudioChunk) -> Result<()> {
        let json = serde_json::to_string(&RealtimeInputMessage::audio(chunk))
            .map_err(|e| AgentError::transport(format!("Failed to encode audio frame: {}", e)))?;
        self.outbound
            .send(Outbound::Frame(json))
            .map_err(|_| AgentError::transport("Session connection is closed"))
    }

    fn close(&mut self) -> Result<()> {
        self.outbound
            .send(Outbound::Close)
            .map_err(|_| AgentError::Close("connection already closed".to_string()))
    }
}

/// Connects to Gemini Live over tokio-tungstenite
pub struct WebSocketConnector {
    endpoint: String,
}

impl WebSocketConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl LiveConnector for WebSocketConnector {
    fn connect(&mut self, api_key: &str, setup: SetupMessage) -> Result<LiveConnection> {
        let setup_json = serde_json::to_string(&setup)
            .map_err(|e| AgentError::transport(format!("Failed to encode setup: {}", e)))?;
        let url = format!("{}?key={}", self.endpoint, api_key);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!("Connecting to Gemini Live at {} (model {})", self.endpoint, setup.setup.model);
        tokio::spawn(run_connection(url, setup_json, outbound_rx, events_tx));

        Ok(LiveConnection {
            session: Box::new(WebSocketSession {
                outbound: outbound_tx,
            }),
            events: events_rx,
        })
    }
}

async fn run_connection(
    url: String,
    setup_json: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let (stream, _response) = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok(connected) => connected,
        Err(e) => {
            error!("Gemini Live connection failed: {}", e);
            let _ = events.send(SessionEvent::Error(e.to_string()));
            return;
        }
    };
    let (mut sink, mut source) = stream.split();

    if let Err(e) = sink.send(Message::Text(setup_json)).await {
        error!("Failed to send session setup: {}", e);
        let _ = events.send(SessionEvent::Error(e.to_string()));
        return;
    }
    debug!("Session setup sent");

    let mut opened = false;
    let mut frames_sent: u64 = 0;

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(json)) => {
                    if let Err(e) = sink.send(Message::Text(json)).await {
                        error!("Failed to send audio frame: {}", e);
                        let _ = events.send(SessionEvent::Error(e.to_string()));
                        break;
                    }
                    frames_sent += 1;
                }
                Some(Outbound::Close) | None => {
                    info!("Closing Gemini Live connection ({} frames sent)", frames_sent);
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        warn!("Error sending close frame: {}", e);
                    }
                    break;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !forward_frame(&text, &mut opened, &events) {
                        break;
                    }
                }
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => {
                        if !forward_frame(text, &mut opened, &events) {
                            break;
                        }
                    }
                    Err(_) => warn!("Skipping non-UTF-8 binary frame ({} bytes)", data.len()),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                    info!("Gemini Live closed the connection: {:?}", reason);
                    let _ = events.send(SessionEvent::Closed(reason));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Gemini Live transport error: {}", e);
                    let _ = events.send(SessionEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    info!("Gemini Live stream ended");
                    let _ = events.send(SessionEvent::Closed(None));
                    break;
                }
            },
        }
    }

    debug!("Connection task finished");
}

/// Parse one JSON frame and forward it; false once nobody is listening
fn forward_frame(
    text: &str,
    opened: &mut bool,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> bool {
    let message = match ServerMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Skipping unparseable server frame: {}", e);
            return true;
        }
    };

    let event = if message.is_setup_complete() && !*opened {
        *opened = true;
        info!("Gemini Live setup complete");
        SessionEvent::Opened
    } else {
        SessionEvent::Message(Box::new(message))
    };

    events.send(event).is_ok()
}
