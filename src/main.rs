use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use aura_voice::audio::list_devices;
use aura_voice::{
    create_router, AgentHandle, AgentStatus, AppState, CaptureSource, Config, SecretStore, SessionManager,
    Speaker, SystemAudio, WebSocketConnector,
};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "aura-voice", version, about = "Real-time voice agent over Gemini Live")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, global = true, default_value = "config/aura-voice")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to the agent from this terminal
    Talk {
        /// Replay a WAV file instead of using the microphone
        #[arg(long)]
        wav: Option<PathBuf>,
    },
    /// Run the HTTP control API
    Serve {
        /// Replay a WAV file instead of using the microphone
        #[arg(long)]
        wav: Option<PathBuf>,
    },
    /// Manage the shared secret
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
    /// List audio devices
    Devices,
}

#[derive(Subcommand)]
enum SecretAction {
    Set { value: String },
    Show,
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    info!("Aura voice v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Commands::Talk { wav } => talk(&cfg, source_for(wav)).await,
        Commands::Serve { wav } => serve(&cfg, source_for(wav)).await,
        Commands::Secret { action } => secret(&cfg, action),
        Commands::Devices => devices(),
    }
}

fn source_for(wav: Option<PathBuf>) -> CaptureSource {
    wav.map(CaptureSource::WavFile).unwrap_or_default()
}

fn spawn_manager(cfg: &Config, source: CaptureSource) -> Result<(AgentHandle, tokio::task::JoinHandle<()>)> {
    let secrets = SecretStore::open(cfg.secret_path()?)?;
    let session_config = cfg.session_config();
    if session_config.api_key.is_none() {
        warn!("No API key in ${} or ${}", cfg.live.api_key_env, aura_voice::config::FALLBACK_API_KEY_ENV);
    }

    let manager = SessionManager::new(
        session_config,
        Box::new(WebSocketConnector::new(cfg.live.endpoint.clone())),
        Box::new(SystemAudio::new(source)),
        secrets,
    );
    Ok(manager.spawn())
}

async fn talk(cfg: &Config, source: CaptureSource) -> Result<()> {
    let (agent, task) = spawn_manager(cfg, source)?;

    if let Err(e) = agent.start().await {
        let snapshot = agent.snapshot();
        bail!("{}", snapshot.error.unwrap_or_else(|| e.to_string()));
    }
    println!("Session starting. Press Ctrl-C to stop.");

    let mut updates = agent.subscribe();
    let mut printer = TranscriptPrinter::default();
    let mut was_active = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                printer.show(&snapshot);

                match snapshot.status {
                    AgentStatus::Error => {
                        eprintln!("{}", snapshot.error.unwrap_or_default());
                        break;
                    }
                    AgentStatus::Idle if was_active => break,
                    status => was_active |= status.is_active(),
                }
            }
        }
    }

    agent.stop().await?;
    drop(agent);
    task.await.context("Session manager panicked")?;
    Ok(())
}

#[derive(Default)]
struct TranscriptPrinter {
    status: Option<AgentStatus>,
    last: Option<(Uuid, usize)>,
    waving: bool,
    authenticated: bool,
}

impl TranscriptPrinter {
    fn show(&mut self, snapshot: &aura_voice::AgentSnapshot) {
        if self.status != Some(snapshot.status) {
            println!("[{}]", snapshot.status);
            self.status = Some(snapshot.status);
        }
        if snapshot.waving && !self.waving {
            println!("*waves*");
        }
        self.waving = snapshot.waving;
        if snapshot.authenticated && !self.authenticated {
            println!("[access granted]");
        }
        self.authenticated = snapshot.authenticated;

        if let Some(turn) = snapshot.transcript.last() {
            if self.last != Some((turn.id, turn.text.len())) {
                let who = match turn.speaker {
                    Speaker::User => "You",
                    Speaker::Agent => "Aura",
                };
                println!("{}: {}", who, turn.text);
                for source in &turn.sources {
                    println!("    source: {} <{}>", source.title, source.uri);
                }
                self.last = Some((turn.id, turn.text.len()));
            }
        }
    }
}

async fn serve(cfg: &Config, source: CaptureSource) -> Result<()> {
    let (agent, task) = spawn_manager(cfg, source)?;
    let app = create_router(AppState::new(agent.clone()));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    agent.stop().await?;
    drop(agent);
    task.await.context("Session manager panicked")?;
    Ok(())
}

fn secret(cfg: &Config, action: SecretAction) -> Result<()> {
    let path = cfg.secret_path()?;
    let mut store = SecretStore::open(&path)?;

    match action {
        SecretAction::Set { value } => {
            store.save(&value)?;
            println!("Password saved to {}", path.display());
        }
        SecretAction::Show => match store.get() {
            Some(value) => println!("Password is set ({} characters)", value.chars().count()),
            None => println!("No password saved"),
        },
        SecretAction::Clear => {
            store.clear()?;
            println!("Password cleared");
        }
    }
    Ok(())
}

fn devices() -> Result<()> {
    let devices = list_devices()?;
    if devices.is_empty() {
        println!("No audio devices found");
        return Ok(());
    }

    for device in devices {
        println!(
            "{:6} {}{} ({} Hz, {} ch)",
            if device.is_input { "input" } else { "output" },
            device.name,
            if device.is_default { " [default]" } else { "" },
            device.default_sample_rate,
            device.channels
        );
    }
    Ok(())
}
