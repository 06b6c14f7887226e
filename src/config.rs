use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::audio::CaptureConfig;
use crate::live::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::playback::OutputConfig;
use crate::session::SessionConfig;

/// Environment variable consulted when the configured one is unset
pub const FALLBACK_API_KEY_ENV: &str = "API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub live: LiveConfig,
    pub audio: AudioConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub block_size: usize,
    pub output_channels: u16,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub wave_cue_ms: u64,
}

impl AudioConfig {
    /// Zero sizes and rates would stall framing or break clock arithmetic
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            bail!("audio.block_size must be greater than zero");
        }
        if self.input_sample_rate == 0 {
            bail!("audio.input_sample_rate must be greater than zero");
        }
        if self.output_sample_rate == 0 {
            bail!("audio.output_sample_rate must be greater than zero");
        }
        if self.output_channels == 0 {
            bail!("audio.output_channels must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub secret_path: String,
}

impl Config {
    /// Defaults, then the optional file at `path`, then `AURA__SECTION__KEY` variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "aura-voice")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8740)?
            .set_default("live.endpoint", DEFAULT_ENDPOINT)?
            .set_default("live.model", DEFAULT_MODEL)?
            .set_default("live.api_key_env", "GEMINI_API_KEY")?
            .set_default("audio.input_sample_rate", 16000)?
            .set_default("audio.output_sample_rate", 24000)?
            .set_default("audio.block_size", 4096)?
            .set_default("audio.output_channels", 1)?
            .set_default("audio.wave_cue_ms", 2500)?
            .set_default("storage.secret_path", "~/.config/aura-voice/secret.json")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("AURA").separator("__"))
            .build()
            .context("Failed to load configuration")?;

        let cfg: Self = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.audio.validate()?;
        Ok(cfg)
    }

    /// Read the API key from the configured variable, then the fallback
    pub fn api_key(&self) -> Option<String> {
        [self.live.api_key_env.as_str(), FALLBACK_API_KEY_ENV]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    pub fn secret_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.storage.secret_path)
            .with_context(|| format!("Cannot expand secret path {}", self.storage.secret_path))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model: self.live.model.clone(),
            api_key: self.api_key(),
            capture: CaptureConfig {
                sample_rate: self.audio.input_sample_rate,
                block_size: self.audio.block_size,
                device_name: self.audio.input_device.clone(),
                ..CaptureConfig::default()
            },
            output: OutputConfig {
                sample_rate: self.audio.output_sample_rate,
                channels: self.audio.output_channels,
                device_name: self.audio.output_device.clone(),
            },
            wave_cue: Duration::from_millis(self.audio.wave_cue_ms),
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load("/nonexistent/aura-voice").unwrap();

        assert_eq!(cfg.service.http.port, 8740);
        assert_eq!(cfg.live.model, DEFAULT_MODEL);
        assert_eq!(cfg.audio.block_size, 4096);
        assert!(cfg.audio.input_device.is_none());

        let session = cfg.session_config();
        assert_eq!(session.capture.sample_rate, 16000);
        assert_eq!(session.output.sample_rate, 24000);
        assert_eq!(session.wave_cue, Duration::from_millis(2500));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aura.toml");
        std::fs::write(
            &path,
            "[audio]\nwave_cue_ms = 1000\ninput_device = \"USB Mic\"\n\n[storage]\nsecret_path = \"/tmp/s.json\"\n",
        )
        .unwrap();

        let cfg = Config::load(path.with_extension("").to_str().unwrap()).unwrap();
        assert_eq!(cfg.audio.wave_cue_ms, 1000);
        assert_eq!(cfg.audio.input_device.as_deref(), Some("USB Mic"));
        assert_eq!(cfg.secret_path().unwrap(), PathBuf::from("/tmp/s.json"));
    }

    fn load_toml(contents: &str) -> Result<Config> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aura.toml");
        std::fs::write(&path, contents).unwrap();
        Config::load(path.with_extension("").to_str().unwrap())
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let err = load_toml("[audio]\nblock_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("block_size"));
    }

    #[test]
    fn test_zero_sample_rates_rejected() {
        let err = load_toml("[audio]\ninput_sample_rate = 0\n").unwrap_err();
        assert!(err.to_string().contains("input_sample_rate"));

        let err = load_toml("[audio]\noutput_sample_rate = 0\n").unwrap_err();
        assert!(err.to_string().contains("output_sample_rate"));

        assert!(load_toml("[audio]\noutput_channels = 0\n").is_err());
    }
}
