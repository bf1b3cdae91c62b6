use crate::audio::PcmFormat;
use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub recording: RecordingConfig,
    pub decoder: DecoderConfig,
    pub ports: PortConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Clip output location and the pre/post-roll defaults used when a
/// `START_USER` command leaves a duration out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Root directory for finalized clips. Empty means the platform data dir.
    pub output_dir: String,
    pub host_pre_seconds: f64,
    pub user_pre_seconds: f64,
    pub host_post_seconds: f64,
    pub user_post_seconds: f64,
    /// Upper bound applied to every pre/post-roll duration, defaults included.
    pub max_roll_seconds: f64,
}

/// External decoder invocation and the fixed RTP profile it is told to expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub program: String,
    pub payload_type: u8,
    pub codec: String,
    pub clock_rate: u32,
    pub channels: u16,
    /// Extra arguments placed between the SDP input and the PCM output spec.
    pub extra_args: Vec<String>,
    /// Full argument list replacing the built-in ffmpeg invocation when non-empty.
    pub args: Vec<String>,
    /// A decoder exiting within this window fails session setup.
    pub startup_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Interface the RTP sinks listen on.
    pub host: String,
    /// Bound on port probes per reservation.
    pub max_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3939,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: String::new(),
            host_pre_seconds: 5.0,
            user_pre_seconds: 2.0,
            host_post_seconds: 2.0,
            user_post_seconds: 2.0,
            max_roll_seconds: 300.0,
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            payload_type: 100,
            codec: "opus".to_string(),
            clock_rate: 48_000,
            channels: 2,
            extra_args: Vec::new(),
            args: Vec::new(),
            startup_grace_ms: 250,
        }
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            max_attempts: 20,
        }
    }
}

impl RecordingConfig {
    pub fn resolve_output_dir(&self) -> Result<PathBuf> {
        if self.output_dir.trim().is_empty() {
            global::clips_dir()
        } else {
            Ok(PathBuf::from(&self.output_dir))
        }
    }
}

impl DecoderConfig {
    /// Layout of the PCM the decoder is asked to emit.
    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat::new(self.clock_rate, self.channels)
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ports.max_attempts, 20);
        assert_eq!(config.decoder.program, "ffmpeg");
        assert_eq!(config.decoder.pcm_format(), PcmFormat::default());
        assert_eq!(config.recording.host_pre_seconds, 5.0);
        assert_eq!(config.recording.user_pre_seconds, 2.0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [recording]
            output_dir = "/srv/clips"
            host_post_seconds = 4.5

            [ports]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.recording.output_dir, "/srv/clips");
        assert_eq!(config.recording.host_post_seconds, 4.5);
        assert_eq!(config.recording.user_post_seconds, 2.0);
        assert_eq!(config.ports.max_attempts, 3);
        assert_eq!(config.ports.host, "127.0.0.1");
        assert_eq!(config.server.port, 3939);
    }

    #[test]
    fn test_load_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.server.port, 3939);

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.decoder.codec, "opus");
    }

    #[test]
    fn test_explicit_output_dir() {
        let recording = RecordingConfig {
            output_dir: "/tmp/clips".to_string(),
            ..Default::default()
        };
        assert_eq!(recording.resolve_output_dir().unwrap(), PathBuf::from("/tmp/clips"));
    }
}
