//! Command line for the external RTP → PCM decoder.

use crate::config::DecoderConfig;
use crate::session::SessionError;
use std::path::PathBuf;
use std::time::Duration;
use which::which;

/// Resolved decoder program plus the arguments for one stream.
#[derive(Debug, Clone)]
pub struct DecoderCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// How long a fresh decoder must stay alive before its stream counts as open.
    pub startup_grace: Duration,
}

impl DecoderCommand {
    /// Locate the configured program on `PATH` and build its argument list.
    pub fn resolve(config: &DecoderConfig) -> Result<Self, SessionError> {
        let program = which(&config.program).map_err(|e| {
            SessionError::DecoderUnavailable(format!("{} ({})", config.program, e))
        })?;

        Ok(Self {
            program,
            args: Self::build_args(config),
            startup_grace: Duration::from_millis(config.startup_grace_ms),
        })
    }

    fn build_args(config: &DecoderConfig) -> Vec<String> {
        if !config.args.is_empty() {
            return config.args.clone();
        }

        // SDP arrives on stdin, raw interleaved s16le leaves on stdout
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-protocol_whitelist",
            "pipe,udp,rtp",
            "-f",
            "sdp",
            "-i",
            "pipe:0",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.extend(config.extra_args.iter().cloned());

        args.extend([
            "-f".to_string(),
            "s16le".to_string(),
            "-ar".to_string(),
            config.clock_rate.to_string(),
            "-ac".to_string(),
            config.channels.to_string(),
            "pipe:1".to_string(),
        ]);

        args
    }
}

/// Whether the configured decoder can be found at all.
pub fn decoder_available(config: &DecoderConfig) -> bool {
    which(&config.program).is_ok()
}
