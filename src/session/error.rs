use thiserror::Error;

/// Failures while establishing a recording session.
///
/// The `Display` text becomes the `reason` of a failed `START_USER_RESULT`.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no free RTP port after {attempts} attempts")]
    PortsExhausted { attempts: u32 },
    #[error("decoder not available: {0}")]
    DecoderUnavailable(String),
    #[error("failed to spawn {label} decoder: {source}")]
    DecoderSpawn {
        label: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to configure {label} decoder: {source}")]
    DecoderInput {
        label: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{label} decoder exited during startup ({reason})")]
    DecoderExited { label: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
