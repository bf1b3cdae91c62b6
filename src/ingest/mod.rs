//! RTP ingestion: port reservation, decoder invocation and the per-stream pump.

pub mod decoder;
pub mod ports;
pub mod sdp;
pub mod stream_ingestor;

use serde::Serialize;
use std::sync::Arc;

pub use decoder::DecoderCommand;
pub use ports::PortPool;
pub use stream_ingestor::{IngestStatsSnapshot, StreamIngestor};

/// Which leg of a user's session a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The host's broadcast as heard by the user.
    Host,
    /// The user's own microphone.
    User,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Host => "host",
            Side::User => "user",
        }
    }
}

/// Identifies the session and leg an ingest event belongs to.
#[derive(Debug, Clone)]
pub struct StreamTag {
    pub session_id: u64,
    pub user_id: Arc<str>,
    pub side: Side,
}

#[derive(Debug)]
pub enum IngestEvent {
    /// A decoded chunk, delivered in arrival order.
    Pcm { tag: StreamTag, chunk: Vec<u8> },
    /// The decoder died without being asked to.
    Failed { tag: StreamTag, reason: String },
}

impl IngestEvent {
    pub fn tag(&self) -> &StreamTag {
        match self {
            IngestEvent::Pcm { tag, .. } | IngestEvent::Failed { tag, .. } => tag,
        }
    }
}
