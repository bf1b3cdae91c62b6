//! Control-channel wire types and the registry's internal mailbox.
//!
//! Every wire message is one JSON object tagged by `"type"`, e.g.
//! `{"type":"START_CLIP","userId":"u1"}`.

use crate::clip::{ClipPhase, FinalizedClip, PostRollElapsed};
use crate::ingest::{IngestEvent, IngestStatsSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Inbound commands from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    StartUser {
        host_id: String,
        user_id: String,
        meeting_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host_pre_seconds: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_pre_seconds: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host_post_seconds: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_post_seconds: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    StartClip { user_id: String },
    #[serde(rename_all = "camelCase")]
    StopClip { user_id: String },
    #[serde(rename_all = "camelCase")]
    StopUser { user_id: String },
}

impl Command {
    pub fn user_id(&self) -> &str {
        match self {
            Command::StartUser { user_id, .. }
            | Command::StartClip { user_id }
            | Command::StopClip { user_id }
            | Command::StopUser { user_id } => user_id,
        }
    }
}

/// Outbound events to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    StartUserResult(StartUserResult),
    ClipFinalized(FinalizedClip),
    ClipFailed(ClipFailed),
    SessionClosed(SessionClosed),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartUserResult {
    pub ok: bool,
    pub host_id: String,
    pub user_id: String,
    pub meeting_id: String,
    pub user_port: Option<u16>,
    pub host_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipFailed {
    pub host_id: String,
    pub user_id: String,
    pub meeting_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClosed {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Point-in-time view of one session for introspection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: u64,
    pub user_id: String,
    pub host_id: String,
    pub meeting_id: String,
    pub host_port: u16,
    pub user_port: u16,
    pub phase: ClipPhase,
    pub clip_seq: u64,
    pub close_requested: bool,
    pub host: IngestStatsSnapshot,
    pub user: IngestStatsSnapshot,
}

/// Everything the registry loop reacts to, processed one at a time.
#[derive(Debug)]
pub enum RegistryMessage {
    Command(Command),
    Ingest(IngestEvent),
    PostRoll(PostRollElapsed),
    ClipWritten {
        session_id: u64,
        user_id: String,
        result: Result<FinalizedClip, ClipFailed>,
    },
    Sessions(oneshot::Sender<Vec<SessionSummary>>),
    Shutdown,
}

impl From<Command> for RegistryMessage {
    fn from(command: Command) -> Self {
        RegistryMessage::Command(command)
    }
}

impl From<IngestEvent> for RegistryMessage {
    fn from(event: IngestEvent) -> Self {
        RegistryMessage::Ingest(event)
    }
}

impl From<PostRollElapsed> for RegistryMessage {
    fn from(elapsed: PostRollElapsed) -> Self {
        RegistryMessage::PostRoll(elapsed)
    }
}
