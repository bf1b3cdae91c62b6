//! Session registry: one entry per user with an active recording session.
//!
//! All state lives in [`SessionRegistry`] and is mutated only from its run
//! loop, one [`RegistryMessage`] at a time. Ingestors, post-roll timers and
//! clip writes report back through the same mailbox, so sessions never share
//! mutable state. The one exception is the port pool, which is guarded on its own.

use super::error::SessionError;
use super::messages::{
    ClipFailed, Command, Event, RegistryMessage, SessionClosed, SessionSummary, StartUserResult,
};
use crate::audio::PcmFormat;
use crate::clip::{ClipController, ClipWriter, FinalizedClip, PostRollElapsed, RollDurations};
use crate::config::{Config, DecoderConfig};
use crate::ingest::{sdp, DecoderCommand, IngestEvent, PortPool, Side, StreamIngestor, StreamTag};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// A clip start queued for a user whose session never shows up is dropped after this.
const QUEUED_CLIP_START_TTL: Duration = Duration::from_secs(60);

/// Everything a registry needs from configuration.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub ports: PortPool,
    pub decoder: DecoderConfig,
    pub defaults: RollDurations,
    /// Bound on every pre/post-roll duration a session may use.
    pub max_roll_seconds: f64,
    pub writer: ClipWriter,
}

impl RegistrySettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let recording = &config.recording;
        Ok(Self {
            ports: PortPool::new(config.ports.host.clone(), config.ports.max_attempts),
            decoder: config.decoder.clone(),
            defaults: RollDurations {
                host_pre_seconds: recording.host_pre_seconds,
                user_pre_seconds: recording.user_pre_seconds,
                host_post_seconds: recording.host_post_seconds,
                user_post_seconds: recording.user_post_seconds,
            },
            max_roll_seconds: recording.max_roll_seconds,
            writer: ClipWriter::new(recording.resolve_output_dir()?),
        })
    }
}

/// Cloneable sender side of the registry mailbox.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::UnboundedSender<RegistryMessage>,
}

impl RegistryHandle {
    pub fn send(&self, command: Command) -> Result<()> {
        self.deliver(RegistryMessage::Command(command))
    }

    /// Feed an ingest event as if it came from a stream ingestor.
    pub fn ingest(&self, event: IngestEvent) -> Result<()> {
        self.deliver(RegistryMessage::Ingest(event))
    }

    pub async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        let (reply, rx) = oneshot::channel();
        self.deliver(RegistryMessage::Sessions(reply))?;
        rx.await.map_err(|_| anyhow!("Session registry stopped"))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.deliver(RegistryMessage::Shutdown)
    }

    fn deliver(&self, message: RegistryMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| anyhow!("Session registry stopped"))
    }
}

struct Session {
    id: u64,
    user_key: Arc<str>,
    controller: ClipController,
    host: StreamIngestor,
    user: StreamIngestor,
    close_requested: bool,
    writing: bool,
}

impl Session {
    fn busy(&self) -> bool {
        self.writing || self.controller.in_flight()
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            user_id: self.controller.user_id().to_string(),
            host_id: self.controller.host_id().to_string(),
            meeting_id: self.controller.meeting_id().to_string(),
            host_port: self.host.port(),
            user_port: self.user.port(),
            phase: self.controller.phase(),
            clip_seq: self.controller.seq(),
            close_requested: self.close_requested,
            host: self.host.stats(),
            user: self.user.stats(),
        }
    }
}

pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    pending_clip_starts: HashMap<String, Instant>,
    settings: RegistrySettings,
    format: PcmFormat,
    events: mpsc::UnboundedSender<Event>,
    tx: mpsc::UnboundedSender<RegistryMessage>,
    inbox: mpsc::UnboundedReceiver<RegistryMessage>,
    next_session_id: u64,
}

impl SessionRegistry {
    /// Build a registry that reports to `events`.
    pub fn new(settings: RegistrySettings, events: mpsc::UnboundedSender<Event>) -> (Self, RegistryHandle) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let handle = RegistryHandle { tx: tx.clone() };
        let registry = Self {
            sessions: HashMap::new(),
            pending_clip_starts: HashMap::new(),
            format: settings.decoder.pcm_format(),
            settings,
            events,
            tx,
            inbox,
            next_session_id: 1,
        };
        (registry, handle)
    }

    /// Process messages until a shutdown is requested, then close every session.
    pub async fn run(mut self) {
        info!("Session registry running");
        while let Some(message) = self.inbox.recv().await {
            if !self.handle(message).await {
                break;
            }
        }

        let users: Vec<String> = self.sessions.keys().cloned().collect();
        for user_id in users {
            self.teardown(&user_id, Some("service shutting down".to_string()));
        }
        info!("Session registry stopped");
    }

    async fn handle(&mut self, message: RegistryMessage) -> bool {
        match message {
            RegistryMessage::Command(command) => self.handle_command(command).await,
            RegistryMessage::Ingest(event) => self.handle_ingest(event),
            RegistryMessage::PostRoll(elapsed) => self.handle_post_roll(elapsed),
            RegistryMessage::ClipWritten {
                session_id,
                user_id,
                result,
            } => self.handle_clip_written(session_id, &user_id, result),
            RegistryMessage::Sessions(reply) => {
                let _ = reply.send(self.sessions.values().map(Session::summary).collect());
            }
            RegistryMessage::Shutdown => return false,
        }
        true
    }

    async fn handle_command(&mut self, command: Command) {
        debug!("Command: {:?}", command);
        match command {
            Command::StartUser {
                host_id,
                user_id,
                meeting_id,
                host_pre_seconds,
                user_pre_seconds,
                host_post_seconds,
                user_post_seconds,
            } => {
                let defaults = self.settings.defaults;
                let durations = RollDurations {
                    host_pre_seconds: host_pre_seconds.unwrap_or(defaults.host_pre_seconds),
                    user_pre_seconds: user_pre_seconds.unwrap_or(defaults.user_pre_seconds),
                    host_post_seconds: host_post_seconds.unwrap_or(defaults.host_post_seconds),
                    user_post_seconds: user_post_seconds.unwrap_or(defaults.user_post_seconds),
                }
                .clamped(self.settings.max_roll_seconds);
                self.start_session(host_id, user_id, meeting_id, durations).await;
            }
            Command::StartClip { user_id } => self.start_clip(&user_id),
            Command::StopClip { user_id } => self.stop_clip(&user_id),
            Command::StopUser { user_id } => self.stop_session(&user_id),
        }
    }

    async fn start_session(
        &mut self,
        host_id: String,
        user_id: String,
        meeting_id: String,
        durations: RollDurations,
    ) {
        if let Some(existing) = self.sessions.get(&user_id) {
            let result = if existing.close_requested {
                warn!("Session for user {} is closing, refusing restart", user_id);
                StartUserResult {
                    ok: false,
                    host_id,
                    user_id,
                    meeting_id,
                    user_port: None,
                    host_port: None,
                    reason: Some("session closing".to_string()),
                }
            } else {
                info!("Session for user {} already active, re-acknowledging", user_id);
                StartUserResult {
                    ok: true,
                    host_id: existing.controller.host_id().to_string(),
                    user_id,
                    meeting_id: existing.controller.meeting_id().to_string(),
                    user_port: Some(existing.user.port()),
                    host_port: Some(existing.host.port()),
                    reason: None,
                }
            };
            self.emit(Event::StartUserResult(result));
            return;
        }

        match self.open_session(&host_id, &user_id, &meeting_id, durations).await {
            Ok(mut session) => {
                let (host_port, user_port) = (session.host.port(), session.user.port());
                info!(
                    "Session {} for user {} ready (host port {}, user port {})",
                    session.id, user_id, host_port, user_port
                );

                if self.take_queued_clip_start(&user_id) {
                    info!("Applying queued clip start for user {}", user_id);
                    session.controller.start();
                }
                self.sessions.insert(user_id.clone(), session);

                self.emit(Event::StartUserResult(StartUserResult {
                    ok: true,
                    host_id,
                    user_id,
                    meeting_id,
                    user_port: Some(user_port),
                    host_port: Some(host_port),
                    reason: None,
                }));
            }
            Err(e) => {
                error!("Failed to start session for user {}: {}", user_id, e);
                self.emit(Event::StartUserResult(StartUserResult {
                    ok: false,
                    host_id,
                    user_id,
                    meeting_id,
                    user_port: None,
                    host_port: None,
                    reason: Some(e.to_string()),
                }));
            }
        }
    }

    /// Reserve both ports and start both ingestors, rolling everything back on failure.
    async fn open_session(
        &mut self,
        host_id: &str,
        user_id: &str,
        meeting_id: &str,
        durations: RollDurations,
    ) -> Result<Session, SessionError> {
        let decoder = DecoderCommand::resolve(&self.settings.decoder)?;
        let ports = self.settings.ports.clone();

        let host_port = ports.reserve()?;
        let user_port = match ports.reserve() {
            Ok(port) => port,
            Err(e) => {
                ports.release(host_port);
                return Err(e);
            }
        };

        let session_id = self.next_session_id;
        self.next_session_id += 1;
        let user_key: Arc<str> = Arc::from(user_id);

        let host = match self
            .start_ingestor(session_id, &user_key, Side::Host, host_port, &decoder)
            .await
        {
            Ok(ingestor) => ingestor,
            Err(e) => {
                ports.release(host_port);
                ports.release(user_port);
                return Err(e);
            }
        };

        let user = match self
            .start_ingestor(session_id, &user_key, Side::User, user_port, &decoder)
            .await
        {
            Ok(ingestor) => ingestor,
            Err(e) => {
                host.close();
                ports.release(host_port);
                ports.release(user_port);
                return Err(e);
            }
        };

        let controller = ClipController::new(
            session_id,
            host_id,
            user_id,
            meeting_id,
            durations,
            self.format,
        );

        Ok(Session {
            id: session_id,
            user_key,
            controller,
            host,
            user,
            close_requested: false,
            writing: false,
        })
    }

    async fn start_ingestor(
        &self,
        session_id: u64,
        user_key: &Arc<str>,
        side: Side,
        port: u16,
        decoder: &DecoderCommand,
    ) -> Result<StreamIngestor, SessionError> {
        let tag = StreamTag {
            session_id,
            user_id: Arc::clone(user_key),
            side,
        };
        let description = sdp::receive_only(self.settings.ports.host(), port, &self.settings.decoder);
        StreamIngestor::start(tag, port, decoder, description, self.tx.clone()).await
    }

    fn start_clip(&mut self, user_id: &str) {
        match self.sessions.get_mut(user_id) {
            Some(session) if session.close_requested => {
                warn!("Clip start for user {} ignored: session closing", user_id);
            }
            Some(session) => {
                session.controller.start();
            }
            None => {
                info!("No session yet for user {}, queueing clip start", user_id);
                self.pending_clip_starts
                    .retain(|_, queued_at| queued_at.elapsed() < QUEUED_CLIP_START_TTL);
                self.pending_clip_starts.insert(user_id.to_string(), Instant::now());
            }
        }
    }

    fn stop_clip(&mut self, user_id: &str) {
        match self.sessions.get_mut(user_id) {
            Some(session) => {
                session.controller.stop(&self.tx);
            }
            None => {
                if self.pending_clip_starts.remove(user_id).is_some() {
                    info!("Dropped queued clip start for user {}", user_id);
                } else {
                    warn!("Clip stop for unknown user {}", user_id);
                }
            }
        }
    }

    /// Request teardown; deferred while a clip is recording, in post-roll or being written.
    fn stop_session(&mut self, user_id: &str) {
        let Some(session) = self.sessions.get_mut(user_id) else {
            self.pending_clip_starts.remove(user_id);
            warn!("Stop requested for unknown user {}", user_id);
            return;
        };

        session.close_requested = true;
        session.controller.stop(&self.tx);

        if session.busy() {
            info!("Session for user {} will close after its clip finalizes", user_id);
        } else {
            self.teardown(user_id, None);
        }
    }

    /// Consume a queued clip start for `user_id` unless it has gone stale.
    fn take_queued_clip_start(&mut self, user_id: &str) -> bool {
        self.pending_clip_starts
            .remove(user_id)
            .is_some_and(|queued_at| queued_at.elapsed() < QUEUED_CLIP_START_TTL)
    }

    fn handle_ingest(&mut self, event: IngestEvent) {
        let tag = event.tag();
        let current = self
            .sessions
            .get(&*tag.user_id)
            .is_some_and(|session| session.id == tag.session_id);
        if !current {
            return;
        }

        match event {
            IngestEvent::Pcm { tag, chunk } => {
                if let Some(session) = self.sessions.get_mut(&*tag.user_id) {
                    session.controller.on_pcm(tag.side, chunk);
                }
            }
            IngestEvent::Failed { tag, reason } => {
                let reason = format!("{} decoder failed: {}", tag.side.as_str(), reason);
                error!("Session for user {} lost audio: {}", tag.user_id, reason);
                self.teardown(&tag.user_id, Some(reason));
            }
        }
    }

    fn handle_post_roll(&mut self, elapsed: PostRollElapsed) {
        let Some(session) = self
            .sessions
            .values_mut()
            .find(|s| s.id == elapsed.session_id)
        else {
            return;
        };
        let Some(clip) = session.controller.post_roll_elapsed(elapsed.seq) else {
            return;
        };

        session.writing = true;
        let session_id = session.id;
        let user_id = session.user_key.to_string();
        let writer = self.settings.writer.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let failure = ClipFailed {
                host_id: clip.host_id.clone(),
                user_id: clip.user_id.clone(),
                meeting_id: clip.meeting_id.clone(),
                reason: String::new(),
            };

            let result = match tokio::task::spawn_blocking(move || writer.write(clip)).await {
                Ok(Ok(finalized)) => Ok(finalized),
                Ok(Err(e)) => Err(ClipFailed {
                    reason: format!("{e:#}"),
                    ..failure
                }),
                Err(e) => Err(ClipFailed {
                    reason: format!("clip writer panicked: {e}"),
                    ..failure
                }),
            };

            let _ = tx.send(RegistryMessage::ClipWritten {
                session_id,
                user_id,
                result,
            });
        });
    }

    fn handle_clip_written(
        &mut self,
        session_id: u64,
        user_id: &str,
        result: Result<FinalizedClip, ClipFailed>,
    ) {
        match result {
            Ok(clip) => {
                info!("Clip {} finalized for user {}", clip.id, user_id);
                self.emit(Event::ClipFinalized(clip));
            }
            Err(failure) => {
                error!("Clip for user {} lost: {}", user_id, failure.reason);
                self.emit(Event::ClipFailed(failure));
            }
        }

        let close_now = match self.sessions.get_mut(user_id) {
            Some(session) if session.id == session_id => {
                session.writing = false;
                session.close_requested && !session.busy()
            }
            _ => false,
        };

        if close_now {
            self.teardown(user_id, None);
        }
    }

    /// Close both ingestors, release both ports and forget the session.
    fn teardown(&mut self, user_id: &str, reason: Option<String>) {
        let Some(mut session) = self.sessions.remove(user_id) else {
            return;
        };

        session.controller.cancel();
        session.host.close();
        session.user.close();
        self.settings.ports.release(session.host.port());
        self.settings.ports.release(session.user.port());

        info!("Session {} for user {} closed", session.id, user_id);
        self.emit(Event::SessionClosed(SessionClosed {
            user_id: user_id.to_string(),
            reason,
        }));
    }

    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            warn!("Event channel closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(program: &str, root: &std::path::Path) -> RegistrySettings {
        let decoder = DecoderConfig {
            program: program.to_string(),
            args: vec!["-c".to_string(), "cat >/dev/null; sleep 30".to_string()],
            ..DecoderConfig::default()
        };
        RegistrySettings {
            ports: PortPool::new("127.0.0.1", 20),
            decoder,
            defaults: RollDurations {
                host_pre_seconds: 1.0,
                user_pre_seconds: 1.0,
                host_post_seconds: 0.05,
                user_post_seconds: 0.05,
            },
            max_roll_seconds: 30.0,
            writer: ClipWriter::new(root),
        }
    }

    fn start_user(user_id: &str) -> Command {
        Command::StartUser {
            host_id: "h1".to_string(),
            user_id: user_id.to_string(),
            meeting_id: "m1".to_string(),
            host_pre_seconds: None,
            user_pre_seconds: None,
            host_post_seconds: None,
            user_post_seconds: None,
        }
    }

    fn start_result(event: Event) -> StartUserResult {
        match event {
            Event::StartUserResult(result) => result,
            other => panic!("expected START_USER_RESULT, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clip_start_before_session_is_queued_then_dropped_by_stop() {
        let dir = tempdir().unwrap();
        let (events, _rx) = mpsc::unbounded_channel();
        let (mut registry, _handle) = SessionRegistry::new(settings("sh", dir.path()), events);

        registry
            .handle(Command::StartClip { user_id: "u1".to_string() }.into())
            .await;
        assert!(registry.pending_clip_starts.contains_key("u1"));

        registry
            .handle(Command::StopClip { user_id: "u1".to_string() }.into())
            .await;
        assert!(registry.pending_clip_starts.is_empty());
    }

    #[tokio::test]
    async fn test_stale_queued_clip_starts_are_pruned() {
        let dir = tempdir().unwrap();
        let (events, _rx) = mpsc::unbounded_channel();
        let (mut registry, _handle) = SessionRegistry::new(settings("sh", dir.path()), events);

        let long_ago = Instant::now()
            .checked_sub(QUEUED_CLIP_START_TTL * 2)
            .unwrap();
        registry.pending_clip_starts.insert("gone".to_string(), long_ago);

        registry
            .handle(Command::StartClip { user_id: "u1".to_string() }.into())
            .await;

        assert!(!registry.pending_clip_starts.contains_key("gone"));
        assert!(registry.pending_clip_starts.contains_key("u1"));

        registry.pending_clip_starts.insert("u2".to_string(), long_ago);
        assert!(!registry.take_queued_clip_start("u2"));
        assert!(registry.take_queued_clip_start("u1"));
    }

    #[tokio::test]
    async fn test_start_user_durations_are_clamped() {
        let dir = tempdir().unwrap();
        let (events, mut rx) = mpsc::unbounded_channel();
        let (mut registry, _handle) = SessionRegistry::new(settings("sh", dir.path()), events);

        registry
            .handle(
                Command::StartUser {
                    host_id: "h1".to_string(),
                    user_id: "u1".to_string(),
                    meeting_id: "m1".to_string(),
                    host_pre_seconds: Some(1e20),
                    user_pre_seconds: Some(-1.0),
                    host_post_seconds: Some(1e300),
                    user_post_seconds: None,
                }
                .into(),
            )
            .await;
        assert!(start_result(rx.try_recv().unwrap()).ok);

        let durations = registry.sessions["u1"].controller.durations();
        assert_eq!(durations.host_pre_seconds, 30.0);
        assert_eq!(durations.user_pre_seconds, 0.0);
        assert_eq!(durations.host_post_seconds, 30.0);
        assert_eq!(durations.user_post_seconds, 0.05);
    }

    #[tokio::test]
    async fn test_restart_of_closing_session_is_refused() {
        let dir = tempdir().unwrap();
        let (events, mut rx) = mpsc::unbounded_channel();
        let (mut registry, _handle) = SessionRegistry::new(settings("sh", dir.path()), events);

        registry.handle(start_user("u1").into()).await;
        assert!(start_result(rx.try_recv().unwrap()).ok);
        registry
            .handle(Command::StartClip { user_id: "u1".to_string() }.into())
            .await;
        registry
            .handle(Command::StopUser { user_id: "u1".to_string() }.into())
            .await;

        registry.handle(start_user("u1").into()).await;
        let result = start_result(rx.try_recv().unwrap());
        assert!(!result.ok);
        assert_eq!(result.reason.as_deref(), Some("session closing"));
        assert!(result.host_port.is_none());
    }

    #[tokio::test]
    async fn test_missing_decoder_fails_start_and_holds_no_ports() {
        let dir = tempdir().unwrap();
        let (events, mut rx) = mpsc::unbounded_channel();
        let settings = settings("cliprec-no-such-decoder", dir.path());
        let ports = settings.ports.clone();
        let (mut registry, _handle) = SessionRegistry::new(settings, events);

        registry.handle(start_user("u1").into()).await;

        let result = start_result(rx.try_recv().unwrap());
        assert!(!result.ok);
        assert_eq!(result.user_id, "u1");
        assert!(result.user_port.is_none());
        assert!(result.reason.unwrap().contains("decoder not available"));
        assert_eq!(ports.reserved_count(), 0);
        assert!(registry.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_start_user_reuses_session() {
        let dir = tempdir().unwrap();
        let (events, mut rx) = mpsc::unbounded_channel();
        let settings = settings("sh", dir.path());
        let ports = settings.ports.clone();
        let (mut registry, _handle) = SessionRegistry::new(settings, events);

        registry.handle(start_user("u1").into()).await;
        let first = start_result(rx.try_recv().unwrap());
        assert!(first.ok);
        assert_ne!(first.host_port, first.user_port);

        registry.handle(start_user("u1").into()).await;
        let second = start_result(rx.try_recv().unwrap());
        assert!(second.ok);
        assert_eq!(second.host_port, first.host_port);
        assert_eq!(second.user_port, first.user_port);
        assert_eq!(registry.sessions.len(), 1);
        assert_eq!(ports.reserved_count(), 2);
    }

    #[tokio::test]
    async fn test_stop_user_when_idle_closes_immediately() {
        let dir = tempdir().unwrap();
        let (events, mut rx) = mpsc::unbounded_channel();
        let settings = settings("sh", dir.path());
        let ports = settings.ports.clone();
        let (mut registry, _handle) = SessionRegistry::new(settings, events);

        registry.handle(start_user("u1").into()).await;
        assert!(start_result(rx.try_recv().unwrap()).ok);

        registry
            .handle(Command::StopUser { user_id: "u1".to_string() }.into())
            .await;

        match rx.try_recv().unwrap() {
            Event::SessionClosed(closed) => {
                assert_eq!(closed.user_id, "u1");
                assert!(closed.reason.is_none());
            }
            other => panic!("expected SESSION_CLOSED, got {:?}", other),
        }
        assert!(registry.sessions.is_empty());
        assert_eq!(ports.reserved_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_user_while_recording_is_deferred() {
        let dir = tempdir().unwrap();
        let (events, mut rx) = mpsc::unbounded_channel();
        let (mut registry, _handle) = SessionRegistry::new(settings("sh", dir.path()), events);

        registry.handle(start_user("u1").into()).await;
        assert!(start_result(rx.try_recv().unwrap()).ok);
        registry
            .handle(Command::StartClip { user_id: "u1".to_string() }.into())
            .await;
        registry
            .handle(Command::StopUser { user_id: "u1".to_string() }.into())
            .await;

        let session = &registry.sessions["u1"];
        assert!(session.close_requested);
        assert_eq!(session.controller.phase(), crate::clip::ClipPhase::Stopping);
        assert!(rx.try_recv().is_err());

        // further clip starts are refused while closing
        registry
            .handle(Command::StartClip { user_id: "u1".to_string() }.into())
            .await;
        assert_eq!(registry.sessions["u1"].controller.seq(), 1);
    }

    #[tokio::test]
    async fn test_stale_ingest_events_are_ignored() {
        let dir = tempdir().unwrap();
        let (events, mut rx) = mpsc::unbounded_channel();
        let (mut registry, _handle) = SessionRegistry::new(settings("sh", dir.path()), events);

        registry.handle(start_user("u1").into()).await;
        assert!(start_result(rx.try_recv().unwrap()).ok);

        let stale = StreamTag {
            session_id: 999,
            user_id: Arc::from("u1"),
            side: Side::User,
        };
        registry
            .handle(
                IngestEvent::Failed {
                    tag: stale,
                    reason: "old".to_string(),
                }
                .into(),
            )
            .await;

        assert_eq!(registry.sessions.len(), 1);
        assert!(rx.try_recv().is_err());
    }
}
