//! Per-user clip state machine.
//!
//! idle → recording (`start`) → stopping (`stop`, post-roll timer armed)
//! → finalized (timer fired, clip taken for writing) → ready for the next `start`.
//!
//! Both pre-roll buffers are fed on every chunk so they are warm whenever a
//! clip begins. While recording, chunks are also appended to the capture
//! lists; nothing bounds those lists until `stop`.

use super::writer::ClipRecording;
use crate::audio::{AudioMixer, PcmFormat, PreRollBuffer};
use crate::ingest::Side;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pre-roll and post-roll lengths in seconds, per leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollDurations {
    pub host_pre_seconds: f64,
    pub user_pre_seconds: f64,
    pub host_post_seconds: f64,
    pub user_post_seconds: f64,
}

impl RollDurations {
    /// The post-roll delay: the longer of the two legs.
    pub fn post_roll(&self) -> Duration {
        let seconds = self.host_post_seconds.max(self.user_post_seconds);
        if seconds.is_finite() && seconds > 0.0 {
            Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    /// Every field forced into `[0, max_seconds]`; NaN becomes 0.
    pub fn clamped(self, max_seconds: f64) -> Self {
        let max_seconds = if max_seconds.is_finite() { max_seconds.max(0.0) } else { 0.0 };
        let clamp = |seconds: f64| {
            if seconds.is_nan() {
                0.0
            } else {
                seconds.clamp(0.0, max_seconds)
            }
        };
        Self {
            host_pre_seconds: clamp(self.host_pre_seconds),
            user_pre_seconds: clamp(self.user_pre_seconds),
            host_post_seconds: clamp(self.host_post_seconds),
            user_post_seconds: clamp(self.user_post_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipPhase {
    Idle,
    Recording,
    Stopping,
}

/// Fired by the post-roll timer of clip `seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostRollElapsed {
    pub session_id: u64,
    pub seq: u64,
}

struct PendingStop {
    seq: u64,
    cancel: CancellationToken,
}

pub struct ClipController {
    session_id: u64,
    host_id: String,
    user_id: String,
    meeting_id: String,
    durations: RollDurations,
    format: PcmFormat,
    seq: u64,
    recording: bool,
    finalized: bool,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    host_frames: Vec<Vec<u8>>,
    user_frames: Vec<Vec<u8>>,
    host_ring: PreRollBuffer,
    user_ring: PreRollBuffer,
    pending_stop: Option<PendingStop>,
}

impl ClipController {
    pub fn new(
        session_id: u64,
        host_id: impl Into<String>,
        user_id: impl Into<String>,
        meeting_id: impl Into<String>,
        durations: RollDurations,
        format: PcmFormat,
    ) -> Self {
        Self {
            session_id,
            host_id: host_id.into(),
            user_id: user_id.into(),
            meeting_id: meeting_id.into(),
            host_ring: PreRollBuffer::new(format.bytes_for_seconds(durations.host_pre_seconds)),
            user_ring: PreRollBuffer::new(format.bytes_for_seconds(durations.user_pre_seconds)),
            durations,
            format,
            seq: 0,
            recording: false,
            finalized: false,
            started_at: None,
            ended_at: None,
            host_frames: Vec::new(),
            user_frames: Vec::new(),
            pending_stop: None,
        }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn durations(&self) -> RollDurations {
        self.durations
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn phase(&self) -> ClipPhase {
        if self.pending_stop.is_some() {
            ClipPhase::Stopping
        } else if self.recording {
            ClipPhase::Recording
        } else {
            ClipPhase::Idle
        }
    }

    /// A clip is recording or waiting out its post-roll.
    pub fn in_flight(&self) -> bool {
        self.recording || self.pending_stop.is_some()
    }

    pub fn on_host_pcm(&mut self, chunk: Vec<u8>) {
        self.on_pcm(Side::Host, chunk);
    }

    pub fn on_user_pcm(&mut self, chunk: Vec<u8>) {
        self.on_pcm(Side::User, chunk);
    }

    pub fn on_pcm(&mut self, side: Side, chunk: Vec<u8>) {
        let (ring, frames) = match side {
            Side::Host => (&mut self.host_ring, &mut self.host_frames),
            Side::User => (&mut self.user_ring, &mut self.user_frames),
        };
        ring.push(&chunk);
        if self.recording {
            frames.push(chunk);
        }
    }

    /// Begin a clip seeded with the current pre-roll. Returns `false` when a
    /// clip is already in flight, which is left untouched.
    pub fn start(&mut self) -> bool {
        if self.in_flight() {
            warn!(
                "Clip start for user {} ignored: clip {} still {:?}",
                self.user_id,
                self.seq,
                self.phase()
            );
            return false;
        }

        self.seq += 1;
        self.recording = true;
        self.finalized = false;
        self.started_at = Some(Utc::now());
        self.ended_at = None;
        self.host_frames = seed(&self.host_ring);
        self.user_frames = seed(&self.user_ring);

        info!(
            "Clip {} started for user {} (pre-roll host={}B user={}B)",
            self.seq,
            self.user_id,
            self.host_ring.len(),
            self.user_ring.len()
        );
        true
    }

    /// Arm the post-roll timer; `PostRollElapsed` is sent on `timers` when it fires.
    ///
    /// No-op when finalized, idle, or already stopping. Returns whether a timer was armed.
    pub fn stop<M>(&mut self, timers: &mpsc::UnboundedSender<M>) -> bool
    where
        M: From<PostRollElapsed> + Send + 'static,
    {
        if self.finalized || !self.recording {
            debug!("Clip stop for user {} ignored: nothing recording", self.user_id);
            return false;
        }
        if self.pending_stop.is_some() {
            debug!("Clip stop for user {} ignored: post-roll already pending", self.user_id);
            return false;
        }

        let delay = self.durations.post_roll();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = timers.clone();
        let elapsed = PostRollElapsed {
            session_id: self.session_id,
            seq: self.seq,
        };

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(M::from(elapsed));
                }
            }
        });

        self.pending_stop = Some(PendingStop {
            seq: self.seq,
            cancel,
        });

        info!(
            "Clip {} for user {} stopping, post-roll {:?}",
            self.seq, self.user_id, delay
        );
        true
    }

    /// The post-roll timer for `seq` fired: end recording and take the clip for writing.
    pub fn post_roll_elapsed(&mut self, seq: u64) -> Option<ClipRecording> {
        match &self.pending_stop {
            Some(pending) if pending.seq == seq => {}
            _ => {
                debug!("Stale post-roll timer {} for user {}", seq, self.user_id);
                return None;
            }
        }

        self.pending_stop = None;
        self.recording = false;
        self.ended_at = Some(Utc::now());
        self.write()
    }

    /// Detach the captured clip and reset for reuse. At most once per `start`.
    fn write(&mut self) -> Option<ClipRecording> {
        if self.finalized {
            return None;
        }
        let started_at = self.started_at?;
        let ended_at = self.ended_at.unwrap_or_else(Utc::now);

        let clip = ClipRecording {
            id: uuid::Uuid::new_v4().to_string(),
            seq: self.seq,
            host_id: self.host_id.clone(),
            user_id: self.user_id.clone(),
            meeting_id: self.meeting_id.clone(),
            started_at,
            ended_at,
            format: self.format,
            host_pcm: AudioMixer::concat(&self.host_frames),
            user_pcm: AudioMixer::concat(&self.user_frames),
        };

        self.finalized = true;
        self.recording = false;
        self.host_frames.clear();
        self.user_frames.clear();
        self.host_ring.clear();
        self.user_ring.clear();

        Some(clip)
    }

    /// Drop any pending post-roll without writing.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending_stop.take() {
            pending.cancel.cancel();
        }
        self.recording = false;
    }
}

impl Drop for ClipController {
    fn drop(&mut self) {
        if let Some(pending) = self.pending_stop.take() {
            pending.cancel.cancel();
        }
    }
}

fn seed(ring: &PreRollBuffer) -> Vec<Vec<u8>> {
    if ring.is_empty() {
        Vec::new()
    } else {
        vec![ring.snapshot()]
    }
}
