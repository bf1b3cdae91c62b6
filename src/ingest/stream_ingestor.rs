//! One inbound RTP stream decoded to raw PCM by an owned child process.
//!
//! Lifecycle: spawn decoder → write SDP to stdin and close it → pump stdout
//! into [`IngestEvent::Pcm`] messages → terminate on `close()` or on decoder
//! death. Every exit path of the decoder goes through the pump task, and an
//! exit that was not requested surfaces as exactly one [`IngestEvent::Failed`].

use super::decoder::DecoderCommand;
use super::{IngestEvent, StreamTag};
use crate::session::SessionError;
use serde::Serialize;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on a single stdout read.
const READ_CHUNK: usize = 8192;

/// Running totals for one ingestor, readable from any thread.
#[derive(Debug, Default)]
pub struct IngestStats {
    packets: AtomicU64,
    bytes: AtomicU64,
    closed: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    pub packets: u64,
    pub bytes: u64,
    pub closed: bool,
}

impl IngestStats {
    fn record(&self, bytes: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn mark_closed(&self) -> bool {
        self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Acquire),
        }
    }
}

pub struct StreamIngestor {
    port: u16,
    label: String,
    stats: Arc<IngestStats>,
    cancel: CancellationToken,
}

impl StreamIngestor {
    /// Spawn the decoder for `port` and start forwarding its PCM output.
    ///
    /// `sdp` is written to the decoder's stdin, which is then closed.
    pub async fn start<M>(
        tag: StreamTag,
        port: u16,
        decoder: &DecoderCommand,
        sdp: String,
        events: mpsc::UnboundedSender<M>,
    ) -> Result<Self, SessionError>
    where
        M: From<IngestEvent> + Send + 'static,
    {
        let label = format!("{}/{}:{}", tag.user_id, tag.side.as_str(), port);

        let mut child = Command::new(&decoder.program)
            .args(&decoder.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SessionError::DecoderSpawn {
                label: label.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let written = async {
                stdin.write_all(sdp.as_bytes()).await?;
                stdin.shutdown().await
            }
            .await;
            if let Err(source) = written {
                let _ = child.start_kill();
                return Err(SessionError::DecoderInput { label, source });
            }
            // stdin dropped here: end of configuration input
        }

        let stdout = child.stdout.take().ok_or_else(|| SessionError::DecoderInput {
            label: label.clone(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "decoder stdout missing"),
        })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(label.clone(), stderr));
        }

        // a decoder that cannot open its port dies right away
        tokio::select! {
            status = child.wait() => {
                let reason = match status {
                    Ok(status) => status.to_string(),
                    Err(e) => e.to_string(),
                };
                return Err(SessionError::DecoderExited { label, reason });
            }
            _ = tokio::time::sleep(decoder.startup_grace) => {}
        }

        let stats = Arc::new(IngestStats::default());
        let cancel = CancellationToken::new();

        tokio::spawn(pump(
            child,
            stdout,
            tag,
            label.clone(),
            Arc::clone(&stats),
            cancel.clone(),
            events,
        ));

        info!("Ingestor {} started ({:?})", label, decoder.program);

        Ok(Self {
            port,
            label,
            stats,
            cancel,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.stats.snapshot().closed
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop emitting PCM and terminate the decoder. Safe to call repeatedly.
    pub fn close(&self) {
        if !self.stats.mark_closed() {
            debug!("Closing ingestor {}", self.label);
        }
        self.cancel.cancel();
    }
}

impl Drop for StreamIngestor {
    fn drop(&mut self) {
        self.close();
    }
}

async fn pump<M>(
    mut child: Child,
    mut stdout: ChildStdout,
    tag: StreamTag,
    label: String,
    stats: Arc<IngestStats>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<M>,
) where
    M: From<IngestEvent> + Send + 'static,
{
    let mut buf = vec![0u8; READ_CHUNK];

    let failure = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break None,
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break Some(describe_exit(&mut child).await),
                Ok(n) => {
                    if cancel.is_cancelled() {
                        break None;
                    }
                    stats.record(n);
                    let event = IngestEvent::Pcm {
                        tag: tag.clone(),
                        chunk: buf[..n].to_vec(),
                    };
                    if events.send(M::from(event)).is_err() {
                        debug!("Ingestor {} has no listener, stopping", label);
                        break None;
                    }
                }
                Err(e) => break Some(format!("decoder output error: {e}")),
            },
        }
    };

    let already_closed = stats.mark_closed();
    terminate(&mut child, &label).await;

    if let Some(reason) = failure {
        if already_closed || cancel.is_cancelled() {
            debug!("Ingestor {} ended after close: {}", label, reason);
            return;
        }
        error!("Ingestor {} failed: {}", label, reason);
        let _ = events.send(M::from(IngestEvent::Failed { tag, reason }));
    }
}

async fn describe_exit(child: &mut Child) -> String {
    match child.wait().await {
        Ok(status) => format!("decoder exited unexpectedly ({status})"),
        Err(e) => format!("decoder exited unexpectedly ({e})"),
    }
}

async fn terminate(child: &mut Child, label: &str) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    if let Err(e) = child.start_kill() {
        warn!("Failed to kill decoder for {}: {}", label, e);
        return;
    }
    let _ = child.wait().await;
    debug!("Decoder for {} terminated", label);
}

async fn forward_stderr(label: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            debug!("[{}] {}", label, line.trim());
        }
    }
}
