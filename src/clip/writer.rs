//! Persists a finished clip as a WAV file plus a JSON metadata sidecar.
//!
//! Layout: `<root>/<hostId>/<userId>/<YYYY-MM-DD>/<HHMMSS>_<seq>.wav` with the
//! sidecar next to it under the same stem.

use crate::audio::{AudioMixer, PcmFormat};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use hound::{WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Captured audio and identity of one clip, detached from its controller.
#[derive(Debug, Clone)]
pub struct ClipRecording {
    pub id: String,
    pub seq: u64,
    pub host_id: String,
    pub user_id: String,
    pub meeting_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub format: PcmFormat,
    pub host_pcm: Vec<u8>,
    pub user_pcm: Vec<u8>,
}

/// Sidecar contents; also the payload reported once a clip is on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedClip {
    pub id: String,
    pub host_id: String,
    pub user_id: String,
    pub meeting_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub seq: u64,
    pub duration_ms: u64,
    pub file_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ClipWriter {
    root: PathBuf,
}

impl ClipWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Audio path for a clip; the sidecar uses the same stem with `.json`.
    pub fn audio_path(&self, clip: &ClipRecording) -> PathBuf {
        let started = clip.started_at.with_timezone(&Local);
        self.root
            .join(sanitize(&clip.host_id))
            .join(sanitize(&clip.user_id))
            .join(started.format("%Y-%m-%d").to_string())
            .join(format!("{}_{}.wav", started.format("%H%M%S"), clip.seq))
    }

    /// Mix both legs, write the WAV and its sidecar.
    pub fn write(&self, clip: ClipRecording) -> Result<FinalizedClip> {
        let path = self.audio_path(&clip);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create clip directory {:?}", parent))?;
        }

        let mixed = AudioMixer::mix(&clip.host_pcm, &clip.user_pcm);
        write_wav(&path, &mixed, clip.format)?;

        let finalized = FinalizedClip {
            id: clip.id,
            host_id: clip.host_id,
            user_id: clip.user_id,
            meeting_id: clip.meeting_id,
            started_at: clip.started_at,
            ended_at: clip.ended_at,
            seq: clip.seq,
            duration_ms: clip.format.duration_of(mixed.len()).as_millis() as u64,
            file_path: path.clone(),
        };

        let sidecar = path.with_extension("json");
        let json = serde_json::to_string_pretty(&finalized).context("Failed to serialize clip metadata")?;
        std::fs::write(&sidecar, json)
            .with_context(|| format!("Failed to write clip metadata {:?}", sidecar))?;

        info!(
            "Clip {} saved: {:?} ({} ms)",
            finalized.id, path, finalized.duration_ms
        );
        Ok(finalized)
    }
}

fn write_wav(path: &Path, pcm: &[u8], format: PcmFormat) -> Result<()> {
    let spec = WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut samples = AudioMixer::to_samples(pcm);
    // hound rejects a trailing partial frame
    let whole = samples.len() - samples.len() % format.channels.max(1) as usize;
    samples.truncate(whole);

    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("Failed to create {:?}", path))?;
    for sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Keep id path segments to `[A-Za-z0-9_-]`.
fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn recording(seq: u64, host_pcm: Vec<u8>, user_pcm: Vec<u8>) -> ClipRecording {
        ClipRecording {
            id: "clip-1".to_string(),
            seq,
            host_id: "host".to_string(),
            user_id: "user/../1".to_string(),
            meeting_id: "m1".to_string(),
            started_at: Utc.with_ymd_and_hms(2026, 3, 4, 10, 11, 12).unwrap(),
            ended_at: Utc.with_ymd_and_hms(2026, 3, 4, 10, 11, 20).unwrap(),
            format: PcmFormat::default(),
            host_pcm,
            user_pcm,
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("abc-1_2"), "abc-1_2");
        assert_eq!(sanitize("a/b c"), "a_b_c");
        assert_eq!(sanitize(""), "_");
    }

    #[test]
    fn test_audio_path_layout() {
        let writer = ClipWriter::new("/clips");
        let clip = recording(7, Vec::new(), Vec::new());
        let path = writer.audio_path(&clip);
        let local = clip.started_at.with_timezone(&Local);

        let expected = PathBuf::from("/clips")
            .join("host")
            .join("user____1")
            .join(local.format("%Y-%m-%d").to_string())
            .join(format!("{}_7.wav", local.format("%H%M%S")));
        assert_eq!(path, expected);
    }

    #[test]
    fn test_write_mixes_and_writes_sidecar() {
        let dir = tempdir().unwrap();
        let writer = ClipWriter::new(dir.path());

        let host: Vec<u8> = [1000i16, 1000, -1000, -1000]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let user: Vec<u8> = [10i16, 20].iter().flat_map(|s| s.to_le_bytes()).collect();

        let finalized = writer.write(recording(3, host, user)).unwrap();
        assert!(finalized.file_path.exists());
        assert_eq!(finalized.seq, 3);

        let mut reader = hound::WavReader::open(&finalized.file_path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 48_000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1010, 1020, -1000, -1000]);

        let sidecar = finalized.file_path.with_extension("json");
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(sidecar).unwrap()).unwrap();
        assert_eq!(parsed["hostId"], "host");
        assert_eq!(parsed["userId"], "user/../1");
        assert_eq!(parsed["meetingId"], "m1");
        assert!(parsed["startedAt"].is_string());
        assert!(parsed["endedAt"].is_string());
    }

    #[test]
    fn test_same_second_clips_do_not_collide() {
        let dir = tempdir().unwrap();
        let writer = ClipWriter::new(dir.path());
        let first = writer.write(recording(1, vec![0; 8], Vec::new())).unwrap();
        let second = writer.write(recording(2, vec![0; 8], Vec::new())).unwrap();
        assert_ne!(first.file_path, second.file_path);
        assert!(first.file_path.exists());
        assert!(second.file_path.exists());
    }

    #[test]
    fn test_write_empty_clip_produces_valid_wav() {
        let dir = tempdir().unwrap();
        let writer = ClipWriter::new(dir.path());
        let finalized = writer.write(recording(1, Vec::new(), Vec::new())).unwrap();
        let reader = hound::WavReader::open(&finalized.file_path).unwrap();
        assert_eq!(reader.len(), 0);
        assert_eq!(finalized.duration_ms, 0);
    }

    #[test]
    fn test_write_failure_is_an_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let writer = ClipWriter::new(&blocker);
        assert!(writer.write(recording(1, vec![0; 4], Vec::new())).is_err());
    }
}
