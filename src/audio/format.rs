//! PCM layout shared by the decoder output, the pre-roll buffers and the WAV writer.

use std::time::Duration;

/// Bytes per 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Interleaved signed 16-bit little-endian PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Size of one frame (one sample per channel) in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Number of bytes holding `seconds` of audio, rounded down to a whole frame.
    ///
    /// Negative and non-finite durations yield zero.
    pub fn bytes_for_seconds(&self, seconds: f64) -> usize {
        let frame = self.frame_bytes();
        if !seconds.is_finite() || seconds <= 0.0 || frame == 0 {
            return 0;
        }
        // float-to-int `as` saturates, so only the multiply needs a bound
        let frames = (seconds * self.sample_rate as f64).floor() as usize;
        frames.min(usize::MAX / frame) * frame
    }

    /// Playback duration of `bytes` of audio in this format.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let per_second = self.sample_rate as u64 * self.frame_bytes() as u64;
        if per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(bytes as u64 * 1000 / per_second)
    }
}
