//! Audio mixer for combining the host and user legs of a clip.
//!
//! Pure functions (no state, no side effects) — easy to test.

use super::format::BYTES_PER_SAMPLE;

/// Additive mixer over raw signed 16-bit little-endian PCM.
///
/// Handles:
/// - Different-length inputs by treating the missing tail of the shorter one as silence
/// - Overflow by hard clipping to the i16 range (no normalization, no soft limiting)
///
/// Both legs are aligned by byte offset only. If the two RTP streams see
/// different jitter the mix drifts; timestamps are not reconciled.
pub struct AudioMixer;

impl AudioMixer {
    /// Mix two PCM byte buffers sample by sample.
    ///
    /// The output covers every whole sample of the longer input. A dangling
    /// odd byte at the end of an input is ignored.
    pub fn mix(a: &[u8], b: &[u8]) -> Vec<u8> {
        let longest = a.len().max(b.len());
        let out_len = longest - longest % BYTES_PER_SAMPLE;
        let mut mixed = vec![0u8; out_len];

        for i in (0..out_len).step_by(BYTES_PER_SAMPLE) {
            let sum = Self::sample_at(a, i) as i32 + Self::sample_at(b, i) as i32;
            let clamped = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            mixed[i..i + BYTES_PER_SAMPLE].copy_from_slice(&clamped.to_le_bytes());
        }

        mixed
    }

    /// Concatenate captured chunks in arrival order.
    pub fn concat(chunks: &[Vec<u8>]) -> Vec<u8> {
        let total = chunks.iter().map(Vec::len).sum();
        let mut joined = Vec::with_capacity(total);
        for chunk in chunks {
            joined.extend_from_slice(chunk);
        }
        joined
    }

    /// Decode little-endian bytes into samples for the WAV writer.
    pub fn to_samples(pcm: &[u8]) -> Vec<i16> {
        pcm.chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    fn sample_at(buf: &[u8], offset: usize) -> i16 {
        match buf.get(offset..offset + BYTES_PER_SAMPLE) {
            Some(pair) => i16::from_le_bytes([pair[0], pair[1]]),
            None => 0,
        }
    }
}
