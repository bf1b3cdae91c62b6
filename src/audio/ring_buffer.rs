//! Fixed-duration pre-roll store for one stream.
//!
//! Always warm: every decoded chunk is pushed here whether or not a clip is
//! recording, so a new clip can be seeded with the audio that preceded it.

use std::collections::VecDeque;

/// FIFO of raw PCM bytes bounded by `capacity`; the oldest bytes are evicted first.
#[derive(Debug)]
pub struct PreRollBuffer {
    data: VecDeque<u8>,
    capacity: usize,
}

impl PreRollBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::new(),
            capacity,
        }
    }

    /// Append `chunk`, then trim from the front until the buffer fits its capacity.
    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.capacity {
            self.data.clear();
            self.data.extend(&chunk[chunk.len() - self.capacity..]);
            return;
        }

        self.data.extend(chunk);
        let overflow = self.data.len().saturating_sub(self.capacity);
        if overflow > 0 {
            self.data.drain(..overflow);
        }
    }

    /// Owned copy of the current contents, independent of later pushes.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_capacity() {
        let mut buffer = PreRollBuffer::new(8);
        buffer.push(&[1, 2, 3]);
        buffer.push(&[4]);
        assert_eq!(buffer.snapshot(), vec![1, 2, 3, 4]);
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let mut buffer = PreRollBuffer::new(usize::MAX);
        assert_eq!(buffer.capacity(), usize::MAX);
        buffer.push(&[9; 16]);
        assert_eq!(buffer.snapshot(), vec![9; 16]);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut buffer = PreRollBuffer::new(4);
        buffer.push(&[1, 2, 3]);
        buffer.push(&[4, 5, 6]);
        assert_eq!(buffer.snapshot(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_chunk_larger_than_capacity_keeps_suffix() {
        let mut buffer = PreRollBuffer::new(3);
        buffer.push(&[9]);
        buffer.push(&[1, 2, 3, 4, 5]);
        assert_eq!(buffer.snapshot(), vec![3, 4, 5]);
    }

    #[test]
    fn test_contents_are_suffix_of_pushed_stream() {
        let mut buffer = PreRollBuffer::new(10);
        let mut stream = Vec::new();
        for i in 0u8..40 {
            let chunk: Vec<u8> = (0..(i % 7)).map(|j| i.wrapping_mul(31).wrapping_add(j)).collect();
            stream.extend_from_slice(&chunk);
            buffer.push(&chunk);

            assert!(buffer.len() <= buffer.capacity());
            let expected_len = stream.len().min(10);
            assert_eq!(buffer.snapshot(), stream[stream.len() - expected_len..].to_vec());
        }
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut buffer = PreRollBuffer::new(4);
        buffer.push(&[1, 2]);
        let snapshot = buffer.snapshot();
        buffer.push(&[3, 4, 5]);
        buffer.clear();
        assert_eq!(snapshot, vec![1, 2]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = PreRollBuffer::new(4);
        buffer.push(&[1, 2, 3]);
        buffer.clear();
        assert!(buffer.is_empty());
        buffer.push(&[7]);
        assert_eq!(buffer.snapshot(), vec![7]);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut buffer = PreRollBuffer::new(0);
        buffer.push(&[1, 2, 3]);
        assert!(buffer.is_empty());
    }
}
