//! Ordered buffer of recorded binary segments.
//!
//! The recorder appends chunks in arrival order; concatenating them in
//! that order reconstructs the recording byte-for-byte. The buffer is
//! cleared on restart and after a successful transcode.

use std::sync::Arc;
use tokio::sync::Mutex;

/// Chunk buffer shared between the recorder's append task and the
/// export path.
pub type SharedChunkBuffer = Arc<Mutex<ChunkBuffer>>;

/// Append-only ordered collection of recorded binary segments.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh buffer in the shared handle used by the pipeline.
    pub fn shared() -> SharedChunkBuffer {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Append a chunk. Zero-length chunks are discarded; they carry no
    /// data and would only add degenerate segments to the sequence.
    pub fn append(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
    }

    /// Discard all buffered chunks.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }

    /// Number of buffered chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total size of the buffered recording in bytes.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Concatenate all chunks, in order, into one binary object.
    ///
    /// This is the sole hand-off artifact for preview playback and
    /// transcoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_bytes);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_bytes_is_in_order_concatenation() {
        let mut buffer = ChunkBuffer::new();
        buffer.append(vec![1, 2]);
        buffer.append(vec![3]);
        buffer.append(vec![4, 5, 6]);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.total_bytes(), 6);
        assert_eq!(buffer.to_bytes(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn empty_chunks_are_discarded() {
        let mut buffer = ChunkBuffer::new();
        buffer.append(vec![]);
        buffer.append(vec![7]);
        buffer.append(vec![]);

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.to_bytes(), vec![7]);
    }

    #[test]
    fn clear_then_to_bytes_is_empty() {
        let mut buffer = ChunkBuffer::new();
        buffer.append(vec![1, 2, 3]);
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.total_bytes(), 0);
        assert!(buffer.to_bytes().is_empty());
    }
}
