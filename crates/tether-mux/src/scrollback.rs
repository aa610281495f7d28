//! Bounded, ordered output history for replay on reconnect.

use std::collections::VecDeque;
use std::sync::Arc;

/// Default cap: 100 KiB.
pub const DEFAULT_SCROLLBACK_CAP: usize = 100 * 1024;

/// Chunks of session output, evicted from the front once the total size
/// passes the cap.
///
/// Chunks are never split, and the newest chunk is always kept, so the
/// total can exceed the cap by at most the length of that chunk.
#[derive(Debug, Clone)]
pub struct ScrollbackBuffer {
    chunks: VecDeque<Arc<[u8]>>,
    size: usize,
    cap: usize,
}

impl ScrollbackBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            size: 0,
            cap,
        }
    }

    pub fn append(&mut self, chunk: Arc<[u8]>) {
        self.size += chunk.len();
        self.chunks.push_back(chunk);
        while self.size > self.cap && self.chunks.len() > 1 {
            if let Some(evicted) = self.chunks.pop_front() {
                self.size -= evicted.len();
            }
        }
    }

    /// All retained chunks, concatenated in append order.
    pub fn snapshot(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Total retained bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl Default for ScrollbackBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLLBACK_CAP)
    }
}
