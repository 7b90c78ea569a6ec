use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::dns::codec::MAX_MESSAGE_SIZE;

/// Reusable scratch buffers for reading DNS replies.
///
/// Buffers go back to the pool when the [`PooledBuffer`] guard drops, on
/// every exit path.
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    buffer_size: usize,
    max_idle: usize,
    total_acquired: AtomicU64,
    total_released: AtomicU64,
    total_created: AtomicU64,
}

impl BufferPool {
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            buffer_size,
            max_idle,
            total_acquired: AtomicU64::new(0),
            total_released: AtomicU64::new(0),
            total_created: AtomicU64::new(0),
        }
    }

    pub fn acquire(&self) -> PooledBuffer<'_> {
        let reused = self.free.lock().ok().and_then(|mut free| free.pop());
        let buffer = match reused {
            Some(buffer) => buffer,
            None => {
                self.total_created.fetch_add(1, Ordering::Relaxed);
                vec![0u8; self.buffer_size]
            }
        };
        self.total_acquired.fetch_add(1, Ordering::Relaxed);

        PooledBuffer {
            buffer: Some(buffer),
            pool: self,
        }
    }

    fn release(&self, mut buffer: Vec<u8>) {
        self.total_released.fetch_add(1, Ordering::Relaxed);
        buffer.resize(self.buffer_size, 0);

        if let Ok(mut free) = self.free.lock() {
            if free.len() < self.max_idle {
                free.push(buffer);
            } else {
                debug!(idle = free.len(), "Buffer pool full, dropping buffer");
            }
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            acquired: self.total_acquired.load(Ordering::Relaxed),
            released: self.total_released.load(Ordering::Relaxed),
            created: self.total_created.load(Ordering::Relaxed),
            idle: self.free.lock().map(|free| free.len()).unwrap_or(0),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE, 16)
    }
}

/// Buffer borrowed from a [`BufferPool`].
pub struct PooledBuffer<'a> {
    buffer: Option<Vec<u8>>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buffer.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub acquired: u64,
    pub released: u64,
    pub created: u64,
    pub idle: usize,
}

impl BufferPoolStats {
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}
