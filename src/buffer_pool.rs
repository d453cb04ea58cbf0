//! Buffer pool (component C): a process-wide free-list of fixed 512 KiB
//! byte buffers reused by copy loops. Backed by a `crossbeam-channel`, the
//! same primitive the donor uses for its worker token buckets — here the
//! channel itself doubles as the free-list storage.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

pub const BUFFER_SIZE: usize = 512 * 1024;

pub struct BufferPool {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    buffer_size: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_size(BUFFER_SIZE)
    }

    /// Same as `new()` but with an overridden buffer size (§10.3
    /// `buffer_size`).
    pub fn with_size(buffer_size: usize) -> Self {
        // Unbounded: the pool never blocks a check-in, matching "the pool is
        // unbounded; reclamation is the runtime's responsibility" (§4.C).
        let (tx, rx) = crossbeam_channel::unbounded();
        BufferPool { tx, rx, buffer_size }
    }

    /// Checkout a buffer, allocating a fresh one if the pool is empty.
    pub fn checkout(&self) -> Vec<u8> {
        match self.rx.try_recv() {
            Ok(mut buf) => {
                buf.clear();
                buf.resize(self.buffer_size, 0);
                buf
            }
            // Disconnected is unreachable (this struct holds both ends) but
            // a defensive allocation path covers it anyway (§4.C).
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => vec![0u8; self.buffer_size],
        }
    }

    /// Check in a buffer for reuse.
    pub fn checkin(&self, buf: Vec<u8>) {
        let _ = self.tx.send(buf);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
