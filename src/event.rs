use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Device-wide FIFO event ("uevent").
///
/// Fired from the interrupt handler when the hardware raises its non-stall event bit. Higher
/// layers use it for fencing: remember [`FifoEvent::sequence`], submit work, then wait for the
/// sequence to move.
#[derive(Debug, Default)]
pub struct FifoEvent {
    seq: Mutex<u64>,
    cond: Condvar,
}

impl FifoEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence(&self) -> u64 {
        *self.seq.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn notify(&self) {
        let mut seq = self.seq.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *seq = seq.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Blocks until the sequence differs from `seen` or `timeout` elapses.
    ///
    /// Returns the new sequence, or `None` on timeout. A timeout too large to represent as an
    /// `Instant` waits without a deadline.
    pub fn wait_timeout(&self, seen: u64, timeout: Duration) -> Option<u64> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait(seen));
        };
        let mut seq = self.seq.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while *seq == seen {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, _) = self
                .cond
                .wait_timeout(seq, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            seq = guard;
        }
        Some(*seq)
    }

    /// Blocks until the sequence differs from `seen`.
    pub fn wait(&self, seen: u64) -> u64 {
        let mut seq = self.seq.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while *seq == seen {
            seq = self
                .cond
                .wait(seq)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *seq
    }
}
