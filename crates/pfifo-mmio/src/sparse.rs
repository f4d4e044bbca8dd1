use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::RegisterBus;

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<u32, u32>,
    write_one_to_clear: HashSet<u32>,
    writes: Vec<(u32, u32)>,
}

/// Sparse register file backing for [`RegisterBus`].
///
/// Unwritten registers read as zero. Registers listed with
/// [`SparseRegisters::with_write_one_to_clear`] behave like interrupt status registers: writing a
/// 1 bit clears it, writing 0 leaves it untouched.
///
/// Clones share the same register file. Every bus write is appended to a log so callers can check
/// ordering (e.g. "PUSH0 was toggled off then on").
#[derive(Clone, Debug, Default)]
pub struct SparseRegisters {
    inner: Arc<Mutex<Inner>>,
}

impl SparseRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_one_to_clear(addrs: &[u32]) -> Self {
        let regs = Self::default();
        regs.lock().write_one_to_clear.extend(addrs.iter().copied());
        regs
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads a register without going through bus semantics or the write log.
    pub fn get(&self, addr: u32) -> u32 {
        self.lock().values.get(&addr).copied().unwrap_or(0)
    }

    /// Stores a raw value, bypassing write-one-to-clear handling and the write log.
    ///
    /// This is how hardware-owned state (status bits, the active channel id) gets injected.
    pub fn set(&self, addr: u32, value: u32) {
        self.lock().values.insert(addr, value);
    }

    /// ORs `bits` into a register as hardware would when raising a status bit.
    pub fn raise(&self, addr: u32, bits: u32) {
        let mut inner = self.lock();
        *inner.values.entry(addr).or_insert(0) |= bits;
    }

    /// Returns and clears the bus write log.
    pub fn take_writes(&self) -> Vec<(u32, u32)> {
        std::mem::take(&mut self.lock().writes)
    }

    /// Bus writes to `addr` recorded since the log was last taken, oldest first.
    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.lock()
            .writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl RegisterBus for SparseRegisters {
    fn rd32(&mut self, addr: u32) -> u32 {
        self.get(addr)
    }

    fn wr32(&mut self, addr: u32, value: u32) {
        let mut inner = self.lock();
        inner.writes.push((addr, value));
        if inner.write_one_to_clear.contains(&addr) {
            if let Some(cur) = inner.values.get_mut(&addr) {
                *cur &= !value;
            }
        } else {
            inner.values.insert(addr, value);
        }
    }
}
