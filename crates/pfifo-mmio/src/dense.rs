use std::sync::{Arc, Mutex, MutexGuard};

use crate::InstanceMemory;

/// Byte-backed [`InstanceMemory`], zero-initialised.
///
/// Clones share the same backing store. Words are little-endian, matching how the GPU sees
/// instance memory through PRAMIN.
#[derive(Clone, Debug)]
pub struct DenseInstanceMemory {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl DenseInstanceMemory {
    pub fn new(size: u32) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(vec![0; size as usize])),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads a word without requiring a mutable handle.
    pub fn peek(&self, offset: u32) -> u32 {
        let bytes = self.lock();
        let start = offset as usize;
        match bytes.get(start..start + 4) {
            Some(word) => u32::from_le_bytes([word[0], word[1], word[2], word[3]]),
            None => u32::MAX,
        }
    }

    /// Writes a word without requiring a mutable handle.
    pub fn poke(&self, offset: u32, value: u32) {
        let mut bytes = self.lock();
        let start = offset as usize;
        if let Some(word) = bytes.get_mut(start..start + 4) {
            word.copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Copies out `len` bytes starting at `offset`, clamped to the backing size.
    pub fn snapshot(&self, offset: u32, len: u32) -> Vec<u8> {
        let bytes = self.lock();
        let start = (offset as usize).min(bytes.len());
        let end = start.saturating_add(len as usize).min(bytes.len());
        bytes[start..end].to_vec()
    }
}

impl InstanceMemory for DenseInstanceMemory {
    fn size(&self) -> u32 {
        u32::try_from(self.lock().len()).unwrap_or(u32::MAX)
    }

    fn ro32(&mut self, offset: u32) -> u32 {
        self.peek(offset)
    }

    fn wo32(&mut self, offset: u32, value: u32) {
        self.poke(offset, value)
    }
}
