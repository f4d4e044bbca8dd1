use std::time::Duration;

use serde::Deserialize;

use crate::ramht::ENTRY_BYTES;

/// Where the PFIFO tables live in instance memory.
///
/// These come from the instance-memory allocator at device bring-up; the defaults match the
/// classic NV04 PRAMIN layout (RAMHT at 0x10000, RAMRO at 0x11200, RAMFC at 0x11400).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InstanceLayout {
    pub ramht_addr: u32,
    /// log2 of the number of RAMHT entries (each entry is 8 bytes). At least 9.
    pub ramht_bits: u32,
    pub ramro_addr: u32,
    pub ramfc_addr: u32,
}

impl Default for InstanceLayout {
    fn default() -> Self {
        Self {
            ramht_addr: 0x0001_0000,
            ramht_bits: 9,
            ramro_addr: 0x0001_1200,
            ramfc_addr: 0x0001_1400,
        }
    }
}

impl InstanceLayout {
    /// Bytes spanned by the RAMHT, or `None` if `ramht_bits` is too large to address.
    pub fn ramht_size(&self) -> Option<u32> {
        1u32.checked_shl(self.ramht_bits)?.checked_mul(ENTRY_BYTES)
    }
}

/// Runtime tunables for a [`crate::Fifo`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FifoConfig {
    /// Upper bound on the pause poll waiting for the puller to finish a hash lookup.
    pub pause_timeout_ms: u64,
    /// Set `DMA_FETCH.BIG_ENDIAN` in new channel contexts.
    pub big_endian: bool,
    pub instance: InstanceLayout,
    /// VRAM size in bytes; used by NV40 parts that place RAMFC relative to the top of VRAM.
    pub vram_size: u64,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            pause_timeout_ms: 2000,
            big_endian: cfg!(target_endian = "big"),
            instance: InstanceLayout::default(),
            vram_size: 64 << 20,
        }
    }
}

impl FifoConfig {
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn pause_timeout(&self) -> Duration {
        Duration::from_millis(self.pause_timeout_ms)
    }
}
