//! Per-generation PFIFO configuration.
//!
//! Everything that differs between hardware generations is data: the RAMFC layout, the initial
//! context words, register placement, channel count and a couple of capability flags. The channel,
//! context-swap and interrupt code is written once against [`GenerationConfig`].

use crate::engine::Engines;
use crate::ramfc::{FieldDesc, InitValue, RamfcInit};
use crate::regs;

/// How bring-up tells PFIFO where RAMFC lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RamfcPlacement {
    /// `RAMFC = ramfc_addr >> 8`.
    Nv04,
    /// NV40 parts with a fixed on-chip RAMFC window. `unk2230` is written first when present.
    Nv40Fixed { unk2230: Option<u32> },
    /// NV40 parts that place RAMFC relative to the top of VRAM.
    Nv40VramRelative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationConfig {
    pub name: &'static str,
    /// Number of channel slots; a power of two so that `channels - 1` masks a channel id.
    pub channels: u32,
    /// Bytes per channel in RAMFC.
    pub ramfc_stride: u32,
    pub ramfc: &'static [FieldDesc],
    pub ramfc_init: &'static [RamfcInit],
    /// Engines a channel on this generation may target.
    pub engines: Engines,
    /// Base register of the CACHE1 method/data slot pairs.
    pub cache1_method_base: u32,
    pub ramfc_placement: RamfcPlacement,
    /// Tunables written verbatim at the start of bring-up.
    pub init_writes: &'static [(u32, u32)],
    /// The DMA pusher has NV50-style indirect buffers and high-order address registers.
    ///
    /// NV50-class hardware only. The NV04/NV40 presets and every [`GenerationConfig::for_chipset`]
    /// result leave it clear; set it on a hand-built configuration.
    pub indirect_buffer: bool,
    /// `INTR_0` carries the NV50 display-adjacent and uevent bits.
    ///
    /// NV50-class hardware only. Like `indirect_buffer`, no preset or
    /// [`GenerationConfig::for_chipset`] result sets it.
    pub extended_intr: bool,
}

const NV04_RAMFC: [FieldDesc; 8] = [
    FieldDesc::new(32, 0, 0x00, 0, regs::CACHE1_DMA_PUT),
    FieldDesc::new(32, 0, 0x04, 0, regs::CACHE1_DMA_GET),
    FieldDesc::new(16, 0, 0x08, 0, regs::CACHE1_DMA_INSTANCE),
    FieldDesc::new(16, 16, 0x08, 0, regs::CACHE1_DMA_DCOUNT),
    FieldDesc::new(32, 0, 0x0c, 0, regs::CACHE1_DMA_STATE),
    FieldDesc::new(32, 0, 0x10, 0, regs::CACHE1_DMA_FETCH),
    FieldDesc::new(32, 0, 0x14, 0, regs::CACHE1_ENGINE),
    FieldDesc::new(32, 0, 0x18, 0, regs::CACHE1_PULL1),
];

const NV04_RAMFC_INIT: [RamfcInit; 4] = [
    RamfcInit::new(0x00, InitValue::DmaOffset),
    RamfcInit::new(0x04, InitValue::DmaOffset),
    RamfcInit::new(0x08, InitValue::PushbufInstance),
    RamfcInit::new(0x10, InitValue::Fetch { extra: 0 }),
];

const NV40_RAMFC: [FieldDesc; 22] = [
    FieldDesc::new(32, 0, 0x00, 0, regs::CACHE1_DMA_PUT),
    FieldDesc::new(32, 0, 0x04, 0, regs::CACHE1_DMA_GET),
    FieldDesc::new(32, 0, 0x08, 0, regs::CACHE1_REF_CNT),
    FieldDesc::new(32, 0, 0x0c, 0, regs::CACHE1_DMA_INSTANCE),
    FieldDesc::new(32, 0, 0x10, 0, regs::CACHE1_DMA_DCOUNT),
    FieldDesc::new(32, 0, 0x14, 0, regs::CACHE1_DMA_STATE),
    FieldDesc::new(28, 0, 0x18, 0, regs::CACHE1_DMA_FETCH),
    FieldDesc::new(2, 28, 0x18, 28, regs::NV40_UNK2058),
    FieldDesc::new(32, 0, 0x1c, 0, regs::CACHE1_ENGINE),
    FieldDesc::new(32, 0, 0x20, 0, regs::CACHE1_PULL1),
    FieldDesc::new(32, 0, 0x24, 0, regs::CACHE1_ACQUIRE_VALUE),
    FieldDesc::new(32, 0, 0x28, 0, regs::CACHE1_ACQUIRE_TIMESTAMP),
    FieldDesc::new(32, 0, 0x2c, 0, regs::CACHE1_ACQUIRE_TIMEOUT),
    FieldDesc::new(32, 0, 0x30, 0, regs::CACHE1_SEMAPHORE),
    FieldDesc::new(32, 0, 0x34, 0, regs::CACHE1_DMA_SUBROUTINE),
    FieldDesc::new(32, 0, 0x38, 0, regs::NV40_GRCTX_INSTANCE),
    FieldDesc::new(17, 0, 0x3c, 0, regs::DMA_TIMESLICE),
    FieldDesc::new(32, 0, 0x40, 0, regs::NV40_UNK32E4),
    FieldDesc::new(32, 0, 0x44, 0, regs::NV40_UNK32E8),
    FieldDesc::new(32, 0, 0x4c, 0, regs::NV40_UNK2088),
    FieldDesc::new(32, 0, 0x50, 0, regs::NV40_UNK3300),
    FieldDesc::new(32, 0, 0x54, 0, regs::NV40_UNK330C),
];

const NV40_RAMFC_INIT: [RamfcInit; 5] = [
    RamfcInit::new(0x00, InitValue::DmaOffset),
    RamfcInit::new(0x04, InitValue::DmaOffset),
    RamfcInit::new(0x0c, InitValue::PushbufInstance),
    RamfcInit::new(0x18, InitValue::Fetch { extra: 0x3000_0000 }),
    RamfcInit::new(0x3c, InitValue::Const(0x0001_ffff)),
];

impl GenerationConfig {
    /// NV04/NV05: 16 channels, 32-byte RAMFC slots.
    pub const NV04: GenerationConfig = GenerationConfig {
        name: "nv04",
        channels: 16,
        ramfc_stride: 32,
        ramfc: &NV04_RAMFC,
        ramfc_init: &NV04_RAMFC_INIT,
        engines: Engines::DMAOBJ.union(Engines::SW).union(Engines::GR),
        cache1_method_base: regs::NV04_CACHE1_METHOD_BASE,
        ramfc_placement: RamfcPlacement::Nv04,
        init_writes: &[(regs::DELAY_0, 0x0000_00ff), (regs::DMA_TIMESLICE, 0x0101_ffff)],
        indirect_buffer: false,
        extended_intr: false,
    };

    /// NV40 family: 32 channels, 128-byte RAMFC slots. RAMFC placement defaults to the
    /// VRAM-relative layout; [`GenerationConfig::for_chipset`] picks the exact variant.
    pub const NV40: GenerationConfig = GenerationConfig {
        name: "nv40",
        channels: 32,
        ramfc_stride: 128,
        ramfc: &NV40_RAMFC,
        ramfc_init: &NV40_RAMFC_INIT,
        engines: Engines::DMAOBJ
            .union(Engines::SW)
            .union(Engines::GR)
            .union(Engines::MPEG),
        cache1_method_base: regs::NV40_CACHE1_METHOD_BASE,
        ramfc_placement: RamfcPlacement::Nv40VramRelative,
        init_writes: &[
            (regs::DELAY_0, 0x0000_00ff),
            (regs::DMA_TIMESLICE, 0x2101_ffff),
            (regs::NV40_UNK2058, 0x0000_0001),
        ],
        indirect_buffer: false,
        extended_intr: false,
    };

    /// Selects the configuration for a chipset id (the `NV_PMC_BOOT_0` implementation byte).
    pub fn for_chipset(chipset: u8) -> Option<GenerationConfig> {
        let config = match chipset {
            0x04 | 0x05 => GenerationConfig::NV04,
            0x47 | 0x49 | 0x4b => GenerationConfig {
                ramfc_placement: RamfcPlacement::Nv40Fixed {
                    unk2230: Some(0x0000_0001),
                },
                ..GenerationConfig::NV40
            },
            0x40..=0x43 | 0x45 | 0x48 => GenerationConfig {
                ramfc_placement: RamfcPlacement::Nv40Fixed { unk2230: None },
                ..GenerationConfig::NV40
            },
            0x44 | 0x46 | 0x4a | 0x4c | 0x4e | 0x63 | 0x67 | 0x68 => GenerationConfig::NV40,
            _ => return None,
        };
        Some(config)
    }

    /// Highest channel id; also the mask applied to `CACHE1_PUSH1`.
    pub fn max_chid(&self) -> u32 {
        self.channels - 1
    }

    /// Byte offset of channel `chid`'s slot inside RAMFC. `chid` is below `channels` of a
    /// configuration [`crate::Fifo::new`] accepted, so the product fits.
    pub(crate) fn ramfc_offset(&self, chid: u32) -> u32 {
        chid * self.ramfc_stride
    }

    /// Bytes spanned by every channel's slot, or `None` if that overflows.
    pub fn ramfc_size(&self) -> Option<u32> {
        self.channels.checked_mul(self.ramfc_stride)
    }
}
