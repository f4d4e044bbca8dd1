//! PFIFO register offsets and bit definitions (NV04 through NV50 class hardware).
//!
//! Offsets are absolute BAR0 addresses. Only the registers the engine touches are listed; this is
//! not a complete model of the PFIFO block.

pub const DELAY_0: u32 = 0x2040;
pub const DMA_TIMESLICE: u32 = 0x2044;
/// NV40: unnamed PFIFO tunable written during bring-up; also saved per channel (bits 28..29).
pub const NV40_UNK2058: u32 = 0x2058;
pub const NV40_UNK2088: u32 = 0x2088;

pub const INTR_0: u32 = 0x2100;
pub const INTR_EN_0: u32 = 0x2140;

pub const RAMHT: u32 = 0x2210;
pub const RAMFC: u32 = 0x2214;
pub const RAMRO: u32 = 0x2218;
pub const NV40_RAMFC: u32 = 0x2220;
pub const NV40_UNK2230: u32 = 0x2230;

/// Bit 0: allow the puller to reassign (switch) channels.
pub const CACHES: u32 = 0x2500;
/// One DMA-mode enable bit per channel.
pub const MODE: u32 = 0x2504;

pub const CACHE1_PUSH0: u32 = 0x3200;
/// Low bits hold the channel id currently loaded into CACHE1.
pub const CACHE1_PUSH1: u32 = 0x3204;
pub const CACHE1_PUT: u32 = 0x3210;
pub const CACHE1_DMA_PUSH: u32 = 0x3220;
pub const CACHE1_DMA_FETCH: u32 = 0x3224;
pub const CACHE1_DMA_STATE: u32 = 0x3228;
pub const CACHE1_DMA_INSTANCE: u32 = 0x322c;
pub const CACHE1_DMA_PUT: u32 = 0x3240;
pub const CACHE1_DMA_GET: u32 = 0x3244;
pub const CACHE1_REF_CNT: u32 = 0x3248;
pub const CACHE1_DMA_SUBROUTINE: u32 = 0x324c;
pub const CACHE1_PULL0: u32 = 0x3250;
pub const CACHE1_PULL1: u32 = 0x3254;
pub const CACHE1_HASH: u32 = 0x3258;
pub const CACHE1_ACQUIRE_TIMEOUT: u32 = 0x3260;
pub const CACHE1_ACQUIRE_TIMESTAMP: u32 = 0x3264;
pub const CACHE1_ACQUIRE_VALUE: u32 = 0x3268;
pub const CACHE1_SEMAPHORE: u32 = 0x326c;
pub const CACHE1_GET: u32 = 0x3270;
/// Four bits per subchannel; a zero nibble routes the subchannel to software.
pub const CACHE1_ENGINE: u32 = 0x3280;
pub const CACHE1_DMA_DCOUNT: u32 = 0x32a0;
pub const NV40_GRCTX_INSTANCE: u32 = 0x32e0;
pub const NV40_UNK32E4: u32 = 0x32e4;
pub const NV40_UNK32E8: u32 = 0x32e8;
pub const NV40_UNK3300: u32 = 0x3300;
pub const NV40_UNK330C: u32 = 0x330c;

/// NV50 indirect-buffer pusher registers.
pub mod ib {
    pub const HO_PUT: u32 = 0x3320;
    pub const HO_GET: u32 = 0x3328;
    pub const IB_PUT: u32 = 0x3330;
    pub const IB_GET: u32 = 0x3334;
    /// METHOD_COUNT; lives in DMA_STATE on earlier chips.
    pub const METHOD_COUNT: u32 = 0x3364;
}

/// CACHE1 method/data slot pairs on NV04..NV3x.
pub const NV04_CACHE1_METHOD_BASE: u32 = 0x3800;
/// CACHE1 method/data slot pairs on NV40 and later.
pub const NV40_CACHE1_METHOD_BASE: u32 = 0x90000;

/// Interrupt status/enable bits (`INTR_0` / `INTR_EN_0`).
pub mod intr {
    pub const CACHE_ERROR: u32 = 1 << 0;
    /// NV50: display-adjacent status bit, acknowledged and otherwise ignored.
    pub const NV50_UNK4: u32 = 1 << 4;
    pub const DMA_PUSHER: u32 = 1 << 12;
    pub const SEMAPHORE: u32 = 1 << 20;
    /// NV50: non-stall "uevent" used for fencing by higher layers.
    pub const NV50_UEVENT: u32 = 1 << 30;
}

pub const PUSH0_ENABLE: u32 = 1 << 0;
pub const PULL0_ENABLE: u32 = 1 << 0;
pub const PULL0_HASH_FAILED: u32 = 1 << 4;
/// Set when the pending method targets a software object.
pub const PULL0_SW_OBJECT: u32 = 1 << 8;
pub const PULL0_HASH_BUSY: u32 = 1 << 12;
pub const DMA_PUSH_ENABLE: u32 = 1 << 0;
pub const CACHES_REASSIGN: u32 = 1 << 0;
pub const SEMAPHORE_RELEASED: u32 = 1 << 0;

/// `DMA_FETCH` fields used for initial channel contexts.
pub mod fetch {
    pub const TRIG_128_BYTES: u32 = 0x0000_0078;
    pub const SIZE_128_BYTES: u32 = 0x0000_6000;
    pub const MAX_REQS_8: u32 = 0x0008_0000;
    pub const BIG_ENDIAN: u32 = 0x8000_0000;
}

/// Width in bytes of one pushbuffer command word; `get` advances by this when skipping.
pub const CMD_WORD_BYTES: u32 = 4;

/// Register pair holding the method address of CACHE1 slot `ptr`.
pub const fn cache1_method(base: u32, ptr: u32) -> u32 {
    base + ptr * 8
}

/// Register pair holding the method data of CACHE1 slot `ptr`.
pub const fn cache1_data(base: u32, ptr: u32) -> u32 {
    base + ptr * 8 + 4
}

/// Encodes the `RAMHT` register: 128-entry search depth, table size and base.
pub const fn ramht_config(bits: u32, addr: u32) -> u32 {
    (0x03 << 24) | ((bits - 9) << 16) | (addr >> 8)
}
