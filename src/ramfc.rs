//! RAMFC: per-channel PFIFO context storage in instance memory.
//!
//! Each hardware generation describes its channel context as a table of [`FieldDesc`] entries,
//! mapping a bit-field of a live CACHE1 register onto a bit-field of a word in the channel's
//! RAMFC slot. Software only ever saves through this table: restoring a context into the live
//! registers is done by the hardware's own channel switch, which reads the same layout back.

use pfifo_mmio::{InstanceMemory, RegisterBus};
use tracing::trace;

/// One register bit-field and where it lives in the channel's RAMFC slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDesc {
    /// Width of the field in bits (1..=32).
    pub bits: u32,
    /// Bit position of the field inside the RAMFC word.
    pub ctx_shift: u32,
    /// Byte offset of the RAMFC word from the start of the channel's slot.
    pub ctx_offset: u32,
    /// Bit position of the field inside the live register.
    pub reg_shift: u32,
    /// Live register address.
    pub reg: u32,
}

impl FieldDesc {
    pub const fn new(bits: u32, ctx_shift: u32, ctx_offset: u32, reg_shift: u32, reg: u32) -> Self {
        Self {
            bits,
            ctx_shift,
            ctx_offset,
            reg_shift,
            reg,
        }
    }

    /// Unshifted mask covering `bits` bits.
    pub const fn value_mask(&self) -> u32 {
        ((1u64 << self.bits) - 1) as u32
    }

    pub const fn reg_mask(&self) -> u32 {
        self.value_mask() << self.reg_shift
    }

    pub const fn ctx_mask(&self) -> u32 {
        self.value_mask() << self.ctx_shift
    }
}

/// Source of an initial RAMFC word written at channel creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitValue {
    /// The caller-supplied initial pushbuffer offset (DMA_PUT/DMA_GET).
    DmaOffset,
    /// Instance address of the pushbuffer DMA object, in 16-byte units.
    PushbufInstance,
    /// `DMA_FETCH`: 128-byte trigger/size, 8 outstanding requests, plus `extra`.
    /// The big-endian bit is added when the host is big-endian.
    Fetch { extra: u32 },
    Const(u32),
}

/// One word of a generation's initial channel context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RamfcInit {
    pub ctx_offset: u32,
    pub value: InitValue,
}

impl RamfcInit {
    pub const fn new(ctx_offset: u32, value: InitValue) -> Self {
        Self { ctx_offset, value }
    }
}

/// Inputs needed to materialise [`InitValue`]s for one channel.
#[derive(Clone, Copy, Debug)]
pub(crate) struct InitContext {
    pub offset: u32,
    pub pushbuf: u32,
    pub big_endian: bool,
}

impl InitValue {
    pub(crate) fn resolve(self, cx: &InitContext) -> u32 {
        use crate::regs::fetch;
        match self {
            InitValue::DmaOffset => cx.offset,
            InitValue::PushbufInstance => cx.pushbuf >> 4,
            InitValue::Fetch { extra } => {
                let mut v = extra | fetch::TRIG_128_BYTES | fetch::SIZE_128_BYTES | fetch::MAX_REQS_8;
                if cx.big_endian {
                    v |= fetch::BIG_ENDIAN;
                }
                v
            }
            InitValue::Const(v) => v,
        }
    }
}

/// Writes a generation's initial context words into the slot at `base`.
pub(crate) fn write_initial_context(
    inits: &[RamfcInit],
    mem: &mut (impl InstanceMemory + ?Sized),
    base: u32,
    cx: &InitContext,
) {
    for init in inits {
        mem.wo32(base + init.ctx_offset, init.value.resolve(cx));
    }
}

/// Copies every described live register field into the RAMFC slot at `base`, then zeroes the
/// live registers.
///
/// Each field is a read-modify-write of its RAMFC word so that other fields packed into the same
/// word keep their saved values. The caller must hold the pause lock with the puller halted.
pub fn save_live_context(
    table: &[FieldDesc],
    regs: &mut (impl RegisterBus + ?Sized),
    mem: &mut (impl InstanceMemory + ?Sized),
    base: u32,
) {
    for desc in table {
        let rv = (regs.rd32(desc.reg) & desc.reg_mask()) >> desc.reg_shift;
        let addr = base + desc.ctx_offset;
        let cv = mem.ro32(addr) & !desc.ctx_mask();
        mem.wo32(addr, cv | (rv << desc.ctx_shift));
        trace!(
            reg = format_args!("{:#06x}", desc.reg),
            ctx = format_args!("{addr:#x}"),
            value = format_args!("{rv:#x}"),
            "ramfc save"
        );
    }

    for desc in table {
        regs.wr32(desc.reg, 0);
    }
}

/// Zeroes every RAMFC word referenced by `table` in the slot at `base`.
pub fn zero_context(table: &[FieldDesc], mem: &mut (impl InstanceMemory + ?Sized), base: u32) {
    for desc in table {
        mem.wo32(base + desc.ctx_offset, 0);
    }
}

/// Checks a descriptor table against a per-channel slot size.
///
/// Rejects zero or oversized fields, fields that spill past bit 31, unaligned or out-of-slot
/// offsets, and two fields claiming overlapping bits of the same RAMFC word.
pub fn validate_table(table: &[FieldDesc], stride: u32) -> Result<(), &'static str> {
    if table.is_empty() {
        return Err("empty RAMFC descriptor table");
    }
    for (i, desc) in table.iter().enumerate() {
        if desc.bits == 0 || desc.bits > 32 {
            return Err("RAMFC field width must be 1..=32 bits");
        }
        if desc.ctx_shift > 32 - desc.bits || desc.reg_shift > 32 - desc.bits {
            return Err("RAMFC field extends past bit 31");
        }
        if desc.ctx_offset % 4 != 0 || desc.reg % 4 != 0 {
            return Err("RAMFC field offset is not word aligned");
        }
        if desc.ctx_offset.checked_add(4).map_or(true, |end| end > stride) {
            return Err("RAMFC field lies outside the channel slot");
        }
        let aliased = table[..i]
            .iter()
            .any(|prev| prev.ctx_offset == desc.ctx_offset && prev.ctx_mask() & desc.ctx_mask() != 0);
        if aliased {
            return Err("RAMFC fields alias within one context word");
        }
    }
    Ok(())
}
