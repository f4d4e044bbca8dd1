//! RAMHT: the hash table PFIFO uses to resolve (channel, handle) pairs to object contexts.
//!
//! Each entry is two words: the client handle and a context word. The context word carries the
//! object's instance address (or a non-zero placeholder), the engine tag, the owning channel and a
//! valid bit. Lookups are done by the puller in hardware; software only inserts and removes.

use pfifo_mmio::InstanceMemory;

use crate::engine::EngineObject;

pub const ENTRY_BYTES: u32 = 8;
/// Smallest table the hash's channel mix fits in (512 entries).
pub const MIN_BITS: u32 = 9;
/// Largest table the `RAMHT` register can describe (64K entries).
pub const MAX_BITS: u32 = 16;

pub const CONTEXT_VALID: u32 = 0x8000_0000;
const CONTEXT_CHID_SHIFT: u32 = 24;
const CONTEXT_ENGINE_SHIFT: u32 = 16;
/// Stand-in instance for objects that do not live in GPU memory; any non-zero value works.
const CONTEXT_NO_INSTANCE: u32 = 0x0000_0004;

/// Builds the context word for binding `object` on channel `chid`.
///
/// Returns `None` if the object's engine has no RAMHT routing.
pub fn context_word(object: &EngineObject, chid: u32) -> Option<u32> {
    let mut context = match object.instance {
        Some(addr) => addr >> 4,
        None => CONTEXT_NO_INSTANCE,
    };
    if let Some(engine) = object.engine {
        context |= engine.ramht_tag()? << CONTEXT_ENGINE_SHIFT;
    }
    Some(context | CONTEXT_VALID | (chid << CONTEXT_CHID_SHIFT))
}

/// Why an insert was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertError {
    /// The (channel, handle) pair already has an entry.
    Exists,
    Full,
}

/// Location of a RAMHT table in instance memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ramht {
    base: u32,
    bits: u32,
}

impl Ramht {
    /// Returns `None` unless `bits` is within [`MIN_BITS`]`..=`[`MAX_BITS`].
    pub fn new(base: u32, bits: u32) -> Option<Self> {
        (MIN_BITS..=MAX_BITS)
            .contains(&bits)
            .then_some(Self { base, bits })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn entries(&self) -> u32 {
        1 << self.bits
    }

    pub fn size(&self) -> u32 {
        self.entries() * ENTRY_BYTES
    }

    /// Hardware hash: XOR-fold the handle into `bits`, then mix in the channel id.
    pub fn hash(&self, chid: u32, mut handle: u32) -> u32 {
        let mask = self.entries() - 1;
        let mut hash = 0;
        while handle != 0 {
            hash ^= handle & mask;
            handle = handle.checked_shr(self.bits).unwrap_or(0);
        }
        hash ^= chid << (self.bits - 4);
        hash & mask
    }

    fn entry_chid(context: u32) -> u32 {
        (context >> CONTEXT_CHID_SHIFT) & 0x7f
    }

    /// Inserts a binding, probing linearly from the hash slot into the first free entry. Returns
    /// the entry's byte offset (the cookie passed to [`Ramht::remove`]).
    ///
    /// Only the occupied run ahead of that free entry is checked for an existing (channel,
    /// handle) pair. A duplicate sitting past a hole left by [`Ramht::remove`] is not found;
    /// callers track their own bindings.
    pub fn insert(
        &self,
        mem: &mut (impl InstanceMemory + ?Sized),
        chid: u32,
        handle: u32,
        context: u32,
    ) -> Result<u32, InsertError> {
        let start = self.hash(chid, handle);
        for i in 0..self.entries() {
            let slot = (start + i) & (self.entries() - 1);
            let cookie = slot * ENTRY_BYTES;
            let ctx = mem.ro32(self.base + cookie + 4);
            if ctx == 0 {
                mem.wo32(self.base + cookie, handle);
                mem.wo32(self.base + cookie + 4, context);
                return Ok(cookie);
            }
            if mem.ro32(self.base + cookie) == handle && Self::entry_chid(ctx) == chid {
                return Err(InsertError::Exists);
            }
        }
        Err(InsertError::Full)
    }

    pub fn remove(&self, mem: &mut (impl InstanceMemory + ?Sized), cookie: u32) {
        mem.wo32(self.base + cookie, 0);
        mem.wo32(self.base + cookie + 4, 0);
    }

    /// Looks up the context word for (chid, handle), as the puller would.
    pub fn lookup(
        &self,
        mem: &mut (impl InstanceMemory + ?Sized),
        chid: u32,
        handle: u32,
    ) -> Option<u32> {
        let start = self.hash(chid, handle);
        for i in 0..self.entries() {
            let slot = (start + i) & (self.entries() - 1);
            let off = self.base + slot * ENTRY_BYTES;
            let ctx = mem.ro32(off + 4);
            if ctx != 0 && mem.ro32(off) == handle && Self::entry_chid(ctx) == chid {
                return Some(ctx);
            }
        }
        None
    }
}
