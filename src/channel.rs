//! Channel lifecycle: slot allocation, handle binding, enable/disable and teardown.

use std::collections::HashMap;
use std::sync::Arc;

use pfifo_mmio::{InstanceMemory, RegisterBus};
use tracing::debug;

use crate::engine::{EngineObject, Engines};
use crate::error::{FifoError, Result};
use crate::fifo::{Fifo, FifoState, SlotInfo};
use crate::ramfc::{self, InitContext};
use crate::ramht::{context_word, InsertError};
use crate::regs;

/// Parameters for [`Fifo::create_channel`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelArgs {
    /// Instance address of the pushbuffer DMA object. Must be 16-byte aligned.
    pub pushbuf: u32,
    /// Initial pushbuffer `get`/`put` offset.
    pub offset: u32,
    /// Engines the channel may bind objects for.
    pub engines: Engines,
    /// Name of the owning client, used in fault reports.
    pub client: String,
}

impl<R: RegisterBus, M: InstanceMemory> Fifo<R, M> {
    /// Allocates the lowest free channel slot and writes its initial context.
    ///
    /// Fails without touching hardware or instance memory if the arguments are malformed or every
    /// slot is taken.
    pub fn create_channel(self: &Arc<Self>, args: ChannelArgs) -> Result<Channel<R, M>> {
        if args.pushbuf % 16 != 0 {
            return Err(FifoError::InvalidArgument(
                "pushbuffer object must be 16-byte aligned",
            ));
        }
        if !self.gen.engines.contains(args.engines) {
            return Err(FifoError::InvalidArgument(
                "requested engines are not available on this generation",
            ));
        }

        let mut state = self.lock();
        let chid = state
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FifoError::ChannelsExhausted {
                channels: self.gen.channels,
            })? as u32;

        let base = self.config.instance.ramfc_addr + self.gen.ramfc_offset(chid);
        for off in (0..self.gen.ramfc_stride).step_by(4) {
            state.mem.wo32(base + off, 0);
        }
        let cx = InitContext {
            offset: args.offset,
            pushbuf: args.pushbuf,
            big_endian: self.config.big_endian,
        };
        ramfc::write_initial_context(self.gen.ramfc_init, &mut state.mem, base, &cx);

        debug!(
            chid,
            client = %args.client,
            pushbuf = format_args!("{:#x}", args.pushbuf),
            engines = ?args.engines,
            "channel created"
        );
        state.slots[chid as usize] = Some(SlotInfo {
            client: args.client,
        });
        drop(state);

        Ok(Channel {
            fifo: Arc::clone(self),
            chid,
            ramfc: base,
            engines: args.engines,
            bindings: HashMap::new(),
            enabled: false,
        })
    }
}

/// A PFIFO channel occupying one slot of its controller.
///
/// Dropping the channel (or calling [`Channel::destroy`]) disables it if needed, clears its
/// context, unbinds its handles and frees the slot.
pub struct Channel<R: RegisterBus, M: InstanceMemory> {
    fifo: Arc<Fifo<R, M>>,
    chid: u32,
    ramfc: u32,
    engines: Engines,
    /// handle -> RAMHT cookie
    bindings: HashMap<u32, u32>,
    enabled: bool,
}

impl<R: RegisterBus, M: InstanceMemory> std::fmt::Debug for Channel<R, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("chid", &self.chid)
            .field("ramfc", &format_args!("{:#x}", self.ramfc))
            .field("engines", &self.engines)
            .field("handles", &self.bindings.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl<R: RegisterBus, M: InstanceMemory> Channel<R, M> {
    pub fn chid(&self) -> u32 {
        self.chid
    }

    /// Instance address of this channel's RAMFC slot.
    pub fn ramfc_base(&self) -> u32 {
        self.ramfc
    }

    pub fn engines(&self) -> Engines {
        self.engines
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn fifo(&self) -> &Arc<Fifo<R, M>> {
        &self.fifo
    }

    /// RAMHT cookie of a bound handle.
    pub fn binding(&self, handle: u32) -> Option<u32> {
        self.bindings.get(&handle).copied()
    }

    /// Binds `object` to `handle` in this channel's namespace and returns the RAMHT cookie.
    pub fn attach(&mut self, handle: u32, object: &EngineObject) -> Result<u32> {
        let chid = self.chid;
        if let Some(engine) = object.engine {
            if !self.engines.contains(engine.bit()) {
                return Err(FifoError::EngineNotPermitted { chid, engine });
            }
        }
        let context = match (context_word(object, chid), object.engine) {
            (Some(context), _) => context,
            (None, Some(engine)) => return Err(FifoError::EngineUnsupported { engine }),
            (None, None) => return Err(FifoError::InvalidArgument("object has no routing")),
        };
        if self.bindings.contains_key(&handle) {
            return Err(FifoError::HandleInUse { chid, handle });
        }

        let mut state = self.fifo.lock();
        let cookie = self
            .fifo
            .ramht
            .insert(&mut state.mem, chid, handle, context)
            .map_err(|err| match err {
                InsertError::Exists => FifoError::HandleInUse { chid, handle },
                InsertError::Full => FifoError::HandleTableFull { chid, handle },
            })?;
        drop(state);

        self.bindings.insert(handle, cookie);
        debug!(
            chid,
            handle = format_args!("{handle:#010x}"),
            context = format_args!("{context:#010x}"),
            cookie,
            "object attached"
        );
        Ok(cookie)
    }

    /// Removes the binding for `handle`.
    pub fn detach(&mut self, handle: u32) -> Result<()> {
        let chid = self.chid;
        let cookie = self
            .bindings
            .remove(&handle)
            .ok_or(FifoError::HandleNotBound { chid, handle })?;
        let mut state = self.fifo.lock();
        self.fifo.ramht.remove(&mut state.mem, cookie);
        debug!(chid, handle = format_args!("{handle:#010x}"), "object detached");
        Ok(())
    }

    /// Enables DMA mode for this channel so the hardware may schedule it.
    pub fn init(&mut self) {
        let mut state = self.fifo.lock();
        state.regs.mask(regs::MODE, 0, 1 << self.chid);
        self.enabled = true;
        debug!(chid = self.chid, "channel init");
    }

    /// Disables the channel, saving its context first if the hardware currently has it loaded.
    ///
    /// `suspend` is recorded in the log only; the save is the same either way.
    pub fn fini(&mut self, suspend: bool) {
        let fifo = Arc::clone(&self.fifo);
        let mut state = fifo.lock();
        self.fini_locked(&mut state, suspend);
    }

    fn fini_locked(&mut self, state: &mut FifoState<R, M>, suspend: bool) {
        let gen = &self.fifo.gen;
        let max = gen.max_chid();
        let FifoState { regs, mem, .. } = state;

        regs.wr32(regs::CACHES, 0);

        let active = regs.rd32(regs::CACHE1_PUSH1) & max == self.chid;
        if active {
            regs.mask(regs::CACHE1_DMA_PUSH, regs::DMA_PUSH_ENABLE, 0);
            regs.wr32(regs::CACHE1_PUSH0, 0);
            regs.mask(regs::CACHE1_PULL0, regs::PULL0_ENABLE, 0);

            ramfc::save_live_context(gen.ramfc, &mut *regs, &mut *mem, self.ramfc);

            regs.wr32(regs::CACHE1_GET, 0);
            regs.wr32(regs::CACHE1_PUT, 0);
            regs.wr32(regs::CACHE1_PUSH1, max);
            regs.wr32(regs::CACHE1_PUSH0, regs::PUSH0_ENABLE);
            regs.wr32(regs::CACHE1_PULL0, regs::PULL0_ENABLE);
        }

        regs.mask(regs::MODE, 1 << self.chid, 0);
        regs.wr32(regs::CACHES, regs::CACHES_REASSIGN);
        self.enabled = false;
        debug!(chid = self.chid, suspend, active, "channel fini");
    }

    /// Tears the channel down. Same as dropping it.
    pub fn destroy(self) {}

    fn teardown(&mut self) {
        let fifo = Arc::clone(&self.fifo);
        let mut state = fifo.lock();
        if self.enabled {
            self.fini_locked(&mut state, false);
        }

        ramfc::zero_context(fifo.gen.ramfc, &mut state.mem, self.ramfc);
        for (_, cookie) in self.bindings.drain() {
            fifo.ramht.remove(&mut state.mem, cookie);
        }
        state.slots[self.chid as usize] = None;
        debug!(chid = self.chid, "channel destroyed");
    }
}

impl<R: RegisterBus, M: InstanceMemory> Drop for Channel<R, M> {
    fn drop(&mut self) {
        self.teardown();
    }
}
