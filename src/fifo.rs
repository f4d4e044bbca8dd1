//! The PFIFO controller: bring-up, the pause lock and the channel slot table.

use std::sync::{Arc, Mutex, MutexGuard};

use pfifo_mmio::{wait_for, InstanceMemory, RegisterBus};
use tracing::{debug, warn};

use crate::config::FifoConfig;
use crate::error::{FifoError, Result};
use crate::event::FifoEvent;
use crate::gen::{GenerationConfig, RamfcPlacement};
use crate::ramfc::validate_table;
use crate::ramht::{self, Ramht};
use crate::regs;
use crate::sw::SoftwareMethods;

/// Largest channel count the RAMHT context word can address (7-bit channel id).
const MAX_CHANNELS: u32 = 128;
/// PFIFO table base registers hold `addr >> 8`.
const TABLE_ALIGN: u32 = 0x100;
const NV40_RAMFC_VRAM_WINDOW: u64 = 512 * 1024;

pub(crate) struct SlotInfo {
    pub client: String,
}

/// Everything guarded by the pause lock.
pub(crate) struct FifoState<R, M> {
    pub regs: R,
    pub mem: M,
    pub slots: Vec<Option<SlotInfo>>,
    pub sw: Option<Box<dyn SoftwareMethods>>,
}

impl<R, M> FifoState<R, M> {
    pub fn client_name(&self, chid: u32) -> &str {
        self.slots
            .get(chid as usize)
            .and_then(Option::as_ref)
            .map_or("unknown", |slot| slot.client.as_str())
    }
}

/// One PFIFO controller.
///
/// All register and instance-memory traffic goes through a single lock (the "pause lock"), so
/// channel teardown, handle binding and interrupt servicing never interleave. Channels hold an
/// `Arc` to their controller; create it with [`Fifo::new`] and wrap it in an `Arc`.
pub struct Fifo<R, M> {
    pub(crate) gen: GenerationConfig,
    pub(crate) config: FifoConfig,
    pub(crate) ramht: Ramht,
    pub(crate) state: Mutex<FifoState<R, M>>,
    pub(crate) event: Arc<FifoEvent>,
}

impl<R, M> std::fmt::Debug for Fifo<R, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fifo")
            .field("gen", &self.gen.name)
            .field("channels", &self.gen.channels)
            .finish_non_exhaustive()
    }
}

impl<R: RegisterBus, M: InstanceMemory> Fifo<R, M> {
    /// Validates `gen` and `config` against the instance memory and builds an idle controller.
    ///
    /// No hardware is touched until [`Fifo::init`].
    pub fn new(regs: R, mem: M, gen: GenerationConfig, config: FifoConfig) -> Result<Self> {
        validate(&gen, &config, mem.size()).map_err(FifoError::InvalidConfig)?;

        let layout = config.instance;
        let ramht = Ramht::new(layout.ramht_addr, layout.ramht_bits)
            .ok_or(FifoError::InvalidConfig(RAMHT_BITS_RANGE))?;
        let slots = (0..gen.channels).map(|_| None).collect();
        debug!(
            gen = gen.name,
            channels = gen.channels,
            ramht_bits = layout.ramht_bits,
            "fifo created"
        );
        Ok(Self {
            gen,
            config,
            ramht,
            state: Mutex::new(FifoState {
                regs,
                mem,
                slots,
                sw: None,
            }),
            event: Arc::new(FifoEvent::new()),
        })
    }

    /// Programs the controller for operation: tunables, table locations, interrupt enables, and
    /// finally the pusher, puller and channel reassignment.
    pub fn init(&self) {
        let mut state = self.lock();
        let regs = &mut state.regs;
        let layout = self.config.instance;

        for &(reg, value) in self.gen.init_writes {
            regs.wr32(reg, value);
        }

        regs.wr32(
            regs::RAMHT,
            regs::ramht_config(layout.ramht_bits, layout.ramht_addr),
        );
        regs.wr32(regs::RAMRO, layout.ramro_addr >> 8);
        match self.gen.ramfc_placement {
            RamfcPlacement::Nv04 => regs.wr32(regs::RAMFC, layout.ramfc_addr >> 8),
            RamfcPlacement::Nv40Fixed { unk2230 } => {
                if let Some(value) = unk2230 {
                    regs.wr32(regs::NV40_UNK2230, value);
                }
                regs.wr32(regs::NV40_RAMFC, 0x0003_0002);
            }
            RamfcPlacement::Nv40VramRelative => {
                let base = self.config.vram_size - NV40_RAMFC_VRAM_WINDOW
                    + u64::from(layout.ramfc_addr);
                regs.wr32(regs::NV40_UNK2230, 0);
                regs.wr32(regs::NV40_RAMFC, ((base >> 16) as u32) | 0x0003_0000);
            }
        }

        regs.wr32(regs::CACHE1_PUSH1, self.gen.max_chid());
        regs.wr32(regs::INTR_0, 0xffff_ffff);
        regs.wr32(regs::INTR_EN_0, 0xffff_ffff);
        regs.wr32(regs::CACHE1_PUSH0, regs::PUSH0_ENABLE);
        regs.wr32(regs::CACHE1_PULL0, regs::PULL0_ENABLE);
        regs.wr32(regs::CACHES, regs::CACHES_REASSIGN);
        debug!(gen = self.gen.name, "fifo initialised");
    }

    /// Quiesces the puller and takes the pause lock.
    ///
    /// Disables channel reassignment and the puller, then waits (up to the configured timeout)
    /// for any in-flight hash lookup to finish. A timeout is logged and the pause proceeds
    /// anyway. If a lookup failed while draining, its CACHE_ERROR interrupt is acknowledged. The
    /// puller and reassignment are re-enabled when the guard is dropped.
    pub fn pause(&self) -> PauseGuard<'_, R, M> {
        let mut state = self.lock();
        let regs = &mut state.regs;

        regs.wr32(regs::CACHES, 0);
        regs.mask(regs::CACHE1_PULL0, regs::PULL0_ENABLE, 0);

        let idle = wait_for(self.config.pause_timeout(), || {
            regs.rd32(regs::CACHE1_PULL0) & regs::PULL0_HASH_BUSY == 0
        });
        if !idle {
            warn!(
                timeout_ms = self.config.pause_timeout_ms,
                "timed out waiting for the puller to go idle"
            );
        }

        if regs.rd32(regs::CACHE1_PULL0) & regs::PULL0_HASH_FAILED != 0 {
            regs.wr32(regs::INTR_0, regs::intr::CACHE_ERROR);
        }
        regs.wr32(regs::CACHE1_HASH, 0);

        PauseGuard { state }
    }

    /// Installs the handler offered methods addressed to software objects.
    pub fn set_software_methods(&self, handler: Box<dyn SoftwareMethods>) {
        self.lock().sw = Some(handler);
    }

    pub fn clear_software_methods(&self) {
        self.lock().sw = None;
    }

    /// The device-wide event fired on the non-stall event interrupt.
    pub fn event(&self) -> Arc<FifoEvent> {
        Arc::clone(&self.event)
    }

    /// Client name of the channel occupying `chid`, or `"unknown"` if the slot is free.
    pub fn client_name(&self, chid: u32) -> String {
        self.lock().client_name(chid).to_owned()
    }

    /// Number of occupied channel slots.
    pub fn channels_in_use(&self) -> usize {
        self.lock().slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn generation(&self) -> &GenerationConfig {
        &self.gen
    }

    pub fn config(&self) -> &FifoConfig {
        &self.config
    }

    pub fn ramht(&self) -> Ramht {
        self.ramht
    }

    /// Takes the pause lock without touching the hardware.
    pub(crate) fn lock(&self) -> MutexGuard<'_, FifoState<R, M>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Holds the pause lock with the puller halted. Dropping it resumes PFIFO.
pub struct PauseGuard<'a, R: RegisterBus, M> {
    pub(crate) state: MutexGuard<'a, FifoState<R, M>>,
}

impl<R: RegisterBus, M> PauseGuard<'_, R, M> {
    pub fn regs(&mut self) -> &mut R {
        &mut self.state.regs
    }

    pub fn mem(&mut self) -> &mut M {
        &mut self.state.mem
    }

    /// Resumes PFIFO now; equivalent to dropping the guard.
    pub fn resume(self) {}
}

impl<R: RegisterBus, M> Drop for PauseGuard<'_, R, M> {
    fn drop(&mut self) {
        let regs = &mut self.state.regs;
        regs.mask(regs::CACHE1_PULL0, 0, regs::PULL0_ENABLE);
        regs.wr32(regs::CACHES, regs::CACHES_REASSIGN);
    }
}

const RAMHT_BITS_RANGE: &str = "RAMHT size must be between 2^9 and 2^16 entries";
const RAMFC_OUTSIDE: &str = "RAMFC does not fit in instance memory";

fn overlaps(a: u32, a_len: u32, b: u32, b_len: u32) -> bool {
    let (a, a_end) = (u64::from(a), u64::from(a) + u64::from(a_len));
    let (b, b_end) = (u64::from(b), u64::from(b) + u64::from(b_len));
    a < b_end && b < a_end
}

fn validate(
    gen: &GenerationConfig,
    config: &FifoConfig,
    mem_size: u32,
) -> std::result::Result<(), &'static str> {
    if gen.channels == 0 || !gen.channels.is_power_of_two() || gen.channels > MAX_CHANNELS {
        return Err("channel count must be a power of two no larger than 128");
    }
    if gen.ramfc_stride == 0 || gen.ramfc_stride % 4 != 0 {
        return Err("RAMFC stride must be a non-zero multiple of 4");
    }
    validate_table(gen.ramfc, gen.ramfc_stride)?;
    if gen
        .ramfc_init
        .iter()
        .any(|init| {
            init.ctx_offset % 4 != 0
                || init.ctx_offset.checked_add(4).map_or(true, |end| end > gen.ramfc_stride)
        })
    {
        return Err("initial RAMFC word lies outside the channel slot");
    }

    let layout = &config.instance;
    if !(ramht::MIN_BITS..=ramht::MAX_BITS).contains(&layout.ramht_bits) {
        return Err(RAMHT_BITS_RANGE);
    }
    if [layout.ramht_addr, layout.ramro_addr, layout.ramfc_addr]
        .iter()
        .any(|addr| addr % TABLE_ALIGN != 0)
    {
        return Err("PFIFO tables must be 256-byte aligned");
    }

    let ramht_size = layout.ramht_size().ok_or(RAMHT_BITS_RANGE)?;
    let ramfc_size = gen.ramfc_size().ok_or(RAMFC_OUTSIDE)?;
    let end = |addr: u32, len: u32| u64::from(addr) + u64::from(len);
    if end(layout.ramht_addr, ramht_size) > u64::from(mem_size) {
        return Err("RAMHT does not fit in instance memory");
    }
    if end(layout.ramfc_addr, ramfc_size) > u64::from(mem_size) {
        return Err(RAMFC_OUTSIDE);
    }
    if overlaps(layout.ramht_addr, ramht_size, layout.ramfc_addr, ramfc_size) {
        return Err("RAMHT and RAMFC overlap");
    }

    if gen.ramfc_placement == RamfcPlacement::Nv40VramRelative
        && config.vram_size < NV40_RAMFC_VRAM_WINDOW
    {
        return Err("VRAM is smaller than the RAMFC window");
    }
    if config.pause_timeout_ms == 0 {
        return Err("pause timeout must be non-zero");
    }
    Ok(())
}
