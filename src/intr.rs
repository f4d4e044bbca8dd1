//! PFIFO interrupt service.

use std::fmt;

use pfifo_mmio::{InstanceMemory, RegisterBus};
use tracing::{error, warn};

use crate::fifo::{Fifo, FifoState};
use crate::regs::{self, ib, intr};
use crate::sw;

/// DMA pusher error class, from bits 29..31 of `CACHE1_DMA_STATE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DmaPusherError {
    None,
    CallSubrActive,
    InvalidMthd,
    RetSubrInactive,
    InvalidCmd,
    IbEmpty,
    MemFault,
    Unk,
}

impl DmaPusherError {
    pub fn from_state(state: u32) -> Self {
        match (state >> 29) & 7 {
            0 => DmaPusherError::None,
            1 => DmaPusherError::CallSubrActive,
            2 => DmaPusherError::InvalidMthd,
            3 => DmaPusherError::RetSubrInactive,
            4 => DmaPusherError::InvalidCmd,
            5 => DmaPusherError::IbEmpty,
            6 => DmaPusherError::MemFault,
            _ => DmaPusherError::Unk,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DmaPusherError::None => "NONE",
            DmaPusherError::CallSubrActive => "CALL_SUBR_ACTIVE",
            DmaPusherError::InvalidMthd => "INVALID_MTHD",
            DmaPusherError::RetSubrInactive => "RET_SUBR_INACTIVE",
            DmaPusherError::InvalidCmd => "INVALID_CMD",
            DmaPusherError::IbEmpty => "IB_EMPTY",
            DmaPusherError::MemFault => "MEM_FAULT",
            DmaPusherError::Unk => "UNK",
        }
    }
}

impl fmt::Display for DmaPusherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A faulting method pulled from CACHE1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheFault {
    pub chid: u32,
    pub subc: u32,
    pub mthd: u32,
    pub data: u32,
    /// The software-method handler consumed the method.
    pub handled: bool,
}

/// What one call to [`Fifo::intr`] serviced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntrReport {
    /// Pending and enabled bits found on entry.
    pub status: u32,
    /// Bits acknowledged by a known handler.
    pub serviced: u32,
    /// Unrecognised bits, now removed from `INTR_EN_0`.
    pub masked: u32,
    pub cache_fault: Option<CacheFault>,
    pub pusher_error: Option<DmaPusherError>,
}

impl IntrReport {
    pub fn is_empty(&self) -> bool {
        self.status == 0
    }
}

impl<R: RegisterBus, M: InstanceMemory> Fifo<R, M> {
    /// Services pending PFIFO interrupts.
    ///
    /// Faults are recovered here: the offending command word is skipped and the pusher/puller
    /// restarted. Bits with no handler are logged once and disabled.
    pub fn intr(&self) -> IntrReport {
        let mut guard = self.lock();
        let state = &mut *guard;

        let mut stat = state.regs.rd32(regs::INTR_0) & state.regs.rd32(regs::INTR_EN_0);
        let mut report = IntrReport {
            status: stat,
            ..IntrReport::default()
        };
        if stat == 0 {
            return report;
        }

        let reassign = state.regs.rd32(regs::CACHES) & regs::CACHES_REASSIGN;
        state.regs.wr32(regs::CACHES, 0);

        let chid = state.regs.rd32(regs::CACHE1_PUSH1) & self.gen.max_chid();
        let get = state.regs.rd32(regs::CACHE1_GET);

        if stat & intr::CACHE_ERROR != 0 {
            report.cache_fault = Some(self.cache_error(state, chid, get));
            stat &= !intr::CACHE_ERROR;
            report.serviced |= intr::CACHE_ERROR;
        }

        if stat & intr::DMA_PUSHER != 0 {
            report.pusher_error = Some(self.dma_pusher(state, chid));
            stat &= !intr::DMA_PUSHER;
            report.serviced |= intr::DMA_PUSHER;
        }

        if stat & intr::SEMAPHORE != 0 {
            let regs = &mut state.regs;
            regs.wr32(regs::INTR_0, intr::SEMAPHORE);
            regs.mask(regs::CACHE1_SEMAPHORE, 0, regs::SEMAPHORE_RELEASED);
            regs.wr32(regs::CACHE1_GET, get.wrapping_add(regs::CMD_WORD_BYTES));
            regs.wr32(regs::CACHE1_PULL0, regs::PULL0_ENABLE);
            stat &= !intr::SEMAPHORE;
            report.serviced |= intr::SEMAPHORE;
        }

        if self.gen.extended_intr {
            if stat & intr::NV50_UNK4 != 0 {
                state.regs.wr32(regs::INTR_0, intr::NV50_UNK4);
                stat &= !intr::NV50_UNK4;
                report.serviced |= intr::NV50_UNK4;
            }
            if stat & intr::NV50_UEVENT != 0 {
                state.regs.wr32(regs::INTR_0, intr::NV50_UEVENT);
                self.event.notify();
                stat &= !intr::NV50_UEVENT;
                report.serviced |= intr::NV50_UEVENT;
            }
        }

        if stat != 0 {
            warn!(
                stat = format_args!("{stat:#010x}"),
                "unknown PFIFO interrupt, disabling"
            );
            state.regs.mask(regs::INTR_EN_0, stat, 0);
            state.regs.wr32(regs::INTR_0, stat);
            report.masked = stat;
        }

        state.regs.mask(regs::CACHES, regs::CACHES_REASSIGN, reassign);
        report
    }

    fn cache_error(&self, state: &mut FifoState<R, M>, chid: u32, get: u32) -> CacheFault {
        let FifoState { regs, sw, .. } = &mut *state;

        let ptr = (get & 0x7ff) >> 2;
        let base = self.gen.cache1_method_base;
        let addr = regs.rd32(regs::cache1_method(base, ptr));
        let data = regs.rd32(regs::cache1_data(base, ptr));
        let subc = sw::method_subc(addr);
        let mthd = sw::method_offset(addr);

        let pull0 = regs.rd32(regs::CACHE1_PULL0);
        let handled = pull0 & regs::PULL0_SW_OBJECT != 0
            && sw::offer(&mut *regs, sw.as_deref_mut(), chid, addr, data);
        if !handled {
            error!(
                chid,
                client = state.client_name(chid),
                subc,
                mthd = format_args!("{mthd:#06x}"),
                data = format_args!("{data:#010x}"),
                "CACHE_ERROR"
            );
        }

        let regs = &mut state.regs;
        regs.wr32(regs::CACHE1_DMA_PUSH, 0);
        regs.wr32(regs::INTR_0, intr::CACHE_ERROR);
        regs.mask(regs::CACHE1_PUSH0, regs::PUSH0_ENABLE, 0);
        regs.wr32(regs::CACHE1_GET, get.wrapping_add(regs::CMD_WORD_BYTES));
        regs.mask(regs::CACHE1_PUSH0, 0, regs::PUSH0_ENABLE);
        regs.wr32(regs::CACHE1_HASH, 0);
        regs.mask(regs::CACHE1_DMA_PUSH, 0, regs::DMA_PUSH_ENABLE);
        regs.wr32(regs::CACHE1_PULL0, regs::PULL0_ENABLE);

        CacheFault {
            chid,
            subc,
            mthd,
            data,
            handled,
        }
    }

    fn dma_pusher(&self, state: &mut FifoState<R, M>, chid: u32) -> DmaPusherError {
        let client = state.client_name(chid).to_owned();
        let regs = &mut state.regs;

        let dma_get = regs.rd32(regs::CACHE1_DMA_GET);
        let dma_put = regs.rd32(regs::CACHE1_DMA_PUT);
        let push = regs.rd32(regs::CACHE1_DMA_PUSH);
        let dma_state = regs.rd32(regs::CACHE1_DMA_STATE);
        let err = DmaPusherError::from_state(dma_state);

        if self.gen.indirect_buffer {
            let ho_get = regs.rd32(ib::HO_GET);
            let ho_put = regs.rd32(ib::HO_PUT);
            let ib_get = regs.rd32(ib::IB_GET);
            let ib_put = regs.rd32(ib::IB_PUT);

            error!(
                chid,
                client = %client,
                get = format_args!("{ho_get:02x}{dma_get:08x}"),
                put = format_args!("{ho_put:02x}{dma_put:08x}"),
                ib_get = format_args!("{ib_get:08x}"),
                ib_put = format_args!("{ib_put:08x}"),
                state = format_args!("{dma_state:08x}"),
                %err,
                push = format_args!("{push:08x}"),
                "DMA_PUSHER"
            );

            regs.wr32(ib::METHOD_COUNT, 0);
            if dma_get != dma_put || ho_get != ho_put {
                regs.wr32(regs::CACHE1_DMA_GET, dma_put);
                regs.wr32(ib::HO_GET, ho_put);
            } else if ib_get != ib_put {
                regs.wr32(ib::IB_GET, ib_put);
            }
        } else {
            error!(
                chid,
                client = %client,
                get = format_args!("{dma_get:08x}"),
                put = format_args!("{dma_put:08x}"),
                state = format_args!("{dma_state:08x}"),
                %err,
                push = format_args!("{push:08x}"),
                "DMA_PUSHER"
            );

            if dma_get != dma_put {
                regs.wr32(regs::CACHE1_DMA_GET, dma_put);
            }
        }

        regs.wr32(regs::CACHE1_DMA_STATE, 0);
        regs.wr32(regs::CACHE1_DMA_PUSH, regs::DMA_PUSH_ENABLE);
        regs.wr32(regs::INTR_0, intr::DMA_PUSHER);
        err
    }
}
