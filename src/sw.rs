//! Software-method routing for methods the puller could not hand to a hardware engine.

use pfifo_mmio::RegisterBus;

use crate::regs;

/// Handler for methods addressed to software objects.
///
/// Returns `true` if the method was consumed. Implemented for closures so simple handlers can be
/// installed inline.
pub trait SoftwareMethods: Send {
    fn method(&mut self, chid: u32, subc: u32, mthd: u32, data: u32) -> bool;
}

impl<F> SoftwareMethods for F
where
    F: FnMut(u32, u32, u32, u32) -> bool + Send,
{
    fn method(&mut self, chid: u32, subc: u32, mthd: u32, data: u32) -> bool {
        self(chid, subc, mthd, data)
    }
}

/// Subchannel index encoded in a CACHE1 method address.
pub fn method_subc(addr: u32) -> u32 {
    (addr >> 13) & 7
}

/// Method offset encoded in a CACHE1 method address.
pub fn method_offset(addr: u32) -> u32 {
    addr & 0x1ffc
}

/// Offers a faulting method to software.
///
/// Method 0x0000 (bind object) re-routes the subchannel to software by clearing its
/// `CACHE1_ENGINE` nibble; 0x0180..=0x01fc carry object handles, which the puller has already
/// translated into `CACHE1_HASH`. Only subchannels routed to software reach the handler.
pub(crate) fn offer(
    regs: &mut (impl RegisterBus + ?Sized),
    handler: Option<&mut (dyn SoftwareMethods + '_)>,
    chid: u32,
    addr: u32,
    data: u32,
) -> bool {
    let subc = method_subc(addr);
    let mthd = method_offset(addr);
    let mask = 0xf << (subc * 4);
    let mut engine = regs.rd32(regs::CACHE1_ENGINE);
    let mut data = data;

    match mthd {
        0x0000 => {
            engine &= !mask;
            regs.wr32(regs::CACHE1_ENGINE, engine);
            data = regs.rd32(regs::CACHE1_HASH) & 0x0000_ffff;
        }
        0x0180..=0x01fc => data = regs.rd32(regs::CACHE1_HASH) & 0x0000_ffff,
        0x0100..=0x017c | 0x0200..=0x1ffc => {}
        _ => return false,
    }

    if engine & mask != 0 {
        return false;
    }
    match handler {
        Some(handler) => handler.method(chid, subc, mthd, data),
        None => false,
    }
}
