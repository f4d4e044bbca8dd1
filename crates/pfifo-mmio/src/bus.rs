/// Abstraction for 32-bit device register access.
///
/// Reads take `&mut self` because real register reads can have side effects (read-to-clear
/// status, FIFO pops), and backings used in tests may record accesses.
pub trait RegisterBus {
    fn rd32(&mut self, addr: u32) -> u32;
    fn wr32(&mut self, addr: u32, value: u32);

    /// Read-modify-write: clears `mask` then ORs in `value`. Returns the previous value.
    fn mask(&mut self, addr: u32, mask: u32, value: u32) -> u32 {
        let old = self.rd32(addr);
        self.wr32(addr, (old & !mask) | value);
        old
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    fn rd32(&mut self, addr: u32) -> u32 {
        <T as RegisterBus>::rd32(&mut **self, addr)
    }

    fn wr32(&mut self, addr: u32, value: u32) {
        <T as RegisterBus>::wr32(&mut **self, addr, value)
    }

    fn mask(&mut self, addr: u32, mask: u32, value: u32) -> u32 {
        <T as RegisterBus>::mask(&mut **self, addr, mask, value)
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for Box<T> {
    fn rd32(&mut self, addr: u32) -> u32 {
        <T as RegisterBus>::rd32(&mut **self, addr)
    }

    fn wr32(&mut self, addr: u32, value: u32) {
        <T as RegisterBus>::wr32(&mut **self, addr, value)
    }

    fn mask(&mut self, addr: u32, mask: u32, value: u32) -> u32 {
        <T as RegisterBus>::mask(&mut **self, addr, mask, value)
    }
}
