/// Word-granular access to GPU instance memory.
///
/// Offsets are byte offsets from the start of instance memory and are expected to be 4-byte
/// aligned. Backings treat out-of-range accesses as open bus: reads float high, writes are
/// dropped.
pub trait InstanceMemory {
    /// Size of the instance memory window in bytes.
    fn size(&self) -> u32;

    fn ro32(&mut self, offset: u32) -> u32;
    fn wo32(&mut self, offset: u32, value: u32);
}

impl<T: InstanceMemory + ?Sized> InstanceMemory for &mut T {
    fn size(&self) -> u32 {
        <T as InstanceMemory>::size(&**self)
    }

    fn ro32(&mut self, offset: u32) -> u32 {
        <T as InstanceMemory>::ro32(&mut **self, offset)
    }

    fn wo32(&mut self, offset: u32, value: u32) {
        <T as InstanceMemory>::wo32(&mut **self, offset, value)
    }
}

impl<T: InstanceMemory + ?Sized> InstanceMemory for Box<T> {
    fn size(&self) -> u32 {
        <T as InstanceMemory>::size(&**self)
    }

    fn ro32(&mut self, offset: u32) -> u32 {
        <T as InstanceMemory>::ro32(&mut **self, offset)
    }

    fn wo32(&mut self, offset: u32, value: u32) {
        <T as InstanceMemory>::wo32(&mut **self, offset, value)
    }
}
