use bitflags::bitflags;

bitflags! {
    /// Set of engines a channel may bind objects for.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Engines: u32 {
        const DMAOBJ = 1 << 0;
        const SW = 1 << 1;
        const GR = 1 << 2;
        const MPEG = 1 << 3;
        const VP = 1 << 4;
    }
}

/// Engine an attached object belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineKind {
    DmaObj,
    Sw,
    Gr,
    Mpeg,
    Vp,
}

impl EngineKind {
    pub fn bit(self) -> Engines {
        match self {
            EngineKind::DmaObj => Engines::DMAOBJ,
            EngineKind::Sw => Engines::SW,
            EngineKind::Gr => Engines::GR,
            EngineKind::Mpeg => Engines::MPEG,
            EngineKind::Vp => Engines::VP,
        }
    }

    /// Engine tag stored in bits 16..23 of a RAMHT context word.
    ///
    /// DMA objects and software objects are resolved by the puller itself (tag 0). Engines with no
    /// pre-NV50 routing return `None`.
    pub fn ramht_tag(self) -> Option<u32> {
        match self {
            EngineKind::DmaObj | EngineKind::Sw => Some(0),
            EngineKind::Gr => Some(1),
            EngineKind::Mpeg => Some(2),
            EngineKind::Vp => None,
        }
    }
}

/// Object being bound into a channel's handle namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineObject {
    /// Owning engine, or `None` for plain objects that need no engine routing.
    pub engine: Option<EngineKind>,
    /// Instance-memory address if the object lives in GPU memory.
    pub instance: Option<u32>,
}

impl EngineObject {
    /// A GPU-memory object owned by `engine`, at instance address `instance`.
    pub fn gpu(engine: EngineKind, instance: u32) -> Self {
        Self {
            engine: Some(engine),
            instance: Some(instance),
        }
    }

    /// A software object; methods sent to it are handled by the CPU.
    pub fn software() -> Self {
        Self {
            engine: Some(EngineKind::Sw),
            instance: None,
        }
    }
}
