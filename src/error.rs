use thiserror::Error;

use crate::engine::EngineKind;

pub type Result<T> = std::result::Result<T, FifoError>;

/// Errors returned by channel and controller operations.
///
/// Hardware faults found while servicing interrupts are not errors: they are recovered in the
/// interrupt path and only reported through `tracing` and [`crate::IntrReport`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FifoError {
    #[error("no free channel slot (all {channels} in use)")]
    ChannelsExhausted { channels: u32 },

    #[error("handle table full: cannot bind handle {handle:#010x} on channel {chid}")]
    HandleTableFull { chid: u32, handle: u32 },

    #[error("channel {chid} may not target engine {engine:?}")]
    EngineNotPermitted { chid: u32, engine: EngineKind },

    #[error("engine {engine:?} has no handle-table routing on this hardware")]
    EngineUnsupported { engine: EngineKind },

    #[error("handle {handle:#010x} is already bound on channel {chid}")]
    HandleInUse { chid: u32, handle: u32 },

    #[error("handle {handle:#010x} is not bound on channel {chid}")]
    HandleNotBound { chid: u32, handle: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Coarse classification of [`FifoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ResourceExhausted,
    InvalidArgument,
    /// Only produced while constructing the controller.
    InvalidConfig,
}

impl FifoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FifoError::ChannelsExhausted { .. } | FifoError::HandleTableFull { .. } => {
                ErrorKind::ResourceExhausted
            }
            FifoError::EngineNotPermitted { .. }
            | FifoError::EngineUnsupported { .. }
            | FifoError::HandleInUse { .. }
            | FifoError::HandleNotBound { .. }
            | FifoError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FifoError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}
