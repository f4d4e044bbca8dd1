//! Register and instance-memory access primitives for the PFIFO engine.
//!
//! The engine never touches hardware directly. Everything goes through two small traits:
//! - [`RegisterBus`]: 32-bit device register read/write/mask (the MMIO BAR), and
//! - [`InstanceMemory`]: 32-bit word access into GPU instance memory (RAMHT, RAMFC, RAMRO).
//!
//! [`SparseRegisters`] and [`DenseInstanceMemory`] are in-process backings for both traits. They
//! are cheap to clone (clones share state), so a test can hand one copy to the engine and keep
//! another to inject hardware state and inspect the result.
#![forbid(unsafe_code)]

mod bus;
mod dense;
mod inst;
mod poll;
mod sparse;

pub use bus::RegisterBus;
pub use dense::DenseInstanceMemory;
pub use inst::InstanceMemory;
pub use poll::wait_for;
pub use sparse::SparseRegisters;
