//! `pfifo` drives the PFIFO command-submission engine of NV04..NV4x class GPUs.
//!
//! This crate provides:
//! - Channel lifecycle: slot allocation, per-channel context (RAMFC) setup, enable/disable with
//!   context save, and teardown (see [`Channel`]).
//! - The handle table (RAMHT) that binds client object handles to engine contexts (see
//!   [`Ramht`]).
//! - The pause lock that quiesces the puller around any state change (see [`Fifo::pause`]).
//! - Interrupt service with fault recovery and software-method dispatch (see [`Fifo::intr`]).
//!
//! Generation differences are data ([`GenerationConfig`]); hardware access goes through the
//! `pfifo-mmio` traits so the whole engine runs against in-memory register files in tests.
#![forbid(unsafe_code)]

mod channel;
mod config;
mod engine;
mod error;
mod event;
mod fifo;
mod intr;
mod sw;

pub mod gen;
pub mod ramfc;
pub mod ramht;
pub mod regs;

pub use channel::{Channel, ChannelArgs};
pub use config::{FifoConfig, InstanceLayout};
pub use engine::{EngineKind, EngineObject, Engines};
pub use error::{ErrorKind, FifoError, Result};
pub use event::FifoEvent;
pub use fifo::{Fifo, PauseGuard};
pub use gen::{GenerationConfig, RamfcPlacement};
pub use intr::{CacheFault, DmaPusherError, IntrReport};
pub use ramht::Ramht;
pub use sw::{method_offset, method_subc, SoftwareMethods};

pub use pfifo_mmio as mmio;
