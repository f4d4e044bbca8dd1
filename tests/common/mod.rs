//! Shared helpers for `pfifo` integration tests.
#![allow(dead_code)]

use std::fmt;
use std::sync::{Arc, Mutex};

use pfifo::mmio::{DenseInstanceMemory, SparseRegisters};
use pfifo::{regs, Channel, ChannelArgs, Engines, Fifo, FifoConfig, GenerationConfig};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

pub type TestFifo = Fifo<SparseRegisters, DenseInstanceMemory>;
pub type TestChannel = Channel<SparseRegisters, DenseInstanceMemory>;

pub const INSTANCE_SIZE: u32 = 0x2_0000;

/// A brought-up controller plus handles onto its register file and instance memory.
pub struct Rig {
    pub fifo: Arc<TestFifo>,
    pub regs: SparseRegisters,
    pub mem: DenseInstanceMemory,
}

impl Rig {
    pub fn new(gen: GenerationConfig) -> Self {
        let regs = SparseRegisters::with_write_one_to_clear(&[regs::INTR_0]);
        let mem = DenseInstanceMemory::new(INSTANCE_SIZE);
        let config = FifoConfig {
            pause_timeout_ms: 5,
            ..FifoConfig::default()
        };
        let fifo = Fifo::new(regs.clone(), mem.clone(), gen, config).expect("valid test config");
        fifo.init();
        regs.take_writes();
        Self {
            fifo: Arc::new(fifo),
            regs,
            mem,
        }
    }

    pub fn nv04() -> Self {
        Self::new(GenerationConfig::NV04)
    }

    pub fn nv40() -> Self {
        Self::new(GenerationConfig::NV40)
    }

    pub fn channel(&self, engines: Engines) -> TestChannel {
        self.fifo
            .create_channel(args(engines))
            .expect("free channel slot")
    }

    /// Marks `chid` as the channel currently loaded into CACHE1.
    pub fn make_active(&self, chid: u32) {
        self.regs.set(regs::CACHE1_PUSH1, chid);
    }

    /// Every word of a channel's RAMFC slot.
    pub fn ramfc_words(&self, chan: &TestChannel) -> Vec<u32> {
        let stride = self.fifo.generation().ramfc_stride;
        (0..stride)
            .step_by(4)
            .map(|off| self.mem.peek(chan.ramfc_base() + off))
            .collect()
    }
}

pub fn args(engines: Engines) -> ChannelArgs {
    ChannelArgs {
        pushbuf: 0x1000,
        offset: 0,
        engines,
        client: "test-client".into(),
    }
}

/// One captured `tracing` event: level plus `message` and `name=value` fields.
#[derive(Clone, Debug)]
pub struct LogLine {
    pub level: Level,
    pub text: String,
}

#[derive(Default)]
struct LineVisitor(String);

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, format_args!("{value}"));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format_args!("{value:?}"));
    }
}

impl LineVisitor {
    fn push(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        if field.name() == "message" {
            self.0.push_str(&value.to_string());
        } else {
            self.0.push_str(&format!("{}={}", field.name(), value));
        }
    }
}

struct Capture(Arc<Mutex<Vec<LogLine>>>);

impl<S: Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.0.lock().unwrap().push(LogLine {
            level: *event.metadata().level(),
            text: visitor.0,
        });
    }
}

/// Runs `f` with a thread-local subscriber and returns everything it logged.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<LogLine>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(Capture(Arc::clone(&lines)));
    let out = tracing::subscriber::with_default(subscriber, f);
    let lines = lines.lock().unwrap().clone();
    (out, lines)
}

pub fn at_level(lines: &[LogLine], level: Level) -> Vec<&LogLine> {
    lines.iter().filter(|line| line.level == level).collect()
}
