mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{at_level, capture_logs, Rig};
use pfifo::regs::{self, ib, intr};
use pfifo::{CacheFault, DmaPusherError, Engines, GenerationConfig};
use pretty_assertions::assert_eq;
use tracing::Level;

const GET: u32 = 0x10;

/// Puts a method at the CACHE1 slot `GET` points at and raises CACHE_ERROR.
fn stage_cache_error(rig: &Rig, subc: u32, mthd: u32, data: u32) {
    let base = rig.fifo.generation().cache1_method_base;
    let ptr = (GET & 0x7ff) >> 2;
    rig.regs.set(regs::cache1_method(base, ptr), (subc << 13) | mthd);
    rig.regs.set(regs::cache1_data(base, ptr), data);
    rig.regs.set(regs::CACHE1_GET, GET);
    rig.regs.raise(regs::INTR_0, intr::CACHE_ERROR);
}

#[test]
fn cache_error_skips_one_word_and_restarts() {
    let rig = Rig::nv04();
    let chan = rig.channel(Engines::SW);
    rig.make_active(chan.chid());
    rig.regs.set(regs::CACHES, 1);
    // A status bit that is pending but not enabled must survive.
    rig.regs.set(regs::INTR_EN_0, !intr::SEMAPHORE);
    rig.regs.raise(regs::INTR_0, intr::SEMAPHORE);
    stage_cache_error(&rig, 3, 0x0204, 0xdead_beef);

    let (report, logs) = capture_logs(|| rig.fifo.intr());

    assert_eq!(rig.regs.get(regs::CACHE1_GET), GET + 4);
    assert_eq!(rig.regs.get(regs::INTR_0), intr::SEMAPHORE);
    assert_eq!(rig.regs.writes_to(regs::CACHE1_PUSH0), vec![0, 1]);
    assert_eq!(rig.regs.writes_to(regs::CACHE1_DMA_PUSH), vec![0, 1]);
    assert_eq!(rig.regs.get(regs::CACHE1_PULL0), 1);
    assert_eq!(rig.regs.get(regs::CACHE1_HASH), 0);
    assert_eq!(rig.regs.get(regs::CACHES), 1);

    assert_eq!(
        report.cache_fault,
        Some(CacheFault {
            chid: 0,
            subc: 3,
            mthd: 0x0204,
            data: 0xdead_beef,
            handled: false,
        })
    );
    assert_eq!(report.serviced, intr::CACHE_ERROR);
    assert_eq!(report.masked, 0);

    let errors = at_level(&logs, Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].text.contains("CACHE_ERROR"), "{}", errors[0].text);
    assert!(errors[0].text.contains("client=test-client"), "{}", errors[0].text);
}

#[test]
fn software_method_claimed_silently() {
    let rig = Rig::nv04();
    let chan = rig.channel(Engines::SW);
    rig.make_active(chan.chid());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    rig.fifo
        .set_software_methods(Box::new(move |chid: u32, subc: u32, mthd: u32, data: u32| {
            sink.lock().unwrap().push((chid, subc, mthd, data));
            true
        }));

    rig.regs.set(regs::CACHE1_ENGINE, 0);
    rig.regs.set(regs::CACHE1_PULL0, regs::PULL0_SW_OBJECT);
    stage_cache_error(&rig, 1, 0x0150, 0x42);

    let (report, logs) = capture_logs(|| rig.fifo.intr());

    assert!(at_level(&logs, Level::ERROR).is_empty());
    assert_eq!(*seen.lock().unwrap(), vec![(0, 1, 0x0150, 0x42)]);
    assert_eq!(report.cache_fault.map(|f| f.handled), Some(true));
    assert_eq!(rig.regs.get(regs::CACHE1_GET), GET + 4);
    assert_eq!(rig.regs.get(regs::CACHE1_PUSH0), 1);
    assert_eq!(rig.regs.get(regs::CACHE1_PULL0), 1);
    assert_eq!(rig.regs.get(regs::CACHE1_DMA_PUSH), 1);
    assert_eq!(rig.regs.get(regs::INTR_0), 0);
}

#[test]
fn hardware_routed_subchannel_still_logs() {
    let rig = Rig::nv04();
    let _chan = rig.channel(Engines::SW);
    rig.make_active(0);
    rig.fifo
        .set_software_methods(Box::new(|_: u32, _: u32, _: u32, _: u32| true));

    rig.regs.set(regs::CACHE1_ENGINE, 0x1 << 8);
    rig.regs.set(regs::CACHE1_PULL0, regs::PULL0_SW_OBJECT);
    stage_cache_error(&rig, 2, 0x0300, 1);

    let (report, logs) = capture_logs(|| rig.fifo.intr());
    assert_eq!(report.cache_fault.map(|f| f.handled), Some(false));
    assert_eq!(at_level(&logs, Level::ERROR).len(), 1);
}

#[test]
fn cache_error_on_free_slot_reports_unknown_client() {
    let rig = Rig::nv04();
    rig.make_active(7);
    stage_cache_error(&rig, 0, 0x0100, 0);

    let (_, logs) = capture_logs(|| rig.fifo.intr());
    let errors = at_level(&logs, Level::ERROR);
    assert!(errors[0].text.contains("client=unknown"), "{}", errors[0].text);
    assert!(errors[0].text.contains("chid=7"), "{}", errors[0].text);
}

#[test]
fn dma_pusher_fault_skips_to_put() {
    let rig = Rig::nv04();
    let _chan = rig.channel(Engines::SW);
    rig.make_active(0);
    rig.regs.set(regs::CACHE1_DMA_GET, 0x100);
    rig.regs.set(regs::CACHE1_DMA_PUT, 0x180);
    rig.regs.set(regs::CACHE1_DMA_STATE, 0x8000_0010);
    rig.regs.raise(regs::INTR_0, intr::DMA_PUSHER);

    let (report, logs) = capture_logs(|| rig.fifo.intr());

    assert_eq!(report.pusher_error, Some(DmaPusherError::InvalidCmd));
    assert_eq!(rig.regs.get(regs::CACHE1_DMA_GET), 0x180);
    assert_eq!(rig.regs.get(regs::CACHE1_DMA_STATE), 0);
    assert_eq!(rig.regs.get(regs::CACHE1_DMA_PUSH), 1);
    assert_eq!(rig.regs.get(regs::INTR_0), 0);
    assert!(rig.regs.writes_to(ib::METHOD_COUNT).is_empty());

    let errors = at_level(&logs, Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].text.contains("err=INVALID_CMD"), "{}", errors[0].text);
}

#[test]
fn dma_pusher_fault_with_indirect_buffer_skips_ib_entry() {
    let gen = GenerationConfig {
        indirect_buffer: true,
        ..GenerationConfig::NV40
    };
    let rig = Rig::new(gen);
    rig.make_active(0);
    rig.regs.set(regs::CACHE1_DMA_GET, 0x200);
    rig.regs.set(regs::CACHE1_DMA_PUT, 0x200);
    rig.regs.set(ib::IB_GET, 3);
    rig.regs.set(ib::IB_PUT, 9);
    rig.regs.set(ib::METHOD_COUNT, 5);
    rig.regs.set(regs::CACHE1_DMA_STATE, 0xa000_0000);
    rig.regs.raise(regs::INTR_0, intr::DMA_PUSHER);

    let report = rig.fifo.intr();

    assert_eq!(report.pusher_error, Some(DmaPusherError::IbEmpty));
    assert_eq!(rig.regs.get(ib::IB_GET), 9);
    assert_eq!(rig.regs.get(ib::METHOD_COUNT), 0);
    assert!(rig.regs.writes_to(regs::CACHE1_DMA_GET).is_empty());
    assert!(rig.regs.writes_to(ib::HO_GET).is_empty());
}

#[test]
fn dma_pusher_fault_with_indirect_buffer_prefers_get_put() {
    let gen = GenerationConfig {
        indirect_buffer: true,
        ..GenerationConfig::NV40
    };
    let rig = Rig::new(gen);
    rig.regs.set(regs::CACHE1_DMA_GET, 0x200);
    rig.regs.set(regs::CACHE1_DMA_PUT, 0x200);
    rig.regs.set(ib::HO_GET, 0);
    rig.regs.set(ib::HO_PUT, 1);
    rig.regs.set(ib::IB_GET, 3);
    rig.regs.set(ib::IB_PUT, 9);
    rig.regs.raise(regs::INTR_0, intr::DMA_PUSHER);

    rig.fifo.intr();

    assert_eq!(rig.regs.get(ib::HO_GET), 1);
    assert_eq!(rig.regs.get(regs::CACHE1_DMA_GET), 0x200);
    assert_eq!(rig.regs.get(ib::IB_GET), 3);
}

#[test]
fn semaphore_release_advances_get() {
    let rig = Rig::nv40();
    rig.regs.set(regs::CACHE1_GET, 0x40);
    rig.regs.set(regs::CACHE1_SEMAPHORE, 0x10);
    rig.regs.raise(regs::INTR_0, intr::SEMAPHORE);

    let report = rig.fifo.intr();

    assert_eq!(report.serviced, intr::SEMAPHORE);
    assert_eq!(rig.regs.get(regs::CACHE1_SEMAPHORE), 0x11);
    assert_eq!(rig.regs.get(regs::CACHE1_GET), 0x44);
    assert_eq!(rig.regs.get(regs::CACHE1_PULL0), 1);
    assert_eq!(rig.regs.get(regs::INTR_0), 0);
}

#[test]
fn unknown_bit_is_masked_once() {
    let rig = Rig::nv04();
    rig.regs.set(regs::CACHES, 1);
    rig.regs.raise(regs::INTR_0, 1 << 8);

    let (report, logs) = capture_logs(|| rig.fifo.intr());

    assert_eq!(report.masked, 1 << 8);
    assert_eq!(rig.regs.get(regs::INTR_EN_0), !(1 << 8));
    assert_eq!(rig.regs.get(regs::INTR_0), 0);
    assert_eq!(rig.regs.get(regs::CACHES), 1);
    assert_eq!(at_level(&logs, Level::WARN).len(), 1);

    // Raised again: no longer enabled, so nothing is serviced or logged.
    rig.regs.raise(regs::INTR_0, 1 << 8);
    rig.regs.take_writes();
    let (report, logs) = capture_logs(|| rig.fifo.intr());
    assert!(report.is_empty());
    assert!(logs.iter().all(|line| line.level != Level::WARN));
    assert!(rig.regs.take_writes().is_empty());
    assert_eq!(rig.regs.get(regs::INTR_0), 1 << 8);
}

#[test]
fn extended_bits_without_capability_are_masked() {
    let rig = Rig::nv40();
    rig.regs.raise(regs::INTR_0, intr::NV50_UEVENT);
    let seq = rig.fifo.event().sequence();

    let report = rig.fifo.intr();

    assert_eq!(report.masked, intr::NV50_UEVENT);
    assert_eq!(rig.fifo.event().sequence(), seq);
}

#[test]
fn uevent_notifies_waiters() {
    let gen = GenerationConfig {
        extended_intr: true,
        indirect_buffer: true,
        ..GenerationConfig::NV40
    };
    let rig = Rig::new(gen);
    let event = rig.fifo.event();
    let seen = event.sequence();

    let waiter = std::thread::spawn(move || event.wait_timeout(seen, Duration::from_secs(10)));
    rig.regs.raise(regs::INTR_0, intr::NV50_UEVENT | intr::NV50_UNK4);
    let report = rig.fifo.intr();

    assert_eq!(report.serviced, intr::NV50_UEVENT | intr::NV50_UNK4);
    assert_eq!(report.masked, 0);
    assert_eq!(waiter.join().unwrap(), Some(seen + 1));
    assert_eq!(rig.regs.get(regs::INTR_0), 0);
}

#[test]
fn reassign_is_restored_as_found() {
    let rig = Rig::nv04();
    rig.regs.set(regs::CACHES, 0);
    rig.regs.raise(regs::INTR_0, intr::SEMAPHORE);
    rig.fifo.intr();
    assert_eq!(rig.regs.get(regs::CACHES), 0);

    rig.regs.set(regs::CACHES, 1);
    rig.regs.raise(regs::INTR_0, intr::SEMAPHORE);
    rig.regs.take_writes();
    rig.fifo.intr();
    assert_eq!(rig.regs.writes_to(regs::CACHES), vec![0, 1]);
}
