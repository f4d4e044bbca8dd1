mod common;

use common::{args, Rig};
use pfifo::{regs, EngineKind, EngineObject, Engines, ErrorKind, FifoError};
use pretty_assertions::assert_eq;

#[test]
fn slots_are_allocated_lowest_first_and_reused() {
    let rig = Rig::nv04();
    let a = rig.channel(Engines::SW);
    let b = rig.channel(Engines::SW);
    let c = rig.channel(Engines::SW);
    assert_eq!((a.chid(), b.chid(), c.chid()), (0, 1, 2));

    drop(b);
    let d = rig.channel(Engines::SW);
    assert_eq!(d.chid(), 1);
    assert_eq!(rig.fifo.channels_in_use(), 3);
}

#[test]
fn exhaustion_changes_nothing() {
    let rig = Rig::nv04();
    let channels: Vec<_> = (0..16).map(|_| rig.channel(Engines::SW)).collect();
    assert_eq!(channels.last().map(|c| c.chid()), Some(15));

    rig.regs.take_writes();
    let before = rig.mem.snapshot(0, common::INSTANCE_SIZE);

    let err = rig.fifo.create_channel(args(Engines::SW)).unwrap_err();
    assert_eq!(err, FifoError::ChannelsExhausted { channels: 16 });
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);

    assert!(rig.regs.take_writes().is_empty());
    assert!(rig.mem.snapshot(0, common::INSTANCE_SIZE) == before);
}

#[test]
fn client_name_follows_the_slot() {
    let rig = Rig::nv04();
    let chan = rig
        .fifo
        .create_channel(pfifo::ChannelArgs {
            client: "Xorg[812]".into(),
            ..args(Engines::SW)
        })
        .unwrap();
    assert_eq!(rig.fifo.client_name(chan.chid()), "Xorg[812]");
    chan.destroy();
    assert_eq!(rig.fifo.client_name(0), "unknown");
}

#[test]
fn disallowed_engine_inserts_nothing() {
    let rig = Rig::nv40();
    let mut chan = rig.channel(Engines::SW);
    let ramht = rig.fifo.ramht();
    let before = rig.mem.snapshot(rig.fifo.config().instance.ramht_addr, ramht.size());

    let gr = EngineObject::gpu(EngineKind::Gr, 0x4000);
    let err = chan.attach(0x1234, &gr).unwrap_err();
    assert_eq!(
        err,
        FifoError::EngineNotPermitted {
            chid: 0,
            engine: EngineKind::Gr
        }
    );
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(rig.mem.snapshot(rig.fifo.config().instance.ramht_addr, ramht.size()) == before);
    assert_eq!(chan.binding(0x1234), None);
}

#[test]
fn handle_table_full_is_resource_exhaustion() {
    let rig = Rig::nv04();
    let mut chan = rig.channel(Engines::SW);
    let entries = rig.fifo.ramht().entries();
    for handle in 0..entries {
        chan.attach(0x100 + handle, &EngineObject::software()).unwrap();
    }
    let err = chan
        .attach(0xffff_0000, &EngineObject::software())
        .unwrap_err();
    assert_eq!(
        err,
        FifoError::HandleTableFull {
            chid: 0,
            handle: 0xffff_0000
        }
    );
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
}

#[test]
fn same_handle_on_two_channels_gets_two_entries() {
    let rig = Rig::nv04();
    let mut a = rig.channel(Engines::SW);
    let mut b = rig.channel(Engines::SW);
    let ca = a.attach(0xbeef, &EngineObject::software()).unwrap();
    let cb = b.attach(0xbeef, &EngineObject::software()).unwrap();
    assert_ne!(ca, cb);

    let mut mem = rig.mem.clone();
    let ramht = rig.fifo.ramht();
    assert_eq!(ramht.lookup(&mut mem, 0, 0xbeef), Some(0x8000_0004));
    assert_eq!(ramht.lookup(&mut mem, 1, 0xbeef), Some(0x8100_0004));

    drop(a);
    assert_eq!(ramht.lookup(&mut mem, 0, 0xbeef), None);
    assert_eq!(ramht.lookup(&mut mem, 1, 0xbeef), Some(0x8100_0004));
}

#[test]
fn full_lifecycle_leaves_context_zeroed() {
    let rig = Rig::nv04();
    let mut chan = rig.channel(Engines::SW);
    let chid = chan.chid();
    let base = chan.ramfc_base();

    chan.init();
    assert_eq!(rig.regs.get(regs::MODE) & (1 << chid), 1 << chid);

    chan.attach(0xbeef, &EngineObject::software()).unwrap();

    // Loaded on the hardware with some pusher state.
    rig.make_active(chid);
    rig.regs.set(regs::CACHE1_DMA_PUT, 0x40);
    rig.regs.set(regs::CACHE1_DMA_GET, 0x20);
    rig.regs.set(regs::CACHE1_DMA_INSTANCE, 0x100);

    chan.fini(false);
    assert_eq!(rig.mem.peek(base), 0x40);
    assert_eq!(rig.mem.peek(base + 0x04), 0x20);
    assert_eq!(rig.regs.get(regs::MODE) & (1 << chid), 0);

    chan.destroy();
    for desc in rig.fifo.generation().ramfc {
        assert_eq!(rig.mem.peek(base + desc.ctx_offset), 0, "{:#x}", desc.ctx_offset);
    }
    let mut mem = rig.mem.clone();
    assert_eq!(rig.fifo.ramht().lookup(&mut mem, chid, 0xbeef), None);
    assert_eq!(rig.fifo.channels_in_use(), 0);
}

#[test]
fn dropping_an_enabled_channel_disables_it() {
    let rig = Rig::nv04();
    let mut chan = rig.channel(Engines::SW);
    chan.init();
    assert_eq!(rig.regs.get(regs::MODE), 1);
    drop(chan);
    assert_eq!(rig.regs.get(regs::MODE), 0);
    assert_eq!(rig.regs.get(regs::CACHES), 1);
}
