//! Scenario tests for the single-threaded transfer loops. The test body
//! plays the peer: it grants slots by setting ownership bits and watches the
//! loop hand them back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use simnic_engine::{
    run_alternating, run_receive_only, run_transmit_only, BurstStart, TransferContext,
};
use simnic_ring::{RING_AREA, RING_SLOTS};
use simnic_shmem::SharedRegion;

fn primed_context<'a>(region: &'a SharedRegion, stop: &'a AtomicBool) -> TransferContext<'a> {
    let ctx = TransferContext::new(region, stop).expect("rings fit the region");
    ctx.tx().reset_ownership();
    ctx.rx().reset_ownership();
    ctx
}

fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(
            start.elapsed() < deadline,
            "condition not reached within {deadline:?}"
        );
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn transmit_only_consumes_exactly_the_granted_slots() {
    let region = SharedRegion::anonymous(RING_AREA).unwrap();
    let stop = AtomicBool::new(false);
    let mut ctx = primed_context(&region, &stop);
    ctx.max_steps = Some(5);

    for index in 0..5 {
        ctx.tx().slot(index).set_owned_by_peer(true);
    }
    ctx.tx().slot(9).write_payload(b"untouched");

    let totals = run_transmit_only(&ctx);
    assert_eq!(totals.tx_packets, 5);
    assert_eq!(totals.rx_packets, 0);

    for index in 0..RING_SLOTS {
        assert!(!ctx.tx().slot(index).csr().owned_by_peer());
    }
    let mut buf = [0u8; 9];
    ctx.tx().slot(9).read_payload(&mut buf);
    assert_eq!(&buf, b"untouched");
}

#[test]
fn transmit_only_stops_when_the_flag_is_raised() {
    let region = SharedRegion::anonymous(RING_AREA).unwrap();
    let stop = AtomicBool::new(false);
    let ctx = primed_context(&region, &stop);

    for index in 0..3 {
        ctx.tx().slot(index).set_owned_by_peer(true);
    }

    let totals = thread::scope(|scope| {
        let runner = scope.spawn(|| run_transmit_only(&ctx));
        wait_until(Duration::from_secs(5), || {
            (0..3).all(|index| !ctx.tx().slot(index).csr().owned_by_peer())
        });
        stop.store(true, Ordering::Release);
        runner.join().expect("transmit loop panicked")
    });

    assert_eq!(totals.tx_packets, 3);
}

#[test]
fn receive_only_fill_pass_copies_all_slots_and_reports_zero() {
    let region = SharedRegion::anonymous(RING_AREA).unwrap();
    let stop = AtomicBool::new(false);
    let mut ctx = primed_context(&region, &stop);
    ctx.max_steps = Some(RING_SLOTS as u64);

    for index in 0..RING_SLOTS {
        let slot = ctx.tx().slot(index);
        slot.write_payload(&[index as u8; 24]);
        slot.set_packet_len(16 + index as u32);
        slot.set_packet_type(0x0800 + index as u32);
    }

    let totals = run_receive_only(&ctx);
    assert_eq!(totals.rx_packets, 0);
    assert_eq!(totals.rx_bytes, 0);

    for index in 0..RING_SLOTS {
        let slot = ctx.rx().slot(index);
        assert!(!slot.csr().owned_by_peer());
        assert_eq!(slot.packet_len(), 16 + index as u32);
        assert_eq!(slot.packet_type(), 0x0800 + index as u32);
        let mut first = [0u8; 1];
        slot.read_payload(&mut first);
        assert_eq!(first[0], index as u8);
    }
}

#[test]
fn receive_only_counts_after_the_pipeline_fill() {
    let region = SharedRegion::anonymous(RING_AREA).unwrap();
    let stop = AtomicBool::new(false);
    let mut ctx = primed_context(&region, &stop);
    ctx.max_steps = Some(40);

    for index in 0..RING_SLOTS {
        ctx.tx().slot(index).set_packet_len(64);
    }

    let totals = thread::scope(|scope| {
        let runner = scope.spawn(|| run_receive_only(&ctx));
        // Let the fill pass drain the primed ring, then grant eight more.
        wait_until(Duration::from_secs(5), || {
            (0..RING_SLOTS).all(|index| !ctx.rx().slot(index).csr().owned_by_peer())
        });
        for index in 0..8 {
            ctx.rx().slot(index).set_owned_by_peer(true);
        }
        runner.join().expect("receive loop panicked")
    });

    // Steps 33..=40 are counted, and the report drops one.
    assert_eq!(totals.rx_packets, 7);
    assert_eq!(totals.rx_bytes, 8 * 64);
}

#[test]
fn alternating_tx_first_reports_one_less_receive() {
    let region = SharedRegion::anonymous(RING_AREA).unwrap();
    let stop = AtomicBool::new(false);
    let mut ctx = primed_context(&region, &stop);
    ctx.max_steps = Some(64);

    for index in 0..RING_SLOTS {
        let slot = ctx.tx().slot(index);
        slot.set_owned_by_peer(true);
        slot.set_packet_len(100);
    }

    let totals = run_alternating(&ctx, BurstStart::TransmitFirst);
    assert_eq!(totals.tx_packets, 32);
    assert_eq!(totals.rx_packets, 31);
    assert_eq!(totals.rx_bytes, 3200);
}

#[test]
fn alternating_rx_first_counts_the_initial_burst() {
    let region = SharedRegion::anonymous(RING_AREA).unwrap();
    let stop = AtomicBool::new(false);
    let mut ctx = primed_context(&region, &stop);
    ctx.max_steps = Some(32);

    for index in 0..RING_SLOTS {
        ctx.tx().slot(index).set_packet_len(10);
    }

    let totals = run_alternating(&ctx, BurstStart::ReceiveFirst);
    assert_eq!(totals.tx_packets, 0);
    assert_eq!(totals.rx_packets, 31);
    assert_eq!(totals.rx_bytes, 320);
}

#[test]
fn preset_stop_returns_zero_totals_immediately() {
    let region = SharedRegion::anonymous(RING_AREA).unwrap();
    let stop = AtomicBool::new(true);
    let ctx = primed_context(&region, &stop);

    assert_eq!(run_transmit_only(&ctx).tx_packets, 0);
    let rx = run_receive_only(&ctx);
    assert_eq!(rx.rx_packets, 0);
    assert_eq!(rx.rx_bytes, 0);
    let both = run_alternating(&ctx, BurstStart::TransmitFirst);
    assert_eq!(both.tx_packets, 0);
    assert_eq!(both.rx_packets, 0);
}

#[test]
fn zero_step_budget_stops_every_loop_before_work() {
    let region = SharedRegion::anonymous(RING_AREA).unwrap();
    let stop = AtomicBool::new(false);
    let mut ctx = primed_context(&region, &stop);
    ctx.max_steps = Some(0);

    ctx.tx().slot(0).set_owned_by_peer(true);

    assert_eq!(run_transmit_only(&ctx).tx_packets, 0);
    assert_eq!(run_receive_only(&ctx).rx_packets, 0);

    // Nothing was consumed: the grant and the primed receive ring survive.
    assert!(ctx.tx().slot(0).csr().owned_by_peer());
    assert!(ctx.rx().slot(0).csr().owned_by_peer());
}
