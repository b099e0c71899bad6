//! The dual mode runs both loops at once; these tests pin the split of work
//! between the calling thread and the receive worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use simnic_engine::{run_dual, TransferContext};
use simnic_ring::{RING_AREA, RING_SLOTS};
use simnic_shmem::SharedRegion;

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
fn dual_transfer_merges_both_sides() {
    let region = SharedRegion::anonymous(RING_AREA).unwrap();
    let stop = AtomicBool::new(false);
    let mut ctx = TransferContext::new(&region, &stop).unwrap();
    ctx.tx().reset_ownership();
    ctx.rx().reset_ownership();
    ctx.max_steps = Some(RING_SLOTS as u64);

    for index in 0..RING_SLOTS {
        ctx.tx().slot(index).set_owned_by_peer(true);
    }

    let totals = run_dual(&ctx).expect("dual transfer failed");

    // The transmit side drains its full budget; the receive side spends its
    // budget on the fill pass, which reports as zero.
    assert_eq!(totals.tx_packets, 32);
    assert_eq!(totals.rx_packets, 0);
    assert_eq!(totals.rx_bytes, 0);

    for index in 0..RING_SLOTS {
        assert!(!ctx.tx().slot(index).csr().owned_by_peer());
        assert!(!ctx.rx().slot(index).csr().owned_by_peer());
    }
}

#[test]
fn dual_transfer_honors_one_stop_flag() {
    let region = SharedRegion::anonymous(RING_AREA).unwrap();
    let stop = AtomicBool::new(false);
    let ctx = TransferContext::new(&region, &stop).unwrap();
    ctx.tx().reset_ownership();
    ctx.rx().reset_ownership();

    for index in 0..4 {
        ctx.tx().slot(index).set_owned_by_peer(true);
    }

    thread::scope(|scope| {
        scope.spawn(|| {
            wait_until(Duration::from_secs(5), || {
                let tx_done = (0..4).all(|index| !ctx.tx().slot(index).csr().owned_by_peer());
                let rx_done =
                    (0..RING_SLOTS).all(|index| !ctx.rx().slot(index).csr().owned_by_peer());
                tx_done && rx_done
            });
            stop.store(true, Ordering::Release);
        });

        let totals = run_dual(&ctx).expect("dual transfer failed");
        assert_eq!(totals.tx_packets, 4);
        assert_eq!(totals.rx_packets, 0);
    });
}
