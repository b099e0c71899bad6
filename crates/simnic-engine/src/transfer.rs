//! The single-threaded transfer loops.
//!
//! Each loop advances a cursor over one or both rings, one slot per step. A
//! step either consumes a transmit slot (flip the ownership bit back to the
//! peer) or services a receive slot (loop the paired transmit packet back,
//! then flip the bit). Loops run until the stop flag is raised or the step
//! budget runs out, and waits notice either within one poll interval.

use std::thread;

use simnic_ring::{Slot, SlotCursor, RING_SLOTS};

use crate::context::TransferContext;

/// Counters a transfer run reports at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[must_use]
pub struct TransferTotals {
    /// Transmit slots consumed and handed back to the peer.
    pub tx_packets: u64,
    /// Receive steps counted after the pipeline fill, reported the way the
    /// device reports them: one less than the raw count, never negative.
    pub rx_packets: u64,
    /// Payload bytes copied by counted receive steps. The final-count
    /// correction applies to the packet counter only.
    pub rx_bytes: u64,
}

/// Which burst the alternating loop opens with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstStart {
    TransmitFirst,
    ReceiveFirst,
}

fn out_of_budget(ctx: &TransferContext<'_>, steps: u64) -> bool {
    ctx.max_steps.is_some_and(|max| steps >= max)
}

fn should_halt(ctx: &TransferContext<'_>, steps: u64) -> bool {
    ctx.stop_requested() || out_of_budget(ctx, steps)
}

/// Polls `slot` until the peer hands it over. Returns false when the stop
/// flag or the step budget ends the wait first.
fn wait_for_peer(ctx: &TransferContext<'_>, slot: &Slot<'_>, steps_done: u64) -> bool {
    loop {
        if should_halt(ctx, steps_done) {
            return false;
        }
        if slot.csr().owned_by_peer() {
            return true;
        }
        thread::sleep(ctx.poll_interval);
    }
}

/// Consumes transmit slots as the peer grants them, handing each straight
/// back, until stopped.
pub fn run_transmit_only(ctx: &TransferContext<'_>) -> TransferTotals {
    tracing::info!("transmit loop starting");
    let mut totals = TransferTotals::default();
    let mut cursor = SlotCursor::default();

    loop {
        let slot = ctx.tx().slot(cursor.index());
        if !wait_for_peer(ctx, &slot, totals.tx_packets) {
            break;
        }
        slot.set_owned_by_peer(false);
        totals.tx_packets += 1;
        cursor.advance();
    }

    tracing::info!(tx_packets = totals.tx_packets, "transmit loop stopped");
    totals
}

/// Services receive slots until stopped, looping each paired transmit packet
/// back into the slot before returning it to the peer.
pub fn run_receive_only(ctx: &TransferContext<'_>) -> TransferTotals {
    tracing::info!("receive loop starting");
    let mut totals = TransferTotals::default();
    let mut rx_cursor = SlotCursor::default();
    let mut tx_cursor = SlotCursor::default();
    let mut fill_steps = 0usize;
    let mut steps = 0u64;

    loop {
        let rx_slot = ctx.rx().slot(rx_cursor.index());
        let tx_slot = ctx.tx().slot(tx_cursor.index());

        // The first pass over the ring streams without waiting, modeling the
        // peer pipeline filling up. Counting starts with the first real
        // handoff after that pass.
        let counted = if fill_steps < RING_SLOTS {
            if should_halt(ctx, steps) {
                break;
            }
            fill_steps += 1;
            false
        } else {
            if !wait_for_peer(ctx, &rx_slot, steps) {
                break;
            }
            true
        };

        let copied = rx_slot.copy_packet_from(&tx_slot);
        rx_slot.set_owned_by_peer(false);
        if counted {
            totals.rx_packets += 1;
            totals.rx_bytes += copied as u64;
        }
        steps += 1;
        rx_cursor.advance();
        tx_cursor.advance();
    }

    totals.rx_packets = totals.rx_packets.saturating_sub(1);
    tracing::info!(
        rx_packets = totals.rx_packets,
        rx_bytes = totals.rx_bytes,
        "receive loop stopped"
    );
    totals
}

/// Alternates full-ring receive and transmit bursts until stopped,
/// optionally opening with one transmit burst.
pub fn run_alternating(ctx: &TransferContext<'_>, start: BurstStart) -> TransferTotals {
    tracing::info!(?start, "alternating loop starting");
    let mut totals = TransferTotals::default();
    let mut rx_cursor = SlotCursor::default();
    let mut tx_cursor = SlotCursor::default();
    let mut steps = 0u64;

    let mut live = match start {
        BurstStart::TransmitFirst => transmit_burst(ctx, &mut tx_cursor, &mut totals, &mut steps),
        BurstStart::ReceiveFirst => true,
    };
    while live {
        live = receive_burst(ctx, &mut rx_cursor, &mut tx_cursor, &mut totals, &mut steps)
            && transmit_burst(ctx, &mut tx_cursor, &mut totals, &mut steps);
    }

    // One receive step is the peer pipeline priming itself, not traffic.
    totals.rx_packets = totals.rx_packets.saturating_sub(1);
    tracing::info!(
        tx_packets = totals.tx_packets,
        rx_packets = totals.rx_packets,
        "alternating loop stopped"
    );
    totals
}

fn transmit_burst(
    ctx: &TransferContext<'_>,
    tx_cursor: &mut SlotCursor,
    totals: &mut TransferTotals,
    steps: &mut u64,
) -> bool {
    for _ in 0..RING_SLOTS {
        let slot = ctx.tx().slot(tx_cursor.index());
        if !wait_for_peer(ctx, &slot, *steps) {
            return false;
        }
        slot.set_owned_by_peer(false);
        totals.tx_packets += 1;
        *steps += 1;
        tx_cursor.advance();
    }
    true
}

fn receive_burst(
    ctx: &TransferContext<'_>,
    rx_cursor: &mut SlotCursor,
    tx_cursor: &mut SlotCursor,
    totals: &mut TransferTotals,
    steps: &mut u64,
) -> bool {
    for _ in 0..RING_SLOTS {
        let rx_slot = ctx.rx().slot(rx_cursor.index());
        let tx_slot = ctx.tx().slot(tx_cursor.index());
        if !wait_for_peer(ctx, &rx_slot, *steps) {
            return false;
        }
        let copied = rx_slot.copy_packet_from(&tx_slot);
        rx_slot.set_owned_by_peer(false);
        totals.rx_packets += 1;
        totals.rx_bytes += copied as u64;
        *steps += 1;
        rx_cursor.advance();
        tx_cursor.advance();
    }
    true
}
