//! Two-thread coordination for the dual transfer mode.

use std::io;
use std::thread;

use thiserror::Error;

use crate::context::TransferContext;
use crate::transfer::{run_receive_only, run_transmit_only, TransferTotals};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("spawn receive worker: {0}")]
    SpawnWorker(#[from] io::Error),
    #[error("receive worker panicked")]
    WorkerPanicked,
}

/// Runs the transmit loop on the calling thread and the receive loop on a
/// named worker, sharing one stop flag. The rings are role-split, so the two
/// threads never write the same slot.
pub fn run_dual(ctx: &TransferContext<'_>) -> Result<TransferTotals, EngineError> {
    tracing::info!("dual transfer: transmit here, receive on a worker thread");
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("simnic-rx".into())
            .spawn_scoped(scope, || run_receive_only(ctx))?;
        let tx_totals = run_transmit_only(ctx);
        let rx_totals = worker.join().map_err(|_| EngineError::WorkerPanicked)?;
        Ok(TransferTotals {
            tx_packets: tx_totals.tx_packets,
            rx_packets: rx_totals.rx_packets,
            rx_bytes: rx_totals.rx_bytes,
        })
    })
}
