//! Transfer loops that drive the descriptor rings.
//!
//! Four modes mirror the device's test sequences: transmit-only,
//! receive-only, a strictly alternating loopback, and a dual mode that runs
//! transmit and receive on two threads. All of them poll the ownership bit,
//! honor one shared stop flag, and report their counters on the way out.

#![forbid(unsafe_code)]

mod context;
mod dual;
mod transfer;

pub use context::{TransferContext, DEFAULT_POLL_INTERVAL};
pub use dual::{run_dual, EngineError};
pub use transfer::{
    run_alternating, run_receive_only, run_transmit_only, BurstStart, TransferTotals,
};
