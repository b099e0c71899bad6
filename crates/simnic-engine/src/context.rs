//! Shared state a transfer loop runs against.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use simnic_ring::{DescriptorRing, LayoutError, RingRole};
use simnic_shmem::SharedRegion;

/// Sleep between ownership polls while a slot still belongs to the peer.
/// Long enough to stay off the CPU, short enough to keep handoff latency in
/// the microseconds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(1);

/// Everything a transfer loop needs: both rings, the stop flag it polls, and
/// its run limits.
pub struct TransferContext<'a> {
    tx: DescriptorRing<'a>,
    rx: DescriptorRing<'a>,
    stop: &'a AtomicBool,
    pub poll_interval: Duration,
    /// Stop after this many completed steps (per loop in dual mode). `None`
    /// runs until the stop flag is raised.
    pub max_steps: Option<u64>,
}

impl<'a> TransferContext<'a> {
    /// Lays both rings out over `region` and binds the stop flag.
    pub fn new(region: &'a SharedRegion, stop: &'a AtomicBool) -> Result<Self, LayoutError> {
        Ok(TransferContext {
            tx: DescriptorRing::new(region, RingRole::Tx)?,
            rx: DescriptorRing::new(region, RingRole::Rx)?,
            stop,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_steps: None,
        })
    }

    pub fn tx(&self) -> &DescriptorRing<'a> {
        &self.tx
    }

    pub fn rx(&self) -> &DescriptorRing<'a> {
        &self.rx
    }

    /// True once a stop has been requested, by the SIGINT handler or by
    /// another thread.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}
