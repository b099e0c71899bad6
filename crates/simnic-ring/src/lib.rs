//! Descriptor-ring model of the emulated NIC DMA interface.
//!
//! Two fixed-size rings live at the start of a shared region: the transmit
//! ring, then the receive ring. Each slot is a 4 KiB node whose csr word
//! carries a single ownership bit; flipping that bit is the entire handoff
//! protocol between this process and its peer.
//!
//! Design goals:
//! - Bit-exact node layout against the peer's C structs, pinned by tests.
//! - No references into the shared bytes; cells only, per `simnic-shmem`.
//! - Bounds checked once at ring construction, infallible slot access after.

#![forbid(unsafe_code)]

pub mod csr;
pub mod layout;
mod ring;

pub use csr::{Csr, CSR_OWNED_BY_PEER, CSR_STATUS_MASK, CSR_VALID};
pub use layout::{NODE_SIZE, PAYLOAD_CAPACITY, REGION_SIZE, RING_AREA, RING_SLOTS};
pub use ring::{DescriptorRing, LayoutError, RingRole, Slot, SlotCursor};
