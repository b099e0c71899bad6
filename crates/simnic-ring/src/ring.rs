//! Ring and slot views over a mapped region.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use simnic_shmem::{SharedRegion, ShmemError};
use thiserror::Error;

use crate::csr::Csr;
use crate::layout::{
    NODE_DESC_CSR, NODE_DESC_LEN, NODE_DESC_PACKET_TYPE, NODE_PAYLOAD, NODE_SIZE, NODE_SLOT_INDEX,
    PAYLOAD_CAPACITY, RING_AREA, RING_SLOTS, RX_RING_BASE, TX_RING_BASE,
};

/// Which of the two rings a [`DescriptorRing`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingRole {
    Tx,
    Rx,
}

impl RingRole {
    pub fn base_offset(self) -> usize {
        match self {
            RingRole::Tx => TX_RING_BASE,
            RingRole::Rx => RX_RING_BASE,
        }
    }

    /// Ownership the ring is primed with: the peer starts holding no TX slots
    /// and every RX slot.
    pub fn initial_peer_owned(self) -> bool {
        matches!(self, RingRole::Rx)
    }
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("region holds {size} bytes, the two rings need {need}")]
    RegionTooSmall { size: usize, need: usize },
    #[error("ring view: {0}")]
    Region(#[from] ShmemError),
}

/// One ring of [`RING_SLOTS`] descriptor nodes.
///
/// Construction checks the whole ring against the region bounds once; slot
/// access after that cannot fail.
pub struct DescriptorRing<'a> {
    role: RingRole,
    slots: Vec<Slot<'a>>,
}

impl<'a> DescriptorRing<'a> {
    pub fn new(region: &'a SharedRegion, role: RingRole) -> Result<Self, LayoutError> {
        if region.len() < RING_AREA {
            return Err(LayoutError::RegionTooSmall {
                size: region.len(),
                need: RING_AREA,
            });
        }
        let base = role.base_offset();
        let mut slots = Vec::with_capacity(RING_SLOTS);
        for index in 0..RING_SLOTS {
            let node = base + index * NODE_SIZE;
            slots.push(Slot {
                csr: region.atomic_u32(node + NODE_DESC_CSR)?,
                packet_len: region.atomic_u32(node + NODE_DESC_LEN)?,
                packet_type: region.atomic_u32(node + NODE_DESC_PACKET_TYPE)?,
                slot_index: region.atomic_u32(node + NODE_SLOT_INDEX)?,
                payload: region.atomic_bytes(node + NODE_PAYLOAD, PAYLOAD_CAPACITY)?,
            });
        }
        Ok(DescriptorRing { role, slots })
    }

    pub fn role(&self) -> RingRole {
        self.role
    }

    /// Slot `index` of the ring.
    ///
    /// Panics if `index` is not below [`RING_SLOTS`]; cursors produced by
    /// [`SlotCursor`] always are.
    pub fn slot(&self, index: usize) -> Slot<'a> {
        assert!(index < RING_SLOTS, "slot index {index} out of range");
        self.slots[index]
    }

    /// Rewrites every slot's ownership bit to the ring's primed pattern,
    /// leaving the rest of each csr word alone.
    pub fn reset_ownership(&self) {
        let owned = self.role.initial_peer_owned();
        for slot in &self.slots {
            slot.set_owned_by_peer(owned);
        }
    }
}

/// Ring position that advances modulo [`RING_SLOTS`], so it can never index
/// outside the ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCursor(usize);

impl SlotCursor {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn advance(&mut self) {
        self.0 = (self.0 + 1) % RING_SLOTS;
    }
}

/// View of one descriptor node. Copyable; the cells live in the region.
#[derive(Clone, Copy)]
pub struct Slot<'a> {
    csr: &'a AtomicU32,
    packet_len: &'a AtomicU32,
    packet_type: &'a AtomicU32,
    slot_index: &'a AtomicU32,
    payload: &'a [AtomicU8],
}

impl Slot<'_> {
    /// Reads the control/status word.
    ///
    /// The acquire load pairs with the release store in
    /// [`set_owned_by_peer`](Self::set_owned_by_peer): once the ownership bit
    /// is observed, the payload written before the handoff is too.
    pub fn csr(&self) -> Csr {
        Csr::from_raw(self.csr.load(Ordering::Acquire))
    }

    /// Stores a full csr word.
    pub fn set_csr(&self, csr: Csr) {
        self.csr.store(csr.raw(), Ordering::Release);
    }

    /// Rewrites only the ownership bit. Only the side currently holding the
    /// slot writes its csr, so plain load-then-store is enough.
    pub fn set_owned_by_peer(&self, owned: bool) {
        let csr = Csr::from_raw(self.csr.load(Ordering::Relaxed));
        self.csr
            .store(csr.with_owned_by_peer(owned).raw(), Ordering::Release);
    }

    pub fn packet_len(&self) -> u32 {
        self.packet_len.load(Ordering::Relaxed)
    }

    pub fn set_packet_len(&self, len: u32) {
        self.packet_len.store(len, Ordering::Relaxed);
    }

    pub fn packet_type(&self) -> u32 {
        self.packet_type.load(Ordering::Relaxed)
    }

    pub fn set_packet_type(&self, ty: u32) {
        self.packet_type.store(ty, Ordering::Relaxed);
    }

    pub fn slot_index(&self) -> u32 {
        self.slot_index.load(Ordering::Relaxed)
    }

    pub fn set_slot_index(&self, index: u32) {
        self.slot_index.store(index, Ordering::Relaxed);
    }

    /// Copies payload bytes into `dst`, returning how many were copied.
    pub fn read_payload(&self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(PAYLOAD_CAPACITY);
        for (byte, cell) in dst[..n].iter_mut().zip(&self.payload[..n]) {
            *byte = cell.load(Ordering::Relaxed);
        }
        n
    }

    /// Copies `src` into the payload, returning how many bytes fit.
    pub fn write_payload(&self, src: &[u8]) -> usize {
        let n = src.len().min(PAYLOAD_CAPACITY);
        for (byte, cell) in src[..n].iter().zip(&self.payload[..n]) {
            cell.store(*byte, Ordering::Relaxed);
        }
        n
    }

    /// Moves the packet in `src` into this slot: payload bytes clamped to the
    /// node capacity, the length word carried over verbatim, and the packet
    /// type. Returns the number of payload bytes copied.
    pub fn copy_packet_from(&self, src: &Slot<'_>) -> usize {
        let len = src.packet_len();
        let n = (len as usize).min(PAYLOAD_CAPACITY);
        for (dst, cell) in self.payload[..n].iter().zip(&src.payload[..n]) {
            dst.store(cell.load(Ordering::Relaxed), Ordering::Relaxed);
        }
        self.set_packet_len(len);
        self.set_packet_type(src.packet_type());
        n
    }
}
