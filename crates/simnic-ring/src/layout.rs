//! Byte layout of the shared region, fixed by the peer's C ABI.
//!
//! The region starts with two rings of descriptor nodes, transmit first. Every
//! node is one 4 KiB block: an embedded buffer pointer, the DMA descriptor,
//! the packet payload, and a trailing slot index. All multi-byte fields are
//! native-endian 32- or 64-bit words at 4-byte-aligned offsets.

/// Slots per ring.
pub const RING_SLOTS: usize = 32;

/// Bytes per descriptor node.
pub const NODE_SIZE: usize = 4096;

/// Payload bytes a node can carry.
pub const PAYLOAD_CAPACITY: usize = 4052;

/// Size of the full mapping both sides agree on.
pub const REGION_SIZE: usize = 8 * 1024 * 1024;

/// Bytes covered by the two rings at the start of the region.
pub const RING_AREA: usize = 2 * RING_SLOTS * NODE_SIZE;

/// Offset of the transmit ring within the region.
pub const TX_RING_BASE: usize = 0;

/// Offset of the receive ring within the region.
pub const RX_RING_BASE: usize = RING_SLOTS * NODE_SIZE;

// Node-relative field offsets.

/// In-node placeholder for the peer's buffer pointer (8 bytes, unused here).
pub const NODE_BUFFER_POINTER: usize = 0;

/// DMA source address (u64).
pub const NODE_DESC_SRC: usize = 8;

/// DMA destination address (u64).
pub const NODE_DESC_DEST: usize = 16;

/// Packet length in bytes (u32).
pub const NODE_DESC_LEN: usize = 24;

/// Status/error word (u32).
pub const NODE_DESC_ST_ERR: usize = 28;

/// Packet type tag (u32).
pub const NODE_DESC_PACKET_TYPE: usize = 32;

/// Control/status word carrying the ownership bit (u32).
pub const NODE_DESC_CSR: usize = 36;

/// Size of the DMA descriptor embedded in a node.
pub const DESC_SIZE: usize = 32;

/// First payload byte.
pub const NODE_PAYLOAD: usize = 40;

/// Trailing slot index (u32).
pub const NODE_SLOT_INDEX: usize = NODE_SIZE - 4;

const _: () = {
    assert!(NODE_DESC_SRC + DESC_SIZE == NODE_PAYLOAD);
    assert!(NODE_PAYLOAD + PAYLOAD_CAPACITY == NODE_SLOT_INDEX);
    assert!(NODE_SLOT_INDEX + 4 == NODE_SIZE);
    assert!(RX_RING_BASE == TX_RING_BASE + RING_SLOTS * NODE_SIZE);
    assert!(RING_AREA <= REGION_SIZE);
};
