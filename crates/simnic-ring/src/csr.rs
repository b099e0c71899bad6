//! Control/status word of a descriptor node.

/// Completion status field, bits 0..=3.
pub const CSR_STATUS_MASK: u32 = 0xf;

/// Descriptor-valid flag.
pub const CSR_VALID: u32 = 1 << 4;

/// Set while the slot belongs to the peer; cleared when it belongs to us.
pub const CSR_OWNED_BY_PEER: u32 = 1 << 31;

/// Decoded csr word.
///
/// Updates go through `with_*` so that bits this side does not manage survive
/// a read-modify-write unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Csr(u32);

impl Csr {
    pub fn from_raw(raw: u32) -> Self {
        Csr(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn owned_by_peer(self) -> bool {
        self.0 & CSR_OWNED_BY_PEER != 0
    }

    pub fn with_owned_by_peer(self, owned: bool) -> Self {
        if owned {
            Csr(self.0 | CSR_OWNED_BY_PEER)
        } else {
            Csr(self.0 & !CSR_OWNED_BY_PEER)
        }
    }

    pub fn valid(self) -> bool {
        self.0 & CSR_VALID != 0
    }

    pub fn with_valid(self, valid: bool) -> Self {
        if valid {
            Csr(self.0 | CSR_VALID)
        } else {
            Csr(self.0 & !CSR_VALID)
        }
    }

    pub fn status(self) -> u32 {
        self.0 & CSR_STATUS_MASK
    }

    pub fn with_status(self, status: u32) -> Self {
        Csr((self.0 & !CSR_STATUS_MASK) | (status & CSR_STATUS_MASK))
    }
}
