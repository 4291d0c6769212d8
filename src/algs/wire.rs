//! Fixed, versioned, little-endian wire types for gather messages.

use bytemuck::{Pod, Zeroable};
use static_assertions::assert_eq_size;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Message kinds carried in [`WireHdr::kind`].
pub mod kind {
    /// Per-step cell/well/block payload folded onto the I/O rank.
    pub const STEP_PAYLOAD: u16 = 1;
    /// Local-to-global cell map, gathered once at start-up.
    pub const CELL_MAP: u16 = 2;
    /// Sent in place of a payload by a rank that failed locally.
    pub const FAILED: u16 = 3;
    /// Root's answer when every rank contributed.
    pub const ACCEPTED: u16 = 4;
}

/// Header sent ahead of every gathered payload.
/// All multi-byte integers are stored pre-LE with `.to_le()`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub reserved_le: u32, // keep zero
    pub len_le: u64,      // payload length in bytes
}

assert_eq_size!(WireHdr, [u8; 16]);

impl WireHdr {
    pub fn new(kind: u16, len: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
            len_le: (len as u64).to_le(),
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn len(&self) -> usize {
        u64::from_le(self.len_le) as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Decode a header, rejecting short buffers and foreign versions.
    pub fn decode(buf: &[u8]) -> Result<Self, String> {
        expect_exact_len(buf.len(), std::mem::size_of::<Self>())?;
        let hdr: WireHdr = bytemuck::pod_read_unaligned(buf);
        if hdr.version() != WIRE_VERSION {
            return Err(format!(
                "wire version {} not supported (expected {WIRE_VERSION})",
                hdr.version()
            ));
        }
        Ok(hdr)
    }
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let hdr = WireHdr::new(kind::STEP_PAYLOAD, 1234);
        let back = WireHdr::decode(hdr.as_bytes()).unwrap();
        assert_eq!(back.kind(), kind::STEP_PAYLOAD);
        assert_eq!(back.len(), 1234);
    }

    #[test]
    fn short_header_rejected() {
        assert!(WireHdr::decode(&[0u8; 8]).is_err());
    }
}
