// Copyright (C) 2026 the zoomtrace authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! H.264 NAL unit headers and the FU-A fragmentation header of
//! [RFC 6184 section 5.8](https://tools.ietf.org/html/rfc6184#section-5.8).
//!
//! On this protocol's video streams every NAL payload wraps a further FU-A
//! header; frames always span multiple datagrams, so there is no
//! single-NAL-unit packet mode to handle.

use crate::PacketError;

/// The one-byte NAL unit header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NalHeader {
    /// The forbidden_zero_bit. H.264 requires it clear, but corrupted
    /// streams are exactly what this crate is for, so it's recorded rather
    /// than enforced.
    pub forbidden_zero_bit: bool,
    pub nal_ref_idc: u8,
    pub nal_unit_type: u8,
}

impl NalHeader {
    /// Parses the NAL header from the first byte of `data`. The remaining
    /// bytes are the NAL payload.
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        let &octet = data.first().ok_or(PacketError::TruncatedPacket {
            layer: "nal header",
            needed: 1,
            have: 0,
        })?;
        Ok(NalHeader {
            forbidden_zero_bit: (octet >> 7) != 0,
            nal_ref_idc: (octet >> 5) & 0b11,
            nal_unit_type: octet & 0b1_1111,
        })
    }
}

/// The FU-A fragmentation unit header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FuAHeader {
    /// Set on the first fragment of a NAL unit.
    pub start: bool,
    /// Set on the last fragment.
    pub end: bool,
    /// The fragmented NAL unit's type, 5 bits.
    pub fragment_type: u8,
}

impl FuAHeader {
    /// Parses the FU-A header from the first byte of `data`.
    ///
    /// Fails with [`PacketError::FuAReservedBitSet`] when the reserved bit is
    /// non-zero; anything producing that is not a FU-A header.
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        let &octet = data.first().ok_or(PacketError::TruncatedPacket {
            layer: "fu-a header",
            needed: 1,
            have: 0,
        })?;
        if (octet & 0b0010_0000) != 0 {
            return Err(PacketError::FuAReservedBitSet);
        }
        Ok(FuAHeader {
            start: (octet & 0b1000_0000) != 0,
            end: (octet & 0b0100_0000) != 0,
            fragment_type: octet & 0b1_1111,
        })
    }
}
