// Copyright (C) 2026 the zoomtrace authors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::net::IpAddr;

use bytes::Bytes;
use thiserror::Error;

/// A per-packet parse failure.
///
/// Every variant is local and recoverable: a bad packet is reported and the
/// trace scan moves on to the next one. Nothing here is fatal to a run.
///
/// The messages carry enough context to find the offending packet in
/// Wireshark; [`FailedPacket`] additionally keeps the raw bytes around.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PacketError {
    /// The byte at the vendor media-type offset matched no known stream type.
    #[error("invalid media type {0:#04x}")]
    InvalidMediaType(u8),

    /// The RTP version field was not 2.
    #[error("invalid RTP version {0}")]
    InvalidRtpVersion(u8),

    /// The RTP payload type was neither video (98) nor FEC (110).
    #[error("unsupported RTP payload type {0}")]
    UnsupportedRtpType(u8),

    /// The FU-A reserved bit was set.
    #[error("FU-A reserved bit set")]
    FuAReservedBitSet,

    /// The buffer ended before the field being read.
    #[error("truncated packet: {layer} needs {needed} bytes, have {have}")]
    TruncatedPacket {
        layer: &'static str,
        needed: usize,
        have: usize,
    },

    /// The packet was not addressed to the local interface.
    ///
    /// A filtering precondition rather than a parse failure proper; reported
    /// through the same channel so the driver has a single outcome type.
    #[error("packet destination {0} is not the local interface")]
    NotRightDestination(IpAddr),

    /// Catch-all for anything the other variants don't classify.
    #[error("{0}")]
    Other(String),
}

/// A packet that failed to parse, with the raw bytes kept for diagnostics.
#[derive(Clone)]
pub struct FailedPacket {
    pub error: PacketError,
    pub data: Bytes,
}

impl std::fmt::Debug for FailedPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailedPacket")
            .field("error", &self.error)
            .field("data", &crate::hex::LimitedHex::new(&self.data, 64))
            .finish()
    }
}

impl std::fmt::Display for FailedPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} bytes)", self.error, self.data.len())
    }
}

impl std::error::Error for FailedPacket {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_packet_debug_is_bounded() {
        let failed = FailedPacket {
            error: PacketError::InvalidRtpVersion(0),
            data: Bytes::from(vec![0u8; 1024]),
        };
        let debug = format!("{failed:?}");
        assert!(debug.contains("InvalidRtpVersion"), "{debug}");
        assert!(debug.contains("not shown"), "{debug}");
    }
}
