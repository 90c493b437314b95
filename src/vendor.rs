// Copyright (C) 2026 the zoomtrace authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The proprietary media header prefixed to every Zoom RTP packet.
//!
//! Field positions were found empirically by lining captures up against the
//! RTP layer; there is no public documentation. Two quirks to be aware of:
//!
//! *   Traffic relayed through a Zoom server arrives from UDP source port
//!     8801 with every offset shifted by 8 bytes relative to direct P2P
//!     traffic. This is configuration observed on the wire, not something
//!     derived from the header contents.
//! *   The RTP layer does not always start at the same distance from the
//!     vendor header. [`rtp_offset`] probes a small set of candidate offsets
//!     for the byte `0x90` (version 2, no padding/extension/CSRCs, marker
//!     set) rather than computing a position.

use log::trace;

use crate::PacketError;

/// Source port used by Zoom media servers. Packets from this port carry the
/// extra 8-byte prefix accounted for by [`header_shift`].
pub const SERVER_PORT: u16 = 8801;

const SERVER_SHIFT: usize = 8;

const MEDIA_TYPE_OFFSET: usize = 0;
const FRAME_SEQUENCE_OFFSET: usize = 21;
const EXPECTED_PACKETS_OFFSET: usize = 23;
const RTP_BASE_OFFSET: usize = 24;

/// First byte of the RTP header as this protocol emits it: version 2, no
/// padding, no extension, zero CSRCs, marker bit set.
const RTP_MARKER_BYTE: u8 = 0x90;

/// Stream types observed in the media-type byte.
///
/// The discriminants are the raw wire values. Unknown values map to
/// [`MediaType::Invalid`] rather than failing, so callers can cheaply test
/// "is this a Zoom packet at all" while scanning mixed traffic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
    ScreenShare,
    SenderReport,
    KeepAlive,
    /// Sentinel for a byte not matching any known stream type.
    Invalid,
}

impl MediaType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            16 => MediaType::Video,
            15 => MediaType::Audio,
            13 => MediaType::ScreenShare,
            33 => MediaType::SenderReport,
            21 => MediaType::KeepAlive,
            _ => MediaType::Invalid,
        }
    }
}

/// Byte shift applied to every vendor-header offset for the given source
/// port.
#[inline]
pub fn header_shift(source_port: u16) -> usize {
    if source_port == SERVER_PORT {
        SERVER_SHIFT
    } else {
        0
    }
}

/// The parsed vendor header of one datagram.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VendorMediaHeader {
    pub media_type: MediaType,

    /// Frame sequence number, kept as raw big-endian bytes.
    ///
    /// This is a map key, not a counter: the field wraps quickly enough that
    /// interpreting it numerically would conflate distinct frames.
    pub frame_sequence: [u8; 2],

    /// How many packets the sender intends to emit for this frame.
    pub expected_packets: u8,
}

impl VendorMediaHeader {
    /// Parses the vendor header from a raw UDP payload.
    ///
    /// Fails with [`PacketError::InvalidMediaType`] when the media-type byte
    /// matches no known stream type and [`PacketError::TruncatedPacket`] when
    /// the buffer ends before the expected-packet-count byte.
    pub fn parse(payload: &[u8], source_port: u16) -> Result<Self, PacketError> {
        let shift = header_shift(source_port);
        let needed = EXPECTED_PACKETS_OFFSET + shift + 1;
        if payload.len() < needed {
            return Err(PacketError::TruncatedPacket {
                layer: "vendor media header",
                needed,
                have: payload.len(),
            });
        }
        let media_byte = payload[MEDIA_TYPE_OFFSET + shift];
        let media_type = MediaType::from_byte(media_byte);
        if media_type == MediaType::Invalid {
            return Err(PacketError::InvalidMediaType(media_byte));
        }
        let frame_sequence = [
            payload[FRAME_SEQUENCE_OFFSET + shift],
            payload[FRAME_SEQUENCE_OFFSET + shift + 1],
        ];
        Ok(VendorMediaHeader {
            media_type,
            frame_sequence,
            expected_packets: payload[EXPECTED_PACKETS_OFFSET + shift],
        })
    }
}

/// Locates the start of the RTP header within a raw UDP payload.
///
/// The RTP layer usually begins at offset 24 (plus the source-port shift),
/// but some packets carry 2 or 4 extra bytes first, for reasons the captures
/// never explained. Candidate offsets 24, 26, and 28 are probed in order and
/// the first one holding [`RTP_MARKER_BYTE`] wins; when none matches, 26 is
/// assumed, matching what the capture tooling this was validated against
/// settled on. Treat the probe as a heuristic observed on the wire, not as a
/// rule of the protocol.
pub fn rtp_offset(payload: &[u8], source_port: u16) -> Result<usize, PacketError> {
    let shift = header_shift(source_port);
    let base = RTP_BASE_OFFSET + shift;
    let chosen = (0..=2)
        .map(|i| base + 2 * i)
        .find(|&off| payload.get(off) == Some(&RTP_MARKER_BYTE))
        .unwrap_or(base + 2);
    if chosen != base {
        trace!("rtp layer displaced to offset {chosen} (base {base})");
    }
    if payload.len() <= chosen {
        return Err(PacketError::TruncatedPacket {
            layer: "rtp offset probe",
            needed: chosen + 1,
            have: payload.len(),
        });
    }
    Ok(chosen)
}
