// Copyright (C) 2026 the zoomtrace authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The RTP fixed header as described in
//! [RFC 3550 section 5.1](https://datatracker.ietf.org/doc/html/rfc3550#section-5.1),
//! plus the one-byte-header extension format of
//! [RFC 8285 section 4.2](https://www.rfc-editor.org/rfc/rfc8285.html#section-4.2).
//!
//! Zoom uses exactly two payload types on its video streams; anything else is
//! rejected rather than carried around as an opaque number.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::PacketError;

/// The minimum length of an RTP header (no CSRCs or extensions).
const MIN_HEADER_LEN: usize = 12;

/// RTP payload types this protocol emits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PayloadType {
    /// H.264/MVC video data, payload type 98.
    Video,
    /// Forward error correction, payload type 110.
    Fec,
}

impl PayloadType {
    fn from_wire(value: u8) -> Result<Self, PacketError> {
        match value {
            98 => Ok(PayloadType::Video),
            110 => Ok(PayloadType::Fec),
            other => Err(PacketError::UnsupportedRtpType(other)),
        }
    }
}

/// A header extension in the RFC 8285 one-byte-header format.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   profile id started 0xBEDE...|      length in 32-bit words   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  ID   | len-1 |     value...          |  ID   | len-1 | ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RtpExtension {
    pub profile_id: u16,

    /// The extension body length in bytes (the wire field times four).
    pub len: usize,

    /// Entries keyed by the 4-bit extension id. Id 0 is a terminator on the
    /// wire and never appears here.
    pub entries: BTreeMap<u8, Bytes>,
}

impl RtpExtension {
    /// Parses the extension body. An entry with id 0 is padding and stops
    /// parsing early; that is not an error, and any bytes after it are
    /// ignored.
    fn parse_body(body: &Bytes) -> Self {
        let mut entries = BTreeMap::new();
        let mut idx = 0;
        while idx < body.len() {
            let header = body[idx];
            let id = header >> 4;
            if id == 0 {
                break;
            }
            let len = usize::from(header & 0b1111) + 1;
            idx += 1;
            let end = (idx + len).min(body.len());
            entries.insert(id, body.slice(idx..end));
            idx += len;
        }
        RtpExtension {
            profile_id: 0,
            len: body.len(),
            entries,
        }
    }
}

/// A parsed RTP header.
///
/// `timestamp` and `ssrc` are opaque to this crate: frame grouping keys off
/// the vendor header's frame sequence number, not the RTP timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RtpHeader {
    pub has_padding: bool,
    pub has_extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: PayloadType,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrcs: Vec<u32>,
    pub extension: Option<RtpExtension>,
}

fn truncated(needed: usize, have: usize) -> PacketError {
    PacketError::TruncatedPacket {
        layer: "rtp header",
        needed,
        have,
    }
}

impl RtpHeader {
    /// Parses the RTP header at the start of `data`, returning it together
    /// with the offset of the payload:
    /// `12 + 4*csrc_count [+ 4 + extension_len]`.
    pub fn parse(data: &Bytes) -> Result<(Self, usize), PacketError> {
        if data.len() < MIN_HEADER_LEN {
            return Err(truncated(MIN_HEADER_LEN, data.len()));
        }
        let version = data[0] >> 6;
        if version != 2 {
            return Err(PacketError::InvalidRtpVersion(version));
        }
        let has_padding = (data[0] & 0b0010_0000) != 0;
        let has_extension = (data[0] & 0b0001_0000) != 0;
        let csrc_count = data[0] & 0b0000_1111;

        let marker = (data[1] & 0b1000_0000) != 0;
        let payload_type = PayloadType::from_wire(data[1] & 0b0111_1111)?;

        let sequence_number = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let csrc_end = MIN_HEADER_LEN + 4 * usize::from(csrc_count);
        if data.len() < csrc_end {
            return Err(truncated(csrc_end, data.len()));
        }
        let csrcs = (0..usize::from(csrc_count))
            .map(|i| {
                let o = MIN_HEADER_LEN + 4 * i;
                u32::from_be_bytes([data[o], data[o + 1], data[o + 2], data[o + 3]])
            })
            .collect();

        let (extension, payload_offset) = if has_extension {
            if data.len() < csrc_end + 4 {
                return Err(truncated(csrc_end + 4, data.len()));
            }
            let profile_id = u16::from_be_bytes([data[csrc_end], data[csrc_end + 1]]);
            let len = 4 * usize::from(u16::from_be_bytes([data[csrc_end + 2], data[csrc_end + 3]]));
            let body_start = csrc_end + 4;
            let body_end = body_start + len;
            if data.len() < body_end {
                return Err(truncated(body_end, data.len()));
            }
            let mut ext = RtpExtension::parse_body(&data.slice(body_start..body_end));
            ext.profile_id = profile_id;
            (Some(ext), body_end)
        } else {
            (None, csrc_end)
        };

        Ok((
            RtpHeader {
                has_padding,
                has_extension,
                csrc_count,
                marker,
                payload_type,
                sequence_number,
                timestamp,
                ssrc,
                csrcs,
                extension,
            },
            payload_offset,
        ))
    }
}

/// Encodes a synthetic RTP header. Testing API; exposed for round-trip
/// checks and fuzzing.
#[doc(hidden)]
pub struct RtpHeaderBuilder {
    pub payload_type: u8,
    pub marker: bool,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrcs: Vec<u32>,
    pub extension: Option<(u16, Vec<(u8, Vec<u8>)>)>,
}

impl RtpHeaderBuilder {
    pub fn build<P: IntoIterator<Item = u8>>(self, payload: P) -> Result<Bytes, &'static str> {
        if self.payload_type >= 0x80 {
            return Err("payload type too large");
        }
        if self.csrcs.len() > 15 {
            return Err("more than 15 CSRCs");
        }
        let mut data = vec![
            (2 << 6)
                | if self.extension.is_some() { 0b0001_0000 } else { 0 }
                | self.csrcs.len() as u8,
            if self.marker { 0b1000_0000 } else { 0 } | self.payload_type,
        ];
        data.extend_from_slice(&self.sequence_number.to_be_bytes());
        data.extend_from_slice(&self.timestamp.to_be_bytes());
        data.extend_from_slice(&self.ssrc.to_be_bytes());
        for csrc in &self.csrcs {
            data.extend_from_slice(&csrc.to_be_bytes());
        }
        if let Some((profile_id, entries)) = self.extension {
            let mut body = Vec::new();
            for (id, value) in entries {
                if id == 0 || id > 15 {
                    return Err("extension id must be in 1..=15");
                }
                if value.is_empty() || value.len() > 16 {
                    return Err("extension value must be 1..=16 bytes");
                }
                body.push((id << 4) | (value.len() as u8 - 1));
                body.extend_from_slice(&value);
            }
            // Pad the body to a whole number of 32-bit words with id-0 bytes.
            while body.len() % 4 != 0 {
                body.push(0);
            }
            data.extend_from_slice(&profile_id.to_be_bytes());
            let words =
                u16::try_from(body.len() / 4).map_err(|_| "extension body too long")?;
            data.extend_from_slice(&words.to_be_bytes());
            data.extend_from_slice(&body);
        }
        data.extend(payload);
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};

    use super::*;

    fn builder() -> RtpHeaderBuilder {
        RtpHeaderBuilder {
            payload_type: 98,
            marker: false,
            sequence_number: 0,
            timestamp: 0,
            ssrc: 0,
            csrcs: Vec::new(),
            extension: None,
        }
    }

    #[test]
    fn minimal_video_header() {
        // version=2, no padding/extension/CSRCs, marker=0, pt=98, seq=1.
        let data = Bytes::from_static(&[
            0x80, 0x62, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0xaa,
        ]);
        let (h, payload_offset) = RtpHeader::parse(&data).unwrap();
        assert_eq!(h.payload_type, PayloadType::Video);
        assert_eq!(h.sequence_number, 1);
        assert_eq!(h.timestamp, 2);
        assert_eq!(h.ssrc, 3);
        assert_eq!(h.csrc_count, 0);
        assert!(!h.marker);
        assert!(h.extension.is_none());
        assert_eq!(payload_offset, 12);
    }

    #[test]
    fn version_gate_rejects_everything_else() {
        for first in [0x00u8, 0x40, 0xc0] {
            let mut data = vec![first, 0x62];
            data.extend_from_slice(&[0u8; 10]);
            match RtpHeader::parse(&Bytes::from(data)) {
                Err(PacketError::InvalidRtpVersion(v)) => assert_eq!(v, first >> 6),
                o => panic!("unexpected result {o:?}"),
            }
        }
    }

    #[test]
    fn unknown_payload_type_rejected() {
        let data = builder().build([]).unwrap();
        let mut data = data.to_vec();
        data[1] = 50;
        match RtpHeader::parse(&Bytes::from(data)) {
            Err(PacketError::UnsupportedRtpType(50)) => {}
            o => panic!("unexpected result {o:?}"),
        }
    }

    #[test]
    fn csrcs_consume_payload_offset() {
        let mut b = builder();
        b.csrcs = vec![1, 2, 3];
        let data = b.build([0xff]).unwrap();
        let (h, payload_offset) = RtpHeader::parse(&data).unwrap();
        assert_eq!(h.csrc_count, 3);
        assert_eq!(h.csrcs, vec![1, 2, 3]);
        assert_eq!(payload_offset, 12 + 12);
        assert_eq!(data[payload_offset], 0xff);
    }

    #[test]
    fn extension_entries_and_terminator() {
        let mut b = builder();
        b.extension = Some((0xbede, vec![(1, vec![0xaa]), (3, vec![0xbb, 0xcc])]));
        let data = b.build([0x42]).unwrap();
        let (h, payload_offset) = RtpHeader::parse(&data).unwrap();
        let ext = h.extension.unwrap();
        assert_eq!(ext.profile_id, 0xbede);
        // 2 + 3 bytes of entries, padded to 8.
        assert_eq!(ext.len, 8);
        assert_eq!(ext.entries.len(), 2);
        assert_eq!(&ext.entries[&1][..], &[0xaa]);
        assert_eq!(&ext.entries[&3][..], &[0xbb, 0xcc]);
        assert_eq!(payload_offset, 12 + 4 + 8);
        assert_eq!(data[payload_offset], 0x42);
    }

    #[test]
    fn extension_id_zero_terminates_without_error() {
        // Body: id=0 first, then bytes that would otherwise parse as id 5.
        let mut data = vec![0x90, 0x62, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&0xbede_u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes()); // one 32-bit word
        data.extend_from_slice(&[0x00, 0x50, 0xaa, 0xbb]);
        let (h, payload_offset) = RtpHeader::parse(&Bytes::from(data)).unwrap();
        let ext = h.extension.unwrap();
        assert!(ext.entries.is_empty());
        assert_eq!(payload_offset, 12 + 4 + 4);
    }

    #[test]
    fn truncation_at_each_stage() {
        // Fixed header.
        match RtpHeader::parse(&Bytes::from_static(&[0x80, 0x62, 0, 1])) {
            Err(PacketError::TruncatedPacket { needed: 12, have: 4, .. }) => {}
            o => panic!("unexpected result {o:?}"),
        }
        // CSRC list.
        let mut b = builder();
        b.csrcs = vec![1, 2];
        let full = b.build([]).unwrap();
        match RtpHeader::parse(&full.slice(..full.len() - 1)) {
            Err(PacketError::TruncatedPacket { needed: 20, have: 19, .. }) => {}
            o => panic!("unexpected result {o:?}"),
        }
        // Extension body.
        let mut b = builder();
        b.extension = Some((0xbede, vec![(1, vec![0xaa; 7])]));
        let full = b.build([]).unwrap();
        match RtpHeader::parse(&full.slice(..full.len() - 1)) {
            Err(PacketError::TruncatedPacket { .. }) => {}
            o => panic!("unexpected result {o:?}"),
        }
    }

    /// Encoding then decoding a random well-formed header must recover every
    /// field and predict the payload offset exactly.
    #[test]
    fn round_trip_random_headers() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        for _ in 0..500 {
            let csrcs: Vec<u32> = (0..rng.gen_range(0..=15)).map(|_| rng.gen()).collect();
            let extension = if rng.gen_bool(0.5) {
                let entries: Vec<(u8, Vec<u8>)> = (1..=rng.gen_range(1..=4u8))
                    .map(|id| {
                        let len = rng.gen_range(1..=16);
                        (id, (0..len).map(|_| rng.gen()).collect())
                    })
                    .collect();
                Some((rng.gen(), entries))
            } else {
                None
            };
            let b = RtpHeaderBuilder {
                payload_type: if rng.gen_bool(0.5) { 98 } else { 110 },
                marker: rng.gen_bool(0.5),
                sequence_number: rng.gen(),
                timestamp: rng.gen(),
                ssrc: rng.gen(),
                csrcs: csrcs.clone(),
                extension: extension.clone(),
            };
            let marker = b.marker;
            let seq = b.sequence_number;
            let ts = b.timestamp;
            let ssrc = b.ssrc;
            let pt = b.payload_type;
            let data = b.build([0xde, 0xad]).unwrap();

            let (h, payload_offset) = RtpHeader::parse(&data).unwrap();
            assert_eq!(h.marker, marker);
            assert_eq!(h.sequence_number, seq);
            assert_eq!(h.timestamp, ts);
            assert_eq!(h.ssrc, ssrc);
            assert_eq!(h.csrcs, csrcs);
            assert_eq!(
                h.payload_type,
                if pt == 98 { PayloadType::Video } else { PayloadType::Fec }
            );
            let mut expected_offset = 12 + 4 * csrcs.len();
            if let Some((profile_id, entries)) = extension {
                let ext = h.extension.as_ref().unwrap();
                assert_eq!(ext.profile_id, profile_id);
                for (id, value) in &entries {
                    assert_eq!(&ext.entries[id][..], &value[..]);
                }
                expected_offset += 4 + ext.len;
            } else {
                assert!(h.extension.is_none());
            }
            assert_eq!(payload_offset, expected_offset);
            assert_eq!(&data[payload_offset..], &[0xde, 0xad]);
        }
    }
}
