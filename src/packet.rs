// Copyright (C) 2026 the zoomtrace authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives the full decode chain for one captured datagram.
//!
//! Each layer transition is a pure function; this module strings them
//! together and turns any failure into a single [`FailedPacket`] outcome so
//! the caller can log it and move on to the next datagram. One bad packet
//! never aborts a trace scan.

use std::net::SocketAddr;

use bytes::Bytes;
use log::trace;
use serde::{Serialize, Serializer};

use crate::error::{FailedPacket, PacketError};
use crate::frame::FrameSeq;
use crate::mvc::CodecExtension;
use crate::nal::{FuAHeader, NalHeader};
use crate::rtp::{PayloadType, RtpHeader};
use crate::vendor::{self, MediaType, VendorMediaHeader};
use crate::{FilterContext, PacketTime, RawPacket};

/// The layers below RTP, present only on video payloads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VideoLayers {
    pub nal: NalHeader,
    pub fu_a: FuAHeader,

    /// The codec extension at the front of the NAL unit. Only the first
    /// fragment of a unit carries it, so this is `None` on middle and end
    /// fragments.
    pub extension: Option<CodecExtension>,
}

/// A fully parsed datagram.
#[derive(Clone, Debug)]
pub struct ZoomPacket {
    pub time: PacketTime,
    pub source: SocketAddr,
    pub destination: SocketAddr,

    /// Length of the whole UDP payload in bytes.
    pub size: usize,

    pub media: VendorMediaHeader,
    pub rtp: RtpHeader,
    pub video: Option<VideoLayers>,

    /// The bytes after the RTP header (and, for video, after the NAL and
    /// FU-A header bytes): FEC parity data or a slice of the H.264
    /// bitstream.
    payload: Bytes,
}

impl ZoomPacket {
    #[inline]
    pub fn is_video(&self) -> bool {
        self.media.media_type == MediaType::Video
    }

    #[inline]
    pub fn is_fec(&self) -> bool {
        self.rtp.payload_type == PayloadType::Fec
    }

    /// The innermost payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Flattens this packet into the record consumed by reporting and by
    /// [`crate::frame::FrameAggregator::ingest_record`].
    pub fn metrics(&self) -> MetricsRecord {
        MetricsRecord {
            frame_sequence_number: self.media.frame_sequence,
            packet_time: self.time,
            packet_size: self.size,
            expected_number_of_packets: self.media.expected_packets,
            is_fec: self.is_fec(),
        }
    }
}

/// Parses one captured datagram, classifying any failure.
///
/// The destination filter runs first: traffic not addressed to
/// `ctx.local_ip` is rejected as [`PacketError::NotRightDestination`] before
/// any byte of it is interpreted.
pub fn parse(pkt: &RawPacket, ctx: &FilterContext) -> Result<ZoomPacket, FailedPacket> {
    let fail = |error| FailedPacket {
        error,
        data: pkt.payload.clone(),
    };
    if pkt.destination.ip() != ctx.local_ip {
        return Err(fail(PacketError::NotRightDestination(pkt.destination.ip())));
    }
    let source_port = pkt.source.port();
    let media = VendorMediaHeader::parse(&pkt.payload, source_port).map_err(&fail)?;

    let rtp_start = vendor::rtp_offset(&pkt.payload, source_port).map_err(&fail)?;
    let rtp_data = pkt.payload.slice(rtp_start..);
    let (rtp, payload_offset) = RtpHeader::parse(&rtp_data).map_err(&fail)?;
    let mut payload = rtp_data.slice(payload_offset..);

    let video = if media.media_type == MediaType::Video && rtp.payload_type == PayloadType::Video
    {
        let nal = NalHeader::parse(&payload).map_err(&fail)?;
        let fu_a = FuAHeader::parse(payload.get(1..).unwrap_or_default()).map_err(&fail)?;
        payload = payload.slice(2..);
        let extension = if fu_a.start {
            Some(CodecExtension::parse(&payload).map_err(&fail)?)
        } else {
            None
        };
        Some(VideoLayers { nal, fu_a, extension })
    } else {
        None
    };

    let parsed = ZoomPacket {
        time: pkt.time(),
        source: pkt.source,
        destination: pkt.destination,
        size: pkt.payload.len(),
        media,
        rtp,
        video,
        payload,
    };
    trace!(
        "parsed {:?} frame={:02x?} seq={:04x} pt={:?}",
        parsed.media.media_type,
        parsed.media.frame_sequence,
        parsed.rtp.sequence_number,
        parsed.rtp.payload_type,
    );
    Ok(parsed)
}

/// Column names of the per-packet CSV report, in serialization order.
pub const CSV_HEADER: [&str; 5] = [
    "frame_sequence_number",
    "packet_time",
    "packet_size",
    "expected_number_of_packets",
    "is_fec",
];

/// One packet flattened for reporting.
///
/// Field order is the CSV column order and must stay in sync with
/// [`CSV_HEADER`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsRecord {
    #[serde(serialize_with = "hex_frame_seq")]
    pub frame_sequence_number: FrameSeq,
    pub packet_time: PacketTime,
    pub packet_size: usize,
    pub expected_number_of_packets: u8,
    pub is_fec: bool,
}

fn hex_frame_seq<S: Serializer>(seq: &FrameSeq, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{:02x}{:02x}", seq[0], seq[1]))
}

impl MetricsRecord {
    /// Renders one CSV row matching [`CSV_HEADER`].
    pub fn csv_row(&self) -> [String; 5] {
        [
            format!("{:02x}{:02x}", self.frame_sequence_number[0], self.frame_sequence_number[1]),
            self.packet_time.to_string(),
            self.packet_size.to_string(),
            self.expected_number_of_packets.to_string(),
            self.is_fec.to_string(),
        ]
    }
}
