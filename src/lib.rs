// Copyright (C) 2026 the zoomtrace authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parser for the proprietary media framing Zoom carries over UDP.
//!
//! The wire format was reverse-engineered from packet captures; nothing here
//! comes from vendor documentation. Each datagram wraps an RTP packet in a
//! vendor header that carries a media type, a 2-byte frame sequence number,
//! and the number of packets the sender intends for that frame. Video
//! payloads are H.264/MVC NAL units fragmented as FU-A.
//!
//! The decode chain is layered, one pure function per layer:
//!
//! ```text
//! UDP payload -> vendor media header -> RTP header -> NAL header
//!                                                  -> FU-A header
//!                                                  -> codec extension
//! ```
//!
//! [`packet::parse`] drives the chain for one datagram and classifies any
//! failure as a [`PacketError`]; [`frame::FrameAggregator`] groups the
//! resulting records into frames and flags delivery anomalies. Capture
//! (sniffing), plotting, and quality scoring live in other crates; this one
//! only interprets bytes that were already received.

use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use serde::{Serialize, Serializer};

mod error;
mod hex;

pub mod frame;
pub mod mvc;
pub mod nal;
pub mod packet;
pub mod rtp;
pub mod vendor;

pub use error::{FailedPacket, PacketError};

/// An arrival time with whole-second and microsecond components.
///
/// Two sources produce these: capture timestamps (microsecond precision) and
/// timestamps embedded in screenshot filenames (millisecond precision, local
/// time). Both map onto the same representation so they can be compared and
/// ordered against each other.
///
/// Invariant: `micros` is always in `0..1_000_000`, so the derived ordering
/// (seconds first, then micros) is the chronological one.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketTime {
    /// Whole seconds since the Unix epoch.
    seconds: i64,

    /// Microsecond remainder, `0..1_000_000`.
    micros: u32,
}

const MICROS_PER_SEC: i64 = 1_000_000;

impl PacketTime {
    /// Converts a capture timestamp (fractional seconds since the Unix epoch)
    /// as recorded by tcpdump/libpcap.
    ///
    /// Rounds to the nearest microsecond; libpcap itself has no finer
    /// resolution. Negative inputs still satisfy the `micros` invariant.
    pub fn from_capture_secs(seconds: f64) -> Self {
        let total_micros = (seconds * MICROS_PER_SEC as f64).round() as i64;
        PacketTime {
            seconds: total_micros.div_euclid(MICROS_PER_SEC),
            micros: total_micros.rem_euclid(MICROS_PER_SEC) as u32,
        }
    }

    /// Parses the timestamp embedded in a screenshot filename such as
    /// `2023.01.08.14.18.05.144.jpg`: local-time `%Y.%m.%d.%H.%M.%S` followed
    /// by a 3-digit millisecond field.
    pub fn from_filename(filename: &str) -> Result<Self, PacketError> {
        let dot = filename
            .rfind('.')
            .ok_or_else(|| PacketError::Other(format!("no extension in filename {filename:?}")))?;
        if dot < 4 {
            return Err(PacketError::Other(format!(
                "filename {filename:?} too short for a millisecond timestamp"
            )));
        }
        let (secs_str, millis_str) = filename
            .get(..dot - 4)
            .zip(filename.get(dot - 3..dot))
            .ok_or_else(|| PacketError::Other(format!("malformed filename {filename:?}")))?;
        let millis: u32 = millis_str
            .parse()
            .map_err(|_| PacketError::Other(format!("bad millisecond field {millis_str:?}")))?;
        let naive = chrono::NaiveDateTime::parse_from_str(secs_str, "%Y.%m.%d.%H.%M.%S")
            .map_err(|e| PacketError::Other(format!("bad timestamp in {filename:?}: {e}")))?;
        let local = match chrono::TimeZone::from_local_datetime(&chrono::Local, &naive) {
            chrono::LocalResult::Single(t) => t,
            chrono::LocalResult::Ambiguous(t, _) => t,
            chrono::LocalResult::None => {
                return Err(PacketError::Other(format!(
                    "timestamp in {filename:?} does not exist in the local timezone"
                )))
            }
        };
        Ok(PacketTime {
            seconds: chrono::DateTime::timestamp(&local),
            micros: millis * 1_000,
        })
    }

    /// Whole seconds since the Unix epoch.
    #[inline]
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Microsecond remainder, always `< 1_000_000`.
    #[inline]
    pub fn micros(&self) -> u32 {
        self.micros
    }

    /// Returns `self - other` in fractional seconds. Negative when `other`
    /// is later.
    pub fn subtract(&self, other: &PacketTime) -> f64 {
        (self.seconds - other.seconds) as f64
            + (f64::from(self.micros) - f64::from(other.micros)) / MICROS_PER_SEC as f64
    }

    /// Collapses to a single fractional-seconds value.
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + f64::from(self.micros) / MICROS_PER_SEC as f64
    }
}

impl std::fmt::Display for PacketTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match chrono::DateTime::from_timestamp(self.seconds, 0) {
            Some(utc) => {
                let local = utc.with_timezone(&chrono::Local);
                write!(f, "{}.{:06}", local.format("%Y-%m-%d %H:%M:%S"), self.micros)
            }
            None => write!(f, "{}.{:06}", self.seconds, self.micros),
        }
    }
}

impl std::fmt::Debug for PacketTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Raw fields plus the human-readable form.
        write!(f, "{}.{:06} /* {} */", self.seconds, self.micros, self)
    }
}

impl Serialize for PacketTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One captured UDP datagram, as handed over by the capture collaborator.
///
/// The parsing core only reads this; ownership stays with the caller's
/// capture pipeline.
#[derive(Clone, Debug)]
pub struct RawPacket {
    /// The UDP payload, headers of lower layers already stripped.
    pub payload: Bytes,

    /// Capture timestamp in fractional seconds since the Unix epoch.
    pub timestamp: f64,

    pub source: SocketAddr,
    pub destination: SocketAddr,
}

impl RawPacket {
    /// The arrival time at microsecond precision.
    #[inline]
    pub fn time(&self) -> PacketTime {
        PacketTime::from_capture_secs(self.timestamp)
    }
}

/// Which packets the driver should accept.
///
/// Captures on a busy interface see traffic addressed elsewhere; only
/// datagrams destined for `local_ip` belong to the conference under analysis.
#[derive(Copy, Clone, Debug)]
pub struct FilterContext {
    pub local_ip: IpAddr,
}
