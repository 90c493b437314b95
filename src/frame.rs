// Copyright (C) 2026 the zoomtrace authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Groups per-packet records into logical video frames.
//!
//! A frame is identified by the vendor header's 2-byte sequence number. The
//! aggregator never decides a frame is "done": packets for one frame are
//! contiguous in arrival order by convention, but late duplicates and
//! retransmissions are legitimate, so records accumulate for the whole run.
//!
//! Anomalies (missing packets, surplus packets, FEC activity) are data here,
//! not errors; [`FrameAggregator::ingest`] cannot fail. The struct is not
//! internally synchronized: single-writer discipline is on the caller, which
//! in practice means one aggregator task fed by a channel.

use std::collections::HashMap;

use log::debug;

use crate::packet::MetricsRecord;
use crate::PacketTime;

/// Key type for frames: the raw frame sequence bytes.
///
/// Kept as bytes rather than a `u16` because the field wraps; ordering two
/// keys numerically is meaningless.
pub type FrameSeq = [u8; 2];

/// One packet's contribution to a frame, in arrival order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PacketEntry {
    pub time: PacketTime,
    pub size: usize,
    pub is_fec: bool,
}

/// Everything observed so far for one frame sequence number.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameRecord {
    /// Copied from the first packet's vendor header. Well-formed senders
    /// repeat the same value on every packet of the frame.
    pub expected_packets: u8,

    /// Packets in arrival order, never re-sorted and never deduplicated.
    pub packets: Vec<PacketEntry>,

    /// Running count of FEC packets among `packets`.
    pub fec_count: usize,
}

impl FrameRecord {
    #[inline]
    pub fn actual_packets(&self) -> usize {
        self.packets.len()
    }
}

/// Per-frame delivery summary.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameSummary {
    /// `last arrival - first arrival`, in seconds.
    pub span: f64,

    /// `expected_packets - actual_packets`. Positive means loss; zero means
    /// complete; negative means surplus (retransmissions or a sender that
    /// under-promised). All three are reportable conditions, not errors.
    pub count_delta: i64,

    pub fec_count: usize,

    /// Sum of packet sizes in bytes.
    pub total_size: usize,
}

/// Buckets packet records by frame sequence number.
#[derive(Debug, Default)]
pub struct FrameAggregator {
    frames: HashMap<FrameSeq, FrameRecord>,

    /// Keys in first-seen order; `frames` alone would iterate arbitrarily,
    /// and downstream reporting wants frames in stream order.
    order: Vec<FrameSeq>,
}

impl FrameAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one packet. On the first packet of a new sequence number the
    /// expected count is copied verbatim; later packets only append.
    pub fn ingest(
        &mut self,
        frame_seq: FrameSeq,
        time: PacketTime,
        size: usize,
        expected_packets: u8,
        is_fec: bool,
    ) {
        let record = match self.frames.entry(frame_seq) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                debug!("new frame {frame_seq:02x?}, expecting {expected_packets} packets");
                self.order.push(frame_seq);
                e.insert(FrameRecord {
                    expected_packets,
                    ..FrameRecord::default()
                })
            }
        };
        record.packets.push(PacketEntry { time, size, is_fec });
        if is_fec {
            record.fec_count += 1;
        }
    }

    /// Convenience form of [`FrameAggregator::ingest`] for the flat records
    /// the packet driver emits.
    pub fn ingest_record(&mut self, record: &MetricsRecord) {
        self.ingest(
            record.frame_sequence_number,
            record.packet_time,
            record.packet_size,
            record.expected_number_of_packets,
            record.is_fec,
        );
    }

    /// Returns the accumulated record for a frame, if any packet with that
    /// sequence number has been seen.
    pub fn get(&self, frame_seq: &FrameSeq) -> Option<&FrameRecord> {
        self.frames.get(frame_seq)
    }

    /// Summarizes one frame's delivery. `None` for an unseen key.
    pub fn summarize(&self, frame_seq: &FrameSeq) -> Option<FrameSummary> {
        let record = self.frames.get(frame_seq)?;
        let first = record.packets.first()?;
        let last = record.packets.last()?;
        Some(FrameSummary {
            span: last.time.subtract(&first.time),
            count_delta: i64::from(record.expected_packets) - record.actual_packets() as i64,
            fec_count: record.fec_count,
            total_size: record.packets.iter().map(|p| p.size).sum(),
        })
    }

    /// Iterates frames in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&FrameSeq, &FrameRecord)> {
        self.order.iter().map(move |k| (k, &self.frames[k]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: f64) -> PacketTime {
        PacketTime::from_capture_secs(secs)
    }

    #[test]
    fn complete_frame_summary() {
        let mut agg = FrameAggregator::new();
        agg.ingest([0x00, 0x07], t(100.000), 500, 3, false);
        agg.ingest([0x00, 0x07], t(100.001), 500, 3, false);
        agg.ingest([0x00, 0x07], t(100.002), 200, 3, false);
        let s = agg.summarize(&[0x00, 0x07]).unwrap();
        assert_eq!(s.count_delta, 0);
        assert_eq!(s.fec_count, 0);
        assert_eq!(s.total_size, 1200);
        assert!((s.span - 0.002).abs() < 1e-9, "span {}", s.span);
    }

    #[test]
    fn missing_and_surplus_packets() {
        let mut agg = FrameAggregator::new();
        agg.ingest([0, 1], t(1.0), 100, 5, false);
        agg.ingest([0, 1], t(1.1), 100, 5, false);
        assert_eq!(agg.summarize(&[0, 1]).unwrap().count_delta, 3);

        agg.ingest([0, 2], t(2.0), 100, 1, false);
        agg.ingest([0, 2], t(2.1), 100, 1, false);
        assert_eq!(agg.summarize(&[0, 2]).unwrap().count_delta, -1);
    }

    #[test]
    fn fec_packets_counted_separately() {
        let mut agg = FrameAggregator::new();
        agg.ingest([9, 9], t(5.0), 400, 3, false);
        agg.ingest([9, 9], t(5.01), 400, 3, true);
        agg.ingest([9, 9], t(5.02), 400, 3, true);
        let s = agg.summarize(&[9, 9]).unwrap();
        assert_eq!(s.fec_count, 2);
        assert_eq!(s.count_delta, 0);
    }

    /// Ingesting an identical packet twice counts twice; the real protocol
    /// retransmits and retransmissions are data.
    #[test]
    fn no_deduplication() {
        let mut agg = FrameAggregator::new();
        let time = t(10.5);
        agg.ingest([1, 2], time, 300, 4, false);
        agg.ingest([1, 2], time, 300, 4, false);
        let record = agg.get(&[1, 2]).unwrap();
        assert_eq!(record.actual_packets(), 2);
        assert_eq!(record.packets[0], record.packets[1]);
    }

    #[test]
    fn expected_count_copied_from_first_packet_only() {
        let mut agg = FrameAggregator::new();
        agg.ingest([7, 7], t(0.0), 10, 3, false);
        // A malformed trace disagrees on the expected count; first one wins.
        agg.ingest([7, 7], t(0.1), 10, 9, false);
        assert_eq!(agg.get(&[7, 7]).unwrap().expected_packets, 3);
    }

    #[test]
    fn arrival_order_preserved_not_sorted() {
        let mut agg = FrameAggregator::new();
        agg.ingest([3, 3], t(2.0), 1, 2, false);
        agg.ingest([3, 3], t(1.0), 2, 2, false); // out-of-order arrival
        let record = agg.get(&[3, 3]).unwrap();
        assert_eq!(record.packets[0].size, 1);
        assert_eq!(record.packets[1].size, 2);
        // Span is last-minus-first by *arrival*, so it can be negative.
        assert!(agg.summarize(&[3, 3]).unwrap().span < 0.0);
    }

    #[test]
    fn iteration_in_first_seen_order() {
        let mut agg = FrameAggregator::new();
        agg.ingest([0, 9], t(1.0), 1, 1, false);
        agg.ingest([0, 1], t(2.0), 1, 1, false);
        agg.ingest([0, 9], t(3.0), 1, 1, false);
        let keys: Vec<FrameSeq> = agg.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![[0, 9], [0, 1]]);
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn unseen_key() {
        let agg = FrameAggregator::new();
        assert!(agg.summarize(&[0, 0]).is_none());
        assert!(agg.is_empty());
    }
}
