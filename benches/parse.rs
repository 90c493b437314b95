// Copyright (C) 2026 the zoomtrace authors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion};
use zoomtrace::{packet, FilterContext, RawPacket};

const LOCAL: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

/// A representative video datagram: vendor header, RTP header with one
/// extension entry, FU-A start fragment, ~1100 bytes of bitstream.
fn video_datagram() -> RawPacket {
    let mut payload = vec![0u8; 24];
    payload[0] = 16; // video
    payload[21] = 0x1a;
    payload[22] = 0x2b;
    payload[23] = 18;
    payload.extend_from_slice(&[
        0x90, 0x62, 0x12, 0x34, // v=2 ext, pt=98, seq
        0x00, 0x01, 0xe2, 0x40, // timestamp
        0x0b, 0xad, 0xca, 0xfe, // ssrc
        0xbe, 0xde, 0x00, 0x01, // extension: profile, 1 word
        0x12, 0x00, 0x2a, 0x00, // entry id=1, 3-byte value
    ]);
    payload.extend_from_slice(&[0x7c, 0x85, 0x20, 0x40, 0x03]);
    payload.resize(payload.len() + 1100, 0x5a);
    RawPacket {
        payload: Bytes::from(payload),
        timestamp: 1_673_187_485.000_123,
        source: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5)), 52713),
        destination: SocketAddr::new(LOCAL, 52712),
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let ctx = FilterContext { local_ip: LOCAL };
    let pkt = video_datagram();
    c.bench_function("parse_video_datagram", |b| {
        b.iter(|| packet::parse(&pkt, &ctx).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
