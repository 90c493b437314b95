// Copyright (C) 2026 the zoomtrace authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-NAL codec extension headers carried at the front of the video
//! bitstream: either the 3-byte single-view MVC extension or the 2-byte
//! multiview/3D form.
//!
//! The top bit of the first byte selects the variant; everything after that
//! is plain bit extraction. Any 2-3 bytes decode to *something*, so the only
//! failure here is running out of buffer.

use crate::PacketError;

/// The 3-byte extension (selector bit 0), a 23-bit packed value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SingleViewExtension {
    pub non_idr_flag: bool,
    /// 6 bits.
    pub priority_id: u8,
    /// 10 bits.
    pub view_id: u16,
    /// 3 bits.
    pub temporal_id: u8,
    pub anchor_pic_flag: bool,
    pub inter_view_flag: bool,
    pub reserved_one_bit: bool,
}

/// The 2-byte multiview/3D extension (selector bit 1), a 16-bit packed value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MultiViewExtension {
    /// 8 bits.
    pub view_idx: u8,
    pub depth_flag: bool,
    pub non_idr_flag: bool,
    /// 3 bits.
    pub temporal_id: u8,
    pub anchor_pic_flag: bool,
    pub inter_view_flag: bool,
}

/// One of the two mutually exclusive codec extension forms.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CodecExtension {
    SingleView(SingleViewExtension),
    MultiView(MultiViewExtension),
}

impl CodecExtension {
    /// Decodes the extension at the start of `data`. The variant is chosen
    /// solely by the top bit of `data[0]`.
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        let first = *data.first().ok_or(PacketError::TruncatedPacket {
            layer: "codec extension",
            needed: 1,
            have: 0,
        })?;
        if first >> 7 == 0 {
            if data.len() < 3 {
                return Err(PacketError::TruncatedPacket {
                    layer: "codec extension (single-view)",
                    needed: 3,
                    have: data.len(),
                });
            }
            let v = u32::from_be_bytes([0, data[0], data[1], data[2]]);
            Ok(CodecExtension::SingleView(SingleViewExtension {
                non_idr_flag: (v >> 22) & 1 != 0,
                priority_id: ((v >> 16) & 0b11_1111) as u8,
                view_id: ((v >> 6) & 0b11_1111_1111) as u16,
                temporal_id: ((v >> 3) & 0b111) as u8,
                anchor_pic_flag: (v >> 2) & 1 != 0,
                inter_view_flag: (v >> 1) & 1 != 0,
                reserved_one_bit: v & 1 != 0,
            }))
        } else {
            if data.len() < 2 {
                return Err(PacketError::TruncatedPacket {
                    layer: "codec extension (multiview)",
                    needed: 2,
                    have: data.len(),
                });
            }
            let v = u16::from_be_bytes([data[0], data[1]]);
            Ok(CodecExtension::MultiView(MultiViewExtension {
                view_idx: ((v >> 7) & 0xff) as u8,
                depth_flag: (v >> 6) & 1 != 0,
                non_idr_flag: (v >> 5) & 1 != 0,
                temporal_id: ((v >> 2) & 0b111) as u8,
                anchor_pic_flag: (v >> 1) & 1 != 0,
                inter_view_flag: v & 1 != 0,
            }))
        }
    }
}
