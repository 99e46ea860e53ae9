// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Image data packets.
//!
//! Both modes wrap the data in a load-image-data record:
//!
//! ```text
//! Raw:  total | 104 | index (2, from 0) | inum (2) | line offset (6) | lines
//! Rle:  total | 104 | seq   (2, from 1) | inum (2) | line offset (4) | encoded row
//! ```

use crate::error::Error;
use crate::protocol::*;
use crate::rle::{self, EncodedRows};

// ============================================================================
// Transfer mode
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Uncompressed 1-bit lines, several lines per packet
    Raw,
    /// One Type 5 RLE encoded row per packet
    Rle,
}

impl TransferMode {
    /// Value for the set-image-type record
    pub fn image_type(self) -> u16 {
        match self {
            TransferMode::Raw => 4,
            TransferMode::Rle => 5,
        }
    }

    /// Width of the line offset field
    pub fn offset_width(self) -> usize {
        match self {
            TransferMode::Raw => 6,
            TransferMode::Rle => 4,
        }
    }

    pub fn header_size(self) -> usize {
        RECORD_HEADER_SIZE + 2 + 2 + self.offset_width()
    }

    /// Sequence number stamped on the first packet
    pub fn first_sequence(self) -> u16 {
        match self {
            TransferMode::Raw => 0,
            TransferMode::Rle => 1,
        }
    }
}

// ============================================================================
// Raster
// ============================================================================

/// A packed 1-bit raster, rows MSB first.
#[derive(Debug, Clone, Copy)]
pub struct Raster<'a> {
    pub width: usize,
    pub bytes: &'a [u8],
}

impl<'a> Raster<'a> {
    pub fn new(width: usize, bytes: &'a [u8]) -> Self {
        Raster { width, bytes }
    }

    pub fn bytes_per_line(&self) -> usize {
        self.width / 8
    }

    pub fn lines(&self) -> usize {
        match self.bytes_per_line() {
            0 => 0,
            bpl => self.bytes.len() / bpl,
        }
    }
}

// ============================================================================
// Packet
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub mode: TransferMode,
    pub sequence: u16,
    pub inum: u16,
    pub line_offset: u32,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn len(&self) -> usize {
        self.mode.header_size() + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let total = self.len();
        let mut out = Vec::with_capacity(total);
        // Size was bounded when the packet was built
        out.extend_from_slice(&(total as u16).to_be_bytes());
        out.extend_from_slice(&LOAD_IMAGE_DATA.to_be_bytes());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.inum.to_be_bytes());
        let offset = (self.line_offset as u64).to_be_bytes();
        out.extend_from_slice(&offset[8 - self.mode.offset_width()..]);
        out.extend_from_slice(&self.payload);
        out
    }
}

// ============================================================================
// Packetizer
// ============================================================================

/// Lazy packet stream for one raster. Clone to restart from the first packet.
#[derive(Debug, Clone)]
pub struct ImagePackets<'a> {
    inner: Source<'a>,
    inum: u16,
    lines_per_packet: usize,
    index: usize,
    count: usize,
}

#[derive(Debug, Clone)]
enum Source<'a> {
    Raw(std::slice::ChunksExact<'a, u8>),
    Rle(EncodedRows<'a>),
}

impl ImagePackets<'_> {
    pub fn mode(&self) -> TransferMode {
        match self.inner {
            Source::Raw(_) => TransferMode::Raw,
            Source::Rle(_) => TransferMode::Rle,
        }
    }

    pub fn packet_count(&self) -> usize {
        self.count
    }
}

impl Iterator for ImagePackets<'_> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.index >= self.count {
            return None;
        }
        let mode = self.mode();
        let payload = match &mut self.inner {
            Source::Raw(chunks) => chunks.next()?.to_vec(),
            Source::Rle(rows) => rows.next()?,
        };

        let packet = Packet {
            mode,
            sequence: mode.first_sequence() + self.index as u16,
            inum: self.inum,
            line_offset: (self.index * self.lines_per_packet) as u32,
            payload,
        };
        self.index += 1;
        Some(packet)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ImagePackets<'_> {}

/// Split a raster into load-image-data packets.
///
/// Raw mode packs `lines_per_packet` lines per packet and requires the
/// raster to divide evenly. RLE mode sends one encoded row per packet, so
/// `lines_per_packet` must be 1.
pub fn packetize<'a>(
    inum: u32,
    lines_per_packet: usize,
    raster: Raster<'a>,
    mode: TransferMode,
) -> Result<ImagePackets<'a>, Error> {
    let inum = u16::try_from(inum).map_err(|_| Error::invalid(format!("inum {} exceeds 65535", inum)))?;

    if raster.width == 0 || raster.width % 8 != 0 {
        return Err(Error::invalid(format!("width {} is not a non-zero multiple of 8", raster.width)));
    }
    let bpl = raster.bytes_per_line();
    if raster.bytes.is_empty() {
        return Err(Error::invalid("raster is empty"));
    }
    if raster.bytes.len() % bpl != 0 {
        return Err(Error::invalid(format!(
            "raster of {} bytes is not a multiple of {} bytes per line",
            raster.bytes.len(),
            bpl
        )));
    }
    if lines_per_packet == 0 {
        return Err(Error::invalid("lines per packet must be at least 1"));
    }

    let count = raster.lines() / lines_per_packet;
    if count == 0 {
        return Err(Error::invalid(format!(
            "raster of {} lines is shorter than one packet of {} lines",
            raster.lines(),
            lines_per_packet
        )));
    }
    let last_sequence = mode.first_sequence() as usize + count - 1;
    if last_sequence > u16::MAX as usize {
        return Err(Error::invalid(format!("{} packets overflow the 16-bit sequence number", count)));
    }

    let inner = match mode {
        TransferMode::Raw => {
            let payload_size = lines_per_packet * bpl;
            if raster.bytes.len() % payload_size != 0 {
                return Err(Error::invalid(format!(
                    "raster of {} bytes is not a multiple of {} bytes per packet",
                    raster.bytes.len(),
                    payload_size
                )));
            }
            if mode.header_size() + payload_size > MAX_DATAGRAM {
                return Err(Error::invalid(format!(
                    "packet of {} bytes exceeds {}",
                    mode.header_size() + payload_size,
                    MAX_DATAGRAM
                )));
            }
            Source::Raw(raster.bytes.chunks_exact(payload_size))
        }
        TransferMode::Rle => {
            if lines_per_packet != 1 {
                return Err(Error::invalid(format!(
                    "RLE mode sends one line per packet, got {}",
                    lines_per_packet
                )));
            }
            // Worst case every byte becomes a 2-byte raw descriptor
            if 2 * bpl > MAX_IMAGE_DATA {
                return Err(Error::invalid(format!(
                    "encoded line may reach {} bytes, exceeding {}",
                    2 * bpl,
                    MAX_IMAGE_DATA
                )));
            }
            Source::Rle(rle::encode_image(raster.bytes, raster.width)?)
        }
    };

    Ok(ImagePackets { inner, inum, lines_per_packet, index: 0, count })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_raw_header_matches_wire() {
        let raster = gradient(240 * 12);
        let packets: Vec<Packet> = packetize(3, 6, Raster::new(1920, &raster), TransferMode::Raw).unwrap().collect();
        assert_eq!(packets.len(), 2);

        let bytes = packets[1].to_bytes();
        assert_eq!(bytes.len(), 1454);
        assert_eq!(&bytes[..14], &[0x05, 0xAE, 0x00, 0x68, 0x00, 0x01, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06]);
        assert_eq!(&bytes[14..], &raster[1440..]);
    }

    #[test]
    fn test_rle_header_matches_wire() {
        let raster = vec![0x00; 240 * 3];
        let packets: Vec<Packet> = packetize(7, 1, Raster::new(1920, &raster), TransferMode::Rle).unwrap().collect();
        assert_eq!(packets.len(), 3);

        let bytes = packets[2].to_bytes();
        assert_eq!(
            bytes,
            vec![0x00, 0x0E, 0x00, 0x68, 0x00, 0x03, 0x00, 0x07, 0x00, 0x00, 0x00, 0x02, 0xB8, 0xF0]
        );
    }

    #[test]
    fn test_inum_out_of_range() {
        let raster = vec![0u8; 240];
        let err = packetize(65536, 1, Raster::new(1920, &raster), TransferMode::Raw).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(msg) if msg.contains("inum")));
    }

    #[test]
    fn test_partial_line_rejected() {
        let raster = vec![0u8; 241];
        let err = packetize(0, 1, Raster::new(1920, &raster), TransferMode::Raw).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(msg) if msg.contains("bytes per line")));
    }

    #[test]
    fn test_partial_packet_rejected() {
        let raster = vec![0u8; 240 * 7];
        let err = packetize(0, 6, Raster::new(1920, &raster), TransferMode::Raw).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(msg) if msg.contains("bytes per packet")));
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let raster = vec![0u8; 240 * 7];
        let err = packetize(0, 7, Raster::new(1920, &raster), TransferMode::Raw).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(msg) if msg.contains("exceeds 1500")));
    }

    #[test]
    fn test_bad_width_and_empty_raster() {
        assert!(packetize(0, 1, Raster::new(1921, &[0u8; 240]), TransferMode::Raw).is_err());
        assert!(packetize(0, 1, Raster::new(1920, &[]), TransferMode::Raw).is_err());
        assert!(packetize(0, 0, Raster::new(1920, &[0u8; 240]), TransferMode::Raw).is_err());
    }

    #[test]
    fn test_rle_requires_single_line() {
        let raster = vec![0u8; 240 * 2];
        assert!(packetize(0, 2, Raster::new(1920, &raster), TransferMode::Rle).is_err());
    }

    #[test]
    fn test_rle_payloads_decode_to_raster() {
        let mut raster = vec![0x00; 240];
        raster.extend_from_slice(&[0xFF; 240]);
        raster.extend(gradient(240));

        let packets = packetize(0, 1, Raster::new(1920, &raster), TransferMode::Rle).unwrap();
        let decoded: Vec<u8> = packets
            .clone()
            .flat_map(|p| rle::decode_row(&p.payload, 1920).unwrap())
            .collect();
        assert_eq!(decoded, raster);

        let sequences: Vec<u16> = packets.map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_packet_stream_restarts() {
        let raster = gradient(240 * 10);
        let packets = packetize(1, 5, Raster::new(1920, &raster), TransferMode::Raw).unwrap();
        assert_eq!(packets.packet_count(), 2);
        assert_eq!(packets.clone().count(), 2);
        assert_eq!(packets.clone().next().unwrap().line_offset, 0);
        assert_eq!(packets.len(), 2);
    }

    proptest! {
        #[test]
        fn raw_packets_reassemble_raster(
            bytes_per_line in 1usize..64,
            lines_per_packet in 1usize..8,
            packets in 1usize..20,
        ) {
            let raster = gradient(bytes_per_line * lines_per_packet * packets);
            let width = bytes_per_line * 8;
            let stream = packetize(9, lines_per_packet, Raster::new(width, &raster), TransferMode::Raw).unwrap();
            prop_assert_eq!(stream.len(), (raster.len() / bytes_per_line) / lines_per_packet);

            let mut rebuilt = Vec::new();
            for (i, packet) in stream.enumerate() {
                prop_assert_eq!(packet.sequence as usize, i);
                prop_assert_eq!(packet.line_offset as usize, i * lines_per_packet);
                prop_assert_eq!(packet.inum, 9);
                rebuilt.extend_from_slice(&packet.payload);
            }
            prop_assert_eq!(rebuilt, raster);
        }
    }
}
