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

//! Visitech Type 5 run-length coding of 1-bit raster rows.
//!
//! A row is a sequence of 16-bit big-endian descriptors:
//!
//! ```text
//! RUN  1 | bit | transition (3) | length in bytes (11)
//! RAW  0 | 0000000             | byte (8)
//! ```
//!
//! A run covers `length` bytes of its bit value. When `transition < 7` the
//! last byte switches to the opposite bit after position `transition`
//! (MSB first). Runs never continue into the next row.

use crate::error::Error;

/// Largest byte count an 11-bit run length can hold
pub const MAX_RUN_BYTES: usize = 0x7FF;

// ============================================================================
// Descriptor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor {
    Run { bit: bool, transition: u8, length: u16 },
    Raw(u8),
}

impl Descriptor {
    pub fn to_word(self) -> u16 {
        match self {
            Descriptor::Run { bit, transition, length } => {
                0x8000 | ((bit as u16) << 14) | (((transition & 0x7) as u16) << 11) | (length & 0x7FF)
            }
            Descriptor::Raw(byte) => byte as u16,
        }
    }

    pub fn from_word(word: u16) -> Self {
        if word & 0x8000 != 0 {
            Descriptor::Run {
                bit: word & 0x4000 != 0,
                transition: ((word >> 11) & 0x7) as u8,
                length: word & 0x7FF,
            }
        } else {
            Descriptor::Raw((word & 0xFF) as u8)
        }
    }

    fn expand_into(self, out: &mut Vec<u8>) {
        match self {
            Descriptor::Run { length: 0, .. } => {}
            Descriptor::Run { bit, transition, length } => {
                let fill = if bit { 0xFF } else { 0x00 };
                let keep = 0xFFu8 << (7 - transition);
                out.extend(std::iter::repeat_n(fill, length as usize - 1));
                out.push((fill & keep) | (!fill & !keep));
            }
            Descriptor::Raw(byte) => out.push(byte),
        }
    }
}

// ============================================================================
// Row coding
// ============================================================================

fn bit_at(row: &[u8], pos: usize) -> bool {
    row[pos / 8] & (0x80 >> (pos % 8)) != 0
}

/// True when the bits of `byte` after the first `used` are all `!bit`.
fn tail_is_complement(byte: u8, used: usize, bit: bool) -> bool {
    let mask = 0xFFu8 >> used;
    if bit { byte & mask == 0 } else { byte & mask == mask }
}

/// Encode one row of `width / 8` bytes.
pub fn encode_row(row: &[u8], width: usize) -> Result<Vec<u8>, Error> {
    check_width(width)?;
    if row.len() != width / 8 {
        return Err(Error::invalid(format!(
            "row of {} bytes, expected {} for width {}",
            row.len(),
            width / 8,
            width
        )));
    }

    let mut out = Vec::with_capacity(row.len());
    for descriptor in descriptors(row) {
        out.extend_from_slice(&descriptor.to_word().to_be_bytes());
    }
    Ok(out)
}

/// Greedy descriptor stream for one row.
pub fn descriptors(row: &[u8]) -> Vec<Descriptor> {
    let total_bits = row.len() * 8;
    let mut result = Vec::new();
    let mut byte = 0;

    while byte < row.len() {
        let start = byte * 8;
        let bit = bit_at(row, start);

        let mut end = start + 1;
        while end < total_bits && bit_at(row, end) == bit {
            end += 1;
        }
        let run_bits = end - start;

        if run_bits < 8 {
            result.push(Descriptor::Raw(row[byte]));
            byte += 1;
            continue;
        }

        let full = run_bits / 8;
        let tail = run_bits % 8;
        let (mut length, mut transition) = if tail > 0 && tail_is_complement(row[byte + full], tail, bit) {
            (full + 1, (tail - 1) as u8)
        } else {
            (full, 7)
        };

        if length > MAX_RUN_BYTES {
            length = MAX_RUN_BYTES;
            transition = 7;
        }

        result.push(Descriptor::Run { bit, transition, length: length as u16 });
        byte += length;
    }

    result
}

/// Decode one row, checking it expands to exactly `width / 8` bytes.
pub fn decode_row(encoded: &[u8], width: usize) -> Result<Vec<u8>, Error> {
    check_width(width)?;
    if encoded.len() % 2 != 0 {
        return Err(Error::MalformedRle(format!("odd length {}", encoded.len())));
    }

    let mut out = Vec::with_capacity(width / 8);
    for word in encoded.chunks_exact(2) {
        Descriptor::from_word(u16::from_be_bytes([word[0], word[1]])).expand_into(&mut out);
    }

    if out.len() != width / 8 {
        return Err(Error::MalformedRle(format!(
            "row decoded to {} bytes, expected {}",
            out.len(),
            width / 8
        )));
    }
    Ok(out)
}

fn check_width(width: usize) -> Result<(), Error> {
    if width == 0 || width % 8 != 0 {
        return Err(Error::invalid(format!("width {} is not a non-zero multiple of 8", width)));
    }
    Ok(())
}

// ============================================================================
// Image coding
// ============================================================================

/// Lazily encoded rows of a raster. Clone to restart from the first row.
#[derive(Debug, Clone)]
pub struct EncodedRows<'a> {
    rows: std::slice::ChunksExact<'a, u8>,
}

impl Iterator for EncodedRows<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        // Row length was checked when the iterator was built
        self.rows.next().map(|row| {
            let mut out = Vec::with_capacity(row.len());
            for descriptor in descriptors(row) {
                out.extend_from_slice(&descriptor.to_word().to_be_bytes());
            }
            out
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for EncodedRows<'_> {}

/// Encode every row of a packed 1-bit raster.
pub fn encode_image(raster: &[u8], width: usize) -> Result<EncodedRows<'_>, Error> {
    check_width(width)?;
    let bytes_per_row = width / 8;
    if raster.len() % bytes_per_row != 0 {
        return Err(Error::invalid(format!(
            "raster of {} bytes is not a multiple of {} bytes per line",
            raster.len(),
            bytes_per_row
        )));
    }
    Ok(EncodedRows { rows: raster.chunks_exact(bytes_per_row) })
}

// ============================================================================
// Tests
// ============================================================================
