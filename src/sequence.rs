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

//! Sequencer program packages.
//!
//! ```text
//! total | 105 | chunk index (1-based) | total chunks | chunk length | data
//! ```

use crate::error::Error;
use crate::protocol::*;
use crate::record;

/// Record header plus index, total and length fields
pub const CHUNK_HEADER_SIZE: usize = RECORD_HEADER_SIZE + 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceChunk {
    pub index: u16,
    pub total: u16,
    pub data: Vec<u8>,
}

impl SequenceChunk {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(6 + self.data.len());
        payload.extend_from_slice(&self.index.to_be_bytes());
        payload.extend_from_slice(&self.total.to_be_bytes());
        payload.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        payload.extend_from_slice(&self.data);

        // Chunk size was bounded by packetize
        let mut out = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
        out.extend_from_slice(&((RECORD_HEADER_SIZE + payload.len()) as u16).to_be_bytes());
        out.extend_from_slice(&LOAD_SEQUENCE_FILE.to_be_bytes());
        out.extend_from_slice(&payload);
        out
    }

    pub fn to_record(&self) -> record::Record {
        let bytes = self.to_bytes();
        record::Record::new(LOAD_SEQUENCE_FILE, bytes[RECORD_HEADER_SIZE..].to_vec())
    }
}

/// Split a sequencer program into numbered packages.
///
/// The total count goes into every header, so the whole program is sliced
/// before any chunk is built.
pub fn packetize(program: &[u8], chunk_size: usize) -> Result<Vec<SequenceChunk>, Error> {
    if chunk_size == 0 || chunk_size % 8 != 0 || CHUNK_HEADER_SIZE + chunk_size > MAX_DATAGRAM {
        return Err(Error::InvalidChunkSize { size: chunk_size, max: MAX_DATAGRAM });
    }
    if program.is_empty() {
        return Err(Error::invalid("sequencer program is empty"));
    }

    let slices: Vec<&[u8]> = program.chunks(chunk_size).collect();
    let total = u16::try_from(slices.len())
        .map_err(|_| Error::invalid(format!("{} chunks overflow the 16-bit chunk counter", slices.len())))?;

    Ok(slices
        .into_iter()
        .enumerate()
        .map(|(i, data)| SequenceChunk { index: i as u16 + 1, total, data: data.to_vec() })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
