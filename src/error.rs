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

use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong between the caller and the projector.
#[derive(Debug, Error)]
pub enum Error {
    // ── Caller errors, raised before any I/O ─────────────────────
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid chunk size {size}: must be a non-zero multiple of 8 and fit a {max}-byte datagram")]
    InvalidChunkSize { size: usize, max: usize },

    // ── Wire errors ──────────────────────────────────────────────
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("malformed RLE row: {0}")]
    MalformedRle(String),

    #[error("unexpected reply to record {request}: {raw_hex}")]
    UnexpectedReply { request: u16, raw_hex: String },

    #[error("unknown reply: {raw_hex}")]
    UnknownReply { raw_hex: String },

    #[error("record {record_id} rejected: {message}")]
    Rejected { record_id: u16, message: String },

    // ── Session errors ───────────────────────────────────────────
    #[error("priming record {record_id} failed: {reply}")]
    PrimingFailed { record_id: u16, reply: String },

    #[error("finalization record {record_id} failed: {reply}")]
    FinalizeFailed { record_id: u16, reply: String },

    #[error("sequencer program rejected: {log}")]
    SequenceRejected { log: String },

    #[error("transfer incomplete: {delivered} of {total} packets delivered after {repairs} repair bursts")]
    TransferIncomplete { delivered: usize, total: usize, repairs: u32 },

    // ── Transport errors ─────────────────────────────────────────
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }
}

/// Lowercase hex without separators, the form unknown replies are reported in.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = Error::InvalidChunkSize { size: 1441, max: 1500 };
        assert!(e.to_string().contains("1441"));

        let e = Error::TransferIncomplete { delivered: 57, total: 100, repairs: 3 };
        assert!(e.to_string().contains("57 of 100"));
    }

    #[test]
    fn test_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Transport(_)));
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x00, 0x06, 0x01, 0xF5]), "000601f5");
        assert_eq!(hex(&[]), "");
    }
}
