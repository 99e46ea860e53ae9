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

//! Record framing and reply classification.
//!
//! Every command and reply on the command channel, and every datagram on the
//! data channel, is a record:
//!
//! ```text
//! +------------+-----------+-----------------+
//! | total (BE) | id (BE)   | payload         |
//! | 2 bytes    | 2 bytes   | total - 4 bytes |
//! +------------+-----------+-----------------+
//! ```

use std::fmt;
use crate::error::{Error, hex};
use crate::protocol::*;

// ============================================================================
// Record
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub record_id: u16,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(record_id: u16, payload: Vec<u8>) -> Self {
        Record { record_id, payload }
    }

    pub fn empty(record_id: u16) -> Self {
        Record { record_id, payload: Vec::new() }
    }

    pub fn total_size(&self) -> usize {
        RECORD_HEADER_SIZE + self.payload.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        encode(self.record_id, &self.payload)
    }

    /// Parse an inbound record, checking the declared size against the buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < RECORD_HEADER_SIZE {
            return Err(Error::MalformedRecord(format!(
                "{} bytes is shorter than the record header",
                bytes.len()
            )));
        }

        let declared = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        if declared != bytes.len() {
            return Err(Error::MalformedRecord(format!(
                "declared {} bytes, received {}",
                declared,
                bytes.len()
            )));
        }

        Ok(Record {
            record_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            payload: bytes[RECORD_HEADER_SIZE..].to_vec(),
        })
    }
}

/// Prepend the total size and record id to `payload`.
pub fn encode(record_id: u16, payload: &[u8]) -> Result<Vec<u8>, Error> {
    let total = RECORD_HEADER_SIZE + payload.len();
    let total = u16::try_from(total).map_err(|_| {
        Error::invalid(format!("record {} payload of {} bytes overflows the size field", record_id, payload.len()))
    })?;

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(&total.to_be_bytes());
    out.extend_from_slice(&record_id.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

// ============================================================================
// Reply codes
// ============================================================================

/// Code carried by an acknowledgement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyCode(pub u16);

impl ReplyCode {
    pub const OK: ReplyCode = ReplyCode(0x0000);

    pub fn message(self) -> Option<&'static str> {
        if self == Self::OK {
            return Some("OK");
        }
        REPLY_MESSAGES
            .binary_search_by_key(&self.0, |&(code, _)| code)
            .ok()
            .map(|i| REPLY_MESSAGES[i].1)
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => f.write_str(msg),
            None => write!(f, "reply code 0x{:04X}", self.0),
        }
    }
}

// Sorted by code.
const REPLY_MESSAGES: &[(u16, &str)] = &[
    (0x2710, "Invalid inum size"),
    (0x2711, "Invalid image type"),
    (0x2712, "Sequence file package out of order"),
    (0x2713, "Error when parsing loaded sequence file. Log can be fetched with Sequencer File Error Log"),
    (0x2714, "Too many sequence file packages (must be <= 20)"),
    (0x2715, "Unknown record id (rec_id) received"),
    (0x2716, "Invalid sequence command"),
    (0x2717, "Mask file package out of order"),
    (0x2718, "Too many mask file packages (must be <= 30)"),
    (0x2719, "Accessing invalid FPGA register. [Internal]"),
    (0x271A, "Translated sequence file is too large"),
    (0x271B, "No contact with LED driver or accessing invalid LED driver register. [Internal]"),
    (0x271C, "Trying to set an invalid sequence register"),
    (0x271D, "Focus motor number of steps out of range"),
    (0x271E, "Focus motor is busy or in a mode where command cannot be performed"),
    (0x271F, "Focus motor measured distance out of range"),
    (0x2720, "Focus motor CCD thickness out of range"),
    (0x2721, "Focus motor absolute position out of range"),
    (0x2722, "Focus motor has not been set to mid position"),
    (0x2723, "Focus motor measured distance never entered"),
    (0x2724, "Mask file with invalid format (not bmp, not 8-bit, etc)"),
    (0x2725, "LED driver amplitude value out of range"),
    (0x2726, "Temperature regulation setvalue out of range"),
    (0x2727, "Focus motor step size conversion unit out of range"),
    (0x2728, "Internal sync pulse period outside valid range"),
    (0x2729, "AF trim value is outside valid range"),
    (0x272A, "AF work range is outside valid range"),
    (0x272B, "AF time delay value is outside valid range"),
    (0x272C, "AF calibration set-position is outside valid range"),
    (0x272D, "AF pull-in range acceleration limit is outside valid range"),
    (0x272E, "AF speed high threshold is outside valid range"),
    (0x272F, "Laser intensity level is outside valid range"),
    (0x2730, "Trig delay outside valid range"),
    (0x2731, "Active Area Qualifier Keepout parameters are outside valid range"),
    (0x2732, "Active Area Qualifier Keepout parameters add up to more than the active number of pulses"),
    (0x2733, "Trig divide factor outside valid range"),
    (0x2734, "<Currently unused>"),
    (0x2735, "OCP limit is out of range"),
    (0x2736, "Strip number out of range"),
    (0x2737, "Internal image number out of range or permanent storage error"),
    (0x2738, "Not possible to load sequence file. No file has been loaded previously"),
    (0x2739, "Invalid fan number"),
    (0x273A, "Absolute Z position for AF is outside valid range"),
    (0x273B, "Invalid morph record"),
    (0x273C, "Led driver firmware package out of order"),
    (0x273D, "Led driver firmware crc error"),
    (0x273E, "Led driver firmware verification failed"),
    (0x273F, "Led driver firmware upgrade ok"),
    (0x2740, "Invalid address"),
    (0x2741, "Invalid data"),
    (0x2742, "Command not supported by old led driver fw"),
    (0x2743, "<Reserved>"),
    (0x2744, "Overlay text parameter out of range"),
    (0x2745, "SSD Error: Ublaze can not start"),
    (0x2746, "SSD Error: Physical state error"),
    (0x2747, "SSD Error: Align count off"),
    (0x2748, "SSD Error: Bad link"),
    (0x2749, "SSD Error: Bad transport layer"),
    (0x274A, "SSD Error: Loop counter stopped"),
];

// ============================================================================
// Reply classification
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Ok,
    /// Acknowledgement carrying a known error code.
    Rejected(ReplyCode),
    /// Anything else, including data-bearing replies. Not an error by itself.
    Unknown { raw_hex: String },
}

impl ReplyOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ReplyOutcome::Ok)
    }
}

impl fmt::Display for ReplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyOutcome::Ok => f.write_str("OK"),
            ReplyOutcome::Rejected(code) => write!(f, "{}", code),
            ReplyOutcome::Unknown { raw_hex } => write!(f, "unknown reply {}", raw_hex),
        }
    }
}

/// Look a reply up in the acknowledgement table.
pub fn classify_reply(bytes: &[u8]) -> ReplyOutcome {
    if let Some(code) = ack_code(bytes) {
        if code == ReplyCode::OK {
            return ReplyOutcome::Ok;
        }
        if code.message().is_some() {
            return ReplyOutcome::Rejected(code);
        }
    }
    ReplyOutcome::Unknown { raw_hex: hex(bytes) }
}

fn ack_code(bytes: &[u8]) -> Option<ReplyCode> {
    let record = Record::decode(bytes).ok()?;
    if record.record_id != REPLY_ACK || record.payload.len() != 2 {
        return None;
    }
    Some(ReplyCode(u16::from_be_bytes([record.payload[0], record.payload[1]])))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header() {
        let bytes = encode(SET_INUM_SIZE, &[0x04, 0x38]).unwrap();
        assert_eq!(bytes, vec![0x00, 0x06, 0x00, 0x66, 0x04, 0x38]);

        let bytes = encode(REQUEST_SEQ_NO_ERROR, &[]).unwrap();
        assert_eq!(bytes, vec![0x00, 0x04, 0x01, 0x37]);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; u16::MAX as usize];
        assert!(matches!(encode(LOAD_IMAGE_DATA, &payload), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_decode() {
        let record = Record::decode(&[0x00, 0x06, 0x01, 0x2E, 0x04, 0x38]).unwrap();
        assert_eq!(record.record_id, 302);
        assert_eq!(record.payload, vec![0x04, 0x38]);
        assert_eq!(record.total_size(), 6);
    }

    #[test]
    fn test_decode_length_mismatch() {
        assert!(matches!(
            Record::decode(&[0x00, 0x08, 0x01, 0xF5, 0x00, 0x00]),
            Err(Error::MalformedRecord(_))
        ));
        assert!(matches!(Record::decode(&[0x00, 0x04, 0x01]), Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn test_classify_ok() {
        assert_eq!(classify_reply(&[0x00, 0x06, 0x01, 0xF5, 0x00, 0x00]), ReplyOutcome::Ok);
    }

    #[test]
    fn test_classify_invalid_inum_size() {
        let outcome = classify_reply(&[0x00, 0x06, 0x01, 0xF5, 0x27, 0x10]);
        assert_eq!(outcome, ReplyOutcome::Rejected(ReplyCode(0x2710)));
        assert_eq!(outcome.to_string(), "Invalid inum size");
    }

    #[test]
    fn test_classify_last_code() {
        let outcome = classify_reply(&[0x00, 0x06, 0x01, 0xF5, 0x27, 0x4A]);
        assert_eq!(outcome.to_string(), "SSD Error: Loop counter stopped");
    }

    #[test]
    fn test_classify_unknown_code() {
        let outcome = classify_reply(&[0x00, 0x06, 0x01, 0xF5, 0x27, 0x4B]);
        assert_eq!(outcome, ReplyOutcome::Unknown { raw_hex: "000601f5274b".into() });
    }

    #[test]
    fn test_classify_data_reply_is_unknown() {
        // Slot size reply: 1080 rows
        let outcome = classify_reply(&[0x00, 0x06, 0x01, 0x2E, 0x04, 0x38]);
        assert!(matches!(outcome, ReplyOutcome::Unknown { .. }));
        assert!(!outcome.is_ok());
    }

    #[test]
    fn test_reply_table_sorted() {
        assert!(REPLY_MESSAGES.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(REPLY_MESSAGES.len(), 0x274A - 0x2710 + 1);
    }
}
