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

//! Command-channel records and the replies that carry data.

use crate::error::{Error, hex};
use crate::protocol::*;
use crate::record::{Record, ReplyOutcome, classify_reply};

/// Largest amplitude the LED driver accepts
pub const MAX_LED_AMPLITUDE: u16 = 4095;

// ============================================================================
// Sequencer commands
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerCommand {
    /// enable = running
    Run,
    /// enable = held in reset
    Reset,
}

impl SequencerCommand {
    fn code(self) -> u8 {
        match self {
            SequencerCommand::Run => 1,
            SequencerCommand::Reset => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(SequencerCommand::Run),
            2 => Some(SequencerCommand::Reset),
            _ => None,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetInumSize { rows: u16 },
    SetImageType { image_type: u16 },
    ResetSeqNo,
    SetSequencerState { command: SequencerCommand, enable: bool },
    SetSoftwareSync { high: bool },
    SetLedAmplitude { led: u16, amplitude: u16 },
    SetFlatnessMaskOn { enable: bool },
    SetLoadInternalImage { image: u8 },
    LoadFlatnessMask { package: u16, total: u16, data: Vec<u8> },

    RequestInumSize,
    RequestImageType,
    RequestSeqNoError,
    RequestSequencerState { command: SequencerCommand },
    RequestLedAmplitude { led: u16 },
    RequestLedStatus { led: u16 },
    RequestLedTemperature { led: u16 },
    RequestFlatnessMaskOn,
    RequestLoadInternalImage,
    RequestSeqFileErrorLog,
}

impl Command {
    pub fn halt_sequencer() -> Self {
        Command::SetSequencerState { command: SequencerCommand::Run, enable: false }
    }

    pub fn run_sequencer() -> Self {
        Command::SetSequencerState { command: SequencerCommand::Run, enable: true }
    }

    pub fn hold_sequencer_in_reset() -> Self {
        Command::SetSequencerState { command: SequencerCommand::Reset, enable: true }
    }

    pub fn release_sequencer_reset() -> Self {
        Command::SetSequencerState { command: SequencerCommand::Reset, enable: false }
    }

    pub fn record_id(&self) -> u16 {
        match self {
            Command::SetInumSize { .. } => SET_INUM_SIZE,
            Command::SetImageType { .. } => SET_IMAGE_TYPE,
            Command::ResetSeqNo => RESET_SEQ_NO,
            Command::SetSequencerState { .. } => SET_SEQUENCER_STATE,
            Command::SetSoftwareSync { .. } => SET_SOFTWARE_SYNC,
            Command::SetLedAmplitude { .. } => SET_LED_AMPLITUDE,
            Command::SetFlatnessMaskOn { .. } => SET_FLATNESS_MASK_ON,
            Command::SetLoadInternalImage { .. } => SET_LOAD_INTERNAL_IMAGE,
            Command::LoadFlatnessMask { .. } => LOAD_FLATNESS_MASK,
            Command::RequestInumSize => REQUEST_INUM_SIZE,
            Command::RequestImageType => REQUEST_IMAGE_TYPE,
            Command::RequestSeqNoError => REQUEST_SEQ_NO_ERROR,
            Command::RequestSequencerState { .. } => REQUEST_SEQUENCER_STATE,
            Command::RequestLedAmplitude { .. } => REQUEST_LED_AMPLITUDE,
            Command::RequestLedStatus { .. } => REQUEST_LED_STATUS,
            Command::RequestLedTemperature { .. } => REQUEST_LED_TEMPERATURE,
            Command::RequestFlatnessMaskOn => REQUEST_FLATNESS_MASK_ON,
            Command::RequestLoadInternalImage => REQUEST_LOAD_INTERNAL_IMAGE,
            Command::RequestSeqFileErrorLog => REQUEST_SEQ_FILE_ERROR_LOG,
        }
    }

    /// Build the record, validating the ranges the projector would reject.
    pub fn to_record(&self) -> Result<Record, Error> {
        let payload = match self {
            Command::SetInumSize { rows } => rows.to_be_bytes().to_vec(),
            Command::SetImageType { image_type } => image_type.to_be_bytes().to_vec(),
            Command::SetSequencerState { command, enable } => vec![command.code(), *enable as u8],
            Command::SetSoftwareSync { high } => vec![*high as u8],
            Command::SetLedAmplitude { led, amplitude } => {
                if *amplitude > MAX_LED_AMPLITUDE {
                    return Err(Error::invalid(format!(
                        "LED amplitude {} exceeds {}",
                        amplitude, MAX_LED_AMPLITUDE
                    )));
                }
                let mut p = led.to_be_bytes().to_vec();
                p.extend_from_slice(&amplitude.to_be_bytes());
                p
            }
            Command::SetFlatnessMaskOn { enable } => vec![*enable as u8],
            Command::SetLoadInternalImage { image } => vec![*image],
            Command::LoadFlatnessMask { package, total, data } => {
                if data.is_empty() || data.len() > MAX_IMAGE_DATA {
                    return Err(Error::invalid(format!(
                        "flatness mask package of {} bytes, must be 1..={}",
                        data.len(),
                        MAX_IMAGE_DATA
                    )));
                }
                let mut p = Vec::with_capacity(6 + data.len());
                p.extend_from_slice(&package.to_be_bytes());
                p.extend_from_slice(&total.to_be_bytes());
                p.extend_from_slice(&(data.len() as u16).to_be_bytes());
                p.extend_from_slice(data);
                p
            }
            Command::RequestSequencerState { command } => vec![command.code()],
            Command::RequestLedAmplitude { led }
            | Command::RequestLedStatus { led }
            | Command::RequestLedTemperature { led } => led.to_be_bytes().to_vec(),
            Command::ResetSeqNo
            | Command::RequestInumSize
            | Command::RequestImageType
            | Command::RequestSeqNoError
            | Command::RequestFlatnessMaskOn
            | Command::RequestLoadInternalImage
            | Command::RequestSeqFileErrorLog => Vec::new(),
        };
        Ok(Record::new(self.record_id(), payload))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        self.to_record()?.to_bytes()
    }
}

// ============================================================================
// Data replies
// ============================================================================

/// Result of the out-of-sequence check after an image burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapReport {
    NoGap,
    /// Sequence number of the last packet received in order.
    LastGood(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerState {
    pub command: SequencerCommand,
    pub enabled: bool,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedAmplitude {
    pub led: u16,
    pub amplitude: u16,
    pub read_ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedStatus {
    pub led: u16,
    pub status: u16,
    pub read_ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedTemperature {
    pub led: u16,
    pub led_celsius: f32,
    pub board_celsius: f32,
    pub read_ok: bool,
}

/// Decode a data reply to `request`, surfacing acknowledgement rejections.
///
/// Returns the payload once the reply is known to carry `reply_id` and at
/// least `min_len` bytes.
fn data_payload(request: u16, reply_id: u16, bytes: &[u8], min_len: usize) -> Result<Vec<u8>, Error> {
    if let ReplyOutcome::Rejected(code) = classify_reply(bytes) {
        return Err(Error::Rejected { record_id: request, message: code.to_string() });
    }

    let record = Record::decode(bytes)?;
    if record.record_id != reply_id || record.payload.len() < min_len {
        return Err(Error::UnexpectedReply { request, raw_hex: hex(bytes) });
    }
    Ok(record.payload)
}

fn be16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

pub fn parse_inum_size(bytes: &[u8]) -> Result<u16, Error> {
    let p = data_payload(REQUEST_INUM_SIZE, REQUEST_INUM_SIZE, bytes, 2)?;
    Ok(be16(&p))
}

pub fn parse_image_type(bytes: &[u8]) -> Result<u16, Error> {
    let p = data_payload(REQUEST_IMAGE_TYPE, REQUEST_IMAGE_TYPE, bytes, 2)?;
    Ok(be16(&p))
}

pub fn parse_gap_report(bytes: &[u8]) -> Result<GapReport, Error> {
    let unexpected = || Error::UnexpectedReply { request: REQUEST_SEQ_NO_ERROR, raw_hex: hex(bytes) };

    let record = Record::decode(bytes)?;
    if record.record_id != REPLY_SEQ_NO_ERROR || record.payload.len() != 3 {
        return Err(unexpected());
    }
    match record.payload[0] {
        0 => Ok(GapReport::NoGap),
        1 => Ok(GapReport::LastGood(be16(&record.payload[1..]))),
        _ => Err(unexpected()),
    }
}

pub fn parse_sequencer_state(bytes: &[u8]) -> Result<SequencerState, Error> {
    let p = data_payload(REQUEST_SEQUENCER_STATE, REPLY_SEQUENCER_STATE, bytes, 3)?;
    let command = SequencerCommand::from_code(p[0]).ok_or_else(|| Error::UnexpectedReply {
        request: REQUEST_SEQUENCER_STATE,
        raw_hex: hex(bytes),
    })?;
    Ok(SequencerState { command, enabled: p[1] != 0, valid: p[2] != 0 })
}

pub fn parse_led_amplitude(bytes: &[u8]) -> Result<LedAmplitude, Error> {
    let p = data_payload(REQUEST_LED_AMPLITUDE, REQUEST_LED_AMPLITUDE, bytes, 5)?;
    Ok(LedAmplitude { led: be16(&p[0..]), amplitude: be16(&p[2..]), read_ok: p[4] != 0 })
}

pub fn parse_led_status(bytes: &[u8]) -> Result<LedStatus, Error> {
    let p = data_payload(REQUEST_LED_STATUS, REQUEST_LED_STATUS, bytes, 5)?;
    Ok(LedStatus { led: be16(&p[0..]), status: be16(&p[2..]), read_ok: p[4] != 0 })
}

pub fn parse_led_temperature(bytes: &[u8]) -> Result<LedTemperature, Error> {
    let p = data_payload(REQUEST_LED_TEMPERATURE, REQUEST_LED_TEMPERATURE, bytes, 7)?;
    Ok(LedTemperature {
        led: be16(&p[0..]),
        led_celsius: be16(&p[2..]) as f32 / 10.0,
        board_celsius: be16(&p[4..]) as f32 / 2.0,
        read_ok: p[6] != 0,
    })
}

pub fn parse_flatness_mask_on(bytes: &[u8]) -> Result<bool, Error> {
    let p = data_payload(REQUEST_FLATNESS_MASK_ON, REQUEST_FLATNESS_MASK_ON, bytes, 1)?;
    match p[0] {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::UnexpectedReply { request: REQUEST_FLATNESS_MASK_ON, raw_hex: hex(bytes) }),
    }
}

pub fn parse_internal_image(bytes: &[u8]) -> Result<u8, Error> {
    let p = data_payload(REQUEST_LOAD_INTERNAL_IMAGE, REPLY_LOAD_INTERNAL_IMAGE, bytes, 1)?;
    Ok(p[p.len() - 1])
}

/// The log is plain text; an OK acknowledgement means there is nothing logged.
pub fn parse_seq_file_error_log(bytes: &[u8]) -> Result<String, Error> {
    if classify_reply(bytes).is_ok() {
        return Ok(String::new());
    }
    let p = data_payload(REQUEST_SEQ_FILE_ERROR_LOG, REQUEST_SEQ_FILE_ERROR_LOG, bytes, 0)?;
    let text = String::from_utf8_lossy(&p);
    Ok(text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::encode;

    #[test]
    fn test_set_records_match_wire() {
        assert_eq!(Command::SetInumSize { rows: 20000 }.to_bytes().unwrap(), vec![0x00, 0x06, 0x00, 0x66, 0x4E, 0x20]);
        assert_eq!(Command::SetImageType { image_type: 5 }.to_bytes().unwrap(), vec![0x00, 0x06, 0x00, 0x67, 0x00, 0x05]);
        assert_eq!(Command::ResetSeqNo.to_bytes().unwrap(), vec![0x00, 0x04, 0x00, 0x70]);
        assert_eq!(Command::halt_sequencer().to_bytes().unwrap(), vec![0x00, 0x06, 0x00, 0x6A, 0x01, 0x00]);
        assert_eq!(Command::hold_sequencer_in_reset().to_bytes().unwrap(), vec![0x00, 0x06, 0x00, 0x6A, 0x02, 0x01]);
        assert_eq!(Command::release_sequencer_reset().to_bytes().unwrap(), vec![0x00, 0x06, 0x00, 0x6A, 0x02, 0x00]);
        assert_eq!(Command::RequestSeqNoError.to_bytes().unwrap(), vec![0x00, 0x04, 0x01, 0x37]);
        assert_eq!(Command::SetSoftwareSync { high: true }.to_bytes().unwrap(), vec![0x00, 0x05, 0x00, 0x78, 0x01]);
        assert_eq!(Command::SetSoftwareSync { high: false }.to_bytes().unwrap(), vec![0x00, 0x05, 0x00, 0x78, 0x00]);
        assert_eq!(Command::SetFlatnessMaskOn { enable: true }.to_bytes().unwrap(), vec![0x00, 0x05, 0x00, 0x94, 0x01]);
        assert_eq!(Command::SetLoadInternalImage { image: 3 }.to_bytes().unwrap(), vec![0x00, 0x05, 0x00, 0xA9, 0x03]);
    }

    #[test]
    fn test_request_records_match_wire() {
        assert_eq!(
            Command::RequestSequencerState { command: SequencerCommand::Reset }.to_bytes().unwrap(),
            vec![0x00, 0x05, 0x01, 0x32, 0x02]
        );
        assert_eq!(Command::RequestLedTemperature { led: 1 }.to_bytes().unwrap(), vec![0x00, 0x06, 0x01, 0x4F, 0x00, 0x01]);
        assert_eq!(Command::RequestLoadInternalImage.to_bytes().unwrap(), vec![0x00, 0x04, 0x01, 0x71]);
    }

    #[test]
    fn test_led_amplitude_range() {
        let ok = Command::SetLedAmplitude { led: 1, amplitude: 4095 }.to_bytes().unwrap();
        assert_eq!(ok, vec![0x00, 0x08, 0x00, 0x85, 0x00, 0x01, 0x0F, 0xFF]);

        let err = Command::SetLedAmplitude { led: 1, amplitude: 4096 }.to_record();
        assert!(matches!(err, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_flatness_mask_package() {
        let bytes = Command::LoadFlatnessMask { package: 1, total: 2, data: vec![0xAB; 3] }.to_bytes().unwrap();
        assert_eq!(bytes, vec![0x00, 0x0D, 0x00, 0x74, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0xAB, 0xAB, 0xAB]);

        let err = Command::LoadFlatnessMask { package: 1, total: 1, data: Vec::new() }.to_record();
        assert!(matches!(err, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_parse_inum_size() {
        assert_eq!(parse_inum_size(&[0x00, 0x06, 0x01, 0x2E, 0x04, 0x38]).unwrap(), 1080);
    }

    #[test]
    fn test_parse_surfaces_rejection() {
        let err = parse_inum_size(&[0x00, 0x06, 0x01, 0xF5, 0x27, 0x15]).unwrap_err();
        match err {
            Error::Rejected { record_id, message } => {
                assert_eq!(record_id, REQUEST_INUM_SIZE);
                assert_eq!(message, "Unknown record id (rec_id) received");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_gap_report() {
        assert_eq!(parse_gap_report(&[0x00, 0x07, 0x01, 0xFF, 0x00, 0x00, 0x00]).unwrap(), GapReport::NoGap);
        assert_eq!(parse_gap_report(&[0x00, 0x07, 0x01, 0xFF, 0x01, 0x00, 0x39]).unwrap(), GapReport::LastGood(57));
        assert!(matches!(
            parse_gap_report(&[0x00, 0x07, 0x01, 0xFF, 0x02, 0x00, 0x39]),
            Err(Error::UnexpectedReply { .. })
        ));
        assert!(matches!(
            parse_gap_report(&[0x00, 0x06, 0x01, 0xF5, 0x00, 0x00]),
            Err(Error::UnexpectedReply { .. })
        ));
    }

    #[test]
    fn test_parse_sequencer_state() {
        let state = parse_sequencer_state(&[0x00, 0x07, 0x01, 0xFA, 0x02, 0x01, 0x01]).unwrap();
        assert_eq!(state, SequencerState { command: SequencerCommand::Reset, enabled: true, valid: true });
    }

    #[test]
    fn test_parse_led_replies() {
        let amp = parse_led_amplitude(&encode(REQUEST_LED_AMPLITUDE, &[0x00, 0x02, 0x08, 0x00, 0x01]).unwrap()).unwrap();
        assert_eq!(amp, LedAmplitude { led: 2, amplitude: 2048, read_ok: true });

        let status = parse_led_status(&encode(REQUEST_LED_STATUS, &[0x00, 0x01, 0x80, 0x01, 0x00]).unwrap()).unwrap();
        assert_eq!(status, LedStatus { led: 1, status: 0x8001, read_ok: false });

        let temp = parse_led_temperature(
            &encode(REQUEST_LED_TEMPERATURE, &[0x00, 0x01, 0x01, 0x90, 0x00, 0x50, 0x01]).unwrap(),
        )
        .unwrap();
        assert_eq!(temp.led, 1);
        assert_eq!(temp.led_celsius, 40.0);
        assert_eq!(temp.board_celsius, 40.0);
        assert!(temp.read_ok);
    }

    #[test]
    fn test_parse_wrong_reply_id() {
        // A gap report answering a slot size request
        let gap = [0x00, 0x07, 0x01, 0xFF, 0x01, 0x00, 0x39];
        assert!(matches!(
            parse_inum_size(&gap),
            Err(Error::UnexpectedReply { request: REQUEST_INUM_SIZE, .. })
        ));

        let state = [0x00, 0x07, 0x01, 0xFA, 0x00, 0x01, 0x01];
        assert!(matches!(
            parse_led_temperature(&state),
            Err(Error::UnexpectedReply { request: REQUEST_LED_TEMPERATURE, .. })
        ));

        // Internal image replies come back as 569, not as the request id
        let echoed = encode(REQUEST_LOAD_INTERNAL_IMAGE, &[0x07]).unwrap();
        assert!(matches!(parse_internal_image(&echoed), Err(Error::UnexpectedReply { .. })));

        let swapped = encode(REQUEST_LED_STATUS, &[0x00, 0x01, 0x08, 0x00, 0x01]).unwrap();
        assert!(matches!(parse_led_amplitude(&swapped), Err(Error::UnexpectedReply { .. })));
    }

    #[test]
    fn test_parse_short_reply() {
        let err = parse_led_temperature(&encode(REQUEST_LED_TEMPERATURE, &[0x00, 0x01]).unwrap());
        assert!(matches!(err, Err(Error::UnexpectedReply { .. })));
    }

    #[test]
    fn test_parse_flatness_and_internal_image() {
        assert!(parse_flatness_mask_on(&encode(REQUEST_FLATNESS_MASK_ON, &[0x01]).unwrap()).unwrap());
        assert_eq!(parse_internal_image(&[0x00, 0x05, 0x02, 0x39, 0x07]).unwrap(), 7);
    }

    #[test]
    fn test_parse_seq_file_error_log() {
        assert_eq!(parse_seq_file_error_log(&[0x00, 0x06, 0x01, 0xF5, 0x00, 0x00]).unwrap(), "");

        let reply = encode(REQUEST_SEQ_FILE_ERROR_LOG, b"line 3: unknown command\0\0").unwrap();
        assert_eq!(parse_seq_file_error_log(&reply).unwrap(), "line 3: unknown command");

        let empty = encode(REQUEST_SEQ_FILE_ERROR_LOG, b"").unwrap();
        assert_eq!(parse_seq_file_error_log(&empty).unwrap(), "");
    }
}
