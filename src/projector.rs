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

use std::fmt;
use tracing::{debug, info, warn};
use crate::command::{self, Command, LedAmplitude, LedStatus, LedTemperature, SequencerCommand, SequencerState};
use crate::error::{Error, hex};
use crate::record::{Record, ReplyOutcome, classify_reply};
use crate::session::{self, SessionError, TransferPlan, TransferReport, TransferSession};
use crate::transport::Transport;

/// Slot size and image type, read back to prove the projector answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub inum_size: u16,
    pub image_type: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub connection: ConnectionInfo,
    pub running: SequencerState,
    pub reset: SequencerState,
    pub flatness_mask: bool,
    pub internal_image: u8,
    pub led_amplitude: LedAmplitude,
    pub led_status: LedStatus,
    pub led_temperature: LedTemperature,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Inum size:        {}", self.connection.inum_size)?;
        writeln!(f, "Image type:       {}", self.connection.image_type)?;
        writeln!(f, "Sequencer run:    {}", on_off(self.running.enabled))?;
        writeln!(f, "Sequencer reset:  {}", on_off(self.reset.enabled))?;
        writeln!(f, "Flatness mask:    {}", on_off(self.flatness_mask))?;
        writeln!(f, "Internal image:   {}", self.internal_image)?;
        writeln!(f, "LED {} amplitude:  {}", self.led_amplitude.led, self.led_amplitude.amplitude)?;
        writeln!(f, "LED {} status:     0x{:04X}", self.led_status.led, self.led_status.status)?;
        write!(
            f,
            "LED {} temperature: {:.1} C (board {:.1} C)",
            self.led_temperature.led, self.led_temperature.led_celsius, self.led_temperature.board_celsius
        )
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// One-shot command client. Transfers hand the transport to a session.
pub struct Projector {
    transport: Box<dyn Transport>,
}

impl Projector {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Projector { transport }
    }

    fn request(&mut self, command: &Command) -> Result<Vec<u8>, Error> {
        let bytes = command.to_bytes()?;
        debug!("Request {:?}", command);
        let reply = self.transport.request(&bytes)?;
        Record::decode(&reply)?;
        Ok(reply)
    }

    /// Send a set record; only an OK acknowledgement succeeds.
    fn set(&mut self, command: &Command) -> Result<(), Error> {
        let reply = self.request(command)?;
        match classify_reply(&reply) {
            ReplyOutcome::Ok => Ok(()),
            ReplyOutcome::Rejected(code) => {
                warn!("Record {} rejected: {}", command.record_id(), code);
                Err(Error::Rejected { record_id: command.record_id(), message: code.to_string() })
            }
            ReplyOutcome::Unknown { .. } => Err(Error::UnknownReply { raw_hex: hex(&reply) }),
        }
    }

    pub fn check_connection(&mut self) -> Result<ConnectionInfo, Error> {
        let inum_size = command::parse_inum_size(&self.request(&Command::RequestInumSize)?)?;
        let image_type = command::parse_image_type(&self.request(&Command::RequestImageType)?)?;
        info!("Projector answered: inum size {}, image type {}", inum_size, image_type);
        Ok(ConnectionInfo { inum_size, image_type })
    }

    pub fn sequencer_state(&mut self, which: SequencerCommand) -> Result<SequencerState, Error> {
        let reply = self.request(&Command::RequestSequencerState { command: which })?;
        command::parse_sequencer_state(&reply)
    }

    pub fn status(&mut self, led: u16) -> Result<Status, Error> {
        let connection = self.check_connection()?;
        let running = self.sequencer_state(SequencerCommand::Run)?;
        let reset = self.sequencer_state(SequencerCommand::Reset)?;
        let flatness_mask = command::parse_flatness_mask_on(&self.request(&Command::RequestFlatnessMaskOn)?)?;
        let internal_image = command::parse_internal_image(&self.request(&Command::RequestLoadInternalImage)?)?;
        let led_amplitude = command::parse_led_amplitude(&self.request(&Command::RequestLedAmplitude { led })?)?;
        let led_status = command::parse_led_status(&self.request(&Command::RequestLedStatus { led })?)?;
        let led_temperature =
            command::parse_led_temperature(&self.request(&Command::RequestLedTemperature { led })?)?;

        Ok(Status {
            connection,
            running,
            reset,
            flatness_mask,
            internal_image,
            led_amplitude,
            led_status,
            led_temperature,
        })
    }

    /// Take the sequencer out of reset, then run it.
    pub fn start_sequencer(&mut self) -> Result<(), Error> {
        self.set(&Command::release_sequencer_reset())?;
        self.set(&Command::run_sequencer())?;
        info!("Sequencer started");
        Ok(())
    }

    pub fn stop_sequencer(&mut self) -> Result<(), Error> {
        self.set(&Command::halt_sequencer())?;
        info!("Sequencer stopped");
        Ok(())
    }

    pub fn reset_sequencer(&mut self) -> Result<(), Error> {
        self.set(&Command::hold_sequencer_in_reset())?;
        info!("Sequencer held in reset");
        Ok(())
    }

    pub fn set_led_amplitude(&mut self, led: u16, amplitude: u16) -> Result<(), Error> {
        self.set(&Command::SetLedAmplitude { led, amplitude })?;
        info!("LED {} amplitude set to {}", led, amplitude);
        Ok(())
    }

    pub fn set_software_sync(&mut self, high: bool) -> Result<(), Error> {
        self.set(&Command::SetSoftwareSync { high })?;
        info!("Software sync driven {}", if high { "high" } else { "low" });
        Ok(())
    }

    pub fn set_flatness_mask(&mut self, enable: bool) -> Result<(), Error> {
        self.set(&Command::SetFlatnessMaskOn { enable })?;
        info!("Flatness mask {}", on_off(enable));
        Ok(())
    }

    /// Display one of the projector's built-in test images.
    pub fn load_internal_image(&mut self, image: u8) -> Result<(), Error> {
        self.set(&Command::SetLoadInternalImage { image })?;
        info!("Internal image {} loaded", image);
        Ok(())
    }

    /// Run a transfer session over this projector's transport.
    pub fn transfer(self, plan: TransferPlan, max_repairs: u32) -> Result<TransferReport, SessionError> {
        session::run(TransferSession::new(self.transport, plan, max_repairs))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::*;
    use crate::record::encode;
    use crate::transport::MockTransport;

    fn ok() -> Option<Vec<u8>> {
        Some(vec![0x00, 0x06, 0x01, 0xF5, 0x00, 0x00])
    }

    fn bytes(command: Command) -> Vec<u8> {
        command.to_bytes().unwrap()
    }

    fn projector(replies: Vec<Option<Vec<u8>>>, commands: Vec<Vec<u8>>) -> Projector {
        Projector::new(Box::new(MockTransport::new(replies, commands, Vec::new())))
    }

    #[test]
    fn test_check_connection() {
        let mut p = projector(
            vec![
                Some(vec![0x00, 0x06, 0x01, 0x2E, 0x04, 0x38]),
                Some(vec![0x00, 0x06, 0x01, 0x2F, 0x00, 0x05]),
            ],
            vec![bytes(Command::RequestInumSize), bytes(Command::RequestImageType)],
        );
        assert_eq!(p.check_connection().unwrap(), ConnectionInfo { inum_size: 1080, image_type: 5 });
    }

    #[test]
    fn test_check_connection_timeout() {
        let mut p = projector(vec![None], vec![bytes(Command::RequestInumSize)]);
        assert!(matches!(p.check_connection(), Err(Error::Timeout(_))));
    }

    #[test]
    fn test_start_sequencer() {
        let mut p = projector(
            vec![ok(), ok()],
            vec![bytes(Command::release_sequencer_reset()), bytes(Command::run_sequencer())],
        );
        p.start_sequencer().unwrap();
    }

    #[test]
    fn test_stop_and_reset_sequencer() {
        let mut p = projector(
            vec![ok(), ok()],
            vec![bytes(Command::halt_sequencer()), bytes(Command::hold_sequencer_in_reset())],
        );
        p.stop_sequencer().unwrap();
        p.reset_sequencer().unwrap();
    }

    #[test]
    fn test_sync_mask_and_internal_image() {
        let mut p = projector(
            vec![ok(), ok(), ok()],
            vec![
                vec![0x00, 0x05, 0x00, 0x78, 0x01],
                vec![0x00, 0x05, 0x00, 0x94, 0x00],
                vec![0x00, 0x05, 0x00, 0xA9, 0x02],
            ],
        );
        p.set_software_sync(true).unwrap();
        p.set_flatness_mask(false).unwrap();
        p.load_internal_image(2).unwrap();
    }

    #[test]
    fn test_internal_image_rejected() {
        let mut p = projector(
            vec![Some(vec![0x00, 0x06, 0x01, 0xF5, 0x27, 0x37])],
            vec![bytes(Command::SetLoadInternalImage { image: 99 })],
        );
        assert!(matches!(
            p.load_internal_image(99),
            Err(Error::Rejected { record_id: SET_LOAD_INTERNAL_IMAGE, .. })
        ));
    }

    #[test]
    fn test_led_amplitude_rejected() {
        let mut p = projector(
            vec![Some(vec![0x00, 0x06, 0x01, 0xF5, 0x27, 0x25])],
            vec![bytes(Command::SetLedAmplitude { led: 1, amplitude: 4000 })],
        );
        match p.set_led_amplitude(1, 4000).unwrap_err() {
            Error::Rejected { record_id, message } => {
                assert_eq!(record_id, SET_LED_AMPLITUDE);
                assert_eq!(message, "LED driver amplitude value out of range");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_led_amplitude_out_of_range_sends_nothing() {
        let mut p = projector(Vec::new(), Vec::new());
        assert!(matches!(p.set_led_amplitude(1, 5000), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_set_unknown_reply() {
        let mut p = projector(
            vec![Some(vec![0x00, 0x06, 0x01, 0xF5, 0x12, 0x34])],
            vec![bytes(Command::halt_sequencer())],
        );
        match p.stop_sequencer().unwrap_err() {
            Error::UnknownReply { raw_hex } => assert_eq!(raw_hex, "000601f51234"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_status() {
        let replies = vec![
            Some(vec![0x00, 0x06, 0x01, 0x2E, 0x04, 0x38]),
            Some(vec![0x00, 0x06, 0x01, 0x2F, 0x00, 0x04]),
            Some(vec![0x00, 0x07, 0x01, 0xFA, 0x01, 0x00, 0x01]),
            Some(vec![0x00, 0x07, 0x01, 0xFA, 0x02, 0x01, 0x01]),
            Some(encode(REQUEST_FLATNESS_MASK_ON, &[0x00]).unwrap()),
            Some(encode(REPLY_LOAD_INTERNAL_IMAGE, &[0x03]).unwrap()),
            Some(encode(REQUEST_LED_AMPLITUDE, &[0x00, 0x01, 0x08, 0x00, 0x01]).unwrap()),
            Some(encode(REQUEST_LED_STATUS, &[0x00, 0x01, 0x00, 0x00, 0x01]).unwrap()),
            Some(encode(REQUEST_LED_TEMPERATURE, &[0x00, 0x01, 0x01, 0x90, 0x00, 0x50, 0x01]).unwrap()),
        ];
        let commands = vec![
            bytes(Command::RequestInumSize),
            bytes(Command::RequestImageType),
            bytes(Command::RequestSequencerState { command: SequencerCommand::Run }),
            bytes(Command::RequestSequencerState { command: SequencerCommand::Reset }),
            bytes(Command::RequestFlatnessMaskOn),
            bytes(Command::RequestLoadInternalImage),
            bytes(Command::RequestLedAmplitude { led: 1 }),
            bytes(Command::RequestLedStatus { led: 1 }),
            bytes(Command::RequestLedTemperature { led: 1 }),
        ];

        let status = projector(replies, commands).status(1).unwrap();
        assert_eq!(status.connection.inum_size, 1080);
        assert!(!status.running.enabled);
        assert!(status.reset.enabled);
        assert!(!status.flatness_mask);
        assert_eq!(status.internal_image, 3);
        assert_eq!(status.led_amplitude.amplitude, 2048);
        assert!(status.to_string().contains("LED 1 temperature: 40.0 C (board 40.0 C)"));
    }

    #[test]
    fn test_transfer_hands_over_transport() {
        let program = vec![0x11; 16];
        let plan = TransferPlan::sequence(&program, 8).unwrap();
        let data: Vec<Vec<u8>> = crate::sequence::packetize(&program, 8)
            .unwrap()
            .iter()
            .map(|c| c.to_bytes())
            .collect();

        let mock = MockTransport::new(
            vec![ok(), ok(), ok(), ok()],
            vec![
                bytes(Command::halt_sequencer()),
                bytes(Command::hold_sequencer_in_reset()),
                bytes(Command::RequestSeqFileErrorLog),
                bytes(Command::release_sequencer_reset()),
            ],
            data,
        );
        let report = Projector::new(Box::new(mock)).transfer(plan, 3).unwrap();
        assert_eq!(report.packets, 2);
    }
}
