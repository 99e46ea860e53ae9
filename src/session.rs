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

use std::marker::PhantomData;
use thiserror::Error;
use tracing::{debug, info, warn};
use crate::command::{self, Command, GapReport};
use crate::error::Error;
use crate::image::{self, Raster, TransferMode};
use crate::record::{Record, ReplyOutcome, classify_reply};
use crate::sequence;
use crate::transport::Transport;

// ============================================================================
// Error Types
// ============================================================================

/// A failed session, with enough context to decide how to resume.
#[derive(Debug, Error)]
#[error("{cause} (in state: {state}, {sent} datagrams sent for {total} packets)")]
pub struct SessionError {
    pub state: &'static str,
    pub sent: usize,
    pub total: usize,
    #[source]
    pub cause: Error,
}

// ============================================================================
// Transfer Plan
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Ask for the last in-order packet and repair the missing suffix.
    SequenceGap { first_sequence: u16 },
    /// Ask for the sequencer file error log; any text fails the upload.
    SequencerLog,
}

/// Everything one session sends, built and validated before any I/O.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    setup: Vec<Record>,
    datagrams: Vec<Vec<u8>>,
    verification: Verification,
    finalize: Vec<Record>,
}

impl TransferPlan {
    /// Load a raster into slot `inum`.
    pub fn image(inum: u32, lines_per_packet: usize, raster: Raster<'_>, mode: TransferMode) -> Result<Self, Error> {
        let packets = image::packetize(inum, lines_per_packet, raster, mode)?;
        let rows = u16::try_from(raster.lines())
            .map_err(|_| Error::invalid(format!("{} lines exceed the 16-bit slot size", raster.lines())))?;

        let setup = [
            Command::SetImageType { image_type: mode.image_type() },
            Command::SetInumSize { rows },
            Command::ResetSeqNo,
            Command::halt_sequencer(),
            Command::hold_sequencer_in_reset(),
        ]
        .iter()
        .map(Command::to_record)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(TransferPlan {
            setup,
            datagrams: packets.map(|p| p.to_bytes()).collect(),
            verification: Verification::SequenceGap { first_sequence: mode.first_sequence() },
            finalize: vec![Command::release_sequencer_reset().to_record()?],
        })
    }

    /// Upload a sequencer program.
    pub fn sequence(program: &[u8], chunk_size: usize) -> Result<Self, Error> {
        let chunks = sequence::packetize(program, chunk_size)?;

        Ok(TransferPlan {
            setup: vec![
                Command::halt_sequencer().to_record()?,
                Command::hold_sequencer_in_reset().to_record()?,
            ],
            datagrams: chunks.iter().map(|c| c.to_bytes()).collect(),
            verification: Verification::SequencerLog,
            finalize: vec![Command::release_sequencer_reset().to_record()?],
        })
    }

    pub fn packet_count(&self) -> usize {
        self.datagrams.len()
    }

    pub fn verification(&self) -> Verification {
        self.verification
    }
}

/// Outcome of a completed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    pub packets: usize,
    /// Including repair bursts
    pub datagrams_sent: usize,
    pub repairs: u32,
}

// ============================================================================
// States
// ============================================================================

pub struct Idle;
pub struct Priming;
pub struct Transferring;
pub struct Verifying;
pub struct Repairing;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct TransferSession<State> {
    state: PhantomData<State>,
    transport: Box<dyn Transport>,
    plan: TransferPlan,
    primed: usize,
    sent: usize,
    resend_from: usize,
    repairs: u32,
    max_repairs: u32,
}

pub enum Step {
    Next(Box<dyn SessionState>),
    Complete(TransferReport),
}

// ============================================================================
// Trait
// ============================================================================

pub trait SessionState: Send {
    fn step(self: Box<Self>) -> Result<Step, SessionError>;

    fn state_name(&self) -> &'static str;
}

// ============================================================================
// Helpers shared by all states
// ============================================================================

impl<S> TransferSession<S> {
    fn transition<T>(self) -> Box<TransferSession<T>> {
        Box::new(TransferSession {
            state: PhantomData,
            transport: self.transport,
            plan: self.plan,
            primed: self.primed,
            sent: self.sent,
            resend_from: self.resend_from,
            repairs: self.repairs,
            max_repairs: self.max_repairs,
        })
    }

    fn name() -> &'static str {
        let type_name = std::any::type_name::<S>();
        type_name.split("::").last().unwrap_or(type_name)
    }

    fn fail(&self, cause: Error) -> SessionError {
        SessionError {
            state: Self::name(),
            sent: self.sent,
            total: self.plan.datagrams.len(),
            cause,
        }
    }

    /// Send a record on the command channel and return the validated reply.
    fn command(&mut self, record: &Record) -> Result<Vec<u8>, SessionError> {
        let bytes = record.to_bytes().map_err(|e| self.fail(e))?;
        let reply = self.transport.request(&bytes).map_err(|e| self.fail(e))?;
        Record::decode(&reply).map_err(|e| self.fail(e))?;
        Ok(reply)
    }

    /// Send a record that must be acknowledged with OK.
    fn acknowledged(&mut self, record: &Record) -> Result<ReplyOutcome, SessionError> {
        let reply = self.command(record)?;
        let outcome = classify_reply(&reply);
        debug!("Record {}: {}", record.record_id, outcome);
        Ok(outcome)
    }

    fn burst(&mut self, from: usize) -> Result<(), SessionError> {
        for i in from..self.plan.datagrams.len() {
            let result = self.transport.send_data(&self.plan.datagrams[i]);
            result.map_err(|e| self.fail(e))?;
            self.sent += 1;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Step, SessionError> {
        for record in self.plan.finalize.clone() {
            let outcome = self.acknowledged(&record)?;
            if !outcome.is_ok() {
                return Err(self.fail(Error::FinalizeFailed {
                    record_id: record.record_id,
                    reply: outcome.to_string(),
                }));
            }
        }

        let report = TransferReport {
            packets: self.plan.datagrams.len(),
            datagrams_sent: self.sent,
            repairs: self.repairs,
        };
        info!(
            "Transfer complete: {} packets, {} datagrams, {} repairs",
            report.packets, report.datagrams_sent, report.repairs
        );
        Ok(Step::Complete(report))
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl SessionState for TransferSession<Idle> {
    fn step(self: Box<Self>) -> Result<Step, SessionError> {
        let fsm = *self;
        info!(
            "Starting transfer: {} setup records, {} packets",
            fsm.plan.setup.len(),
            fsm.plan.datagrams.len()
        );
        Ok(Step::Next(fsm.transition::<Priming>()))
    }

    fn state_name(&self) -> &'static str {
        Self::name()
    }
}

impl SessionState for TransferSession<Priming> {
    fn step(self: Box<Self>) -> Result<Step, SessionError> {
        let mut fsm = *self;

        if fsm.primed >= fsm.plan.setup.len() {
            return Ok(Step::Next(fsm.transition::<Transferring>()));
        }

        let record = fsm.plan.setup[fsm.primed].clone();
        match fsm.acknowledged(&record)? {
            ReplyOutcome::Ok => {
                fsm.primed += 1;
                if fsm.primed == fsm.plan.setup.len() {
                    Ok(Step::Next(fsm.transition::<Transferring>()))
                } else {
                    Ok(Step::Next(Box::new(fsm)))
                }
            }
            outcome => {
                warn!("Setup record {} rejected: {}", record.record_id, outcome);
                Err(fsm.fail(Error::PrimingFailed {
                    record_id: record.record_id,
                    reply: outcome.to_string(),
                }))
            }
        }
    }

    fn state_name(&self) -> &'static str {
        Self::name()
    }
}

impl SessionState for TransferSession<Transferring> {
    fn step(self: Box<Self>) -> Result<Step, SessionError> {
        let mut fsm = *self;
        fsm.burst(0)?;
        info!("Sent {} packets", fsm.sent);
        Ok(Step::Next(fsm.transition::<Verifying>()))
    }

    fn state_name(&self) -> &'static str {
        Self::name()
    }
}

impl SessionState for TransferSession<Verifying> {
    fn step(self: Box<Self>) -> Result<Step, SessionError> {
        let mut fsm = *self;
        let total = fsm.plan.datagrams.len();

        match fsm.plan.verification {
            Verification::SequenceGap { first_sequence } => {
                let request = Command::RequestSeqNoError.to_record().map_err(|e| fsm.fail(e))?;
                let reply = fsm.command(&request)?;
                let report = command::parse_gap_report(&reply).map_err(|e| fsm.fail(e))?;

                let delivered = match report {
                    GapReport::NoGap => total,
                    GapReport::LastGood(last) if last >= first_sequence => (last - first_sequence) as usize + 1,
                    GapReport::LastGood(_) => 0,
                };
                debug!("Gap check: {:?}, {} of {} delivered", report, delivered, total);

                if delivered >= total {
                    return fsm.finish();
                }
                if fsm.repairs >= fsm.max_repairs {
                    return Err(fsm.fail(Error::TransferIncomplete {
                        delivered,
                        total,
                        repairs: fsm.repairs,
                    }));
                }

                warn!("Gap after packet {}: resending {} packets", delivered, total - delivered);
                fsm.resend_from = delivered;
                Ok(Step::Next(fsm.transition::<Repairing>()))
            }
            Verification::SequencerLog => {
                let request = Command::RequestSeqFileErrorLog.to_record().map_err(|e| fsm.fail(e))?;
                let reply = fsm.command(&request)?;
                let log = command::parse_seq_file_error_log(&reply).map_err(|e| fsm.fail(e))?;

                if log.is_empty() {
                    fsm.finish()
                } else {
                    warn!("Sequencer program rejected: {}", log);
                    Err(fsm.fail(Error::SequenceRejected { log }))
                }
            }
        }
    }

    fn state_name(&self) -> &'static str {
        Self::name()
    }
}

impl SessionState for TransferSession<Repairing> {
    fn step(self: Box<Self>) -> Result<Step, SessionError> {
        let mut fsm = *self;
        let from = fsm.resend_from;
        fsm.burst(from)?;
        fsm.repairs += 1;
        info!("Repair burst {} resent packets {}..{}", fsm.repairs, from, fsm.plan.datagrams.len());
        Ok(Step::Next(fsm.transition::<Verifying>()))
    }

    fn state_name(&self) -> &'static str {
        Self::name()
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl TransferSession<Idle> {
    pub fn new(transport: Box<dyn Transport>, plan: TransferPlan, max_repairs: u32) -> Box<dyn SessionState> {
        Box::new(TransferSession {
            state: PhantomData::<Idle>,
            transport,
            plan,
            primed: 0,
            sent: 0,
            resend_from: 0,
            repairs: 0,
            max_repairs,
        })
    }
}

/// Step a session until it completes or fails.
pub fn run(mut session: Box<dyn SessionState>) -> Result<TransferReport, SessionError> {
    loop {
        match session.step()? {
            Step::Next(next) => session = next,
            Step::Complete(report) => return Ok(report),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
