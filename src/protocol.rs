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

//! Lux4600 record ids, ports and size limits

// ============================================================================
// Set records
// ============================================================================

/// Set the number of rows in an image slot
pub const SET_INUM_SIZE: u16 = 102;

/// Select the image type (4 = 1-bit bitmap, 5 = Type 5 RLE)
pub const SET_IMAGE_TYPE: u16 = 103;

/// Image data packet, sent on the data channel
pub const LOAD_IMAGE_DATA: u16 = 104;

/// Sequencer program package, sent on the data channel
pub const LOAD_SEQUENCE_FILE: u16 = 105;

/// Run/stop or reset/release the sequencer
pub const SET_SEQUENCER_STATE: u16 = 106;

/// Reset the image packet sequence counter
pub const RESET_SEQ_NO: u16 = 112;

/// Flatness correction mask package
pub const LOAD_FLATNESS_MASK: u16 = 116;

/// Drive the software sync line
pub const SET_SOFTWARE_SYNC: u16 = 120;

/// Set the drive amplitude of one LED
pub const SET_LED_AMPLITUDE: u16 = 133;

/// Enable or disable the flatness correction mask
pub const SET_FLATNESS_MASK_ON: u16 = 148;

/// Show one of the built-in test images
pub const SET_LOAD_INTERNAL_IMAGE: u16 = 169;

// ============================================================================
// Request records
// ============================================================================

pub const REQUEST_INUM_SIZE: u16 = 302;
pub const REQUEST_IMAGE_TYPE: u16 = 303;
pub const REQUEST_SEQUENCER_STATE: u16 = 306;
pub const REQUEST_SEQ_FILE_ERROR_LOG: u16 = 307;

/// Out-of-sequence check for image packets
pub const REQUEST_SEQ_NO_ERROR: u16 = 311;

pub const REQUEST_LED_AMPLITUDE: u16 = 333;
pub const REQUEST_LED_STATUS: u16 = 334;
pub const REQUEST_LED_TEMPERATURE: u16 = 335;
pub const REQUEST_FLATNESS_MASK_ON: u16 = 348;
pub const REQUEST_LOAD_INTERNAL_IMAGE: u16 = 369;

// ============================================================================
// Reply records
// ============================================================================

/// Acknowledgement of a set record, carries a 2-byte reply code
pub const REPLY_ACK: u16 = 501;

/// Reply to REQUEST_SEQUENCER_STATE
pub const REPLY_SEQUENCER_STATE: u16 = 506;

/// Reply to REQUEST_SEQ_NO_ERROR
pub const REPLY_SEQ_NO_ERROR: u16 = 511;

/// Reply to REQUEST_LOAD_INTERNAL_IMAGE
pub const REPLY_LOAD_INTERNAL_IMAGE: u16 = 569;

// Slot size, image type, LED, flatness mask and error log replies echo the
// request id.

// ============================================================================
// Framing
// ============================================================================

/// Total size + record id
pub const RECORD_HEADER_SIZE: usize = 4;

/// Largest datagram the projector accepts without jumbo frames
pub const MAX_DATAGRAM: usize = 1500;

/// Largest image data block in one load-image-data record
pub const MAX_IMAGE_DATA: usize = 8956;

/// Largest reply the command channel will read
pub const MAX_REPLY: usize = 4096;

/// Default sequencer program chunk size
pub const DEFAULT_CHUNK_SIZE: usize = 1440;

// ============================================================================
// Network defaults
// ============================================================================

pub const DEFAULT_HOST: &str = "192.168.0.10";
pub const DEFAULT_COMMAND_PORT: u16 = 52985;
pub const DEFAULT_DATA_PORT: u16 = 52986;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
