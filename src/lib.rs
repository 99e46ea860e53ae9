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

//! Lux4600 projector protocol: record codec, Type 5 RLE, image and
//! sequencer packetizers, and the gap-repairing transfer session.

pub mod command;
pub mod config;
pub mod error;
pub mod image;
pub mod projector;
pub mod protocol;
pub mod record;
pub mod rle;
pub mod sequence;
pub mod session;
pub mod transport;

pub use error::Error;
pub use image::{Raster, TransferMode};
pub use projector::Projector;
pub use session::{SessionError, TransferPlan, TransferReport};
pub use transport::{Transport, UdpTransport};
