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

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use crate::config::TransportConfig;
use crate::error::{Error, hex};
use crate::protocol::MAX_REPLY;

// ============================================================================
// Transport Trait
// ============================================================================

/// The two channels a projector exposes
pub trait Transport: Send {
    /// Send a record on the command channel and wait for its reply.
    fn request(&mut self, record: &[u8]) -> Result<Vec<u8>, Error>;

    /// Send a datagram on the data channel. No reply is expected.
    fn send_data(&mut self, datagram: &[u8]) -> Result<(), Error>;
}

// ============================================================================
// UDP Implementation
// ============================================================================

/// One socket for both channels, owned for the life of a session
pub struct UdpTransport {
    socket: UdpSocket,
    command_addr: SocketAddr,
    data_addr: SocketAddr,
    timeout: Duration,
}

impl UdpTransport {
    pub fn open(config: &TransportConfig) -> Result<Self, Error> {
        let command_addr = resolve(&config.host, config.command_port)?;
        let data_addr = resolve(&config.host, config.data_port)?;

        let bind: SocketAddr = if command_addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        let timeout = config.timeout();
        socket.set_read_timeout(Some(timeout))?;

        debug!("Bound {} for projector at {}", socket.local_addr()?, command_addr);
        Ok(UdpTransport { socket, command_addr, data_addr, timeout })
    }

    /// Discard replies that arrived after their request timed out.
    fn drain_stale(&mut self) -> Result<(), Error> {
        self.socket.set_nonblocking(true)?;
        let mut buf = [0u8; MAX_REPLY];
        let drained = loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => debug!("Discarding stale {} byte datagram from {}", n, from),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(Error::Transport(e)),
            }
        };
        self.socket.set_nonblocking(false)?;
        drained
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, Error> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| Error::Transport(std::io::Error::new(
            ErrorKind::NotFound,
            format!("no address for {}:{}", host, port),
        )))
}

impl Transport for UdpTransport {
    fn request(&mut self, record: &[u8]) -> Result<Vec<u8>, Error> {
        self.drain_stale()?;
        self.socket.send_to(record, self.command_addr)?;
        trace!("Command -> {}", hex(record));

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; MAX_REPLY];
        loop {
            // Each wait is bounded by this request's own deadline
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Err(Error::Timeout(self.timeout));
            }
            self.socket.set_read_timeout(Some(left))?;

            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) if from == self.command_addr => {
                    trace!("Reply <- {}", hex(&buf[..n]));
                    return Ok(buf[..n].to_vec());
                }
                Ok((_, from)) => debug!("Ignoring datagram from {}", from),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Err(Error::Timeout(self.timeout));
                }
                Err(e) => return Err(Error::Transport(e)),
            }
        }
    }

    fn send_data(&mut self, datagram: &[u8]) -> Result<(), Error> {
        self.socket.send_to(datagram, self.data_addr)?;
        Ok(())
    }
}

// ============================================================================
// Mock Transport for Testing
// ============================================================================

#[cfg(test)]
pub struct MockTransport {
    // Replies to command requests (None = timeout)
    replies: Vec<Option<Vec<u8>>>,
    reply_pos: usize,
    // Track what was sent
    command_log: Vec<Vec<u8>>,
    data_log: Vec<Vec<u8>>,
    // Expected traffic for verification
    expected_commands: Vec<Vec<u8>>,
    expected_data: Vec<Vec<u8>>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new(
        replies: Vec<Option<Vec<u8>>>,
        expected_commands: Vec<Vec<u8>>,
        expected_data: Vec<Vec<u8>>,
    ) -> Self {
        MockTransport {
            replies,
            reply_pos: 0,
            command_log: Vec::new(),
            data_log: Vec::new(),
            expected_commands,
            expected_data,
        }
    }
}

#[cfg(test)]
impl Transport for MockTransport {
    fn request(&mut self, record: &[u8]) -> Result<Vec<u8>, Error> {
        self.command_log.push(record.to_vec());

        // Out of replies = timeout
        let reply = self.replies.get(self.reply_pos).cloned().flatten();
        if self.reply_pos < self.replies.len() {
            self.reply_pos += 1;
        }
        reply.ok_or(Error::Timeout(Duration::from_secs(10)))
    }

    fn send_data(&mut self, datagram: &[u8]) -> Result<(), Error> {
        self.data_log.push(datagram.to_vec());
        Ok(())
    }
}

#[cfg(test)]
impl Drop for MockTransport {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        assert_eq!(
            self.reply_pos,
            self.replies.len(),
            "MockTransport dropped with {} unconsumed replies",
            self.replies.len() - self.reply_pos
        );

        assert_eq!(
            self.command_log,
            self.expected_commands,
            "MockTransport command log mismatch!\nExpected {} records, got {}",
            self.expected_commands.len(),
            self.command_log.len()
        );

        assert!(
            self.data_log == self.expected_data,
            "MockTransport data log mismatch!\nExpected {} datagrams, got {}",
            self.expected_data.len(),
            self.data_log.len()
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
