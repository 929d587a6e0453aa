//! Live byte-stream transport.
//!
//! The sensor controller is reached through a serial-to-TCP bridge at
//! `transport_address`; the baud rate is the bridge's line setting and is
//! reported for diagnostics only.

use super::{DeviceCommand, SourceKind, TelemetrySource};
use crate::error::{OpenError, TransportError};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
// Bytes drained per poll; anything beyond is picked up on the next poll
const MAX_FRAME_BYTES: usize = 4096;
const READ_CHUNK_BYTES: usize = 512;

#[derive(Debug)]
pub struct LiveSource {
    address: String,
    baud_rate: u32,
    stream: Option<TcpStream>,
}

impl LiveSource {
    pub fn new(address: &str, baud_rate: u32) -> Self {
        Self {
            address: address.to_string(),
            baud_rate,
            stream: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn unavailable(&self, reason: impl ToString) -> OpenError {
        OpenError::Unavailable {
            address: self.address.clone(),
            reason: reason.to_string(),
        }
    }
}

impl TelemetrySource for LiveSource {
    fn open(&mut self) -> Result<(), OpenError> {
        let candidates = self
            .address
            .to_socket_addrs()
            .map_err(|e| self.unavailable(e))?;

        let mut last_error = None;
        for addr in candidates {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    stream.set_nonblocking(true).map_err(|e| self.unavailable(e))?;
                    let _ = stream.set_nodelay(true);
                    info!("Live transport open at {} ({} baud)", addr, self.baud_rate);
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(match last_error {
            Some(e) => self.unavailable(e),
            None => self.unavailable("address resolved to no endpoints"),
        })
    }

    fn poll_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;

        let mut frame = Vec::new();
        let mut chunk = [0u8; READ_CHUNK_BYTES];
        while frame.len() < MAX_FRAME_BYTES {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    if frame.is_empty() {
                        return Err(TransportError::Closed);
                    }
                    break;
                }
                Ok(n) => frame.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Read(e)),
            }
        }

        Ok(if frame.is_empty() { None } else { Some(frame) })
    }

    fn send_command(&mut self, command: DeviceCommand) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream
            .write_all(&[command.as_byte()])
            .map_err(TransportError::Write)?;
        debug!("Sent {:?} to {}", command, self.address);
        Ok(())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }
}
