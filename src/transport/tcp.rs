//! TCP socket transport (spec.md §4.2.2).

use std::io::{Read, Write};
use std::net::TcpStream;

use super::{read_err, Transport};
use crate::error::{Error, Result};

/// Connects to `host:port` fixed at construction. `host` is duplicated into
/// an owned `String` at construction, never borrowing caller memory.
pub struct TcpSocket {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl TcpSocket {
    /// Build a transport bound to `host`/`port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        TcpSocket {
            host: host.into(),
            port,
            stream: None,
        }
    }
}

impl Transport for TcpSocket {
    fn connect(&mut self, _endpoint: &str) -> Result<()> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stream = None;
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;
        stream.read(buf).map_err(read_err)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;
        stream.write_all(data).map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                Error::BrokenPipe
            } else {
                Error::Io(e)
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
