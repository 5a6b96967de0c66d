//! Unix domain socket transport (spec.md §4.2.1).

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use super::{read_err, Transport};
use crate::error::{Error, Result};

/// Connects to a filesystem socket path fixed at construction.
pub struct UnixSocket {
    path: String,
    stream: Option<UnixStream>,
}

impl UnixSocket {
    /// Build a transport bound to `path`. No I/O happens until `connect`.
    pub fn new(path: impl Into<String>) -> Self {
        UnixSocket {
            path: path.into(),
            stream: None,
        }
    }
}

impl Transport for UnixSocket {
    fn connect(&mut self, _endpoint: &str) -> Result<()> {
        let stream = UnixStream::connect(&self.path)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    #[test]
    fn disconnected_read_and_write_never_touch_os() {
        let mut t = UnixSocket::new("/nonexistent/path/that/is/never/opened.sock");
        assert!(!t.is_connected());
        assert!(matches!(
            t.read(&mut [0u8; 4]),
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(t.write(b"x"), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn connect_then_disconnect_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let accepted = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            sock.read_exact(&mut buf).unwrap();
            sock.write_all(b"pong!").unwrap();
        });

        let mut t = UnixSocket::new(path.to_str().unwrap());
        t.connect("").unwrap();
        assert!(t.is_connected());
        t.write(b"ping!").unwrap();
        let mut buf = [0u8; 5];
        let n = t.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"pong!");

        t.disconnect();
        assert!(!t.is_connected());
        t.disconnect(); // idempotent

        accepted.join().unwrap();
    }
}
