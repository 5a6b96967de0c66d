//! Standard-I/O transport (spec.md §4.2.3) — wraps the process's own
//! stdin/stdout, for when the host program is itself launched as a child
//! of the editor. The synchronous counterpart of the teacher's
//! `crates/agent/src/main.rs::serve_connection` stdin/stdout framing loop.

use std::io::{Read, Write};

use super::{read_err, Transport};
use crate::error::{Error, Result};

/// `connect` is a no-op; `is_connected` reflects only whether `disconnect`
/// has been called.
pub struct Stdio {
    connected: bool,
}

impl Default for Stdio {
    fn default() -> Self {
        Self::new()
    }
}

impl Stdio {
    /// Build a transport over the process's inherited stdin/stdout.
    pub fn new() -> Self {
        Stdio { connected: false }
    }
}

impl Transport for Stdio {
    fn connect(&mut self, _endpoint: &str) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.connected {
            return Err(Error::ConnectionClosed);
        }
        std::io::stdin().read(buf).map_err(read_err)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::ConnectionClosed);
        }
        let mut out = std::io::stdout();
        out.write_all(data).map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                Error::BrokenPipe
            } else {
                Error::Io(e)
            }
        })?;
        out.flush()?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
