//! Pluggable byte-transport abstraction over four concrete carriers.
//!
//! Mirrors the teacher's `Arc<dyn Backend>` dynamic-dispatch style
//! (`backend/mod.rs`), but synchronous: every method is a plain blocking
//! `fn`, not `async fn`, since this crate has no async runtime (spec.md
//! §5). `Client` serializes all transport access behind its own mutex, so
//! no transport implementation needs internal locking of its own.

mod child;
mod stdio;
mod tcp;
mod unix;

pub use child::ChildProcess;
pub use stdio::Stdio;
pub use tcp::TcpSocket;
pub use unix::UnixSocket;

use crate::error::{Error, Result};

/// Classify a read-side I/O error the way each transport's `read` maps it:
/// the kernel conditions that mean "the remote end is gone" become
/// [`Error::ConnectionClosed`] so `Client` flips `connected` to `false` and
/// subsequent calls fail fast with `NotConnected` (spec.md §7), instead of
/// surfacing as an opaque `Error::Io` that leaves the client believing the
/// dead transport is still usable.
pub(crate) fn read_err(e: std::io::Error) -> Error {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => Error::ConnectionClosed,
        ErrorKind::BrokenPipe => Error::BrokenPipe,
        _ => Error::Io(e),
    }
}

/// A connected (or connectable) byte carrier.
///
/// `connect`'s `endpoint` argument is accepted for uniformity across
/// implementations but most transports ignore it, since the path/address
/// they connect to was already fixed at construction time (spec.md §4.2.1).
pub trait Transport: Send {
    /// Establish the underlying connection. Idempotent only in the sense
    /// that calling it while already connected is the caller's (`Client`'s)
    /// responsibility to reject — transports themselves do not enforce
    /// `AlreadyConnected`.
    fn connect(&mut self, endpoint: &str) -> Result<()>;

    /// Release the underlying connection. Must be safe to call repeatedly
    /// and from any state.
    fn disconnect(&mut self);

    /// Read at least one byte into `buf`, returning the number of bytes
    /// read. `Ok(0)` means the remote end closed the connection in an
    /// orderly fashion (EOF) — the only circumstance in which 0 is
    /// returned without an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// The transport's cached view of its own connection state.
    fn is_connected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn read_err_maps_reset_and_aborted_to_connection_closed() {
        for kind in [ErrorKind::ConnectionReset, ErrorKind::ConnectionAborted] {
            let mapped = read_err(std::io::Error::new(kind, "boom"));
            assert!(matches!(mapped, Error::ConnectionClosed), "{kind:?} -> {mapped:?}");
        }
    }

    #[test]
    fn read_err_maps_broken_pipe_distinctly() {
        let mapped = read_err(std::io::Error::new(ErrorKind::BrokenPipe, "boom"));
        assert!(matches!(mapped, Error::BrokenPipe));
    }

    #[test]
    fn read_err_passes_other_kinds_through_as_io() {
        let mapped = read_err(std::io::Error::new(ErrorKind::InvalidInput, "boom"));
        assert!(matches!(mapped, Error::Io(_)));
    }
}
