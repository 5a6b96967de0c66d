//! Error taxonomy shared by the codec, transport and client layers.

use thiserror::Error;

use crate::value::Value;

/// Errors surfaced while decoding a byte stream into a [`Message`](crate::codec::Message).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// `bytes` is a strict prefix of a valid message — read more and retry.
    #[error("need more bytes")]
    NeedMore,

    /// The outer array has the wrong arity or the outer value is not an
    /// array at all.
    #[error("invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// The first array element is an integer outside `{0, 1, 2}`.
    #[error("invalid message type: {0}")]
    InvalidMessageType(i64),

    /// A field has the wrong `Value` kind (negative msgid, non-string
    /// method, …).
    #[error("invalid field type: {0}")]
    InvalidFieldType(String),

    /// Allocation failed while materializing a sub-value.
    #[error("out of memory decoding message")]
    OutOfMemory,
}

/// Errors surfaced while encoding a [`Message`](crate::codec::Message) to bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Allocation failed while serializing.
    #[error("out of memory encoding message")]
    OutOfMemory,

    /// The underlying writer refused the bytes (this only matters for the
    /// in-memory `Vec<u8>` encoder if the allocator itself fails, which
    /// std's `Vec` reports as a process abort rather than an `Err` — kept
    /// here so the taxonomy stays uniform with spec.md §4.1).
    #[error("I/O error while encoding: {0}")]
    Io(#[from] std::io::Error),
}

/// The uniform error type returned by every public operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// `Client::new` was called with no transport option selected.
    #[error("no transport option was selected")]
    UnsupportedTransport,

    /// `connect` was called on an already-connected client.
    #[error("client is already connected")]
    AlreadyConnected,

    /// `request`/`notify` was called before `connect` or after `disconnect`.
    #[error("client is not connected")]
    NotConnected,

    /// The transport was closed while reading or writing (EOF, or a
    /// terminal kernel error). `Client::connected` is set to `false` as a
    /// side effect whenever this variant is produced.
    #[error("connection closed")]
    ConnectionClosed,

    /// Write-side variant of [`Error::ConnectionClosed`], for platforms
    /// that distinguish a broken pipe from a generic closed connection.
    /// Callers may treat it identically to `ConnectionClosed`.
    #[error("broken pipe")]
    BrokenPipe,

    /// The server's `Response.error` field was non-nil; carries the
    /// server's error payload verbatim.
    #[error("nvim returned an error: {0:?}")]
    NvimError(Value),

    /// A `Response` arrived with an id other than the one we are awaiting.
    #[error("unexpected message: expected reply to id {expected}, got {got}")]
    UnexpectedMessage {
        /// The id of the request that `Client::request` is waiting on.
        expected: u32,
        /// The id actually observed on the wire.
        got: u32,
    },

    /// Malformed inbound bytes.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Local serialization failure.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// An underlying transport error not otherwise classified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
