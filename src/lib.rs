//! A synchronous client library for the MessagePack-RPC protocol used by
//! Neovim.
//!
//! Three layers, leaves first: [`value::Value`] (the in-memory MessagePack
//! tree), [`codec`] (streaming encode/decode of the three
//! [`codec::Message`] shapes over it), [`transport`] (the four byte
//! carriers a [`client::Client`] can be pointed at), and [`client`] itself
//! (the request/response correlator). See `DESIGN.md` for how each layer
//! traces back to its grounding source.

pub mod client;
pub mod codec;
pub mod error;
pub mod transport;
pub mod value;

pub use client::{Client, ClientOptions, IncomingRequest, Notification};
pub use codec::Message;
pub use error::{DecodeError, EncodeError, Error, Result};
pub use value::Value;
