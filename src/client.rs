//! `ClientOptions` (configuration + fluent builder) and `Client` (the
//! request/response correlator), the synchronous counterpart of the
//! teacher's `RpcClient<R, W>` in `backend/rpc_client.rs` — same shape
//! (atomic id counter, mutex-guarded read/write cycle, buffered
//! notifications) but over a generic [`Transport`] instead of a fixed
//! async reader/writer pair, and over the bare self-describing MessagePack
//! array framing instead of the teacher's length-prefixed named-field
//! frames.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::codec::{self, Message};
use crate::error::{DecodeError, Error, Result};
use crate::transport::{ChildProcess, Stdio, TcpSocket, Transport, UnixSocket};
use crate::value::Value;

/// Bytes read from the transport per staging read (spec.md §4.3 suggests
/// 4 KiB).
const READ_CHUNK: usize = 4096;

/// Configuration recognized by [`Client::new`] (spec.md §6).
#[derive(Debug, Clone)]
pub struct ClientOptions {
    socket_path: Option<String>,
    tcp_address: Option<String>,
    tcp_port: Option<u16>,
    use_stdio: bool,
    spawn_process: bool,
    nvim_path: String,
    timeout_ms: u32,
    skip_api_info: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            socket_path: None,
            tcp_address: None,
            tcp_port: None,
            use_stdio: false,
            spawn_process: false,
            nvim_path: "nvim".to_string(),
            timeout_ms: 5000,
            skip_api_info: false,
        }
    }
}

impl ClientOptions {
    /// Start building options with the documented defaults and no
    /// transport selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the `UnixSocket` transport, connecting to `path`.
    pub fn socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Select the `TcpSocket` transport, connecting to `host`:`port`.
    pub fn tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.tcp_address = Some(host.into());
        self.tcp_port = Some(port);
        self
    }

    /// Select the `Stdio` transport.
    pub fn stdio(mut self) -> Self {
        self.use_stdio = true;
        self
    }

    /// Select the `ChildProcess` transport, spawning `nvim_path`.
    pub fn spawn(mut self, nvim_path: impl Into<String>) -> Self {
        self.spawn_process = true;
        self.nvim_path = nvim_path.into();
        self
    }

    /// Override the `ChildProcess` graceful-shutdown wait (`0` = forever).
    pub fn timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Accepted and stored but has no effect in this core (spec.md §6: the
    /// editor capability probe is out of scope).
    pub fn skip_api_info(mut self, skip: bool) -> Self {
        self.skip_api_info = skip;
        self
    }

    fn build_transport(&self) -> Result<Box<dyn Transport>> {
        let selected = [
            self.socket_path.is_some(),
            self.tcp_address.is_some() && self.tcp_port.is_some(),
            self.use_stdio,
            self.spawn_process,
        ];
        if selected.iter().filter(|s| **s).count() != 1 {
            return Err(Error::UnsupportedTransport);
        }

        if let Some(path) = &self.socket_path {
            return Ok(Box::new(UnixSocket::new(path.clone())));
        }
        if let (Some(host), Some(port)) = (&self.tcp_address, self.tcp_port) {
            return Ok(Box::new(TcpSocket::new(host.clone(), port)));
        }
        if self.use_stdio {
            return Ok(Box::new(Stdio::new()));
        }
        if self.spawn_process {
            return Ok(Box::new(ChildProcess::new(
                self.nvim_path.clone(),
                self.timeout_ms,
            )));
        }
        unreachable!("selection count checked above")
    }
}

/// A buffered inbound notification, drained via [`Client::drain_notifications`].
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// The RPC method name.
    pub method: String,
    /// Method parameters.
    pub params: Value,
}

/// A buffered inbound request, drained via [`Client::drain_requests`].
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRequest {
    /// Correlation id the server expects echoed back in a reply.
    pub id: u32,
    /// The RPC method name.
    pub method: String,
    /// Method parameters.
    pub params: Value,
}

struct Inner {
    transport: Box<dyn Transport>,
    recv_buffer: Vec<u8>,
    connected: bool,
    notifications: Vec<Notification>,
    requests: Vec<IncomingRequest>,
}

/// The request/response correlator (spec.md §4.3).
///
/// Owns a transport, a growable receive buffer, an atomic id counter, and
/// a mutex guarding the write+read cycle — the same shape as the
/// teacher's `RpcClient`, generalized over [`Transport`] and the bare
/// array wire framing.
pub struct Client {
    inner: Mutex<Inner>,
    next_id: AtomicU32,
}

impl Client {
    /// Validate `options` (exactly one transport flag must be selected,
    /// else [`Error::UnsupportedTransport`]) and construct the chosen
    /// transport. Performs no I/O.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let transport = options.build_transport()?;
        Ok(Client {
            inner: Mutex::new(Inner {
                transport,
                recv_buffer: Vec::new(),
                connected: false,
                notifications: Vec::new(),
                requests: Vec::new(),
            }),
            next_id: AtomicU32::new(0),
        })
    }

    /// Connect the underlying transport. Fails with
    /// [`Error::AlreadyConnected`] if already connected. On success, resets
    /// the receive buffer (reconnection is permitted).
    pub fn connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.connected {
            return Err(Error::AlreadyConnected);
        }
        inner.transport.connect("")?;
        inner.connected = true;
        inner.recv_buffer.clear();
        Ok(())
    }

    /// Disconnect the underlying transport. Idempotent; safe from any
    /// state.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            eprintln!("nvim-rpc: disconnect called while already disconnected");
        }
        inner.transport.disconnect();
        inner.connected = false;
    }

    /// The cached connection state, as of the last observed transport
    /// activity.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }

    /// Atomically return-and-increment the message id counter. Wraps at
    /// `u32::MAX` without failing.
    pub fn next_message_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a request and block until its matching response arrives (or a
    /// transport/decode error occurs).
    pub fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_message_id();
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(Error::NotConnected);
        }

        let bytes = codec::encode_request(id, method, &params)?;
        inner.transport.write(&bytes)?;

        loop {
            match codec::decode(&inner.recv_buffer) {
                Ok((message, consumed)) => {
                    inner.recv_buffer.drain(..consumed);
                    match message {
                        Message::Response { id: rid, error, result } => {
                            if rid != id {
                                eprintln!(
                                    "nvim-rpc: response id {rid} does not match in-flight request {id}"
                                );
                                return Err(Error::UnexpectedMessage { expected: id, got: rid });
                            }
                            if !error.is_nil() {
                                return Err(Error::NvimError(error));
                            }
                            return Ok(result);
                        }
                        Message::Notification { method, params } => {
                            inner.notifications.push(Notification { method, params });
                        }
                        Message::Request { id, method, params } => {
                            inner.requests.push(IncomingRequest { id, method, params });
                        }
                    }
                }
                Err(Error::Decode(DecodeError::NeedMore)) => {
                    let mut staging = [0u8; READ_CHUNK];
                    match inner.transport.read(&mut staging) {
                        Ok(0) => {
                            inner.connected = false;
                            return Err(Error::ConnectionClosed);
                        }
                        Ok(n) => inner.recv_buffer.extend_from_slice(&staging[..n]),
                        Err(e) => {
                            if matches!(e, Error::ConnectionClosed | Error::BrokenPipe) {
                                inner.connected = false;
                            }
                            return Err(e);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Encode a notification and write it. Never reads.
    pub fn notify(&self, method: &str, params: Value) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(Error::NotConnected);
        }
        let bytes = codec::encode_notification(method, &params)?;
        inner.transport.write(&bytes)?;
        Ok(())
    }

    /// Drain and return all notifications buffered since the last call.
    pub fn drain_notifications(&self) -> Vec<Notification> {
        let mut inner = self.inner.lock().unwrap();
        std::mem::take(&mut inner.notifications)
    }

    /// Drain and return all server-initiated requests buffered since the
    /// last call.
    pub fn drain_requests(&self) -> Vec<IncomingRequest> {
        let mut inner = self.inner.lock().unwrap();
        std::mem::take(&mut inner.requests)
    }
}
