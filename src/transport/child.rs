//! Spawned-child-process transport (spec.md §4.2.4) — the synchronous
//! counterpart of the teacher's `tokio::process::Command`-based agent
//! spawning in `backend/deploy_exec.rs`, and its graceful-shutdown wait the
//! synchronous counterpart of the poll-with-retry idiom in
//! `backend/socket.rs`'s `start_docker_tcp_agent`/`start_k8s_tcp_agent`
//! (there polling a TCP connect; here polling process exit).

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio as ProcStdio};
use std::time::{Duration, Instant};

use super::{read_err, Transport};
use crate::error::{Error, Result};

/// Interval between `try_wait` polls while waiting for graceful exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Spawns `nvim_path --headless --embed` with piped stdin/stdout and
/// inherited stderr.
///
/// State is implicit in which of `child`/`stdin`/`stdout` are populated:
/// `Idle` is all-`None`, `Running` is all-`Some`. `disconnect` drives the
/// `Shutting Down` sequence (close stdin, bounded wait, force-kill on
/// timeout, close stdout) and always returns to `Idle`.
pub struct ChildProcess {
    nvim_path: String,
    /// Shutdown wait timeout; `0` means wait indefinitely.
    timeout_ms: u32,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl ChildProcess {
    /// Build a transport that will spawn `nvim_path` on `connect`, waiting
    /// up to `timeout_ms` (0 = forever) for graceful exit on `disconnect`.
    pub fn new(nvim_path: impl Into<String>, timeout_ms: u32) -> Self {
        ChildProcess {
            nvim_path: nvim_path.into(),
            timeout_ms,
            child: None,
            stdin: None,
            stdout: None,
        }
    }
}

impl Transport for ChildProcess {
    fn connect(&mut self, _endpoint: &str) -> Result<()> {
        let mut child = Command::new(&self.nvim_path)
            .args(["--headless", "--embed"])
            .stdin(ProcStdio::piped())
            .stdout(ProcStdio::piped())
            .stderr(ProcStdio::inherit())
            .spawn()?;

        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take();
        self.child = Some(child);
        Ok(())
    }

    fn disconnect(&mut self) {
        // Closing stdin is the graceful-shutdown signal; drop it first.
        self.stdin = None;

        if let Some(mut child) = self.child.take() {
            let deadline = (self.timeout_ms != 0)
                .then(|| Instant::now() + Duration::from_millis(u64::from(self.timeout_ms)));

            loop {
                match child.try_wait() {
                    Ok(Some(_status)) => break,
                    Ok(None) => {
                        if deadline.is_some_and(|dl| Instant::now() >= dl) {
                            eprintln!(
                                "nvim-rpc: child process did not exit within {}ms, force-killing",
                                self.timeout_ms
                            );
                            let _ = child.kill();
                            let _ = child.wait();
                            break;
                        }
                        std::thread::sleep(POLL_INTERVAL);
                    }
                    Err(e) => {
                        eprintln!("nvim-rpc: error waiting for child process: {e}");
                        break;
                    }
                }
            }
        }

        self.stdout = None;
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stdout = self.stdout.as_mut().ok_or(Error::ConnectionClosed)?;
        stdout.read(buf).map_err(read_err)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(Error::ConnectionClosed)?;
        stdin.write_all(data).map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                Error::BrokenPipe
            } else {
                Error::Io(e)
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.child.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// A stand-in "nvim" that just echoes stdin to stdout, ignoring the
    /// `--headless --embed` argv (the script never references `$@`).
    fn fake_nvim() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake-nvim.sh");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"#!/bin/sh\nexec cat\n").unwrap();
        let mut perms = f.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        let path_str = path.to_str().unwrap().to_string();
        (dir, path_str)
    }

    #[test]
    #[cfg(unix)]
    fn spawn_write_read_and_graceful_shutdown() {
        let (_dir, path) = fake_nvim();
        let mut t = ChildProcess::new(path, 2000);
        t.connect("").unwrap();
        assert!(t.is_connected());

        t.write(b"hello").unwrap();
        let mut buf = [0u8; 5];
        t.read(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        t.disconnect();
        assert!(!t.is_connected());
        t.disconnect(); // idempotent
    }

    #[test]
    fn disconnected_read_and_write_never_touch_os() {
        let mut t = ChildProcess::new("nvim", 5000);
        assert!(!t.is_connected());
        assert!(matches!(
            t.read(&mut [0u8; 4]),
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(t.write(b"x"), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn spawn_failure_surfaces_directly() {
        let mut t = ChildProcess::new("/no/such/binary/anywhere", 5000);
        assert!(t.connect("").is_err());
        assert!(!t.is_connected());
    }
}
