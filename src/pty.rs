//! PTY/child supervisor: spawns `/bin/sh -lc <cmd>` on a pseudo-terminal,
//! owns the master side, and tears the child down on close.
//!
//! Built on `portable_pty` rather than hand-rolled `posix_openpt`/`fork`/
//! `exec`, matching how this lineage's own `pty_mux` opens PTYs. Unlike that
//! subsystem, reads here are driven synchronously from `pump()` — no
//! background thread, no channel.

use std::io::{Read, Write};
use std::time::Duration;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tracing::{debug, warn};

use crate::error::{PopupError, Result};

/// Poll interval while waiting for a SIGTERM'd child to exit.
pub const GRACE_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Maximum number of polls (≈500ms total) before giving up and moving on.
pub const GRACE_MAX_POLLS: u32 = 50;

/// Per-pump byte budget: bounds CPU spent draining an adversarially chatty child.
pub const PUMP_BYTE_BUDGET: usize = 64 * 1024;

/// Owns the PTY master and the child process spawned on its slave side.
pub struct PtySupervisor {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    reader: Box<dyn Read + Send>,
    child: Box<dyn Child + Send + Sync>,
    pub running: bool,
}

impl std::fmt::Debug for PtySupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySupervisor").field("running", &self.running).finish_non_exhaustive()
    }
}

impl PtySupervisor {
    /// Spawn `/bin/sh -lc <cmd>` on a PTY sized `rows x cols`.
    ///
    /// # Errors
    /// Returns [`PopupError::Spawn`] if opening the pty pair or spawning the
    /// child fails.
    pub fn spawn(cmd: &str, rows: u16, cols: u16) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| PopupError::Spawn(std::io::Error::other(e)))?;

        let mut builder = CommandBuilder::new("/bin/sh");
        builder.arg("-lc");
        builder.arg(cmd);
        builder.env("TERM", "xterm-256color");
        builder.env("COLUMNS", cols.to_string());
        builder.env("LINES", rows.to_string());

        let child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| PopupError::Spawn(std::io::Error::other(e)))?;
        // The slave side now belongs to the child; drop our handle to it.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PopupError::Spawn(std::io::Error::other(e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PopupError::Spawn(std::io::Error::other(e)))?;

        debug!("spawned child on pty: {cmd}");
        Ok(Self { master: pair.master, writer, reader, child, running: true })
    }

    /// Drain the master into `raw_tail` and `vt` until `EAGAIN`, EOF, or the
    /// byte budget is exhausted. Returns the number of bytes consumed.
    pub fn drain_into(&mut self, mut sink: impl FnMut(&[u8])) -> usize {
        let mut buf = [0u8; 4096];
        let mut total = 0;
        loop {
            if total >= PUMP_BYTE_BUDGET {
                break;
            }
            match self.reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    sink(&buf[..n]);
                    total += n;
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        total
    }

    /// Best-effort write to the child's stdin. Short writes / `EAGAIN` are dropped.
    pub fn write_best_effort(&mut self, bytes: &[u8]) {
        if self.writer.write_all(bytes).is_err() {
            // Human-driven input stream: dropped bytes are acceptable.
        }
    }

    /// Non-blocking check for child exit.
    #[must_use]
    pub fn try_wait_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(_)) => {
                self.running = false;
                true
            }
            _ => false,
        }
    }

    /// Propagate a new window size to the master and signal the child.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        let _ = self.master.resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 });
        self.send_sigwinch();
    }

    /// SIGTERM the child, then poll for up to `GRACE_MAX_POLLS *
    /// GRACE_POLL_INTERVAL` before forcing it down (the caller should still
    /// treat the child as gone afterwards either way).
    pub fn kill_and_reap(&mut self) {
        if !self.running {
            return;
        }
        self.send_sigterm();
        for _ in 0..GRACE_MAX_POLLS {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                self.running = false;
                return;
            }
            std::thread::sleep(GRACE_POLL_INTERVAL);
        }
        // Grace period elapsed: force it down so we never leave a zombie behind.
        if let Err(e) = self.child.kill() {
            warn!("failed to force-kill child after grace period: {e}");
        }
        let _ = self.child.wait();
        self.running = false;
    }

    #[cfg(unix)]
    fn send_sigterm(&self) {
        self.send_signal(rustix::process::Signal::TERM, "SIGTERM");
    }

    #[cfg(not(unix))]
    fn send_sigterm(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!("failed to signal child: {e}");
        }
    }

    /// Explicitly signal the child on resize. `portable_pty`'s `TIOCSWINSZ`
    /// ioctl already makes the kernel raise `SIGWINCH` for the slave's
    /// foreground process group, but a child that backgrounded itself (or
    /// changed process group) would miss that; send it directly too.
    #[cfg(unix)]
    fn send_sigwinch(&self) {
        self.send_signal(rustix::process::Signal::WINCH, "SIGWINCH");
    }

    #[cfg(not(unix))]
    fn send_sigwinch(&self) {}

    #[cfg(unix)]
    fn send_signal(&self, signal: rustix::process::Signal, name: &str) {
        if let Some(pid) = self.child.process_id() {
            let pid = rustix::process::Pid::from_raw(pid.try_into().unwrap_or(1));
            if let Some(pid) = pid {
                if let Err(e) = rustix::process::kill_process(pid, signal) {
                    warn!("failed to send {name} to child: {e}");
                }
            }
        }
    }
}

impl Drop for PtySupervisor {
    fn drop(&mut self) {
        if self.running {
            self.kill_and_reap();
        }
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn spawn_and_drain_echo() {
        let mut pty = PtySupervisor::spawn("echo hello", 24, 80).expect("spawn");
        let mut collected = Vec::new();
        for _ in 0..200 {
            pty.drain_into(|chunk| collected.extend_from_slice(chunk));
            if pty.try_wait_exited() {
                pty.drain_into(|chunk| collected.extend_from_slice(chunk));
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(String::from_utf8_lossy(&collected).contains("hello"));
    }

    #[test]
    #[serial]
    fn kill_and_reap_is_bounded() {
        let mut pty = PtySupervisor::spawn("sleep 30", 24, 80).expect("spawn");
        let start = std::time::Instant::now();
        pty.kill_and_reap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!pty.running);
    }
}
