// sshram_core implements the secret-memory and key-delivery core of sshram.
// Copyright (C) 2024  Himbeer <himbeerserverde@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The named-pipe delivery server.
//!
//! Unlike `hbakd`'s long-running daemon, this server serves exactly one key
//! body to exactly one reader and then unwinds: it opens the FIFO, writes the
//! first byte, waits for a reader to show up, writes the rest, waits for the
//! reader to go away, and exits.

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::secret::SecretBuffer;

use std::ffi::CString;
use std::fs::DirBuilder;
use std::mem::MaybeUninit;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use inotify::{Inotify, WatchMask};

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn handle_signal(_signum: libc::c_int) {
    RUNNING.store(false, Ordering::SeqCst);
}

/// Installs a handler for SIGINT/SIGTERM/SIGHUP that flips [`RUNNING`] to
/// false and does nothing else.
///
/// Deliberately built on raw [`libc::sigaction`] rather than the teacher's
/// `ctrlc` dependency: `sa_flags` is left at 0, so syscalls blocked in the
/// kernel when a signal arrives return `EINTR` instead of being transparently
/// restarted. [`PipeServer::wait_for_access`] depends on seeing that
/// interruption to tell a shutdown request apart from a reader event.
pub fn install_signal_handlers() -> Result<()> {
    for signum in [libc::SIGINT, libc::SIGTERM, libc::SIGHUP] {
        // SAFETY: `action` is fully initialized before being passed to
        // `sigaction`, and `handle_signal` only touches an atomic.
        unsafe {
            let mut action: libc::sigaction = MaybeUninit::zeroed().assume_init();
            action.sa_sigaction = handle_signal as usize;
            action.sa_flags = 0;
            libc::sigemptyset(&mut action.sa_mask);

            if libc::sigaction(signum, &action, std::ptr::null_mut()) != 0 {
                return Err(Error::SignalInstall);
            }
        }
    }
    Ok(())
}

/// Serves one key body over a FIFO under `$HOME/.ssh`, then tears the FIFO
/// down (unless told to keep it).
pub struct PipeServer {
    path: PathBuf,
    inotify: Inotify,
    keep_pipe: bool,
}

impl PipeServer {
    /// Resolves `$HOME/.ssh/<key_name>`, creates `~/.ssh` (mode 0700) if it
    /// doesn't exist, creates the FIFO (mode 0600) if it doesn't exist, and
    /// sets up a watch on it.
    ///
    /// If the path already exists and is not a FIFO, fails with
    /// [`Error::PathOccupied`] rather than clobbering whatever is there.
    pub fn new(config: &Configuration) -> Result<Self> {
        let home = std::env::var_os("HOME").ok_or(Error::Environment)?;
        let ssh_dir = Path::new(&home).join(".ssh");

        if !ssh_dir.exists() {
            DirBuilder::new()
                .mode(0o700)
                .create(&ssh_dir)
                .map_err(|_| Error::FifoCreate)?;
        }

        let path = ssh_dir.join(&config.key_name);
        if ensure_fifo(&path)? {
            eprintln!("[info] created pipe at {}", path.display());
        } else {
            eprintln!("[info] reusing existing pipe at {}", path.display());
        }

        let mut inotify = Inotify::init().map_err(|_| Error::WatchInit)?;
        inotify
            .watches()
            .add(&path, WatchMask::ACCESS)
            .map_err(|_| Error::WatchAdd)?;

        Ok(Self {
            path,
            inotify,
            keep_pipe: config.keep_pipe,
        })
    }

    /// Runs the delivery loop, then always unlinks the FIFO (unless
    /// `keep_pipe`), regardless of how the loop ended.
    ///
    /// `plaintext` is taken by value so the key body is dropped — and so
    /// zeroized and unlocked — the moment this function returns, on every
    /// path.
    pub fn run(mut self, plaintext: SecretBuffer) -> Result<()> {
        let result = self.delivery_loop(&plaintext);
        let shutdown_result = self.shutdown();
        result.and(shutdown_result)
    }

    fn delivery_loop(&mut self, plaintext: &SecretBuffer) -> Result<()> {
        let bytes = plaintext.as_slice();
        if bytes.is_empty() {
            return Ok(());
        }

        let mut event_buf = [0u8; 4096];

        loop {
            if !RUNNING.load(Ordering::SeqCst) {
                eprintln!("[info] shutdown requested, exiting delivery loop");
                return Ok(());
            }

            let fd = open_fifo(&self.path)?;

            if let Err(e) = write_all_fd(fd, &bytes[..1]) {
                close_fd(fd);
                return Err(e);
            }

            if self.wait_for_access(&mut event_buf)? {
                close_fd(fd);
                eprintln!("[info] shutdown requested, exiting delivery loop");
                return Ok(());
            }

            if bytes.len() > 1 {
                if let Err(e) = write_all_fd(fd, &bytes[1..]) {
                    close_fd(fd);
                    return Err(e);
                }
            }

            if unsafe { libc::close(fd) } != 0 {
                return Err(Error::FifoClose);
            }

            if self.wait_for_access(&mut event_buf)? {
                eprintln!("[info] shutdown requested, exiting delivery loop");
                return Ok(());
            }

            eprintln!("[info] delivery complete, awaiting next reader");
        }
    }

    /// Blocks on the watch channel for one event.
    ///
    /// Returns `Ok(true)` when the wait was interrupted by a shutdown
    /// signal (the caller should stop serving), `Ok(false)` on a normal
    /// access event.
    fn wait_for_access(&mut self, buf: &mut [u8]) -> Result<bool> {
        match self.inotify.read_events_blocking(buf) {
            Ok(_events) => Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                Ok(!RUNNING.load(Ordering::SeqCst))
            }
            Err(_) => Err(Error::WatchRead),
        }
    }

    fn shutdown(&self) -> Result<()> {
        if self.keep_pipe {
            eprintln!("[info] --keep given, leaving pipe at {}", self.path.display());
            return Ok(());
        }
        std::fs::remove_file(&self.path).map_err(|_| Error::FifoUnlink)?;
        eprintln!("[info] removed pipe at {}", self.path.display());
        Ok(())
    }
}

/// Returns `Ok(true)` if a fresh FIFO was created, `Ok(false)` if an
/// existing one was found and is being reused.
fn ensure_fifo(path: &Path) -> Result<bool> {
    let c_path = path_to_cstring(path)?;

    // SAFETY: `c_path` is a valid, NUL-terminated buffer for the duration of
    // the call.
    let mut st: libc::stat = unsafe { MaybeUninit::zeroed().assume_init() };
    let stat_ret = unsafe { libc::stat(c_path.as_ptr(), &mut st) };

    if stat_ret == 0 {
        if (st.st_mode & libc::S_IFMT) != libc::S_IFIFO {
            return Err(Error::PathOccupied);
        }
        return Ok(false);
    }

    // SAFETY: `c_path` is valid for the duration of the call.
    let ret = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if ret != 0 {
        return Err(Error::FifoCreate);
    }
    Ok(true)
}

fn open_fifo(path: &Path) -> Result<libc::c_int> {
    let c_path = path_to_cstring(path)?;

    // SAFETY: `c_path` is valid for the duration of the call. Opening a FIFO
    // O_RDWR never blocks per POSIX, even with no reader present yet, which
    // is exactly why the writer side uses this mode instead of O_WRONLY.
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_NONBLOCK) };
    if fd < 0 {
        return Err(Error::FifoOpen);
    }
    Ok(fd)
}

fn write_all_fd(fd: libc::c_int, mut bytes: &[u8]) -> Result<()> {
    while !bytes.is_empty() {
        // SAFETY: `bytes` points to `bytes.len()` live, readable bytes.
        let n = unsafe {
            libc::write(
                fd,
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
            )
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                continue;
            }
            return Err(Error::FifoWrite);
        }
        bytes = &bytes[n as usize..];
    }
    Ok(())
}

fn close_fd(fd: libc::c_int) {
    unsafe {
        libc::close(fd);
    }
}

fn path_to_cstring(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_encoded_bytes()).map_err(|_| Error::FifoCreate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_fifo_creates_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-pipe");

        assert!(ensure_fifo(&path).unwrap());
        assert!(path.exists());

        assert!(!ensure_fifo(&path).unwrap());
    }

    #[test]
    fn ensure_fifo_rejects_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-pipe");
        std::fs::write(&path, b"hello").unwrap();

        let err = ensure_fifo(&path).unwrap_err();
        assert!(matches!(err, Error::PathOccupied));
    }
}
