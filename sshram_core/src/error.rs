// sshram_core implements the secret-memory and key-delivery core of sshram,
// a tool that holds an SSH private key encrypted at rest and re-materializes
// it on demand over a named pipe instead of ever writing it to disk.
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

use thiserror::Error;

/// A flat taxonomy of everything that can abort an sshram operation.
///
/// There is no recovery attempted for any of these except the special case
/// where a blocked watch-channel read is interrupted by a shutdown signal,
/// which the pipe server reinterprets as a clean exit rather than an error.
#[derive(Debug, Error)]
pub enum Error {
    /// Couldn't get a decoded (plaintext) file name; exactly one is required.
    #[error("couldn't get a decoded file name (please give exactly one)")]
    ArgDecoded,
    /// The decoded file named by `--encode` couldn't be opened for reading.
    #[error("couldn't open the decoded file")]
    ArgDecodedOpen,
    /// Couldn't get an encoded (container) file name; exactly one is required.
    #[error("couldn't get an encoded file name (please give exactly one)")]
    ArgEncoded,
    /// The encoded (container) file couldn't be opened.
    #[error("couldn't open the encoded file")]
    ArgEncodedOpen,
    /// `--name`/`-n` was given zero or more than one value.
    #[error("couldn't set the pipe name (please give exactly one)")]
    ArgName,

    /// Secret-buffer allocation failed.
    #[error("couldn't allocate secret memory")]
    Allocation,
    /// `mlock` refused to pin the secret buffer.
    #[error("couldn't lock secret memory")]
    MemoryLock,

    /// The controlling terminal couldn't be read.
    #[error("couldn't read from the terminal")]
    TerminalInput,
    /// The passphrase is shorter than 16 bytes.
    #[error("passphrase is not long enough (please use 16 bytes or more)")]
    PassphraseTooShort,
    /// The confirmation entry didn't match the first entry.
    #[error("passphrases did not match")]
    PassphraseMismatch,
    /// `HOME` is unset.
    #[error("couldn't determine the home directory (HOME is not set)")]
    Environment,

    /// A file cursor couldn't be moved.
    #[error("couldn't move the file cursor")]
    Seek,
    /// A file cursor position couldn't be read.
    #[error("couldn't get the file cursor position")]
    Tell,
    /// A file couldn't be read in full.
    #[error("couldn't read the file")]
    Read,
    /// A file couldn't be written in full.
    #[error("couldn't write the file")]
    Write,
    /// The plaintext key body is shorter than 2 bytes.
    #[error("the plaintext key is too small (must be at least 2 bytes)")]
    PlaintextTooSmall,
    /// The container file is too small to hold a header and a key body.
    #[error("the container file is too small to be valid")]
    ContainerTooSmall,

    /// The OS entropy source didn't yield the requested number of bytes.
    #[error("couldn't read from the entropy source")]
    Entropy,
    /// Argon2i key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(#[from] argon2::Error),
    /// ChaCha20-Poly1305 verification failed: wrong passphrase or a
    /// corrupted/tampered container.
    #[error("authentication failed (wrong passphrase or corrupted container)")]
    AuthenticationFailed,

    /// The FIFO target path exists and is not a FIFO.
    #[error("the pipe path exists and is not a named pipe")]
    PathOccupied,
    /// The FIFO couldn't be created.
    #[error("couldn't create the named pipe")]
    FifoCreate,
    /// The FIFO couldn't be opened for delivery.
    #[error("couldn't open the named pipe")]
    FifoOpen,
    /// A write to the FIFO was short or failed.
    #[error("couldn't write to the named pipe")]
    FifoWrite,
    /// Closing the FIFO descriptor failed.
    #[error("couldn't close the named pipe")]
    FifoClose,
    /// Unlinking the FIFO at shutdown failed.
    #[error("couldn't remove the named pipe")]
    FifoUnlink,
    /// The watch channel couldn't be initialized.
    #[error("couldn't initialize the watch channel")]
    WatchInit,
    /// A watch couldn't be registered on the FIFO path.
    #[error("couldn't register a watch on the named pipe")]
    WatchAdd,
    /// A watch-channel read failed for a reason other than shutdown.
    #[error("couldn't read from the watch channel")]
    WatchRead,
    /// A watch-channel read was interrupted by a shutdown signal. Treated by
    /// the pipe server as a clean exit, never surfaced to the driver.
    #[error("shutdown requested while waiting on the watch channel")]
    WatchInterrupted,
    /// The shutdown signal handler couldn't be installed.
    #[error("couldn't install the signal handler")]
    SignalInstall,
}

pub type Result<T> = std::result::Result<T, Error>;
