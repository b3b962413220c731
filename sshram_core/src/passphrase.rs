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

use crate::error::{Error, Result};
use crate::secret::SecretBuffer;

/// Default maximum passphrase length (including the stripped terminator),
/// matching spec.md's 257-byte line buffer.
pub const MAX_PASSPHRASE_LEN: usize = 257;

/// Minimum passphrase length enforced by [`read_and_confirm_passphrase`].
const MIN_PASSPHRASE_LEN: usize = 16;

/// Prints `prompt`, suspends local echo on the controlling terminal for the
/// duration of the read, and returns a single line (terminator stripped) in
/// a freshly allocated [`SecretBuffer`].
///
/// `rpassword` owns the terminal-mode toggling (it restores echo on every
/// return path, including early ones on error). Its return type is a plain
/// `String`, so the line necessarily exists in ordinary memory for one
/// copy; that copy is wiped immediately after being transferred into the
/// pinned buffer.
pub fn read_passphrase(prompt: &str, max_len: usize) -> Result<SecretBuffer> {
    let line = rpassword::prompt_password(prompt).map_err(|_| Error::TerminalInput)?;
    println!();

    let mut bytes = line.into_bytes();
    bytes.truncate(max_len.saturating_sub(1));

    SecretBuffer::from_zeroizing(bytes)
}

/// Reads a passphrase twice and requires the two entries to match and to be
/// at least 16 bytes long.
///
/// Fails with [`Error::PassphraseMismatch`] if the two entries differ, or
/// [`Error::PassphraseTooShort`] if they match but are shorter than 16
/// bytes. Both intermediate buffers are released (via `Drop`) on every
/// path, including these two failure paths.
pub fn read_and_confirm_passphrase() -> Result<SecretBuffer> {
    let first = read_passphrase(
        "Please enter a new passphrase (16-256 bytes): ",
        MAX_PASSPHRASE_LEN,
    )?;
    let second = read_passphrase(
        "Please confirm the passphrase: ",
        MAX_PASSPHRASE_LEN,
    )?;

    if first.as_slice() != second.as_slice() {
        return Err(Error::PassphraseMismatch);
    }

    if first.len() < MIN_PASSPHRASE_LEN {
        return Err(Error::PassphraseTooShort);
    }

    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_max_len() {
        let bytes = vec![b'a'; 300];
        let buf = SecretBuffer::from_zeroizing({
            let mut b = bytes;
            b.truncate(MAX_PASSPHRASE_LEN.saturating_sub(1));
            b
        })
        .unwrap();
        assert_eq!(buf.len(), MAX_PASSPHRASE_LEN - 1);
    }
}
