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

use rand::rngs::OsRng;
use rand::RngCore;

/// Draws `len` fresh bytes from the OS CSPRNG.
///
/// Salts and nonces aren't secret once written to the container, so these
/// come back as a plain `Vec<u8>` rather than a [`crate::secret::SecretBuffer`].
///
/// Uses [`RngCore::try_fill_bytes`] rather than the infallible `fill_bytes`
/// so a short read from the underlying device surfaces as [`Error::Entropy`]
/// instead of panicking. On a freshly booted machine with little gathered
/// entropy this call may legitimately block for seconds; that's expected,
/// not a bug.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| Error::Entropy)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_requested_length() {
        let bytes = random_bytes(16).unwrap();
        assert_eq!(bytes.len(), 16);
    }

    #[test]
    fn two_draws_differ() {
        let a = random_bytes(16).unwrap();
        let b = random_bytes(16).unwrap();
        assert_ne!(a, b);
    }
}
