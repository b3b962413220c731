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

use std::fs::File;

/// What the driver should do with a [`Configuration`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// Nothing to do — help was printed or no container file was given.
    Exit,
    /// Encrypt a plaintext key into a container.
    Encode,
    /// Decrypt a container and serve its key body over a FIFO.
    Decode,
}

/// Everything the core needs to run one encode or decode, built once by the
/// CLI front end and handed to [`crate::driver::run`] by value.
///
/// `sshram_core` never reopens or reinterprets `encoded_file`/`decoded_file`
/// itself: arg parsing, path resolution and `open()` failures are the CLI
/// crate's concern, the same split the teacher keeps between `hbak` (clap,
/// file opening) and `hbak_common` (everything downstream of an open file
/// handle).
pub struct Configuration {
    pub action: Action,
    /// The container file: opened read-write (truncated) on encode, opened
    /// read-only on decode.
    pub encoded_file: File,
    /// The plaintext key file, open read-only. Only present on encode.
    pub decoded_file: Option<File>,
    /// FIFO name under `$HOME/.ssh`; defaults to the container file's
    /// basename.
    pub key_name: String,
    /// Don't unlink the FIFO at decode shutdown.
    pub keep_pipe: bool,
    /// Print salt/nonce/tag and, on decode, the plaintext. Insecure; off by
    /// default.
    pub verbose: bool,
}
