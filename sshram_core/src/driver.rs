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

//! Ties [`crate::container`] and [`crate::pipe`] together behind one entry
//! point, the way `hbak_common`'s top-level functions are the single thing
//! the CLI crate calls into.

use crate::config::{Action, Configuration};
use crate::container;
use crate::error::Result;
use crate::pipe::{self, PipeServer};

/// Runs one encode or decode to completion.
///
/// `Action::Exit` is a no-op: the CLI crate already printed whatever it
/// needed to (help text, a usage error) before reaching here.
pub fn run(config: Configuration) -> Result<()> {
    match config.action {
        Action::Exit => Ok(()),
        Action::Encode => container::encode(&config),
        Action::Decode => {
            pipe::install_signal_handlers()?;
            let plaintext = container::decode(&config)?;
            let server = PipeServer::new(&config)?;
            server.run(plaintext)
        }
    }
}
