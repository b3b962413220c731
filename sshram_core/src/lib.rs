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

mod error;

pub mod config;
pub mod container;
pub mod driver;
pub mod entropy;
pub mod passphrase;
pub mod pipe;
pub mod secret;

pub use error::{Error, Result};
