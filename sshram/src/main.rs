// sshram is a command line tool for encrypting SSH private keys at rest and
// delivering them over a named pipe.
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

mod error;
use error::*;

use sshram_core::config::{Action, Configuration};

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Encrypt DECODED_FILE into the container instead of decoding it.
    #[arg(short, long, value_name = "DECODED_FILE")]
    encode: Option<PathBuf>,
    /// Name of the named pipe under ~/.ssh. Defaults to the container file's name.
    #[arg(short, long)]
    name: Option<String>,
    /// Don't remove the named pipe when decoding finishes.
    #[arg(short, long)]
    keep: bool,
    /// Print the salt, nonce, tag and (on decode) the plaintext key. Insecure.
    #[arg(short, long)]
    verbose: bool,
    /// The container file to encode into or decode from.
    container_file: Vec<PathBuf>,
}

/// Builds a [`Configuration`] from parsed arguments, or `None` if there was
/// nothing to do (no container file given — help was already printed).
///
/// A second positional argument is rejected with [`sshram_core::Error::ArgEncoded`]
/// rather than clap's generic "unexpected argument" error, matching the
/// "please give exactly one" message texture of spec.md §6.
fn build_configuration(cli: Cli) -> Result<Option<Configuration>> {
    let container_file = match cli.container_file.len() {
        0 => {
            Cli::command().print_help()?;
            println!();
            return Ok(None);
        }
        1 => cli.container_file[0].clone(),
        _ => return Err(sshram_core::Error::ArgEncoded.into()),
    };

    let key_name = match cli.name {
        Some(name) => name,
        None => container_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(sshram_core::Error::ArgName)?,
    };

    let action = if cli.encode.is_some() {
        Action::Encode
    } else {
        Action::Decode
    };

    let decoded_file = match &cli.encode {
        Some(path) => Some(
            OpenOptions::new()
                .read(true)
                .open(path)
                .map_err(|_| sshram_core::Error::ArgDecodedOpen)?,
        ),
        None => None,
    };

    let encoded_file = match action {
        Action::Encode => OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&container_file)
            .map_err(|_| sshram_core::Error::ArgEncodedOpen)?,
        _ => OpenOptions::new()
            .read(true)
            .open(&container_file)
            .map_err(|_| sshram_core::Error::ArgEncodedOpen)?,
    };

    Ok(Some(Configuration {
        action,
        encoded_file,
        decoded_file,
        key_name,
        keep_pipe: cli.keep,
        verbose: cli.verbose,
    }))
}

fn logic() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            print!("{e}");
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    return Ok(());
                }
                _ => std::process::exit(1),
            }
        }
    };

    let Some(config) = build_configuration(cli)? else {
        return Ok(());
    };

    sshram_core::driver::run(config)?;

    Ok(())
}

fn main() -> ExitCode {
    match logic() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
