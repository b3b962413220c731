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

//! The container codec: `salt(16) ∥ nonce(12) ∥ tag(16) ∥ ciphertext(L)`.
//!
//! Both sides derive the key the same way: Argon2i, time cost 100, memory
//! cost 2^16 KiB, parallelism 1, 32-byte output. This is part of the
//! on-disk contract, not a tunable — changing it breaks every existing
//! container.
//!
//! [`encode`] and [`decode`] are thin wrappers around
//! [`encode_with_passphrase`]/[`decode_with_header_and_passphrase`] that do
//! nothing but prompt a terminal for the passphrase. The split exists so
//! the actual codec can be driven directly in tests without a controlling
//! terminal, the same way the pipe server's shutdown flag is driven
//! directly rather than through a real signal.

use crate::config::Configuration;
use crate::entropy::random_bytes;
use crate::error::{Error, Result};
use crate::passphrase;
use crate::secret::SecretBuffer;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce, Tag};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

const ARGON2_MEMORY_COST_KIB: u32 = 1 << 16;
const ARGON2_TIME_COST: u32 = 100;
const ARGON2_PARALLELISM: u32 = 1;
const DERIVED_KEY_LEN: usize = 32;

/// The non-secret prefix of a container: salt, nonce, and AEAD tag.
struct Header {
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    tag: [u8; TAG_LEN],
}

/// Encrypts `config.decoded_file`'s contents into `config.encoded_file`.
///
/// Prompts for and confirms a fresh passphrase, derives a key with a random
/// salt, encrypts under a random nonce, and writes
/// `salt ∥ nonce ∥ tag ∥ ciphertext`. Every secret buffer involved —
/// passphrase, derived key, plaintext — is released on every exit path.
pub fn encode(config: &Configuration) -> Result<()> {
    let passphrase = passphrase::read_and_confirm_passphrase()?;
    encode_with_passphrase(config, passphrase.as_slice())
}

fn encode_with_passphrase(config: &Configuration, passphrase: &[u8]) -> Result<()> {
    let decoded_file = config.decoded_file.as_ref().ok_or(Error::ArgDecoded)?;

    let plaintext_len = measure_and_rewind(decoded_file)? as usize;
    if plaintext_len < 2 {
        return Err(Error::PlaintextTooSmall);
    }

    let salt = random_bytes(SALT_LEN)?;
    let nonce_bytes = random_bytes(NONCE_LEN)?;

    let derived = derive_key(passphrase, &salt)?;

    let mut plaintext = SecretBuffer::allocate(plaintext_len)?;
    read_exact_mapped(decoded_file, plaintext.as_mut_slice())?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(derived.as_slice()));
    let nonce = Nonce::from_slice(&nonce_bytes);

    let tag = cipher
        .encrypt_in_place_detached(nonce, b"", plaintext.as_mut_slice())
        .expect("chacha20poly1305 only rejects messages over ~64 GiB");

    if config.verbose {
        print_hex("salt", &salt);
        print_hex("nonce", &nonce_bytes);
        print_hex("tag", tag.as_slice());
    }

    let mut encoded_file = &config.encoded_file;
    encoded_file.write_all(&salt).map_err(|_| Error::Write)?;
    encoded_file
        .write_all(&nonce_bytes)
        .map_err(|_| Error::Write)?;
    encoded_file
        .write_all(tag.as_slice())
        .map_err(|_| Error::Write)?;
    encoded_file
        .write_all(plaintext.as_slice())
        .map_err(|_| Error::Write)?;

    Ok(())
}

/// Decrypts `config.encoded_file` and returns the plaintext key body in a
/// pinned [`SecretBuffer`], ready to be handed to the pipe server.
///
/// Fails with [`Error::AuthenticationFailed`] on a wrong passphrase or a
/// corrupted container; no plaintext bytes are ever copied out of the
/// ciphertext buffer unless verification succeeds.
pub fn decode(config: &Configuration) -> Result<SecretBuffer> {
    let total_len = measure_and_rewind(&config.encoded_file)? as usize;
    if total_len < HEADER_LEN + 2 {
        return Err(Error::ContainerTooSmall);
    }

    let header = read_header(&config.encoded_file, config.verbose)?;
    let passphrase = passphrase::read_passphrase("Please enter the passphrase: ", 257)?;

    decode_with_header_and_passphrase(config, &header, passphrase.as_slice(), total_len)
}

fn read_header(encoded_file: &File, verbose: bool) -> Result<Header> {
    let mut reader = encoded_file;
    let mut salt = [0u8; SALT_LEN];
    reader.read_exact(&mut salt).map_err(|_| Error::Read)?;
    let mut nonce = [0u8; NONCE_LEN];
    reader.read_exact(&mut nonce).map_err(|_| Error::Read)?;
    let mut tag = [0u8; TAG_LEN];
    reader.read_exact(&mut tag).map_err(|_| Error::Read)?;

    if verbose {
        print_hex("salt", &salt);
        print_hex("nonce", &nonce);
        print_hex("tag", &tag);
    }

    Ok(Header { salt, nonce, tag })
}

fn decode_with_header_and_passphrase(
    config: &Configuration,
    header: &Header,
    passphrase: &[u8],
    total_len: usize,
) -> Result<SecretBuffer> {
    let derived = derive_key(passphrase, &header.salt)?;

    let body_len = total_len - HEADER_LEN;
    let mut body = SecretBuffer::allocate(body_len)?;
    read_exact_mapped(&config.encoded_file, body.as_mut_slice())?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(derived.as_slice()));
    let nonce = Nonce::from_slice(&header.nonce);
    let tag = Tag::from_slice(&header.tag);

    cipher
        .decrypt_in_place_detached(nonce, b"", body.as_mut_slice(), tag)
        .map_err(|_| Error::AuthenticationFailed)?;

    if config.verbose {
        println!("{}", String::from_utf8_lossy(body.as_slice()));
    }

    Ok(body)
}

fn derive_key(passphrase: &[u8], salt: &[u8]) -> Result<SecretBuffer> {
    let params = Params::new(
        ARGON2_MEMORY_COST_KIB,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(DERIVED_KEY_LEN),
    )
    .map_err(Error::KeyDerivation)?;
    let argon2 = Argon2::new(Algorithm::Argon2i, Version::default(), params);

    let mut derived = SecretBuffer::allocate(DERIVED_KEY_LEN)?;
    argon2
        .hash_password_into(passphrase, salt, derived.as_mut_slice())
        .map_err(Error::KeyDerivation)?;

    Ok(derived)
}

/// Seeks to end (for the length), reads the position back, then rewinds to
/// the start. Mirrors the `fseek`/`ftell` two-step of the original tool
/// this format was ported from, so a failure in either half maps to a
/// distinct error kind.
fn measure_and_rewind(file: &File) -> Result<u64> {
    let mut f = file;
    f.seek(SeekFrom::End(0)).map_err(|_| Error::Seek)?;
    let len = f.stream_position().map_err(|_| Error::Tell)?;
    f.seek(SeekFrom::Start(0)).map_err(|_| Error::Seek)?;
    Ok(len)
}

fn read_exact_mapped(mut file: &File, buf: &mut [u8]) -> Result<()> {
    file.read_exact(buf).map_err(|_| Error::Read)
}

fn print_hex(label: &str, bytes: &[u8]) {
    println!("{label}: {}", hex::encode(bytes));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Action;

    use std::io::Seek as _;

    fn write_temp(contents: &[u8]) -> File {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(contents).unwrap();
        file.rewind().unwrap();
        file
    }

    fn empty_temp() -> File {
        tempfile::tempfile().unwrap()
    }

    fn make_config(action: Action, encoded_file: File, decoded_file: Option<File>) -> Configuration {
        Configuration {
            action,
            encoded_file,
            decoded_file,
            key_name: "test-key".to_string(),
            keep_pipe: false,
            verbose: false,
        }
    }

    #[test]
    fn measure_and_rewind_reports_length_and_resets_cursor() {
        let file = write_temp(b"hello world");
        let len = measure_and_rewind(&file).unwrap();
        assert_eq!(len, 11);

        let mut reader = &file;
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn derive_key_is_deterministic_for_same_inputs() {
        let a = derive_key(b"correcthorsebattery", b"0123456789abcdef").unwrap();
        let b = derive_key(b"correcthorsebattery", b"0123456789abcdef").unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn derive_key_differs_on_salt() {
        let a = derive_key(b"correcthorsebattery", b"0123456789abcdef").unwrap();
        let b = derive_key(b"correcthorsebattery", b"fedcba9876543210").unwrap();
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn decode_rejects_container_below_minimum_size() {
        let encoded = write_temp(&[0u8; HEADER_LEN]);
        let config = make_config(Action::Decode, encoded, None);
        let err = decode(&config).unwrap_err();
        assert!(matches!(err, Error::ContainerTooSmall));
    }

    /// S1: round-trip. Encode "ab" under a passphrase, decode with the same
    /// passphrase, and recover exactly the original bytes.
    #[test]
    fn round_trip_recovers_original_plaintext() {
        let decoded = write_temp(b"ab");
        let encoded = empty_temp();
        let config = make_config(Action::Encode, encoded, Some(decoded));

        encode_with_passphrase(&config, b"correcthorsebattery").unwrap();

        let total_len = measure_and_rewind(&config.encoded_file).unwrap() as usize;
        let header = read_header(&config.encoded_file, false).unwrap();

        let recovered =
            decode_with_header_and_passphrase(&config, &header, b"correcthorsebattery", total_len)
                .unwrap();
        assert_eq!(recovered.as_slice(), b"ab");
    }

    /// S2: wrong passphrase. Decoding with a different passphrase than the
    /// one used at encode time must fail authentication, never yield bytes.
    #[test]
    fn wrong_passphrase_fails_authentication() {
        let decoded = write_temp(b"ab");
        let encoded = empty_temp();
        let config = make_config(Action::Encode, encoded, Some(decoded));

        encode_with_passphrase(&config, b"correcthorsebattery").unwrap();

        let total_len = measure_and_rewind(&config.encoded_file).unwrap() as usize;
        let header = read_header(&config.encoded_file, false).unwrap();

        let err =
            decode_with_header_and_passphrase(&config, &header, b"wronghorsebatteryyy", total_len)
                .unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed));
    }

    /// Property 3: container length is always 44 + len(plaintext).
    #[test]
    fn container_length_equals_header_plus_plaintext() {
        let plaintext = b"a sufficiently long plaintext key body";
        let decoded = write_temp(plaintext);
        let encoded = empty_temp();
        let config = make_config(Action::Encode, encoded, Some(decoded));

        encode_with_passphrase(&config, b"correcthorsebattery").unwrap();

        let total_len = measure_and_rewind(&config.encoded_file).unwrap() as usize;
        assert_eq!(total_len, HEADER_LEN + plaintext.len());
    }

    /// Property 4: two encodes of the same plaintext and passphrase produce
    /// different salts and nonces.
    #[test]
    fn two_encodes_use_fresh_salt_and_nonce() {
        let config_a = make_config(Action::Encode, empty_temp(), Some(write_temp(b"ab")));
        encode_with_passphrase(&config_a, b"correcthorsebattery").unwrap();
        measure_and_rewind(&config_a.encoded_file).unwrap();
        let header_a = read_header(&config_a.encoded_file, false).unwrap();

        let config_b = make_config(Action::Encode, empty_temp(), Some(write_temp(b"ab")));
        encode_with_passphrase(&config_b, b"correcthorsebattery").unwrap();
        measure_and_rewind(&config_b.encoded_file).unwrap();
        let header_b = read_header(&config_b.encoded_file, false).unwrap();

        assert_ne!(header_a.salt, header_b.salt);
        assert_ne!(header_a.nonce, header_b.nonce);
    }
}
