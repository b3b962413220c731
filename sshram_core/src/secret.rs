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

use std::os::raw::c_void;

use zeroize::Zeroize;

/// A page-locked byte buffer that is zeroized before it is unlocked and
/// freed, on every exit path including unwinding from an error.
///
/// Rust's `Drop` is the scope-termination hook the discipline in spec.md
/// §4.1 asks for: a `SecretBuffer` never needs a manual `release()` call
/// because going out of scope — by `return`, by `?`, or by panic — always
/// runs [`Drop::drop`]. Several `SecretBuffer`s declared in the same
/// function release in the reverse of their declaration order, which is
/// exactly the "stacked secrets release in reverse acquisition order"
/// invariant.
///
/// A `SecretBuffer` is never `Clone`, its contents are never copied into
/// ordinary (unlocked) memory by anything in this crate, and it is never
/// resized after [`SecretBuffer::allocate`] returns.
pub struct SecretBuffer {
    data: Vec<u8>,
    locked: bool,
}

impl SecretBuffer {
    /// Allocates `len` bytes, zero-initialized, and pins them in physical
    /// memory so the kernel won't swap them to disk.
    ///
    /// Fails with [`Error::Allocation`] if the allocation itself fails, or
    /// [`Error::MemoryLock`] if the platform refuses to pin the range (for
    /// example because of an `RLIMIT_MEMLOCK` that's too low).
    pub fn allocate(len: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| Error::Allocation)?;
        data.resize(len, 0);

        let locked = if len == 0 {
            true
        } else {
            // SAFETY: `data` owns `len` live bytes at this address for the
            // duration of the call.
            let ret = unsafe { libc::mlock(data.as_ptr() as *const c_void, len) };
            if ret != 0 {
                return Err(Error::MemoryLock);
            }
            true
        };

        Ok(Self { data, locked })
    }

    /// Builds a `SecretBuffer` by allocating `bytes.len()` bytes and copying
    /// `bytes` into the pinned range, then zeroizing the caller's copy.
    ///
    /// Used at the one seam where secret bytes necessarily pass through an
    /// ordinary allocation first — `rpassword` only hands back a `String` —
    /// to shrink the window where the secret lives outside pinned memory to
    /// a single copy, immediately erased.
    pub fn from_zeroizing(mut bytes: Vec<u8>) -> Result<Self> {
        let mut buf = Self::allocate(bytes.len())?;
        buf.as_mut_slice().copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(buf)
    }

    /// An immutable view of the pinned bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// A mutable view of the pinned bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Number of pinned bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Overwrites every byte with zero using a write the compiler cannot
    /// elide as a dead store. Safe to call more than once.
    fn clear(&mut self) {
        self.data.zeroize();
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.clear();

        if self.locked && !self.data.is_empty() {
            // SAFETY: `data` still owns its backing allocation; we're
            // unlocking exactly the range `allocate` locked.
            unsafe {
                libc::munlock(self.data.as_ptr() as *const c_void, self.data.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_is_zeroed() {
        let buf = SecretBuffer::allocate(32).unwrap();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
        assert_eq!(buf.len(), 32);
    }

    #[test]
    fn clear_zeroizes_in_place() {
        let mut buf = SecretBuffer::allocate(8).unwrap();
        buf.as_mut_slice().copy_from_slice(b"deadbeef");
        buf.clear();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn from_zeroizing_copies_into_pinned_buffer() {
        let source = b"correcthorsebattery".to_vec();
        let buf = SecretBuffer::from_zeroizing(source).unwrap();
        assert_eq!(buf.as_slice(), b"correcthorsebattery");
    }

    #[test]
    fn empty_buffer_is_allowed() {
        let buf = SecretBuffer::allocate(0).unwrap();
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
    }
}
