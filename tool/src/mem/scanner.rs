/*
 * Created on Sun Mar 09 2025
 *
 * This file is a part of ReefFS
 * ReefFS is a free and open-source distributed file system whose
 * metadata service journals every change before applying it, with the
 * goal of staying recoverable without compromising on performance or
 * scalability.
 *
 * Copyright (c) 2025, the ReefFS authors <dev@reeffs.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use crate::error::{DecodeError, RuntimeResult};

#[derive(Debug, PartialEq)]
/// A checked scanner over a byte buffer
///
/// Every accessor verifies the remaining length first; journal payloads are
/// untrusted input, so truncation is an expected decode failure rather than
/// a caller bug.
pub struct BufferedScanner<'a> {
    d: &'a [u8],
    cursor: usize,
}

impl<'a> BufferedScanner<'a> {
    /// Create a new scanner, starting at position 0
    pub const fn new(d: &'a [u8]) -> Self {
        Self { d, cursor: 0 }
    }
    pub const fn buffer_len(&self) -> usize {
        self.d.len()
    }
    /// Returns the remaining number of bytes
    pub const fn remaining(&self) -> usize {
        self.buffer_len() - self.cursor
    }
    /// Returns the current cursor position
    pub const fn cursor(&self) -> usize {
        self.cursor
    }
    pub fn eof(&self) -> bool {
        self.remaining() == 0
    }
    /// Returns true if the scanner has atleast `sizeof` bytes remaining
    pub fn has_left(&self, sizeof: usize) -> bool {
        self.remaining() >= sizeof
    }
    /// Move the cursor ahead to the given absolute position
    pub fn seek_to(&mut self, i: usize) -> RuntimeResult<()> {
        if i < self.cursor || i > self.buffer_len() {
            return Err(DecodeError::IllegalData.into());
        }
        self.cursor = i;
        Ok(())
    }
}

impl<'a> BufferedScanner<'a> {
    pub fn try_next_byte(&mut self) -> RuntimeResult<u8> {
        let [b] = self.try_next_chunk::<1>()?;
        Ok(b)
    }
    pub fn try_next_u32_le(&mut self) -> RuntimeResult<u32> {
        Ok(u32::from_le_bytes(self.try_next_chunk()?))
    }
    pub fn try_next_u64_le(&mut self) -> RuntimeResult<u64> {
        Ok(u64::from_le_bytes(self.try_next_chunk()?))
    }
    /// Load the next fixed-size block
    pub fn try_next_chunk<const N: usize>(&mut self) -> RuntimeResult<[u8; N]> {
        if !self.has_left(N) {
            return Err(DecodeError::ShortPayload.into());
        }
        let mut b = [0u8; N];
        b.copy_from_slice(&self.d[self.cursor..self.cursor + N]);
        self.cursor += N;
        Ok(b)
    }
    /// Load the next variable-sized block
    pub fn try_next_variable_block(&mut self, size: usize) -> RuntimeResult<&'a [u8]> {
        if !self.has_left(size) {
            return Err(DecodeError::ShortPayload.into());
        }
        let r = &self.d[self.cursor..self.cursor + size];
        self.cursor += size;
        Ok(r)
    }
}

#[cfg(test)]
mod tests {
    use super::BufferedScanner;

    #[test]
    fn scan_primitives() {
        let mut buf = vec![7u8];
        buf.extend(0xC0FFEEu32.to_le_bytes());
        buf.extend(0xDEAD_0000_BEEFu64.to_le_bytes());
        buf.extend(b"tail");
        let mut s = BufferedScanner::new(&buf);
        assert_eq!(s.try_next_byte().unwrap(), 7);
        assert_eq!(s.try_next_u32_le().unwrap(), 0xC0FFEE);
        assert_eq!(s.try_next_u64_le().unwrap(), 0xDEAD_0000_BEEF);
        assert_eq!(s.try_next_variable_block(4).unwrap(), b"tail");
        assert!(s.eof());
    }

    #[test]
    fn scan_truncation() {
        let buf = 1u32.to_le_bytes();
        let mut s = BufferedScanner::new(&buf);
        assert!(s.try_next_u64_le().is_err());
        // the failed read must not move the cursor
        assert_eq!(s.cursor(), 0);
        assert_eq!(s.try_next_u32_le().unwrap(), 1);
    }
}
