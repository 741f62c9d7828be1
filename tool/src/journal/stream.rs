/*
 * Created on Tue Mar 25 2025
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

use crate::error::{FramingError, RuntimeResult};

/*
    The resilient stream frames every event as:

    +--------------+-----------------+---------+----------------+
    | 4B: sentinel | 8B: payload len | payload | 8B: start  ptr |
    +--------------+-----------------+---------+----------------+

    The trailing pointer holds the stream position at which the NEXT record
    begins; after corruption it is the anchor that lets a scanner resume at
    a known-good boundary.
*/

/// Leading sentinel of every framed record ("jrnl")
pub const RECORD_SENTINEL: u32 = 0x6a72_6e6c;
/// Upper bound on a single event's payload; anything larger is corruption
pub const MAX_RECORD_PAYLOAD: u64 = 1 << 26;

/// Codec for the resilient record stream. This is the only stream format
/// the journal supports.
pub struct JournalStream;

impl JournalStream {
    /// sentinel + payload length
    pub const PREAMBLE_SIZE: usize = sizeof!(u32) + sizeof!(u64);
    /// trailing start pointer
    pub const POSTAMBLE_SIZE: usize = sizeof!(u64);
    /// total framing bytes around a payload
    pub const OVERHEAD: usize = Self::PREAMBLE_SIZE + Self::POSTAMBLE_SIZE;

    /// Total framed size of a payload of `len` bytes
    pub const fn framed_len(len: usize) -> usize {
        Self::OVERHEAD + len
    }

    /// Append one framed record to `out`. `spos` is the stream position at
    /// which this record will be placed; the trailing pointer is derived
    /// from it. Returns the number of bytes appended.
    pub fn write(payload: &[u8], out: &mut Vec<u8>, spos: u64) -> u64 {
        out.extend(RECORD_SENTINEL.to_le_bytes());
        out.extend((payload.len() as u64).to_le_bytes());
        out.extend(payload);
        out.extend((spos + Self::framed_len(payload.len()) as u64).to_le_bytes());
        Self::framed_len(payload.len()) as u64
    }

    /// Whether `buf` begins with one complete record. When it does not,
    /// `need` is set to the additional bytes required to decide; truncation
    /// is never an error. A sentinel mismatch or an implausible length is.
    pub fn readable(buf: &[u8], need: &mut u64) -> RuntimeResult<bool> {
        *need = 0;
        if buf.len() < Self::PREAMBLE_SIZE {
            *need = (Self::PREAMBLE_SIZE - buf.len()) as u64;
            return Ok(false);
        }
        let sentinel = u32::from_le_bytes(buf[..sizeof!(u32)].try_into().unwrap());
        if sentinel != RECORD_SENTINEL {
            return Err(FramingError::BadPreamble.into());
        }
        let payload_len =
            u64::from_le_bytes(buf[sizeof!(u32)..Self::PREAMBLE_SIZE].try_into().unwrap());
        if payload_len > MAX_RECORD_PAYLOAD {
            return Err(FramingError::BadLength.into());
        }
        let full = Self::framed_len(payload_len as usize);
        if buf.len() < full {
            *need = (full - buf.len()) as u64;
            return Ok(false);
        }
        Ok(true)
    }

    /// Read one record off the front of `buf`, which must have passed
    /// [`Self::readable`]. Yields the payload and the trailing start
    /// pointer, and returns the number of bytes consumed.
    pub fn read(
        buf: &[u8],
        payload_out: &mut Vec<u8>,
        start_ptr_out: &mut u64,
    ) -> RuntimeResult<u64> {
        let mut need = 0;
        if !Self::readable(buf, &mut need)? {
            return Err(FramingError::BadLength.into());
        }
        let payload_len = u64::from_le_bytes(
            buf[sizeof!(u32)..Self::PREAMBLE_SIZE].try_into().unwrap(),
        ) as usize;
        payload_out.clear();
        payload_out.extend(&buf[Self::PREAMBLE_SIZE..Self::PREAMBLE_SIZE + payload_len]);
        let trailer_at = Self::PREAMBLE_SIZE + payload_len;
        *start_ptr_out = u64::from_le_bytes(
            buf[trailer_at..trailer_at + Self::POSTAMBLE_SIZE]
                .try_into()
                .unwrap(),
        );
        Ok(Self::framed_len(payload_len) as u64)
    }
}
