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

//! The metadata journal: a linear byte stream of framed events sharded
//! across fixed-size objects, preceded by a header object that records the
//! valid byte range.

pub mod event;
pub mod filter;
pub mod header;
pub mod metablob;
pub mod scanner;
pub mod stream;
#[cfg(test)]
pub mod test_utils;

use crate::{error::RuntimeResult, mds::types::log_object_name, store::ObjectStore};

/// Write a run of bytes into the journal at stream position `pos`,
/// splitting it across the covered objects
pub fn write_log_region<S: ObjectStore>(
    store: &S,
    log_ino: u64,
    object_size: u64,
    pos: u64,
    data: &[u8],
) -> RuntimeResult<()> {
    let mut cursor = pos;
    let mut remaining = data;
    while !remaining.is_empty() {
        if crate::util::interrupt::interrupted() {
            log::warn!(
                "interrupted with 0x{:x} bytes left to write at 0x{cursor:x}",
                remaining.len()
            );
            return Ok(());
        }
        let oid = log_object_name(log_ino, cursor / object_size);
        let offset_in_obj = cursor % object_size;
        let write_len = remaining.len().min((object_size - offset_in_obj) as usize);
        store.write(&oid, &remaining[..write_len], offset_in_obj)?;
        log::debug!("wrote 0x{write_len:x} bytes to {oid}");
        remaining = &remaining[write_len..];
        cursor += write_len as u64;
    }
    Ok(())
}

/// Read `len` bytes of the journal starting at stream position `pos`
pub fn read_log_region<S: ObjectStore>(
    store: &S,
    log_ino: u64,
    object_size: u64,
    pos: u64,
    len: u64,
) -> RuntimeResult<Vec<u8>> {
    let mut out = Vec::with_capacity(len as usize);
    let mut cursor = pos;
    let end = pos + len;
    while cursor < end {
        let oid = log_object_name(log_ino, cursor / object_size);
        let offset_in_obj = cursor % object_size;
        let read_len = (end - cursor).min(object_size - offset_in_obj);
        let chunk = store.read(&oid, read_len, offset_in_obj)?;
        if chunk.len() as u64 != read_len {
            return Err(crate::error::BackendError::Errno(libc::EIO).into());
        }
        out.extend_from_slice(&chunk);
        cursor += read_len;
    }
    Ok(out)
}
