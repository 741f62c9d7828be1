/*
 * Created on Fri Apr 18 2025
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

use crate::{
    error::{Error, RuntimeResult},
    journal::{event::LogEvent, scanner::JournalScanner, stream::JournalStream, write_log_region},
    store::ObjectStore,
};

/// Overwrite `[pos, pos + length)` of the journal with a single framed
/// no-op of exactly `length` bytes, so forward scans skip the region
/// transparently. Erasing the same region twice produces identical bytes.
pub fn erase_region<S: ObjectStore>(
    js: &JournalScanner<'_, S>,
    pos: u64,
    length: u64,
) -> RuntimeResult<()> {
    // measure an empty no-op, then grow it to make up the difference
    let mut tmp = vec![];
    LogEvent::noop_with_padding(0).encode_with_header(&mut tmp);

    log::debug!("erase_region 0x{pos:x} len=0x{length:x}");
    let min_len = (tmp.len() + JournalStream::OVERHEAD) as u64;
    if length < min_len {
        return Err(Error::Precondition(format!(
            "erase region of 0x{length:x} bytes is too short (minimum 0x{min_len:x})"
        )));
    }
    let padding = length - min_len;
    if padding > u32::MAX as u64 {
        return Err(Error::Precondition(format!(
            "erase region of 0x{length:x} bytes exceeds the maximum no-op size"
        )));
    }
    log::debug!("erase_region padding=0x{padding:x}");

    let mut payload = vec![];
    LogEvent::noop_with_padding(padding as u32).encode_with_header(&mut payload);
    let mut log_data = vec![];
    JournalStream::write(&payload, &mut log_data, pos);
    assert_eq!(log_data.len() as u64, length);

    write_log_region(js.store(), js.log_ino(), js.object_size(), pos, &log_data)?;
    log::info!("erased 0x{length:x} bytes at 0x{pos:x}");
    Ok(())
}
