/*
 * Created on Fri Apr 25 2025
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

//! Journal export/import
//!
//! The dump file is the deterministic transport for a journal: the encoded
//! header followed by the raw valid byte range. Importing writes both back
//! object by object, which also makes it the safe bulk-append path (append
//! framed events to a dump, bump its recorded length, import).

use {
    crate::{
        encoding::{dec, enc},
        error::{BackendError, DecodeError, RuntimeResult},
        journal::{header::JournalHeader, read_log_region, scanner::JournalScanner, write_log_region},
        mds::types::{log_object_name, Rank, MDLOG_INO_BASE},
        mem::BufferedScanner,
        store::ObjectStore,
    },
    std::fs,
};

pub const DUMP_MAGIC: &str = "reeffs journal dump v1";

/// Export the journal of `rank` to `path`. Requires a cleanly readable
/// journal; a damaged one must be salvaged object by object instead.
pub fn journal_export<S: ObjectStore>(store: &S, rank: Rank, path: &str) -> RuntimeResult<()> {
    let mut js = JournalScanner::new(store, rank);
    js.scan(true)?;
    if !js.header_present {
        log::error!("journal header not found, nothing to export");
        return Err(BackendError::NotFound.into());
    }
    if !js.is_readable() {
        log::error!("journal not readable; attempt an object-by-object dump instead");
        return Err(BackendError::Errno(libc::EIO).into());
    }
    let header = js.header.as_ref().expect("readable implies header");
    let start = header.expire_pos;
    let len = header.write_pos - header.expire_pos;
    let data = read_log_region(
        store,
        js.log_ino(),
        header.layout.object_size,
        start,
        len,
    )?;

    let mut out = vec![];
    enc::string(&mut out, DUMP_MAGIC);
    let mut header_bl = vec![];
    header.encode(&mut header_bl);
    enc::envelope(&mut out, 1, 1, |buf| {
        enc::blob(buf, &header_bl);
        enc::u64_le(buf, start);
        enc::u64_le(buf, len);
    });
    out.extend_from_slice(&data);
    fs::write(path, out)?;
    log::info!("journal is 0x{start:x}~0x{len:x}");
    log::info!("wrote {} bytes to {path}", len);
    Ok(())
}

/// Import a dump file into the journal objects of `rank`, overwriting the
/// header and the covered data range
pub fn journal_import<S: ObjectStore>(store: &S, rank: Rank, path: &str) -> RuntimeResult<()> {
    let raw = fs::read(path)?;
    let s = &mut BufferedScanner::new(&raw);
    let magic = dec::string(s)?;
    if magic != DUMP_MAGIC {
        return Err(DecodeError::BadMagic.into());
    }
    let env = dec::envelope(s, 1)?;
    let header_bl = dec::blob(s)?;
    let start = s.try_next_u64_le()?;
    let len = s.try_next_u64_le()?;
    env.finish(s)?;
    let data = s.try_next_variable_block(len as usize)?;
    let header = JournalHeader::decode(&header_bl)?;
    if header.expire_pos != start || header.write_pos != start + len {
        return Err(DecodeError::IllegalData.into());
    }

    let log_ino = MDLOG_INO_BASE + rank;
    store.write_full(&log_object_name(log_ino, 0), &header_bl)?;
    write_log_region(store, log_ino, header.layout.object_size, start, data)?;
    log::info!("imported journal 0x{start:x}~0x{len:x} for rank {rank}");
    Ok(())
}
