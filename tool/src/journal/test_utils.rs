/*
 * Created on Sun Apr 06 2025
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

//! Fixtures for journal tests: build a complete journal (header plus
//! framed events) inside an in-memory pool.

use crate::{
    journal::{
        event::LogEvent,
        header::{JournalHeader, JournalLayout},
        stream::JournalStream,
        write_log_region,
    },
    mds::types::{log_object_name, MDLOG_INO_BASE},
    store::{mem::MemStore, ObjectStore},
};

/// A small object size so multi-object layouts are cheap to exercise
pub const TEST_OBJECT_SIZE: u64 = 512;

/// Frame and persist `events` into `store` as rank `rank`'s metadata log,
/// returning each event's `(offset, framed_size)`
pub fn write_journal(
    store: &MemStore,
    rank: u64,
    object_size: u64,
    events: &[LogEvent],
) -> Vec<(u64, u64)> {
    let log_ino = MDLOG_INO_BASE + rank;
    let start = object_size;
    let mut stream = vec![];
    let mut placed = vec![];
    for ev in events {
        let mut payload = vec![];
        ev.encode_with_header(&mut payload);
        let at = start + stream.len() as u64;
        let framed = JournalStream::write(&payload, &mut stream, at);
        placed.push((at, framed));
    }
    write_log_region(store, log_ino, object_size, start, &stream).unwrap();
    let mut header = JournalHeader::fresh(JournalLayout { object_size });
    header.write_pos = start + stream.len() as u64;
    let mut header_bl = vec![];
    header.encode(&mut header_bl);
    store
        .write_full(&log_object_name(log_ino, 0), &header_bl)
        .unwrap();
    placed
}
