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

//! Offline journal scanner
//!
//! Walks the journal's objects across the valid byte range, reframes the
//! record stream (carrying partial records across object boundaries) and
//! collects decoded events keyed by stream offset. Individual record
//! failures never abort a scan: they are recorded per offset and the
//! scanner hunts forward for the next record sentinel, falling back to the
//! next object boundary.

use {
    crate::{
        error::{Error, RuntimeResult},
        journal::{
            event::LogEvent,
            filter::JournalFilter,
            header::{JournalHeader, DEFAULT_OBJECT_SIZE},
            stream::{JournalStream, RECORD_SENTINEL},
        },
        mds::types::{log_object_name, Rank, MDLOG_INO_BASE, PURGE_INO_BASE},
        store::{ObjectStat, ObjectStore},
        util::interrupt,
    },
    bytes::{Buf, BytesMut},
    std::collections::BTreeMap,
};

#[derive(Debug)]
pub struct EventRecord {
    pub log_event: LogEvent,
    /// Framed size of the record as it sits in the journal
    pub raw_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventError {
    pub code: i32,
    pub description: String,
}

pub struct JournalScanner<'a, S> {
    store: &'a S,
    rank: Rank,
    filter: JournalFilter,
    log_ino: u64,
    pub header_present: bool,
    pub header_valid: bool,
    pub header: Option<JournalHeader>,
    /// Raw header bytes kept around when they would not decode, so a
    /// repair can still work with them
    pub header_raw: Vec<u8>,
    pub events: BTreeMap<u64, EventRecord>,
    pub errors: BTreeMap<u64, EventError>,
    /// End of the cleanly decoded contiguous prefix from `expire_pos`
    covered_end: u64,
}

impl<'a, S: ObjectStore> JournalScanner<'a, S> {
    pub fn new(store: &'a S, rank: Rank) -> Self {
        Self::with_filter(store, rank, JournalFilter::default())
    }
    pub fn with_filter(store: &'a S, rank: Rank, filter: JournalFilter) -> Self {
        Self {
            store,
            rank,
            filter,
            log_ino: MDLOG_INO_BASE + rank,
            header_present: false,
            header_valid: false,
            header: None,
            header_raw: vec![],
            events: BTreeMap::new(),
            errors: BTreeMap::new(),
            covered_end: 0,
        }
    }
    pub fn store(&self) -> &'a S {
        self.store
    }
    pub fn log_ino(&self) -> u64 {
        self.log_ino
    }
    pub fn filter(&self) -> &JournalFilter {
        &self.filter
    }
    pub fn obj_name(&self, index: u64) -> String {
        log_object_name(self.log_ino, index)
    }
    pub fn header_name(&self) -> String {
        self.obj_name(0)
    }
    pub fn object_size(&self) -> u64 {
        self.header
            .as_ref()
            .map(|h| h.layout.object_size)
            .unwrap_or(DEFAULT_OBJECT_SIZE)
    }
    pub fn stat_header(&self) -> Option<ObjectStat> {
        self.store.stat(&self.header_name()).ok()
    }
    /// True when the whole valid range decoded without a single error
    pub fn is_readable(&self) -> bool {
        okay!(
            self.header_present,
            self.header_valid,
            self.errors.is_empty(),
            self.header
                .as_ref()
                .map(|h| self.covered_end == h.write_pos)
                .unwrap_or(false),
        )
    }

    pub fn scan(&mut self, is_mdlog: bool) -> RuntimeResult<()> {
        self.log_ino = if is_mdlog {
            MDLOG_INO_BASE + self.rank
        } else {
            PURGE_INO_BASE + self.rank
        };
        self.scan_header()?;
        if self.header_valid {
            self.scan_events()?;
        }
        Ok(())
    }

    fn scan_header(&mut self) -> RuntimeResult<()> {
        let hdr_oid = self.header_name();
        let raw = match self.store.read(&hdr_oid, 1 << 22, 0) {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                log::warn!("journal header {hdr_oid} does not exist");
                self.header_present = false;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.header_present = true;
        match JournalHeader::decode(&raw) {
            Ok(h) => {
                if h.positions_ordered() {
                    self.header_valid = true;
                } else {
                    log::error!(
                        "journal header {hdr_oid} has out-of-order positions \
                         (trimmed=0x{:x} expire=0x{:x} write=0x{:x})",
                        h.trimmed_pos,
                        h.expire_pos,
                        h.write_pos
                    );
                }
                self.header = Some(h);
            }
            Err(e) => {
                log::error!("journal header {hdr_oid} is unreadable: {e}");
                self.header_raw = raw;
            }
        }
        Ok(())
    }

    fn scan_events(&mut self) -> RuntimeResult<()> {
        let header = self.header.clone().expect("valid header");
        let object_size = header.layout.object_size;
        self.covered_end = header.expire_pos;
        if header.write_pos <= header.expire_pos {
            return Ok(());
        }
        let start_obj = header.expire_pos / object_size;
        let end_obj = (header.write_pos - 1) / object_size;
        // absolute stream position of buffer[0]
        let mut read_offset = header.expire_pos;
        let mut buffer = BytesMut::new();
        for obj in start_obj..=end_obj {
            if interrupt::interrupted() {
                log::warn!("interrupted, stopping scan at object {obj} (partial results kept)");
                break;
            }
            let obj_start = obj * object_size;
            let mut fetch_pos = read_offset + buffer.len() as u64;
            if fetch_pos >= (obj + 1) * object_size {
                // a previous resync skipped past this whole object
                continue;
            }
            if fetch_pos < obj_start {
                // the previous object came up short: the stream has a hole
                self.record_error(
                    fetch_pos,
                    libc::EIO,
                    format!("journal object {} is short", self.obj_name(obj - 1)),
                );
                buffer.clear();
                read_offset = obj_start;
                fetch_pos = obj_start;
            }
            let oid = self.obj_name(obj);
            let data = match self.store.read(&oid, object_size, 0) {
                Ok(data) => data,
                Err(e) if e.is_not_found() => {
                    log::error!("journal object {oid} is missing");
                    self.record_error(
                        fetch_pos,
                        libc::ENOENT,
                        format!("missing journal object {oid}"),
                    );
                    buffer.clear();
                    read_offset = (obj + 1) * object_size;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let skip = (fetch_pos - obj_start) as usize;
            if skip < data.len() {
                buffer.extend_from_slice(&data[skip..]);
            }
            // never parse past the valid range
            if read_offset + buffer.len() as u64 > header.write_pos {
                let valid = (header.write_pos - read_offset) as usize;
                buffer.truncate(valid);
            }
            self.drain_buffer(&mut buffer, &mut read_offset);
        }
        if !buffer.is_empty() {
            log::debug!(
                "0x{:x} trailing bytes after the last parsable record",
                buffer.len()
            );
        }
        Ok(())
    }

    /// Decode as many framed records as the buffer currently holds
    fn drain_buffer(&mut self, buffer: &mut BytesMut, read_offset: &mut u64) {
        loop {
            let mut need = 0;
            let whole = match JournalStream::readable(buffer, &mut need) {
                Ok(whole) => whole,
                Err(e) => {
                    self.record_framing_error(*read_offset, e);
                    if Self::resync(buffer, read_offset) {
                        continue;
                    }
                    return;
                }
            };
            if !whole {
                log::trace!("0x{:x}: need 0x{:x} more bytes", read_offset, need);
                return;
            }
            let mut payload = vec![];
            let mut start_ptr = 0;
            let consumed = match JournalStream::read(buffer, &mut payload, &mut start_ptr) {
                Ok(consumed) => consumed,
                Err(e) => {
                    self.record_framing_error(*read_offset, e);
                    if Self::resync(buffer, read_offset) {
                        continue;
                    }
                    return;
                }
            };
            if start_ptr != *read_offset + consumed {
                self.record_framing_error(
                    *read_offset,
                    crate::error::FramingError::BadTrailer.into(),
                );
                if Self::resync(buffer, read_offset) {
                    continue;
                }
                return;
            }
            match LogEvent::decode(&payload) {
                Ok(ev) => {
                    log::debug!("0x{:x}: {} ({} bytes)", read_offset, ev.kind().name(), consumed);
                    if self.filter.apply(*read_offset, &ev) {
                        self.events.insert(
                            *read_offset,
                            EventRecord {
                                log_event: ev,
                                raw_size: consumed,
                            },
                        );
                    }
                    buffer.advance(consumed as usize);
                    *read_offset += consumed;
                    if self.errors.is_empty() {
                        self.covered_end = *read_offset;
                    }
                }
                Err(e) => {
                    log::error!("0x{:x}: undecodable event: {e}", read_offset);
                    self.record_error(*read_offset, e.errno(), e.to_string());
                    // the frame itself was sound, so the next record is
                    // right behind it
                    buffer.advance(consumed as usize);
                    *read_offset += consumed;
                }
            }
        }
    }

    fn record_framing_error(&mut self, offset: u64, e: Error) {
        log::error!("0x{offset:x}: {e}");
        self.record_error(offset, e.errno(), e.to_string());
    }

    fn record_error(&mut self, offset: u64, code: i32, description: String) {
        self.errors.entry(offset).or_insert(EventError { code, description });
    }

    /// Skip the bad byte, then hunt forward for the next record sentinel.
    /// Returns false when the rest of the buffer holds no candidate, in
    /// which case scanning resumes at the next object.
    fn resync(buffer: &mut BytesMut, read_offset: &mut u64) -> bool {
        let sentinel = RECORD_SENTINEL.to_le_bytes();
        let hay = &buffer[1..];
        let found = hay
            .windows(sentinel.len())
            .position(|w| w == sentinel.as_slice())
            .map(|p| p + 1);
        match found {
            Some(at) => {
                log::debug!("resynchronised after 0x{at:x} bytes");
                buffer.advance(at);
                *read_offset += at as u64;
                true
            }
            None => {
                *read_offset += buffer.len() as u64;
                buffer.clear();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::JournalScanner;
    use crate::{
        journal::{
            event::{ESession, EventKind, LogEvent},
            filter::JournalFilter,
            stream::JournalStream,
            test_utils::{write_journal, TEST_OBJECT_SIZE},
        },
        store::mem::MemStore,
    };

    fn session(client_id: u64) -> LogEvent {
        LogEvent::Session(ESession {
            client_id,
            open: true,
        })
    }

    #[test]
    fn clean_scan_across_objects() {
        let store = MemStore::new();
        // enough events to cross several object boundaries
        let events: Vec<_> = (0..40).map(session).collect();
        let placed = write_journal(&store, 0, TEST_OBJECT_SIZE, &events);
        let mut js = JournalScanner::new(&store, 0);
        js.scan(true).unwrap();
        assert!(js.header_present && js.header_valid);
        assert!(js.errors.is_empty());
        assert!(js.is_readable());
        assert_eq!(js.events.len(), events.len());
        for (i, (offset, framed)) in placed.iter().enumerate() {
            let rec = &js.events[offset];
            assert_eq!(rec.raw_size, *framed);
            assert_eq!(rec.log_event, session(i as u64));
        }
    }

    #[test]
    fn absent_header_is_not_an_error() {
        let store = MemStore::new();
        let mut js = JournalScanner::new(&store, 0);
        js.scan(true).unwrap();
        assert!(!js.header_present);
        assert!(!js.is_readable());
        assert!(js.events.is_empty());
    }

    #[test]
    fn corrupt_preamble_resyncs_on_next_sentinel() {
        let store = MemStore::new();
        let events: Vec<_> = (0..3).map(session).collect();
        let placed = write_journal(&store, 0, TEST_OBJECT_SIZE, &events);
        let (e1_off, _) = placed[1];
        // clobber the middle event's sentinel
        let oid = format!("{:x}.{:08x}", 0x200, e1_off / TEST_OBJECT_SIZE);
        use crate::store::ObjectStore;
        store
            .write(&oid, &[0xde, 0xad, 0xbe, 0xef], e1_off % TEST_OBJECT_SIZE)
            .unwrap();
        let mut js = JournalScanner::new(&store, 0);
        js.scan(true).unwrap();
        assert_eq!(js.errors.len(), 1);
        assert!(js.errors.contains_key(&e1_off));
        assert!(!js.is_readable());
        // the surrounding events still decode
        assert!(js.events.contains_key(&placed[0].0));
        assert!(js.events.contains_key(&placed[2].0));
        assert!(!js.events.contains_key(&e1_off));
    }

    #[test]
    fn undecodable_event_is_skipped_by_frame_bounds() {
        let store = MemStore::new();
        let events: Vec<_> = (0..3).map(session).collect();
        let placed = write_journal(&store, 0, TEST_OBJECT_SIZE, &events);
        let (e1_off, _) = placed[1];
        // rewrite the payload's type tag to something unknown, leaving the
        // frame intact
        let tag_at = e1_off + JournalStream::PREAMBLE_SIZE as u64;
        let oid = format!("{:x}.{:08x}", 0x200, tag_at / TEST_OBJECT_SIZE);
        use crate::store::ObjectStore;
        store
            .write(&oid, &999u32.to_le_bytes(), tag_at % TEST_OBJECT_SIZE)
            .unwrap();
        let mut js = JournalScanner::new(&store, 0);
        js.scan(true).unwrap();
        assert_eq!(js.errors.len(), 1);
        assert!(js.errors.contains_key(&e1_off));
        // every other event came through
        assert_eq!(js.events.len(), 2);
        assert!(js.events.contains_key(&placed[2].0));
    }

    #[test]
    fn filter_limits_recorded_events() {
        let store = MemStore::new();
        let events = vec![
            session(1),
            LogEvent::noop_with_padding(5),
            session(2),
        ];
        let placed = write_journal(&store, 0, TEST_OBJECT_SIZE, &events);
        let mut filter = JournalFilter::default();
        filter.parse_option("type", "NOOP").unwrap();
        let mut js = JournalScanner::with_filter(&store, 0, filter);
        js.scan(true).unwrap();
        assert_eq!(js.events.len(), 1);
        assert_eq!(
            js.events[&placed[1].0].log_event.kind(),
            EventKind::NoOp
        );
        // filtering out events does not make the journal unreadable
        assert!(js.is_readable());
    }

    #[test]
    fn secondary_journal_uses_its_own_ino_base() {
        let store = MemStore::new();
        let mut js = JournalScanner::new(&store, 2);
        js.scan(false).unwrap();
        assert_eq!(js.header_name(), "502.00000000");
        assert!(!js.header_present);
        js.scan(true).unwrap();
        assert_eq!(js.header_name(), "202.00000000");
    }
}
