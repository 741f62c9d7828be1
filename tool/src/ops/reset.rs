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

use crate::{
    error::{Error, RuntimeResult},
    journal::{
        event::{EResetJournal, LogEvent},
        header::{JournalHeader, JournalLayout},
        scanner::JournalScanner,
        stream::JournalStream,
        write_log_region,
    },
    mds::types::Rank,
    store::ObjectStore,
};

/// Truncate the journal: abandon the old byte range, seed a fresh one past
/// it with a reset marker, and rewrite the header. A hard reset (`force`)
/// ignores whatever header state exists and starts over at one period.
pub fn journal_reset<S: ObjectStore>(
    store: &S,
    rank: Rank,
    fallback_object_size: u64,
    force: bool,
) -> RuntimeResult<()> {
    let mut js = JournalScanner::new(store, rank);
    js.scan(true)?;

    let (period, new_start) = match (&js.header, js.header_valid) {
        (Some(h), true) => {
            let period = h.period();
            let rounded = if h.write_pos % period == 0 {
                h.write_pos
            } else {
                (h.write_pos / period + 1) * period
            };
            (period, rounded.max(period))
        }
        _ if force => (fallback_object_size, fallback_object_size),
        _ => {
            return Err(Error::Precondition(String::from(
                "journal header missing or invalid; use --force to reset anyway",
            )))
        }
    };

    // seed the fresh range with a reset marker so a scanning server finds
    // a valid, empty log rather than stale bytes
    let mut payload = vec![];
    LogEvent::ResetJournal(EResetJournal).encode_with_header(&mut payload);
    let mut framed = vec![];
    let framed_len = JournalStream::write(&payload, &mut framed, new_start);
    write_log_region(store, js.log_ino(), period, new_start, &framed)?;

    let mut header = JournalHeader::fresh(JournalLayout {
        object_size: period,
    });
    header.trimmed_pos = new_start;
    header.expire_pos = new_start;
    header.write_pos = new_start + framed_len;
    let mut header_bl = vec![];
    header.encode(&mut header_bl);
    store.write_full(&js.header_name(), &header_bl)?;

    log::info!(
        "journal reset: new range 0x{:x}..0x{:x}{}",
        header.expire_pos,
        header.write_pos,
        if force { " (forced)" } else { "" }
    );
    Ok(())
}
