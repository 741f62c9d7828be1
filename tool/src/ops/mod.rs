/*
 * Created on Tue Apr 29 2025
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

//! Command execution: each `main_*` function is one CLI mode acting on an
//! already-opened pool.

pub mod apply;
pub mod dump;
pub mod erase;
pub mod output;
pub mod recover;
pub mod reset;

use {
    crate::{
        cli::{EventCmd, EventEffect, HeaderCmd, HeaderField, JournalCmd, OutputStyle},
        config::Config,
        error::{BackendError, Error, RuntimeResult},
        journal::scanner::{EventError, JournalScanner},
        ops::output::EventOutput,
        store::ObjectStore,
    },
    std::{collections::BTreeSet, io},
};

pub fn main_journal<S: ObjectStore>(
    store: &S,
    cfg: &Config,
    cmd: JournalCmd,
) -> RuntimeResult<()> {
    match cmd {
        JournalCmd::Inspect => {
            let mut js = JournalScanner::new(store, cfg.rank);
            js.scan(true)?;
            EventOutput::new(&js, "").summary(&mut io::stdout().lock())?;
            Ok(())
        }
        JournalCmd::Export(path) => dump::journal_export(store, cfg.rank, &path),
        JournalCmd::Import(path) => dump::journal_import(store, cfg.rank, &path),
        JournalCmd::Reset { force } => {
            reset::journal_reset(store, cfg.rank, cfg.object_size, force)
        }
    }
}

pub fn main_header<S: ObjectStore>(store: &S, cfg: &Config, cmd: HeaderCmd) -> RuntimeResult<()> {
    let mut js = JournalScanner::new(store, cfg.rank);
    js.scan(true)?;
    if !js.header_present {
        log::error!("header object not found");
        return Err(BackendError::NotFound.into());
    }
    let Some(header) = js.header.clone() else {
        // cannot read or do a single-field update without the original
        log::error!("header could not be read");
        return Err(BackendError::NotFound.into());
    };
    match cmd {
        HeaderCmd::Get => {
            let rendered = serde_json::to_string_pretty(&header.dump())
                .expect("header dump is a valid json value");
            println!("{rendered}");
            Ok(())
        }
        HeaderCmd::Set { field, value } => {
            let mut header = header;
            let slot = match field {
                HeaderField::TrimmedPos => &mut header.trimmed_pos,
                HeaderField::ExpirePos => &mut header.expire_pos,
                HeaderField::WritePos => &mut header.write_pos,
            };
            println!("Updating {} 0x{:x} -> 0x{:x}", field.name(), *slot, value);
            *slot = value;
            if !header.positions_ordered() {
                log::warn!(
                    "new positions are out of order (trimmed=0x{:x} expire=0x{:x} \
                     write=0x{:x}); writing anyway",
                    header.trimmed_pos,
                    header.expire_pos,
                    header.write_pos
                );
            }
            let mut header_bl = vec![];
            header.encode(&mut header_bl);
            store.write_full(&js.header_name(), &header_bl)?;
            println!("Successfully updated header.");
            Ok(())
        }
    }
}

pub fn main_event<S: ObjectStore>(store: &S, cfg: &Config, cmd: EventCmd) -> RuntimeResult<()> {
    let EventCmd {
        effect,
        filter,
        output,
        output_path,
        dry_run,
    } = cmd;
    let mut js = JournalScanner::with_filter(store, cfg.rank, filter);
    js.scan(true)?;

    match effect {
        EventEffect::Get => {}
        EventEffect::Apply => {
            for (offset, rec) in &js.events {
                let Some(mb) = rec.log_event.metablob() else {
                    continue;
                };
                if let Err(e) = apply::replay_offline(store, mb, dry_run) {
                    log::error!("error replaying event 0x{offset:x}: {e}, continuing...");
                }
            }
        }
        EventEffect::RecoverDentries => {
            let mut consumed_inos = BTreeSet::new();
            let mut scav_errors = vec![];
            for (offset, rec) in &js.events {
                let Some(mb) = rec.log_event.metablob() else {
                    continue;
                };
                match recover::scavenge_dentries(store, mb, dry_run, &mut consumed_inos) {
                    Ok(()) => {}
                    // a failed mutating call means the backing store
                    // itself is unhealthy
                    Err(e @ Error::Backend(BackendError::Errno(_))) => return Err(e),
                    Err(e) => {
                        log::error!("error processing event 0x{offset:x}: {e}, continuing...");
                        scav_errors.push((
                            *offset,
                            EventError {
                                code: e.errno(),
                                description: e.to_string(),
                            },
                        ));
                    }
                }
            }
            for (offset, err) in scav_errors {
                js.errors.entry(offset).or_insert(err);
            }
            log::info!("consumed {} inodes", consumed_inos.len());
            if !consumed_inos.is_empty() && !dry_run {
                if let Err(e) = recover::consume_inos(store, cfg.ranks, &consumed_inos) {
                    log::error!(
                        "error updating inode tables for {} consumed inos: {e}",
                        consumed_inos.len()
                    );
                    return Err(e);
                }
            }
        }
        EventEffect::Splice => {
            if let Some((start, end)) = js_range(&js) {
                erase::erase_region(&js, start, end - start)?;
            } else {
                let targets: Vec<(u64, u64)> = js
                    .events
                    .iter()
                    .map(|(offset, rec)| (*offset, rec.raw_size))
                    .collect();
                for (offset, raw_size) in targets {
                    log::debug!("erasing offset 0x{offset:x}");
                    erase::erase_region(&js, offset, raw_size)?;
                }
            }
        }
    }

    let path = output_path.as_deref().unwrap_or("dump");
    let out = EventOutput::new(&js, path);
    match output {
        OutputStyle::Summary => out.summary(&mut io::stdout().lock())?,
        OutputStyle::List => out.list(&mut io::stdout().lock())?,
        OutputStyle::Json => out.json()?,
        OutputStyle::Binary => out.binary()?,
    }
    Ok(())
}

// splicing a literal range is special-cased: the region need not line up
// with event boundaries
fn js_range<S: ObjectStore>(js: &JournalScanner<'_, S>) -> Option<(u64, u64)> {
    js.filter().get_range()
}
