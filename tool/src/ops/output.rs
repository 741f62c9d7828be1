/*
 * Created on Wed Apr 23 2025
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

//! Sinks for scanned events: human-readable summary and listing, a JSON
//! dump, and per-event binary files.

use {
    crate::{
        error::RuntimeResult,
        journal::{scanner::JournalScanner, stream::JournalStream},
        store::ObjectStore,
    },
    chrono::{DateTime, Utc},
    std::{
        collections::BTreeMap,
        fs,
        io::{self, Write},
        path::Path,
    },
};

pub struct EventOutput<'a, 'b, S> {
    js: &'a JournalScanner<'b, S>,
    path: &'a str,
}

impl<'a, 'b, S: ObjectStore> EventOutput<'a, 'b, S> {
    pub fn new(js: &'a JournalScanner<'b, S>, path: &'a str) -> Self {
        Self { js, path }
    }

    /// Condition report: header state, covered range, per-kind counts and
    /// the error list
    pub fn summary(&self, out: &mut impl Write) -> io::Result<()> {
        let js = self.js;
        writeln!(out, "Overall journal integrity: {}", if js.is_readable() { "OK" } else { "DAMAGED" })?;
        if !js.header_present {
            writeln!(out, "Header not found")?;
            return Ok(());
        }
        if let Some(stat) = js.stat_header() {
            let mtime = DateTime::<Utc>::from_timestamp(stat.mtime as i64, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| String::from("-"));
            writeln!(out, "Header object: {} bytes, modified {}", stat.size, mtime)?;
        }
        match &js.header {
            Some(h) => {
                writeln!(
                    out,
                    "Header: valid={}, range 0x{:x}..0x{:x} (trimmed 0x{:x})",
                    js.header_valid, h.expire_pos, h.write_pos, h.trimmed_pos
                )?;
            }
            None => writeln!(
                out,
                "Header: unreadable ({} raw bytes kept)",
                js.header_raw.len()
            )?,
        }
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for rec in js.events.values() {
            *counts.entry(rec.log_event.kind().name()).or_insert(0) += 1;
        }
        writeln!(out, "Events by type:")?;
        for (name, n) in counts {
            writeln!(out, "  {name}: {n}")?;
        }
        writeln!(out, "Errors: {}", js.errors.len())?;
        for (offset, err) in &js.errors {
            writeln!(out, "  0x{:x}: ({}) {}", offset, err.code, err.description)?;
        }
        Ok(())
    }

    /// One line per event
    pub fn list(&self, out: &mut impl Write) -> io::Result<()> {
        for (offset, rec) in &self.js.events {
            writeln!(
                out,
                "0x{:x} {}: {}",
                offset,
                rec.log_event.kind().name(),
                rec.log_event.brief()
            )?;
        }
        Ok(())
    }

    /// Pretty-printed JSON dump of every event
    pub fn json(&self) -> RuntimeResult<()> {
        let events: Vec<_> = self
            .js
            .events
            .iter()
            .map(|(offset, rec)| {
                let mut v = rec.log_event.dump();
                v["offset"] = serde_json::json!(offset);
                v
            })
            .collect();
        let rendered = serde_json::to_string_pretty(&events)
            .expect("event dumps are valid json values");
        fs::write(self.path, rendered)?;
        log::info!("wrote output to {}", self.path);
        Ok(())
    }

    /// One file per event, holding the event's framed bytes
    pub fn binary(&self) -> RuntimeResult<()> {
        let dir = Path::new(self.path);
        if !dir.is_dir() {
            fs::create_dir_all(dir)?;
        }
        for (offset, rec) in &self.js.events {
            let mut payload = vec![];
            rec.log_event.encode_with_header(&mut payload);
            let mut framed = vec![];
            JournalStream::write(&payload, &mut framed, *offset);
            let fname = dir.join(format!(
                "0x{:x}_{}.bin",
                offset,
                rec.log_event.kind().name()
            ));
            fs::write(fname, framed)?;
        }
        log::info!("wrote output to {}", self.path);
        Ok(())
    }
}
