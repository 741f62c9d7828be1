/*
 * Created on Wed Apr 02 2025
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
        event::{EventKind, LogEvent},
        metablob::Metablob,
    },
    mds::types::{DirFrag, Frag, InodeNo},
};

/// Parse a u64 that may be given in hex with a `0x` prefix
pub fn parse_u64(s: &str) -> RuntimeResult<u64> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| Error::Argument(format!("expected an integer, got '{s}'")))
}

#[derive(Debug, Default)]
/// Event selectors. All configured selectors must match (AND composition).
pub struct JournalFilter {
    range: Option<(u64, u64)>,
    path: Option<String>,
    inode: Option<InodeNo>,
    kind: Option<EventKind>,
    frag: Option<DirFrag>,
    dname: Option<String>,
    client: Option<u64>,
}

impl JournalFilter {
    /// Feed one `--key value` pair. Returns false when the key is not a
    /// selector, so the caller can try its own options.
    pub fn parse_option(&mut self, key: &str, value: &str) -> RuntimeResult<bool> {
        match key {
            "range" => {
                let (start, end) = value
                    .split_once("..")
                    .ok_or_else(|| Error::Argument(format!("invalid range '{value}'")))?;
                let start = parse_u64(start)?;
                let end = parse_u64(end)?;
                if start >= end {
                    return Err(Error::Argument(format!("empty range '{value}'")));
                }
                self.range = Some((start, end));
            }
            "path" => self.path = Some(value.to_owned()),
            "inode" => self.inode = Some(InodeNo(parse_u64(value)?)),
            "type" => {
                self.kind = Some(EventKind::parse(value).ok_or_else(|| {
                    Error::Argument(format!("unknown event type '{value}'"))
                })?)
            }
            "frag" => {
                let (ino, frag) = value
                    .split_once('.')
                    .ok_or_else(|| Error::Argument(format!("invalid frag '{value}'")))?;
                let ino = InodeNo(parse_u64(ino)?);
                let frag = Frag(
                    u32::from_str_radix(frag, 16)
                        .map_err(|_| Error::Argument(format!("invalid frag '{value}'")))?,
                );
                self.frag = Some(DirFrag::new(ino, frag));
            }
            "dname" => self.dname = Some(value.to_owned()),
            "client" => self.client = Some(parse_u64(value)?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn get_range(&self) -> Option<(u64, u64)> {
        self.range
    }

    pub fn apply(&self, offset: u64, ev: &LogEvent) -> bool {
        if let Some((start, end)) = self.range {
            if offset < start || offset >= end {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if ev.kind() != kind {
                return false;
            }
        }
        if let Some(client) = self.client {
            if ev.client_id() != Some(client) {
                return false;
            }
        }
        if let Some(ino) = self.inode {
            if !Self::touches_inode(ev, ino) {
                return false;
            }
        }
        if let Some(substr) = &self.path {
            let matched = ev
                .metablob()
                .map(|mb| Self::any_dentry(mb, |dn| dn.contains(substr.as_str())))
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }
        if let Some(frag) = self.frag {
            let Some(mb) = ev.metablob() else {
                return false;
            };
            let Some(lump) = mb.lump_map.get(&frag) else {
                return false;
            };
            if let Some(dname) = &self.dname {
                let named = lump
                    .decode_bits()
                    .map(|bits| {
                        bits.dfull.iter().any(|b| b.dn == *dname)
                            || bits.dremote.iter().any(|b| b.dn == *dname)
                            || bits.dnull.iter().any(|b| b.dn == *dname)
                    })
                    .unwrap_or(false);
                if !named {
                    return false;
                }
            }
        }
        true
    }

    fn touches_inode(ev: &LogEvent, ino: InodeNo) -> bool {
        if let LogEvent::Open(open) = ev {
            if open.inos.contains(&ino) {
                return true;
            }
        }
        let Some(mb) = ev.metablob() else {
            return false;
        };
        if mb.roots.iter().any(|fb| fb.inode.ino == ino) {
            return true;
        }
        if mb.destroyed_inodes.contains(&ino) {
            return true;
        }
        mb.dirlumps().any(|(df, lump)| {
            if df.ino == ino {
                return true;
            }
            lump.decode_bits()
                .map(|bits| {
                    bits.dfull.iter().any(|b| b.inode.ino == ino)
                        || bits.dremote.iter().any(|b| b.ino == ino)
                })
                .unwrap_or(false)
        })
    }

    fn any_dentry(mb: &Metablob, pred: impl Fn(&str) -> bool) -> bool {
        if mb.roots.iter().any(|fb| pred(&fb.dn)) {
            return true;
        }
        mb.dirlumps().any(|(_, lump)| {
            lump.decode_bits()
                .map(|bits| {
                    bits.dfull.iter().any(|b| pred(&b.dn))
                        || bits.dremote.iter().any(|b| pred(&b.dn))
                        || bits.dnull.iter().any(|b| pred(&b.dn))
                })
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::JournalFilter;
    use crate::{
        journal::{
            event::{ESession, EUpdate, LogEvent},
            metablob::{Dirlump, Fullbit, Metablob},
        },
        mds::{
            fnode::Fnode,
            inode::Inode,
            types::{DirFrag, Frag, InodeNo},
        },
    };

    fn update_touching(dn: &str, ino: u64) -> LogEvent {
        let mut mb = Metablob::new();
        let mut lump = Dirlump::new(Fnode::with_version(1));
        lump.push_full(&Fullbit::new(
            dn,
            Inode {
                ino: InodeNo(ino),
                version: 1,
                ..Inode::default()
            },
        ));
        mb.add_lump(DirFrag::new(InodeNo(0x1), Frag::ROOT), lump);
        LogEvent::Update(EUpdate {
            op: "openc".to_owned(),
            client_id: 77,
            metablob: mb,
        })
    }

    #[test]
    fn selectors_compose_with_and() {
        let ev = update_touching("report.txt", 0x2000);
        let mut f = JournalFilter::default();
        assert!(f.parse_option("type", "UPDATE").unwrap());
        assert!(f.parse_option("path", "report").unwrap());
        assert!(f.apply(0, &ev));
        // adding a non-matching selector kills the match
        assert!(f.parse_option("client", "99").unwrap());
        assert!(!f.apply(0, &ev));
    }

    #[test]
    fn inode_and_frag_selectors() {
        let ev = update_touching("a", 0x2000);
        let mut by_ino = JournalFilter::default();
        by_ino.parse_option("inode", "0x2000").unwrap();
        assert!(by_ino.apply(0, &ev));
        by_ino = JournalFilter::default();
        by_ino.parse_option("inode", "0x9999").unwrap();
        assert!(!by_ino.apply(0, &ev));

        let mut by_frag = JournalFilter::default();
        by_frag.parse_option("frag", "1.0").unwrap();
        by_frag.parse_option("dname", "a").unwrap();
        assert!(by_frag.apply(0, &ev));
        by_frag.parse_option("dname", "b").unwrap();
        assert!(!by_frag.apply(0, &ev));
    }

    #[test]
    fn range_and_unfilterable_events() {
        let session = LogEvent::Session(ESession {
            client_id: 1,
            open: true,
        });
        let mut f = JournalFilter::default();
        f.parse_option("range", "100..200").unwrap();
        assert!(f.apply(150, &session));
        assert!(!f.apply(200, &session));
        // a path selector can never match an event without a metablob
        let mut f = JournalFilter::default();
        f.parse_option("path", "x").unwrap();
        assert!(!f.apply(0, &session));
    }

    #[test]
    fn unknown_keys_are_left_for_the_caller() {
        let mut f = JournalFilter::default();
        assert!(!f.parse_option("dry_run", "true").unwrap());
        assert!(f.parse_option("type", "nonsense").is_err());
    }
}
