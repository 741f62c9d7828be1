/*
 * Created on Mon Mar 31 2025
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

use {
    crate::{
        encoding::{dec, enc},
        error::{DecodeError, RuntimeResult},
        journal::metablob::Metablob,
        mds::types::InodeNo,
        mem::BufferedScanner,
    },
    serde_json::json,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
/// Every kind of record the metadata service writes to its journal
pub enum EventKind {
    NoOp = 0,
    ResetJournal = 1,
    Session = 10,
    Update = 20,
    Open = 21,
}

impl EventKind {
    pub const fn tag(&self) -> u32 {
        *self as u32
    }
    pub fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            0 => Self::NoOp,
            1 => Self::ResetJournal,
            10 => Self::Session,
            20 => Self::Update,
            21 => Self::Open,
            _ => return None,
        })
    }
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NoOp => "NOOP",
            Self::ResetJournal => "RESETJOURNAL",
            Self::Session => "SESSION",
            Self::Update => "UPDATE",
            Self::Open => "OPEN",
        }
    }
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "NOOP" => Self::NoOp,
            "RESETJOURNAL" => Self::ResetJournal,
            "SESSION" => Self::Session,
            "UPDATE" => Self::Update,
            "OPEN" => Self::Open,
            _ => return None,
        })
    }
}

#[derive(Debug, PartialEq)]
/// A metadata mutation: the operation name plus the metablob it wrote
pub struct EUpdate {
    pub op: String,
    pub client_id: u64,
    pub metablob: Metablob,
}

#[derive(Debug, PartialEq)]
/// Inodes pinned open by clients, logged so a restarting server can
/// rebuild its open-file table
pub struct EOpen {
    pub inos: Vec<InodeNo>,
    pub metablob: Metablob,
}

#[derive(Debug, PartialEq)]
pub struct ESession {
    pub client_id: u64,
    pub open: bool,
}

#[derive(Debug, PartialEq)]
pub struct ENoOp {
    pub pad_size: u32,
}

#[derive(Debug, PartialEq)]
pub struct EResetJournal;

#[derive(Debug, PartialEq)]
pub enum LogEvent {
    Update(EUpdate),
    Open(EOpen),
    Session(ESession),
    NoOp(ENoOp),
    ResetJournal(EResetJournal),
}

impl LogEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Update(_) => EventKind::Update,
            Self::Open(_) => EventKind::Open,
            Self::Session(_) => EventKind::Session,
            Self::NoOp(_) => EventKind::NoOp,
            Self::ResetJournal(_) => EventKind::ResetJournal,
        }
    }
    pub fn metablob(&self) -> Option<&Metablob> {
        match self {
            Self::Update(e) => Some(&e.metablob),
            Self::Open(e) => Some(&e.metablob),
            Self::Session(_) | Self::NoOp(_) | Self::ResetJournal(_) => None,
        }
    }
    /// The client a record belongs to, where that makes sense
    pub fn client_id(&self) -> Option<u64> {
        match self {
            Self::Update(e) => Some(e.client_id),
            Self::Session(e) => Some(e.client_id),
            _ => None,
        }
    }
    /// A no-op whose encoded size is exactly `pad_size` bytes more than an
    /// empty one; the eraser relies on this being exact
    pub fn noop_with_padding(pad_size: u32) -> Self {
        Self::NoOp(ENoOp { pad_size })
    }

    /// Serialize as stored in the journal: the type tag, then the payload
    pub fn encode_with_header(&self, buf: &mut Vec<u8>) {
        enc::u32_le(buf, self.kind().tag());
        enc::envelope(buf, 1, 1, |buf| match self {
            Self::Update(e) => {
                enc::string(buf, &e.op);
                enc::u64_le(buf, e.client_id);
                e.metablob.encode(buf);
            }
            Self::Open(e) => {
                enc::u32_le(buf, e.inos.len() as u32);
                for ino in &e.inos {
                    enc::u64_le(buf, ino.0);
                }
                e.metablob.encode(buf);
            }
            Self::Session(e) => {
                enc::u64_le(buf, e.client_id);
                enc::u8(buf, e.open as u8);
            }
            Self::NoOp(e) => {
                enc::u32_le(buf, e.pad_size);
                buf.extend(std::iter::repeat(0u8).take(e.pad_size as usize));
            }
            Self::ResetJournal(_) => {}
        })
    }

    pub fn decode(buf: &[u8]) -> RuntimeResult<Self> {
        let s = &mut BufferedScanner::new(buf);
        let tag = s.try_next_u32_le()?;
        let kind = EventKind::from_tag(tag).ok_or(DecodeError::UnknownEventType(tag))?;
        let env = dec::envelope(s, 1)?;
        let ev = match kind {
            EventKind::Update => {
                let op = dec::string(s)?;
                let client_id = s.try_next_u64_le()?;
                let metablob = Metablob::decode(s)?;
                Self::Update(EUpdate {
                    op,
                    client_id,
                    metablob,
                })
            }
            EventKind::Open => {
                let count = s.try_next_u32_le()?;
                let mut inos = Vec::with_capacity(count.min(4096) as usize);
                for _ in 0..count {
                    inos.push(InodeNo(s.try_next_u64_le()?));
                }
                let metablob = Metablob::decode(s)?;
                Self::Open(EOpen { inos, metablob })
            }
            EventKind::Session => {
                let client_id = s.try_next_u64_le()?;
                let open = s.try_next_byte()? != 0;
                Self::Session(ESession { client_id, open })
            }
            EventKind::NoOp => {
                let pad_size = s.try_next_u32_le()?;
                s.try_next_variable_block(pad_size as usize)?;
                Self::NoOp(ENoOp { pad_size })
            }
            EventKind::ResetJournal => Self::ResetJournal(EResetJournal),
        };
        env.finish(s)?;
        Ok(ev)
    }

    /// One-line description used by listings
    pub fn brief(&self) -> String {
        match self {
            Self::Update(e) => {
                let names: Vec<&str> = e
                    .metablob
                    .dirlumps()
                    .filter_map(|(_, lump)| lump.decode_bits().ok())
                    .flat_map(|bits| bits.dfull.iter().map(|fb| fb.dn.as_str()))
                    .collect();
                format!("({}) [{}]", e.op, names.join(", "))
            }
            Self::Open(e) => format!("({} open inos)", e.inos.len()),
            Self::Session(e) => format!(
                "(client {} {})",
                e.client_id,
                if e.open { "open" } else { "close" }
            ),
            Self::NoOp(e) => format!("(pad {})", e.pad_size),
            Self::ResetJournal(_) => String::from("(journal reset)"),
        }
    }

    pub fn dump(&self) -> serde_json::Value {
        let body = match self {
            Self::Update(e) => json!({
                "op": e.op,
                "client_id": e.client_id,
                "metablob": e.metablob.dump(),
            }),
            Self::Open(e) => json!({
                "inos": e.inos.iter().map(|i| i.0).collect::<Vec<_>>(),
                "metablob": e.metablob.dump(),
            }),
            Self::Session(e) => json!({ "client_id": e.client_id, "open": e.open }),
            Self::NoOp(e) => json!({ "pad_size": e.pad_size }),
            Self::ResetJournal(_) => json!({}),
        };
        json!({ "type": self.kind().name(), "event": body })
    }
}

#[cfg(test)]
mod tests {
    use super::{ENoOp, ESession, EUpdate, EventKind, LogEvent};
    use crate::{error::{DecodeError, Error}, journal::metablob::Metablob};

    #[test]
    fn event_roundtrip() {
        let events = [
            LogEvent::Session(ESession {
                client_id: 4216,
                open: true,
            }),
            LogEvent::NoOp(ENoOp { pad_size: 11 }),
            LogEvent::Update(EUpdate {
                op: "mkdir".to_owned(),
                client_id: 9,
                metablob: Metablob::new(),
            }),
            LogEvent::ResetJournal(super::EResetJournal),
        ];
        for ev in events {
            let mut buf = vec![];
            ev.encode_with_header(&mut buf);
            assert_eq!(LogEvent::decode(&buf).unwrap(), ev);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut buf = vec![];
        LogEvent::Session(ESession {
            client_id: 1,
            open: false,
        })
        .encode_with_header(&mut buf);
        buf[0..4].copy_from_slice(&999u32.to_le_bytes());
        assert_eq!(
            LogEvent::decode(&buf).unwrap_err(),
            Error::Decode(DecodeError::UnknownEventType(999))
        );
    }

    #[test]
    fn noop_padding_is_exact() {
        let mut empty = vec![];
        LogEvent::noop_with_padding(0).encode_with_header(&mut empty);
        for pad in [1u32, 17, 4096] {
            let mut buf = vec![];
            LogEvent::noop_with_padding(pad).encode_with_header(&mut buf);
            assert_eq!(buf.len(), empty.len() + pad as usize);
        }
    }

    #[test]
    fn kind_names_parse_back() {
        for kind in [
            EventKind::NoOp,
            EventKind::ResetJournal,
            EventKind::Session,
            EventKind::Update,
            EventKind::Open,
        ] {
            assert_eq!(EventKind::parse(kind.name()), Some(kind));
            assert_eq!(EventKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(EventKind::parse("update"), Some(EventKind::Update));
        assert_eq!(EventKind::parse("bogus"), None);
    }
}
