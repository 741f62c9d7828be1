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

use {
    crate::{
        encoding::{dec, enc},
        error::{DecodeError, RuntimeResult},
        mem::BufferedScanner,
    },
    serde_json::json,
};

pub const JOURNAL_MAGIC: &str = "reeffs journal v1";
/// The only stream format this tool understands
pub const STREAM_FORMAT_RESILIENT: u8 = 1;
/// Default object size, inherited from the file layout default (4 MiB)
pub const DEFAULT_OBJECT_SIZE: u64 = 1 << 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalLayout {
    pub object_size: u64,
}

impl Default for JournalLayout {
    fn default() -> Self {
        Self {
            object_size: DEFAULT_OBJECT_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The journal header, stored in object index 0 of the journal. The valid
/// byte range of the log is `[expire_pos, write_pos)` and
/// `trimmed_pos <= expire_pos <= write_pos` must hold.
pub struct JournalHeader {
    pub magic: String,
    pub trimmed_pos: u64,
    pub expire_pos: u64,
    pub write_pos: u64,
    pub stream_format: u8,
    pub layout: JournalLayout,
}

impl JournalHeader {
    /// A fresh header whose positions start one period in, past the header
    /// object itself
    pub fn fresh(layout: JournalLayout) -> Self {
        let start = layout.object_size;
        Self {
            magic: JOURNAL_MAGIC.to_owned(),
            trimmed_pos: start,
            expire_pos: start,
            write_pos: start,
            stream_format: STREAM_FORMAT_RESILIENT,
            layout,
        }
    }
    pub fn period(&self) -> u64 {
        self.layout.object_size
    }
    pub fn positions_ordered(&self) -> bool {
        okay!(
            self.trimmed_pos <= self.expire_pos,
            self.expire_pos <= self.write_pos,
        )
    }
    pub fn encode(&self, buf: &mut Vec<u8>) {
        enc::envelope(buf, 1, 1, |buf| {
            enc::string(buf, &self.magic);
            enc::u64_le(buf, self.trimmed_pos);
            enc::u64_le(buf, self.expire_pos);
            enc::u64_le(buf, self.write_pos);
            enc::u8(buf, self.stream_format);
            enc::envelope(buf, 1, 1, |buf| {
                enc::u64_le(buf, self.layout.object_size);
            });
        })
    }
    pub fn decode(buf: &[u8]) -> RuntimeResult<Self> {
        let s = &mut BufferedScanner::new(buf);
        let env = dec::envelope(s, 1)?;
        let magic = dec::string(s)?;
        if magic != JOURNAL_MAGIC {
            return Err(DecodeError::BadMagic.into());
        }
        let trimmed_pos = s.try_next_u64_le()?;
        let expire_pos = s.try_next_u64_le()?;
        let write_pos = s.try_next_u64_le()?;
        let stream_format = s.try_next_byte()?;
        if stream_format != STREAM_FORMAT_RESILIENT {
            return Err(DecodeError::IllegalData.into());
        }
        let layout_env = dec::envelope(s, 1)?;
        let object_size = s.try_next_u64_le()?;
        layout_env.finish(s)?;
        env.finish(s)?;
        if object_size == 0 {
            return Err(DecodeError::IllegalData.into());
        }
        Ok(Self {
            magic,
            trimmed_pos,
            expire_pos,
            write_pos,
            stream_format,
            layout: JournalLayout { object_size },
        })
    }
    pub fn dump(&self) -> serde_json::Value {
        json!({
            "magic": self.magic,
            "trimmed_pos": self.trimmed_pos,
            "expire_pos": self.expire_pos,
            "write_pos": self.write_pos,
            "stream_format": self.stream_format,
            "layout": { "object_size": self.layout.object_size },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{JournalHeader, JournalLayout, DEFAULT_OBJECT_SIZE};

    #[test]
    fn header_roundtrip() {
        let mut h = JournalHeader::fresh(JournalLayout::default());
        h.write_pos = DEFAULT_OBJECT_SIZE + 4242;
        let mut buf = vec![];
        h.encode(&mut buf);
        assert_eq!(JournalHeader::decode(&buf).unwrap(), h);
    }

    #[test]
    fn header_rejects_foreign_magic() {
        let mut h = JournalHeader::fresh(JournalLayout::default());
        h.magic = "not our journal".to_owned();
        let mut buf = vec![];
        h.encode(&mut buf);
        assert!(JournalHeader::decode(&buf).is_err());
    }

    #[test]
    fn fresh_header_starts_past_the_header_object() {
        let h = JournalHeader::fresh(JournalLayout { object_size: 512 });
        assert_eq!(h.expire_pos, 512);
        assert_eq!(h.write_pos, 512);
        assert!(h.positions_ordered());
    }
}
