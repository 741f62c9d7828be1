/*
 * Created on Sun Mar 09 2025
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

//! On-disk encoding primitives
//!
//! Everything the metadata service persists uses these primitives: integers
//! are little-endian, strings and blobs carry a u32 length prefix, and
//! structured types are wrapped in a versioned envelope of
//! `struct_v(u8) · compat(u8) · len(u32)`. A decoder may read a structure
//! whose `struct_v` is newer than it knows as long as `compat` is not,
//! skipping the trailing bytes it does not understand.

use {
    crate::{
        error::{DecodeError, RuntimeResult},
        mem::BufferedScanner,
    },
    std::collections::BTreeMap,
};

pub type VecU8 = Vec<u8>;

/*
    enc
*/

pub mod enc {
    use super::{BTreeMap, VecU8};

    pub fn u8(buf: &mut VecU8, v: u8) {
        buf.push(v)
    }
    pub fn u32_le(buf: &mut VecU8, v: u32) {
        buf.extend(v.to_le_bytes())
    }
    pub fn u64_le(buf: &mut VecU8, v: u64) {
        buf.extend(v.to_le_bytes())
    }
    pub fn blob(buf: &mut VecU8, b: &[u8]) {
        u32_le(buf, b.len() as u32);
        buf.extend(b);
    }
    pub fn string(buf: &mut VecU8, s: &str) {
        blob(buf, s.as_bytes())
    }
    pub fn map(buf: &mut VecU8, m: &BTreeMap<String, VecU8>) {
        u32_le(buf, m.len() as u32);
        for (k, v) in m {
            string(buf, k);
            blob(buf, v);
        }
    }
    /// Write a versioned envelope around whatever `body` produces. The
    /// length field is patched in after the body has been encoded.
    pub fn envelope(buf: &mut VecU8, struct_v: u8, compat: u8, body: impl FnOnce(&mut VecU8)) {
        u8(buf, struct_v);
        u8(buf, compat);
        let len_at = buf.len();
        u32_le(buf, 0);
        let start = buf.len();
        body(buf);
        let len = (buf.len() - start) as u32;
        buf[len_at..len_at + sizeof!(u32)].copy_from_slice(&len.to_le_bytes());
    }
}

/*
    dec
*/

pub mod dec {
    use super::{BTreeMap, BufferedScanner, DecodeError, RuntimeResult, VecU8};

    pub fn blob(s: &mut BufferedScanner) -> RuntimeResult<VecU8> {
        let len = s.try_next_u32_le()? as usize;
        Ok(s.try_next_variable_block(len)?.to_vec())
    }
    pub fn string(s: &mut BufferedScanner) -> RuntimeResult<String> {
        let len = s.try_next_u32_le()? as usize;
        String::from_utf8(s.try_next_variable_block(len)?.to_vec())
            .map_err(|_| DecodeError::IllegalData.into())
    }
    pub fn map(s: &mut BufferedScanner) -> RuntimeResult<BTreeMap<String, VecU8>> {
        let count = s.try_next_u32_le()?;
        let mut m = BTreeMap::new();
        for _ in 0..count {
            let k = string(s)?;
            let v = blob(s)?;
            m.insert(k, v);
        }
        Ok(m)
    }

    #[derive(Debug)]
    /// An opened versioned envelope. Call [`Envelope::finish`] once the
    /// known fields have been read so that any trailing bytes written by a
    /// newer revision are skipped.
    pub struct Envelope {
        pub struct_v: u8,
        end: usize,
    }

    pub fn envelope(s: &mut BufferedScanner, max_supported: u8) -> RuntimeResult<Envelope> {
        let struct_v = s.try_next_byte()?;
        let compat = s.try_next_byte()?;
        let len = s.try_next_u32_le()? as usize;
        if compat > max_supported {
            return Err(DecodeError::UnsupportedVersion {
                found: compat,
                max: max_supported,
            }
            .into());
        }
        if !s.has_left(len) {
            return Err(DecodeError::ShortPayload.into());
        }
        Ok(Envelope {
            struct_v,
            end: s.cursor() + len,
        })
    }

    impl Envelope {
        pub fn finish(self, s: &mut BufferedScanner) -> RuntimeResult<()> {
            if s.cursor() > self.end {
                // we read past the declared length, so the declared length
                // was a lie
                return Err(DecodeError::IllegalData.into());
            }
            s.seek_to(self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{dec, enc},
        crate::mem::BufferedScanner,
    };

    #[test]
    fn envelope_skips_unknown_trailing_fields() {
        let mut buf = vec![];
        enc::envelope(&mut buf, 2, 1, |buf| {
            enc::u64_le(buf, 42);
            // a field added in v2 that a v1 decoder doesn't know about
            enc::string(buf, "future");
        });
        enc::u32_le(&mut buf, 0xABCD);
        let mut s = BufferedScanner::new(&buf);
        let env = dec::envelope(&mut s, 1).unwrap();
        assert_eq!(env.struct_v, 2);
        assert_eq!(s.try_next_u64_le().unwrap(), 42);
        env.finish(&mut s).unwrap();
        // decoding continues cleanly after the envelope
        assert_eq!(s.try_next_u32_le().unwrap(), 0xABCD);
    }

    #[test]
    fn envelope_rejects_incompatible_revision() {
        let mut buf = vec![];
        enc::envelope(&mut buf, 3, 3, |buf| enc::u64_le(buf, 1));
        let mut s = BufferedScanner::new(&buf);
        assert!(dec::envelope(&mut s, 1).is_err());
    }

    #[test]
    fn string_and_map_roundtrip() {
        let mut m = std::collections::BTreeMap::new();
        m.insert("user.note".to_owned(), b"hello".to_vec());
        m.insert("security.caps".to_owned(), vec![0, 1, 2]);
        let mut buf = vec![];
        enc::map(&mut buf, &m);
        let mut s = BufferedScanner::new(&buf);
        assert_eq!(dec::map(&mut s).unwrap(), m);
        assert!(s.eof());
    }
}
