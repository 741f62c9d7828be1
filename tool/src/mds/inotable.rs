/*
 * Created on Fri Mar 21 2025
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
        mds::types::{InodeNo, Version},
        mem::BufferedScanner,
    },
    std::collections::BTreeMap,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// A set of u64s kept as disjoint, non-adjacent `[start, start+len)` ranges
pub struct IntervalSet {
    m: BTreeMap<u64, u64>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn num_intervals(&self) -> usize {
        self.m.len()
    }
    pub fn is_empty(&self) -> bool {
        self.m.is_empty()
    }
    /// The interval containing `x`, if any
    fn enclosing(&self, x: u64) -> Option<(u64, u64)> {
        self.m
            .range(..=x)
            .next_back()
            .filter(|(start, len)| x < *start + **len)
            .map(|(start, len)| (*start, *len))
    }
    pub fn contains(&self, x: u64) -> bool {
        self.enclosing(x).is_some()
    }
    /// Insert a range, merging with any neighbours it touches
    pub fn insert(&mut self, start: u64, len: u64) {
        if len == 0 {
            return;
        }
        let mut start = start;
        let mut end = start + len;
        // absorb the interval we begin inside of (or abut)
        if let Some((s, l)) = self
            .m
            .range(..=start)
            .next_back()
            .map(|(s, l)| (*s, *l))
            .filter(|(s, l)| start <= s + l)
        {
            start = s.min(start);
            end = end.max(s + l);
            self.m.remove(&s);
        }
        // absorb everything we now cover or abut on the right
        while let Some((s, l)) = self
            .m
            .range(start..)
            .next()
            .map(|(s, l)| (*s, *l))
            .filter(|(s, _)| *s <= end)
        {
            end = end.max(s + l);
            self.m.remove(&s);
        }
        self.m.insert(start, end - start);
    }
    /// Remove a single value. Returns false if it was not present.
    pub fn erase(&mut self, x: u64) -> bool {
        let Some((start, len)) = self.enclosing(x) else {
            return false;
        };
        self.m.remove(&start);
        if x > start {
            self.m.insert(start, x - start);
        }
        let end = start + len;
        if x + 1 < end {
            self.m.insert(x + 1, end - (x + 1));
        }
        true
    }
    pub fn encode(&self, buf: &mut Vec<u8>) {
        enc::u32_le(buf, self.m.len() as u32);
        for (start, len) in &self.m {
            enc::u64_le(buf, *start);
            enc::u64_le(buf, *len);
        }
    }
    pub fn decode(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        let count = s.try_next_u32_le()?;
        let mut m = BTreeMap::new();
        for _ in 0..count {
            let start = s.try_next_u64_le()?;
            let len = s.try_next_u64_le()?;
            if len == 0 {
                return Err(DecodeError::IllegalData.into());
            }
            m.insert(start, len);
        }
        Ok(Self { m })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// The per-rank table of free inode numbers. Persisted as
/// `version(u64) · envelope{free intervals}` in the `mds<rank>_inotable`
/// object.
pub struct InoTable {
    free: IntervalSet,
}

impl InoTable {
    pub fn new(free: IntervalSet) -> Self {
        Self { free }
    }
    pub fn free(&self) -> &IntervalSet {
        &self.free
    }
    /// Take an inode number out of the free set regardless of how it came
    /// to be used. Returns true if the table changed.
    pub fn force_consume(&mut self, ino: InodeNo) -> bool {
        self.free.erase(ino.0)
    }
    pub fn encode_state(&self, buf: &mut Vec<u8>) {
        enc::envelope(buf, 1, 1, |buf| self.free.encode(buf))
    }
    pub fn decode_state(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        let env = dec::envelope(s, 1)?;
        let free = IntervalSet::decode(s)?;
        env.finish(s)?;
        Ok(Self { free })
    }
    /// Full object contents: leading version, then the table state
    pub fn compose_object(version: Version, table: &Self) -> Vec<u8> {
        let mut buf = vec![];
        enc::u64_le(&mut buf, version);
        table.encode_state(&mut buf);
        buf
    }
    pub fn decode_object(buf: &[u8]) -> RuntimeResult<(Version, Self)> {
        let mut s = BufferedScanner::new(buf);
        let version = s.try_next_u64_le()?;
        let table = Self::decode_state(&mut s)?;
        Ok((version, table))
    }
}

#[cfg(test)]
mod tests {
    use super::{InoTable, IntervalSet};
    use crate::mds::types::InodeNo;

    #[test]
    fn interval_set_merge_and_split() {
        let mut s = IntervalSet::new();
        s.insert(10, 5);
        s.insert(20, 5);
        assert_eq!(s.num_intervals(), 2);
        // bridge the gap
        s.insert(15, 5);
        assert_eq!(s.num_intervals(), 1);
        assert!(s.contains(10) && s.contains(24) && !s.contains(25));
        // punch a hole in the middle
        assert!(s.erase(17));
        assert_eq!(s.num_intervals(), 2);
        assert!(!s.contains(17));
        assert!(s.contains(16) && s.contains(18));
        // removing an absent value is a no-op
        assert!(!s.erase(17));
    }

    #[test]
    fn erase_at_interval_edges() {
        let mut s = IntervalSet::new();
        s.insert(100, 3);
        assert!(s.erase(100));
        assert!(!s.contains(100) && s.contains(101) && s.contains(102));
        assert!(s.erase(102));
        assert_eq!(s.num_intervals(), 1);
        assert!(s.erase(101));
        assert!(s.is_empty());
    }

    #[test]
    fn inotable_object_roundtrip() {
        let mut free = IntervalSet::new();
        free.insert(0x1000, 0x1000);
        let mut table = InoTable::new(free);
        let obj = InoTable::compose_object(5, &table);
        let (ver, mut decoded) = InoTable::decode_object(&obj).unwrap();
        assert_eq!(ver, 5);
        assert_eq!(decoded, table);
        assert!(decoded.force_consume(InodeNo(0x1004)));
        assert!(!decoded.force_consume(InodeNo(0x1004)));
        assert!(table.force_consume(InodeNo(0x1004)));
        assert_eq!(decoded, table);
    }
}
