/*
 * Created on Thu Mar 27 2025
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

//! The metablob is the payload of a metadata-mutating event: the set of
//! directory fragments it touched, each carrying the dentry records
//! ("bits") written under that fragment, plus any rootless inodes.

use {
    crate::{
        encoding::{dec, enc},
        error::{DecodeError, RuntimeResult},
        mds::{
            fnode::Fnode,
            inode::{Inode, InodeStore},
            types::{DirFrag, Frag, InodeNo, SnapId},
        },
        mem::BufferedScanner,
    },
    serde_json::json,
    std::{cell::OnceCell, collections::BTreeMap},
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A primary dentry plus the full inode it owns
pub struct Fullbit {
    pub dn: String,
    pub dnfirst: SnapId,
    pub dnlast: SnapId,
    pub inode: Inode,
    pub xattrs: BTreeMap<String, Vec<u8>>,
    pub dirfragtree: Vec<u8>,
    pub snap_blob: Vec<u8>,
    pub symlink: String,
    pub old_inodes: Vec<u8>,
}

impl Fullbit {
    pub fn new(dn: impl Into<String>, inode: Inode) -> Self {
        Self {
            dn: dn.into(),
            dnfirst: SnapId::HEAD,
            dnlast: SnapId::HEAD,
            inode,
            xattrs: BTreeMap::new(),
            dirfragtree: vec![],
            snap_blob: vec![],
            symlink: String::new(),
            old_inodes: vec![],
        }
    }
    /// Haul the carried fields into a backing-store inode record
    pub fn to_inode_store(&self) -> InodeStore {
        InodeStore {
            inode: self.inode.clone(),
            xattrs: self.xattrs.clone(),
            dirfragtree: self.dirfragtree.clone(),
            snap_blob: self.snap_blob.clone(),
            symlink: self.symlink.clone(),
            old_inodes: self.old_inodes.clone(),
        }
    }
    pub fn encode(&self, buf: &mut Vec<u8>) {
        enc::envelope(buf, 1, 1, |buf| {
            enc::string(buf, &self.dn);
            enc::u64_le(buf, self.dnfirst.0);
            enc::u64_le(buf, self.dnlast.0);
            self.inode.encode(buf);
            enc::map(buf, &self.xattrs);
            enc::blob(buf, &self.dirfragtree);
            enc::blob(buf, &self.snap_blob);
            enc::string(buf, &self.symlink);
            enc::blob(buf, &self.old_inodes);
        })
    }
    pub fn decode(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        let env = dec::envelope(s, 1)?;
        let ret = Self {
            dn: dec::string(s)?,
            dnfirst: SnapId(s.try_next_u64_le()?),
            dnlast: SnapId(s.try_next_u64_le()?),
            inode: Inode::decode(s)?,
            xattrs: dec::map(s)?,
            dirfragtree: dec::blob(s)?,
            snap_blob: dec::blob(s)?,
            symlink: dec::string(s)?,
            old_inodes: dec::blob(s)?,
        };
        env.finish(s)?;
        if ret.dnfirst > ret.dnlast {
            return Err(DecodeError::IllegalData.into());
        }
        Ok(ret)
    }
    pub fn dump(&self) -> serde_json::Value {
        json!({
            "dn": self.dn,
            "dnfirst": self.dnfirst.to_string(),
            "dnlast": self.dnlast.to_string(),
            "inode": self.inode.dump(),
            "symlink": self.symlink,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A hard link to an inode owned by some other dentry
pub struct Remotebit {
    pub dn: String,
    pub dnfirst: SnapId,
    pub dnlast: SnapId,
    pub ino: InodeNo,
    pub d_type: u8,
}

impl Remotebit {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        enc::envelope(buf, 1, 1, |buf| {
            enc::string(buf, &self.dn);
            enc::u64_le(buf, self.dnfirst.0);
            enc::u64_le(buf, self.dnlast.0);
            enc::u64_le(buf, self.ino.0);
            enc::u8(buf, self.d_type);
        })
    }
    pub fn decode(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        let env = dec::envelope(s, 1)?;
        let ret = Self {
            dn: dec::string(s)?,
            dnfirst: SnapId(s.try_next_u64_le()?),
            dnlast: SnapId(s.try_next_u64_le()?),
            ino: InodeNo(s.try_next_u64_le()?),
            d_type: s.try_next_byte()?,
        };
        env.finish(s)?;
        Ok(ret)
    }
    pub fn dump(&self) -> serde_json::Value {
        json!({
            "dn": self.dn,
            "dnfirst": self.dnfirst.to_string(),
            "dnlast": self.dnlast.to_string(),
            "ino": self.ino.0,
            "d_type": self.d_type,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A dentry tombstone
pub struct Nullbit {
    pub dn: String,
    pub dnfirst: SnapId,
    pub dnlast: SnapId,
}

impl Nullbit {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        enc::envelope(buf, 1, 1, |buf| {
            enc::string(buf, &self.dn);
            enc::u64_le(buf, self.dnfirst.0);
            enc::u64_le(buf, self.dnlast.0);
        })
    }
    pub fn decode(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        let env = dec::envelope(s, 1)?;
        let ret = Self {
            dn: dec::string(s)?,
            dnfirst: SnapId(s.try_next_u64_le()?),
            dnlast: SnapId(s.try_next_u64_le()?),
        };
        env.finish(s)?;
        Ok(ret)
    }
    pub fn dump(&self) -> serde_json::Value {
        json!({
            "dn": self.dn,
            "dnfirst": self.dnfirst.to_string(),
            "dnlast": self.dnlast.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// The decoded bit lists of a dirlump
pub struct DirlumpBits {
    pub dfull: Vec<Fullbit>,
    pub dremote: Vec<Remotebit>,
    pub dnull: Vec<Nullbit>,
}

impl DirlumpBits {
    fn decode(raw: &[u8], nfull: u32, nremote: u32, nnull: u32) -> RuntimeResult<Self> {
        let s = &mut BufferedScanner::new(raw);
        let mut bits = Self::default();
        for _ in 0..nfull {
            bits.dfull.push(Fullbit::decode(s)?);
        }
        for _ in 0..nremote {
            bits.dremote.push(Remotebit::decode(s)?);
        }
        for _ in 0..nnull {
            bits.dnull.push(Nullbit::decode(s)?);
        }
        if !s.eof() {
            return Err(DecodeError::IllegalData.into());
        }
        Ok(bits)
    }
}

#[derive(Debug)]
/// One directory fragment's worth of changes: the new fnode plus the bit
/// lists, which stay in their encoded form until [`Dirlump::decode_bits`]
/// materialises them.
pub struct Dirlump {
    pub fnode: Fnode,
    nfull: u32,
    nremote: u32,
    nnull: u32,
    bits_bl: Vec<u8>,
    bits: OnceCell<DirlumpBits>,
}

impl Dirlump {
    pub fn new(fnode: Fnode) -> Self {
        Self {
            fnode,
            nfull: 0,
            nremote: 0,
            nnull: 0,
            bits_bl: vec![],
            bits: OnceCell::new(),
        }
    }
    pub fn push_full(&mut self, fb: &Fullbit) {
        debug_assert!(self.bits.get().is_none(), "lump already decoded");
        fb.encode(&mut self.bits_bl);
        self.nfull += 1;
    }
    pub fn push_remote(&mut self, rb: &Remotebit) {
        debug_assert!(self.bits.get().is_none(), "lump already decoded");
        rb.encode(&mut self.bits_bl);
        self.nremote += 1;
    }
    pub fn push_null(&mut self, nb: &Nullbit) {
        debug_assert!(self.bits.get().is_none(), "lump already decoded");
        nb.encode(&mut self.bits_bl);
        self.nnull += 1;
    }
    /// Materialise the bit lists. Idempotent; the first call does the work
    /// and every later call returns the same decoded lists.
    pub fn decode_bits(&self) -> RuntimeResult<&DirlumpBits> {
        if let Some(bits) = self.bits.get() {
            return Ok(bits);
        }
        let decoded = DirlumpBits::decode(&self.bits_bl, self.nfull, self.nremote, self.nnull)?;
        Ok(self.bits.get_or_init(|| decoded))
    }
    pub fn encode(&self, buf: &mut Vec<u8>) {
        enc::envelope(buf, 1, 1, |buf| {
            self.fnode.encode(buf);
            enc::u32_le(buf, self.nfull);
            enc::u32_le(buf, self.nremote);
            enc::u32_le(buf, self.nnull);
            enc::blob(buf, &self.bits_bl);
        })
    }
    pub fn decode(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        let env = dec::envelope(s, 1)?;
        let fnode = Fnode::decode(s)?;
        let nfull = s.try_next_u32_le()?;
        let nremote = s.try_next_u32_le()?;
        let nnull = s.try_next_u32_le()?;
        let bits_bl = dec::blob(s)?;
        env.finish(s)?;
        Ok(Self {
            fnode,
            nfull,
            nremote,
            nnull,
            bits_bl,
            bits: OnceCell::new(),
        })
    }
    pub fn dump(&self) -> serde_json::Value {
        match self.decode_bits() {
            Ok(bits) => json!({
                "fnode": self.fnode.dump(),
                "dfull": bits.dfull.iter().map(Fullbit::dump).collect::<Vec<_>>(),
                "dremote": bits.dremote.iter().map(Remotebit::dump).collect::<Vec<_>>(),
                "dnull": bits.dnull.iter().map(Nullbit::dump).collect::<Vec<_>>(),
            }),
            Err(e) => json!({
                "fnode": self.fnode.dump(),
                "error": format!("undecodable bits: {e}"),
            }),
        }
    }
}

// the lazily decoded lists are a cache of `bits_bl`, so equality is decided
// by the encoded form alone
impl PartialEq for Dirlump {
    fn eq(&self, other: &Self) -> bool {
        okay!(
            self.fnode == other.fnode,
            self.nfull == other.nfull,
            self.nremote == other.nremote,
            self.nnull == other.nnull,
            self.bits_bl == other.bits_bl,
        )
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Metablob {
    pub roots: Vec<Fullbit>,
    pub lump_order: Vec<DirFrag>,
    pub lump_map: BTreeMap<DirFrag, Dirlump>,
    pub destroyed_inodes: Vec<InodeNo>,
    /// Rename hint; decoded and carried but not acted upon
    pub renamed_dirino: Option<InodeNo>,
}

impl Metablob {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_root(&mut self, fb: Fullbit) {
        self.roots.push(fb);
    }
    pub fn add_lump(&mut self, df: DirFrag, lump: Dirlump) {
        if !self.lump_order.contains(&df) {
            self.lump_order.push(df);
        }
        self.lump_map.insert(df, lump);
    }
    /// Iterate lumps in `lump_order`, the only defined order
    pub fn dirlumps(&self) -> impl Iterator<Item = (&DirFrag, &Dirlump)> {
        self.lump_order
            .iter()
            .filter_map(|df| self.lump_map.get(df).map(|lump| (df, lump)))
    }
    pub fn encode(&self, buf: &mut Vec<u8>) {
        enc::envelope(buf, 1, 1, |buf| {
            enc::u32_le(buf, self.roots.len() as u32);
            for fb in &self.roots {
                fb.encode(buf);
            }
            enc::u32_le(buf, self.lump_order.len() as u32);
            for (df, lump) in self.dirlumps() {
                enc::u64_le(buf, df.ino.0);
                enc::u32_le(buf, df.frag.0);
                lump.encode(buf);
            }
            enc::u32_le(buf, self.destroyed_inodes.len() as u32);
            for ino in &self.destroyed_inodes {
                enc::u64_le(buf, ino.0);
            }
            match self.renamed_dirino {
                Some(ino) => {
                    enc::u8(buf, 1);
                    enc::u64_le(buf, ino.0);
                }
                None => enc::u8(buf, 0),
            }
        })
    }
    pub fn decode(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        let env = dec::envelope(s, 1)?;
        let mut mb = Self::new();
        let nroots = s.try_next_u32_le()?;
        for _ in 0..nroots {
            mb.roots.push(Fullbit::decode(s)?);
        }
        let nlumps = s.try_next_u32_le()?;
        for _ in 0..nlumps {
            let ino = InodeNo(s.try_next_u64_le()?);
            let frag = Frag(s.try_next_u32_le()?);
            let lump = Dirlump::decode(s)?;
            let df = DirFrag::new(ino, frag);
            if mb.lump_map.contains_key(&df) {
                return Err(DecodeError::IllegalData.into());
            }
            mb.add_lump(df, lump);
        }
        let ndestroyed = s.try_next_u32_le()?;
        for _ in 0..ndestroyed {
            mb.destroyed_inodes.push(InodeNo(s.try_next_u64_le()?));
        }
        if s.try_next_byte()? == 1 {
            mb.renamed_dirino = Some(InodeNo(s.try_next_u64_le()?));
        }
        env.finish(s)?;
        Ok(mb)
    }
    pub fn dump(&self) -> serde_json::Value {
        json!({
            "roots": self.roots.iter().map(Fullbit::dump).collect::<Vec<_>>(),
            "lumps": self
                .dirlumps()
                .map(|(df, lump)| json!({ "dirfrag": df.to_string(), "lump": lump.dump() }))
                .collect::<Vec<_>>(),
            "destroyed_inodes": self.destroyed_inodes.iter().map(|i| i.0).collect::<Vec<_>>(),
            "renamed_dirino": self.renamed_dirino.map(|i| i.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Dirlump, Fullbit, Metablob, Nullbit, Remotebit};
    use crate::{
        mds::{
            fnode::Fnode,
            inode::Inode,
            types::{DirFrag, Frag, InodeNo, SnapId},
        },
        mem::BufferedScanner,
    };

    fn sample_blob() -> Metablob {
        let mut mb = Metablob::new();
        let mut lump = Dirlump::new(Fnode::with_version(3));
        lump.push_full(&Fullbit::new(
            "alpha",
            Inode {
                ino: InodeNo(0x100),
                version: 5,
                ..Inode::default()
            },
        ));
        lump.push_remote(&Remotebit {
            dn: "beta".to_owned(),
            dnfirst: SnapId::HEAD,
            dnlast: SnapId::HEAD,
            ino: InodeNo(0x101),
            d_type: 8,
        });
        lump.push_null(&Nullbit {
            dn: "gone".to_owned(),
            dnfirst: SnapId::HEAD,
            dnlast: SnapId::HEAD,
        });
        mb.add_lump(DirFrag::new(InodeNo(0x1), Frag::ROOT), lump);
        mb.destroyed_inodes.push(InodeNo(0x77));
        mb
    }

    #[test]
    fn metablob_roundtrip() {
        let mb = sample_blob();
        let mut buf = vec![];
        mb.encode(&mut buf);
        let got = Metablob::decode(&mut BufferedScanner::new(&buf)).unwrap();
        assert_eq!(got, mb);
    }

    #[test]
    fn decode_bits_is_idempotent() {
        let mb = sample_blob();
        let mut buf = vec![];
        mb.encode(&mut buf);
        let got = Metablob::decode(&mut BufferedScanner::new(&buf)).unwrap();
        let (_, lump) = got.dirlumps().next().unwrap();
        let first = lump.decode_bits().unwrap() as *const _;
        let again = lump.decode_bits().unwrap() as *const _;
        assert_eq!(first, again);
        let bits = lump.decode_bits().unwrap();
        assert_eq!(bits.dfull.len(), 1);
        assert_eq!(bits.dremote.len(), 1);
        assert_eq!(bits.dnull.len(), 1);
        assert_eq!(bits.dfull[0].dn, "alpha");
    }

    #[test]
    fn corrupt_bits_fail_on_decode_not_on_scan() {
        let mut lump = Dirlump::new(Fnode::with_version(1));
        lump.push_full(&Fullbit::new("a", Inode::default()));
        let mut buf = vec![];
        lump.encode(&mut buf);
        // flip the compat byte of the first encoded bit: the outer lump
        // still parses, the bit list must not
        buf[53] ^= 0xFF;
        let got = Dirlump::decode(&mut BufferedScanner::new(&buf)).unwrap();
        assert!(got.decode_bits().is_err());
    }
}
