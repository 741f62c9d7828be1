/*
 * Created on Thu Mar 20 2025
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
    serde_json::json,
    std::collections::BTreeMap,
};

/// Magic prefix of every backing inode object
pub const ONDISK_MAGIC: &str = "reeffs volume v1";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// The core attributes of an inode as the metadata service persists them
pub struct Inode {
    pub ino: InodeNo,
    pub version: Version,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub size: u64,
    pub mtime: u64,
}

impl Inode {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        enc::envelope(buf, 1, 1, |buf| {
            enc::u64_le(buf, self.ino.0);
            enc::u64_le(buf, self.version);
            enc::u32_le(buf, self.mode);
            enc::u32_le(buf, self.uid);
            enc::u32_le(buf, self.gid);
            enc::u32_le(buf, self.nlink);
            enc::u64_le(buf, self.size);
            enc::u64_le(buf, self.mtime);
        })
    }
    pub fn decode(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        let env = dec::envelope(s, 1)?;
        let ret = Self {
            ino: InodeNo(s.try_next_u64_le()?),
            version: s.try_next_u64_le()?,
            mode: s.try_next_u32_le()?,
            uid: s.try_next_u32_le()?,
            gid: s.try_next_u32_le()?,
            nlink: s.try_next_u32_le()?,
            size: s.try_next_u64_le()?,
            mtime: s.try_next_u64_le()?,
        };
        env.finish(s)?;
        Ok(ret)
    }
    pub fn dump(&self) -> serde_json::Value {
        json!({
            "ino": self.ino.0,
            "version": self.version,
            "mode": self.mode,
            "uid": self.uid,
            "gid": self.gid,
            "nlink": self.nlink,
            "size": self.size,
            "mtime": self.mtime,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// An inode together with everything that rides along with it on disk.
/// The fragment tree, snapshot data and old-inode map are carried as
/// opaque blobs: the tool only hauls them between the journal and the
/// backing store, it never interprets them.
pub struct InodeStore {
    pub inode: Inode,
    pub xattrs: BTreeMap<String, Vec<u8>>,
    pub dirfragtree: Vec<u8>,
    pub snap_blob: Vec<u8>,
    pub symlink: String,
    pub old_inodes: Vec<u8>,
}

impl InodeStore {
    /// Encode without the envelope, as embedded in dentry values
    pub fn encode_bare(&self, buf: &mut Vec<u8>) {
        self.inode.encode(buf);
        enc::map(buf, &self.xattrs);
        enc::blob(buf, &self.dirfragtree);
        enc::blob(buf, &self.snap_blob);
        enc::string(buf, &self.symlink);
        enc::blob(buf, &self.old_inodes);
    }
    /// Encode with the envelope, as stored in standalone inode objects
    pub fn encode(&self, buf: &mut Vec<u8>) {
        enc::envelope(buf, 1, 1, |buf| self.encode_bare(buf))
    }
    pub fn decode_bare(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        Ok(Self {
            inode: Inode::decode(s)?,
            xattrs: dec::map(s)?,
            dirfragtree: dec::blob(s)?,
            snap_blob: dec::blob(s)?,
            symlink: dec::string(s)?,
            old_inodes: dec::blob(s)?,
        })
    }
    pub fn decode(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        let env = dec::envelope(s, 1)?;
        let ret = Self::decode_bare(s)?;
        env.finish(s)?;
        Ok(ret)
    }
}

/// Compose the full contents of a backing inode object: the on-disk magic
/// followed by the enveloped store
pub fn compose_inode_object(store: &InodeStore) -> Vec<u8> {
    let mut buf = vec![];
    enc::string(&mut buf, ONDISK_MAGIC);
    store.encode(&mut buf);
    buf
}

/// Split a backing inode object back into its store, verifying the magic
pub fn decode_inode_object(buf: &[u8]) -> RuntimeResult<InodeStore> {
    let mut s = BufferedScanner::new(buf);
    let magic = dec::string(&mut s)?;
    if magic != ONDISK_MAGIC {
        return Err(DecodeError::BadMagic.into());
    }
    InodeStore::decode(&mut s)
}

#[cfg(test)]
mod tests {
    use super::{compose_inode_object, decode_inode_object, Inode, InodeStore};
    use crate::{mds::types::InodeNo, mem::BufferedScanner};

    fn sample() -> InodeStore {
        let mut st = InodeStore::default();
        st.inode = Inode {
            ino: InodeNo(0x10000000001),
            version: 9,
            mode: 0o40755,
            uid: 1000,
            gid: 1000,
            nlink: 2,
            size: 0,
            mtime: 1742405000,
        };
        st.xattrs.insert("user.note".into(), b"x".to_vec());
        st.symlink = String::new();
        st.dirfragtree = vec![1, 2, 3];
        st
    }

    #[test]
    fn store_roundtrip_bare_and_enveloped() {
        let st = sample();
        let mut bare = vec![];
        st.encode_bare(&mut bare);
        let got = InodeStore::decode_bare(&mut BufferedScanner::new(&bare)).unwrap();
        assert_eq!(got, st);
        let mut full = vec![];
        st.encode(&mut full);
        let got = InodeStore::decode(&mut BufferedScanner::new(&full)).unwrap();
        assert_eq!(got, st);
    }

    #[test]
    fn inode_object_magic_is_checked() {
        let st = sample();
        let obj = compose_inode_object(&st);
        assert_eq!(decode_inode_object(&obj).unwrap(), st);
        let mut bad = obj.clone();
        // clobber a byte inside the magic string
        bad[6] ^= 0xFF;
        assert!(decode_inode_object(&bad).is_err());
    }
}
