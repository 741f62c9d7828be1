/*
 * Created on Tue Mar 18 2025
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

use core::fmt;

/// Monotonic version carried by fnodes, inodes and tables. Writes against
/// the backing store are gated on this never going backwards.
pub type Version = u64;

/// The rank of a metadata server within the cluster
pub type Rank = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct InodeNo(pub u64);

impl fmt::Display for InodeNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl From<u64> for InodeNo {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SnapId(pub u64);

impl SnapId {
    /// The live (unsnapped) view of a dentry
    pub const HEAD: SnapId = SnapId(u64::MAX);
}

impl fmt::Display for SnapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::HEAD {
            write!(f, "head")
        } else {
            write!(f, "{:x}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
/// An encoded directory fragment identifier
pub struct Frag(pub u32);

impl Frag {
    /// The whole (unfragmented) directory
    pub const ROOT: Frag = Frag(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirFrag {
    pub ino: InodeNo,
    pub frag: Frag,
}

impl DirFrag {
    pub const fn new(ino: InodeNo, frag: Frag) -> Self {
        Self { ino, frag }
    }
    /// Name of the backing object whose omap holds this fragment's dentries
    pub fn object_name(&self) -> String {
        format!("{:x}.{:08x}", self.ino.0, self.frag.0)
    }
}

impl fmt::Display for DirFrag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}.{:x}", self.ino.0, self.frag.0)
    }
}

/*
    object naming
*/

/// Journal inode base for the metadata log of a rank
pub const MDLOG_INO_BASE: u64 = 0x200;
/// Journal inode base for the secondary (purge) log of a rank
pub const PURGE_INO_BASE: u64 = 0x500;

/// Name of a journal object. Index 0 holds the journal header; positions
/// always start at or beyond one object period so data never lands there.
pub fn log_object_name(log_ino: u64, index: u64) -> String {
    format!("{:x}.{:08x}", log_ino, index)
}

/// Name of the backing object holding a root inode
pub fn inode_object_name(ino: InodeNo) -> String {
    format!("{:x}.{:08x}.inode", ino.0, Frag::ROOT.0)
}

/// Name of the per-rank free inode number table
pub fn inotable_object_name(rank: Rank) -> String {
    format!("mds{}_inotable", rank)
}

/// Omap key of a dentry: the name plus the snapshot it is valid until
pub fn dentry_key(dn: &str, snap: SnapId) -> String {
    format!("{}_{}", dn, snap)
}
