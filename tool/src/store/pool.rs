/*
 * Created on Sat Mar 22 2025
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

//! Directory-backed metadata pool
//!
//! Offline recovery runs against a fenced pool, which for this tool means a
//! directory: one file per object, with the omap kept in `<oid>.omap` and
//! the omap header in `<oid>.omap_hdr` next to it. Keys and values use the
//! standard length-prefixed encoding.

use {
    crate::{
        encoding::{dec, enc},
        error::{BackendError, RuntimeResult},
        mem::BufferedScanner,
        store::{ObjectStat, ObjectStore},
    },
    std::{
        collections::{BTreeMap, BTreeSet},
        fs,
        io::{Read, Seek, SeekFrom, Write},
        path::{Path, PathBuf},
        time::UNIX_EPOCH,
    },
};

pub struct FsPool {
    root: PathBuf,
}

impl FsPool {
    pub fn open(root: impl Into<PathBuf>) -> RuntimeResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(BackendError::NotFound.into());
        }
        Ok(Self { root })
    }
    fn data_path(&self, oid: &str) -> PathBuf {
        self.root.join(oid)
    }
    fn omap_path(&self, oid: &str) -> PathBuf {
        self.root.join(format!("{oid}.omap"))
    }
    fn omap_hdr_path(&self, oid: &str) -> PathBuf {
        self.root.join(format!("{oid}.omap_hdr"))
    }
    fn exists(&self, oid: &str) -> bool {
        self.data_path(oid).is_file()
            || self.omap_path(oid).is_file()
            || self.omap_hdr_path(oid).is_file()
    }
    fn load_omap(&self, oid: &str) -> RuntimeResult<BTreeMap<String, Vec<u8>>> {
        match fs::read(self.omap_path(oid)) {
            Ok(raw) => {
                let mut s = BufferedScanner::new(&raw);
                let m = dec::map(&mut s)?;
                Ok(m)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
    fn save_omap(&self, oid: &str, m: &BTreeMap<String, Vec<u8>>) -> RuntimeResult<()> {
        let mut buf = vec![];
        enc::map(&mut buf, m);
        fs::write(self.omap_path(oid), buf)?;
        Ok(())
    }
}

fn mtime_of(p: &Path) -> u64 {
    fs::metadata(p)
        .and_then(|md| md.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl ObjectStore for FsPool {
    fn read(&self, oid: &str, len: u64, off: u64) -> RuntimeResult<Vec<u8>> {
        let path = self.data_path(oid);
        if !path.is_file() {
            if self.exists(oid) {
                // object known only through its omap; no byte payload
                return Ok(vec![]);
            }
            return Err(BackendError::NotFound.into());
        }
        let mut f = fs::File::open(path)?;
        f.seek(SeekFrom::Start(off))?;
        let mut out = Vec::with_capacity(len.min(1 << 22) as usize);
        f.take(len).read_to_end(&mut out)?;
        Ok(out)
    }
    fn write(&self, oid: &str, data: &[u8], off: u64) -> RuntimeResult<()> {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.data_path(oid))?;
        let flen = f.metadata()?.len();
        if off > flen {
            // sparse region between EOF and the write offset
            f.set_len(off)?;
        }
        f.seek(SeekFrom::Start(off))?;
        f.write_all(data)?;
        Ok(())
    }
    fn write_full(&self, oid: &str, data: &[u8]) -> RuntimeResult<()> {
        fs::write(self.data_path(oid), data)?;
        Ok(())
    }
    fn stat(&self, oid: &str) -> RuntimeResult<ObjectStat> {
        if !self.exists(oid) {
            return Err(BackendError::NotFound.into());
        }
        let path = self.data_path(oid);
        let size = fs::metadata(&path).map(|md| md.len()).unwrap_or(0);
        Ok(ObjectStat {
            size,
            mtime: mtime_of(&path),
        })
    }
    fn omap_get_header(&self, oid: &str) -> RuntimeResult<Vec<u8>> {
        match fs::read(self.omap_hdr_path(oid)) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.exists(oid) {
                    Ok(vec![])
                } else {
                    Err(BackendError::NotFound.into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }
    fn omap_set_header(&self, oid: &str, data: &[u8]) -> RuntimeResult<()> {
        fs::write(self.omap_hdr_path(oid), data)?;
        Ok(())
    }
    fn omap_get_vals_by_keys(
        &self,
        oid: &str,
        keys: &BTreeSet<String>,
    ) -> RuntimeResult<BTreeMap<String, Vec<u8>>> {
        let m = self.load_omap(oid)?;
        Ok(keys
            .iter()
            .filter_map(|k| m.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }
    fn omap_set(&self, oid: &str, kv: &BTreeMap<String, Vec<u8>>) -> RuntimeResult<()> {
        let mut m = self.load_omap(oid)?;
        for (k, v) in kv {
            m.insert(k.clone(), v.clone());
        }
        self.save_omap(oid, &m)
    }
    fn omap_rm_keys(&self, oid: &str, keys: &BTreeSet<String>) -> RuntimeResult<()> {
        let mut m = self.load_omap(oid)?;
        let mut changed = false;
        for k in keys {
            changed |= m.remove(k).is_some();
        }
        if changed {
            self.save_omap(oid, &m)?;
        }
        Ok(())
    }
}
