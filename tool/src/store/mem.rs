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

//! In-memory metadata pool used by the test suite

use {
    crate::{
        error::{BackendError, RuntimeResult},
        store::{ObjectStat, ObjectStore},
    },
    parking_lot::RwLock,
    std::collections::{BTreeMap, BTreeSet, HashMap},
};

#[derive(Debug, Default)]
struct MemObject {
    data: Vec<u8>,
    omap_header: Vec<u8>,
    omap: BTreeMap<String, Vec<u8>>,
    mtime: u64,
}

#[derive(Debug, Default)]
pub struct MemStore {
    objects: RwLock<HashMap<String, MemObject>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn object_names(&self) -> Vec<String> {
        let mut v: Vec<_> = self.objects.read().keys().cloned().collect();
        v.sort();
        v
    }
    /// Raw access for test assertions
    pub fn raw_data(&self, oid: &str) -> Option<Vec<u8>> {
        self.objects.read().get(oid).map(|o| o.data.clone())
    }
    pub fn raw_omap_val(&self, oid: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .get(oid)
            .and_then(|o| o.omap.get(key).cloned())
    }
    /// Seed a dentry value directly, creating the object if needed
    pub fn seed_omap_val(&self, oid: &str, key: &str, val: Vec<u8>) {
        self.objects
            .write()
            .entry(oid.to_owned())
            .or_default()
            .omap
            .insert(key.to_owned(), val);
    }
    fn with<T>(&self, oid: &str, f: impl FnOnce(&MemObject) -> T) -> RuntimeResult<T> {
        self.objects
            .read()
            .get(oid)
            .map(f)
            .ok_or_else(|| BackendError::NotFound.into())
    }
}

impl ObjectStore for MemStore {
    fn read(&self, oid: &str, len: u64, off: u64) -> RuntimeResult<Vec<u8>> {
        self.with(oid, |o| {
            let off = (off as usize).min(o.data.len());
            let end = (off + len as usize).min(o.data.len());
            o.data[off..end].to_vec()
        })
    }
    fn write(&self, oid: &str, data: &[u8], off: u64) -> RuntimeResult<()> {
        let mut objects = self.objects.write();
        let o = objects.entry(oid.to_owned()).or_default();
        let off = off as usize;
        if o.data.len() < off + data.len() {
            o.data.resize(off + data.len(), 0);
        }
        o.data[off..off + data.len()].copy_from_slice(data);
        Ok(())
    }
    fn write_full(&self, oid: &str, data: &[u8]) -> RuntimeResult<()> {
        let mut objects = self.objects.write();
        let o = objects.entry(oid.to_owned()).or_default();
        o.data = data.to_vec();
        Ok(())
    }
    fn stat(&self, oid: &str) -> RuntimeResult<ObjectStat> {
        self.with(oid, |o| ObjectStat {
            size: o.data.len() as u64,
            mtime: o.mtime,
        })
    }
    fn omap_get_header(&self, oid: &str) -> RuntimeResult<Vec<u8>> {
        self.with(oid, |o| o.omap_header.clone())
    }
    fn omap_set_header(&self, oid: &str, data: &[u8]) -> RuntimeResult<()> {
        let mut objects = self.objects.write();
        objects.entry(oid.to_owned()).or_default().omap_header = data.to_vec();
        Ok(())
    }
    fn omap_get_vals_by_keys(
        &self,
        oid: &str,
        keys: &BTreeSet<String>,
    ) -> RuntimeResult<BTreeMap<String, Vec<u8>>> {
        let objects = self.objects.read();
        let Some(o) = objects.get(oid) else {
            return Ok(BTreeMap::new());
        };
        Ok(keys
            .iter()
            .filter_map(|k| o.omap.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }
    fn omap_set(&self, oid: &str, kv: &BTreeMap<String, Vec<u8>>) -> RuntimeResult<()> {
        let mut objects = self.objects.write();
        let o = objects.entry(oid.to_owned()).or_default();
        for (k, v) in kv {
            o.omap.insert(k.clone(), v.clone());
        }
        Ok(())
    }
    fn omap_rm_keys(&self, oid: &str, keys: &BTreeSet<String>) -> RuntimeResult<()> {
        let mut objects = self.objects.write();
        if let Some(o) = objects.get_mut(oid) {
            for k in keys {
                o.omap.remove(k);
            }
        }
        Ok(())
    }
}
