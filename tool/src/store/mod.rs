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

#[cfg(test)]
pub mod mem;
pub mod pool;

use {
    crate::error::RuntimeResult,
    std::collections::{BTreeMap, BTreeSet},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    /// Seconds since the epoch
    pub mtime: u64,
}

/// The slice of the metadata pool client that the offline tooling consumes.
///
/// Semantics shared by all implementations:
/// - `read` on a missing object fails with `NotFound`; a read past the end
///   of an object returns the bytes that exist (possibly none)
/// - `write`, `write_full`, `omap_set` and `omap_set_header` create the
///   object if needed
/// - `omap_get_header` on an object without a header returns an empty
///   buffer; on a missing object it fails with `NotFound`
/// - `omap_get_vals_by_keys` silently omits keys that do not exist and
///   treats a missing object as having no keys
pub trait ObjectStore {
    fn read(&self, oid: &str, len: u64, off: u64) -> RuntimeResult<Vec<u8>>;
    fn write(&self, oid: &str, data: &[u8], off: u64) -> RuntimeResult<()>;
    fn write_full(&self, oid: &str, data: &[u8]) -> RuntimeResult<()>;
    fn stat(&self, oid: &str) -> RuntimeResult<ObjectStat>;
    fn omap_get_header(&self, oid: &str) -> RuntimeResult<Vec<u8>>;
    fn omap_set_header(&self, oid: &str, data: &[u8]) -> RuntimeResult<()>;
    fn omap_get_vals_by_keys(
        &self,
        oid: &str,
        keys: &BTreeSet<String>,
    ) -> RuntimeResult<BTreeMap<String, Vec<u8>>>;
    fn omap_set(&self, oid: &str, kv: &BTreeMap<String, Vec<u8>>) -> RuntimeResult<()>;
    fn omap_rm_keys(&self, oid: &str, keys: &BTreeSet<String>) -> RuntimeResult<()>;
}
