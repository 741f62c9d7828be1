/*
 * Created on Fri Apr 18 2025
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

//! Unconditional offline replay. Unlike the scavenger this path forces the
//! backing store to match the journal: fnodes and primary dentries are
//! written without version gates, and tombstones always remove. Hard links
//! are not replayed here.

use {
    crate::{
        error::RuntimeResult,
        journal::metablob::Metablob,
        mds::{
            inode::{compose_inode_object, decode_inode_object},
            types::{dentry_key, inode_object_name},
        },
        ops::recover::compose_inode_dentry,
        store::ObjectStore,
        util::interrupt,
    },
    std::collections::{BTreeMap, BTreeSet},
};

pub fn replay_offline<S: ObjectStore>(
    store: &S,
    metablob: &Metablob,
    dry_run: bool,
) -> RuntimeResult<()> {
    // roots first
    for fb in &metablob.roots {
        let root_oid = inode_object_name(fb.inode.ino);
        log::debug!("updating root {} ({root_oid})", fb.inode.ino);
        match store.read(&root_oid, 1 << 22, 0) {
            Err(e) if e.is_not_found() => {
                log::debug!("{root_oid}: does not exist, will create");
            }
            Ok(raw) => {
                // only diagnostic: the replay overwrites regardless
                if let Err(e) = decode_inode_object(&raw) {
                    log::warn!("{root_oid}: existing object unreadable ({e})");
                }
            }
            Err(e) => return Err(e),
        }
        log::info!("{root_oid}: writing root inode v{}", fb.inode.version);
        if !dry_run {
            store.write_full(&root_oid, &compose_inode_object(&fb.to_inode_store()))?;
        }
    }

    for (frag, lump) in metablob.dirlumps() {
        if interrupt::interrupted() {
            log::warn!("interrupted, stopping replay (partial work is re-runnable)");
            return Ok(());
        }
        let bits = lump.decode_bits()?;
        let frag_oid = frag.object_name();

        match store.stat(&frag_oid) {
            Ok(_) => log::debug!("{frag_oid}: fragment exists, will modify"),
            Err(e) if e.is_not_found() => {
                log::debug!("{frag_oid}: fragment does not exist, will create")
            }
            Err(e) => return Err(e),
        }

        log::info!("{frag_oid}: fnode -> v{}", lump.fnode.version);
        if !dry_run {
            let mut fnode_bl = vec![];
            lump.fnode.encode(&mut fnode_bl);
            store.omap_set_header(&frag_oid, &fnode_bl)?;
        }

        let mut write_vals: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for fb in &bits.dfull {
            let key = dentry_key(&fb.dn, fb.dnlast);
            log::info!("{frag_oid}/{key}: writing 'I' dentry (inode v{})", fb.inode.version);
            write_vals.insert(key, compose_inode_dentry(fb.dnfirst, &fb.to_inode_store()));
        }
        if !write_vals.is_empty() && !dry_run {
            store.omap_set(&frag_oid, &write_vals)?;
        }

        let mut rm_keys = BTreeSet::new();
        for nb in &bits.dnull {
            let key = dentry_key(&nb.dn, nb.dnlast);
            log::info!("{frag_oid}/{key}: removing dentry");
            rm_keys.insert(key);
        }
        if !rm_keys.is_empty() && !dry_run {
            store.omap_rm_keys(&frag_oid, &rm_keys)?;
        }
    }

    for ino in &metablob.destroyed_inodes {
        // fragment objects of destroyed directories are left in place;
        // they are unreachable once the dentry is gone
        log::debug!("destroyed inode {ino}");
    }

    Ok(())
}
