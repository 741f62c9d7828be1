/*
 * Created on Wed Apr 09 2025
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

//! Selective offline replay ("scavenge"): read dentries out of journaled
//! metablobs and write them into the backing store iff they are newer than
//! what the store already holds. Where required, the enclosing dirfrag
//! objects are created on the fly.
//!
//! The metadata server regenerates backtraces on read, so none are written
//! here. Re-running a scavenge converges: every write is gated on the
//! existing version being older.

use {
    crate::{
        encoding::enc,
        error::RuntimeResult,
        journal::metablob::Metablob,
        mds::{
            fnode::Fnode,
            inode::{compose_inode_object, decode_inode_object, InodeStore},
            inotable::InoTable,
            types::{dentry_key, inode_object_name, inotable_object_name, InodeNo, Rank, SnapId},
        },
        mem::BufferedScanner,
        store::ObjectStore,
        util::interrupt,
    },
    std::collections::{BTreeMap, BTreeSet},
};

/// Dentry value kind for a primary (inode-carrying) dentry
pub const DENTRY_TYPE_INODE: u8 = b'I';
/// Dentry value kind for a hard link
pub const DENTRY_TYPE_REMOTE: u8 = b'L';

/// Split a backing-store dentry value into its `(dnfirst, kind)` prefix and
/// a scanner over the kind-specific remainder
fn split_dentry(raw: &[u8]) -> RuntimeResult<(SnapId, u8, BufferedScanner<'_>)> {
    let mut s = BufferedScanner::new(raw);
    let dnfirst = SnapId(s.try_next_u64_le()?);
    let kind = s.try_next_byte()?;
    Ok((dnfirst, kind, s))
}

/// Compose a primary dentry value: `dnfirst · 'I' · bare inode store`
pub fn compose_inode_dentry(dnfirst: SnapId, store: &InodeStore) -> Vec<u8> {
    let mut bl = vec![];
    enc::u64_le(&mut bl, dnfirst.0);
    enc::u8(&mut bl, DENTRY_TYPE_INODE);
    store.encode_bare(&mut bl);
    bl
}

/// Compose a hard link dentry value: `dnfirst · 'L' · ino · d_type`
pub fn compose_remote_dentry(dnfirst: SnapId, ino: InodeNo, d_type: u8) -> Vec<u8> {
    let mut bl = vec![];
    enc::u64_le(&mut bl, dnfirst.0);
    enc::u8(&mut bl, DENTRY_TYPE_REMOTE);
    enc::u64_le(&mut bl, ino.0);
    enc::u8(&mut bl, d_type);
    bl
}

/// Scavenge every dentry carried by `metablob` into the backing store.
///
/// Inode numbers consumed by written dentries are collected into
/// `consumed_inos` so the caller can take them out of the free tables
/// afterwards. With `dry_run` set, the gating decisions are made and
/// logged but nothing is written and nothing is consumed.
pub fn scavenge_dentries<S: ObjectStore>(
    store: &S,
    metablob: &Metablob,
    dry_run: bool,
    consumed_inos: &mut BTreeSet<InodeNo>,
) -> RuntimeResult<()> {
    for (frag, lump) in metablob.dirlumps() {
        if interrupt::interrupted() {
            log::warn!("interrupted, stopping scavenge (partial work is version-safe)");
            return Ok(());
        }
        let bits = lump.decode_bits()?;
        let frag_oid = frag.object_name();
        log::debug!("inspecting lump {frag_oid}");

        // the old fnode version doubles as the gate for hard links and
        // tombstones, which carry no version of their own
        let mut old_fnode_version = 0;
        let mut write_fnode = false;
        match store.omap_get_header(&frag_oid) {
            Err(e) if e.is_not_found() => {
                log::debug!("{frag_oid}: no fragment object, creating from scratch");
                // the fragment is created without a backtrace; the server
                // regenerates those on read
                write_fnode = true;
            }
            Ok(old_fnode_bl) => match Fnode::decode_buf(&old_fnode_bl) {
                Ok(old_fnode) => {
                    log::debug!(
                        "{frag_oid}: fnode old v{} vs new v{}",
                        old_fnode.version,
                        lump.fnode.version
                    );
                    old_fnode_version = old_fnode.version;
                    write_fnode = old_fnode_version < lump.fnode.version;
                }
                Err(_) => {
                    log::warn!("{frag_oid}: fnode is corrupt, overwriting");
                    write_fnode = true;
                }
            },
            Err(e) => return Err(e),
        }

        if write_fnode {
            log::info!(
                "{frag_oid}: fnode v{} -> v{}",
                old_fnode_version,
                lump.fnode.version
            );
            if !dry_run {
                let mut fnode_bl = vec![];
                lump.fnode.encode(&mut fnode_bl);
                store.omap_set_header(&frag_oid, &fnode_bl)?;
            }
        } else {
            log::info!("{frag_oid}: fnode skipped (version)");
        }

        // bulk-fetch every dentry this lump could touch
        let mut read_keys = BTreeSet::new();
        for fb in &bits.dfull {
            read_keys.insert(dentry_key(&fb.dn, fb.dnlast));
        }
        for rb in &bits.dremote {
            read_keys.insert(dentry_key(&rb.dn, rb.dnlast));
        }
        let read_vals = store.omap_get_vals_by_keys(&frag_oid, &read_keys)?;

        let mut write_vals: BTreeMap<String, Vec<u8>> = BTreeMap::new();

        for fb in &bits.dfull {
            let key = dentry_key(&fb.dn, fb.dnlast);
            let write_dentry = match read_vals.get(&key) {
                None => {
                    log::debug!("{frag_oid}/{key}: dentry does not exist, will create");
                    true
                }
                Some(old_dentry) => match split_dentry(old_dentry) {
                    Ok((_, DENTRY_TYPE_REMOTE, _)) => {
                        // a hard link carries no inode version to compare
                        // against, so only replace it when the journaled
                        // fragment as a whole is newer
                        log::debug!(
                            "{frag_oid}/{key}: hard link in slot, lump fnode v{} vs \
                             existing fnode v{}",
                            lump.fnode.version,
                            old_fnode_version
                        );
                        old_fnode_version < lump.fnode.version
                    }
                    Ok((_, DENTRY_TYPE_INODE, mut rest)) => {
                        match InodeStore::decode_bare(&mut rest) {
                            Ok(existing) => {
                                log::debug!(
                                    "{frag_oid}/{key}: embedded inode v{} vs journal v{}",
                                    existing.inode.version,
                                    fb.inode.version
                                );
                                existing.inode.version < fb.inode.version
                            }
                            Err(_) => {
                                log::warn!(
                                    "{frag_oid}/{key}: corrupt dentry in backing store, \
                                     overwriting from journal"
                                );
                                true
                            }
                        }
                    }
                    Ok(_) | Err(_) => {
                        log::warn!(
                            "{frag_oid}/{key}: corrupt dentry in backing store, overwriting \
                             from journal"
                        );
                        true
                    }
                },
            };
            if write_dentry {
                log::info!("{frag_oid}/{key}: writing 'I' dentry (inode v{})", fb.inode.version);
                if !dry_run {
                    write_vals.insert(key, compose_inode_dentry(fb.dnfirst, &fb.to_inode_store()));
                    consumed_inos.insert(fb.inode.ino);
                }
            } else {
                log::info!("{frag_oid}/{key}: skipped (version)");
            }
        }

        for rb in &bits.dremote {
            let key = dentry_key(&rb.dn, rb.dnlast);
            let write_dentry = match read_vals.get(&key) {
                None => {
                    log::debug!("{frag_oid}/{key}: dentry does not exist, will create");
                    true
                }
                Some(old_dentry) => match split_dentry(old_dentry) {
                    Ok((_, DENTRY_TYPE_REMOTE, _)) | Ok((_, DENTRY_TYPE_INODE, _)) => {
                        log::debug!(
                            "{frag_oid}/{key}: slot occupied, lump fnode v{} vs existing \
                             fnode v{}",
                            lump.fnode.version,
                            old_fnode_version
                        );
                        old_fnode_version < lump.fnode.version
                    }
                    Ok(_) | Err(_) => {
                        log::warn!(
                            "{frag_oid}/{key}: corrupt dentry in backing store, overwriting \
                             from journal"
                        );
                        true
                    }
                },
            };
            if write_dentry {
                log::info!("{frag_oid}/{key}: writing 'L' dentry ({})", rb.ino);
                if !dry_run {
                    write_vals.insert(key, compose_remote_dentry(rb.dnfirst, rb.ino, rb.d_type));
                    consumed_inos.insert(rb.ino);
                }
            } else {
                log::info!("{frag_oid}/{key}: skipped (version)");
            }
        }

        // tombstones carry no version either, so they get the hard link
        // treatment: only honour them when the journaled fragment is newer
        let mut rm_keys = BTreeSet::new();
        for nb in &bits.dnull {
            let key = dentry_key(&nb.dn, nb.dnlast);
            if old_fnode_version < lump.fnode.version {
                log::info!("{frag_oid}/{key}: removing dentry");
                if !dry_run {
                    rm_keys.insert(key);
                }
            } else {
                log::info!("{frag_oid}/{key}: removal skipped (version)");
            }
        }

        if !write_vals.is_empty() {
            store.omap_set(&frag_oid, &write_vals)?;
        }
        if !rm_keys.is_empty() {
            store.omap_rm_keys(&frag_oid, &rm_keys)?;
        }
    }

    /* Only after the dirlumps does the rootless pass run: inodes without an
       ancestor in this event still carry stat updates clients rely on to
       judge directory completeness. */
    for fb in &metablob.roots {
        let root_oid = inode_object_name(fb.inode.ino);
        log::debug!("updating root {} ({root_oid})", fb.inode.ino);

        let mut write_root_ino = false;
        match store.read(&root_oid, 1 << 22, 0) {
            Err(e) if e.is_not_found() => {
                log::debug!("{root_oid}: does not exist, will create");
                write_root_ino = true;
            }
            Ok(raw) => match decode_inode_object(&raw) {
                Ok(old_inode) => {
                    log::debug!(
                        "{root_oid}: existing v{} vs journal v{}",
                        old_inode.inode.version,
                        fb.inode.version
                    );
                    write_root_ino = old_inode.inode.version < fb.inode.version;
                }
                Err(e) => {
                    log::warn!("{root_oid}: unreadable ({e}), overwriting");
                    write_root_ino = true;
                }
            },
            Err(e) => return Err(e),
        }

        if write_root_ino {
            log::info!("{root_oid}: writing root inode v{}", fb.inode.version);
            if !dry_run {
                let bl = compose_inode_object(&fb.to_inode_store());
                store.write_full(&root_oid, &bl)?;
            }
        } else {
            log::info!("{root_oid}: skipped (version)");
        }
    }

    Ok(())
}

/// Remove every ino in `inos` from the free tables of all `in_ranks`
/// ranks, bumping each modified table's version by one. Errors are
/// recorded per rank and iteration continues; the first error is returned.
pub fn consume_inos<S: ObjectStore>(
    store: &S,
    in_ranks: u64,
    inos: &BTreeSet<InodeNo>,
) -> RuntimeResult<()> {
    let mut first_err = None;
    for rank in 0..in_ranks {
        if let Err(e) = consume_rank(store, rank, inos) {
            log::error!(
                "unable to update inotable for rank {rank}: {e} ({} inos)",
                inos.len()
            );
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn consume_rank<S: ObjectStore>(
    store: &S,
    rank: Rank,
    inos: &BTreeSet<InodeNo>,
) -> RuntimeResult<()> {
    let oid = inotable_object_name(rank);
    let raw = store.read(&oid, 1 << 22, 0)?;
    let (version, mut table) = InoTable::decode_object(&raw)?;
    let mut modified = false;
    for ino in inos {
        if table.force_consume(*ino) {
            log::info!("{oid}: used ino {ino} requires table update");
            modified = true;
        }
    }
    if modified {
        log::info!("{oid}: writing modified table v{} -> v{}", version, version + 1);
        store.write_full(&oid, &InoTable::compose_object(version + 1, &table))?;
    }
    Ok(())
}
