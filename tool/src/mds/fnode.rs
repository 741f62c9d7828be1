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

use {
    crate::{
        encoding::{dec, enc},
        error::RuntimeResult,
        mds::types::Version,
        mem::BufferedScanner,
    },
    serde_json::json,
};

/// The header of a directory fragment, stored in the omap header of the
/// fragment's backing object. `version` gates every overwrite of the
/// fragment's state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fnode {
    pub version: Version,
    pub fragstat: FragStat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FragStat {
    pub nfiles: u64,
    pub nsubdirs: u64,
}

impl Fnode {
    pub fn with_version(version: Version) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }
    pub fn encode(&self, buf: &mut Vec<u8>) {
        enc::envelope(buf, 1, 1, |buf| {
            enc::u64_le(buf, self.version);
            enc::u64_le(buf, self.fragstat.nfiles);
            enc::u64_le(buf, self.fragstat.nsubdirs);
        })
    }
    pub fn decode(s: &mut BufferedScanner) -> RuntimeResult<Self> {
        let env = dec::envelope(s, 1)?;
        let version = s.try_next_u64_le()?;
        let nfiles = s.try_next_u64_le()?;
        let nsubdirs = s.try_next_u64_le()?;
        env.finish(s)?;
        Ok(Self {
            version,
            fragstat: FragStat { nfiles, nsubdirs },
        })
    }
    pub fn decode_buf(buf: &[u8]) -> RuntimeResult<Self> {
        Self::decode(&mut BufferedScanner::new(buf))
    }
    pub fn dump(&self) -> serde_json::Value {
        json!({
            "version": self.version,
            "fragstat": { "nfiles": self.fragstat.nfiles, "nsubdirs": self.fragstat.nsubdirs },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Fnode, FragStat};

    #[test]
    fn fnode_roundtrip() {
        let f = Fnode {
            version: 77,
            fragstat: FragStat {
                nfiles: 3,
                nsubdirs: 1,
            },
        };
        let mut buf = vec![];
        f.encode(&mut buf);
        assert_eq!(Fnode::decode_buf(&buf).unwrap(), f);
    }

    #[test]
    fn fnode_rejects_garbage() {
        assert!(Fnode::decode_buf(b"definitely not an fnode").is_err());
        assert!(Fnode::decode_buf(&[]).is_err());
    }
}
