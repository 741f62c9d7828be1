/*
 * Created on Tue May 20 2025
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

//! Tool configuration, layered lowest to highest priority: built-in
//! defaults, the YAML configuration file, `REEF_*` environment variables,
//! command-line options.

use {
    crate::{cli::GlobalOpts, journal::header::DEFAULT_OBJECT_SIZE},
    core::fmt,
    serde::Deserialize,
    std::{env, fs, path::PathBuf},
};

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Configuration file could not be read
    Io(String),
    /// Configuration file could not be parsed
    Parse(String),
    /// A setting has an unusable value (or a required one is missing)
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {e}"),
            Self::Parse(e) => write!(f, "failed to parse config file: {e}"),
            Self::Invalid(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// On-disk configuration file shape
struct ConfigFile {
    pool: Option<String>,
    ranks: Option<u64>,
    object_size: Option<u64>,
}

#[derive(Debug, PartialEq)]
pub struct Config {
    /// Metadata pool directory
    pub pool: PathBuf,
    /// The rank whose journal is acted on
    pub rank: u64,
    /// Number of in-ranks in the cluster, for per-rank tables
    pub ranks: u64,
    /// Object size used when seeding fresh journal headers
    pub object_size: u64,
}

pub fn resolve(globals: &GlobalOpts) -> Result<Config, ConfigError> {
    let mut pool: Option<String> = None;
    let mut ranks = 1;
    let mut object_size = DEFAULT_OBJECT_SIZE;

    // file
    if let Some(path) = &globals.config {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let file: ConfigFile =
            serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(p) = file.pool {
            pool = Some(p);
        }
        if let Some(r) = file.ranks {
            ranks = r;
        }
        if let Some(o) = file.object_size {
            object_size = o;
        }
    }
    // environment
    if let Ok(p) = env::var("REEF_POOL") {
        pool = Some(p);
    }
    if let Ok(r) = env::var("REEF_RANKS") {
        ranks = r
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bad REEF_RANKS value '{r}'")))?;
    }
    // command line
    if let Some(p) = &globals.pool {
        pool = Some(p.clone());
    }
    let rank = globals.rank.unwrap_or(0);

    let pool = pool.ok_or_else(|| {
        ConfigError::Invalid(String::from(
            "no metadata pool configured (use --pool, REEF_POOL or a config file)",
        ))
    })?;
    if ranks == 0 {
        return Err(ConfigError::Invalid(String::from("ranks must be >= 1")));
    }
    if rank >= ranks {
        return Err(ConfigError::Invalid(format!(
            "rank {rank} out of range (cluster has {ranks} ranks)"
        )));
    }
    if object_size == 0 {
        return Err(ConfigError::Invalid(String::from("object_size must be > 0")));
    }

    Ok(Config {
        pool: PathBuf::from(pool),
        rank,
        ranks,
        object_size,
    })
}

#[cfg(test)]
mod tests {
    use super::{resolve, ConfigError};
    use crate::cli::GlobalOpts;

    #[test]
    fn pool_is_required() {
        let r = resolve(&GlobalOpts::default());
        assert!(matches!(r, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn cli_overrides() {
        let globals = GlobalOpts {
            rank: Some(0),
            config: None,
            pool: Some("/pools/meta".to_owned()),
        };
        let cfg = resolve(&globals).unwrap();
        assert_eq!(cfg.pool.to_str(), Some("/pools/meta"));
        assert_eq!(cfg.rank, 0);
        assert_eq!(cfg.ranks, 1);
    }

    #[test]
    fn rank_must_be_in_cluster() {
        let globals = GlobalOpts {
            rank: Some(3),
            config: None,
            pool: Some("/pools/meta".to_owned()),
        };
        assert!(matches!(
            resolve(&globals),
            Err(ConfigError::Invalid(_))
        ));
    }
}
