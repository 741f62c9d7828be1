/*
 * Created on Fri May 23 2025
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

//! # reefjt
//!
//! Offline inspection and recovery tool for the ReefFS metadata journal.
//! It reads the journal objects directly out of a (fenced) metadata pool,
//! so the metadata server for the rank being operated on MUST be stopped
//! before any mutating command runs.

#[macro_use]
mod util;
mod cli;
mod config;
mod encoding;
mod error;
mod journal;
mod mds;
mod mem;
mod ops;
mod store;

use {
    crate::{error::RuntimeResult, store::pool::FsPool},
    env_logger::Builder,
    libreef::util::terminal,
    std::{env, process},
};

#[cfg(all(not(target_env = "msvc"), not(miri)))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
/// Jemallocator - the default memory allocator for platforms other than msvc
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    Builder::new()
        .parse_filters(&env::var("REEF_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();
    util::interrupt::install();

    let args: Vec<String> = env::args().skip(1).collect();
    let (globals, command) = match cli::parse(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            cli::usage();
            let _ = terminal::write_error(format!("\n{e}\n"));
            process::exit(e.errno());
        }
    };
    let cfg = match config::resolve(&globals) {
        Ok(cfg) => cfg,
        Err(e) => {
            let _ = terminal::write_error(format!("{e}\n"));
            process::exit(libc::EINVAL);
        }
    };
    if let Err(e) = run(&cfg, command) {
        let _ = terminal::write_error(format!("{e}\n"));
        process::exit(e.errno());
    }
}

fn run(cfg: &config::Config, command: cli::Command) -> RuntimeResult<()> {
    let store = FsPool::open(&cfg.pool)?;
    match command {
        cli::Command::Journal(cmd) => ops::main_journal(&store, cfg, cmd),
        cli::Command::Header(cmd) => ops::main_header(&store, cfg, cmd),
        cli::Command::Event(cmd) => ops::main_event(&store, cfg, cmd),
    }
}
