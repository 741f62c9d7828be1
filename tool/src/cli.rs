/*
 * Created on Fri May 09 2025
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

use crate::{
    error::{Error, RuntimeResult},
    journal::filter::{parse_u64, JournalFilter},
};

pub fn usage() {
    eprintln!(
        "ReefFS journal tool v{} | {}

Usage:
  reefjt [options] journal <inspect|import <path>|export <path>|reset [--force]>
  reefjt [options] header <get|set <trimmed_pos|expire_pos|write_pos> <value>>
  reefjt [options] event <effect> [selector...] <output> [--path <path>] [--dry_run]
    <effect>: get|apply|recover_dentries|splice
    <selector>:
      --range=<start>..<end>
      --path=<substring>
      --inode=<integer>
      --type=<UPDATE|OPEN|SESSION|NOOP|RESETJOURNAL>
      --frag=<ino>.<frag> [--dname=<dentry string>]
      --client=<session id integer>
    <output>: summary|list|binary|json

Options:
  --config=<path>  Tool configuration file
  --pool=<dir>     Metadata pool directory
  --rank=<int>     Journal rank (default 0)",
        libreef::VERSION,
        libreef::URL
    );
}

#[derive(Debug, Default)]
pub struct GlobalOpts {
    pub rank: Option<u64>,
    pub config: Option<String>,
    pub pool: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum JournalCmd {
    Inspect,
    Import(String),
    Export(String),
    Reset { force: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaderField {
    TrimmedPos,
    ExpirePos,
    WritePos,
}

impl HeaderField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TrimmedPos => "trimmed_pos",
            Self::ExpirePos => "expire_pos",
            Self::WritePos => "write_pos",
        }
    }
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "trimmed_pos" => Self::TrimmedPos,
            "expire_pos" => Self::ExpirePos,
            "write_pos" => Self::WritePos,
            _ => return None,
        })
    }
}

#[derive(Debug, PartialEq)]
pub enum HeaderCmd {
    Get,
    Set { field: HeaderField, value: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventEffect {
    Get,
    Apply,
    RecoverDentries,
    Splice,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputStyle {
    Summary,
    List,
    Binary,
    Json,
}

#[derive(Debug)]
pub struct EventCmd {
    pub effect: EventEffect,
    pub filter: JournalFilter,
    pub output: OutputStyle,
    pub output_path: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum Command {
    Journal(JournalCmd),
    Header(HeaderCmd),
    Event(EventCmd),
}

fn missing(what: &str) -> Error {
    Error::Argument(format!("missing {what}"))
}

/// Parse the full command line (program name already stripped)
pub fn parse(args: &[String]) -> RuntimeResult<(GlobalOpts, Command)> {
    let mut globals = GlobalOpts::default();
    let mut it = args.iter().peekable();

    // leading options, then the mode word
    let mode = loop {
        let Some(tok) = it.next() else {
            return Err(missing("mode [journal|header|event]"));
        };
        let Some(rest) = tok.strip_prefix("--") else {
            break tok.as_str();
        };
        let (key, value) = split_option(rest, &mut it)?;
        match key {
            "rank" => globals.rank = Some(parse_u64(&value)?),
            "config" => globals.config = Some(value),
            "pool" => globals.pool = Some(value),
            _ => return Err(Error::Argument(format!("unknown option '--{key}'"))),
        }
    };

    let command = match mode {
        "journal" => Command::Journal(parse_journal(&mut it)?),
        "header" => Command::Header(parse_header(&mut it)?),
        "event" => Command::Event(parse_event(&mut it)?),
        other => return Err(Error::Argument(format!("bad command '{other}'"))),
    };
    if let Some(extra) = it.next() {
        return Err(Error::Argument(format!("unexpected argument '{extra}'")));
    }
    Ok((globals, command))
}

type ArgIter<'a> = std::iter::Peekable<std::slice::Iter<'a, String>>;

fn split_option<'a>(rest: &'a str, it: &mut ArgIter) -> RuntimeResult<(&'a str, String)> {
    match rest.split_once('=') {
        Some((key, value)) => Ok((key, value.to_owned())),
        None => {
            let value = it
                .next()
                .ok_or_else(|| Error::Argument(format!("option '--{rest}' needs a value")))?;
            Ok((rest, value.clone()))
        }
    }
}

fn parse_journal(it: &mut ArgIter) -> RuntimeResult<JournalCmd> {
    let cmd = it.next().ok_or_else(|| missing("journal command"))?;
    Ok(match cmd.as_str() {
        "inspect" => JournalCmd::Inspect,
        "import" => JournalCmd::Import(it.next().ok_or_else(|| missing("path"))?.clone()),
        "export" => JournalCmd::Export(it.next().ok_or_else(|| missing("path"))?.clone()),
        "reset" => {
            let force = match it.peek() {
                Some(tok) if tok.as_str() == "--force" => {
                    it.next();
                    true
                }
                _ => false,
            };
            JournalCmd::Reset { force }
        }
        other => return Err(Error::Argument(format!("bad journal command '{other}'"))),
    })
}

fn parse_header(it: &mut ArgIter) -> RuntimeResult<HeaderCmd> {
    let cmd = it.next().ok_or_else(|| missing("header command [get|set]"))?;
    Ok(match cmd.as_str() {
        "get" => HeaderCmd::Get,
        "set" => {
            let field = it.next().ok_or_else(|| missing("header field"))?;
            let field = HeaderField::parse(field)
                .ok_or_else(|| Error::Argument(format!("invalid field '{field}'")))?;
            let value = parse_u64(it.next().ok_or_else(|| missing("value"))?)?;
            HeaderCmd::Set { field, value }
        }
        other => return Err(Error::Argument(format!("bad header command '{other}'"))),
    })
}

fn parse_event(it: &mut ArgIter) -> RuntimeResult<EventCmd> {
    let effect = it.next().ok_or_else(|| missing("event effect"))?;
    let effect = match effect.as_str() {
        "get" => EventEffect::Get,
        "apply" => EventEffect::Apply,
        "recover_dentries" => EventEffect::RecoverDentries,
        "splice" => EventEffect::Splice,
        other => return Err(Error::Argument(format!("unknown effect '{other}'"))),
    };
    let mut filter = JournalFilter::default();
    let mut output = None;
    let mut output_path = None;
    let mut dry_run = false;
    while let Some(tok) = it.next() {
        if let Some(rest) = tok.strip_prefix("--") {
            if rest == "dry_run" {
                dry_run = true;
                continue;
            }
            let (key, value) = split_option(rest, it)?;
            if key == "path" && output.is_some() {
                // after the output style, --path names the output target;
                // before it, it is the dentry-substring selector
                output_path = Some(value);
                continue;
            }
            if !filter.parse_option(key, &value)? {
                return Err(Error::Argument(format!("unknown option '--{key}'")));
            }
        } else {
            let style = match tok.as_str() {
                "summary" => OutputStyle::Summary,
                "list" => OutputStyle::List,
                "binary" => OutputStyle::Binary,
                "json" => OutputStyle::Json,
                other => {
                    return Err(Error::Argument(format!("unknown output '{other}'")))
                }
            };
            if output.replace(style).is_some() {
                return Err(Error::Argument(String::from("output given twice")));
            }
        }
    }
    let output = output.ok_or_else(|| missing("output [summary|list|binary|json]"))?;
    Ok(EventCmd {
        effect,
        filter,
        output,
        output_path,
        dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse, Command, EventEffect, HeaderCmd, HeaderField, JournalCmd, OutputStyle};

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn parse_journal_commands() {
        let (globals, cmd) = parse(&args("--rank=2 journal inspect")).unwrap();
        assert_eq!(globals.rank, Some(2));
        assert!(matches!(cmd, Command::Journal(JournalCmd::Inspect)));
        let (_, cmd) = parse(&args("journal reset --force")).unwrap();
        assert_eq!(cmd_journal(cmd), JournalCmd::Reset { force: true });
        let (_, cmd) = parse(&args("journal export /tmp/dump.bin")).unwrap();
        assert_eq!(
            cmd_journal(cmd),
            JournalCmd::Export("/tmp/dump.bin".to_owned())
        );
    }

    fn cmd_journal(cmd: Command) -> JournalCmd {
        match cmd {
            Command::Journal(j) => j,
            _ => panic!("expected journal command"),
        }
    }

    #[test]
    fn parse_header_set() {
        let (_, cmd) = parse(&args("header set expire_pos 0x400000")).unwrap();
        match cmd {
            Command::Header(HeaderCmd::Set { field, value }) => {
                assert_eq!(field, HeaderField::ExpirePos);
                assert_eq!(value, 0x400000);
            }
            _ => panic!("expected header set"),
        }
        assert!(parse(&args("header set bogus_pos 1")).is_err());
    }

    #[test]
    fn parse_event_with_selectors() {
        let (_, cmd) = parse(&args(
            "--pool /pools/meta event recover_dentries --type=UPDATE --inode=0x100 summary --dry_run",
        ))
        .unwrap();
        match cmd {
            Command::Event(e) => {
                assert_eq!(e.effect, EventEffect::RecoverDentries);
                assert_eq!(e.output, OutputStyle::Summary);
                assert!(e.dry_run);
                assert!(e.output_path.is_none());
            }
            _ => panic!("expected event command"),
        }
    }

    #[test]
    fn event_path_selector_vs_output_path() {
        let (_, cmd) = parse(&args("event get --path=foo json --path /tmp/out.json")).unwrap();
        match cmd {
            Command::Event(e) => {
                assert_eq!(e.output, OutputStyle::Json);
                assert_eq!(e.output_path.as_deref(), Some("/tmp/out.json"));
            }
            _ => panic!("expected event command"),
        }
    }

    #[test]
    fn rejects_trailing_garbage_and_missing_output() {
        assert!(parse(&args("journal inspect extra")).is_err());
        assert!(parse(&args("event get")).is_err());
        assert!(parse(&args("nonsense")).is_err());
    }
}
