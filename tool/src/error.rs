/*
 * Created on Tue Mar 04 2025
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

use {crate::config::ConfigError, core::fmt, std::io};

pub type RuntimeResult<T> = Result<T, Error>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
/// Record framing errors raised by the journal stream
pub enum FramingError {
    /// The leading sentinel did not match
    BadPreamble,
    /// The payload length is implausible for this journal
    BadLength,
    /// The trailing start pointer disagrees with the record position
    BadTrailer,
}

#[derive(Debug, PartialEq, Eq, Clone)]
/// Payload decode errors (events, metablobs and backing-store records)
pub enum DecodeError {
    /// The leading event type tag is not one we know
    UnknownEventType(u32),
    /// Encoded with a revision newer than we can understand
    UnsupportedVersion { found: u8, max: u8 },
    /// Ran out of bytes mid-structure
    ShortPayload,
    /// A magic string did not match
    BadMagic,
    /// Bytes that cannot be valid for the field being decoded
    IllegalData,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// Object store failures
pub enum BackendError {
    /// The object (or key) does not exist
    NotFound,
    /// Any other store failure, carried as an errno
    Errno(i32),
}

#[derive(Debug, PartialEq)]
pub enum Error {
    Framing(FramingError),
    Decode(DecodeError),
    Backend(BackendError),
    Argument(String),
    Precondition(String),
    Config(ConfigError),
}

direct_from! {
    Error => {
        FramingError as Framing,
        DecodeError as Decode,
        BackendError as Backend,
        ConfigError as Config,
    }
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Backend(BackendError::NotFound))
    }
    /// Map to the errno the process should exit with
    pub fn errno(&self) -> i32 {
        match self {
            Error::Framing(_) => libc::EIO,
            Error::Decode(_) => libc::EINVAL,
            Error::Backend(BackendError::NotFound) => libc::ENOENT,
            Error::Backend(BackendError::Errno(e)) => *e,
            Error::Argument(_) | Error::Precondition(_) | Error::Config(_) => libc::EINVAL,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Error::Backend(BackendError::NotFound),
            _ => Error::Backend(BackendError::Errno(e.raw_os_error().unwrap_or(libc::EIO))),
        }
    }
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadPreamble => write!(f, "bad record preamble"),
            Self::BadLength => write!(f, "bad record length"),
            Self::BadTrailer => write!(f, "bad record trailer"),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEventType(t) => write!(f, "unknown event type {t}"),
            Self::UnsupportedVersion { found, max } => {
                write!(f, "encoding revision {found} is newer than supported ({max})")
            }
            Self::ShortPayload => write!(f, "payload truncated"),
            Self::BadMagic => write!(f, "magic string mismatch"),
            Self::IllegalData => write!(f, "illegal data in payload"),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "object not found"),
            Self::Errno(e) => write!(f, "backend error (errno {e})"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framing(e) => write!(f, "framing error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::Backend(e) => write!(f, "backend error: {e}"),
            Self::Argument(e) => write!(f, "argument error: {e}"),
            Self::Precondition(e) => write!(f, "precondition failed: {e}"),
            Self::Config(e) => write!(f, "configuration error: {e}"),
        }
    }
}

impl std::error::Error for Error {}
