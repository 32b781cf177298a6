#![allow(unknown_lints)] // non_local_definitions isn't in Rust 1.70
#![allow(non_local_definitions)]
//! Error types that can be emitted from this library.

use displaydoc::Display;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::io;
use std::num::TryFromIntError;
use thiserror::Error;

/// Generic result type with [`ZipError`] as its error variant.
pub type ZipResult<T> = Result<T, ZipError>;

/// The class of ZIP64 requirement a write hit under [`crate::write::Zip64Policy::Never`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Zip64RequiredKind {
    /// a single entry's compressed or uncompressed size exceeds 0xFFFFFFFF
    EntrySize,
    /// the archive's central directory offset or size exceeds 0xFFFFFFFF
    ArchiveTooBig,
    /// the archive holds more than 0xFFFF entries
    TooManyEntries,
}

impl fmt::Display for Zip64RequiredKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Zip64RequiredKind::EntrySize => "entry size exceeds the 32-bit limit",
            Zip64RequiredKind::ArchiveTooBig => "archive exceeds the 32-bit size limit",
            Zip64RequiredKind::TooManyEntries => "archive exceeds 0xFFFF entries",
        };
        f.write_str(s)
    }
}

/// Error type for this crate.
#[derive(Debug, Display, Error)]
#[non_exhaustive]
pub enum ZipError {
    /// i/o error: {0}
    Io(#[from] io::Error),

    /// invalid Zip archive: {0}
    InvalidArchive(Cow<'static, str>),

    /// unsupported Zip archive: {0}
    UnsupportedArchive(Cow<'static, str>),

    /// specified file not found in archive
    FileNotFound(Box<str>),

    /// compression method {0} is not supported by this build
    UnsupportedMethod(u16),

    /// ZIP64 support is required ({kind}), but the writer policy forbids it
    Zip64Required {
        kind: Zip64RequiredKind,
        entry: Option<Box<str>>,
    },

    /// archive is truncated: expected more data than the source provided
    TruncatedArchive,

    /// bad record signature at offset {offset}: expected {expected:#010x}, found {found:#010x}
    BadSignature {
        expected: u32,
        found: u32,
        offset: u64,
    },

    /// checksum mismatch: expected crc32 {expected:#010x}, computed {found:#010x}
    BadChecksum { expected: u32, found: u32 },

    /// invalid extra field: {0}
    InvalidExtraField(Cow<'static, str>),

    /// invalid argument: {0}
    InvalidArgument(Cow<'static, str>),
}

pub(crate) fn invalid_archive<T, M: Into<Cow<'static, str>>>(message: M) -> ZipResult<T> {
    Err(ZipError::InvalidArchive(message.into()))
}

pub(crate) fn invalid_extra_field<T, M: Into<Cow<'static, str>>>(message: M) -> ZipResult<T> {
    Err(ZipError::InvalidExtraField(message.into()))
}

pub(crate) fn invalid_argument<T, M: Into<Cow<'static, str>>>(message: M) -> ZipResult<T> {
    Err(ZipError::InvalidArgument(message.into()))
}

macro_rules! invalid {
    ($fmt_string:literal) => {{
        return $crate::result::invalid_archive($fmt_string);
    }};
    ($fmt_string:literal, $($param:expr),+) => {{
        return $crate::result::invalid_archive(format!($fmt_string, $($param),+));
    }};
}
pub(crate) use invalid;

impl From<ZipError> for io::Error {
    fn from(err: ZipError) -> io::Error {
        let kind = match &err {
            ZipError::Io(err) => err.kind(),
            ZipError::InvalidArchive(_) => io::ErrorKind::InvalidData,
            ZipError::UnsupportedArchive(_) => io::ErrorKind::Unsupported,
            ZipError::FileNotFound(_) => io::ErrorKind::NotFound,
            ZipError::UnsupportedMethod(_) => io::ErrorKind::Unsupported,
            ZipError::Zip64Required { .. } => io::ErrorKind::InvalidInput,
            ZipError::TruncatedArchive => io::ErrorKind::UnexpectedEof,
            ZipError::BadSignature { .. } => io::ErrorKind::InvalidData,
            ZipError::BadChecksum { .. } => io::ErrorKind::InvalidData,
            ZipError::InvalidExtraField(_) => io::ErrorKind::InvalidData,
            ZipError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
        };

        io::Error::new(kind, err)
    }
}

/// Error type for time conversions that fall outside the MS-DOS date range.
#[derive(Debug)]
pub struct DateTimeRangeError;

// TryFromIntError is also an out-of-range error.
impl From<TryFromIntError> for DateTimeRangeError {
    fn from(_value: TryFromIntError) -> Self {
        DateTimeRangeError
    }
}

impl fmt::Display for DateTimeRangeError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "a date could not be represented within the bounds the MS-DOS date range (1980-2107)"
        )
    }
}

impl Error for DateTimeRangeError {}
