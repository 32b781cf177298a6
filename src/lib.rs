//! A reader and writer for the ZIP archive format: PKWARE local/central headers, ZIP64
//! extensions for archives and entries beyond the 32-bit limits, split (multi-volume) archives,
//! the extensible extra-field system, and the Stored/Deflate/Deflate64/Bzip2/Imploding/Unshrinking
//! compression methods.
//!
//! This crate covers the archive format itself: it does not provide a higher-level
//! archiver/extractor facade, a CLI, or generic directory-walking utilities, and it does not
//! enforce the legacy ZipCrypto or AES encryption schemes (their headers are parsed, but
//! encrypted entries are rejected rather than decrypted).

mod compression;
mod cp437;
mod crc32;
mod extra_fields;
mod legacy;
mod primitive;
mod result;
pub mod read;
mod spec;
mod types;
pub mod write;
mod zipindex;

pub use compression::{CompressionLevel, CompressionMethod};
pub use extra_fields::{ExtraField, ParsePolicy};
pub use read::stream::{can_read_entry_data, StreamingArchive, StreamingZipEntry};
pub use read::{SplitArchiveReader, ZipArchive, ZipFile};
pub use result::{Zip64RequiredKind, ZipError, ZipResult};
pub use types::{DateTime, NameSource, System};
pub use write::{
    EncryptionMethod, ExtendedFileOptions, FileOptionExtension, FileOptions, FileSplitSink,
    SplitSink, SplitWriter, StreamingZipWriter, Zip64Policy, ZipWriter,
};
