//! Forward-only reading of a ZIP byte stream that can't seek: entries are discovered one at a
//! time by scanning local file headers, instead of starting from the central directory.

use std::cell::RefCell;
use std::io::{self, Read};
use std::mem;
use std::rc::Rc;

use crc32fast::Hasher;

use super::{construct_decoder, EntryReader};
use crate::compression::CompressionMethod;
use crate::crc32::Crc32Reader;
use crate::extra_fields::ExtraField;
use crate::result::{ZipError, ZipResult};
use crate::spec::{self, Block};
use crate::types::{DateTime, ZipFileData, ZipLocalEntryBlock};

const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;

/// Whether an entry's compressed data can actually be decoded by this build. Encrypted entries
/// and methods without a decoder both return `false`; the catalog can still be walked (the name,
/// size, and other metadata are always available), but reading the content would fail.
pub fn can_read_entry_data(data: &ZipFileData) -> bool {
    !data.encrypted && data.compression_method.can_decode()
}

/// A forward-only reader over a ZIP byte stream, yielding one entry at a time.
pub struct StreamingArchive<R> {
    reader: R,
    /// Compressed bytes of the current entry the caller hasn't read yet. Drained at the top of
    /// the next [`Self::next_entry`] call rather than on `Drop`, since `Drop` can't report the
    /// I/O errors draining might hit.
    remaining_before_next_entry: u64,
}

impl<R> StreamingArchive<R> {
    /// Wraps a forward-only reader for streaming access.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            remaining_before_next_entry: 0,
        }
    }

    /// Consumes the archive, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> StreamingArchive<R> {
    /// Reads the next entry's header and returns a reader positioned at its (decompressed, CRC32-
    /// checked) content, or `None` once the central directory is reached.
    ///
    /// Entries using a deferred data descriptor (general-purpose bit 3) must be read to
    /// completion before the next call: this reader has no way to skip ahead to an entry whose
    /// compressed size isn't known until its trailing descriptor has been read.
    pub fn next_entry(&mut self) -> ZipResult<Option<StreamingZipEntry<impl Read + '_>>> {
        let Self {
            reader,
            remaining_before_next_entry,
        } = self;
        if *remaining_before_next_entry > 0 {
            io::copy(
                &mut reader.by_ref().take(*remaining_before_next_entry),
                &mut io::sink(),
            )?;
            *remaining_before_next_entry = 0;
        }

        let mut block_bytes = [0u8; mem::size_of::<ZipLocalEntryBlock>()];
        if let Err(e) = reader.read_exact(&mut block_bytes) {
            return if e.kind() == io::ErrorKind::UnexpectedEof {
                // A well-formed archive's local-entries section is always followed by a central
                // directory, even an empty one: hitting raw EOF here means the stream ended
                // before that, i.e. the archive was cut short.
                Err(ZipError::TruncatedArchive)
            } else {
                Err(e.into())
            };
        }

        let signature = u32::from_le_bytes(block_bytes[..4].try_into().unwrap());
        match signature {
            spec::LOCAL_FILE_HEADER_SIGNATURE => {}
            spec::CENTRAL_DIRECTORY_HEADER_SIGNATURE => return Ok(None),
            other => {
                return Err(ZipError::BadSignature {
                    expected: spec::LOCAL_FILE_HEADER_SIGNATURE,
                    found: other,
                    offset: 0,
                })
            }
        }

        let block = ZipLocalEntryBlock::interpret(block_bytes.to_vec().into_boxed_slice())?;
        let data = ZipFileData::from_local_block(block, reader)?;

        if !can_read_entry_data(&data) {
            return if data.encrypted {
                Err(ZipError::UnsupportedArchive(
                    "Encrypted files are not supported".into(),
                ))
            } else {
                Err(ZipError::UnsupportedMethod(
                    data.compression_method.to_u16(),
                ))
            };
        }

        if data.using_data_descriptor {
            if matches!(data.compression_method, CompressionMethod::Stored) {
                return Err(ZipError::UnsupportedArchive(
                    "a Stored entry with a deferred data descriptor has no way to know where \
                     its data ends"
                        .into(),
                ));
            }
            #[cfg(feature = "legacy-zip")]
            if matches!(
                data.compression_method,
                CompressionMethod::Imploding | CompressionMethod::Unshrinking
            ) {
                return Err(ZipError::UnsupportedArchive(
                    "legacy compression methods can't be streamed with a deferred data \
                     descriptor"
                        .into(),
                ));
            }

            let zip64 = data
                .extra_fields
                .iter()
                .any(|f| matches!(f, ExtraField::Zip64(_)));

            // Throttled to one byte per underlying read so the decoder can never consume past
            // the logical end of its compressed stream into the trailing data descriptor: we
            // have no other way to know where that boundary falls ahead of time.
            let shared = Shared(Rc::new(RefCell::new(reader)));
            let decoder = construct_decoder(
                data.compression_method,
                data.uncompressed_size,
                data.general_purpose_bit_flag,
                shared.clone(),
            )?;
            let body = DescriptorValidatingReader {
                decoder,
                raw: shared,
                zip64,
                hasher: Hasher::new(),
                bytes_out: 0,
                finished: false,
            };
            return Ok(Some(StreamingZipEntry {
                reader: EntryBody::Deferred(body),
                data,
            }));
        }

        let bounded = BoundedReader::new(data.compressed_size, remaining_before_next_entry, reader);
        let decoder = construct_decoder(
            data.compression_method,
            data.uncompressed_size,
            data.general_purpose_bit_flag,
            bounded,
        )?;
        let checked = Crc32Reader::new(decoder, data.crc32);

        Ok(Some(StreamingZipEntry {
            reader: EntryBody::Bounded(checked),
            data,
        }))
    }
}

/// Bounds reads to an entry's declared compressed size, and (via [`Drop`]) reports how much of
/// that declared size the caller left unread, so [`StreamingArchive::next_entry`] can skip past
/// it without having to decompress it.
struct BoundedReader<'a, R> {
    full_extent: usize,
    current_progress: usize,
    remaining_to_notify: &'a mut u64,
    inner: &'a mut R,
}

impl<'a, R> BoundedReader<'a, R> {
    fn new(extent: u64, remaining_to_notify: &'a mut u64, inner: &'a mut R) -> Self {
        Self {
            full_extent: extent.try_into().unwrap(),
            current_progress: 0,
            remaining_to_notify,
            inner,
        }
    }

    fn remaining(&self) -> usize {
        self.full_extent - self.current_progress
    }
}

impl<'a, R: Read> Read for BoundedReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = self.remaining().min(buf.len());
        if to_read == 0 {
            return self.inner.read(&mut []);
        }

        let count = self.inner.read(&mut buf[..to_read])?;
        if count == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive is truncated: fewer bytes available than its header declared",
            ));
        }
        self.current_progress += count;
        Ok(count)
    }
}

impl<'a, R> Drop for BoundedReader<'a, R> {
    fn drop(&mut self) {
        *self.remaining_to_notify = self.remaining() as u64;
    }
}

/// A cheaply-cloned handle onto the archive's reader that always reads at most one byte per
/// call. See the comment at its one construction site for why.
struct Shared<'a, R>(Rc<RefCell<&'a mut R>>);

impl<'a, R> Clone for Shared<'a, R> {
    fn clone(&self) -> Self {
        Shared(Rc::clone(&self.0))
    }
}

impl<'a, R: Read> Read for Shared<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.0.borrow_mut().read(&mut buf[..1])
    }
}

/// Wraps a decoder whose compressed size wasn't known up front: once the decoder reports EOF,
/// reads the trailing data descriptor and validates the CRC32 and uncompressed size against it,
/// since the local header's own copies of those fields were just placeholders.
struct DescriptorValidatingReader<'a, D, R> {
    decoder: D,
    raw: Shared<'a, R>,
    zip64: bool,
    hasher: Hasher,
    bytes_out: u64,
    finished: bool,
}

impl<'a, D: Read, R: Read> Read for DescriptorValidatingReader<'a, D, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }

        let count = self.decoder.read(buf)?;
        if count > 0 {
            self.hasher.update(&buf[..count]);
            self.bytes_out += count as u64;
            return Ok(count);
        }

        self.finished = true;
        let (crc32, _compressed_size, uncompressed_size) =
            read_data_descriptor(&mut self.raw, self.zip64)?;
        if crc32 != self.hasher.clone().finalize() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Invalid checksum"));
        }
        if uncompressed_size != self.bytes_out {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "data descriptor's uncompressed size disagrees with the bytes actually produced",
            ));
        }
        Ok(0)
    }
}

fn read_data_descriptor<R: Read>(reader: &mut R, zip64: bool) -> io::Result<(u32, u64, u64)> {
    let mut word = [0u8; 4];
    reader.read_exact(&mut word)?;
    let mut crc32 = u32::from_le_bytes(word);
    if crc32 == DATA_DESCRIPTOR_SIGNATURE {
        reader.read_exact(&mut word)?;
        crc32 = u32::from_le_bytes(word);
    }

    let (compressed_size, uncompressed_size) = if zip64 {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf)?;
        let compressed = u64::from_le_bytes(buf);
        reader.read_exact(&mut buf)?;
        let uncompressed = u64::from_le_bytes(buf);
        (compressed, uncompressed)
    } else {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        let compressed = u32::from_le_bytes(buf) as u64;
        reader.read_exact(&mut buf)?;
        let uncompressed = u32::from_le_bytes(buf) as u64;
        (compressed, uncompressed)
    };

    Ok((crc32, compressed_size, uncompressed_size))
}

enum EntryBody<'a, R> {
    Bounded(Crc32Reader<EntryReader<BoundedReader<'a, R>>>),
    Deferred(DescriptorValidatingReader<'a, EntryReader<Shared<'a, R>>, R>),
}

impl<'a, R: Read> Read for EntryBody<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryBody::Bounded(r) => r.read(buf),
            EntryBody::Deferred(r) => r.read(buf),
        }
    }
}

/// One entry read from a [`StreamingArchive`].
///
/// Unlike [`super::ZipFile`], metadata that's only available from the central directory (the
/// comment, and Unix permission bits on most writers) isn't populated here: it's set to an empty
/// string and `None` respectively.
pub struct StreamingZipEntry<R> {
    data: ZipFileData,
    reader: R,
}

impl<R: Read> Read for StreamingZipEntry<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R> StreamingZipEntry<R> {
    /// The entry's name, decoded as UTF-8 or CP437 per its general-purpose bit flag.
    pub fn name(&self) -> &str {
        &self.data.file_name
    }

    /// A path sanitized for extraction: no absolute paths, `..` components, or drive prefixes.
    pub fn mangled_name(&self) -> std::path::PathBuf {
        self.data.file_name_sanitized()
    }

    /// The entry's name as a relative path, or `None` if it isn't safely extractable as one.
    pub fn enclosed_name(&self) -> Option<std::path::PathBuf> {
        self.data.enclosed_name()
    }

    /// Uncompressed size, in bytes, as declared by the local header (or, for a deferred data
    /// descriptor, validated against the descriptor once the entry has been fully read).
    pub fn size(&self) -> u64 {
        self.data.uncompressed_size
    }

    /// Compressed size, in bytes.
    pub fn compressed_size(&self) -> u64 {
        self.data.compressed_size
    }

    /// The method this entry was compressed with.
    pub fn compression(&self) -> CompressionMethod {
        self.data.compression_method
    }

    /// Last-modified timestamp.
    pub fn last_modified(&self) -> DateTime {
        self.data.last_modified_time
    }

    /// True if the entry's name ends with `/`.
    pub fn is_dir(&self) -> bool {
        self.data.file_name.ends_with('/')
    }

    /// True if the entry isn't a directory.
    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    /// The entry's declared CRC32 (validated against decompressed output once reading reaches
    /// EOF).
    pub fn crc32(&self) -> u32 {
        self.data.crc32
    }

    /// The parsed extra-field records attached to this entry's local header.
    pub fn extra_data_fields(&self) -> impl Iterator<Item = &ExtraField> {
        self.data.extra_fields.iter()
    }
}
