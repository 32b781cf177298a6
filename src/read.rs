//! Reader for the ZIP archive format: a random-access [`ZipArchive`] plus the forward-only
//! [`stream`] reader for sources that can't seek.

pub mod stream;

use std::io::{self, Read, Seek, SeekFrom};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

#[cfg(feature = "bzip2")]
use bzip2::read::BzDecoder;
#[cfg(feature = "deflate64")]
use deflate64::Deflate64Decoder;
#[cfg(feature = "deflate")]
use flate2::read::DeflateDecoder;

use crate::compression::CompressionMethod;
use crate::cp437::FromCp437;
use crate::crc32::Crc32Reader;
use crate::extra_fields::{ExtraField, ParsePolicy, Zip64Needs};
#[cfg(feature = "legacy-zip")]
use crate::legacy::{implode::ImplodeDecoder, shrink::ShrinkDecoder};
use crate::result::{ZipError, ZipResult};
use crate::spec::{
    self, Block, CentralDirectoryEnd, Zip64CDELocatorBlock, Zip64CentralDirectoryEnd,
    Zip64CentralDirectoryEndLocator,
};
use crate::types::{
    normalize_name_separators, DateTime, NameSource, System, ZipEntryBlock, ZipFileData,
    ZipLocalEntryBlock,
};
use crate::zipindex::ZipIndex;

struct Shared {
    index: ZipIndex,
    /// Byte length of whatever precedes the first record PKWARE recognizes: a self-extracting
    /// stub, or the earlier volumes' worth of bytes for an archive opened at a non-zero
    /// archive offset. Only the length is ever recorded; its contents are never parsed.
    offset: u64,
    comment: Box<[u8]>,
}

/// A ZIP archive opened for random access.
pub struct ZipArchive<R> {
    reader: R,
    shared: Arc<Shared>,
}

impl<R> ZipArchive<R> {
    /// Number of entries in the archive.
    pub fn len(&self) -> usize {
        self.shared.index.len()
    }

    /// True if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.shared.index.is_empty()
    }

    /// Byte offset of the first record PKWARE recognizes within the underlying source. Nonzero
    /// when bytes were prepended ahead of the archive, such as a self-extracting executable's
    /// stub; this crate never parses those bytes beyond recording how many there are.
    pub fn offset(&self) -> u64 {
        self.shared.offset
    }

    /// The archive comment, as raw bytes (not necessarily UTF-8).
    pub fn comment(&self) -> &[u8] {
        &self.shared.comment
    }

    /// Names of every entry, in central-directory order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.shared.index.keys().map(|name| name.as_ref())
    }

    /// Looks up an entry's index by exact name.
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.shared.index.get_index_of(name)
    }

    /// Looks up an entry's name by index.
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.shared
            .index
            .get_index(index)
            .map(|(name, _)| name.as_ref())
    }

    /// Consumes the archive, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Opens a ZIP archive, locating and parsing its central directory.
    pub fn new(mut reader: R) -> ZipResult<Self> {
        let (footer, cde_start_pos) = CentralDirectoryEnd::find_and_parse(&mut reader)?;
        let (directory_start, number_of_files, archive_offset) =
            locate_central_directory(&mut reader, &footer, cde_start_pos)?;

        reader.seek(SeekFrom::Start(directory_start))?;
        let mut entries = Vec::with_capacity(number_of_files as usize);
        for _ in 0..number_of_files {
            entries.push(read_central_header(&mut reader, archive_offset)?);
        }

        Ok(ZipArchive {
            reader,
            shared: Arc::new(Shared {
                index: ZipIndex::from_vec(entries),
                offset: archive_offset,
                comment: footer.zip_file_comment.into_boxed_slice(),
            }),
        })
    }

    /// Opens the entry with the given name for reading.
    pub fn by_name(&mut self, name: &str) -> ZipResult<ZipFile<'_, R>> {
        let index = self
            .shared
            .index
            .get_index_of(name)
            .ok_or_else(|| ZipError::FileNotFound(name.into()))?;
        self.by_index(index)
    }

    /// Opens the entry at the given index for reading.
    pub fn by_index(&mut self, index: usize) -> ZipResult<ZipFile<'_, R>> {
        let (_, data) = self.shared.index.get_index(index).ok_or_else(|| {
            ZipError::FileNotFound(format!("no entry at index {index}").into_boxed_str())
        })?;
        open_entry(data, &mut self.reader)
    }
}

/// Resolves the on-disk start and entry count of the central directory, preferring a ZIP64
/// end-of-central-directory record over the fixed-width one if a locator is present immediately
/// before the fixed-width record.
fn locate_central_directory<R: Read + Seek>(
    reader: &mut R,
    footer: &CentralDirectoryEnd,
    cde_start_pos: u64,
) -> ZipResult<(u64, u64, u64)> {
    let locator_size = mem::size_of::<Zip64CDELocatorBlock>() as u64;
    if let Some(locator_start) = cde_start_pos.checked_sub(locator_size) {
        reader.seek(SeekFrom::Start(locator_start))?;
        if let Ok(locator) = Zip64CentralDirectoryEndLocator::parse(reader) {
            let (zip64_footer, archive_offset) = Zip64CentralDirectoryEnd::find_and_parse(
                reader,
                locator.end_of_central_directory_offset,
                locator_start,
            )?
            .into_iter()
            .next()
            .expect("find_and_parse returns Err rather than an empty Ok");

            let directory_start = zip64_footer
                .central_directory_offset
                .checked_add(archive_offset)
                .ok_or_else(|| {
                    ZipError::InvalidArchive("central directory offset overflows u64".into())
                })?;
            return Ok((directory_start, zip64_footer.number_of_files, archive_offset));
        }
    }

    let needs_zip64 = footer.central_directory_offset == u32::MAX
        || footer.central_directory_size == u32::MAX
        || footer.number_of_files == u16::MAX
        || footer.number_of_files_on_this_disk == u16::MAX;
    if needs_zip64 {
        return Err(ZipError::InvalidArchive(
            "end of central directory is a ZIP64 sentinel, but no ZIP64 locator was found".into(),
        ));
    }

    let archive_offset = cde_start_pos
        .checked_sub(footer.central_directory_size as u64)
        .and_then(|x| x.checked_sub(footer.central_directory_offset as u64))
        .ok_or_else(|| {
            ZipError::InvalidArchive("invalid central directory size or offset".into())
        })?;

    let directory_start = (footer.central_directory_offset as u64)
        .checked_add(archive_offset)
        .ok_or_else(|| {
            ZipError::InvalidArchive("central directory start overflows u64".into())
        })?;

    Ok((directory_start, footer.number_of_files as u64, archive_offset))
}

/// Parses one fixed-width central-directory header plus its variable-length tail, resolving
/// ZIP64 sentinels against the entry's extra fields and adjusting the stored header offset by
/// `archive_offset`.
fn read_central_header<R: Read>(reader: &mut R, archive_offset: u64) -> ZipResult<ZipFileData> {
    let ZipEntryBlock {
        version_made_by,
        flags,
        compression_method,
        last_mod_time,
        last_mod_date,
        crc32,
        compressed_size,
        uncompressed_size,
        file_name_length,
        extra_field_length,
        file_comment_length,
        internal_file_attributes,
        external_file_attributes,
        offset,
        ..
    } = ZipEntryBlock::parse(reader)?;

    let encrypted = flags & 1 == 1;
    let is_utf8 = flags & (1 << 11) != 0;
    let using_data_descriptor = flags & (1 << 3) != 0;

    let mut file_name_raw = vec![0u8; file_name_length as usize];
    reader.read_exact(&mut file_name_raw)?;
    let mut extra_field = vec![0u8; extra_field_length as usize];
    reader.read_exact(&mut extra_field)?;
    let mut file_comment_raw = vec![0u8; file_comment_length as usize];
    reader.read_exact(&mut file_comment_raw)?;

    let decode = |raw: &[u8]| -> Box<str> {
        if is_utf8 {
            String::from_utf8_lossy(raw).into()
        } else {
            raw.from_cp437()
                .expect("cp437 decoding never fails: non-ASCII bytes take the mapped path, ASCII bytes are always valid utf-8")
                .into()
        }
    };
    let file_name = normalize_name_separators(decode(&file_name_raw));
    let file_comment = decode(&file_comment_raw);
    let name_source = if is_utf8 {
        NameSource::NameWithEfsFlag
    } else {
        NameSource::Name
    };

    #[allow(deprecated)]
    let compression_method = CompressionMethod::from_u16(compression_method);

    let zip64_needs = Zip64Needs {
        uncompressed_size: uncompressed_size == u32::MAX,
        compressed_size: compressed_size == u32::MAX,
        header_start: offset == u32::MAX,
    };
    let extra_fields =
        crate::extra_fields::parse_central(&extra_field, zip64_needs, ParsePolicy::default())?;

    let mut resolved_uncompressed_size = uncompressed_size as u64;
    let mut resolved_compressed_size = compressed_size as u64;
    let mut resolved_header_start = offset as u64;
    for field in &extra_fields {
        if let ExtraField::Zip64(z) = field {
            if let Some(v) = z.uncompressed_size {
                resolved_uncompressed_size = v;
            }
            if let Some(v) = z.compressed_size {
                resolved_compressed_size = v;
            }
            if let Some(v) = z.header_start {
                resolved_header_start = v;
            }
        }
    }
    let header_start = resolved_header_start.checked_add(archive_offset).ok_or_else(|| {
        ZipError::InvalidArchive("local header offset overflows u64".into())
    })?;

    let system: u8 = (version_made_by >> 8) as u8;
    let version_made_by: u8 = (version_made_by & 0xFF) as u8;

    let mut data = ZipFileData {
        system: System::from(system),
        version_made_by,
        encrypted,
        using_data_descriptor,
        compression_method,
        compression_level: None,
        last_modified_time: DateTime::from_msdos(last_mod_date, last_mod_time),
        crc32,
        compressed_size: resolved_compressed_size,
        uncompressed_size: resolved_uncompressed_size,
        file_name,
        file_name_raw: file_name_raw.into(),
        name_source,
        extra_field: Some(Arc::new(extra_field)),
        central_extra_field: None,
        file_comment,
        header_start,
        central_header_start: 0,
        data_start: OnceLock::new(),
        external_attributes: external_file_attributes,
        internal_attributes: internal_file_attributes,
        large_file: resolved_compressed_size > spec::ZIP64_BYTES_THR
            || resolved_uncompressed_size > spec::ZIP64_BYTES_THR
            || header_start > spec::ZIP64_BYTES_THR,
        extra_fields,
        access_time: None,
        create_time: None,
        alignment_padding_capacity: 0,
        general_purpose_bit_flag: flags,
    };
    data.reconcile_timestamps_from_extra_fields();
    Ok(data)
}

/// Finds (and caches on `data`) the byte offset of an entry's compressed data, by seeking to its
/// local header and reading past the name and extra field.
pub(crate) fn find_data_start<R: Read + Seek>(
    data: &ZipFileData,
    reader: &mut R,
) -> ZipResult<u64> {
    if let Some(&data_start) = data.data_start.get() {
        return Ok(data_start);
    }

    reader.seek(SeekFrom::Start(data.header_start))?;
    let block = ZipLocalEntryBlock::parse(reader)?;
    let data_start = data.header_start
        + mem::size_of::<ZipLocalEntryBlock>() as u64
        + block.file_name_length as u64
        + block.extra_field_length as u64;

    // Another reader may have raced us to set this; either value is correct.
    let _ = data.data_start.set(data_start);
    Ok(data_start)
}

fn open_entry<'a, R: Read + Seek>(
    data: &'a ZipFileData,
    reader: &'a mut R,
) -> ZipResult<ZipFile<'a, R>> {
    if data.encrypted {
        return Err(ZipError::UnsupportedArchive(
            "Encrypted files are not supported".into(),
        ));
    }
    if !data.compression_method.can_decode() {
        return Err(ZipError::UnsupportedMethod(data.compression_method.to_u16()));
    }

    let data_start = find_data_start(data, reader)?;
    reader.seek(SeekFrom::Start(data_start))?;
    let limited = reader.take(data.compressed_size);
    let decoder = construct_decoder(
        data.compression_method,
        data.uncompressed_size,
        data.general_purpose_bit_flag,
        limited,
    )?;

    Ok(ZipFile {
        data,
        reader: Crc32Reader::new(decoder, data.crc32),
    })
}

/// The decompressing readers this build can produce, one variant per supported
/// [`CompressionMethod`].
enum EntryReader<R> {
    Stored(R),
    #[cfg(feature = "deflate")]
    Deflated(DeflateDecoder<R>),
    #[cfg(feature = "deflate64")]
    Deflate64(Deflate64Decoder<io::BufReader<R>>),
    #[cfg(feature = "bzip2")]
    Bzip2(BzDecoder<R>),
    #[cfg(feature = "legacy-zip")]
    Imploding(ImplodeDecoder<R>),
    #[cfg(feature = "legacy-zip")]
    Unshrinking(ShrinkDecoder<R>),
}

impl<R: Read> Read for EntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryReader::Stored(r) => r.read(buf),
            #[cfg(feature = "deflate")]
            EntryReader::Deflated(r) => r.read(buf),
            #[cfg(feature = "deflate64")]
            EntryReader::Deflate64(r) => r.read(buf),
            #[cfg(feature = "bzip2")]
            EntryReader::Bzip2(r) => r.read(buf),
            #[cfg(feature = "legacy-zip")]
            EntryReader::Imploding(r) => r.read(buf),
            #[cfg(feature = "legacy-zip")]
            EntryReader::Unshrinking(r) => r.read(buf),
        }
    }
}

fn construct_decoder<R: Read>(
    compression_method: CompressionMethod,
    uncompressed_size: u64,
    general_purpose_bit_flag: u16,
    reader: R,
) -> ZipResult<EntryReader<R>> {
    match compression_method {
        CompressionMethod::Stored => Ok(EntryReader::Stored(reader)),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflated => Ok(EntryReader::Deflated(DeflateDecoder::new(reader))),
        #[cfg(feature = "deflate64")]
        CompressionMethod::Deflate64 => Ok(EntryReader::Deflate64(Deflate64Decoder::new(
            io::BufReader::new(reader),
        ))),
        #[cfg(feature = "bzip2")]
        CompressionMethod::Bzip2 => Ok(EntryReader::Bzip2(BzDecoder::new(reader))),
        #[cfg(feature = "legacy-zip")]
        CompressionMethod::Imploding => Ok(EntryReader::Imploding(ImplodeDecoder::new(
            reader,
            uncompressed_size,
            general_purpose_bit_flag,
        ))),
        #[cfg(feature = "legacy-zip")]
        CompressionMethod::Unshrinking => Ok(EntryReader::Unshrinking(ShrinkDecoder::new(
            reader,
            uncompressed_size,
        ))),
        other => Err(ZipError::UnsupportedMethod(other.to_u16())),
    }
}

/// A single entry opened for reading out of a [`ZipArchive`].
pub struct ZipFile<'a, R> {
    data: &'a ZipFileData,
    reader: Crc32Reader<EntryReader<io::Take<&'a mut R>>>,
}

impl<R: Read> Read for ZipFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R> ZipFile<'_, R> {
    /// The entry's name, decoded as UTF-8 or CP437 per its general-purpose bit flag.
    pub fn name(&self) -> &str {
        &self.data.file_name
    }

    /// The entry's name, exactly as stored in the header.
    pub fn name_raw(&self) -> &[u8] {
        &self.data.file_name_raw
    }

    /// A path sanitized for extraction: no absolute paths, `..` components, or drive prefixes.
    pub fn mangled_name(&self) -> PathBuf {
        self.data.file_name_sanitized()
    }

    /// The entry's name as a relative path, or `None` if it isn't safely extractable as one.
    pub fn enclosed_name(&self) -> Option<PathBuf> {
        self.data.enclosed_name()
    }

    /// The entry's comment.
    pub fn comment(&self) -> &str {
        &self.data.file_comment
    }

    /// Uncompressed size, in bytes.
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

    /// The Unix permission bits, if this entry carries them.
    pub fn unix_mode(&self) -> Option<u32> {
        self.data.unix_mode()
    }

    /// The entry's CRC32, as declared in its header (validated against decompressed output once
    /// reading reaches EOF).
    pub fn crc32(&self) -> u32 {
        self.data.crc32
    }

    /// Byte offset of the entry's local header.
    pub fn header_start(&self) -> u64 {
        self.data.header_start
    }

    /// The parsed extra-field records attached to this entry's central-directory header.
    pub fn extra_data_fields(&self) -> impl Iterator<Item = &ExtraField> {
        self.data.extra_fields.iter()
    }
}

/// Presents a split (multi-volume) archive's on-disk segments — `<base>.z01`, `<base>.z02`, ...,
/// `<base>.zip` — as one seekable, contiguous byte stream, so [`ZipArchive::new`] can open it
/// without any special-casing.
pub struct SplitArchiveReader {
    files: Vec<PathBuf>,
    /// Cumulative start offset of each file; `offsets[files.len()]` is the total length.
    offsets: Vec<u64>,
    current: Option<(usize, std::fs::File)>,
    pos: u64,
}

impl SplitArchiveReader {
    /// Discovers sibling segments next to `last_segment` (conventionally named `<base>.zip`) by
    /// probing `<base>.z01`, `<base>.z02`, ... until one is missing.
    pub fn build_from_last_segment<P: AsRef<Path>>(last_segment: P) -> ZipResult<Self> {
        let last_segment = last_segment.as_ref();

        let mut files = Vec::new();
        let mut n = 1u32;
        loop {
            let candidate = last_segment.with_extension(format!("z{n:02}"));
            if !candidate.is_file() {
                break;
            }
            files.push(candidate);
            n += 1;
        }
        files.push(last_segment.to_path_buf());

        let mut offsets = Vec::with_capacity(files.len() + 1);
        offsets.push(0u64);
        let mut total = 0u64;
        for f in &files {
            total += std::fs::metadata(f)?.len();
            offsets.push(total);
        }

        Ok(SplitArchiveReader {
            files,
            offsets,
            current: None,
            pos: 0,
        })
    }

    fn total_len(&self) -> u64 {
        *self.offsets.last().unwrap()
    }

    fn segment_for(&self, pos: u64) -> usize {
        for (i, &end) in self.offsets[1..].iter().enumerate() {
            if pos < end {
                return i;
            }
        }
        self.files.len() - 1
    }
}

impl Read for SplitArchiveReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.total_len() {
            return Ok(0);
        }

        let idx = self.segment_for(self.pos);
        if self.current.as_ref().map(|(i, _)| *i) != Some(idx) {
            self.current = Some((idx, std::fs::File::open(&self.files[idx])?));
        }
        let (_, file) = self.current.as_mut().unwrap();

        let local_pos = self.pos - self.offsets[idx];
        file.seek(SeekFrom::Start(local_pos))?;
        let remaining_in_segment = self.offsets[idx + 1] - self.offsets[idx] - local_pos;
        let cap = (buf.len() as u64).min(remaining_in_segment) as usize;

        let n = file.read(&mut buf[..cap])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SplitArchiveReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(p) => self.total_len() as i64 + p,
            SeekFrom::Current(p) => self.pos as i64 + p,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}
