//! Writer for the ZIP archive format: seekable and streaming sinks, ZIP64 policy, alignment
//! and timestamp extra fields, and split (multi-volume) output.

use std::io::{self, Seek, SeekFrom, Write};
use std::mem;
use std::sync::Arc;

use indexmap::IndexMap;

#[cfg(feature = "bzip2")]
use bzip2::write::BzEncoder;
#[cfg(feature = "deflate")]
use flate2::write::DeflateEncoder;

use crate::compression::CompressionMethod;
use crate::extra_fields::{
    AlignmentExtraField, ExtendedTimestamp, ExtraField, Ntfs, NtfsTimestamp, Zip64ExtendedInformation,
};
use crate::result::{invalid_argument, ZipError, ZipResult, Zip64RequiredKind};
use crate::spec::{
    self, Block, CentralDirectoryEnd, Zip64CentralDirectoryEnd, Zip64CentralDirectoryEndLocator,
};
use crate::types::{DateTime, System, ZipFileData, ZipLocalEntryBlock, ZipRawValues, DEFAULT_VERSION};

const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;

/// How ZIP64 records are emitted for entries and for the archive's end-of-directory records.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Zip64Policy {
    /// Never emit ZIP64 records. A write that would need one fails with
    /// [`ZipError::Zip64Required`].
    Never,
    /// Emit ZIP64 records only where the actual sizes or counts demand it.
    #[default]
    AsNeeded,
    /// Always emit ZIP64 records, even for small entries and archives.
    Always,
    /// Like [`Self::Always`], but omits the relative-header-offset field from each entry's
    /// central-directory ZIP64 record (some tools special-case this combination).
    AlwaysWithCompatibility,
}

impl Zip64Policy {
    fn forces_large_file(self) -> bool {
        matches!(self, Zip64Policy::Always | Zip64Policy::AlwaysWithCompatibility)
    }
}

/// An encryption method a [`FileOptions`] may request. Requesting one fails
/// [`ZipWriter::start_file`]: writing encrypted entries isn't implemented. See the module docs
/// for why the type still exists: an entry's `encrypted` flag is part of the on-disk model
/// whether or not this crate can produce the ciphertext.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EncryptionMethod {
    ZipCrypto,
}

/// Extension point for caller-supplied extra-field bytes, attached verbatim in addition to the
/// timestamp/ZIP64/alignment fields this crate manages itself.
pub trait FileOptionExtension: Clone {
    fn extra_data(&self) -> Option<&Arc<Vec<u8>>>;
    fn central_extra_data(&self) -> Option<&Arc<Vec<u8>>>;
}

impl FileOptionExtension for () {
    fn extra_data(&self) -> Option<&Arc<Vec<u8>>> {
        None
    }
    fn central_extra_data(&self) -> Option<&Arc<Vec<u8>>> {
        None
    }
}

/// Raw extra-field bytes a caller wants attached to an entry, independent of anything this
/// crate derives on its own.
#[derive(Clone, Debug, Default)]
pub struct ExtendedFileOptions {
    extra_data: Option<Arc<Vec<u8>>>,
    central_extra_data: Option<Arc<Vec<u8>>>,
}

impl ExtendedFileOptions {
    /// Appends one already-framed (header id + length + payload) extra-field record.
    pub fn add_extra_data(&mut self, data: Vec<u8>, central_only: bool) -> ZipResult<()> {
        if data.len() < 4 {
            return invalid_argument("extra field record shorter than its 4-byte header");
        }
        let slot = if central_only {
            &mut self.central_extra_data
        } else {
            &mut self.extra_data
        };
        let buf = Arc::make_mut(slot.get_or_insert_with(|| Arc::new(Vec::new())));
        buf.extend_from_slice(&data);
        Ok(())
    }
}

impl FileOptionExtension for ExtendedFileOptions {
    fn extra_data(&self) -> Option<&Arc<Vec<u8>>> {
        self.extra_data.as_ref()
    }
    fn central_extra_data(&self) -> Option<&Arc<Vec<u8>>> {
        self.central_extra_data.as_ref()
    }
}

/// Per-entry options for [`ZipWriter::start_file`].
#[derive(Clone)]
pub struct FileOptions<T: FileOptionExtension = ()> {
    pub(crate) permissions: Option<u32>,
    pub(crate) encrypt_with: Option<EncryptionMethod>,
    pub(crate) compression_method: CompressionMethod,
    pub(crate) compression_level: Option<i64>,
    pub(crate) last_modified_time: DateTime,
    pub(crate) large_file: bool,
    pub(crate) extended_options: T,
    alignment: u16,
    mtime: Option<i64>,
    atime: Option<i64>,
    ctime: Option<i64>,
}

impl Default for FileOptions<()> {
    fn default() -> Self {
        FileOptions {
            permissions: None,
            encrypt_with: None,
            compression_method: CompressionMethod::default(),
            compression_level: None,
            last_modified_time: DateTime::default(),
            large_file: false,
            extended_options: (),
            alignment: 0,
            mtime: None,
            atime: None,
            ctime: None,
        }
    }
}

impl<T: FileOptionExtension> FileOptions<T> {
    pub fn compression_method(mut self, method: CompressionMethod) -> Self {
        self.compression_method = method;
        self
    }

    pub fn compression_level(mut self, level: Option<i64>) -> Self {
        self.compression_level = level;
        self
    }

    pub fn last_modified_time(mut self, time: DateTime) -> Self {
        self.last_modified_time = time;
        self
    }

    pub fn unix_permissions(mut self, mode: u32) -> Self {
        self.permissions = Some(mode & 0o777);
        self
    }

    /// Declares up front that this entry will exceed the 32-bit size limit, reserving a ZIP64
    /// extra field in its local header. Required for entries written through a forward-only
    /// sink, or through a seekable one under [`Zip64Policy::AsNeeded`]: the final size is only
    /// known after the fact, too late to grow the already-written local header.
    pub fn large_file(mut self, large: bool) -> Self {
        self.large_file = large;
        self
    }

    /// Requests the entry's compressed data start on an offset aligned to `alignment` bytes
    /// (which must be a power of two), by padding the local extra-field area.
    pub fn with_alignment(mut self, alignment: u16) -> Self {
        self.alignment = alignment;
        self
    }

    /// Attaches Info-ZIP Extended Timestamp / NTFS extra fields carrying second-resolution Unix
    /// times beyond what the DOS-format [`Self::last_modified_time`] can represent.
    pub fn with_high_precision_times(
        mut self,
        mtime: Option<i64>,
        atime: Option<i64>,
        ctime: Option<i64>,
    ) -> Self {
        self.mtime = mtime;
        self.atime = atime;
        self.ctime = ctime;
        self
    }

    pub fn with_extended_options<T2: FileOptionExtension>(self, extended_options: T2) -> FileOptions<T2> {
        FileOptions {
            permissions: self.permissions,
            encrypt_with: self.encrypt_with,
            compression_method: self.compression_method,
            compression_level: self.compression_level,
            last_modified_time: self.last_modified_time,
            large_file: self.large_file,
            extended_options,
            alignment: self.alignment,
            mtime: self.mtime,
            atime: self.atime,
            ctime: self.ctime,
        }
    }
}

impl<T: FileOptionExtension + Default> FileOptions<T> {
    pub fn with_encryption(mut self, method: EncryptionMethod) -> Self {
        self.encrypt_with = Some(method);
        self
    }
}

fn timestamp_extra_fields(mtime: Option<i64>, atime: Option<i64>, ctime: Option<i64>) -> Vec<ExtraField> {
    let mut fields = Vec::new();
    if let Some(ts) = ExtendedTimestamp::from_times(
        mtime.map(|v| v as i32),
        atime.map(|v| v as i32),
        ctime.map(|v| v as i32),
    ) {
        fields.push(ExtraField::ExtendedTimestamp(ts));
    }
    if let Some(m) = mtime {
        let ntfs = Ntfs::from_times(
            Some(NtfsTimestamp::from_unix(m, 0)),
            atime.map(|a| NtfsTimestamp::from_unix(a, 0)),
            ctime.map(|c| NtfsTimestamp::from_unix(c, 0)),
        )
        .expect("mtime is Some");
        fields.push(ExtraField::Ntfs(ntfs));
    }
    fields
}

/// Total on-disk size (6-byte frame + padding) of the alignment extra field needed so the byte
/// right after it, `base` bytes into the entry plus this field's own frame, lands on a multiple
/// of `alignment`.
fn alignment_field_size(base: u64, alignment: u16) -> u16 {
    let align = alignment as u64;
    let anchor = base + 6;
    let padding = (align - (anchor % align)) % align;
    (6 + padding).min(u16::MAX as u64) as u16
}

#[cfg(feature = "deflate")]
fn flate2_level(level: Option<i64>) -> flate2::Compression {
    match level {
        None => flate2::Compression::default(),
        Some(l) => flate2::Compression::new(l.clamp(0, 9) as u32),
    }
}

#[cfg(feature = "bzip2")]
fn bzip2_level(level: Option<i64>) -> bzip2::Compression {
    match level {
        None => bzip2::Compression::default(),
        Some(l) => bzip2::Compression::new(l.clamp(1, 9) as u32),
    }
}

/// Wraps the raw sink `W` in whichever compressor the current entry needs. Idle between entries
/// as `Storer`, so header/central-directory bytes can always be written through it directly.
enum GenericZipWriter<W: Write> {
    Storer(W),
    #[cfg(feature = "deflate")]
    Deflater(DeflateEncoder<W>),
    #[cfg(feature = "bzip2")]
    Bzip2(BzEncoder<W>),
    Closed,
}

impl<W: Write> GenericZipWriter<W> {
    fn take_storer(&mut self) -> ZipResult<W> {
        match mem::replace(self, GenericZipWriter::Closed) {
            GenericZipWriter::Storer(w) => Ok(w),
            _ => Err(ZipError::InvalidArchive("writer is not idle between entries".into())),
        }
    }

    fn start_entry(&mut self, method: CompressionMethod, level: Option<i64>) -> ZipResult<()> {
        let w = self.take_storer()?;
        *self = match method {
            CompressionMethod::Stored => GenericZipWriter::Storer(w),
            #[cfg(feature = "deflate")]
            CompressionMethod::Deflated => GenericZipWriter::Deflater(DeflateEncoder::new(w, flate2_level(level))),
            #[cfg(feature = "bzip2")]
            CompressionMethod::Bzip2 => GenericZipWriter::Bzip2(BzEncoder::new(w, bzip2_level(level))),
            other => return Err(ZipError::UnsupportedMethod(other.to_u16())),
        };
        Ok(())
    }

    fn finish_entry(&mut self) -> ZipResult<()> {
        let w = match mem::replace(self, GenericZipWriter::Closed) {
            GenericZipWriter::Storer(w) => w,
            #[cfg(feature = "deflate")]
            GenericZipWriter::Deflater(enc) => enc.finish()?,
            #[cfg(feature = "bzip2")]
            GenericZipWriter::Bzip2(enc) => enc.finish()?,
            GenericZipWriter::Closed => {
                return Err(ZipError::InvalidArchive("writer is already closed".into()))
            }
        };
        *self = GenericZipWriter::Storer(w);
        Ok(())
    }

    fn into_inner(mut self) -> ZipResult<W> {
        self.take_storer()
    }

    fn inner_ref(&self) -> Option<&W> {
        match self {
            GenericZipWriter::Storer(w) => Some(w),
            _ => None,
        }
    }
}

impl<W: Write> Write for GenericZipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            GenericZipWriter::Storer(w) => w.write(buf),
            #[cfg(feature = "deflate")]
            GenericZipWriter::Deflater(w) => w.write(buf),
            #[cfg(feature = "bzip2")]
            GenericZipWriter::Bzip2(w) => w.write(buf),
            GenericZipWriter::Closed => Err(io::Error::new(io::ErrorKind::Other, "writer is closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            GenericZipWriter::Storer(w) => w.flush(),
            #[cfg(feature = "deflate")]
            GenericZipWriter::Deflater(w) => w.flush(),
            #[cfg(feature = "bzip2")]
            GenericZipWriter::Bzip2(w) => w.flush(),
            GenericZipWriter::Closed => Ok(()),
        }
    }
}

impl<W: Write + Seek> GenericZipWriter<W> {
    fn position(&mut self) -> io::Result<u64> {
        match self {
            GenericZipWriter::Storer(w) => w.stream_position(),
            _ => Err(io::Error::new(
                io::ErrorKind::Other,
                "cannot query position while a compressed entry is open",
            )),
        }
    }

    fn seek_idle(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            GenericZipWriter::Storer(w) => w.seek(pos),
            _ => Err(io::Error::new(
                io::ErrorKind::Other,
                "cannot seek while a compressed entry is open",
            )),
        }
    }
}

/// Builds the `ZipFileData` for a new entry, merging in timestamp extra fields and computing
/// alignment padding: the part of `start_file` shared between the seekable and streaming
/// writers.
fn new_entry_data(
    name: Box<str>,
    options: &FileOptions<impl FileOptionExtension>,
    header_start: u64,
    zip64_policy: Zip64Policy,
) -> ZipResult<ZipFileData> {
    if options.encrypt_with.is_some() {
        return Err(ZipError::UnsupportedArchive(
            "writing encrypted entries is not supported".into(),
        ));
    }
    if !options.compression_method.can_encode() {
        return Err(ZipError::UnsupportedMethod(options.compression_method.to_u16()));
    }
    if options.alignment > 1 && !options.alignment.is_power_of_two() {
        return invalid_argument(format!("alignment must be a power of two, got {}", options.alignment));
    }

    let raw_values = ZipRawValues {
        crc32: 0,
        compressed_size: 0,
        uncompressed_size: 0,
    };
    let mut data = ZipFileData::initialize_local_block(name, options, raw_values, header_start);
    data.large_file = options.large_file || zip64_policy.forces_large_file();
    if data.large_file && zip64_policy == Zip64Policy::Never {
        return Err(ZipError::Zip64Required {
            kind: Zip64RequiredKind::EntrySize,
            entry: Some(data.file_name.clone()),
        });
    }

    let ts_fields = timestamp_extra_fields(options.mtime, options.atime, options.ctime);
    if !ts_fields.is_empty() {
        let mut combined = crate::extra_fields::serialize_local(&ts_fields);
        if let Some(existing) = &data.extra_field {
            combined.extend_from_slice(existing);
        }
        let mut combined_central = crate::extra_fields::serialize_central(&ts_fields);
        if let Some(existing) = &data.central_extra_field {
            combined_central.extend_from_slice(existing);
        }
        data.extra_field = Some(Arc::new(combined));
        if !combined_central.is_empty() {
            data.central_extra_field = Some(Arc::new(combined_central));
        }
        data.extra_fields = ts_fields;
    }

    if options.alignment > 1 {
        let fixed_base = header_start
            + mem::size_of::<ZipLocalEntryBlock>() as u64
            + data.file_name.as_bytes().len() as u64
            + if data.large_file { 20 } else { 0 }
            + data.extra_field_len() as u64;
        data.alignment_padding_capacity = alignment_field_size(fixed_base, options.alignment);
    }

    Ok(data)
}

/// Writes a just-built entry's local header, name, and extra-field area: ZIP64 placeholder (if
/// `large_file`), then whatever's already folded into `data.extra_field`, then alignment
/// padding (if requested). `alignment` is the caller's actual requested power of two; it isn't
/// stored on `ZipFileData` itself, only its padded byte count is.
fn write_local_header<W: Write>(w: &mut W, data: &ZipFileData, alignment: u16) -> ZipResult<()> {
    let block = data.local_block()?;
    block.write(w)?;
    w.write_all(data.file_name.as_bytes())?;

    if data.large_file {
        let placeholder = Zip64ExtendedInformation::from_new_entry(true).expect("large_file implies zip64");
        w.write_all(&placeholder.serialize_local())?;
    }
    if let Some(extra) = &data.extra_field {
        w.write_all(extra)?;
    }
    if data.alignment_padding_capacity > 0 {
        let padding = data.alignment_padding_capacity - 6;
        let field = AlignmentExtraField::new(alignment, padding)?;
        w.write_all(&field.serialize())?;
    }
    Ok(())
}

fn write_data_descriptor<W: Write>(
    w: &mut W,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    zip64: bool,
) -> io::Result<()> {
    w.write_all(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes())?;
    w.write_all(&crc32.to_le_bytes())?;
    if zip64 {
        w.write_all(&compressed_size.to_le_bytes())?;
        w.write_all(&uncompressed_size.to_le_bytes())?;
    } else {
        w.write_all(&(compressed_size as u32).to_le_bytes())?;
        w.write_all(&(uncompressed_size as u32).to_le_bytes())?;
    }
    Ok(())
}

/// Writes the central directory and end-of-central-directory records (including ZIP64 ones, as
/// the policy demands) to `w`. Returns the total number of bytes written.
fn write_central_directory<W: Write>(
    w: &mut W,
    files: &IndexMap<Box<str>, ZipFileData>,
    zip64_policy: Zip64Policy,
    cd_start: u64,
    comment: &[u8],
) -> ZipResult<u64> {
    let mut written = 0u64;
    for data in files.values() {
        let mut zip64 = Zip64ExtendedInformation::central_header(
            data.uncompressed_size,
            data.compressed_size,
            data.header_start,
        );
        if data.large_file {
            // `Always`/`AlwaysWithCompatibility` force every entry's on-disk size fields to the
            // sentinel (see `ZipFileData::block`), so the matching ZIP64 record must carry both
            // sizes even when the real values sit well under the threshold. `header_start` stays
            // need-based: `block()` never forces the offset field to the sentinel, so adding it
            // here unconditionally would desync the reader's sentinel-driven field count.
            let z = zip64.get_or_insert(Zip64ExtendedInformation {
                uncompressed_size: None,
                compressed_size: None,
                header_start: None,
                disk_start: None,
            });
            z.uncompressed_size = Some(data.uncompressed_size);
            z.compressed_size = Some(data.compressed_size);
        }
        if zip64.is_some() && zip64_policy == Zip64Policy::Never {
            return Err(ZipError::Zip64Required {
                kind: Zip64RequiredKind::EntrySize,
                entry: Some(data.file_name.clone()),
            });
        }
        if matches!(zip64_policy, Zip64Policy::AlwaysWithCompatibility) {
            if let Some(z) = &mut zip64 {
                z.header_start = None;
            }
        }
        let zip64_len = zip64.as_ref().map(|z| z.full_size() as u16).unwrap_or(0);

        let block = data.block(zip64_len);
        block.write(w)?;
        w.write_all(data.file_name.as_bytes())?;
        written += mem::size_of::<crate::types::ZipEntryBlock>() as u64 + data.file_name.as_bytes().len() as u64;

        if let Some(z) = &zip64 {
            let bytes = z.serialize_central();
            w.write_all(&bytes)?;
            written += bytes.len() as u64;
        }
        if let Some(extra) = &data.extra_field {
            w.write_all(extra)?;
            written += extra.len() as u64;
        }
        if let Some(extra) = &data.central_extra_field {
            w.write_all(extra)?;
            written += extra.len() as u64;
        }
        w.write_all(data.file_comment.as_bytes())?;
        written += data.file_comment.as_bytes().len() as u64;
    }

    let num_files = files.len();
    let cd_size = written;
    let exceeds_32bit =
        num_files > 0xFFFF || cd_size >= spec::ZIP64_BYTES_THR || cd_start >= spec::ZIP64_BYTES_THR;

    if zip64_policy == Zip64Policy::Never && exceeds_32bit {
        let kind = if num_files > 0xFFFF {
            Zip64RequiredKind::TooManyEntries
        } else {
            Zip64RequiredKind::ArchiveTooBig
        };
        return Err(ZipError::Zip64Required { kind, entry: None });
    }

    let needs_archive_zip64 = match zip64_policy {
        Zip64Policy::Always | Zip64Policy::AlwaysWithCompatibility => true,
        Zip64Policy::Never => false,
        Zip64Policy::AsNeeded => exceeds_32bit,
    };

    if needs_archive_zip64 {
        let locator_offset = cd_start + cd_size;
        let zip64_end = Zip64CentralDirectoryEnd {
            version_made_by: (System::Unix as u16) << 8 | DEFAULT_VERSION as u16,
            version_needed_to_extract: 45,
            disk_number: 0,
            disk_with_central_directory: 0,
            number_of_files_on_this_disk: num_files as u64,
            number_of_files: num_files as u64,
            central_directory_size: cd_size,
            central_directory_offset: cd_start,
        };
        zip64_end.write(w)?;
        written += mem::size_of::<spec::Zip64CDEBlock>() as u64;

        Zip64CentralDirectoryEndLocator {
            disk_with_central_directory: 0,
            end_of_central_directory_offset: locator_offset,
            number_of_disks: 1,
        }
        .write(w)?;
        written += mem::size_of::<spec::Zip64CDELocatorBlock>() as u64;
    }

    let sentinel_count = num_files > 0xFFFF;
    CentralDirectoryEnd {
        disk_number: 0,
        disk_with_central_directory: 0,
        number_of_files_on_this_disk: if sentinel_count { 0xFFFF } else { num_files as u16 },
        number_of_files: if sentinel_count { 0xFFFF } else { num_files as u16 },
        central_directory_size: cd_size.min(spec::ZIP64_BYTES_THR) as u32,
        central_directory_offset: cd_start.min(spec::ZIP64_BYTES_THR) as u32,
        zip_file_comment: comment.to_vec(),
    }
    .write(w)?;
    written += mem::size_of::<spec::CDEBlock>() as u64 + comment.len() as u64;

    Ok(written)
}

struct OpenEntry {
    name: Box<str>,
    header_start: u64,
    data_start: u64,
    hasher: crc32fast::Hasher,
    bytes_written: u64,
    large_file: bool,
}

/// Writes ZIP archives to a seekable sink (a [`std::fs::File`], a `Cursor<Vec<u8>>`, ...).
///
/// Local headers are written with placeholder sizes/CRC and patched in place once an entry is
/// finished, so the output never needs a data descriptor. For a sink that can't be seeked, use
/// [`StreamingZipWriter`] instead.
pub struct ZipWriter<W: Write + Seek> {
    inner: GenericZipWriter<W>,
    files: IndexMap<Box<str>, ZipFileData>,
    current: Option<OpenEntry>,
    comment: Vec<u8>,
    zip64_policy: Zip64Policy,
}

impl<W: Write + Seek> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        ZipWriter {
            inner: GenericZipWriter::Storer(inner),
            files: IndexMap::new(),
            current: None,
            comment: Vec::new(),
            zip64_policy: Zip64Policy::default(),
        }
    }

    pub fn with_zip64_policy(mut self, policy: Zip64Policy) -> Self {
        self.zip64_policy = policy;
        self
    }

    pub fn set_comment(&mut self, comment: impl Into<Vec<u8>>) {
        self.comment = comment.into();
    }

    /// Writes arbitrary bytes (e.g. a self-extracting stub) before the archive proper. Must be
    /// called before the first [`Self::start_file`].
    pub fn write_preamble(&mut self, bytes: &[u8]) -> ZipResult<()> {
        if !self.files.is_empty() || self.current.is_some() {
            return Err(ZipError::InvalidArgument(
                "preamble must be written before any entry is started".into(),
            ));
        }
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn start_file(
        &mut self,
        name: impl Into<Box<str>>,
        options: FileOptions<impl FileOptionExtension>,
    ) -> ZipResult<()> {
        self.finish_entry()?;

        let header_start = self.inner.position()?;
        let data = new_entry_data(name.into(), &options, header_start, self.zip64_policy)?;

        write_local_header(&mut self.inner, &data, options.alignment)?;
        let data_start = self.inner.position()?;
        let _ = data.data_start.set(data_start);

        self.inner.start_entry(data.compression_method, data.compression_level)?;
        self.current = Some(OpenEntry {
            name: data.file_name.clone(),
            header_start,
            data_start,
            hasher: crc32fast::Hasher::new(),
            bytes_written: 0,
            large_file: data.large_file,
        });
        self.files.insert(data.file_name.clone(), data);
        Ok(())
    }

    pub fn add_directory(
        &mut self,
        name: impl Into<String>,
        options: FileOptions<impl FileOptionExtension>,
    ) -> ZipResult<()> {
        let mut name = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        let permissions = options.permissions.unwrap_or(0o40755);
        let options = options
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(permissions);
        self.start_file(name, options)?;
        self.finish_entry()
    }

    fn finish_entry(&mut self) -> ZipResult<()> {
        let Some(entry) = self.current.take() else {
            return Ok(());
        };
        self.inner.finish_entry()?;

        let crc32 = entry.hasher.finalize();
        let end_pos = self.inner.position()?;
        let compressed_size = end_pos - entry.data_start;
        let uncompressed_size = entry.bytes_written;

        let needs_zip64 = uncompressed_size >= spec::ZIP64_BYTES_THR || compressed_size >= spec::ZIP64_BYTES_THR;
        if needs_zip64 && !entry.large_file {
            return Err(ZipError::Zip64Required {
                kind: Zip64RequiredKind::EntrySize,
                entry: Some(entry.name),
            });
        }

        let data = self
            .files
            .get_mut(&entry.name)
            .expect("entry was inserted in start_file");
        data.crc32 = crc32;
        data.compressed_size = compressed_size;
        data.uncompressed_size = uncompressed_size;

        let saved_pos = self.inner.position()?;
        self.inner.seek_idle(SeekFrom::Start(entry.header_start))?;
        data.local_block()?.write(&mut self.inner)?;
        if entry.large_file {
            self.inner.seek_idle(SeekFrom::Start(
                entry.header_start
                    + mem::size_of::<ZipLocalEntryBlock>() as u64
                    + data.file_name.as_bytes().len() as u64
                    + 4,
            ))?;
            self.inner.write_all(&uncompressed_size.to_le_bytes())?;
            self.inner.write_all(&compressed_size.to_le_bytes())?;
        }
        self.inner.seek_idle(SeekFrom::Start(saved_pos))?;
        Ok(())
    }

    pub fn finish(mut self) -> ZipResult<W> {
        self.finish_entry()?;
        let cd_start = self.inner.position()?;
        write_central_directory(&mut self.inner, &self.files, self.zip64_policy, cd_start, &self.comment)?;
        self.inner.into_inner()
    }
}

impl<W: Write + Seek> Write for ZipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let entry = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no entry is open; call start_file first"))?;
        let n = self.inner.write(buf)?;
        entry.hasher.update(&buf[..n]);
        entry.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Byte sink that hands out fixed-capacity segments, for split (multi-volume) ZIP output. Names
/// follow the PKWARE/Info-ZIP convention: `<base>.z01`, `<base>.z02`, ..., with the last segment
/// (the one carrying the central directory) named `<base>.zip`.
pub trait SplitSink {
    type Segment: Write;

    /// Ensures at least `len` more bytes fit in the current segment without crossing a split
    /// boundary, rotating first if they wouldn't. Callers use this before writing a record that
    /// must never itself be split across volumes (a header, a data descriptor).
    fn prepare_unsplittable(&mut self, len: u64) -> io::Result<()>;

    /// Finishes the current segment and opens the next one.
    fn rotate(&mut self) -> io::Result<()>;

    fn current_mut(&mut self) -> &mut Self::Segment;

    fn remaining_in_segment(&self) -> u64;
}

/// Adapts a [`SplitSink`] into a plain [`Write`], rotating segments transparently as capacity
/// runs out.
pub struct SplitWriter<S: SplitSink> {
    sink: S,
}

impl<S: SplitSink> SplitWriter<S> {
    pub fn new(sink: S) -> Self {
        SplitWriter { sink }
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}

impl<S: SplitSink> Write for SplitWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.sink.remaining_in_segment() == 0 {
            self.sink.rotate()?;
        }
        let room = self.sink.remaining_in_segment().max(1);
        let n = (buf.len() as u64).min(room) as usize;
        self.sink.current_mut().write(&buf[..n])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.current_mut().flush()
    }
}

/// Splits output across numbered files on disk at a fixed segment size, per the
/// `<base>.z01..z0N-1`/`<base>.zip` convention.
pub struct FileSplitSink {
    base: std::path::PathBuf,
    segment_size: u64,
    segment_index: u32,
    written_in_segment: u64,
    current: std::fs::File,
}

impl FileSplitSink {
    pub fn create(base: impl Into<std::path::PathBuf>, segment_size: u64) -> io::Result<Self> {
        let base = base.into();
        let first = Self::segment_path(&base, 1);
        let current = std::fs::File::create(first)?;
        Ok(FileSplitSink {
            base,
            segment_size,
            segment_index: 1,
            written_in_segment: 0,
            current,
        })
    }

    fn segment_path(base: &std::path::Path, index: u32) -> std::path::PathBuf {
        base.with_extension(format!("z{index:02}"))
    }

    /// Renames the final, still-open segment to `<base>.zip`, as the last volume conventionally
    /// carries the central directory and is the one tools are pointed at to open the set.
    pub fn finish(self) -> io::Result<()> {
        let last = Self::segment_path(&self.base, self.segment_index);
        drop(self.current);
        std::fs::rename(last, self.base.with_extension("zip"))
    }
}

impl SplitSink for FileSplitSink {
    type Segment = std::fs::File;

    fn prepare_unsplittable(&mut self, len: u64) -> io::Result<()> {
        if self.written_in_segment > 0 && self.remaining_in_segment() < len {
            self.rotate()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.current.flush()?;
        self.segment_index += 1;
        self.current = std::fs::File::create(Self::segment_path(&self.base, self.segment_index))?;
        self.written_in_segment = 0;
        Ok(())
    }

    fn current_mut(&mut self) -> &mut std::fs::File {
        &mut self.current
    }

    fn remaining_in_segment(&self) -> u64 {
        self.segment_size.saturating_sub(self.written_in_segment)
    }
}

impl Write for FileSplitSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.current.write(buf)?;
        self.written_in_segment += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.current.flush()
    }
}

/// Counts bytes written through a forward-only sink, standing in for the position queries a
/// seekable sink gets for free.
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct StreamingOpenEntry {
    name: Box<str>,
    hasher: crc32fast::Hasher,
    bytes_written: u64,
    large_file: bool,
}

/// Writes ZIP archives to a forward-only sink (a network socket, a pipe, a [`SplitWriter`]).
/// Every entry carries a trailing data descriptor instead of a patched-back local header, since
/// the sink can't be seeked; [`FileOptions::large_file`] must be set up front for any entry that
/// will exceed the 32-bit size limit.
pub struct StreamingZipWriter<W: Write> {
    inner: GenericZipWriter<CountingWriter<W>>,
    files: IndexMap<Box<str>, ZipFileData>,
    current: Option<StreamingOpenEntry>,
    comment: Vec<u8>,
    zip64_policy: Zip64Policy,
}

impl<W: Write> StreamingZipWriter<W> {
    pub fn new(inner: W) -> Self {
        StreamingZipWriter {
            inner: GenericZipWriter::Storer(CountingWriter { inner, count: 0 }),
            files: IndexMap::new(),
            current: None,
            comment: Vec::new(),
            zip64_policy: Zip64Policy::default(),
        }
    }

    pub fn with_zip64_policy(mut self, policy: Zip64Policy) -> Self {
        self.zip64_policy = policy;
        self
    }

    pub fn set_comment(&mut self, comment: impl Into<Vec<u8>>) {
        self.comment = comment.into();
    }

    fn position(&self) -> u64 {
        self.inner.inner_ref().map(|w| w.count).unwrap_or(0)
    }

    pub fn start_file(
        &mut self,
        name: impl Into<Box<str>>,
        options: FileOptions<impl FileOptionExtension>,
    ) -> ZipResult<()> {
        self.finish_entry()?;

        let header_start = self.position();
        let mut data = new_entry_data(name.into(), &options, header_start, self.zip64_policy)?;
        data.using_data_descriptor = true;

        write_local_header(&mut self.inner, &data, options.alignment)?;
        self.inner.start_entry(data.compression_method, data.compression_level)?;

        self.current = Some(StreamingOpenEntry {
            name: data.file_name.clone(),
            hasher: crc32fast::Hasher::new(),
            bytes_written: 0,
            large_file: data.large_file,
        });
        self.files.insert(data.file_name.clone(), data);
        Ok(())
    }

    fn finish_entry(&mut self) -> ZipResult<()> {
        let Some(entry) = self.current.take() else {
            return Ok(());
        };
        let start_count = self.position();
        self.inner.finish_entry()?;
        let compressed_size = self.position() - start_count;
        let crc32 = entry.hasher.finalize();
        let uncompressed_size = entry.bytes_written;

        let needs_zip64 = uncompressed_size >= spec::ZIP64_BYTES_THR || compressed_size >= spec::ZIP64_BYTES_THR;
        if needs_zip64 && !entry.large_file {
            return Err(ZipError::Zip64Required {
                kind: Zip64RequiredKind::EntrySize,
                entry: Some(entry.name),
            });
        }

        let data = self
            .files
            .get_mut(&entry.name)
            .expect("entry was inserted in start_file");
        data.crc32 = crc32;
        data.compressed_size = compressed_size;
        data.uncompressed_size = uncompressed_size;

        write_data_descriptor(&mut self.inner, crc32, compressed_size, uncompressed_size, entry.large_file)?;
        Ok(())
    }

    pub fn finish(mut self) -> ZipResult<W> {
        self.finish_entry()?;
        let cd_start = self.position();
        write_central_directory(&mut self.inner, &self.files, self.zip64_policy, cd_start, &self.comment)?;
        Ok(self.inner.into_inner()?.inner)
    }
}

impl<W: Write> Write for StreamingZipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let entry = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no entry is open; call start_file first"))?;
        let n = self.inner.write(buf)?;
        entry.hasher.update(&buf[..n]);
        entry.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn stored_entry_round_trips_through_archive() {
        let mut w = ZipWriter::new(Cursor::new(Vec::new()));
        w.start_file("a.txt", FileOptions::default().compression_method(CompressionMethod::Stored))
            .unwrap();
        w.write_all(b"hello world").unwrap();
        let cursor = w.finish().unwrap();
        let bytes = cursor.into_inner();
        assert!(bytes.starts_with(&spec::LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes()));
        assert!(bytes
            .windows(4)
            .any(|w| w == spec::CENTRAL_DIRECTORY_HEADER_SIGNATURE.to_le_bytes()));
        let (eocd, _) = CentralDirectoryEnd::find_and_parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(eocd.number_of_files, 1);
    }

    #[test]
    fn large_file_hint_patches_sizes_in_place() {
        let mut w = ZipWriter::new(Cursor::new(Vec::new()));
        w.start_file(
            "big",
            FileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .large_file(true),
        )
        .unwrap();
        w.write_all(&[7u8; 64]).unwrap();
        let cursor = w.finish().unwrap();
        let mut cursor = Cursor::new(cursor.into_inner());
        let (eocd, _) = CentralDirectoryEnd::find_and_parse(&mut cursor).unwrap();
        assert_eq!(eocd.number_of_files, 1);
    }

    #[test]
    fn never_policy_rejects_entry_that_needs_zip64() {
        let mut w = ZipWriter::new(Cursor::new(Vec::new())).with_zip64_policy(Zip64Policy::Never);
        let err = w
            .start_file(
                "a",
                FileOptions::default()
                    .compression_method(CompressionMethod::Stored)
                    .large_file(true),
            )
            .unwrap_err();
        assert!(matches!(err, ZipError::Zip64Required { .. }));
    }

    #[test]
    fn alignment_rejects_non_power_of_two() {
        let mut w = ZipWriter::new(Cursor::new(Vec::new()));
        let err = w
            .start_file(
                "a",
                FileOptions::default()
                    .compression_method(CompressionMethod::Stored)
                    .with_alignment(3),
            )
            .unwrap_err();
        assert!(matches!(err, ZipError::InvalidArgument(_)));
    }

    #[test]
    fn streaming_writer_emits_data_descriptor() {
        let mut w = StreamingZipWriter::new(Vec::new());
        w.start_file("a.txt", FileOptions::default().compression_method(CompressionMethod::Stored))
            .unwrap();
        w.write_all(b"streamed").unwrap();
        let bytes = w.finish().unwrap();
        assert!(bytes
            .windows(4)
            .any(|w| w == DATA_DESCRIPTOR_SIGNATURE.to_le_bytes()));
        let (eocd, _) = CentralDirectoryEnd::find_and_parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(eocd.number_of_files, 1);
    }

    #[test]
    fn add_directory_writes_trailing_slash_entry() {
        let mut w = ZipWriter::new(Cursor::new(Vec::new()));
        w.add_directory("dir", FileOptions::default()).unwrap();
        assert!(w.files.contains_key("dir/"));
    }
}
