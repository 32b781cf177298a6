//! Round-trips entries of every enabled compression method through a seekable archive and
//! checks the bytes, CRC, and size come back exactly as written.

use std::io::{Cursor, Read, Write};

use zipcore::{CompressionMethod, FileOptions, ZipArchive, ZipWriter};

const CONTENT: &[u8] = &[0x01, 0x02, 0x03, 0x04];
const CONTENT_CRC32: u32 = 0xb63cfbcd;

fn methods() -> Vec<CompressionMethod> {
    let mut methods = vec![CompressionMethod::Stored];
    #[cfg(feature = "deflate")]
    methods.push(CompressionMethod::Deflated);
    #[cfg(feature = "bzip2")]
    methods.push(CompressionMethod::Bzip2);
    methods
}

#[test]
fn round_trip_one_stored_entry() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("foo", FileOptions::default().compression_method(CompressionMethod::Stored))
        .unwrap();
    writer.write_all(CONTENT).unwrap();
    let cursor = writer.finish().unwrap();

    let mut archive = ZipArchive::new(cursor).unwrap();
    let mut file = archive.by_name("foo").unwrap();
    assert_eq!(file.size(), 4);
    assert_eq!(file.crc32(), CONTENT_CRC32);

    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    assert_eq!(out, CONTENT);

    // a read past EOF stays EOF
    let mut scratch = [0u8; 8];
    assert_eq!(file.read(&mut scratch).unwrap(), 0);
}

#[test]
fn every_supported_method_round_trips() {
    for method in methods() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("entry", FileOptions::default().compression_method(method))
            .unwrap();
        writer.write_all(CONTENT).unwrap();
        let cursor = writer.finish().unwrap();

        let mut archive = ZipArchive::new(cursor).unwrap();
        let mut file = archive.by_name("entry").unwrap();
        assert_eq!(file.compression(), method);
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        assert_eq!(out, CONTENT, "method {method:?} round-trip mismatch");
    }
}

#[test]
fn directory_entries_have_trailing_slash_and_zero_size() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.add_directory("a_dir", FileOptions::default()).unwrap();
    let cursor = writer.finish().unwrap();

    let mut archive = ZipArchive::new(cursor).unwrap();
    let file = archive.by_name("a_dir/").unwrap();
    assert!(file.is_dir());
    assert_eq!(file.size(), 0);
    assert!(archive.by_name("a_dir").is_err());
}

#[test]
fn duplicate_names_resolve_to_the_last_written_entry() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("dup", FileOptions::default().compression_method(CompressionMethod::Stored))
        .unwrap();
    writer.write_all(b"first").unwrap();
    writer
        .start_file("dup", FileOptions::default().compression_method(CompressionMethod::Stored))
        .unwrap();
    writer.write_all(b"second").unwrap();
    let cursor = writer.finish().unwrap();

    let mut archive = ZipArchive::new(cursor).unwrap();
    assert_eq!(archive.len(), 1);
    let mut file = archive.by_name("dup").unwrap();
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"second");
}
