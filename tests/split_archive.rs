//! Writes a multi-volume archive through `FileSplitSink`/`StreamingZipWriter` and reads it back
//! through `SplitArchiveReader`, which presents the numbered segments as one virtually
//! concatenated stream. The segment size here is small enough to force several rotations for a
//! payload well under a megabyte, rather than needing an archive actually sized in gigabytes.

use std::io::{Read, Write};

use tempfile::TempDir;
use zipcore::{
    CompressionMethod, FileOptions, FileSplitSink, SplitArchiveReader, SplitWriter,
    StreamingZipWriter, ZipArchive,
};

#[test]
fn split_archive_round_trips_across_segments() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("archive.zip");

    let sink = FileSplitSink::create(base.clone(), 256).unwrap();
    let mut writer = StreamingZipWriter::new(SplitWriter::new(sink));
    for i in 0..20 {
        let name = format!("entry_{i}.txt");
        writer
            .start_file(name.as_str(), FileOptions::default().compression_method(CompressionMethod::Stored))
            .unwrap();
        writer.write_all(format!("payload for entry {i}").as_bytes()).unwrap();
    }
    let split_writer = writer.finish().unwrap();
    split_writer.into_inner().finish().unwrap();

    assert!(dir.path().join("archive.z01").is_file(), "writing 20 small entries into 256-byte segments should rotate at least once");

    let reader = SplitArchiveReader::build_from_last_segment(&base).unwrap();
    let mut archive = ZipArchive::new(reader).unwrap();
    assert_eq!(archive.len(), 20);
    for i in 0..20 {
        let name = format!("entry_{i}.txt");
        let mut file = archive.by_name(&name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        assert_eq!(out, format!("payload for entry {i}"));
    }
}
