//! Past 0xFFFF entries the fixed EOCD record's 16-bit entry count can no longer hold the real
//! total, so it's pinned to the `0xFFFF` sentinel and the true count moves to the ZIP64 EOCD
//! record instead. Exercised with `0xFFFF + 1` empty stored entries — enough to cross the
//! threshold without writing the hundred thousand a full-scale description would use.

use std::io::{Cursor, Write};

use zipcore::{CompressionMethod, FileOptions, ZipArchive, ZipWriter};

#[test]
fn archive_past_64k_entries_uses_zip64_entry_count() {
    let count = 0xFFFFu32 + 1;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..count {
        writer
            .start_file(format!("f{i}"), FileOptions::default().compression_method(CompressionMethod::Stored))
            .unwrap();
    }
    let cursor = writer.finish().unwrap();

    let mut archive = ZipArchive::new(cursor).unwrap();
    assert_eq!(archive.len(), count as usize);
    let mut file = archive.by_name(&format!("f{}", count - 1)).unwrap();
    assert_eq!(file.size(), 0);
}
