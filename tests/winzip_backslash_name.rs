//! An entry written with a literal backslash in its name (the old WinZip/Windows-tool habit,
//! instead of the `/` APPNOTE requires) should only be reachable by its forward-slash form once
//! read back, since the catalog normalizes separators at parse time.

use std::io::{Cursor, Write};

use zipcore::{CompressionMethod, FileOptions, ZipArchive, ZipWriter};

#[test]
fn backslash_named_entry_is_looked_up_by_its_normalized_name() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("a\\b.txt", FileOptions::default().compression_method(CompressionMethod::Stored))
        .unwrap();
    writer.write_all(b"content").unwrap();
    let cursor = writer.finish().unwrap();

    let mut archive = ZipArchive::new(cursor).unwrap();
    assert!(
        archive.by_name("a\\b.txt").is_err(),
        "a literal backslash lookup must miss once the catalog normalizes to forward slashes"
    );
    let file = archive.by_name("a/b.txt").unwrap();
    assert_eq!(file.name(), "a/b.txt");
    assert_eq!(file.name_raw(), b"a\\b.txt", "the raw on-disk bytes keep the original separator");
}
