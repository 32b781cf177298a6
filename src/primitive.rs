//! Little-endian primitive helpers used throughout the wire-format codecs.
//!
//! The fixed-size record types in [`crate::spec`] read their fields directly via
//! [`crate::spec::Block`]; this module exists for the call sites that parse variable-length
//! payloads (mainly extra fields) byte-by-byte out of a `&[u8]` or a `Read` stream.

use std::io::{self, Read};

/// Reads a little-endian `u16` from the front of a byte slice.
pub(crate) fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Reads a little-endian `u32` from the front of a byte slice.
pub(crate) fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Reads a little-endian `u64` from the front of a byte slice.
pub(crate) fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Extension trait replacing the need for an external little-endian-read crate: every
/// extra-field and legacy-decoder call site reads fixed-width little-endian integers straight
/// off a `Read` impl.
pub(crate) trait LittleEndianReadExt: Read {
    fn read_u8_le(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16_le(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32_le(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64_le(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_i32_le(&mut self) -> io::Result<i32> {
        Ok(self.read_u32_le()? as i32)
    }
}

impl<R: Read + ?Sized> LittleEndianReadExt for R {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_slice_reads() {
        assert_eq!(read_u16_le(&[0x34, 0x12]), 0x1234);
        assert_eq!(read_u32_le(&[0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
        assert_eq!(
            read_u64_le(&[0, 0, 0, 0, 0, 0, 0x01, 0x00]),
            0x0001_0000_0000_0000
        );
    }

    #[test]
    fn reader_ext() {
        let mut cur = io::Cursor::new([0x01, 0x00, 0x02, 0x00, 0x00, 0x00]);
        assert_eq!(cur.read_u16_le().unwrap(), 1);
        assert_eq!(cur.read_u32_le().unwrap(), 2);
    }
}
