//! Info-ZIP Extended Timestamp extra field (header id `0x5455`), as described in
//! <https://libzip.org/specifications/extrafld.txt>.

use crate::primitive::LittleEndianReadExt;
use crate::result::{invalid, ZipError, ZipResult};
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedTimestamp {
    mod_time: Option<u32>,
    ac_time: Option<u32>,
    cr_time: Option<u32>,
}

impl ExtendedTimestamp {
    pub const HEADER_ID: u16 = 0x5455;

    /// Creates an extended timestamp struct by reading the required bytes from the reader.
    ///
    /// Assumes the length has already been read off the extra-field header; it must be passed
    /// in as `len`.
    pub fn try_from_reader<R>(reader: &mut R, len: u16) -> ZipResult<Self>
    where
        R: Read,
    {
        if len == 0 {
            return Err(invalid!("Extended timestamp field is empty"));
        }
        let mut flags = [0u8];
        let mut bytes_to_read = len as usize;
        reader.read_exact(&mut flags)?;
        bytes_to_read -= flags.len();
        let flags = flags[0];

        // The `flags` field refers to the local headers and might not correspond to `len`. If
        // the length field is 1+4, only the modification time was set.
        //
        // > Those times that are present will appear in the order indicated, but any
        // > combination of times may be omitted. TSize should equal (1 + 4*(number of set bits
        // > in Flags)), as the block is currently defined.
        if len != 5 && u32::from(len) != 1 + 4 * flags.count_ones() {
            return Err(ZipError::InvalidExtraField(
                format!("flags and len don't match in extended timestamp field len={len} flags={flags:08b}").into(),
            ));
        }

        let mod_time = if (flags & 0b0000_0001_u8 == 0b0000_0001_u8) || len == 5 {
            bytes_to_read -= 4;
            Some(reader.read_u32_le()?)
        } else {
            None
        };

        let ac_time = if flags & 0b0000_0010_u8 == 0b0000_0010_u8 && len > 5 {
            bytes_to_read -= 4;
            Some(reader.read_u32_le()?)
        } else {
            None
        };

        let cr_time = if flags & 0b0000_0100_u8 == 0b0000_0100_u8 && len > 5 {
            bytes_to_read -= 4;
            Some(reader.read_u32_le()?)
        } else {
            None
        };

        if bytes_to_read > 0 {
            // Ignore undocumented trailing bytes.
            reader.read_exact(&mut vec![0; bytes_to_read])?;
        }

        Ok(Self {
            mod_time,
            ac_time,
            cr_time,
        })
    }

    pub(crate) fn from_times(
        mod_time: Option<i32>,
        ac_time: Option<i32>,
        cr_time: Option<i32>,
    ) -> Option<Self> {
        if mod_time.is_none() && ac_time.is_none() && cr_time.is_none() {
            return None;
        }
        Some(Self {
            mod_time: mod_time.map(|v| v as u32),
            ac_time: ac_time.map(|v| v as u32),
            cr_time: cr_time.map(|v| v as u32),
        })
    }

    /// Last modification timestamp, if present, as UNIX epoch seconds.
    #[must_use]
    pub fn mod_time(&self) -> Option<u32> {
        self.mod_time
    }

    /// Last access timestamp, if present, as UNIX epoch seconds.
    #[must_use]
    pub fn ac_time(&self) -> Option<u32> {
        self.ac_time
    }

    /// Creation timestamp, if present, as UNIX epoch seconds.
    #[must_use]
    pub fn cr_time(&self) -> Option<u32> {
        self.cr_time
    }

    fn flags(&self) -> u8 {
        (self.mod_time.is_some() as u8)
            | ((self.ac_time.is_some() as u8) << 1)
            | ((self.cr_time.is_some() as u8) << 2)
    }

    /// Serializes the local-header form: flags byte plus every present time, in order.
    pub fn serialize_local(&self) -> Box<[u8]> {
        let mut body = vec![self.flags()];
        for t in [self.mod_time, self.ac_time, self.cr_time].into_iter().flatten() {
            body.extend(t.to_le_bytes());
        }
        let mut ret = Vec::with_capacity(4 + body.len());
        ret.extend(Self::HEADER_ID.to_le_bytes());
        ret.extend((body.len() as u16).to_le_bytes());
        ret.extend(body);
        ret.into_boxed_slice()
    }

    /// Serializes the central-directory form: only bit 0 (modify time) is ever retained,
    /// regardless of which bits the local header carried.
    pub fn serialize_central(&self) -> Box<[u8]> {
        let mut ret = Vec::with_capacity(9);
        ret.extend(Self::HEADER_ID.to_le_bytes());
        match self.mod_time {
            Some(t) => {
                ret.extend(5u16.to_le_bytes());
                ret.push(0b0000_0001);
                ret.extend(t.to_le_bytes());
            }
            None => ret.extend(1u16.to_le_bytes().into_iter().chain([0u8])),
        }
        ret.into_boxed_slice()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    pub fn test_bad_extended_timestamp_empty() {
        let mut c = Cursor::new([0u8; 0]);
        assert!(ExtendedTimestamp::try_from_reader(&mut c, 0).is_err());
    }

    #[test]
    fn flags_seven_round_trip() {
        let ts = ExtendedTimestamp::from_times(Some(0x7FFFFFFFu32 as i32), Some(0x7FFFFFFFu32 as i32), Some(0x7FFFFFFFu32 as i32)).unwrap();
        let local = ts.serialize_local();
        assert_eq!(
            &local[..],
            &[
                0x55, 0x54, 13, 0, 7, 0xff, 0xff, 0xff, 0x7f, 0xff, 0xff, 0xff, 0x7f, 0xff, 0xff,
                0xff, 0x7f
            ]
        );
        let central = ts.serialize_central();
        assert_eq!(&central[..], &[0x55, 0x54, 5, 0, 1, 0xff, 0xff, 0xff, 0x7f]);

        let mut reader = Cursor::new(&local[4..]);
        let len = u16::from_le_bytes([local[2], local[3]]);
        let reparsed = ExtendedTimestamp::try_from_reader(&mut reader, len).unwrap();
        assert_eq!(reparsed.mod_time(), Some(0x7FFFFFFF));
        assert_eq!(reparsed.ac_time(), Some(0x7FFFFFFF));
        assert_eq!(reparsed.cr_time(), Some(0x7FFFFFFF));
    }
}
