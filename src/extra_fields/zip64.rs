//! 4.5.3 - Zip64 Extended Information Extra Field (0x0001)
//!
//! | Value                  | Size    | Description                                  |
//! | ----------------------- | ------- | -------------------------------------------- |
//! | `0x0001`                | 2 bytes | Tag for this "extra" block type              |
//! | Size                    | 2 bytes | Size of this "extra" block                   |
//! | Original Size           | 8 bytes | Original uncompressed file size              |
//! | Compressed Size         | 8 bytes | Size of compressed data                      |
//! | Relative Header Offset  | 8 bytes | Offset of local header record                |
//! | Disk Start Number       | 4 bytes | Number of the disk on which this file starts |
//!
//! The local-header form always carries both sizes together (or is absent). The
//! central-directory form carries only the fields whose fixed-size slot held the `0xFFFFFFFF`
//! sentinel, in the fixed order above.

use crate::primitive::{read_u32_le, read_u64_le};
use crate::result::{invalid_extra_field, ZipResult};
use crate::spec::ZIP64_BYTES_THR;
use core::mem;

/// Which fixed-header fields were sentinel `0xFFFFFFFF` and therefore must be found here.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct Zip64Needs {
    pub uncompressed_size: bool,
    pub compressed_size: bool,
    pub header_start: bool,
}

/// The ZIP64 extended-information extra field (header id `0x0001`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Zip64ExtendedInformation {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub header_start: Option<u64>,
    pub disk_start: Option<u32>,
}

impl Zip64ExtendedInformation {
    pub const HEADER_ID: u16 = 0x0001;

    pub(crate) fn from_new_entry(is_large_file: bool) -> Option<Self> {
        if is_large_file {
            Self::local_header(u64::MAX, u64::MAX)
        } else {
            None
        }
    }

    /// The local-header form: both sizes must be present together.
    pub(crate) fn local_header(uncompressed_size: u64, compressed_size: u64) -> Option<Self> {
        if uncompressed_size < ZIP64_BYTES_THR && compressed_size < ZIP64_BYTES_THR {
            return None;
        }
        Some(Self {
            uncompressed_size: Some(uncompressed_size),
            compressed_size: Some(compressed_size),
            header_start: None,
            disk_start: None,
        })
    }

    /// The central-directory form: only fields that actually need promoting are included.
    pub(crate) fn central_header(
        uncompressed_size: u64,
        compressed_size: u64,
        header_start: u64,
    ) -> Option<Self> {
        let uncompressed_size = (uncompressed_size >= ZIP64_BYTES_THR).then_some(uncompressed_size);
        let compressed_size = (compressed_size >= ZIP64_BYTES_THR).then_some(compressed_size);
        let header_start = (header_start >= ZIP64_BYTES_THR).then_some(header_start);
        if uncompressed_size.is_none() && compressed_size.is_none() && header_start.is_none() {
            return None;
        }
        Some(Self {
            uncompressed_size,
            compressed_size,
            header_start,
            disk_start: None,
        })
    }

    /// Parses a ZIP64 extra-field payload. `is_local` selects the local-header reading rule
    /// (both sizes present, unconditionally); otherwise `needs` says which fields to expect, in
    /// fixed order.
    pub(crate) fn parse(payload: &[u8], is_local: bool, needs: Zip64Needs) -> ZipResult<Self> {
        let mut pos = 0usize;
        let mut take_u64 = |pos: &mut usize| -> ZipResult<Option<u64>> {
            if *pos + 8 > payload.len() {
                return Ok(None);
            }
            let v = read_u64_le(&payload[*pos..*pos + 8]);
            *pos += 8;
            Ok(Some(v))
        };

        let (uncompressed_size, compressed_size, header_start) = if is_local {
            let u = take_u64(&mut pos)?;
            let c = take_u64(&mut pos)?;
            (u, c, None)
        } else {
            let u = if needs.uncompressed_size {
                take_u64(&mut pos)?
            } else {
                None
            };
            let c = if needs.compressed_size {
                take_u64(&mut pos)?
            } else {
                None
            };
            let h = if needs.header_start {
                take_u64(&mut pos)?
            } else {
                None
            };
            (u, c, h)
        };

        let disk_start = if pos + 4 <= payload.len() {
            Some(read_u32_le(&payload[pos..pos + 4]))
        } else {
            None
        };

        if (is_local || needs.uncompressed_size) && uncompressed_size.is_none()
            || (is_local || needs.compressed_size) && compressed_size.is_none()
        {
            return invalid_extra_field(
                "zip64 extra field is too short for the fields its header declared as oversized",
            );
        }

        Ok(Self {
            uncompressed_size,
            compressed_size,
            header_start,
            disk_start,
        })
    }

    fn body_len(&self) -> usize {
        [
            self.uncompressed_size.is_some(),
            self.compressed_size.is_some(),
            self.header_start.is_some(),
        ]
        .iter()
        .filter(|x| **x)
        .count()
            * mem::size_of::<u64>()
            + if self.disk_start.is_some() { 4 } else { 0 }
    }

    /// Full on-disk size of this field, header included.
    pub(crate) fn full_size(&self) -> usize {
        4 + self.body_len()
    }

    /// Serializes the local-header form: both sizes, always, in order.
    pub fn serialize_local(&self) -> Box<[u8]> {
        let uncompressed_size = self.uncompressed_size.unwrap_or(u64::MAX);
        let compressed_size = self.compressed_size.unwrap_or(u64::MAX);
        let mut ret = Vec::with_capacity(20);
        ret.extend(Self::HEADER_ID.to_le_bytes());
        ret.extend(16u16.to_le_bytes());
        ret.extend(uncompressed_size.to_le_bytes());
        ret.extend(compressed_size.to_le_bytes());
        ret.into_boxed_slice()
    }

    /// Serializes the central-directory form: only the fields that are `Some`, in fixed order.
    pub fn serialize_central(&self) -> Box<[u8]> {
        let body_len = self.body_len();
        let mut ret = Vec::with_capacity(4 + body_len);
        ret.extend(Self::HEADER_ID.to_le_bytes());
        ret.extend((body_len as u16).to_le_bytes());
        if let Some(v) = self.uncompressed_size {
            ret.extend(v.to_le_bytes());
        }
        if let Some(v) = self.compressed_size {
            ret.extend(v.to_le_bytes());
        }
        if let Some(v) = self.header_start {
            ret.extend(v.to_le_bytes());
        }
        if let Some(v) = self.disk_start {
            ret.extend(v.to_le_bytes());
        }
        debug_assert_eq!(ret.len(), self.full_size());
        ret.into_boxed_slice()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_header_round_trip() {
        let z = Zip64ExtendedInformation::local_header(ZIP64_BYTES_THR, 5).unwrap();
        let bytes = z.serialize_local();
        let payload = &bytes[4..];
        let parsed = Zip64ExtendedInformation::parse(payload, true, Zip64Needs::default()).unwrap();
        assert_eq!(parsed.uncompressed_size, Some(ZIP64_BYTES_THR));
        assert_eq!(parsed.compressed_size, Some(5));
    }

    #[test]
    fn central_header_only_includes_needed_fields() {
        let z = Zip64ExtendedInformation::central_header(10, ZIP64_BYTES_THR, 20).unwrap();
        assert_eq!(z.uncompressed_size, None);
        assert_eq!(z.compressed_size, Some(ZIP64_BYTES_THR));
        assert_eq!(z.header_start, None);
        assert_eq!(z.full_size(), 4 + 8);
    }

    #[test]
    fn below_threshold_yields_no_field() {
        assert!(Zip64ExtendedInformation::local_header(10, 10).is_none());
        assert!(Zip64ExtendedInformation::central_header(10, 10, 10).is_none());
    }
}
