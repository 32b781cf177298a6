//! NTFS extra field (header id `0x000a`): three 100-nanosecond-resolution timestamps counted
//! from 1601-01-01, as Windows itself stores them (`FILETIME`).

use crate::primitive::{read_u16_le, read_u64_le};
use crate::result::{invalid_extra_field, ZipResult};

/// Offset in 100ns ticks between the Windows epoch (1601-01-01) and the Unix epoch
/// (1970-01-01).
const TICKS_BETWEEN_EPOCHS: u64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: u64 = 10_000_000;

/// One NTFS 100ns tick count, expressible either as a raw `FILETIME`-style value or as Unix
/// seconds + nanoseconds for interop with [`crate::types::DateTime`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NtfsTimestamp(pub u64);

impl NtfsTimestamp {
    pub fn from_unix(seconds: i64, nanos: u32) -> Self {
        let ticks = (seconds * TICKS_PER_SECOND as i64) as i128
            + (nanos as i128 / 100)
            + TICKS_BETWEEN_EPOCHS as i128;
        Self(ticks.max(0) as u64)
    }

    pub fn unix_seconds(&self) -> i64 {
        (self.0 as i128 - TICKS_BETWEEN_EPOCHS as i128).div_euclid(TICKS_PER_SECOND as i128) as i64
    }
}

/// Attribute tag 1 of the NTFS extra field: the only attribute this implementation
/// understands. Other tags round-trip as raw bytes via [`NtfsAttr::Unknown`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NtfsAttr1 {
    pub mtime: NtfsTimestamp,
    pub atime: NtfsTimestamp,
    pub ctime: NtfsTimestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NtfsAttr {
    Attr1(NtfsAttr1),
    Unknown { tag: u16, data: Vec<u8> },
}

/// NTFS extra field (header id `0x000a`): 4 reserved bytes, then a sequence of
/// tag/size/data attribute records.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Ntfs {
    pub attrs: Vec<NtfsAttr>,
}

impl Ntfs {
    pub const HEADER_ID: u16 = 0x000a;

    pub fn parse(payload: &[u8]) -> ZipResult<Self> {
        if payload.len() < 4 {
            return invalid_extra_field("NTFS extra field shorter than its 4 reserved bytes");
        }
        let mut pos = 4usize;
        let mut attrs = Vec::new();
        while pos + 4 <= payload.len() {
            let tag = read_u16_le(&payload[pos..pos + 2]);
            let size = read_u16_le(&payload[pos + 2..pos + 4]) as usize;
            pos += 4;
            if pos + size > payload.len() {
                return invalid_extra_field("NTFS attribute record overruns its extra field");
            }
            let data = &payload[pos..pos + size];
            attrs.push(if tag == 0x0001 && size == 24 {
                NtfsAttr::Attr1(NtfsAttr1 {
                    mtime: NtfsTimestamp(read_u64_le(&data[0..8])),
                    atime: NtfsTimestamp(read_u64_le(&data[8..16])),
                    ctime: NtfsTimestamp(read_u64_le(&data[16..24])),
                })
            } else {
                NtfsAttr::Unknown {
                    tag,
                    data: data.to_vec(),
                }
            });
            pos += size;
        }
        Ok(Self { attrs })
    }

    pub(crate) fn from_times(
        mtime: Option<NtfsTimestamp>,
        atime: Option<NtfsTimestamp>,
        ctime: Option<NtfsTimestamp>,
    ) -> Option<Self> {
        let mtime = mtime?;
        Some(Self {
            attrs: vec![NtfsAttr::Attr1(NtfsAttr1 {
                mtime,
                atime: atime.unwrap_or(mtime),
                ctime: ctime.unwrap_or(mtime),
            })],
        })
    }

    /// Convenience accessor for the one attribute type this implementation produces/consumes.
    pub fn attr1(&self) -> Option<&NtfsAttr1> {
        self.attrs.iter().find_map(|a| match a {
            NtfsAttr::Attr1(a1) => Some(a1),
            NtfsAttr::Unknown { .. } => None,
        })
    }

    pub fn serialize(&self) -> Box<[u8]> {
        let mut body = vec![0u8; 4];
        for attr in &self.attrs {
            match attr {
                NtfsAttr::Attr1(a) => {
                    body.extend(1u16.to_le_bytes());
                    body.extend(24u16.to_le_bytes());
                    body.extend(a.mtime.0.to_le_bytes());
                    body.extend(a.atime.0.to_le_bytes());
                    body.extend(a.ctime.0.to_le_bytes());
                }
                NtfsAttr::Unknown { tag, data } => {
                    body.extend(tag.to_le_bytes());
                    body.extend((data.len() as u16).to_le_bytes());
                    body.extend(data);
                }
            }
        }
        let mut ret = Vec::with_capacity(4 + body.len());
        ret.extend(Self::HEADER_ID.to_le_bytes());
        ret.extend((body.len() as u16).to_le_bytes());
        ret.extend(body);
        ret.into_boxed_slice()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_attr1() {
        let ts = NtfsTimestamp::from_unix(1_600_000_000, 0);
        let ntfs = Ntfs::from_times(Some(ts), None, None).unwrap();
        let bytes = ntfs.serialize();
        let parsed = Ntfs::parse(&bytes[4..]).unwrap();
        assert_eq!(parsed.attr1().unwrap().mtime, ts);
        assert_eq!(parsed.attr1().unwrap().atime, ts);
    }

    #[test]
    fn unix_round_trip_is_within_a_tick() {
        let ts = NtfsTimestamp::from_unix(1_700_000_000, 0);
        assert_eq!(ts.unix_seconds(), 1_700_000_000);
    }
}
