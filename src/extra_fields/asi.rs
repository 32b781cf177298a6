//! ASi Unix extra field (header id `0x756e`): Unix mode, uid/gid, optional symlink target, all
//! protected by a CRC32 of the field's own body (excluding the CRC itself).

use crate::primitive::{read_u16_le, read_u32_le};
use crate::result::{ZipError, ZipResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asi {
    pub mode: u16,
    pub uid: u16,
    pub gid: u16,
    pub link_target: Vec<u8>,
}

impl Asi {
    pub const HEADER_ID: u16 = 0x756e;

    pub fn parse(payload: &[u8]) -> ZipResult<Self> {
        if payload.len() < 8 {
            return Err(ZipError::InvalidExtraField(
                "ASi extra field shorter than its fixed portion".into(),
            ));
        }
        let crc = read_u32_le(&payload[0..4]);
        let mode = read_u16_le(&payload[4..6]);
        // bytes [6..8] are a reserved "size dev" field, historically unused for regular files.
        let uid = if payload.len() >= 12 {
            read_u16_le(&payload[8..10])
        } else {
            0
        };
        let gid = if payload.len() >= 12 {
            read_u16_le(&payload[10..12])
        } else {
            0
        };
        let link_target = if payload.len() > 12 {
            payload[12..].to_vec()
        } else {
            Vec::new()
        };

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload[4..]);
        let computed = hasher.finalize();
        if computed != crc {
            return Err(ZipError::BadChecksum {
                expected: crc,
                found: computed,
            });
        }

        Ok(Self {
            mode,
            uid,
            gid,
            link_target,
        })
    }

    pub fn serialize(&self) -> Box<[u8]> {
        let mut tail = Vec::with_capacity(8 + self.link_target.len());
        tail.extend(self.mode.to_le_bytes());
        tail.extend(0u16.to_le_bytes()); // reserved "size dev"
        tail.extend(self.uid.to_le_bytes());
        tail.extend(self.gid.to_le_bytes());
        tail.extend(&self.link_target);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&tail);
        let crc = hasher.finalize();

        let mut body = Vec::with_capacity(4 + tail.len());
        body.extend(crc.to_le_bytes());
        body.extend(tail);

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
    fn round_trip() {
        let a = Asi {
            mode: 0o100644,
            uid: 1000,
            gid: 1000,
            link_target: Vec::new(),
        };
        let bytes = a.serialize();
        let parsed = Asi::parse(&bytes[4..]).unwrap();
        assert_eq!(parsed, a);
    }

    #[test]
    fn bad_crc_is_rejected() {
        let a = Asi {
            mode: 0o100644,
            uid: 0,
            gid: 0,
            link_target: Vec::new(),
        };
        let mut bytes = a.serialize().into_vec();
        bytes[4] ^= 0xff;
        assert!(matches!(
            Asi::parse(&bytes[4..]),
            Err(ZipError::BadChecksum { .. })
        ));
    }
}
