//! Unix-ownership extra fields: the modern variable-length form (header id `0x7875`,
//! "UX" / Info-ZIP New Unix) and the older fixed-width forms (`0x5855` Info-ZIP Unix / `0x0007`
//! PKWARE Unix), which also carry 32-bit timestamps.

use crate::primitive::{read_u16_le, read_u32_le};
use crate::result::{invalid_extra_field, ZipResult};

/// Info-ZIP New Unix extra field (`0x7875`): variable-length uid/gid, large enough for 64-bit
/// ids on modern systems.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NewUnixExtraField {
    pub version: u8,
    pub uid: u64,
    pub gid: u64,
}

impl NewUnixExtraField {
    pub const HEADER_ID: u16 = 0x7875;

    pub fn parse(payload: &[u8]) -> ZipResult<Self> {
        if payload.is_empty() {
            return invalid_extra_field("New Unix extra field is empty");
        }
        let version = payload[0];
        let mut pos = 1usize;
        let uid = read_variable_length_int(payload, &mut pos)?;
        let gid = read_variable_length_int(payload, &mut pos)?;
        Ok(Self { version, uid, gid })
    }

    pub fn serialize(&self) -> Box<[u8]> {
        let mut body = vec![self.version];
        write_variable_length_int(&mut body, self.uid);
        write_variable_length_int(&mut body, self.gid);
        let mut ret = Vec::with_capacity(4 + body.len());
        ret.extend(Self::HEADER_ID.to_le_bytes());
        ret.extend((body.len() as u16).to_le_bytes());
        ret.extend(body);
        ret.into_boxed_slice()
    }
}

fn read_variable_length_int(payload: &[u8], pos: &mut usize) -> ZipResult<u64> {
    if *pos >= payload.len() {
        return invalid_extra_field("New Unix extra field truncated before a size byte");
    }
    let len = payload[*pos] as usize;
    *pos += 1;
    if *pos + len > payload.len() {
        return invalid_extra_field("New Unix extra field truncated inside an id");
    }
    let mut buf = [0u8; 8];
    buf[..len.min(8)].copy_from_slice(&payload[*pos..*pos + len.min(8)]);
    *pos += len;
    Ok(u64::from_le_bytes(buf))
}

fn write_variable_length_int(out: &mut Vec<u8>, value: u64) {
    let bytes = value.to_le_bytes();
    let significant = 8 - value.leading_zeros() as usize / 8;
    let significant = significant.max(1);
    out.push(significant as u8);
    out.extend(&bytes[..significant]);
}

/// Old-style fixed-width Unix extra field, shared by the Info-ZIP (`0x5855`) and PKWARE
/// (`0x0007`) tags: atime/mtime as signed 32-bit Unix seconds, then 16-bit uid/gid, then
/// optional device-specific data (symlink target, device major/minor) carried opaquely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OldUnixExtraField {
    pub atime: i32,
    pub mtime: i32,
    pub uid: u16,
    pub gid: u16,
    pub variable_data: Vec<u8>,
}

impl OldUnixExtraField {
    pub const HEADER_ID_INFOZIP: u16 = 0x5855;
    pub const HEADER_ID_PKWARE: u16 = 0x0007;

    pub fn parse(payload: &[u8]) -> ZipResult<Self> {
        if payload.len() < 8 {
            return invalid_extra_field("Old Unix extra field shorter than its fixed portion");
        }
        let atime = read_u32_le(&payload[0..4]) as i32;
        let mtime = read_u32_le(&payload[4..8]) as i32;
        let (uid, gid, variable_data) = if payload.len() >= 12 {
            (
                read_u16_le(&payload[8..10]),
                read_u16_le(&payload[10..12]),
                payload[12..].to_vec(),
            )
        } else {
            (0, 0, Vec::new())
        };
        Ok(Self {
            atime,
            mtime,
            uid,
            gid,
            variable_data,
        })
    }

    pub fn serialize(&self, header_id: u16) -> Box<[u8]> {
        let mut body = Vec::with_capacity(12 + self.variable_data.len());
        body.extend((self.atime as u32).to_le_bytes());
        body.extend((self.mtime as u32).to_le_bytes());
        body.extend(self.uid.to_le_bytes());
        body.extend(self.gid.to_le_bytes());
        body.extend(&self.variable_data);
        let mut ret = Vec::with_capacity(4 + body.len());
        ret.extend(header_id.to_le_bytes());
        ret.extend((body.len() as u16).to_le_bytes());
        ret.extend(body);
        ret.into_boxed_slice()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn variable_length_int_round_trip() {
        for v in [0u64, 1, 255, 65536, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_variable_length_int(&mut buf, v);
            let mut pos = 0;
            assert_eq!(read_variable_length_int(&buf, &mut pos).unwrap(), v);
            assert_eq!(pos, buf.len());
        }
    }

    #[test]
    fn new_unix_round_trip() {
        let f = NewUnixExtraField {
            version: 1,
            uid: 1000,
            gid: 1000,
        };
        let bytes = f.serialize();
        let parsed = NewUnixExtraField::parse(&bytes[4..]).unwrap();
        assert_eq!(parsed, f);
    }

    #[test]
    fn old_unix_round_trip() {
        let f = OldUnixExtraField {
            atime: -1,
            mtime: 12345,
            uid: 501,
            gid: 20,
            variable_data: vec![],
        };
        let bytes = f.serialize(OldUnixExtraField::HEADER_ID_INFOZIP);
        let parsed = OldUnixExtraField::parse(&bytes[4..]).unwrap();
        assert_eq!(parsed, f);
    }
}
