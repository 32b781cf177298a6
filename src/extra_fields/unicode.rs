//! Info-ZIP Unicode Path (`0x7075`) and Unicode Comment (`0x6375`) extra fields: a UTF-8
//! override for the file name or comment, guarded by a CRC32 of the original (non-Unicode)
//! bytes it's meant to replace.

use crate::primitive::read_u32_le;
use crate::result::{invalid_extra_field, ZipResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnicodeExtraField {
    pub crc32_of_original: u32,
    pub utf8: Box<str>,
}

impl UnicodeExtraField {
    pub const HEADER_ID_PATH: u16 = 0x7075;
    pub const HEADER_ID_COMMENT: u16 = 0x6375;

    pub fn parse(payload: &[u8]) -> ZipResult<Self> {
        if payload.len() < 5 {
            return invalid_extra_field("unicode extra field shorter than its fixed portion");
        }
        let version = payload[0];
        if version != 1 {
            return invalid_extra_field(format!("unsupported unicode extra field version {version}"));
        }
        let crc32_of_original = read_u32_le(&payload[1..5]);
        let utf8 = String::from_utf8(payload[5..].to_vec())
            .map_err(|_| crate::result::ZipError::InvalidExtraField(
                "unicode extra field payload is not valid UTF-8".into(),
            ))?
            .into_boxed_str();
        Ok(Self {
            crc32_of_original,
            utf8,
        })
    }

    /// Validates this field against the raw (non-Unicode) bytes it's meant to override;
    /// a `false` result means the override must be ignored (the original bytes were rewritten
    /// since the extra field was written).
    pub fn validates(&self, original_bytes: &[u8]) -> bool {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(original_bytes);
        hasher.finalize() == self.crc32_of_original
    }

    pub fn new(original_bytes: &[u8], utf8: impl Into<Box<str>>) -> Self {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(original_bytes);
        Self {
            crc32_of_original: hasher.finalize(),
            utf8: utf8.into(),
        }
    }

    pub fn serialize(&self, header_id: u16) -> Box<[u8]> {
        let mut body = Vec::with_capacity(5 + self.utf8.len());
        body.push(1u8);
        body.extend(self.crc32_of_original.to_le_bytes());
        body.extend(self.utf8.as_bytes());
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
    fn validates_against_original_bytes() {
        let original = "ascii-fallback.txt".as_bytes();
        let field = UnicodeExtraField::new(original, "ünïcödé.txt");
        assert!(field.validates(original));
        assert!(!field.validates(b"different"));
    }

    #[test]
    fn round_trip() {
        let field = UnicodeExtraField::new(b"x", "ü");
        let bytes = field.serialize(UnicodeExtraField::HEADER_ID_PATH);
        let parsed = UnicodeExtraField::parse(&bytes[4..]).unwrap();
        assert_eq!(parsed, field);
    }
}
