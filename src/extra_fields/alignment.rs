//! Data-stream alignment extra field (header id `0xa11e`), used by the writer to pad an
//! entry's local extra-field area so its compressed data starts on an aligned offset.

use crate::primitive::read_u16_le;
use crate::result::{invalid_extra_field, ZipResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AlignmentExtraField {
    /// Alignment, in bytes; must be a power of two.
    pub alignment: u16,
    pub padding: u16,
}

impl AlignmentExtraField {
    pub const HEADER_ID: u16 = 0xa11e;

    pub fn parse(payload: &[u8]) -> ZipResult<Self> {
        if payload.len() < 2 {
            return invalid_extra_field("alignment extra field shorter than its 2-byte header");
        }
        let alignment = read_u16_le(&payload[0..2]);
        Ok(Self {
            alignment,
            padding: (payload.len() - 2) as u16,
        })
    }

    pub fn new(alignment: u16, padding: u16) -> ZipResult<Self> {
        if !alignment.is_power_of_two() {
            return invalid_extra_field(format!(
                "alignment must be a power of two, got {alignment}"
            ));
        }
        Ok(Self { alignment, padding })
    }

    pub fn full_size(&self) -> usize {
        4 + 2 + self.padding as usize
    }

    pub fn serialize(&self) -> Box<[u8]> {
        let mut ret = Vec::with_capacity(self.full_size());
        ret.extend(Self::HEADER_ID.to_le_bytes());
        ret.extend((2 + self.padding).to_le_bytes());
        ret.extend(self.alignment.to_le_bytes());
        ret.extend(std::iter::repeat(0u8).take(self.padding as usize));
        ret.into_boxed_slice()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_non_power_of_two() {
        assert!(AlignmentExtraField::new(3, 0).is_err());
        assert!(AlignmentExtraField::new(4, 0).is_ok());
    }

    #[test]
    fn round_trip() {
        let a = AlignmentExtraField::new(16, 5).unwrap();
        let bytes = a.serialize();
        let parsed = AlignmentExtraField::parse(&bytes[4..]).unwrap();
        assert_eq!(parsed.alignment, 16);
        assert_eq!(parsed.padding, 5);
    }
}
