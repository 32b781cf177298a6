//! The JAR marker extra field (header id `0xcafe`): a zero-length record some tools write at
//! the front of the first entry's extra data to mark a ZIP as an executable JAR.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Jar;

impl Jar {
    pub const HEADER_ID: u16 = 0xcafe;

    pub fn serialize(&self) -> Box<[u8]> {
        let mut ret = Vec::with_capacity(4);
        ret.extend(Self::HEADER_ID.to_le_bytes());
        ret.extend(0u16.to_le_bytes());
        ret.into_boxed_slice()
    }
}
