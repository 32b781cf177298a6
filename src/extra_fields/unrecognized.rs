//! Fallback representations for extra-field records this registry doesn't otherwise model:
//! a well-formed but unknown header id ([`UnrecognizedExtraField`]), and a record whose
//! declared length didn't fit the buffer or a known parser rejected ([`UnparseableExtraFieldData`]).

/// A known-length extra-field record whose header id this registry has no variant for. Its
/// payload is carried opaquely so it can be round-tripped on write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnrecognizedExtraField {
    pub header_id: u16,
    pub data: Vec<u8>,
}

impl UnrecognizedExtraField {
    pub fn serialize(&self) -> Box<[u8]> {
        let mut ret = Vec::with_capacity(4 + self.data.len());
        ret.extend(self.header_id.to_le_bytes());
        ret.extend((self.data.len() as u16).to_le_bytes());
        ret.extend(&self.data);
        ret.into_boxed_slice()
    }
}

/// A record that could not be parsed under the active policy: either a registered header id
/// whose payload didn't fit its parser's expectations, or a declared length that ran past the
/// end of the extra-field buffer. Carries everything that was actually readable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnparseableExtraFieldData {
    pub header_id: u16,
    pub data: Vec<u8>,
}

impl UnparseableExtraFieldData {
    /// Re-serializing an unparseable record simply re-emits the bytes as read; this is the
    /// identity half of the round-trip property for malformed input under `BEST_EFFORT`.
    pub fn serialize(&self) -> Box<[u8]> {
        let mut ret = Vec::with_capacity(4 + self.data.len());
        ret.extend(self.header_id.to_le_bytes());
        ret.extend((self.data.len() as u16).to_le_bytes());
        ret.extend(&self.data);
        ret.into_boxed_slice()
    }
}
