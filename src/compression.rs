//! The set of compression methods a ZIP entry may declare, and the encoder/decoder each one
//! provides.

use std::fmt;

/// Compression methods for the contents of a ZIP file.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[non_exhaustive]
pub enum CompressionMethod {
    /// No compression at all ("store").
    Stored,
    /// The common DEFLATE algorithm, as implemented by `flate2`.
    #[cfg(feature = "deflate")]
    Deflated,
    /// DEFLATE64, decode-only: a 64 KiB-window variant found in some legacy archives.
    #[cfg(feature = "deflate64")]
    Deflate64,
    /// BZIP2.
    #[cfg(feature = "bzip2")]
    Bzip2,
    /// The legacy "imploding" method (methods 6), decode-only.
    #[cfg(feature = "legacy-zip")]
    Imploding,
    /// The legacy "shrinking" method (method 1, LZW with partial clearing), decode-only.
    #[cfg(feature = "legacy-zip")]
    Unshrinking,
    /// Any other method code recognized on disk but without an encoder/decoder in this build.
    Unsupported(u16),
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[allow(deprecated)]
impl CompressionMethod {
    pub const STORE: Self = CompressionMethod::Stored;
    #[cfg(feature = "deflate")]
    pub const DEFLATE: Self = CompressionMethod::Deflated;
    #[cfg(feature = "bzip2")]
    pub const BZIP2: Self = CompressionMethod::Bzip2;

    /// Decodes a raw method code from a local or central header into a `CompressionMethod`.
    pub const fn from_u16(val: u16) -> CompressionMethod {
        match val {
            0 => CompressionMethod::Stored,
            #[cfg(feature = "legacy-zip")]
            1 => CompressionMethod::Unshrinking,
            #[cfg(feature = "legacy-zip")]
            6 => CompressionMethod::Imploding,
            #[cfg(feature = "deflate")]
            8 => CompressionMethod::Deflated,
            #[cfg(feature = "deflate64")]
            9 => CompressionMethod::Deflate64,
            #[cfg(feature = "bzip2")]
            12 => CompressionMethod::Bzip2,
            v => CompressionMethod::Unsupported(v),
        }
    }

    /// Encodes this method back to the raw 16-bit code stored in headers.
    pub const fn to_u16(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            #[cfg(feature = "legacy-zip")]
            CompressionMethod::Unshrinking => 1,
            #[cfg(feature = "legacy-zip")]
            CompressionMethod::Imploding => 6,
            #[cfg(feature = "deflate")]
            CompressionMethod::Deflated => 8,
            #[cfg(feature = "deflate64")]
            CompressionMethod::Deflate64 => 9,
            #[cfg(feature = "bzip2")]
            CompressionMethod::Bzip2 => 12,
            CompressionMethod::Unsupported(v) => v,
        }
    }

    /// True if this build can produce a [`Read`](std::io::Read) decoder for the method.
    pub const fn can_decode(self) -> bool {
        !matches!(self, CompressionMethod::Unsupported(_))
    }

    /// True if this build can produce an encoder for the method (a strict subset of
    /// [`Self::can_decode`]: several legacy methods are decode-only).
    pub fn can_encode(self) -> bool {
        if matches!(self, CompressionMethod::Stored) {
            return true;
        }
        #[cfg(feature = "deflate")]
        if matches!(self, CompressionMethod::Deflated) {
            return true;
        }
        #[cfg(feature = "bzip2")]
        if matches!(self, CompressionMethod::Bzip2) {
            return true;
        }
        false
    }
}

impl Default for CompressionMethod {
    fn default() -> Self {
        #[cfg(feature = "deflate")]
        {
            CompressionMethod::Deflated
        }
        #[cfg(not(feature = "deflate"))]
        {
            CompressionMethod::Stored
        }
    }
}

/// Compression level presets accepted by [`crate::write::FileOptions::compression_level`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompressionLevel {
    Fastest,
    Default,
    Best,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_known_methods() {
        for &code in &[0u16, 1, 6, 8, 9, 12, 99] {
            let m = CompressionMethod::from_u16(code);
            assert_eq!(m.to_u16(), code);
        }
    }

    #[test]
    fn stored_is_always_encodable() {
        assert!(CompressionMethod::Stored.can_encode());
        assert!(CompressionMethod::Stored.can_decode());
    }

    #[cfg(feature = "legacy-zip")]
    #[test]
    fn legacy_methods_decode_only() {
        assert!(CompressionMethod::Imploding.can_decode());
        assert!(!CompressionMethod::Imploding.can_encode());
        assert!(CompressionMethod::Unshrinking.can_decode());
        assert!(!CompressionMethod::Unshrinking.can_encode());
    }

    #[test]
    fn unsupported_is_never_usable() {
        let m = CompressionMethod::Unsupported(99);
        assert!(!m.can_decode());
        assert!(!m.can_encode());
    }
}
