//! The extra-field registry: a header-id-keyed polymorphic set of extra-field records attached
//! to local file headers and central directory headers. See
//! <https://libzip.org/specifications/extrafld.txt> for the format this module parses.

pub mod alignment;
pub mod asi;
pub mod jar;
pub mod ntfs;
pub mod timestamp;
pub mod unicode;
pub mod unix;
pub mod unrecognized;
pub mod zip64;

pub use alignment::AlignmentExtraField;
pub use asi::Asi;
pub use jar::Jar;
pub use ntfs::Ntfs;
pub use timestamp::ExtendedTimestamp;
pub use unicode::UnicodeExtraField;
pub use unix::{NewUnixExtraField, OldUnixExtraField};
pub use unrecognized::{UnparseableExtraFieldData, UnrecognizedExtraField};
pub use zip64::{Zip64ExtendedInformation, Zip64Needs};

use crate::primitive::read_u16_le;
use crate::result::ZipResult;

/// How strictly the registry should react to a malformed or partially-readable extra-field
/// record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Fail the whole parse on the first malformed record.
    Strict,
    /// Capture malformed records as [`ExtraField::Unparseable`] and keep going.
    #[default]
    BestEffort,
    /// Drop malformed records silently but stop scanning further records on the first one seen.
    OnlyParseableStrict,
    /// Drop malformed records silently and keep going.
    OnlyParseableLenient,
    /// Strict only for records whose header id is registered; unknown ids always pass through
    /// as [`ExtraField::Unrecognized`].
    StrictForKnown,
}

/// One parsed extra-field record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtraField {
    Zip64(Zip64ExtendedInformation),
    ExtendedTimestamp(ExtendedTimestamp),
    Ntfs(Ntfs),
    NewUnix(NewUnixExtraField),
    OldUnix {
        header_id: u16,
        field: OldUnixExtraField,
    },
    Asi(Asi),
    Alignment(AlignmentExtraField),
    UnicodePath(UnicodeExtraField),
    UnicodeComment(UnicodeExtraField),
    Jar(Jar),
    Unparseable(UnparseableExtraFieldData),
    Unrecognized(UnrecognizedExtraField),
}

impl ExtraField {
    pub fn header_id(&self) -> u16 {
        match self {
            ExtraField::Zip64(_) => Zip64ExtendedInformation::HEADER_ID,
            ExtraField::ExtendedTimestamp(_) => ExtendedTimestamp::HEADER_ID,
            ExtraField::Ntfs(_) => Ntfs::HEADER_ID,
            ExtraField::NewUnix(_) => NewUnixExtraField::HEADER_ID,
            ExtraField::OldUnix { header_id, .. } => *header_id,
            ExtraField::Asi(_) => Asi::HEADER_ID,
            ExtraField::Alignment(_) => AlignmentExtraField::HEADER_ID,
            ExtraField::UnicodePath(_) => UnicodeExtraField::HEADER_ID_PATH,
            ExtraField::UnicodeComment(_) => UnicodeExtraField::HEADER_ID_COMMENT,
            ExtraField::Jar(_) => Jar::HEADER_ID,
            ExtraField::Unparseable(u) => u.header_id,
            ExtraField::Unrecognized(u) => u.header_id,
        }
    }

    fn serialize_for(&self, is_local: bool) -> Box<[u8]> {
        match self {
            ExtraField::Zip64(z) => {
                if is_local {
                    z.serialize_local()
                } else {
                    z.serialize_central()
                }
            }
            ExtraField::ExtendedTimestamp(t) => {
                if is_local {
                    t.serialize_local()
                } else {
                    t.serialize_central()
                }
            }
            ExtraField::Ntfs(n) => n.serialize(),
            ExtraField::NewUnix(u) => u.serialize(),
            ExtraField::OldUnix { header_id, field } => field.serialize(*header_id),
            ExtraField::Asi(a) => a.serialize(),
            ExtraField::Alignment(a) => a.serialize(),
            ExtraField::UnicodePath(u) => u.serialize(UnicodeExtraField::HEADER_ID_PATH),
            ExtraField::UnicodeComment(u) => u.serialize(UnicodeExtraField::HEADER_ID_COMMENT),
            ExtraField::Jar(j) => j.serialize(),
            ExtraField::Unparseable(u) => u.serialize(),
            ExtraField::Unrecognized(u) => u.serialize(),
        }
    }
}

/// Parses the full extra-field area of a local file header.
pub fn parse_local(data: &[u8], policy: ParsePolicy) -> ZipResult<Vec<ExtraField>> {
    parse(data, true, Zip64Needs::default(), policy)
}

/// Parses the full extra-field area of a central directory header. `zip64_needs` should
/// reflect which of the fixed-size fields held the `0xFFFFFFFF`/`0xFFFF` sentinel, so the
/// ZIP64 record (whose fields are present conditionally) can be read correctly.
pub fn parse_central(
    data: &[u8],
    zip64_needs: Zip64Needs,
    policy: ParsePolicy,
) -> ZipResult<Vec<ExtraField>> {
    parse(data, false, zip64_needs, policy)
}

fn parse(
    data: &[u8],
    is_local: bool,
    zip64_needs: Zip64Needs,
    policy: ParsePolicy,
) -> ZipResult<Vec<ExtraField>> {
    let mut fields = Vec::new();
    let mut pos = 0usize;
    while pos + 4 <= data.len() {
        let header_id = read_u16_le(&data[pos..pos + 2]);
        let len = read_u16_le(&data[pos + 2..pos + 4]) as usize;
        pos += 4;
        if pos + len > data.len() {
            // Declared length overruns the buffer: the record itself is malformed.
            let tail = data[pos..].to_vec();
            match policy {
                ParsePolicy::Strict => {
                    return crate::result::invalid_extra_field(format!(
                        "extra field {header_id:#06x} declares length {len} past end of buffer"
                    ));
                }
                ParsePolicy::BestEffort => {
                    fields.push(ExtraField::Unparseable(UnparseableExtraFieldData {
                        header_id,
                        data: tail,
                    }));
                }
                ParsePolicy::OnlyParseableStrict
                | ParsePolicy::OnlyParseableLenient
                | ParsePolicy::StrictForKnown => {}
            }
            break;
        }
        let payload = &data[pos..pos + len];
        pos += len;

        match parse_one(header_id, payload, is_local, zip64_needs) {
            Ok(field) => fields.push(field),
            Err(e) => match policy {
                ParsePolicy::Strict => return Err(e),
                ParsePolicy::StrictForKnown if KNOWN_HEADER_IDS.contains(&header_id) => {
                    return Err(e);
                }
                ParsePolicy::OnlyParseableStrict => {
                    break;
                }
                ParsePolicy::BestEffort => {
                    fields.push(ExtraField::Unparseable(UnparseableExtraFieldData {
                        header_id,
                        data: payload.to_vec(),
                    }));
                }
                ParsePolicy::OnlyParseableLenient | ParsePolicy::StrictForKnown => {
                    if !KNOWN_HEADER_IDS.contains(&header_id) {
                        fields.push(ExtraField::Unrecognized(UnrecognizedExtraField {
                            header_id,
                            data: payload.to_vec(),
                        }));
                    }
                }
            },
        }
    }
    Ok(fields)
}

fn parse_one(
    header_id: u16,
    payload: &[u8],
    is_local: bool,
    zip64_needs: Zip64Needs,
) -> ZipResult<ExtraField> {
    Ok(match header_id {
        Zip64ExtendedInformation::HEADER_ID => {
            ExtraField::Zip64(Zip64ExtendedInformation::parse(payload, is_local, zip64_needs)?)
        }
        ExtendedTimestamp::HEADER_ID => {
            let mut cur = std::io::Cursor::new(payload);
            ExtraField::ExtendedTimestamp(ExtendedTimestamp::try_from_reader(
                &mut cur,
                payload.len() as u16,
            )?)
        }
        Ntfs::HEADER_ID => ExtraField::Ntfs(Ntfs::parse(payload)?),
        NewUnixExtraField::HEADER_ID => ExtraField::NewUnix(NewUnixExtraField::parse(payload)?),
        OldUnixExtraField::HEADER_ID_INFOZIP | OldUnixExtraField::HEADER_ID_PKWARE => {
            ExtraField::OldUnix {
                header_id,
                field: OldUnixExtraField::parse(payload)?,
            }
        }
        Asi::HEADER_ID => ExtraField::Asi(Asi::parse(payload)?),
        AlignmentExtraField::HEADER_ID => {
            ExtraField::Alignment(AlignmentExtraField::parse(payload)?)
        }
        UnicodeExtraField::HEADER_ID_PATH => {
            ExtraField::UnicodePath(UnicodeExtraField::parse(payload)?)
        }
        UnicodeExtraField::HEADER_ID_COMMENT => {
            ExtraField::UnicodeComment(UnicodeExtraField::parse(payload)?)
        }
        Jar::HEADER_ID => ExtraField::Jar(Jar),
        _ => ExtraField::Unrecognized(UnrecognizedExtraField {
            header_id,
            data: payload.to_vec(),
        }),
    })
}

/// Serializes a list of extra fields into the local-header form.
pub fn serialize_local(fields: &[ExtraField]) -> Vec<u8> {
    fields
        .iter()
        .flat_map(|f| f.serialize_for(true).into_vec())
        .collect()
}

/// Serializes a list of extra fields into the central-directory form.
pub fn serialize_central(fields: &[ExtraField]) -> Vec<u8> {
    fields
        .iter()
        .flat_map(|f| f.serialize_for(false).into_vec())
        .collect()
}

/// Header ids this registry recognizes and parses into a concrete variant. Any other id
/// round-trips via [`ExtraField::Unrecognized`]. Mirrors the registered extra-field IDs in
/// APPNOTE section 4.6.1, pared down to the ones this crate models.
pub const KNOWN_HEADER_IDS: &[u16] = &[
    Zip64ExtendedInformation::HEADER_ID,
    OldUnixExtraField::HEADER_ID_PKWARE,
    Asi::HEADER_ID,
    OldUnixExtraField::HEADER_ID_INFOZIP,
    Ntfs::HEADER_ID,
    UnicodeExtraField::HEADER_ID_COMMENT,
    UnicodeExtraField::HEADER_ID_PATH,
    NewUnixExtraField::HEADER_ID,
    ExtendedTimestamp::HEADER_ID,
    AlignmentExtraField::HEADER_ID,
    Jar::HEADER_ID,
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_mixed_local_fields() {
        let fields = vec![
            ExtraField::ExtendedTimestamp(
                ExtendedTimestamp::from_times(Some(1000), None, None).unwrap(),
            ),
            ExtraField::Jar(Jar),
        ];
        let bytes = serialize_local(&fields);
        let parsed = parse_local(&bytes, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed, fields);
    }

    #[test]
    fn unrecognized_round_trips_opaquely() {
        let bytes = [0x34, 0x12, 0x02, 0x00, 0xAB, 0xCD];
        let parsed = parse_local(&bytes, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(matches!(parsed[0], ExtraField::Unrecognized(_)));
        assert_eq!(serialize_local(&parsed), bytes);
    }

    #[test]
    fn best_effort_recovers_from_overrun_length() {
        let bytes = [0x34, 0x12, 0xFF, 0xFF, 0xAB, 0xCD];
        let parsed = parse_local(&bytes, ParsePolicy::BestEffort).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(matches!(parsed[0], ExtraField::Unparseable(_)));
    }

    #[test]
    fn strict_rejects_overrun_length() {
        let bytes = [0x34, 0x12, 0xFF, 0xFF, 0xAB, 0xCD];
        assert!(parse_local(&bytes, ParsePolicy::Strict).is_err());
    }

    /// A truncated zip64 record (too short to hold both local-form sizes) followed by a
    /// perfectly valid Jar marker.
    fn malformed_then_valid_bytes() -> Vec<u8> {
        let mut bytes = vec![0x01, 0x00, 0x04, 0x00, 0, 0, 0, 0];
        bytes.extend_from_slice(&Jar.serialize());
        bytes
    }

    #[test]
    fn only_parseable_strict_drops_and_halts_on_first_malformed_record() {
        let bytes = malformed_then_valid_bytes();
        let parsed = parse_local(&bytes, ParsePolicy::OnlyParseableStrict).unwrap();
        assert!(parsed.is_empty(), "the malformed record must be dropped, not surfaced as an error");
    }

    #[test]
    fn only_parseable_lenient_drops_malformed_record_and_keeps_going() {
        let bytes = malformed_then_valid_bytes();
        let parsed = parse_local(&bytes, ParsePolicy::OnlyParseableLenient).unwrap();
        assert_eq!(parsed, vec![ExtraField::Jar(Jar)]);
    }
}
