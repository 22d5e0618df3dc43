//! Pure per-type field conversion rules.
//!
//! Each function takes one raw field plus the declared semantic type and
//! produces the native representation the decoder caches. No state; the
//! timezone inputs are the process-default zone the deserializer parsed in
//! and the zone the table declares its files were written in.

use hivetap_result::{Error, Result};
use hivetap_types::decimal::{fits_compact, rescale_unscaled, unscaled_to_be_bytes};
use hivetap_types::zone::{MILLIS_PER_DAY, ZoneRules, utc_to_wall, wall_to_utc};
use hivetap_types::HiveType;

use crate::source::RawField;

/// Compact or arbitrary-precision decimal, per the declared precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecimalRepr {
    Compact(i64),
    Wide(Vec<u8>),
}

pub fn parse_boolean(declared: &HiveType, raw: &RawField<'_>) -> Result<bool> {
    match raw {
        RawField::Bool(value) => Ok(*value),
        other => Err(mismatch(declared, other)),
    }
}

pub fn parse_double(declared: &HiveType, raw: &RawField<'_>) -> Result<f64> {
    match raw {
        RawField::Double(value) => Ok(*value),
        other => Err(mismatch(declared, other)),
    }
}

/// Common parser for every long-valued semantic type.
pub fn parse_long(
    declared: &HiveType,
    raw: &RawField<'_>,
    default_zone: &dyn ZoneRules,
    storage_zone: &dyn ZoneRules,
) -> Result<i64> {
    match (declared, raw) {
        (HiveType::Date, RawField::Millis(millis)) => {
            // The deserializer parsed the date in the process-default zone;
            // add that zone's offset back to recover wall-clock millis,
            // then count whole days since the epoch.
            let wall = utc_to_wall(default_zone, *millis);
            Ok(wall.div_euclid(MILLIS_PER_DAY))
        }
        (HiveType::Timestamp, RawField::Millis(millis)) => {
            // Two-step correction: undo the default-zone interpretation to
            // get zone-agnostic wall-clock millis, then reinterpret that
            // wall-clock value in the table's declared storage zone.
            let wall = utc_to_wall(default_zone, *millis);
            Ok(wall_to_utc(storage_zone, wall))
        }
        (HiveType::Real, RawField::Float(value)) => {
            // Stored as the IEEE-754 bit pattern, not a numeric cast.
            Ok(value.to_bits() as i32 as i64)
        }
        (
            HiveType::TinyInt | HiveType::SmallInt | HiveType::Int | HiveType::BigInt,
            RawField::Long(value),
        ) => Ok(*value),
        (HiveType::Decimal { precision, scale }, raw) => {
            match parse_decimal(*precision, *scale, raw)? {
                DecimalRepr::Compact(value) => Ok(value),
                DecimalRepr::Wide(_) => Err(Error::Internal(format!(
                    "wide decimal {declared} routed through the long parser"
                ))),
            }
        }
        (declared, other) => Err(mismatch(declared, other)),
    }
}

/// Normalize a raw text/bytes field into one byte span and apply the
/// declared truncation rule. Always copies: the row source may reuse its
/// buffer on the next advance.
pub fn parse_bytes(declared: &HiveType, raw: &RawField<'_>) -> Result<Vec<u8>> {
    let span = match raw {
        RawField::Bytes(bytes) => *bytes,
        other => return Err(mismatch(declared, other)),
    };
    match declared {
        HiveType::Varchar(None) | HiveType::Varbinary => Ok(span.to_vec()),
        HiveType::Varchar(Some(max_chars)) => {
            Ok(truncate_chars(span, *max_chars as usize).to_vec())
        }
        HiveType::Char(length) => {
            let truncated = truncate_chars(span, *length as usize);
            let trimmed_len = truncated
                .iter()
                .rposition(|b| *b != b' ')
                .map_or(0, |idx| idx + 1);
            Ok(truncated[..trimmed_len].to_vec())
        }
        other => Err(mismatch(other, raw)),
    }
}

/// Rescale a raw decimal to the declared scale and pick the representation
/// the declared precision calls for.
pub fn parse_decimal(precision: u8, declared_scale: i8, raw: &RawField<'_>) -> Result<DecimalRepr> {
    let (unscaled, source_scale) = match raw {
        RawField::Decimal { unscaled, scale } => (*unscaled, *scale),
        other => {
            return Err(mismatch(
                &HiveType::Decimal {
                    precision,
                    scale: declared_scale,
                },
                other,
            ));
        }
    };
    let rescaled = rescale_unscaled(unscaled, source_scale, declared_scale)?;
    if fits_compact(precision) {
        i64::try_from(rescaled)
            .map(DecimalRepr::Compact)
            .map_err(|_| {
                Error::InvalidArgumentError(format!(
                    "decimal value {rescaled} exceeds precision {precision}"
                ))
            })
    } else {
        Ok(DecimalRepr::Wide(unscaled_to_be_bytes(rescaled)))
    }
}

/// Truncate to at most `max_chars` code points. Falls back to a byte limit
/// when the span is not valid UTF-8.
fn truncate_chars(span: &[u8], max_chars: usize) -> &[u8] {
    match std::str::from_utf8(span) {
        Ok(text) => match text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => &span[..byte_idx],
            None => span,
        },
        Err(_) => &span[..span.len().min(max_chars)],
    }
}

fn mismatch(declared: &HiveType, raw: &RawField<'_>) -> Error {
    Error::Internal(format!(
        "deserializer produced {raw:?} for a column declared {declared}"
    ))
}

#[cfg(test)]
mod tests {
    use hivetap_types::zone::FixedOffset;

    use super::*;

    #[test]
    fn varchar_truncates_to_declared_length() {
        let out = parse_bytes(&HiveType::Varchar(Some(3)), &RawField::Bytes(b"hello")).unwrap();
        assert_eq!(out, b"hel");
    }

    #[test]
    fn varchar_counts_code_points_not_bytes() {
        let out = parse_bytes(
            &HiveType::Varchar(Some(2)),
            &RawField::Bytes("héllo".as_bytes()),
        )
        .unwrap();
        assert_eq!(out, "hé".as_bytes());
    }

    #[test]
    fn char_trims_trailing_spaces_after_truncation() {
        let out = parse_bytes(&HiveType::Char(5), &RawField::Bytes(b"ab   ")).unwrap();
        assert_eq!(out, b"ab");
        let out = parse_bytes(&HiveType::Char(5), &RawField::Bytes(b"     ")).unwrap();
        assert_eq!(out, b"");
    }

    #[test]
    fn real_is_a_bit_pattern_not_a_cast() {
        let bits = parse_long(
            &HiveType::Real,
            &RawField::Float(1.5),
            &FixedOffset::UTC,
            &FixedOffset::UTC,
        )
        .unwrap();
        assert_eq!(bits, 1.5f32.to_bits() as i64);
        assert_ne!(bits, 1); // not a numeric truncation
    }

    #[test]
    fn timestamp_applies_two_step_zone_correction() {
        // Wall-clock 12:00 parsed in a UTC-5 default zone, stored in a
        // UTC+2 table zone.
        let default_zone = FixedOffset::from_hms(-5, 0, 0);
        let storage_zone = FixedOffset::from_hms(2, 0, 0);
        let wall = 1_700_000_000_000i64;
        let parsed_in_default = wall - default_zone.offset_millis();
        let utc = parse_long(
            &HiveType::Timestamp,
            &RawField::Millis(parsed_in_default),
            &default_zone,
            &storage_zone,
        )
        .unwrap();
        assert_eq!(utc, wall - storage_zone.offset_millis());
    }

    #[test]
    fn date_counts_whole_days_in_the_parsing_zone() {
        let default_zone = FixedOffset::from_hms(-5, 0, 0);
        // Wall-clock midnight on day 3, as the default zone parsed it.
        let wall = 3 * MILLIS_PER_DAY;
        let parsed_in_default = wall - default_zone.offset_millis();
        let days = parse_long(
            &HiveType::Date,
            &RawField::Millis(parsed_in_default),
            &default_zone,
            &FixedOffset::UTC,
        )
        .unwrap();
        assert_eq!(days, 3);
    }

    #[test]
    fn compact_decimal_rescales_to_declared_scale() {
        let repr = parse_decimal(
            5,
            3,
            &RawField::Decimal {
                unscaled: 123,
                scale: 1,
            },
        )
        .unwrap();
        assert_eq!(repr, DecimalRepr::Compact(12300));
    }

    #[test]
    fn wide_decimal_uses_byte_encoding() {
        let repr = parse_decimal(
            38,
            2,
            &RawField::Decimal {
                unscaled: 1,
                scale: 2,
            },
        )
        .unwrap();
        assert_eq!(repr, DecimalRepr::Wide(vec![0x01]));
    }

    #[test]
    fn mismatched_raw_kind_is_an_internal_error() {
        let err = parse_long(
            &HiveType::BigInt,
            &RawField::Bool(true),
            &FixedOffset::UTC,
            &FixedOffset::UTC,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
