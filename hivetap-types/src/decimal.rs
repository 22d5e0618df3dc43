//! Unscaled-decimal helpers for the connector.
//!
//! Decimals arrive from the legacy deserializer as an unscaled integer plus
//! the scale the writer happened to use, which rarely matches the declared
//! column scale. [`rescale_unscaled`] moves a value between scales the way
//! the legacy reader does: exact multiplication when scaling up, division
//! with round-half-away-from-zero when scaling down.

use hivetap_result::{Error, Result};

use crate::COMPACT_DECIMAL_MAX_PRECISION;

/// Rescale an unscaled decimal value from `from` fractional digits to `to`.
pub fn rescale_unscaled(unscaled: i128, from: i8, to: i8) -> Result<i128> {
    if from == to {
        return Ok(unscaled);
    }
    if to > from {
        let factor = pow10((to - from) as u32)?;
        return unscaled.checked_mul(factor).ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "decimal value {unscaled} overflows when rescaled from {from} to {to}"
            ))
        });
    }
    let factor = pow10((from - to) as u32)?;
    let quotient = unscaled / factor;
    let remainder = unscaled % factor;
    // Round half away from zero, matching the legacy reader.
    if remainder.unsigned_abs() * 2 >= factor.unsigned_abs() {
        Ok(quotient + unscaled.signum())
    } else {
        Ok(quotient)
    }
}

/// Whether a declared precision fits the compact `i64` representation.
pub fn fits_compact(precision: u8) -> bool {
    precision <= COMPACT_DECIMAL_MAX_PRECISION
}

/// Minimal big-endian two's-complement encoding of an unscaled value, used
/// for decimals too wide for the compact representation.
pub fn unscaled_to_be_bytes(unscaled: i128) -> Vec<u8> {
    let full = unscaled.to_be_bytes();
    let skip_byte = if unscaled < 0 { 0xff } else { 0x00 };
    let mut start = 0;
    while start < full.len() - 1 {
        let next_keeps_sign = (full[start + 1] & 0x80 == 0x80) == (unscaled < 0);
        if full[start] == skip_byte && next_keeps_sign {
            start += 1;
        } else {
            break;
        }
    }
    full[start..].to_vec()
}

/// Decode the big-endian two's-complement encoding back to an unscaled value.
pub fn unscaled_from_be_bytes(bytes: &[u8]) -> Result<i128> {
    if bytes.is_empty() || bytes.len() > 16 {
        return Err(Error::InvalidArgumentError(format!(
            "invalid decimal encoding of {} bytes",
            bytes.len()
        )));
    }
    let fill = if bytes[0] & 0x80 == 0x80 { 0xff } else { 0x00 };
    let mut full = [fill; 16];
    full[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(full))
}

fn pow10(exponent: u32) -> Result<i128> {
    10i128.checked_pow(exponent).ok_or_else(|| {
        Error::InvalidArgumentError(format!("decimal scale change of {exponent} is out of range"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_up_multiplies() {
        // 12.3 at scale 1 becomes 12.300 at scale 3.
        assert_eq!(rescale_unscaled(123, 1, 3).unwrap(), 12300);
    }

    #[test]
    fn rescale_down_rounds_half_away_from_zero() {
        assert_eq!(rescale_unscaled(125, 2, 1).unwrap(), 13);
        assert_eq!(rescale_unscaled(124, 2, 1).unwrap(), 12);
        assert_eq!(rescale_unscaled(-125, 2, 1).unwrap(), -13);
        assert_eq!(rescale_unscaled(-124, 2, 1).unwrap(), -12);
    }

    #[test]
    fn rescale_overflow_is_an_error() {
        assert!(rescale_unscaled(i128::MAX / 10, 0, 3).is_err());
    }

    #[test]
    fn be_bytes_round_trip_is_minimal() {
        for value in [0i128, 1, -1, 127, 128, -128, -129, 12300, i128::MAX, i128::MIN] {
            let encoded = unscaled_to_be_bytes(value);
            assert_eq!(unscaled_from_be_bytes(&encoded).unwrap(), value, "{value}");
        }
        assert_eq!(unscaled_to_be_bytes(1), vec![0x01]);
        assert_eq!(unscaled_to_be_bytes(-1), vec![0xff]);
        assert_eq!(unscaled_to_be_bytes(128), vec![0x00, 0x80]);
    }
}
