//! The legacy 32-bit bucket hash.
//!
//! Pure and stateless; safe to call from any number of planning threads.
//! Two entry points: [`bucket_hash`] over explicit typed values and
//! [`bucket_hash_at`] over a row position in columnar arrays. Both reduce
//! to the one per-type [`field_hash`] so the paths cannot diverge.
//!
//! All arithmetic replicates the source system's 32-bit wrapping overflow
//! behavior, except the declared narrowing casts (byte/short/int), where an
//! out-of-range value is a hard error: it signals corrupted metadata, and
//! wrapping it would silently hash rows into the wrong bucket.

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float32Array, Float64Array, Int8Array, Int16Array,
    Int32Array, Int64Array, ListArray, MapArray, StringArray, TimestampMillisecondArray,
};
use hivetap_result::{Error, Result};
use hivetap_types::HiveType;

/// A typed value for the explicit-values hashing entry point.
///
/// Date and timestamp values ride in [`BucketValue::Long`] (days since
/// epoch, millis since epoch); the declared type selects the rule.
#[derive(Debug, Clone, PartialEq)]
pub enum BucketValue {
    Null,
    Boolean(bool),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    List(Vec<BucketValue>),
    Map(Vec<(BucketValue, BucketValue)>),
}

impl From<bool> for BucketValue {
    fn from(value: bool) -> Self {
        BucketValue::Boolean(value)
    }
}

impl From<i64> for BucketValue {
    fn from(value: i64) -> Self {
        BucketValue::Long(value)
    }
}

impl From<&str> for BucketValue {
    fn from(value: &str) -> Self {
        BucketValue::Bytes(value.as_bytes().to_vec())
    }
}

/// Hash one row given as explicit typed values, in column order.
///
/// Order-sensitive: the rolling combination `r = r*31 + h` is not
/// commutative, so reordering columns changes the hash.
pub fn bucket_hash(types: &[HiveType], values: &[BucketValue]) -> Result<i32> {
    if types.len() != values.len() {
        return Err(Error::InvalidArgumentError(format!(
            "{} bucket types but {} values",
            types.len(),
            values.len()
        )));
    }
    let mut result = 0i32;
    for (declared, value) in types.iter().zip(values) {
        result = result
            .wrapping_mul(31)
            .wrapping_add(field_hash(declared, value)?);
    }
    Ok(result)
}

/// Hash the row at `position` in a columnar batch. Produces the same hash
/// as [`bucket_hash`] over the equivalent explicit values.
pub fn bucket_hash_at(types: &[HiveType], columns: &[ArrayRef], position: usize) -> Result<i32> {
    if types.len() != columns.len() {
        return Err(Error::InvalidArgumentError(format!(
            "{} bucket types but {} columns",
            types.len(),
            columns.len()
        )));
    }
    let mut result = 0i32;
    for (declared, column) in types.iter().zip(columns) {
        let value = value_at(declared, column.as_ref(), position)?;
        result = result
            .wrapping_mul(31)
            .wrapping_add(field_hash(declared, &value)?);
    }
    Ok(result)
}

/// Map a hash to a bucket index in `[0, bucket_count)`: mask the sign bit,
/// then take the modulo.
pub fn bucket_number(hash: i32, bucket_count: u32) -> Result<u32> {
    if bucket_count == 0 {
        return Err(Error::InvalidArgumentError(
            "bucket count must be positive".into(),
        ));
    }
    Ok(((hash & 0x7fff_ffff) as u32) % bucket_count)
}

/// The per-type hash rule shared by both entry points.
fn field_hash(declared: &HiveType, value: &BucketValue) -> Result<i32> {
    if matches!(value, BucketValue::Null) {
        return Ok(0);
    }
    match (declared, value) {
        (HiveType::Boolean, BucketValue::Boolean(b)) => Ok(i32::from(*b)),
        (HiveType::TinyInt, BucketValue::Long(v)) => Ok(narrowed::<i8>(*v, "tinyint")? as i32),
        (HiveType::SmallInt, BucketValue::Long(v)) => Ok(narrowed::<i16>(*v, "smallint")? as i32),
        (HiveType::Int, BucketValue::Long(v)) => Ok(narrowed::<i32>(*v, "int")?),
        (HiveType::BigInt, BucketValue::Long(v)) => Ok(fold_long(*v)),
        (HiveType::Real, BucketValue::Float(f)) => Ok(canonical_float_bits(*f) as i32),
        (HiveType::Double, BucketValue::Double(d)) => Ok(fold_long(canonical_double_bits(*d))),
        (HiveType::Varchar(None), BucketValue::Bytes(bytes)) => Ok(bytes_hash(0, bytes)),
        (HiveType::Varchar(Some(_)), BucketValue::Bytes(bytes)) => Ok(bytes_hash(1, bytes)),
        (HiveType::Date, BucketValue::Long(days)) => narrowed::<i32>(*days, "date"),
        (HiveType::Timestamp, BucketValue::Long(millis)) => {
            let seconds = millis.div_euclid(1_000) << 30;
            let nanos = millis.rem_euclid(1_000) * 1_000_000;
            Ok(fold_long(seconds | nanos))
        }
        (HiveType::Array(element), BucketValue::List(items)) => {
            let mut result = 0i32;
            for item in items {
                result = result
                    .wrapping_mul(31)
                    .wrapping_add(field_hash(element, item)?);
            }
            Ok(result)
        }
        (HiveType::Map(key_type, value_type), BucketValue::Map(entries)) => {
            // Sum of per-entry hashes: order-independent by construction.
            let mut result = 0i32;
            for (key, entry_value) in entries {
                result = result
                    .wrapping_add(field_hash(key_type, key)? ^ field_hash(value_type, entry_value)?);
            }
            Ok(result)
        }
        (
            declared @ (HiveType::Char(_)
            | HiveType::Varbinary
            | HiveType::Decimal { .. }
            | HiveType::Row(_)),
            _,
        ) => Err(Error::Unsupported(format!(
            "the legacy bucket hash has no rule for {declared} columns"
        ))),
        (declared, value) => Err(Error::Internal(format!(
            "bucket value {value:?} does not match declared type {declared}"
        ))),
    }
}

fn narrowed<T>(value: i64, target: &'static str) -> Result<i32>
where
    T: TryFrom<i64> + Into<i32>,
{
    T::try_from(value)
        .map(Into::into)
        .map_err(|_| Error::NarrowingOverflow { value, target })
}

/// Fold 64 bits to 32 the way the legacy scheme does for longs.
fn fold_long(value: i64) -> i32 {
    (((value as u64) >> 32) ^ (value as u64)) as i32
}

/// Bit-pattern round trip collapses every NaN encoding to one value.
fn canonical_float_bits(value: f32) -> u32 {
    if value.is_nan() {
        0x7fc0_0000
    } else {
        value.to_bits()
    }
}

fn canonical_double_bits(value: f64) -> i64 {
    if value.is_nan() {
        0x7ff8_0000_0000_0000u64 as i64
    } else {
        value.to_bits() as i64
    }
}

/// Seeded byte folding shared by the two string categories; the seed is
/// what distinguishes them.
fn bytes_hash(seed: i32, bytes: &[u8]) -> i32 {
    let mut result = seed;
    for byte in bytes {
        result = result.wrapping_mul(31).wrapping_add(*byte as i8 as i32);
    }
    result
}

/// Extract the value at `position` from a columnar array, per declared type.
fn value_at(declared: &HiveType, column: &dyn Array, position: usize) -> Result<BucketValue> {
    if column.is_null(position) {
        return Ok(BucketValue::Null);
    }
    match declared {
        HiveType::Boolean => Ok(BucketValue::Boolean(
            downcast::<BooleanArray>(column, declared)?.value(position),
        )),
        HiveType::TinyInt => Ok(BucketValue::Long(
            downcast::<Int8Array>(column, declared)?.value(position) as i64,
        )),
        HiveType::SmallInt => Ok(BucketValue::Long(
            downcast::<Int16Array>(column, declared)?.value(position) as i64,
        )),
        HiveType::Int => Ok(BucketValue::Long(
            downcast::<Int32Array>(column, declared)?.value(position) as i64,
        )),
        HiveType::BigInt => Ok(BucketValue::Long(
            downcast::<Int64Array>(column, declared)?.value(position),
        )),
        HiveType::Real => Ok(BucketValue::Float(
            downcast::<Float32Array>(column, declared)?.value(position),
        )),
        HiveType::Double => Ok(BucketValue::Double(
            downcast::<Float64Array>(column, declared)?.value(position),
        )),
        HiveType::Varchar(_) => Ok(BucketValue::Bytes(
            downcast::<StringArray>(column, declared)?
                .value(position)
                .as_bytes()
                .to_vec(),
        )),
        HiveType::Date => Ok(BucketValue::Long(
            downcast::<Date32Array>(column, declared)?.value(position) as i64,
        )),
        HiveType::Timestamp => Ok(BucketValue::Long(
            downcast::<TimestampMillisecondArray>(column, declared)?.value(position),
        )),
        HiveType::Array(element) => {
            let list = downcast::<ListArray>(column, declared)?;
            let values = list.value(position);
            let mut items = Vec::with_capacity(values.len());
            for idx in 0..values.len() {
                items.push(value_at(element, values.as_ref(), idx)?);
            }
            Ok(BucketValue::List(items))
        }
        HiveType::Map(key_type, value_type) => {
            let map = downcast::<MapArray>(column, declared)?;
            let entries = map.value(position);
            let keys = entries.column(0);
            let values = entries.column(1);
            let mut pairs = Vec::with_capacity(entries.len());
            for idx in 0..entries.len() {
                pairs.push((
                    value_at(key_type, keys.as_ref(), idx)?,
                    value_at(value_type, values.as_ref(), idx)?,
                ));
            }
            Ok(BucketValue::Map(pairs))
        }
        HiveType::Char(_) | HiveType::Varbinary | HiveType::Decimal { .. } | HiveType::Row(_) => {
            Err(Error::Unsupported(format!(
                "the legacy bucket hash has no rule for {declared} columns"
            )))
        }
    }
}

fn downcast<'a, T: 'static>(column: &'a dyn Array, declared: &HiveType) -> Result<&'a T> {
    column.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::Internal(format!(
            "column declared {declared} is backed by a {:?} array",
            column.data_type()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_type() -> HiveType {
        HiveType::Varchar(None)
    }

    #[test]
    fn string_hash_matches_the_legacy_byte_fold() {
        // seed 0, then r = r*31 + byte over "abc".
        let expected = (97 * 31 + 98) * 31 + 99;
        let hash = bucket_hash(
            &[string_type()],
            std::slice::from_ref(&BucketValue::from("abc")),
        )
        .unwrap();
        assert_eq!(hash, expected);
    }

    #[test]
    fn varchar_seed_distinguishes_it_from_string() {
        let fixed = bucket_hash(&[string_type()], &[BucketValue::from("abc")]).unwrap();
        let bounded =
            bucket_hash(&[HiveType::Varchar(Some(10))], &[BucketValue::from("abc")]).unwrap();
        assert_ne!(fixed, bounded);
    }

    #[test]
    fn null_hashes_to_zero_and_rolls() {
        let hash = bucket_hash(
            &[HiveType::BigInt, HiveType::BigInt],
            &[BucketValue::Null, BucketValue::Long(1)],
        )
        .unwrap();
        assert_eq!(hash, 1);
    }

    #[test]
    fn long_folds_high_and_low_halves() {
        let value = 0x0000_0001_0000_0002i64;
        assert_eq!(
            bucket_hash(&[HiveType::BigInt], &[BucketValue::Long(value)]).unwrap(),
            3
        );
        assert_eq!(
            bucket_hash(&[HiveType::BigInt], &[BucketValue::Long(-1)]).unwrap(),
            0
        );
    }

    #[test]
    fn narrowing_overflow_is_a_hard_error() {
        let err = bucket_hash(&[HiveType::TinyInt], &[BucketValue::Long(200)]).unwrap_err();
        assert!(matches!(
            err,
            Error::NarrowingOverflow {
                value: 200,
                target: "tinyint"
            }
        ));
        assert!(bucket_hash(&[HiveType::Int], &[BucketValue::Long(1 << 40)]).is_err());
    }

    #[test]
    fn all_nan_encodings_hash_alike() {
        let quiet = f32::NAN;
        let exotic = f32::from_bits(0x7fc0_0123);
        assert!(exotic.is_nan());
        let a = bucket_hash(&[HiveType::Real], &[BucketValue::Float(quiet)]).unwrap();
        let b = bucket_hash(&[HiveType::Real], &[BucketValue::Float(exotic)]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn timestamp_hash_matches_the_precomputed_constant() {
        // millis = 1500: seconds = 1, nanos = 500_000_000,
        // word = (1 << 30) | 500_000_000, high half zero.
        let hash = bucket_hash(&[HiveType::Timestamp], &[BucketValue::Long(1_500)]).unwrap();
        assert_eq!(hash, (1i64 << 30 | 500_000_000) as i32);
        assert_eq!(hash, 1_573_741_824);
    }

    #[test]
    fn list_hash_is_order_sensitive() {
        let ty = HiveType::Array(Box::new(HiveType::BigInt));
        let forward = BucketValue::List(vec![BucketValue::Long(1), BucketValue::Long(2)]);
        let backward = BucketValue::List(vec![BucketValue::Long(2), BucketValue::Long(1)]);
        let a = bucket_hash(std::slice::from_ref(&ty), &[forward]).unwrap();
        let b = bucket_hash(std::slice::from_ref(&ty), &[backward]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn map_hash_is_order_independent() {
        let ty = HiveType::Map(Box::new(HiveType::Varchar(None)), Box::new(HiveType::BigInt));
        let forward = BucketValue::Map(vec![
            (BucketValue::from("a"), BucketValue::Long(1)),
            (BucketValue::from("b"), BucketValue::Long(2)),
        ]);
        let backward = BucketValue::Map(vec![
            (BucketValue::from("b"), BucketValue::Long(2)),
            (BucketValue::from("a"), BucketValue::Long(1)),
        ]);
        let a = bucket_hash(std::slice::from_ref(&ty), &[forward]).unwrap();
        let b = bucket_hash(std::slice::from_ref(&ty), &[backward]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unsupported_categories_are_explicit_errors() {
        let err = bucket_hash(
            &[HiveType::Row(vec![("a".into(), HiveType::Int)])],
            &[BucketValue::Long(1)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(bucket_hash(&[HiveType::Char(3)], &[BucketValue::from("x")]).is_err());
    }

    #[test]
    fn bucket_number_stays_in_range() {
        for hash in [i32::MIN, -1, 0, 1, i32::MAX] {
            for count in [1u32, 2, 7, 4096] {
                let bucket = bucket_number(hash, count).unwrap();
                assert!(bucket < count, "hash {hash} count {count}");
            }
        }
        assert!(bucket_number(1, 0).is_err());
    }

    #[test]
    fn sign_bit_is_masked_before_the_modulo() {
        // i32::MIN & 0x7fffffff == 0.
        assert_eq!(bucket_number(i32::MIN, 7).unwrap(), 0);
        assert_eq!(bucket_number(-1, 7).unwrap(), (0x7fff_ffffu32 % 7) as u32);
    }
}
