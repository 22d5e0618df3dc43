//! Collaborator interfaces between the decoder and a storage format.

use arrow::array::ArrayRef;
use hivetap_result::Result;
use hivetap_types::{HiveType, NativeKind};

/// A sequential source of raw, undecoded records for one data split.
///
/// Implementations are free to reuse an internal buffer: the slice returned
/// by [`next_record`](RecordSource::next_record) is only valid until the
/// next call, so consumers copy what they keep.
pub trait RecordSource {
    /// The next raw record, or `None` when the split is exhausted.
    fn next_record(&mut self) -> Result<Option<&[u8]>>;

    /// Fraction of the split consumed so far, in `[0.0, 1.0]`. May fail
    /// transiently; callers treat a failure as "no new estimate".
    fn progress(&self) -> Result<f64>;

    /// Release the underlying resources. Not guaranteed idempotent; the
    /// decoder guards against calling this twice.
    fn close(&mut self) -> Result<()>;
}

/// Turns a raw record into a field-accessor row object.
pub trait RecordDeserializer {
    fn deserialize(&self, record: &[u8]) -> Result<Box<dyn DeserializedRow>>;
}

/// One decoded row; field access is by ordinal and declared type.
///
/// `Ok(None)` means the field is missing or null. Returned values may
/// borrow from the row's internal storage.
pub trait DeserializedRow {
    fn field(&self, ordinal: usize, declared: &HiveType) -> Result<Option<RawField<'_>>>;
}

/// Materializes nested array/map/struct fields into the engine's structured
/// in-memory representation. Opaque to the decoder.
pub trait StructuralConverter: Send + Sync {
    /// Build a single-element Arrow array holding the materialized value.
    fn materialize(&self, declared: &HiveType, raw: &RawField<'_>) -> Result<ArrayRef>;
}

/// A raw field value as produced by a deserializer, before the semantic
/// conversion rules in [`crate::parsers`] run.
///
/// Date and timestamp fields arrive as [`RawField::Millis`]: the legacy
/// deserializer always interprets their text in the process-default zone,
/// and the parser undoes that afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum RawField<'a> {
    Bool(bool),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(&'a [u8]),
    Decimal { unscaled: i128, scale: i8 },
    Millis(i64),
    List(Vec<Option<RawField<'a>>>),
    Map(Vec<(RawField<'a>, Option<RawField<'a>>)>),
    Struct(Vec<Option<RawField<'a>>>),
}

/// A column as seen by the decoder: ordinal, name, and declared type.
/// Immutable after cursor construction.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    ordinal: usize,
    name: String,
    hive_type: HiveType,
    kind: NativeKind,
}

impl ColumnDescriptor {
    pub fn new(ordinal: usize, name: impl Into<String>, hive_type: HiveType) -> Self {
        let kind = hive_type.native_kind();
        Self {
            ordinal,
            name: name.into(),
            hive_type,
            kind,
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hive_type(&self) -> &HiveType {
        &self.hive_type
    }

    pub fn native_kind(&self) -> NativeKind {
        self.kind
    }
}
