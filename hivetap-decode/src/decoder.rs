//! The lazy single-pass row cursor.

use std::path::Path;
use std::sync::Arc;

use arrow::array::ArrayRef;
use hivetap_result::{Error, Result};
use hivetap_types::zone::ZoneRules;
use hivetap_types::{HiveType, NativeKind};

use crate::parsers::{self, DecimalRepr};
use crate::source::{
    ColumnDescriptor, DeserializedRow, RecordDeserializer, RecordSource, StructuralConverter,
};
use crate::text::{TextFormatOptions, TextRecordSource, TextRowDeserializer};

/// A strictly sequential cursor over one data split.
///
/// One driver thread owns an instance for its whole lifetime; there is no
/// internal locking. Each successful [`advance`](RowDecoder::advance)
/// replaces the current row wholesale and clears the per-column cache;
/// typed getters then parse each requested column at most once per row.
pub struct RowDecoder {
    columns: Vec<ColumnDescriptor>,
    source: Option<Box<dyn RecordSource>>,
    deserializer: Box<dyn RecordDeserializer>,
    converter: Arc<dyn StructuralConverter>,
    default_zone: Arc<dyn ZoneRules>,
    storage_zone: Arc<dyn ZoneRules>,

    row: Option<Box<dyn DeserializedRow>>,

    // Per-ordinal lazy cache: parallel arrays, one slot per native family,
    // indexed by column ordinal. When `loaded[i]` is false every value slot
    // for ordinal `i` is stale.
    loaded: Vec<bool>,
    nulls: Vec<bool>,
    booleans: Vec<bool>,
    longs: Vec<i64>,
    doubles: Vec<f64>,
    byte_spans: Vec<Vec<u8>>,
    objects: Vec<Option<ArrayRef>>,

    total_bytes: u64,
    completed_bytes: u64,
    closed: bool,
}

impl RowDecoder {
    pub fn new(
        columns: Vec<ColumnDescriptor>,
        source: Box<dyn RecordSource>,
        deserializer: Box<dyn RecordDeserializer>,
        converter: Arc<dyn StructuralConverter>,
        default_zone: Arc<dyn ZoneRules>,
        storage_zone: Arc<dyn ZoneRules>,
        total_bytes: u64,
    ) -> Result<Self> {
        for (idx, column) in columns.iter().enumerate() {
            if column.ordinal() != idx {
                return Err(Error::InvalidArgumentError(format!(
                    "column {} declares ordinal {} at position {idx}",
                    column.name(),
                    column.ordinal()
                )));
            }
        }
        let count = columns.len();
        Ok(Self {
            columns,
            source: Some(source),
            deserializer,
            converter,
            default_zone,
            storage_zone,
            row: None,
            loaded: vec![false; count],
            nulls: vec![false; count],
            booleans: vec![false; count],
            longs: vec![0; count],
            doubles: vec![0.0; count],
            byte_spans: vec![Vec::new(); count],
            objects: vec![None; count],
            total_bytes,
            completed_bytes: 0,
            closed: false,
        })
    }

    /// Open a decoder over a delimited-text file, the way table metadata
    /// selects the format for a split.
    pub fn open_text(
        path: &Path,
        columns: Vec<ColumnDescriptor>,
        options: TextFormatOptions,
        converter: Arc<dyn StructuralConverter>,
        default_zone: Arc<dyn ZoneRules>,
        storage_zone: Arc<dyn ZoneRules>,
    ) -> Result<Self> {
        let source = TextRecordSource::open(path, &options)?;
        let total_bytes = source.total_bytes();
        let deserializer = TextRowDeserializer::new(options, Arc::clone(&default_zone));
        Self::new(
            columns,
            Box::new(source),
            Box::new(deserializer),
            converter,
            default_zone,
            storage_zone,
            total_bytes,
        )
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Pull the next row. Returns `false` once the source is exhausted or
    /// the cursor is closed; closed is terminal. Any fault closes the
    /// cursor before the error propagates, attaching (never substituting)
    /// secondary close errors.
    pub fn advance(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        match self.pull_next() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.close()?;
                Ok(false)
            }
            Err(primary) => {
                let primary = match self.close() {
                    Ok(()) => primary,
                    Err(secondary) => {
                        tracing::warn!(
                            "suppressing close error during failed advance: {secondary}"
                        );
                        primary.with_suppressed(secondary)
                    }
                };
                Err(primary)
            }
        }
    }

    fn pull_next(&mut self) -> Result<bool> {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| Error::Internal("advance on a released row source".into()))?;
        let record = match source.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(false),
            // An oversized record is a data-quality fault and keeps its
            // identity; everything else wraps as a generic read error.
            Err(err @ Error::OversizedRecord { .. }) => return Err(err),
            Err(err) => return Err(Error::Read(Box::new(err))),
        };
        let row = self
            .deserializer
            .deserialize(record)
            .map_err(|err| Error::Read(Box::new(err)))?;
        self.row = Some(row);
        self.loaded.fill(false);
        Ok(true)
    }

    pub fn is_null(&mut self, ordinal: usize) -> Result<bool> {
        let kind = self.column(ordinal)?.native_kind();
        self.ensure_loaded(ordinal, kind)?;
        Ok(self.nulls[ordinal])
    }

    pub fn get_boolean(&mut self, ordinal: usize) -> Result<bool> {
        self.ensure_loaded(ordinal, NativeKind::Boolean)?;
        Ok(self.booleans[ordinal])
    }

    pub fn get_long(&mut self, ordinal: usize) -> Result<i64> {
        self.ensure_loaded(ordinal, NativeKind::Long)?;
        Ok(self.longs[ordinal])
    }

    pub fn get_double(&mut self, ordinal: usize) -> Result<f64> {
        self.ensure_loaded(ordinal, NativeKind::Double)?;
        Ok(self.doubles[ordinal])
    }

    pub fn get_bytes(&mut self, ordinal: usize) -> Result<&[u8]> {
        self.ensure_loaded(ordinal, NativeKind::Bytes)?;
        Ok(&self.byte_spans[ordinal])
    }

    pub fn get_object(&mut self, ordinal: usize) -> Result<Option<ArrayRef>> {
        self.ensure_loaded(ordinal, NativeKind::Object)?;
        Ok(self.objects[ordinal].clone())
    }

    /// Monotone estimate of bytes consumed: `total_bytes × progress`,
    /// clamped to never decrease and never exceed the split size. A
    /// transient progress failure keeps the previous value.
    pub fn completed_bytes(&mut self) -> u64 {
        self.update_completed_bytes();
        self.completed_bytes
    }

    /// Idempotent. Finalizes the completed-bytes estimate, then releases
    /// the row source exactly once.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.update_completed_bytes();
        self.row = None;
        if let Some(mut source) = self.source.take() {
            source.close()?;
        }
        tracing::debug!(completed_bytes = self.completed_bytes, "row decoder closed");
        Ok(())
    }

    fn column(&self, ordinal: usize) -> Result<&ColumnDescriptor> {
        self.columns.get(ordinal).ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "ordinal {ordinal} out of range for {} columns",
                self.columns.len()
            ))
        })
    }

    fn ensure_loaded(&mut self, ordinal: usize, requested: NativeKind) -> Result<()> {
        let column = self.column(ordinal)?;
        if column.native_kind() != requested {
            return Err(Error::TypeContract {
                column: column.name().to_string(),
                declared: column.hive_type().to_string(),
                requested: requested.name(),
            });
        }
        if self.loaded[ordinal] {
            return Ok(());
        }
        self.parse_column(ordinal)?;
        self.loaded[ordinal] = true;
        Ok(())
    }

    /// Run the matching parser exactly once for this ordinal and row,
    /// filling the null flag and the one relevant value slot.
    fn parse_column(&mut self, ordinal: usize) -> Result<()> {
        let row = self
            .row
            .as_deref()
            .ok_or_else(|| Error::Internal("column access before the first advance".into()))?;
        let column = &self.columns[ordinal];
        let declared = column.hive_type();

        let Some(raw) = row.field(ordinal, declared)? else {
            self.nulls[ordinal] = true;
            return Ok(());
        };
        self.nulls[ordinal] = false;

        match declared {
            HiveType::Boolean => {
                self.booleans[ordinal] = parsers::parse_boolean(declared, &raw)?;
            }
            HiveType::Double => {
                self.doubles[ordinal] = parsers::parse_double(declared, &raw)?;
            }
            HiveType::Decimal { precision, scale } => {
                match parsers::parse_decimal(*precision, *scale, &raw)? {
                    DecimalRepr::Compact(value) => self.longs[ordinal] = value,
                    DecimalRepr::Wide(bytes) => self.byte_spans[ordinal] = bytes,
                }
            }
            HiveType::Varchar(_) | HiveType::Char(_) | HiveType::Varbinary => {
                self.byte_spans[ordinal] = parsers::parse_bytes(declared, &raw)?;
            }
            HiveType::Array(_) | HiveType::Map(_, _) | HiveType::Row(_) => {
                self.objects[ordinal] = Some(self.converter.materialize(declared, &raw)?);
            }
            HiveType::TinyInt
            | HiveType::SmallInt
            | HiveType::Int
            | HiveType::BigInt
            | HiveType::Real
            | HiveType::Date
            | HiveType::Timestamp => {
                self.longs[ordinal] = parsers::parse_long(
                    declared,
                    &raw,
                    self.default_zone.as_ref(),
                    self.storage_zone.as_ref(),
                )?;
            }
        }
        Ok(())
    }

    fn update_completed_bytes(&mut self) {
        let Some(source) = self.source.as_ref() else {
            return;
        };
        // Fail-soft: a transient progress error keeps the previous value.
        if let Ok(progress) = source.progress() {
            let estimate = (self.total_bytes as f64 * progress.clamp(0.0, 1.0)) as u64;
            self.completed_bytes = self
                .completed_bytes
                .max(estimate)
                .min(self.total_bytes);
        }
    }
}

impl Drop for RowDecoder {
    fn drop(&mut self) {
        // Best-effort release on unwind; errors here have nowhere to go.
        let _ = self.close();
    }
}
