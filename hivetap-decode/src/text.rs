//! Delimited-text storage format: the legacy control-character format most
//! Hive warehouses still carry.
//!
//! Records are newline-separated; fields use a one-byte delimiter
//! (`\x01` by default), collection elements the next (`\x02`), map keys the
//! next (`\x03`), and deeper nesting levels continue down the control-byte
//! range. `\N` marks null. Field text is parsed per declared type on
//! demand; a malformed primitive cell decodes as null rather than failing
//! the row, matching the lazy deserializer this format replicates.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use hivetap_result::{Error, Result};
use hivetap_types::zone::{MILLIS_PER_DAY, ZoneRules, wall_to_utc};
use hivetap_types::HiveType;
use time::{Date, Month};

use crate::source::{DeserializedRow, RawField, RecordDeserializer, RecordSource};

/// Options for the delimited-text format.
#[derive(Debug, Clone)]
pub struct TextFormatOptions {
    pub field_delimiter: u8,
    pub collection_delimiter: u8,
    pub map_key_delimiter: u8,
    pub null_token: Vec<u8>,
    /// Records longer than this fail with a data-quality error.
    pub max_record_bytes: Option<usize>,
}

impl Default for TextFormatOptions {
    fn default() -> Self {
        Self {
            field_delimiter: 0x01,
            collection_delimiter: 0x02,
            map_key_delimiter: 0x03,
            null_token: b"\\N".to_vec(),
            max_record_bytes: None,
        }
    }
}

impl TextFormatOptions {
    /// Delimiter for nesting level `level` (0 = top-level fields).
    fn delimiter(&self, level: usize) -> u8 {
        match level {
            0 => self.field_delimiter,
            1 => self.collection_delimiter,
            2 => self.map_key_delimiter,
            // Deeper levels walk down the control-byte range, as the
            // legacy format does.
            deeper => (deeper + 1) as u8,
        }
    }
}

/// Newline-delimited file reader with byte-progress reporting.
pub struct TextRecordSource {
    reader: Option<BufReader<File>>,
    path: String,
    buf: Vec<u8>,
    bytes_read: u64,
    total_bytes: u64,
    max_record_bytes: Option<usize>,
}

impl TextRecordSource {
    pub fn open(path: &Path, options: &TextFormatOptions) -> Result<Self> {
        let file = File::open(path)?;
        let total_bytes = file.metadata()?.len();
        Ok(Self {
            reader: Some(BufReader::new(file)),
            path: path.display().to_string(),
            buf: Vec::new(),
            bytes_read: 0,
            total_bytes,
            max_record_bytes: options.max_record_bytes,
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

impl RecordSource for TextRecordSource {
    fn next_record(&mut self) -> Result<Option<&[u8]>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| Error::Internal("read from a closed record source".into()))?;
        self.buf.clear();
        let read = reader.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }
        self.bytes_read += read as u64;
        if let Some(limit) = self.max_record_bytes {
            if read > limit {
                return Err(Error::OversizedRecord {
                    path: self.path.clone(),
                    limit,
                });
            }
        }
        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        Ok(Some(&self.buf))
    }

    fn progress(&self) -> Result<f64> {
        if self.reader.is_none() {
            return Err(Error::Internal("progress on a closed record source".into()));
        }
        if self.total_bytes == 0 {
            return Ok(1.0);
        }
        Ok(self.bytes_read as f64 / self.total_bytes as f64)
    }

    fn close(&mut self) -> Result<()> {
        match self.reader.take() {
            Some(_) => Ok(()),
            None => Err(Error::Internal("record source closed twice".into())),
        }
    }
}

/// Deserializer for the delimited-text format.
///
/// Splits a record into field spans eagerly (one owned copy of the record)
/// and parses individual fields per declared type on demand.
pub struct TextRowDeserializer {
    options: Arc<TextFormatOptions>,
    default_zone: Arc<dyn ZoneRules>,
}

impl TextRowDeserializer {
    pub fn new(options: TextFormatOptions, default_zone: Arc<dyn ZoneRules>) -> Self {
        Self {
            options: Arc::new(options),
            default_zone,
        }
    }
}

impl RecordDeserializer for TextRowDeserializer {
    fn deserialize(&self, record: &[u8]) -> Result<Box<dyn DeserializedRow>> {
        let data = record.to_vec();
        let spans = split_spans(&data, self.options.field_delimiter);
        Ok(Box::new(TextRow {
            data,
            spans,
            options: Arc::clone(&self.options),
            default_zone: Arc::clone(&self.default_zone),
        }))
    }
}

struct TextRow {
    data: Vec<u8>,
    spans: Vec<(usize, usize)>,
    options: Arc<TextFormatOptions>,
    default_zone: Arc<dyn ZoneRules>,
}

impl DeserializedRow for TextRow {
    fn field(&self, ordinal: usize, declared: &HiveType) -> Result<Option<RawField<'_>>> {
        let Some((start, end)) = self.spans.get(ordinal).copied() else {
            // Short record: trailing columns are simply absent.
            return Ok(None);
        };
        let bytes = &self.data[start..end];
        if bytes == self.options.null_token.as_slice() {
            return Ok(None);
        }
        Ok(parse_value(
            bytes,
            declared,
            0,
            &self.options,
            self.default_zone.as_ref(),
        ))
    }
}

fn split_spans(data: &[u8], delimiter: u8) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    for (idx, byte) in data.iter().enumerate() {
        if *byte == delimiter {
            spans.push((start, idx));
            start = idx + 1;
        }
    }
    spans.push((start, data.len()));
    spans
}

fn parse_value<'a>(
    bytes: &'a [u8],
    declared: &HiveType,
    level: usize,
    options: &TextFormatOptions,
    default_zone: &dyn ZoneRules,
) -> Option<RawField<'a>> {
    match declared {
        HiveType::Boolean => {
            let text = std::str::from_utf8(bytes).ok()?;
            if text.eq_ignore_ascii_case("true") {
                Some(RawField::Bool(true))
            } else if text.eq_ignore_ascii_case("false") {
                Some(RawField::Bool(false))
            } else {
                None
            }
        }
        HiveType::TinyInt => parse_integer::<i8>(bytes).map(|v| RawField::Long(v as i64)),
        HiveType::SmallInt => parse_integer::<i16>(bytes).map(|v| RawField::Long(v as i64)),
        HiveType::Int => parse_integer::<i32>(bytes).map(|v| RawField::Long(v as i64)),
        HiveType::BigInt => parse_integer::<i64>(bytes).map(RawField::Long),
        HiveType::Real => std::str::from_utf8(bytes)
            .ok()?
            .parse::<f32>()
            .ok()
            .map(RawField::Float),
        HiveType::Double => std::str::from_utf8(bytes)
            .ok()?
            .parse::<f64>()
            .ok()
            .map(RawField::Double),
        HiveType::Varchar(_) | HiveType::Char(_) | HiveType::Varbinary => {
            Some(RawField::Bytes(bytes))
        }
        HiveType::Decimal { .. } => parse_decimal_text(bytes),
        HiveType::Date => {
            let text = std::str::from_utf8(bytes).ok()?;
            let days = parse_date_days(text)?;
            let wall = days * MILLIS_PER_DAY;
            Some(RawField::Millis(wall_to_utc(default_zone, wall)))
        }
        HiveType::Timestamp => {
            let text = std::str::from_utf8(bytes).ok()?;
            let wall = parse_timestamp_wall_millis(text)?;
            Some(RawField::Millis(wall_to_utc(default_zone, wall)))
        }
        HiveType::Array(element) => {
            if bytes.is_empty() {
                return Some(RawField::List(Vec::new()));
            }
            let sep = options.delimiter(level + 1);
            let elements = split_bytes(bytes, sep)
                .map(|span| nested_value(span, element, level + 1, options, default_zone))
                .collect();
            Some(RawField::List(elements))
        }
        HiveType::Map(key_type, value_type) => {
            if bytes.is_empty() {
                return Some(RawField::Map(Vec::new()));
            }
            let entry_sep = options.delimiter(level + 1);
            let kv_sep = options.delimiter(level + 2);
            let mut entries = Vec::new();
            for entry in split_bytes(bytes, entry_sep) {
                let (key_bytes, value_bytes) = match entry.iter().position(|b| *b == kv_sep) {
                    Some(split) => (&entry[..split], Some(&entry[split + 1..])),
                    None => (entry, None),
                };
                // Entries whose key decodes as null are dropped.
                let Some(key) = nested_value(key_bytes, key_type, level + 2, options, default_zone)
                else {
                    continue;
                };
                let value = value_bytes
                    .and_then(|v| nested_value(v, value_type, level + 2, options, default_zone));
                entries.push((key, value));
            }
            Some(RawField::Map(entries))
        }
        HiveType::Row(fields) => {
            let sep = options.delimiter(level + 1);
            let mut spans = split_bytes(bytes, sep);
            let mut values = Vec::with_capacity(fields.len());
            for (_, field_type) in fields {
                match spans.next() {
                    Some(span) => values.push(nested_value(
                        span,
                        field_type,
                        level + 1,
                        options,
                        default_zone,
                    )),
                    None => values.push(None),
                }
            }
            Some(RawField::Struct(values))
        }
    }
}

fn nested_value<'a>(
    bytes: &'a [u8],
    declared: &HiveType,
    level: usize,
    options: &TextFormatOptions,
    default_zone: &dyn ZoneRules,
) -> Option<RawField<'a>> {
    if bytes == options.null_token.as_slice() {
        return None;
    }
    parse_value(bytes, declared, level, options, default_zone)
}

fn split_bytes(bytes: &[u8], delimiter: u8) -> impl Iterator<Item = &[u8]> + '_ {
    bytes.split(move |b| *b == delimiter)
}

fn parse_integer<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.trim().parse::<T>().ok()
}

/// Parse decimal text into its unscaled value and scale.
fn parse_decimal_text(bytes: &[u8]) -> Option<RawField<'static>> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };
    if frac_part.len() > i8::MAX as usize {
        return None;
    }
    let mut combined = String::with_capacity(int_part.len() + frac_part.len());
    combined.push_str(int_part);
    combined.push_str(frac_part);
    let unscaled = combined.parse::<i128>().ok()?;
    Some(RawField::Decimal {
        unscaled,
        scale: frac_part.len() as i8,
    })
}

/// Parse `YYYY-MM-DD` into days since the Unix epoch.
fn parse_date_days(text: &str) -> Option<i64> {
    let mut parts = text.trim().split('-');
    let mut next_number = || -> Option<i64> { parts.next()?.parse::<i64>().ok() };
    let year = next_number()?;
    let month = next_number()?;
    let day = next_number()?;
    if parts.next().is_some() {
        return None;
    }
    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    let date = Date::from_calendar_date(i32::try_from(year).ok()?, month, u8::try_from(day).ok()?)
        .ok()?;
    Some((date.to_julian_day() - epoch_julian_day()) as i64)
}

/// Parse `YYYY-MM-DD HH:MM:SS[.fraction]` into wall-clock millis.
fn parse_timestamp_wall_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    let (date_part, time_part) = text.split_once(' ')?;
    let days = parse_date_days(date_part)?;

    let (clock, fraction) = match time_part.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (time_part, None),
    };
    let mut pieces = clock.split(':');
    let hours = pieces.next()?.parse::<i64>().ok()?;
    let minutes = pieces.next()?.parse::<i64>().ok()?;
    let seconds = pieces.next()?.parse::<i64>().ok()?;
    if pieces.next().is_some() || !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    // Leap-second text (:60) is tolerated by clamping, like the legacy parser.
    if !(0..=60).contains(&seconds) {
        return None;
    }

    let mut millis = 0i64;
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut digits: String = fraction.chars().take(3).collect();
        while digits.len() < 3 {
            digits.push('0');
        }
        millis = digits.parse::<i64>().ok()?;
    }

    Some(days * MILLIS_PER_DAY + ((hours * 60 + minutes) * 60 + seconds.min(59)) * 1_000 + millis)
}

fn epoch_julian_day() -> i32 {
    Date::from_calendar_date(1970, Month::January, 1)
        .expect("1970-01-01 is a valid date")
        .to_julian_day()
}
