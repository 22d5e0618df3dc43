//! Semantic type model for the hivetap connector.
//!
//! Table metadata declares column types using legacy Hive type names
//! (`bigint`, `varchar(10)`, `decimal(5,2)`, `array<int>`). [`HiveType`]
//! models those declarations, exposes the native representation family each
//! one decodes into ([`NativeKind`]), and maps to the engine's Arrow
//! [`DataType`] for columnar consumers.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields, TimeUnit};
use hivetap_result::{Error, Result};

pub mod decimal;
pub mod zone;

/// Largest decimal precision that still decodes into a compact `i64` slot.
/// Wider decimals are carried as arbitrary-precision big-endian bytes.
pub const COMPACT_DECIMAL_MAX_PRECISION: u8 = 18;

/// Largest decimal precision the type model accepts.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// A declared Hive column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HiveType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    /// `None` is the unbounded legacy `string` type; `Some(n)` is
    /// `varchar(n)` with a maximum length in characters.
    Varchar(Option<u32>),
    /// Fixed-length character type; stored values trim trailing spaces.
    Char(u32),
    Varbinary,
    /// Days since the Unix epoch.
    Date,
    /// Milliseconds since the Unix epoch, UTC.
    Timestamp,
    Decimal {
        precision: u8,
        scale: i8,
    },
    Array(Box<HiveType>),
    Map(Box<HiveType>, Box<HiveType>),
    Row(Vec<(String, HiveType)>),
}

/// The native representation family a [`HiveType`] decodes into.
///
/// Typed getters on the row decoder validate against this before parsing;
/// the per-ordinal cache keeps one value slot per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    Boolean,
    Long,
    Double,
    Bytes,
    Object,
}

impl NativeKind {
    /// Short name used in type-contract error messages.
    pub fn name(self) -> &'static str {
        match self {
            NativeKind::Boolean => "boolean",
            NativeKind::Long => "long",
            NativeKind::Double => "double",
            NativeKind::Bytes => "bytes",
            NativeKind::Object => "object",
        }
    }
}

impl HiveType {
    /// The native family this type decodes into.
    pub fn native_kind(&self) -> NativeKind {
        match self {
            HiveType::Boolean => NativeKind::Boolean,
            HiveType::TinyInt
            | HiveType::SmallInt
            | HiveType::Int
            | HiveType::BigInt
            | HiveType::Real
            | HiveType::Date
            | HiveType::Timestamp => NativeKind::Long,
            HiveType::Double => NativeKind::Double,
            HiveType::Varchar(_) | HiveType::Char(_) | HiveType::Varbinary => NativeKind::Bytes,
            HiveType::Decimal { precision, .. } => {
                if *precision <= COMPACT_DECIMAL_MAX_PRECISION {
                    NativeKind::Long
                } else {
                    NativeKind::Bytes
                }
            }
            HiveType::Array(_) | HiveType::Map(_, _) | HiveType::Row(_) => NativeKind::Object,
        }
    }

    /// The Arrow data type columnar consumers see for this column.
    pub fn to_arrow(&self) -> DataType {
        match self {
            HiveType::Boolean => DataType::Boolean,
            HiveType::TinyInt => DataType::Int8,
            HiveType::SmallInt => DataType::Int16,
            HiveType::Int => DataType::Int32,
            HiveType::BigInt => DataType::Int64,
            HiveType::Real => DataType::Float32,
            HiveType::Double => DataType::Float64,
            HiveType::Varchar(_) | HiveType::Char(_) => DataType::Utf8,
            HiveType::Varbinary => DataType::Binary,
            HiveType::Date => DataType::Date32,
            HiveType::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, None),
            HiveType::Decimal { precision, scale } => DataType::Decimal128(*precision, *scale),
            HiveType::Array(elem) => {
                DataType::List(Arc::new(Field::new("item", elem.to_arrow(), true)))
            }
            HiveType::Map(key, value) => {
                let entries = Field::new(
                    "entries",
                    DataType::Struct(Fields::from(vec![
                        Field::new("key", key.to_arrow(), false),
                        Field::new("value", value.to_arrow(), true),
                    ])),
                    false,
                );
                DataType::Map(Arc::new(entries), false)
            }
            HiveType::Row(fields) => {
                let fields: Vec<Field> = fields
                    .iter()
                    .map(|(name, ty)| Field::new(name, ty.to_arrow(), true))
                    .collect();
                DataType::Struct(Fields::from(fields))
            }
        }
    }
}

impl fmt::Display for HiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HiveType::Boolean => f.write_str("boolean"),
            HiveType::TinyInt => f.write_str("tinyint"),
            HiveType::SmallInt => f.write_str("smallint"),
            HiveType::Int => f.write_str("int"),
            HiveType::BigInt => f.write_str("bigint"),
            HiveType::Real => f.write_str("float"),
            HiveType::Double => f.write_str("double"),
            HiveType::Varchar(None) => f.write_str("string"),
            HiveType::Varchar(Some(n)) => write!(f, "varchar({n})"),
            HiveType::Char(n) => write!(f, "char({n})"),
            HiveType::Varbinary => f.write_str("binary"),
            HiveType::Date => f.write_str("date"),
            HiveType::Timestamp => f.write_str("timestamp"),
            HiveType::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            HiveType::Array(elem) => write!(f, "array<{elem}>"),
            HiveType::Map(key, value) => write!(f, "map<{key},{value}>"),
            HiveType::Row(fields) => {
                f.write_str("struct<")?;
                for (idx, (name, ty)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{name}:{ty}")?;
                }
                f.write_str(">")
            }
        }
    }
}

/// Parse a legacy Hive type name into a [`HiveType`].
pub fn parse_hive_type(name: &str) -> Result<HiveType> {
    let trimmed = name.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "boolean" => return Ok(HiveType::Boolean),
        "tinyint" => return Ok(HiveType::TinyInt),
        "smallint" => return Ok(HiveType::SmallInt),
        "int" | "integer" => return Ok(HiveType::Int),
        "bigint" => return Ok(HiveType::BigInt),
        "float" | "real" => return Ok(HiveType::Real),
        "double" => return Ok(HiveType::Double),
        "string" => return Ok(HiveType::Varchar(None)),
        "binary" | "varbinary" => return Ok(HiveType::Varbinary),
        "date" => return Ok(HiveType::Date),
        "timestamp" => return Ok(HiveType::Timestamp),
        _ => {}
    }

    if let Some(args) = parenthesized(trimmed, "varchar") {
        let length = parse_u32(args, trimmed)?;
        return Ok(HiveType::Varchar(Some(length)));
    }
    if let Some(args) = parenthesized(trimmed, "char") {
        let length = parse_u32(args, trimmed)?;
        return Ok(HiveType::Char(length));
    }
    if let Some(args) = parenthesized(trimmed, "decimal") {
        let parts: Vec<&str> = args.split(',').collect();
        let (precision_str, scale_str) = match parts.as_slice() {
            [p] => (*p, "0"),
            [p, s] => (*p, *s),
            _ => {
                return Err(Error::InvalidArgumentError(format!(
                    "invalid decimal type '{trimmed}'"
                )));
            }
        };
        let precision = parse_u32(precision_str, trimmed)?;
        let scale = parse_u32(scale_str, trimmed)?;
        if precision == 0 || precision > MAX_DECIMAL_PRECISION as u32 || scale > precision {
            return Err(Error::InvalidArgumentError(format!(
                "decimal precision/scale out of range in '{trimmed}'"
            )));
        }
        return Ok(HiveType::Decimal {
            precision: precision as u8,
            scale: scale as i8,
        });
    }
    if let Some(args) = angle_bracketed(trimmed, "array") {
        return Ok(HiveType::Array(Box::new(parse_hive_type(args)?)));
    }
    if let Some(args) = angle_bracketed(trimmed, "map") {
        let parts = split_top_level(args);
        if parts.len() != 2 {
            return Err(Error::InvalidArgumentError(format!(
                "invalid map type '{trimmed}'"
            )));
        }
        return Ok(HiveType::Map(
            Box::new(parse_hive_type(parts[0])?),
            Box::new(parse_hive_type(parts[1])?),
        ));
    }
    if let Some(args) = angle_bracketed(trimmed, "struct") {
        let mut fields = Vec::new();
        for part in split_top_level(args) {
            let (field_name, field_type) = part.split_once(':').ok_or_else(|| {
                Error::InvalidArgumentError(format!("invalid struct field '{part}' in '{trimmed}'"))
            })?;
            fields.push((field_name.trim().to_string(), parse_hive_type(field_type)?));
        }
        if fields.is_empty() {
            return Err(Error::InvalidArgumentError(format!(
                "struct type '{trimmed}' has no fields"
            )));
        }
        return Ok(HiveType::Row(fields));
    }

    Err(Error::InvalidArgumentError(format!(
        "unknown type name '{trimmed}'"
    )))
}

fn parenthesized<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = strip_keyword(text, keyword)?;
    rest.strip_prefix('(')?.strip_suffix(')')
}

fn angle_bracketed<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = strip_keyword(text, keyword)?;
    rest.strip_prefix('<')?.strip_suffix('>')
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    if text.len() >= keyword.len() && text[..keyword.len()].eq_ignore_ascii_case(keyword) {
        Some(text[keyword.len()..].trim_start())
    } else {
        None
    }
}

/// Split on commas that are not nested inside `<>` or `()`.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

fn parse_u32(text: &str, whole: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| Error::InvalidArgumentError(format!("invalid type parameter in '{whole}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitive_names() {
        assert_eq!(parse_hive_type("bigint").unwrap(), HiveType::BigInt);
        assert_eq!(parse_hive_type("STRING").unwrap(), HiveType::Varchar(None));
        assert_eq!(parse_hive_type("float").unwrap(), HiveType::Real);
        assert_eq!(
            parse_hive_type("varchar(10)").unwrap(),
            HiveType::Varchar(Some(10))
        );
        assert_eq!(
            parse_hive_type("decimal(5,2)").unwrap(),
            HiveType::Decimal {
                precision: 5,
                scale: 2
            }
        );
    }

    #[test]
    fn parses_nested_types() {
        assert_eq!(
            parse_hive_type("array<int>").unwrap(),
            HiveType::Array(Box::new(HiveType::Int))
        );
        assert_eq!(
            parse_hive_type("map<string,array<bigint>>").unwrap(),
            HiveType::Map(
                Box::new(HiveType::Varchar(None)),
                Box::new(HiveType::Array(Box::new(HiveType::BigInt)))
            )
        );
        let row = parse_hive_type("struct<a:int,b:map<string,int>>").unwrap();
        match row {
            HiveType::Row(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].0, "a");
            }
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn display_round_trips() {
        for name in [
            "boolean",
            "tinyint",
            "varchar(3)",
            "char(5)",
            "decimal(20,4)",
            "array<map<string,double>>",
            "struct<x:int,y:string>",
        ] {
            let parsed = parse_hive_type(name).unwrap();
            assert_eq!(parse_hive_type(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn rejects_bad_names() {
        assert!(parse_hive_type("wibble").is_err());
        assert!(parse_hive_type("decimal(40,2)").is_err());
        assert!(parse_hive_type("map<int>").is_err());
    }

    #[test]
    fn native_kinds_follow_declared_type() {
        assert_eq!(HiveType::Timestamp.native_kind(), NativeKind::Long);
        assert_eq!(HiveType::Varbinary.native_kind(), NativeKind::Bytes);
        assert_eq!(
            HiveType::Decimal {
                precision: 18,
                scale: 2
            }
            .native_kind(),
            NativeKind::Long
        );
        assert_eq!(
            HiveType::Decimal {
                precision: 19,
                scale: 2
            }
            .native_kind(),
            NativeKind::Bytes
        );
        assert_eq!(
            HiveType::Array(Box::new(HiveType::Int)).native_kind(),
            NativeKind::Object
        );
    }
}
