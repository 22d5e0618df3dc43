//! Lazy row-to-columnar decoding for legacy Hive storage formats.
//!
//! A [`RowDecoder`] is a single-pass cursor over one data split: it pulls
//! raw records from a [`RecordSource`], hands them to a
//! [`RecordDeserializer`], and exposes ordinal-indexed typed getters that
//! parse each column at most once per row into a per-ordinal cache. The
//! row source and deserializer are format-specific capabilities selected at
//! construction; this crate ships the delimited-text pair in [`text`].

#![forbid(unsafe_code)]

pub mod decoder;
pub mod parsers;
pub mod source;
pub mod text;

pub use decoder::RowDecoder;
pub use source::{
    ColumnDescriptor, DeserializedRow, RawField, RecordDeserializer, RecordSource,
    StructuralConverter,
};
pub use text::{TextFormatOptions, TextRecordSource, TextRowDeserializer};
