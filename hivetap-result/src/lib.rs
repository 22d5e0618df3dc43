//! Error types and result definitions for the hivetap connector crates.
//!
//! The connector uses a single error enum ([`Error`]) and a shared result
//! alias ([`Result<T>`]) across all crates. Errors propagate with the `?`
//! operator and are matched structurally where a caller needs to distinguish
//! externally-caused bad input from engine bugs.
//!
//! # Error Categories
//!
//! - **I/O errors** ([`Error::Io`]): reading the underlying row source
//! - **Columnar errors** ([`Error::Arrow`]): building or inspecting Arrow data
//! - **Data quality** ([`Error::OversizedRecord`]): bad input in the external
//!   file, reported with the offending path
//! - **Read faults** ([`Error::Read`]): any other failure while advancing the
//!   cursor, wrapping the original cause
//! - **Caller/schema bugs** ([`Error::TypeContract`],
//!   [`Error::NarrowingOverflow`], [`Error::Unsupported`],
//!   [`Error::InvalidArgumentError`])
//! - **Internal errors** ([`Error::Internal`]): violated invariants

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
