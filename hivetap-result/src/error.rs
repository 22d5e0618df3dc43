use std::io;

use thiserror::Error;

/// Unified error type for all hivetap operations.
///
/// Variants fall into two groups: externally-caused faults (I/O problems,
/// malformed input files) that a query engine reports against the source
/// data, and contract violations (mismatched getter types, narrowing
/// overflows, unsupported categories) that indicate a schema or metadata bug
/// and are never recovered from.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading from the row source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Arrow library error during columnar data operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A record in the source file exceeded the configured length limit.
    ///
    /// This is a data-quality fault in the external file, distinct from
    /// generic read failures: it carries the offending path so the engine
    /// can report which input produced the bad record.
    #[error("record in {path} exceeds the {limit}-byte length limit")]
    OversizedRecord { path: String, limit: usize },

    /// Any other failure while advancing the row cursor.
    ///
    /// Wraps the original cause. The cursor is always closed before this is
    /// raised; see [`Error::with_suppressed`] for failures during that close.
    #[error("error reading row source: {0}")]
    Read(#[source] Box<Error>),

    /// A typed getter was invoked against a column whose declared type maps
    /// to a different native representation. Indicates a caller or schema
    /// bug; never recovered.
    #[error("column {column} declared as {declared} cannot be read as {requested}")]
    TypeContract {
        column: String,
        declared: String,
        requested: &'static str,
    },

    /// A narrowing cast during bucket hashing did not fit the declared
    /// width. Signals corrupted table metadata or a type mismatch; never
    /// silently truncated.
    #[error("value {value} does not fit the declared {target} width")]
    NarrowingOverflow { value: i64, target: &'static str },

    /// A type category with no defined rule was hashed or decoded.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Invalid user input or API parameter.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// Internal error indicating a bug or unexpected state.
    #[error("An internal operation failed: {0}")]
    Internal(String),

    /// A primary failure with a secondary error that occurred while
    /// releasing resources during the unwind. The secondary error is
    /// attached, never substituted for the primary.
    #[error("{primary} (suppressed while closing: {secondary})")]
    Suppressed {
        #[source]
        primary: Box<Error>,
        secondary: Box<Error>,
    },
}

impl Error {
    /// Attach a secondary error raised while closing resources during an
    /// already-failing unwind.
    pub fn with_suppressed(self, secondary: Error) -> Error {
        Error::Suppressed {
            primary: Box::new(self),
            secondary: Box::new(secondary),
        }
    }

    /// The primary error, unwrapping any suppressed attachment.
    pub fn primary(&self) -> &Error {
        match self {
            Error::Suppressed { primary, .. } => primary.primary(),
            other => other,
        }
    }
}
