//! Error kinds surfaced by quoting, combination and output.
//!
//! Encoding failures are not listed here: they are recovered inside the
//! byte-flavored combinators (see `bridge`) and never reach a caller.

use thiserror::Error;

pub type Result<T, E = MarkupError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error(transparent)]
    Stringify(#[from] StringifyError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Raised by a host object's own text or generic conversion.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("cannot stringify {type_name}: {message}")]
pub struct StringifyError {
    pub type_name: String,
    pub message: String,
}

impl StringifyError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("incomplete format directive at offset {position}")]
    IncompleteDirective { position: usize },
    #[error("unsupported format character '{conversion}' at offset {position}")]
    UnsupportedConversion { conversion: char, position: usize },
    #[error("not enough arguments for format string")]
    NotEnoughArguments,
    #[error("not all arguments converted during formatting")]
    NotAllConverted,
    #[error("format requires a mapping")]
    MappingRequired,
    #[error("%{conversion} format: a number is required, not {found}")]
    NumberRequired { conversion: char, found: String },
    #[error("%{conversion} format: an integer is required, not {found}")]
    IntegerRequired { conversion: char, found: String },
    #[error("%c requires an integer code point or a single character")]
    CharRequired,
    #[error("* wants an integer width or precision")]
    StarRequiresInt,
    #[error("width too big")]
    WidthTooBig,
    #[error("precision too big")]
    PrecisionTooBig,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("missing key {0:?}")]
    MissingKey(String),
    #[error("{type_name} cannot be indexed by {key}")]
    BadKey { type_name: String, key: String },
    #[error("{type_name} is not subscriptable")]
    NotSubscriptable { type_name: String },
    #[error("host class {name} is unavailable: {reason}")]
    HostClassUnavailable { name: &'static str, reason: String },
    #[error("no active output sink")]
    NoActiveSink,
}
