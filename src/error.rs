#![forbid(unsafe_code)]

use std::io;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not a gzip stream: bad magic byte {found:#04x} at offset {offset}")]
    BadMagic { offset: usize, found: u8 },

    #[error("unsupported extra field: {0}")]
    UnsupportedExtraField(String),

    #[error("input truncated while reading {0}")]
    TruncatedInput(&'static str),

    #[error("line {line}: {reason}")]
    MalformedText { line: usize, reason: String },

    #[error("line {line}: unknown field `{field}`")]
    UnknownField { line: usize, field: String },

    #[error("invalid header: {0}")]
    Validation(#[from] ValidationError),

    #[error("field `{field}`: {source}")]
    Range {
        field: &'static str,
        #[source]
        source: RangeError,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Turns an unexpected end of file into `TruncatedInput`, keeping other I/O errors as they are.
    pub(crate) fn truncated(what: &'static str) -> impl FnOnce(io::Error) -> Error {
        move |err| match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::TruncatedInput(what),
            _ => Error::Io(err),
        }
    }

    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Error {
        Error::MalformedText {
            line,
            reason: reason.into(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("magic bytes must be 31 139, got {id1} {id2}")]
    BadMagic { id1: u8, id2: u8 },

    #[error("compression method {0} is not deflate (8)")]
    UnsupportedMethod(u8),

    #[error("reserved flag bits are set: {0:#010b}")]
    ReservedFlags(u8),

    #[error("`{field}` is required when `{flag}` is set")]
    MissingField {
        field: &'static str,
        flag: &'static str,
    },

    #[error("`{field}` is present but `{flag}` is not set")]
    UnexpectedField {
        field: &'static str,
        flag: &'static str,
    },

    #[error("`{field}` is {len} bytes long, at most {max} allowed")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("`{field}` contains {ch:?}, which cannot be stored as a single Latin-1 byte")]
    Unencodable { field: &'static str, ch: char },

    #[error("`{field}` contains a line break, which the text form cannot hold")]
    LineBreak { field: &'static str },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("value {value} does not fit in {bits} bits")]
pub struct RangeError {
    pub value: u64,
    pub bits: u32,
}
