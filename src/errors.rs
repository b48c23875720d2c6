use std::{fmt, io, num::{ParseFloatError, ParseIntError}, str::Utf8Error};
use quick_xml::events::attributes::AttrError;

/// Failure classes surfaced to callers. Every fatal condition of a read or
/// write maps onto exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// File cannot be opened, created, read or written.
    Io,
    /// Bytes are not valid under the declared character encoding.
    Decode,
    /// Malformed XML, bad element nesting, missing or non-numeric attributes.
    Parse,
    /// Structurally inconsistent graph or table input.
    InvalidInput,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Parse, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Decode, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidInput, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Io => "io error",
            ErrorKind::Decode => "decode error",
            ErrorKind::Parse => "parse error",
            ErrorKind::InvalidInput => "invalid input",
        };
        write!(f, "{}: {}", kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        // Decompressors and buffered readers report bad text as InvalidData.
        let kind = match value.kind() {
            io::ErrorKind::InvalidData => ErrorKind::Decode,
            _ => ErrorKind::Io,
        };
        Error::new(kind, value.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        match value {
            quick_xml::Error::Io(err) => Error::new(ErrorKind::Io, err.to_string()),
            quick_xml::Error::NonDecodable(_) => Error::decode(value.to_string()),
            _ => Error::parse(value.to_string()),
        }
    }
}

impl From<ParseFloatError> for Error {
    fn from(value: ParseFloatError) -> Self {
        Error::parse(value.to_string())
    }
}

impl From<ParseIntError> for Error {
    fn from(value: ParseIntError) -> Self {
        Error::parse(value.to_string())
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error::parse(value.to_string())
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Error::decode(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        if value.is_io() {
            Error::new(ErrorKind::Io, value.to_string())
        } else {
            Error::invalid_input(value.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
