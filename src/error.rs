//! The single error type returned by marshalling, unmarshalling and schema
//! output.
//!
//! Every failure carries an [`ErrorKind`] and, when it came from the input,
//! the [`Position`] it refers to. [`Error::category`] sorts kinds into the
//! four channels a caller usually tells apart.

use crate::validation::ValidationEvent;
use std::fmt::{self, Display};
use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A marshalling, unmarshalling or schema-output failure.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    position: Option<Position>,
}

/// A location in XML input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// 1-based line.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
    /// 0-based byte offset.
    pub offset: usize,
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {} (offset {})", self.line, self.column, self.offset)
    }
}

/// What went wrong.
#[derive(Debug)]
pub enum ErrorKind {
    /// Reading the source or writing the sink failed.
    Io(io::Error),
    /// The input ended inside the document.
    UnexpectedEof,
    /// Malformed markup.
    Syntax(String),
    /// A string that is not a legal element or attribute name.
    InvalidName(String),
    /// A value that cannot be written or read in the requested form.
    InvalidValue(String),
    /// An element left open at the end of the document.
    UnclosedTag(String),
    /// An end tag that does not close the innermost open element.
    MismatchedTag {
        /// Name of the innermost open element.
        expected: String,
        /// Name in the end tag.
        found: String,
    },
    /// An unknown or malformed entity or character reference.
    InvalidEscape(String),
    /// Input that is not UTF-8.
    InvalidUtf8,
    /// Message produced by a `Serialize` or `Deserialize` implementation.
    Custom(String),
    /// A value shape this mapping has no XML form for.
    Unsupported(String),
    /// The validation event handler refused to continue.
    Validation(ValidationEvent),
    /// The user declined to continue an interactive run.
    Aborted(String),
}

/// Coarse classification of an [`Error`].
///
/// Callers only ever receive one error type per call; the category tells
/// them which of the four failure channels it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// I/O failures and low-level XML syntax errors from the token layer.
    Stream,
    /// Failures reported by the mapping between values and XML.
    Mapping,
    /// An error or fatal error validation event aborted unmarshalling.
    Validation,
    /// A user-declined overwrite aborted schema output.
    Aborted,
}

impl Error {
    /// Wraps an [`ErrorKind`] without position.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, position: None }
    }

    /// Attaches the input position the error refers to.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Returns what went wrong.
    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the input position, if known.
    #[inline]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Returns the failure channel this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match &self.kind {
            ErrorKind::Io(_)
            | ErrorKind::UnexpectedEof
            | ErrorKind::Syntax(_)
            | ErrorKind::InvalidName(_)
            | ErrorKind::UnclosedTag(_)
            | ErrorKind::MismatchedTag { .. }
            | ErrorKind::InvalidEscape(_)
            | ErrorKind::InvalidUtf8 => ErrorCategory::Stream,
            ErrorKind::InvalidValue(_) | ErrorKind::Custom(_) | ErrorKind::Unsupported(_) => {
                ErrorCategory::Mapping
            }
            ErrorKind::Validation(_) => ErrorCategory::Validation,
            ErrorKind::Aborted(_) => ErrorCategory::Aborted,
        }
    }

    /// Returns the validation event behind a validation failure.
    pub fn validation_event(&self) -> Option<&ValidationEvent> {
        match &self.kind {
            ErrorKind::Validation(event) => Some(event),
            _ => None,
        }
    }

    /// Returns `true` if a user declined to continue.
    pub fn is_aborted(&self) -> bool {
        matches!(self.kind, ErrorKind::Aborted(_))
    }

    pub(crate) fn unexpected_eof() -> Self {
        Self::new(ErrorKind::UnexpectedEof)
    }

    pub(crate) fn syntax<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Syntax(msg.into()))
    }

    pub(crate) fn invalid_name<S: Into<String>>(name: S) -> Self {
        Self::new(ErrorKind::InvalidName(name.into()))
    }

    pub(crate) fn invalid_value<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidValue(msg.into()))
    }

    pub(crate) fn unclosed_tag<S: Into<String>>(tag: S) -> Self {
        Self::new(ErrorKind::UnclosedTag(tag.into()))
    }

    pub(crate) fn mismatched_tag<S: Into<String>>(expected: S, found: S) -> Self {
        Self::new(ErrorKind::MismatchedTag {
            expected: expected.into(),
            found: found.into(),
        })
    }

    pub(crate) fn invalid_escape<S: Into<String>>(reference: S) -> Self {
        Self::new(ErrorKind::InvalidEscape(reference.into()))
    }

    pub(crate) fn custom<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Custom(msg.into()))
    }

    pub(crate) fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Unsupported(msg.into()))
    }

    /// Creates a validation failure from the event that caused it.
    pub fn validation(event: ValidationEvent) -> Self {
        let position = event.position();
        Self {
            kind: ErrorKind::Validation(event),
            position,
        }
    }

    /// Creates the failure for a declined interactive step.
    pub fn aborted<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Aborted(msg.into()))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Io(e) => write!(f, "I/O error: {}", e),
            ErrorKind::UnexpectedEof => f.write_str("unexpected end of input"),
            ErrorKind::Syntax(msg) => write!(f, "syntax error: {}", msg),
            ErrorKind::InvalidName(name) => write!(f, "invalid XML name: '{}'", name),
            ErrorKind::InvalidValue(msg) => write!(f, "invalid value: {}", msg),
            ErrorKind::UnclosedTag(tag) => write!(f, "unclosed tag: <{}>", tag),
            ErrorKind::MismatchedTag { expected, found } => {
                write!(f, "mismatched closing tag: expected </{}>, found </{}>", expected, found)
            }
            ErrorKind::InvalidEscape(reference) => write!(f, "invalid reference: {}", reference),
            ErrorKind::InvalidUtf8 => f.write_str("input is not valid UTF-8"),
            ErrorKind::Custom(msg) => f.write_str(msg),
            ErrorKind::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            // The event renders its own position.
            ErrorKind::Validation(event) => return write!(f, "validation failed: {}", event),
            ErrorKind::Aborted(msg) => write!(f, "aborted: {}", msg),
        }?;

        match self.position {
            Some(pos) => write!(f, " at {}", pos),
            None => Ok(()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            ErrorKind::Validation(event) => event
                .cause()
                .map(|cause| cause as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::new(ErrorKind::Io(e))
    }
}

impl serde::de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Self::custom(msg.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Self::custom(msg.to_string())
    }
}
