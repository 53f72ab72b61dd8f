//! The error type shared by every operation in the crate.

use core::fmt;
use std::borrow::Cow;

/// Stable machine-readable codes, one per failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Generic structural failure.
    Unspecified,
    /// The reader could not decide with the bytes it has. Retryable after
    /// more input arrives.
    InsufficientBuffer,
    /// The reader is at a clean value boundary with no bytes left. Terminal.
    EmptyBuffer,
    /// A wire byte did not match the requested type.
    UnexpectedToken,
    /// An integer did not fit the destination width.
    Overflow,
    /// String bytes were not valid UTF-8.
    InvalidUtf8,
    /// An object-as-map read finished without binding a required property.
    MissingRequiredProperty,
    /// A map key appeared twice while duplicate rejection was enabled.
    DuplicateProperty,
    /// A union discriminator matched no declared case.
    UnknownUnionDiscriminator,
    /// Nesting exceeded the configured maximum depth.
    DepthLimitExceeded,
    /// The shape cannot be serialized or deserialized.
    NotSupported,
    /// The operation was used outside its supported conditions.
    InvalidOperation,
    /// The cancellation token was signaled.
    Cancelled,
}

/// What went wrong, with the detail each failure carries.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Generic structural failure with a free-form message.
    Unspecified(String),
    /// Not enough buffered bytes; `examined` is the minimum total length,
    /// counted from where the reader started, that could let the same
    /// decode succeed.
    InsufficientBuffer {
        /// Minimum total buffered length needed before a retry is useful.
        examined: u64,
    },
    /// No bytes at all where a new value was expected.
    EmptyBuffer,
    /// The leading byte did not announce the requested type.
    UnexpectedToken {
        /// The marker byte that was found.
        marker: u8,
        /// What the caller asked for.
        wanted: &'static str,
    },
    /// Integer out of range for the destination.
    Overflow {
        /// The destination width.
        wanted: &'static str,
    },
    /// String payload was not UTF-8.
    InvalidUtf8,
    /// Required property missing from an object-as-map or object-as-array.
    MissingRequiredProperty(Cow<'static, str>),
    /// Duplicate map key under the reject-duplicates policy.
    DuplicateProperty(String),
    /// No union case matched the discriminator.
    UnknownUnionDiscriminator(String),
    /// No enum variant matched the value or name.
    UnknownEnumVariant(String),
    /// Depth guard tripped.
    DepthLimitExceeded {
        /// The configured maximum.
        max: u32,
    },
    /// The shape has no converter.
    NotSupported(String),
    /// Misuse of an API outside its supported conditions.
    InvalidOperation(&'static str),
    /// Cancellation token observed.
    Cancelled,
    /// An I/O failure from the byte source or sink.
    Io(std::io::Error),
}

/// One step of the location trail attached to an error as it propagates.
#[derive(Debug, Clone)]
pub enum PathSegment {
    /// A named property of an object.
    Property(Cow<'static, str>),
    /// An index into an array or object-as-array.
    Index(usize),
}

/// The error type returned by every serialize and deserialize operation.
///
/// Leaf failures are tagged with an [`ErrorKind`]; object and collection
/// converters prepend path segments on the way out, so the final error
/// reads like `$.people[3].name`. The leaf kind and its [`ErrorCode`]
/// stay observable through [`Error::kind`] and [`Error::code`].
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    // innermost-first; rendered reversed
    path: Vec<PathSegment>,
}

impl Error {
    /// Wraps a kind with an empty path.
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            path: Vec::new(),
        }
    }

    /// A generic structural failure with a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Unspecified(message.into()))
    }

    pub(crate) fn unexpected_token(marker: u8, wanted: &'static str) -> Self {
        Error::new(ErrorKind::UnexpectedToken { marker, wanted })
    }

    pub(crate) fn overflow(wanted: &'static str) -> Self {
        Error::new(ErrorKind::Overflow { wanted })
    }

    pub(crate) fn insufficient(examined: u64) -> Self {
        Error::new(ErrorKind::InsufficientBuffer { examined })
    }

    pub(crate) fn empty_buffer() -> Self {
        Error::new(ErrorKind::EmptyBuffer)
    }

    pub(crate) fn invalid_operation(what: &'static str) -> Self {
        Error::new(ErrorKind::InvalidOperation(what))
    }

    pub(crate) fn not_supported(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotSupported(message.into()))
    }

    pub(crate) fn cancelled() -> Self {
        Error::new(ErrorKind::Cancelled)
    }

    /// The failure kind at the leaf.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match &self.kind {
            ErrorKind::Unspecified(_) => ErrorCode::Unspecified,
            ErrorKind::InsufficientBuffer { .. } => ErrorCode::InsufficientBuffer,
            ErrorKind::EmptyBuffer => ErrorCode::EmptyBuffer,
            ErrorKind::UnexpectedToken { .. } => ErrorCode::UnexpectedToken,
            ErrorKind::Overflow { .. } => ErrorCode::Overflow,
            ErrorKind::InvalidUtf8 => ErrorCode::InvalidUtf8,
            ErrorKind::MissingRequiredProperty(_) => ErrorCode::MissingRequiredProperty,
            ErrorKind::DuplicateProperty(_) => ErrorCode::DuplicateProperty,
            ErrorKind::UnknownUnionDiscriminator(_) => ErrorCode::UnknownUnionDiscriminator,
            ErrorKind::UnknownEnumVariant(_) => ErrorCode::Unspecified,
            ErrorKind::DepthLimitExceeded { .. } => ErrorCode::DepthLimitExceeded,
            ErrorKind::NotSupported(_) => ErrorCode::NotSupported,
            ErrorKind::InvalidOperation(_) => ErrorCode::InvalidOperation,
            ErrorKind::Cancelled => ErrorCode::Cancelled,
            ErrorKind::Io(_) => ErrorCode::Unspecified,
        }
    }

    /// Prepends a property name to the location trail.
    pub fn with_property(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.path.push(PathSegment::Property(name.into()));
        self
    }

    /// Prepends an array index to the location trail.
    pub fn with_index(mut self, index: usize) -> Self {
        self.path.push(PathSegment::Index(index));
        self
    }

    /// Renders the location trail, `$` being the document root.
    pub fn path(&self) -> String {
        let mut out = String::from("$");
        for segment in self.path.iter().rev() {
            match segment {
                PathSegment::Property(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                PathSegment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    /// Rebuilds an equivalent error, used where a shared error must be
    /// handed to several callers.
    pub(crate) fn duplicate(&self) -> Self {
        let kind = match &self.kind {
            ErrorKind::Unspecified(message) => ErrorKind::Unspecified(message.clone()),
            ErrorKind::InsufficientBuffer { examined } => ErrorKind::InsufficientBuffer {
                examined: *examined,
            },
            ErrorKind::EmptyBuffer => ErrorKind::EmptyBuffer,
            ErrorKind::UnexpectedToken { marker, wanted } => ErrorKind::UnexpectedToken {
                marker: *marker,
                wanted: *wanted,
            },
            ErrorKind::Overflow { wanted } => ErrorKind::Overflow { wanted: *wanted },
            ErrorKind::InvalidUtf8 => ErrorKind::InvalidUtf8,
            ErrorKind::MissingRequiredProperty(name) => {
                ErrorKind::MissingRequiredProperty(name.clone())
            }
            ErrorKind::DuplicateProperty(name) => ErrorKind::DuplicateProperty(name.clone()),
            ErrorKind::UnknownUnionDiscriminator(value) => {
                ErrorKind::UnknownUnionDiscriminator(value.clone())
            }
            ErrorKind::UnknownEnumVariant(value) => ErrorKind::UnknownEnumVariant(value.clone()),
            ErrorKind::DepthLimitExceeded { max } => ErrorKind::DepthLimitExceeded { max: *max },
            ErrorKind::NotSupported(message) => ErrorKind::NotSupported(message.clone()),
            ErrorKind::InvalidOperation(what) => ErrorKind::InvalidOperation(*what),
            ErrorKind::Cancelled => ErrorKind::Cancelled,
            ErrorKind::Io(e) => ErrorKind::Unspecified(format!("i/o failure: {e}")),
        };
        Error {
            kind,
            path: self.path.clone(),
        }
    }

    /// Converts a retryable buffer shortage into the terminal error a
    /// caller sees when the input sequence was already complete.
    pub(crate) fn for_complete_sequence(self) -> Self {
        match self.kind {
            ErrorKind::InsufficientBuffer { examined } => Error {
                kind: ErrorKind::Unspecified(format!(
                    "unexpected end of input; the value needs at least {examined} bytes"
                )),
                path: self.path,
            },
            ErrorKind::EmptyBuffer => Error {
                kind: ErrorKind::Unspecified("no msgpack value in input".to_string()),
                path: self.path,
            },
            _ => self,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.path.is_empty() {
            write!(f, "at {}: ", self.path())?;
        }
        match &self.kind {
            ErrorKind::Unspecified(message) => write!(f, "{message}"),
            ErrorKind::InsufficientBuffer { examined } => {
                write!(f, "insufficient buffer; {examined} bytes needed")
            }
            ErrorKind::EmptyBuffer => write!(f, "empty buffer"),
            ErrorKind::UnexpectedToken { marker, wanted } => {
                write!(f, "unexpected msgpack byte 0x{marker:02x}, wanted {wanted}")
            }
            ErrorKind::Overflow { wanted } => {
                write!(f, "integer does not fit {wanted}")
            }
            ErrorKind::InvalidUtf8 => write!(f, "string bytes are not valid UTF-8"),
            ErrorKind::MissingRequiredProperty(name) => {
                write!(f, "missing required property: {name}")
            }
            ErrorKind::DuplicateProperty(name) => write!(f, "duplicate property: {name}"),
            ErrorKind::UnknownUnionDiscriminator(value) => {
                write!(f, "unknown union discriminator: {value}")
            }
            ErrorKind::UnknownEnumVariant(value) => {
                write!(f, "unknown enum variant: {value}")
            }
            ErrorKind::DepthLimitExceeded { max } => {
                write!(f, "nesting depth exceeded the configured maximum of {max}")
            }
            ErrorKind::NotSupported(message) => write!(f, "{message}"),
            ErrorKind::InvalidOperation(what) => write!(f, "invalid operation: {what}"),
            ErrorKind::Cancelled => write!(f, "operation cancelled"),
            ErrorKind::Io(e) => write!(f, "i/o failure: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::new(ErrorKind::Io(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_renders_outermost_first() {
        let err = Error::overflow("u8")
            .with_property("propB")
            .with_index(3)
            .with_property("propA");
        assert_eq!(err.path(), "$.propA[3].propB");
        assert_eq!(err.code(), ErrorCode::Overflow);
    }
}
