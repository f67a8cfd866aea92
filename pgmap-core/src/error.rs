//! Types for working with errors produced by pgmap.

use std::error::Error as StdError;
use std::result::Result as StdResult;

/// A specialized `Result` type for pgmap.
pub type Result<T, E = Error> = StdResult<T, E>;

// Convenience type alias for usage within pgmap.
pub type BoxDynError = Box<dyn StdError + 'static + Send + Sync>;

/// Represents all the ways a method can fail within pgmap.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad mapping input or an inconsistent server catalog.
    ///
    /// Raised immediately by the call that caused it: an empty type name, a type name
    /// shared by two live types, a composite whose fields do not line up, a registry
    /// used before it was bound, and so on.
    #[error("invalid type mapping configuration: {0}")]
    Configuration(String),

    /// No handler could be resolved for a type.
    #[error(transparent)]
    TypeNotFound(#[from] TypeNotFoundError),

    /// Error occurred while decoding a value.
    #[error("error occurred while decoding: {0}")]
    Decode(#[from] DecodeError),

    /// Error occurred while encoding a value.
    #[error("error occurred while encoding: {0}")]
    Encode(#[from] EncodeError),
}

impl Error {
    /// Returns `true` for [`Error::Configuration`].
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            Error::Decode(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_encode(&self) -> Option<&EncodeError> {
        match self {
            Error::Encode(err) => Some(err),
            _ => None,
        }
    }
}

/// A type could not be resolved to a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeNotFoundError {
    #[error("no type with OID {0} in the database catalog")]
    Oid(u32),

    #[error("no type named `{0}` in the database catalog")]
    Name(String),

    /// The catalog knows the type, but no mapping or built-in handler covers it.
    #[error("no mapping or built-in handler for type `{name}` (OID {oid})")]
    Unmapped { oid: u32, name: String },
}

/// A wire payload could not be turned into a value.
///
/// Decoding errors never invalidate the connection; only the value being read is lost.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("unexpected end of payload: needed {needed} bytes but only {remaining} remain")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("expected a payload of {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("{remaining} unread bytes left in the value window")]
    TrailingBytes { remaining: usize },

    #[error("unexpected null in `{type_name}`, which never contains nulls")]
    UnexpectedNull { type_name: String },

    #[error("composite `{type_name}` has {expected} fields but the payload reports {actual}")]
    FieldCount {
        type_name: String,
        expected: usize,
        actual: i32,
    },

    #[error("field {index} of `{type_name}` should have type OID {expected}, got {actual}")]
    FieldType {
        type_name: String,
        index: usize,
        expected: u32,
        actual: u32,
    },

    #[error("array of `{type_name}` expects element type OID {expected}, got {actual}")]
    ElementType {
        type_name: String,
        expected: u32,
        actual: u32,
    },

    #[error("unknown label `{label}` for enum `{type_name}`")]
    UnknownEnumLabel { type_name: String, label: String },

    #[error("value out of range for {target}: {value}")]
    OutOfRange { target: &'static str, value: String },

    #[error("malformed payload for `{type_name}`: {message}")]
    Malformed { type_name: String, message: String },

    #[error("`{type_name}` cannot be decoded from the {format} format")]
    UnsupportedFormat {
        type_name: String,
        format: &'static str,
    },

    #[error("cannot decode a value of kind {actual} as {expected}")]
    Mismatched {
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    Custom(BoxDynError),
}

impl DecodeError {
    pub fn malformed(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        DecodeError::Malformed {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

/// A value could not be written to the wire.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EncodeError {
    #[error("`{type_name}` does not accept a value of kind {value_kind}")]
    UnsupportedValue {
        type_name: String,
        value_kind: &'static str,
    },

    #[error("value {value} was never registered with enum `{type_name}`")]
    UnregisteredEnumValue { type_name: String, value: String },

    #[error("label `{label}` is not a member of enum `{type_name}` on the server")]
    UnknownEnumLabel { type_name: String, label: String },

    #[error("composite `{type_name}` has {expected} fields but the value provides {actual}")]
    FieldCount {
        type_name: String,
        expected: usize,
        actual: usize,
    },

    #[error("`{type_name}` cannot contain nulls")]
    UnexpectedNull { type_name: String },

    #[error("`{type_name}` has at most {max} dimension(s), the value has {actual}")]
    Dimensions {
        type_name: String,
        max: usize,
        actual: usize,
    },

    #[error("value out of range for `{type_name}`: {value}")]
    OutOfRange { type_name: String, value: String },

    #[error(transparent)]
    Custom(BoxDynError),
}

/// Format an error message as a `Configuration` error
#[macro_export]
macro_rules! config_err {
    ($fmt:literal) => {
        $crate::error::Error::Configuration(format!($fmt))
    };

    ($expr:expr) => {
        $crate::error::Error::Configuration($expr.into())
    };

    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Configuration(format!($fmt, $($arg)*))
    };
}
