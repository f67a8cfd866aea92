use std::mem::size_of;
use std::sync::Arc;

use bytes::BufMut;
use pgmap_core::io::BufExt;
use pgmap_core::{DecodeError, EncodeError};

use crate::handler::TypeHandler;
use crate::type_info::{Oid, PgType};
use crate::value::PgValue;

// Integer handlers accept any integer value and narrow it with a range check, so an
// `Int8(5)` can be written to an `int2` column.
macro_rules! int_handler {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $variant:ident, $read:ident, $put:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            pg_type: Arc<PgType>,
        }

        impl $name {
            pub fn new(pg_type: Arc<PgType>) -> Self {
                $name { pg_type }
            }
        }

        impl TypeHandler for $name {
            fn pg_type(&self) -> &Arc<PgType> {
                &self.pg_type
            }

            fn native_type(&self) -> &'static str {
                stringify!($ty)
            }

            fn accepts(&self, value: &PgValue) -> bool {
                value.kind().is_integer()
            }

            fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
                buf.expect_len(size_of::<$ty>())?;

                Ok(PgValue::$variant(buf.$read()?))
            }

            fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
                let wide = value.as_i64().ok_or_else(|| self.unsupported(value))?;
                let v = <$ty>::try_from(wide).map_err(|_| EncodeError::OutOfRange {
                    type_name: self.pg_type.name().to_owned(),
                    value: wide.to_string(),
                })?;

                buf.$put(v);

                Ok(())
            }

            fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
                text.parse::<$ty>()
                    .map(PgValue::$variant)
                    .map_err(|e| DecodeError::malformed(self.pg_type.name(), e.to_string()))
            }
        }
    };
}

int_handler!(
    /// `int2`
    Int2Handler, i16, Int2, read_i16, put_i16
);

int_handler!(
    /// `int4`
    Int4Handler, i32, Int4, read_i32, put_i32
);

int_handler!(
    /// `int8`
    Int8Handler, i64, Int8, read_i64, put_i64
);

/// `"char"`, the single-byte internal type; not `char(n)`.
#[derive(Debug, Clone)]
pub struct CharHandler {
    pg_type: Arc<PgType>,
}

impl CharHandler {
    pub fn new(pg_type: Arc<PgType>) -> Self {
        CharHandler { pg_type }
    }
}

impl TypeHandler for CharHandler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "i8"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        value.kind().is_integer()
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        buf.expect_len(1)?;

        Ok(PgValue::Char(buf.read_i8()?))
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        let wide = value.as_i64().ok_or_else(|| self.unsupported(value))?;
        let v = i8::try_from(wide).map_err(|_| EncodeError::OutOfRange {
            type_name: self.pg_type.name().to_owned(),
            value: wide.to_string(),
        })?;

        buf.put_i8(v);

        Ok(())
    }

    // the text form is the character itself; the empty string is `\0`
    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        match text.as_bytes() {
            [] => Ok(PgValue::Char(0)),
            [b] => Ok(PgValue::Char(i8::from_be_bytes([*b]))),
            _ => Err(DecodeError::malformed(
                self.pg_type.name(),
                format!("expected a single byte, got {text:?}"),
            )),
        }
    }
}

/// `oid` and the other 4-byte unsigned identifier types.
#[derive(Debug, Clone)]
pub struct OidHandler {
    pg_type: Arc<PgType>,
}

impl OidHandler {
    pub fn new(pg_type: Arc<PgType>) -> Self {
        OidHandler { pg_type }
    }
}

impl TypeHandler for OidHandler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "Oid"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Oid(_)) || value.kind().is_integer()
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        buf.expect_len(4)?;

        Ok(PgValue::Oid(Oid(buf.read_u32()?)))
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        let oid = match value {
            PgValue::Oid(oid) => oid.0,
            other => {
                let wide = other.as_i64().ok_or_else(|| self.unsupported(other))?;
                u32::try_from(wide).map_err(|_| EncodeError::OutOfRange {
                    type_name: self.pg_type.name().to_owned(),
                    value: wide.to_string(),
                })?
            }
        };

        buf.put_u32(oid);

        Ok(())
    }

    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        text.parse::<u32>()
            .map(|oid| PgValue::Oid(Oid(oid)))
            .map_err(|e| DecodeError::malformed(self.pg_type.name(), e.to_string()))
    }
}
