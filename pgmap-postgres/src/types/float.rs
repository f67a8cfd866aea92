use std::sync::Arc;

use bytes::BufMut;
use pgmap_core::io::BufExt;
use pgmap_core::{DecodeError, EncodeError};

use crate::handler::TypeHandler;
use crate::type_info::PgType;
use crate::value::PgValue;

/// `float4`
#[derive(Debug, Clone)]
pub struct Float4Handler {
    pg_type: Arc<PgType>,
}

impl Float4Handler {
    pub fn new(pg_type: Arc<PgType>) -> Self {
        Float4Handler { pg_type }
    }
}

impl TypeHandler for Float4Handler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "f32"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Float4(_))
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        buf.expect_len(4)?;

        Ok(PgValue::Float4(buf.read_f32()?))
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match value {
            PgValue::Float4(v) => {
                buf.put_f32(*v);
                Ok(())
            }
            other => Err(self.unsupported(other)),
        }
    }

    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        text.parse::<f32>()
            .map(PgValue::Float4)
            .map_err(|e| DecodeError::malformed(self.pg_type.name(), e.to_string()))
    }
}

/// `float8`; also accepts `float4` values, which widen losslessly.
#[derive(Debug, Clone)]
pub struct Float8Handler {
    pg_type: Arc<PgType>,
}

impl Float8Handler {
    pub fn new(pg_type: Arc<PgType>) -> Self {
        Float8Handler { pg_type }
    }
}

impl TypeHandler for Float8Handler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "f64"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Float4(_) | PgValue::Float8(_))
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        buf.expect_len(8)?;

        Ok(PgValue::Float8(buf.read_f64()?))
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match value {
            PgValue::Float4(v) => buf.put_f64(f64::from(*v)),
            PgValue::Float8(v) => buf.put_f64(*v),
            other => return Err(self.unsupported(other)),
        }

        Ok(())
    }

    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        text.parse::<f64>()
            .map(PgValue::Float8)
            .map_err(|e| DecodeError::malformed(self.pg_type.name(), e.to_string()))
    }
}
