use std::sync::Arc;

use bytes::BufMut;
use pgmap_core::io::BufExt;
use pgmap_core::{DecodeError, EncodeError};

use crate::handler::TypeHandler;
use crate::type_info::PgType;
use crate::value::PgValue;

/// `bool`: one byte, `1` or `0`.
#[derive(Debug, Clone)]
pub struct BoolHandler {
    pg_type: Arc<PgType>,
}

impl BoolHandler {
    pub fn new(pg_type: Arc<PgType>) -> Self {
        BoolHandler { pg_type }
    }
}

impl TypeHandler for BoolHandler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "bool"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Bool(_))
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        buf.expect_len(1)?;

        match buf.read_u8()? {
            0 => Ok(PgValue::Bool(false)),
            1 => Ok(PgValue::Bool(true)),
            other => Err(DecodeError::malformed(
                self.pg_type.name(),
                format!("unexpected byte {other:#04x}"),
            )),
        }
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match value {
            PgValue::Bool(v) => {
                buf.put_u8(u8::from(*v));
                Ok(())
            }
            other => Err(self.unsupported(other)),
        }
    }

    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        match text {
            "t" => Ok(PgValue::Bool(true)),
            "f" => Ok(PgValue::Bool(false)),
            s => Err(DecodeError::malformed(
                self.pg_type.name(),
                format!("unexpected value {s:?} for boolean"),
            )),
        }
    }
}
