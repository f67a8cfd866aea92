use std::sync::Arc;

use pgmap_core::{DecodeError, EncodeError};

use crate::handler::TypeHandler;
use crate::type_info::PgType;
use crate::value::PgValue;

/// `bytea`
#[derive(Debug, Clone)]
pub struct ByteaHandler {
    pg_type: Arc<PgType>,
}

impl ByteaHandler {
    pub fn new(pg_type: Arc<PgType>) -> Self {
        ByteaHandler { pg_type }
    }
}

impl TypeHandler for ByteaHandler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "Vec<u8>"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Bytea(_))
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        let value = PgValue::Bytea(buf.to_vec());

        *buf = &[];

        Ok(value)
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match value {
            PgValue::Bytea(bytes) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
            other => Err(self.unsupported(other)),
        }
    }

    // BYTEA is formatted as \x followed by hex characters
    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        let Some(digits) = text.strip_prefix("\\x") else {
            return Err(DecodeError::malformed(
                self.pg_type.name(),
                "only the hex output format is supported",
            ));
        };

        hex::decode(digits)
            .map(PgValue::Bytea)
            .map_err(|e| DecodeError::malformed(self.pg_type.name(), e.to_string()))
    }
}
