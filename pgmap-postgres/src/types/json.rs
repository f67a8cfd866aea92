use std::sync::Arc;

use bytes::BufMut;
use pgmap_core::io::BufExt;
use pgmap_core::{DecodeError, EncodeError};

use crate::handler::TypeHandler;
use crate::type_info::PgType;
use crate::value::PgValue;

/// `jsonb` binary values start with a format version; only version 1 exists.
const JSONB_VERSION: u8 = 1;

/// `json` and `jsonb`.
///
/// Writes accept a parsed [`serde_json::Value`] or JSON text, which is sent as is.
#[derive(Debug, Clone)]
pub struct JsonHandler {
    pg_type: Arc<PgType>,
    jsonb: bool,
}

impl JsonHandler {
    pub fn json(pg_type: Arc<PgType>) -> Self {
        JsonHandler {
            pg_type,
            jsonb: false,
        }
    }

    pub fn jsonb(pg_type: Arc<PgType>) -> Self {
        JsonHandler {
            pg_type,
            jsonb: true,
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<PgValue, DecodeError> {
        serde_json::from_slice(bytes)
            .map(PgValue::Json)
            .map_err(|e| DecodeError::malformed(self.pg_type.name(), e.to_string()))
    }
}

impl TypeHandler for JsonHandler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "serde_json::Value"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Json(_) | PgValue::Text(_))
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        if self.jsonb {
            let version = buf.read_u8()?;

            if version != JSONB_VERSION {
                return Err(DecodeError::malformed(
                    self.pg_type.name(),
                    format!("unsupported jsonb format version {version}"),
                ));
            }
        }

        let value = self.parse(*buf)?;

        *buf = &[];

        Ok(value)
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        if self.jsonb {
            buf.put_u8(JSONB_VERSION);
        }

        match value {
            PgValue::Json(json) => {
                serde_json::to_writer(&mut *buf, json).map_err(|e| EncodeError::Custom(e.into()))
            }
            PgValue::Text(text) => {
                buf.extend_from_slice(text.as_bytes());
                Ok(())
            }
            other => Err(self.unsupported(other)),
        }
    }

    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        self.parse(text.as_bytes())
    }
}
