use std::sync::Arc;

use pgmap_core::{DecodeError, EncodeError};

use crate::handler::TypeHandler;
use crate::type_info::PgType;
use crate::value::PgValue;

/// The text family: `text`, `varchar`, `bpchar`, `name`, `unknown`.
///
/// Binary and text formats are both the UTF-8 bytes of the string.
#[derive(Debug, Clone)]
pub struct TextHandler {
    pg_type: Arc<PgType>,
}

impl TextHandler {
    pub fn new(pg_type: Arc<PgType>) -> Self {
        TextHandler { pg_type }
    }
}

impl TypeHandler for TextHandler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "String"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Text(_))
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        let text = std::str::from_utf8(*buf)
            .map_err(|e| DecodeError::malformed(self.pg_type.name(), e.to_string()))?;
        let value = PgValue::Text(text.to_owned());

        *buf = &[];

        Ok(value)
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match value {
            PgValue::Text(s) => {
                buf.extend_from_slice(s.as_bytes());
                Ok(())
            }
            other => Err(self.unsupported(other)),
        }
    }

    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        Ok(PgValue::Text(text.to_owned()))
    }
}
