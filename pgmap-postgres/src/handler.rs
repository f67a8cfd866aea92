//! The binary codec contract every type handler implements.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use pgmap_core::io::{BufExt, BufMutExt};
use pgmap_core::{DecodeError, EncodeError, Error};

use crate::registry::HandlerResolver;
use crate::type_info::PgType;
use crate::value::PgValue;

/// Upcast to [`Any`], so a resolved handler can be inspected by its concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reads and writes values of exactly one server type.
///
/// Handlers carry no connection state and no mutable state across calls, so a
/// single instance may be shared by every reader of a connection.
///
/// Implementors provide [`decode`](Self::decode) and [`encode`](Self::encode);
/// callers go through [`read`](Self::read) and [`write`](Self::write), which
/// enforce the value window and the supported input surface.
pub trait TypeHandler: AsAny + Debug + Send + Sync {
    /// The type this handler was built for.
    fn pg_type(&self) -> &Arc<PgType>;

    /// Name of the Rust type values decode to, for diagnostics.
    fn native_type(&self) -> &'static str;

    /// Whether `value` is part of the supported input surface.
    fn accepts(&self, value: &PgValue) -> bool;

    /// Decodes the binary format. `buf` is exactly the value's bytes.
    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError>;

    /// Appends the binary format of an accepted value.
    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError>;

    /// Decodes the text format.
    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        let _ = text;

        Err(DecodeError::UnsupportedFormat {
            type_name: self.pg_type().name().to_owned(),
            format: "text",
        })
    }

    /// Consumes exactly `len` bytes from `buf` and decodes them.
    fn read(&self, buf: &mut &[u8], len: usize) -> Result<PgValue, DecodeError> {
        let mut window = buf.read_bytes(len)?;
        let value = self.decode(&mut window)?;

        if !window.is_empty() {
            return Err(DecodeError::TrailingBytes {
                remaining: window.len(),
            });
        }

        Ok(value)
    }

    /// Writes `value` and returns the number of bytes written.
    ///
    /// Nothing is written when the value is rejected.
    fn write(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        if !self.accepts(value) {
            return Err(self.unsupported(value));
        }

        let start = buf.len();

        if let Err(e) = self.encode(value, buf) {
            buf.truncate(start);
            return Err(e);
        }

        Ok(buf.len() - start)
    }

    /// Writes a 4-byte length prefix followed by `value`, or `-1` for `NULL`.
    fn write_prefixed(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        if value.is_null() {
            buf.put_null();
            return Ok(());
        }

        buf.put_length_prefixed(|buf| self.write(value, buf).map(|_| ()))?;

        Ok(())
    }

    fn unsupported(&self, value: &PgValue) -> EncodeError {
        EncodeError::UnsupportedValue {
            type_name: self.pg_type().name().to_owned(),
            value_kind: value.type_label(),
        }
    }
}

impl dyn TypeHandler {
    /// The concrete handler, if it is a `T`.
    pub fn downcast_ref<T: TypeHandler + 'static>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref()
    }
}

/// Builds the handler for a resolved type.
///
/// One factory is stored per mapping, behind a trait object, so the registry never
/// needs to know the Rust type the handler produces.
pub trait TypeHandlerFactory: Debug + Send + Sync {
    /// Builds a handler for `pg_type`, resolving nested element or field types through
    /// `resolver`.
    fn create(
        &self,
        pg_type: Arc<PgType>,
        resolver: &HandlerResolver<'_>,
    ) -> Result<Arc<dyn TypeHandler>, Error>;

    /// The Rust type handlers from this factory produce.
    fn native_type(&self) -> &'static str;
}

/// A factory for handlers that need nothing but their type.
#[derive(Clone, Copy)]
pub struct SimpleHandlerFactory {
    native_type: &'static str,
    create: fn(Arc<PgType>) -> Arc<dyn TypeHandler>,
}

impl SimpleHandlerFactory {
    pub const fn new(native_type: &'static str, create: fn(Arc<PgType>) -> Arc<dyn TypeHandler>) -> Self {
        SimpleHandlerFactory {
            native_type,
            create,
        }
    }
}

impl Debug for SimpleHandlerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleHandlerFactory")
            .field("native_type", &self.native_type)
            .finish_non_exhaustive()
    }
}

impl TypeHandlerFactory for SimpleHandlerFactory {
    fn create(
        &self,
        pg_type: Arc<PgType>,
        _resolver: &HandlerResolver<'_>,
    ) -> Result<Arc<dyn TypeHandler>, Error> {
        Ok((self.create)(pg_type))
    }

    fn native_type(&self) -> &'static str {
        self.native_type
    }
}
