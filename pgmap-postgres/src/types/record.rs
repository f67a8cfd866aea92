//! Composite (row) types.
//!
//! Binary layout:
//!
//! ```text
//! i32 field count
//! n x (u32 field type OID, i32 byte length or -1 for NULL, field bytes)
//! ```

use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::BufMut;
use pgmap_core::io::BufExt;
use pgmap_core::{config_err, DecodeError, EncodeError, Error};

use crate::handler::{TypeHandler, TypeHandlerFactory};
use crate::registry::HandlerResolver;
use crate::translator::NameTranslator;
use crate::type_info::{Oid, PgType, PgTypeKind};
use crate::value::{FromPgValue, PgValue};

/// A Rust struct that can be mapped to a server composite type.
///
/// `FIELDS` lists the Rust field names in the order [`to_fields`](Self::to_fields)
/// produces them and [`from_fields`](Self::from_fields) consumes them. The server may
/// declare its fields in another order; they are matched up by translated name.
pub trait PgComposite: Clone + PartialEq + Debug + Send + Sync + 'static {
    const NAME: &'static str;

    const PG_NAME: Option<&'static str> = None;

    const FIELDS: &'static [&'static str];

    fn to_fields(&self) -> Vec<PgValue>;

    fn from_fields(fields: PgRecordDecoder) -> Result<Self, DecodeError>;
}

/// Hands decoded field values to [`PgComposite::from_fields`], in `FIELDS` order.
#[derive(Debug)]
pub struct PgRecordDecoder {
    type_name: String,
    fields: std::vec::IntoIter<PgValue>,
    index: usize,
}

impl PgRecordDecoder {
    pub fn new(type_name: impl Into<String>, fields: Vec<PgValue>) -> Self {
        PgRecordDecoder {
            type_name: type_name.into(),
            fields: fields.into_iter(),
            index: 0,
        }
    }

    /// Takes the next field and converts it.
    pub fn try_decode<T: FromPgValue>(&mut self) -> Result<T, DecodeError> {
        let value = self.fields.next().ok_or_else(|| {
            DecodeError::malformed(
                &self.type_name,
                format!("no field at index {} of the record", self.index),
            )
        })?;

        self.index += 1;

        T::from_pg_value(value)
    }

    pub fn remaining(&self) -> usize {
        self.fields.len()
    }
}

/// Writes a record payload, patching the field count once every field is written.
pub struct PgRecordEncoder<'a> {
    buf: &'a mut Vec<u8>,
    beg: usize,
    num: i32,
}

impl<'a> PgRecordEncoder<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        // reserve space for the field count
        buf.put_i32(0);

        PgRecordEncoder {
            beg: buf.len(),
            buf,
            num: 0,
        }
    }

    pub fn encode(
        &mut self,
        oid: Oid,
        handler: &dyn TypeHandler,
        value: &PgValue,
    ) -> Result<&mut Self, EncodeError> {
        self.buf.put_u32(oid.0);
        handler.write_prefixed(value, self.buf)?;

        self.num += 1;

        Ok(self)
    }

    pub fn finish(self) {
        self.buf[self.beg - 4..self.beg].copy_from_slice(&self.num.to_be_bytes());
    }
}

struct CompositeField {
    oid: Oid,
    handler: Arc<dyn TypeHandler>,
    // position of this server field in `PgComposite::FIELDS`
    native_index: usize,
}

impl Debug for CompositeField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeField")
            .field("oid", &self.oid)
            .field("handler", &self.handler.pg_type().name())
            .field("native_index", &self.native_index)
            .finish()
    }
}

/// Handler for a composite type mapped to a [`PgComposite`].
pub struct CompositeHandler<T: PgComposite> {
    pg_type: Arc<PgType>,
    // in server-declared order
    fields: Vec<CompositeField>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PgComposite> CompositeHandler<T> {
    /// Matches the fields of `T` to the fields of `pg_type` and resolves a handler for
    /// each.
    pub fn new(
        pg_type: Arc<PgType>,
        translator: &dyn NameTranslator,
        resolver: &HandlerResolver<'_>,
    ) -> Result<Self, Error> {
        let PgTypeKind::Composite(server_fields) = pg_type.kind() else {
            return Err(config_err!(
                "cannot map `{}` to `{}`: it is a {} type, not a composite",
                T::NAME,
                pg_type.name(),
                pg_type.kind().label()
            ));
        };

        if server_fields.len() != T::FIELDS.len() {
            return Err(config_err!(
                "`{}` has {} fields but composite `{}` has {}",
                T::NAME,
                T::FIELDS.len(),
                pg_type.name(),
                server_fields.len()
            ));
        }

        let translated: Vec<String> = T::FIELDS
            .iter()
            .map(|field| translator.translate_member_name(field))
            .collect();

        let mut fields = Vec::with_capacity(server_fields.len());

        for server_field in server_fields.iter() {
            let native_index = translated
                .iter()
                .position(|name| *name == *server_field.name)
                .ok_or_else(|| {
                    config_err!(
                        "composite `{}` has a field `{}` that `{}` does not declare",
                        pg_type.name(),
                        server_field.name,
                        T::NAME
                    )
                })?;

            let handler = resolver.resolve(server_field.oid)?;

            fields.push(CompositeField {
                oid: server_field.oid,
                handler,
                native_index,
            });
        }

        Ok(CompositeHandler {
            pg_type,
            fields,
            _marker: PhantomData,
        })
    }

    fn field_count(&self) -> usize {
        self.fields.len()
    }
}

impl<T: PgComposite> Debug for CompositeHandler<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeHandler")
            .field("pg_type", &self.pg_type.name())
            .field("native_type", &T::NAME)
            .field("fields", &self.fields)
            .finish()
    }
}

impl<T: PgComposite> TypeHandler for CompositeHandler<T> {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        T::NAME
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Native(native) if native.is::<T>())
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        let count = buf.read_i32()?;

        if usize::try_from(count).ok() != Some(self.field_count()) {
            return Err(DecodeError::FieldCount {
                type_name: self.pg_type.name().to_owned(),
                expected: self.field_count(),
                actual: count,
            });
        }

        let mut values = vec![PgValue::Null; self.field_count()];

        for (index, field) in self.fields.iter().enumerate() {
            let oid = buf.read_u32()?;

            if oid != field.oid.0 {
                return Err(DecodeError::FieldType {
                    type_name: self.pg_type.name().to_owned(),
                    index,
                    expected: field.oid.0,
                    actual: oid,
                });
            }

            let len = buf.read_i32()?;

            if len == -1 {
                continue;
            }

            let len = usize::try_from(len).map_err(|_| {
                DecodeError::malformed(self.pg_type.name(), format!("invalid field length: {len}"))
            })?;

            values[field.native_index] = field.handler.read(buf, len)?;
        }

        let record = T::from_fields(PgRecordDecoder::new(self.pg_type.name(), values))?;

        Ok(PgValue::native(record))
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        let record = value
            .downcast_ref::<T>()
            .ok_or_else(|| self.unsupported(value))?;

        let values = record.to_fields();

        if values.len() != self.field_count() {
            return Err(EncodeError::FieldCount {
                type_name: self.pg_type.name().to_owned(),
                expected: self.field_count(),
                actual: values.len(),
            });
        }

        let mut encoder = PgRecordEncoder::new(buf);

        for field in &self.fields {
            encoder.encode(field.oid, &*field.handler, &values[field.native_index])?;
        }

        encoder.finish();

        Ok(())
    }
}

/// Builds [`CompositeHandler`]s for `T`.
pub struct CompositeTypeHandlerFactory<T: PgComposite> {
    translator: Arc<dyn NameTranslator>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PgComposite> CompositeTypeHandlerFactory<T> {
    pub fn new(translator: Arc<dyn NameTranslator>) -> Self {
        CompositeTypeHandlerFactory {
            translator,
            _marker: PhantomData,
        }
    }
}

impl<T: PgComposite> Debug for CompositeTypeHandlerFactory<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeTypeHandlerFactory")
            .field("native_type", &T::NAME)
            .finish_non_exhaustive()
    }
}

impl<T: PgComposite> TypeHandlerFactory for CompositeTypeHandlerFactory<T> {
    fn create(
        &self,
        pg_type: Arc<PgType>,
        resolver: &HandlerResolver<'_>,
    ) -> Result<Arc<dyn TypeHandler>, Error> {
        let handler = CompositeHandler::<T>::new(pg_type, &*self.translator, resolver)?;

        Ok(Arc::new(handler))
    }

    fn native_type(&self) -> &'static str {
        T::NAME
    }
}
