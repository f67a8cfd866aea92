//! Arrays, and the two legacy vector types that share their wire format.
//!
//! Binary layout:
//!
//! ```text
//! i32 ndim | i32 has-null flag | u32 element OID
//! ndim x (i32 length, i32 lower bound)
//! n x (i32 byte length or -1 for NULL, element bytes)
//! ```
//!
//! `int2vector` and `oidvector` are one-dimensional arrays indexed from 0 that can
//! never hold a `NULL`. They are ordinary [`ArrayHandler`]s built with
//! [`ArrayHandler::vector`]; an array of vectors is an [`ArrayHandler`] whose element
//! handler is a vector [`ArrayHandler`].

use std::sync::Arc;

use bytes::BufMut;
use pgmap_core::io::BufExt;
use pgmap_core::{config_err, DecodeError, EncodeError, Error};
use serde::Deserialize;
use smallvec::SmallVec;

use crate::handler::{TypeHandler, TypeHandlerFactory};
use crate::registry::HandlerResolver;
use crate::type_info::{Oid, PgType, PgTypeKind};
use crate::types::int::{Int2Handler, OidHandler};
use crate::value::{PgArray, PgArrayDimension, PgValue};

// MAXDIM in src/include/utils/array.h
const MAX_DIMENSIONS: i32 = 6;

/// Whether a container may hold `NULL` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayNullabilityMode {
    /// A `NULL` element is a decoding error, and cannot be written.
    Never,
    /// `NULL` elements decode to [`PgValue::Null`].
    #[default]
    Allowed,
}

/// Handler for every array type, parameterized by its element handler.
///
/// The lower bound written to the wire is a construction parameter: `1` for
/// standard arrays, `0` for the legacy vector types. Decoding keeps whatever lower
/// bounds the server sent.
#[derive(Debug, Clone)]
pub struct ArrayHandler {
    pg_type: Arc<PgType>,
    element_oid: Oid,
    element: Arc<dyn TypeHandler>,
    lower_bound: i32,
    nullability: ArrayNullabilityMode,
    // one dimension on the wire, even when empty
    vector: bool,
}

impl ArrayHandler {
    pub const DEFAULT_LOWER_BOUND: i32 = 1;

    pub fn new(
        pg_type: Arc<PgType>,
        element: Arc<dyn TypeHandler>,
        lower_bound: i32,
        nullability: ArrayNullabilityMode,
    ) -> Self {
        // arrays of domains carry the domain's OID while the handler is the base type's
        let element_oid = match pg_type.kind() {
            PgTypeKind::Array(declared) => *declared,
            _ => element.pg_type().oid(),
        };

        ArrayHandler {
            pg_type,
            element_oid,
            element,
            lower_bound,
            nullability,
            vector: false,
        }
    }

    /// A standard array, indexed from 1.
    pub fn standard(
        pg_type: Arc<PgType>,
        element: Arc<dyn TypeHandler>,
        nullability: ArrayNullabilityMode,
    ) -> Self {
        Self::new(pg_type, element, Self::DEFAULT_LOWER_BOUND, nullability)
    }

    /// A legacy vector: indexed from 0, never `NULL`.
    pub fn vector(pg_type: Arc<PgType>, element: Arc<dyn TypeHandler>) -> Self {
        ArrayHandler {
            vector: true,
            ..Self::new(pg_type, element, 0, ArrayNullabilityMode::Never)
        }
    }

    pub fn is_vector(&self) -> bool {
        self.vector
    }

    pub fn element_handler(&self) -> &Arc<dyn TypeHandler> {
        &self.element
    }

    pub fn lower_bound(&self) -> i32 {
        self.lower_bound
    }

    pub fn nullability(&self) -> ArrayNullabilityMode {
        self.nullability
    }

    fn malformed(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::malformed(self.pg_type.name(), message)
    }
}

impl ArrayHandler {
    // always `ndim = 1` and lower bound 0, as `int2vectorrecv` and `oidvectorrecv` require
    fn encode_vector(&self, array: &PgArray, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        let ndim = array.dimensions().len();

        if ndim > 1 {
            return Err(EncodeError::Dimensions {
                type_name: self.pg_type.name().to_owned(),
                max: 1,
                actual: ndim,
            });
        }

        let len = i32::try_from(array.len()).map_err(|_| EncodeError::OutOfRange {
            type_name: self.pg_type.name().to_owned(),
            value: format!("length {}", array.len()),
        })?;

        buf.put_i32(1);
        buf.put_i32(0);
        buf.put_u32(self.element_oid.0);
        buf.put_i32(len);
        buf.put_i32(self.lower_bound);

        for element in array.elements() {
            self.element.write_prefixed(element, buf)?;
        }

        Ok(())
    }
}

impl TypeHandler for ArrayHandler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "PgArray"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Array(_))
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        let ndim = buf.read_i32()?;

        let max = if self.vector { 1 } else { MAX_DIMENSIONS };

        if !(0..=max).contains(&ndim) {
            return Err(self.malformed(format!("invalid number of dimensions: {ndim}")));
        }

        let flags = buf.read_i32()?;

        if flags & !1 != 0 {
            return Err(self.malformed(format!("invalid array flags: {flags:#x}")));
        }

        let element_oid = Oid(buf.read_u32()?);

        if element_oid != self.element_oid {
            return Err(DecodeError::ElementType {
                type_name: self.pg_type.name().to_owned(),
                expected: self.element_oid.0,
                actual: element_oid.0,
            });
        }

        let mut dimensions: SmallVec<[PgArrayDimension; 1]> = SmallVec::new();
        let mut count: usize = if ndim == 0 { 0 } else { 1 };

        for _ in 0..ndim {
            let len = buf.read_i32()?;
            let lower_bound = buf.read_i32()?;

            let len = usize::try_from(len)
                .map_err(|_| self.malformed(format!("invalid dimension length: {len}")))?;

            count = count
                .checked_mul(len)
                .ok_or_else(|| self.malformed("too many elements"))?;

            dimensions.push(PgArrayDimension { len, lower_bound });
        }

        // an empty vector arrives as one dimension of length 0
        if self.vector && count == 0 {
            dimensions.clear();
        }

        // every element takes at least its 4-byte length; check before allocating
        if count > buf.len() / 4 {
            return Err(DecodeError::UnexpectedEof {
                needed: count.saturating_mul(4),
                remaining: buf.len(),
            });
        }

        let mut elements = Vec::with_capacity(count);

        for _ in 0..count {
            let len = buf.read_i32()?;

            if len == -1 {
                if self.nullability == ArrayNullabilityMode::Never {
                    return Err(DecodeError::UnexpectedNull {
                        type_name: self.pg_type.name().to_owned(),
                    });
                }

                elements.push(PgValue::Null);
                continue;
            }

            let len = usize::try_from(len)
                .map_err(|_| self.malformed(format!("invalid element length: {len}")))?;

            elements.push(self.element.read(buf, len)?);
        }

        let array = PgArray::new(dimensions, elements).map_err(|e| self.malformed(e.to_string()))?;

        Ok(PgValue::Array(array))
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        let PgValue::Array(array) = value else {
            return Err(self.unsupported(value));
        };

        let has_nulls = array.has_nulls();

        if has_nulls && self.nullability == ArrayNullabilityMode::Never {
            return Err(EncodeError::UnexpectedNull {
                type_name: self.pg_type.name().to_owned(),
            });
        }

        if self.vector {
            return self.encode_vector(array, buf);
        }

        // the server sends empty arrays with zero dimensions; do the same
        if array.is_empty() {
            buf.put_i32(0);
            buf.put_i32(0);
            buf.put_u32(self.element_oid.0);

            return Ok(());
        }

        let out_of_range = |what: &str, value: usize| EncodeError::OutOfRange {
            type_name: self.pg_type.name().to_owned(),
            value: format!("{what} {value}"),
        };

        let ndim = array.dimensions().len();

        buf.put_i32(i32::try_from(ndim).map_err(|_| out_of_range("dimensions", ndim))?);
        buf.put_i32(i32::from(has_nulls));
        buf.put_u32(self.element_oid.0);

        for dim in array.dimensions() {
            buf.put_i32(i32::try_from(dim.len).map_err(|_| out_of_range("length", dim.len))?);
            buf.put_i32(self.lower_bound);
        }

        for element in array.elements() {
            self.element.write_prefixed(element, buf)?;
        }

        Ok(())
    }
}

/// Builds the handler for `int2vector` or `oidvector`.
///
/// The element type is looked up by name in the catalog; if two types answer to
/// that name the database is misconfigured and creation fails.
#[derive(Debug, Clone, Copy)]
pub struct VectorHandlerFactory {
    element_type_name: &'static str,
    native_type: &'static str,
    element: fn(Arc<PgType>) -> Arc<dyn TypeHandler>,
}

fn int2_handler(pg_type: Arc<PgType>) -> Arc<dyn TypeHandler> {
    Arc::new(Int2Handler::new(pg_type))
}

fn oid_handler(pg_type: Arc<PgType>) -> Arc<dyn TypeHandler> {
    Arc::new(OidHandler::new(pg_type))
}

impl VectorHandlerFactory {
    /// `int2vector`: a vector of `int2`.
    pub const INT2: Self = VectorHandlerFactory {
        element_type_name: "int2",
        native_type: "Vec<i16>",
        element: int2_handler,
    };

    /// `oidvector`: a vector of `oid`.
    pub const OID: Self = VectorHandlerFactory {
        element_type_name: "oid",
        native_type: "Vec<Oid>",
        element: oid_handler,
    };
}

impl TypeHandlerFactory for VectorHandlerFactory {
    fn create(
        &self,
        pg_type: Arc<PgType>,
        resolver: &HandlerResolver<'_>,
    ) -> Result<Arc<dyn TypeHandler>, Error> {
        let element_type = resolver.type_by_name(self.element_type_name)?;

        if let PgTypeKind::Array(declared) = pg_type.kind() {
            if *declared != element_type.oid() {
                return Err(config_err!(
                    "`{}` declares element OID {} but `{}` has OID {}",
                    pg_type.name(),
                    declared,
                    self.element_type_name,
                    element_type.oid()
                ));
            }
        }

        let element = (self.element)(element_type);

        Ok(Arc::new(ArrayHandler::vector(pg_type, element)))
    }

    fn native_type(&self) -> &'static str {
        self.native_type
    }
}
