use std::any::{type_name, Any};
use std::fmt::{self, Debug, Formatter};
use std::ops::Bound;
use std::sync::Arc;

use pgmap_core::DecodeError;
use smallvec::SmallVec;

use crate::type_info::Oid;

/// A value produced by, or handed to, a type handler.
///
/// Handlers are resolved at runtime from a type OID, so the values they exchange are
/// dynamically typed. User enums and composites travel as [`PgValue::Native`].
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    Null,
    Bool(bool),
    /// The single-byte `"char"` type.
    Char(i8),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Oid(Oid),
    Text(String),
    Bytea(Vec<u8>),
    Json(serde_json::Value),
    Array(PgArray),
    Range(PgRange),
    Native(NativeValue),
}

/// The shape of a [`PgValue`], used to describe what a handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PgValueKind {
    Null,
    Bool,
    Char,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Oid,
    Text,
    Bytea,
    Json,
    Array,
    Range,
    Native,
}

impl PgValueKind {
    pub fn name(self) -> &'static str {
        match self {
            PgValueKind::Null => "null",
            PgValueKind::Bool => "bool",
            PgValueKind::Char => "char",
            PgValueKind::Int2 => "int2",
            PgValueKind::Int4 => "int4",
            PgValueKind::Int8 => "int8",
            PgValueKind::Float4 => "float4",
            PgValueKind::Float8 => "float8",
            PgValueKind::Oid => "oid",
            PgValueKind::Text => "text",
            PgValueKind::Bytea => "bytea",
            PgValueKind::Json => "json",
            PgValueKind::Array => "array",
            PgValueKind::Range => "range",
            PgValueKind::Native => "native",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            PgValueKind::Char | PgValueKind::Int2 | PgValueKind::Int4 | PgValueKind::Int8
        )
    }
}

impl PgValue {
    pub fn kind(&self) -> PgValueKind {
        match self {
            PgValue::Null => PgValueKind::Null,
            PgValue::Bool(_) => PgValueKind::Bool,
            PgValue::Char(_) => PgValueKind::Char,
            PgValue::Int2(_) => PgValueKind::Int2,
            PgValue::Int4(_) => PgValueKind::Int4,
            PgValue::Int8(_) => PgValueKind::Int8,
            PgValue::Float4(_) => PgValueKind::Float4,
            PgValue::Float8(_) => PgValueKind::Float8,
            PgValue::Oid(_) => PgValueKind::Oid,
            PgValue::Text(_) => PgValueKind::Text,
            PgValue::Bytea(_) => PgValueKind::Bytea,
            PgValue::Json(_) => PgValueKind::Json,
            PgValue::Array(_) => PgValueKind::Array,
            PgValue::Range(_) => PgValueKind::Range,
            PgValue::Native(_) => PgValueKind::Native,
        }
    }

    /// The kind name, or the Rust type name for native values. For error messages.
    pub fn type_label(&self) -> &'static str {
        match self {
            PgValue::Native(native) => native.type_name(),
            other => other.kind().name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PgValue::Null)
    }

    /// Widens any integer variant to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            PgValue::Char(v) => Some(v.into()),
            PgValue::Int2(v) => Some(v.into()),
            PgValue::Int4(v) => Some(v.into()),
            PgValue::Int8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PgValue::Bytea(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PgArray> {
        match self {
            PgValue::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn native<T: NativeObject>(value: T) -> Self {
        PgValue::Native(NativeValue::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            PgValue::Native(native) => native.downcast_ref(),
            _ => None,
        }
    }

    /// Clones the native value out, if it is a `T`.
    pub fn into_native<T: Any + Clone>(self) -> Result<T, DecodeError> {
        let actual = self.type_label();

        self.downcast_ref::<T>()
            .cloned()
            .ok_or(DecodeError::Mismatched {
                expected: type_name::<T>(),
                actual,
            })
    }
}

/// One dimension of an array: element count and the index of the first element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgArrayDimension {
    pub len: usize,
    pub lower_bound: i32,
}

/// An array of any dimensionality, elements stored in row-major order.
///
/// Arrays decoded from the wire keep the lower bounds the server sent; when written,
/// the handler decides which lower bound goes on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PgArray {
    dimensions: SmallVec<[PgArrayDimension; 1]>,
    elements: Vec<PgValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("array dimensions {dimensions:?} describe {expected} elements, got {actual}")]
pub struct ArrayShapeError {
    pub dimensions: Vec<PgArrayDimension>,
    pub expected: usize,
    pub actual: usize,
}

impl PgArray {
    /// A one-dimensional array indexed from 1, or a zero-dimensional one when empty.
    pub fn from_elements(elements: Vec<PgValue>) -> Self {
        let dimensions = if elements.is_empty() {
            SmallVec::new()
        } else {
            smallvec::smallvec![PgArrayDimension {
                len: elements.len(),
                lower_bound: 1,
            }]
        };

        PgArray {
            dimensions,
            elements,
        }
    }

    pub fn new(
        dimensions: impl IntoIterator<Item = PgArrayDimension>,
        elements: Vec<PgValue>,
    ) -> Result<Self, ArrayShapeError> {
        let dimensions: SmallVec<[PgArrayDimension; 1]> = dimensions.into_iter().collect();

        let expected = if dimensions.is_empty() {
            0
        } else {
            dimensions
                .iter()
                .try_fold(1usize, |acc, dim| acc.checked_mul(dim.len))
                .unwrap_or(usize::MAX)
        };

        if expected != elements.len() {
            return Err(ArrayShapeError {
                dimensions: dimensions.to_vec(),
                expected,
                actual: elements.len(),
            });
        }

        Ok(PgArray {
            dimensions,
            elements,
        })
    }

    /// Re-indexes a one-dimensional array.
    pub fn with_lower_bound(mut self, lower_bound: i32) -> Self {
        if let [dim] = self.dimensions.as_mut_slice() {
            dim.lower_bound = lower_bound;
        }

        self
    }

    pub fn dimensions(&self) -> &[PgArrayDimension] {
        &self.dimensions
    }

    /// Lower bound of the first dimension.
    pub fn lower_bound(&self) -> Option<i32> {
        self.dimensions.first().map(|dim| dim.lower_bound)
    }

    pub fn elements(&self) -> &[PgValue] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<PgValue> {
        self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn has_nulls(&self) -> bool {
        self.elements.iter().any(PgValue::is_null)
    }
}

impl<T: Into<PgValue>> FromIterator<T> for PgArray {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        PgArray::from_elements(iter.into_iter().map(Into::into).collect())
    }
}

/// A range over some subtype.
#[derive(Debug, Clone, PartialEq)]
pub enum PgRange {
    Empty,
    Bounded {
        start: Bound<Box<PgValue>>,
        end: Bound<Box<PgValue>>,
    },
}

impl PgRange {
    pub fn new(start: Bound<PgValue>, end: Bound<PgValue>) -> Self {
        PgRange::Bounded {
            start: box_bound(start),
            end: box_bound(end),
        }
    }
}

fn box_bound(bound: Bound<PgValue>) -> Bound<Box<PgValue>> {
    match bound {
        Bound::Included(v) => Bound::Included(Box::new(v)),
        Bound::Excluded(v) => Bound::Excluded(Box::new(v)),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// A Rust value carried through [`PgValue::Native`].
///
/// Implemented for every `'static` type that is `Debug + PartialEq + Send + Sync`.
pub trait NativeObject: Any + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn dyn_eq(&self, other: &dyn NativeObject) -> bool;

    fn type_name(&self) -> &'static str;
}

impl<T> NativeObject for T
where
    T: Any + Debug + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn NativeObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A type-erased, cheaply clonable native value.
#[derive(Clone)]
pub struct NativeValue(Arc<dyn NativeObject>);

impl NativeValue {
    pub fn new<T: NativeObject>(value: T) -> Self {
        NativeValue(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.0).as_any().downcast_ref()
    }

    pub fn is<T: Any>(&self) -> bool {
        (*self.0).as_any().is::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        (*self.0).type_name()
    }
}

impl Debug for NativeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.0, f)
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        (*self.0).dyn_eq(&*other.0)
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident,)*) => {
        $(
            impl From<$ty> for PgValue {
                fn from(value: $ty) -> Self {
                    PgValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    i8 => Char,
    i16 => Int2,
    i32 => Int4,
    i64 => Int8,
    f32 => Float4,
    f64 => Float8,
    Oid => Oid,
    String => Text,
    Vec<u8> => Bytea,
    serde_json::Value => Json,
    PgArray => Array,
    PgRange => Range,
    NativeValue => Native,
}

impl From<&'_ str> for PgValue {
    fn from(value: &str) -> Self {
        PgValue::Text(value.to_owned())
    }
}

impl From<&'_ [u8]> for PgValue {
    fn from(value: &[u8]) -> Self {
        PgValue::Bytea(value.to_vec())
    }
}

impl<T: Into<PgValue>> From<Option<T>> for PgValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PgValue::Null, Into::into)
    }
}

/// Conversion out of a [`PgValue`] into a Rust type.
pub trait FromPgValue: Sized {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError>;
}

fn mismatched<T>(value: &PgValue) -> DecodeError {
    DecodeError::Mismatched {
        expected: type_name::<T>(),
        actual: value.type_label(),
    }
}

impl FromPgValue for PgValue {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        Ok(value)
    }
}

macro_rules! impl_from_pg_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromPgValue for $ty {
                fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
                    let wide = value.as_i64().ok_or_else(|| mismatched::<$ty>(&value))?;

                    <$ty>::try_from(wide).map_err(|_| DecodeError::OutOfRange {
                        target: stringify!($ty),
                        value: wide.to_string(),
                    })
                }
            }
        )*
    };
}

impl_from_pg_value_int!(i8, i16, i32, i64);

impl FromPgValue for u32 {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        if let PgValue::Oid(oid) = value {
            return Ok(oid.0);
        }

        let wide = value.as_i64().ok_or_else(|| mismatched::<u32>(&value))?;

        u32::try_from(wide).map_err(|_| DecodeError::OutOfRange {
            target: "u32",
            value: wide.to_string(),
        })
    }
}

impl FromPgValue for Oid {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        u32::from_pg_value(value).map(Oid)
    }
}

impl FromPgValue for bool {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        match value {
            PgValue::Bool(v) => Ok(v),
            other => Err(mismatched::<bool>(&other)),
        }
    }
}

impl FromPgValue for f32 {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        match value {
            PgValue::Float4(v) => Ok(v),
            other => Err(mismatched::<f32>(&other)),
        }
    }
}

impl FromPgValue for f64 {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        match value {
            PgValue::Float4(v) => Ok(v.into()),
            PgValue::Float8(v) => Ok(v),
            other => Err(mismatched::<f64>(&other)),
        }
    }
}

impl FromPgValue for String {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        match value {
            PgValue::Text(v) => Ok(v),
            other => Err(mismatched::<String>(&other)),
        }
    }
}

impl FromPgValue for serde_json::Value {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        match value {
            PgValue::Json(v) => Ok(v),
            other => Err(mismatched::<serde_json::Value>(&other)),
        }
    }
}

impl FromPgValue for PgArray {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        match value {
            PgValue::Array(v) => Ok(v),
            other => Err(mismatched::<PgArray>(&other)),
        }
    }
}

impl FromPgValue for PgRange {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        match value {
            PgValue::Range(v) => Ok(v),
            other => Err(mismatched::<PgRange>(&other)),
        }
    }
}

impl<T: FromPgValue> FromPgValue for Option<T> {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        match value {
            PgValue::Null => Ok(None),
            other => T::from_pg_value(other).map(Some),
        }
    }
}

/// Flattens the array in row-major order.
impl<T: FromPgValue> FromPgValue for Vec<T> {
    fn from_pg_value(value: PgValue) -> Result<Self, DecodeError> {
        match value {
            PgValue::Array(array) => array
                .into_elements()
                .into_iter()
                .map(T::from_pg_value)
                .collect(),
            other => Err(mismatched::<Vec<T>>(&other)),
        }
    }
}
