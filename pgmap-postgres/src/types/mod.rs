//! Handlers for the types a server always has, plus the generic container, enum and
//! composite handlers.
//!
//! | Server type                        | Native value            |
//! |------------------------------------|-------------------------|
//! | `BOOL`                             | `bool`                  |
//! | `"CHAR"`                           | `i8`                    |
//! | `SMALLINT`, `INT2`                 | `i16`                   |
//! | `INT`, `INT4`                      | `i32`                   |
//! | `BIGINT`, `INT8`                   | `i64`                   |
//! | `REAL`, `FLOAT4`                   | `f32`                   |
//! | `DOUBLE PRECISION`, `FLOAT8`       | `f64`                   |
//! | `OID`                              | [`Oid`]                 |
//! | `TEXT`, `VARCHAR`, `CHAR(N)`, `NAME` | `String`              |
//! | `BYTEA`                            | `Vec<u8>`               |
//! | `JSON`, `JSONB`                    | `serde_json::Value`     |
//! | `INT2VECTOR`, `OIDVECTOR`          | `Vec<i16>`, `Vec<Oid>`  |
//!
//! Every array, range and domain of a type with a handler is handled as well, without
//! a mapping of its own. Enums without a mapping are read as their label text.
//!
//! [`Oid`]: crate::type_info::Oid

use std::sync::Arc;

use indexmap::IndexMap;
use pgmap_core::ext::ustr::UStr;

use crate::handler::{SimpleHandlerFactory, TypeHandler};
use crate::mapping::TypeMapping;
use crate::type_info::PgType;

pub mod array;
pub mod bool;
pub mod bytes;
pub mod enums;
pub mod float;
pub mod int;
pub mod json;
pub mod range;
pub mod record;
pub mod str;

macro_rules! simple {
    ($native:literal, $handler:expr) => {
        Arc::new(SimpleHandlerFactory::new(
            $native,
            |pg_type: Arc<PgType>| -> Arc<dyn TypeHandler> { Arc::new($handler(pg_type)) },
        ))
    };
}

/// The mappings every mapper starts with, and returns to on reset.
pub(crate) fn builtin_mappings() -> IndexMap<UStr, TypeMapping> {
    let mappings = [
        TypeMapping::new("bool", simple!("bool", self::bool::BoolHandler::new)),
        TypeMapping::new("bytea", simple!("Vec<u8>", self::bytes::ByteaHandler::new)),
        TypeMapping::new("char", simple!("i8", int::CharHandler::new)),
        TypeMapping::new("name", simple!("String", self::str::TextHandler::new)),
        TypeMapping::new("int8", simple!("i64", int::Int8Handler::new)),
        TypeMapping::new("int2", simple!("i16", int::Int2Handler::new)),
        TypeMapping::new("int4", simple!("i32", int::Int4Handler::new)),
        TypeMapping::new("text", simple!("String", self::str::TextHandler::new)),
        TypeMapping::new("oid", simple!("Oid", int::OidHandler::new)),
        TypeMapping::new("json", simple!("serde_json::Value", json::JsonHandler::json)),
        TypeMapping::new("float4", simple!("f32", float::Float4Handler::new)),
        TypeMapping::new("float8", simple!("f64", float::Float8Handler::new)),
        TypeMapping::new("unknown", simple!("String", self::str::TextHandler::new)),
        TypeMapping::new("bpchar", simple!("String", self::str::TextHandler::new)),
        TypeMapping::new("varchar", simple!("String", self::str::TextHandler::new)),
        TypeMapping::new("jsonb", simple!("serde_json::Value", json::JsonHandler::jsonb)),
        TypeMapping::new("int2vector", Arc::new(array::VectorHandlerFactory::INT2)),
        TypeMapping::new("oidvector", Arc::new(array::VectorHandlerFactory::OID)),
    ];

    mappings
        .into_iter()
        .map(|mapping| (mapping.pg_type_name_ustr().clone(), mapping))
        .collect()
}
