//! **PostgreSQL** type handlers and type mapping.
//!
//! A [`TypeRegistry`] turns the type OIDs a server sends into [`TypeHandler`]s that
//! read and write the binary format of each type. Which handler a type gets is decided
//! by the mappings of the [`TypeMapper`] the registry was created from, by the
//! built-in mappings, and for containers (arrays, ranges, domains) by the handler of
//! the contained type.
#![forbid(unsafe_code)]
#![warn(future_incompatible, rust_2018_idioms)]

pub mod catalog;
pub mod handler;
pub mod mapper;
pub mod mapping;
pub mod options;
pub mod registry;
pub mod translator;
pub mod type_info;
pub mod types;
pub mod value;

pub use catalog::{AmbiguousTypeName, InsertTypeError, LocalPgCatalog, PgTypeRow, TypeCatalog};
pub use handler::{SimpleHandlerFactory, TypeHandler, TypeHandlerFactory};
pub use mapper::{PgTypeMapper, TypeMapper};
pub use mapping::{Mappings, TypeMapping};
pub use options::PgTypeMapperOptions;
pub use registry::{HandlerResolver, RegistryState, TypeRegistry};
pub use translator::{NameTranslation, NameTranslator};
pub use type_info::{Oid, PgBuiltinType, PgField, PgType, PgTypeKind};
pub use types::array::{ArrayHandler, ArrayNullabilityMode};
pub use types::enums::{EnumTypeHandlerFactory, PgEnum};
pub use types::record::{CompositeTypeHandlerFactory, PgComposite, PgRecordDecoder};
pub use value::{FromPgValue, NativeValue, PgArray, PgArrayDimension, PgRange, PgValue};
