#![doc = include_str!("../README.md")]

pub use pgmap_core::error::{self, BoxDynError, DecodeError, EncodeError, Error, Result, TypeNotFoundError};

pub use pgmap_postgres::{
    catalog, handler, mapper, mapping, options, registry, translator, type_info, types, value,
};

// Types
pub use pgmap_postgres::{
    ArrayHandler, ArrayNullabilityMode, CompositeTypeHandlerFactory, EnumTypeHandlerFactory,
    FromPgValue, HandlerResolver, LocalPgCatalog, Mappings, NameTranslation, NameTranslator,
    NativeValue, Oid, PgArray, PgArrayDimension, PgBuiltinType, PgComposite, PgEnum, PgField,
    PgRange, PgRecordDecoder, PgType, PgTypeKind, PgTypeMapper, PgTypeMapperOptions, PgTypeRow,
    PgValue, RegistryState, TypeCatalog, TypeHandler, TypeHandlerFactory, TypeMapper,
    TypeMapping, TypeRegistry,
};

/// Convenience re-export of common traits.
pub mod prelude {
    pub use super::FromPgValue;
    pub use super::PgComposite;
    pub use super::PgEnum;
    pub use super::PgTypeMapper;
    pub use super::TypeCatalog;
    pub use super::TypeHandler;
    pub use super::TypeHandlerFactory;
}
