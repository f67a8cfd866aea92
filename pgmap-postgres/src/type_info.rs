//! Descriptors for the types known to the connected server.
//!
//! A [`PgType`] is one row of `pg_catalog.pg_type` as seen by this crate: an identity
//! (OID, namespace, name) and a kind. The kind may refer to other types by OID,
//! forming a dependency graph (an array depends on its element, a range on its
//! subtype, a domain on its base type, a composite on each of its fields).
//!
//! Descriptors are immutable once loaded and are shared behind `Arc` between the
//! catalog and every handler bound to them.

use std::fmt;
use std::iter::Once;

use pgmap_core::ext::ustr::UStr;

/// The PostgreSQL [`OID`] type stores an object identifier,
/// used internally by PostgreSQL as primary keys for various system tables.
///
/// [`OID`]: https://www.postgresql.org/docs/current/datatype-oid.html
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Oid(
    /// The raw unsigned integer value sent over the wire
    pub u32,
);

impl Oid {
    /// Wrap a `u32` as an OID.
    pub const fn from_u32(oid: u32) -> Self {
        Self(oid)
    }

    /// Get the corresponding `u32` from the OID.
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_u32().fmt(f)
    }
}

impl From<u32> for Oid {
    fn from(oid: u32) -> Self {
        Oid(oid)
    }
}

/// A type known to the connected server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgType {
    oid: Oid,
    namespace: UStr,
    name: UStr,
    display_name: UStr,
    kind: PgTypeKind,
}

/// Type of a Postgres type.
///
/// See:
/// - <https://www.postgresql.org/docs/current/catalog-pg-type.html>
/// - <https://www.postgresql.org/docs/current/catalog-pg-type.html#CATALOG-TYPCATEGORY-TABLE>
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgTypeKind {
    /// `b` in `pg_type.typtype`.
    Base,
    /// `p` in `pg_type.typtype`.
    Pseudo,
    /// `d` in `pg_type.typtype`.
    ///
    /// With the base type.
    Domain(Oid),
    /// `c` in `pg_type.typtype`.
    ///
    /// With the list of fields, in declaration order.
    Composite(Box<[PgField]>),
    /// `A` in `pg_type.typcategory` (arrays are a first-class kind)
    ///
    /// With the element type.
    Array(Oid),
    /// `e` in `pg_type.typtype`.
    ///
    /// With the labels, in sort order.
    Enum(Box<[String]>),
    /// `r` in `pg_type.typtype`.
    ///
    /// With the subtype.
    Range(Oid),
}

/// One attribute of a composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgField {
    pub name: UStr,
    pub oid: Oid,
}

impl PgField {
    pub fn new(name: impl Into<UStr>, oid: Oid) -> Self {
        PgField {
            name: name.into(),
            oid,
        }
    }
}

impl PgTypeKind {
    pub fn composite<N: Into<UStr>>(fields: impl IntoIterator<Item = (N, Oid)>) -> Self {
        PgTypeKind::Composite(
            fields
                .into_iter()
                .map(|(name, oid)| PgField::new(name, oid))
                .collect(),
        )
    }

    pub fn enumeration<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        PgTypeKind::Enum(labels.into_iter().map(Into::into).collect())
    }

    /// Direct dependencies of this kind. Finite, but may yield duplicates.
    pub fn type_dependencies(&self) -> PgTypeDeps<'_> {
        match self {
            Self::Base | Self::Pseudo | Self::Enum(_) => PgTypeDeps::Zero,
            Self::Domain(base) => PgTypeDeps::One(std::iter::once(*base)),
            Self::Array(elem) => PgTypeDeps::One(std::iter::once(*elem)),
            Self::Range(subtype) => PgTypeDeps::One(std::iter::once(*subtype)),
            Self::Composite(fields) => PgTypeDeps::Composite(fields.iter()),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Pseudo => "pseudo",
            Self::Domain(_) => "domain",
            Self::Composite(_) => "composite",
            Self::Array(_) => "array",
            Self::Enum(_) => "enum",
            Self::Range(_) => "range",
        }
    }
}

/// Iterator over the direct type dependencies of a [`PgTypeKind`].
#[derive(Debug, Clone)]
pub enum PgTypeDeps<'a> {
    Zero,
    One(Once<Oid>),
    Composite(std::slice::Iter<'a, PgField>),
}

impl Iterator for PgTypeDeps<'_> {
    type Item = Oid;

    fn next(&mut self) -> Option<Oid> {
        match self {
            Self::Zero => None,
            Self::One(inner) => inner.next(),
            Self::Composite(fields) => fields.next().map(|field| field.oid),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Zero => (0, Some(0)),
            Self::One(inner) => inner.size_hint(),
            Self::Composite(fields) => fields.size_hint(),
        }
    }
}

impl PgType {
    /// A type in the `public` namespace whose display name is its internal name.
    pub fn new(oid: Oid, name: impl Into<UStr>, kind: PgTypeKind) -> Self {
        let name = name.into();

        PgType {
            oid,
            namespace: UStr::Static("public"),
            display_name: name.clone(),
            name,
            kind,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<UStr>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the name as printed by `format_type()`, e.g. `integer` for `int4`.
    pub fn with_display_name(mut self, display_name: impl Into<UStr>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// The internal name (`pg_type.typname`), e.g. `int4` or `_text`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// `namespace.name`; the only form guaranteed to be unique within a database.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn kind(&self) -> &PgTypeKind {
        &self.kind
    }

    pub fn type_dependencies(&self) -> PgTypeDeps<'_> {
        self.kind.type_dependencies()
    }

    pub(crate) fn name_ustr(&self) -> &UStr {
        &self.name
    }

    pub(crate) fn display_name_ustr(&self) -> &UStr {
        &self.display_name
    }
}

impl From<PgBuiltinType> for PgType {
    fn from(builtin: PgBuiltinType) -> Self {
        PgType {
            oid: builtin.oid(),
            namespace: UStr::Static("pg_catalog"),
            name: UStr::Static(builtin.name()),
            display_name: UStr::Static(builtin.display_name()),
            kind: builtin.kind(),
        }
    }
}

macro_rules! builtin_kind {
    (Base) => {
        PgTypeKind::Base
    };
    (Pseudo) => {
        PgTypeKind::Pseudo
    };
    (Array($dep:ident)) => {
        PgTypeKind::Array(PgBuiltinType::$dep.oid())
    };
    (Range($dep:ident)) => {
        PgTypeKind::Range(PgBuiltinType::$dep.oid())
    };
}

macro_rules! builtin_types {
    ($($variant:ident = ($oid:literal, $name:literal, $display:literal, $($kind:tt)+);)*) => {
        /// Types from the default catalog, with their stable OIDs.
        ///
        /// Every database contains these, so a fresh [`LocalPgCatalog`] starts with them.
        ///
        /// [`LocalPgCatalog`]: crate::catalog::LocalPgCatalog
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        pub enum PgBuiltinType {
            $($variant,)*
        }

        impl PgBuiltinType {
            pub const ALL: &'static [PgBuiltinType] = &[$(PgBuiltinType::$variant,)*];

            pub const fn oid(self) -> Oid {
                match self {
                    $(PgBuiltinType::$variant => Oid($oid),)*
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(PgBuiltinType::$variant => $name,)*
                }
            }

            pub const fn display_name(self) -> &'static str {
                match self {
                    $(PgBuiltinType::$variant => $display,)*
                }
            }

            pub fn kind(self) -> PgTypeKind {
                match self {
                    $(PgBuiltinType::$variant => builtin_kind!($($kind)+),)*
                }
            }

            pub fn try_from_oid(oid: Oid) -> Option<Self> {
                match oid.0 {
                    $($oid => Some(PgBuiltinType::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

builtin_types! {
    Bool = (16, "bool", "boolean", Base);
    Bytea = (17, "bytea", "bytea", Base);
    Char = (18, "char", "\"char\"", Base);
    Name = (19, "name", "name", Base);
    Int8 = (20, "int8", "bigint", Base);
    Int2 = (21, "int2", "smallint", Base);
    Int2Vector = (22, "int2vector", "int2vector", Array(Int2));
    Int4 = (23, "int4", "integer", Base);
    Text = (25, "text", "text", Base);
    Oid = (26, "oid", "oid", Base);
    OidVector = (30, "oidvector", "oidvector", Array(Oid));
    Json = (114, "json", "json", Base);
    JsonArray = (199, "_json", "json[]", Array(Json));
    Float4 = (700, "float4", "real", Base);
    Float8 = (701, "float8", "double precision", Base);
    Unknown = (705, "unknown", "unknown", Base);
    BoolArray = (1000, "_bool", "boolean[]", Array(Bool));
    ByteaArray = (1001, "_bytea", "bytea[]", Array(Bytea));
    CharArray = (1002, "_char", "\"char\"[]", Array(Char));
    NameArray = (1003, "_name", "name[]", Array(Name));
    Int2Array = (1005, "_int2", "smallint[]", Array(Int2));
    Int2VectorArray = (1006, "_int2vector", "int2vector[]", Array(Int2Vector));
    Int4Array = (1007, "_int4", "integer[]", Array(Int4));
    TextArray = (1009, "_text", "text[]", Array(Text));
    OidVectorArray = (1013, "_oidvector", "oidvector[]", Array(OidVector));
    BpcharArray = (1014, "_bpchar", "character[]", Array(Bpchar));
    VarcharArray = (1015, "_varchar", "character varying[]", Array(Varchar));
    Int8Array = (1016, "_int8", "bigint[]", Array(Int8));
    Float4Array = (1021, "_float4", "real[]", Array(Float4));
    Float8Array = (1022, "_float8", "double precision[]", Array(Float8));
    OidArray = (1028, "_oid", "oid[]", Array(Oid));
    Bpchar = (1042, "bpchar", "character", Base);
    Varchar = (1043, "varchar", "character varying", Base);
    Record = (2249, "record", "record", Pseudo);
    Void = (2278, "void", "void", Pseudo);
    RecordArray = (2287, "_record", "record[]", Array(Record));
    Jsonb = (3802, "jsonb", "jsonb", Base);
    JsonbArray = (3807, "_jsonb", "jsonb[]", Array(Jsonb));
    Int4Range = (3904, "int4range", "int4range", Range(Int4));
    Int4RangeArray = (3905, "_int4range", "int4range[]", Array(Int4Range));
    Int8Range = (3926, "int8range", "int8range", Range(Int8));
    Int8RangeArray = (3927, "_int8range", "int8range[]", Array(Int8Range));
}
