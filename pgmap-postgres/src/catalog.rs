//! The database type catalog.
//!
//! The registry never talks to the server itself. At connection startup the
//! connection layer runs [`TYPES_QUERY`] and the two companion queries for
//! composite fields and enum labels, and hands the results to
//! [`LocalPgCatalog::from_query_results`]. The resulting catalog is attached to a
//! [`TypeRegistry`](crate::TypeRegistry) with `bind`.
//!
//! # Assumptions
//!
//! 1. **Builtin Types**. The database contains the standard types from the default
//!    catalog with their default names and OIDs.
//! 2. **Immutable Types**. Types are not created, altered or dropped while a catalog
//!    is attached. If they are, build a new catalog and a new registry.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use pgmap_core::ext::ustr::UStr;
use smallvec::SmallVec;

use crate::type_info::{Oid, PgBuiltinType, PgType, PgTypeKind};

/// Selects every type the registry could be asked about.
///
/// Multiranges and types whose dependencies are in another database are filtered
/// out by [`LocalPgCatalog::from_rows`], not here.
pub const TYPES_QUERY: &str = r#"
SELECT t.oid::int8 AS oid,
       n.nspname AS namespace,
       t.typname AS name,
       pg_catalog.format_type(t.oid, NULL) AS display_name,
       t.typtype AS typtype,
       t.typcategory AS typcategory,
       t.typelem::int8 AS elemtypoid,
       t.typbasetype::int8 AS basetypoid,
       COALESCE(r.rngsubtype, 0)::int8 AS rngsubtype
FROM pg_catalog.pg_type t
JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
LEFT JOIN pg_catalog.pg_range r ON r.rngtypid = t.oid
WHERE t.typtype IN ('b', 'c', 'd', 'e', 'p', 'r')
  AND (t.typtype <> 'c' OR t.typrelid IN (SELECT oid FROM pg_catalog.pg_class WHERE relkind = 'c'))
"#;

/// Fields of every composite type, in declaration order.
pub const COMPOSITE_FIELDS_QUERY: &str = r#"
SELECT t.oid::int8 AS typoid, a.attname AS name, a.atttypid::int8 AS fieldtypoid
FROM pg_catalog.pg_type t
JOIN pg_catalog.pg_attribute a ON a.attrelid = t.typrelid
WHERE t.typtype = 'c' AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY t.oid, a.attnum
"#;

/// Labels of every enum type, in sort order.
pub const ENUM_LABELS_QUERY: &str = r#"
SELECT enumtypid::int8 AS typoid, enumlabel AS label
FROM pg_catalog.pg_enum
ORDER BY enumtypid, enumsortorder
"#;

/// Read-only view of the server's types.
pub trait TypeCatalog: Debug + Send + Sync {
    fn by_oid(&self, oid: Oid) -> Option<Arc<PgType>>;

    /// Looks a type up by internal name (`int4`), display name (`integer`) or
    /// qualified name (`pg_catalog.int4`).
    ///
    /// Two distinct types answering to the same name is an error: callers must not
    /// pick one.
    fn by_name(&self, name: &str) -> Result<Option<Arc<PgType>>, AmbiguousTypeName>;
}

/// More than one live type answers to a name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} types called `{name}` are defined in the database (OIDs {})", .candidates.len(), display_oids(.candidates))]
pub struct AmbiguousTypeName {
    pub name: String,
    pub candidates: Vec<Oid>,
}

fn display_oids(oids: &[Oid]) -> String {
    oids.iter()
        .map(Oid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InsertTypeError {
    /// A different definition is already registered under this OID.
    #[error("type OID {} is already registered as `{}`", .old.oid(), .old.full_name())]
    Conflict { old: Arc<PgType> },

    /// The qualified name is already taken by a type with another OID.
    #[error("type `{name}` is already registered with OID {existing}")]
    NameConflict { name: String, existing: Oid },
}

/// In-memory catalog.
///
/// Starts with every [`PgBuiltinType`]; custom types are added with
/// [`insert_type`](Self::insert_type) or loaded in bulk with
/// [`from_rows`](Self::from_rows).
#[derive(Debug, Clone)]
pub struct LocalPgCatalog {
    types: HashMap<Oid, Arc<PgType>>,
    // every name a type answers to, mapped to the OIDs answering to it
    names: HashMap<UStr, SmallVec<[Oid; 1]>>,
}

impl Default for LocalPgCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPgCatalog {
    /// A catalog with the builtin types.
    pub fn new() -> Self {
        let mut catalog = Self::empty();

        for builtin in PgBuiltinType::ALL {
            catalog.insert_unchecked(PgType::from(*builtin));
        }

        catalog
    }

    /// A catalog with no types at all.
    pub fn empty() -> Self {
        LocalPgCatalog {
            types: HashMap::new(),
            names: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = &Arc<PgType>> + '_ {
        self.types.values()
    }

    /// Registers a type.
    ///
    /// Re-inserting an identical definition is a no-op.
    pub fn insert_type(&mut self, ty: PgType) -> Result<(), InsertTypeError> {
        if let Some(old) = self.types.get(&ty.oid()) {
            if **old == ty {
                return Ok(());
            }

            return Err(InsertTypeError::Conflict { old: old.clone() });
        }

        let full_name = ty.full_name();
        if let Some(existing) = self
            .names
            .get(full_name.as_str())
            .and_then(|oids| oids.first().copied())
        {
            return Err(InsertTypeError::NameConflict {
                name: full_name,
                existing,
            });
        }

        self.insert_unchecked(ty);

        Ok(())
    }

    fn insert_unchecked(&mut self, ty: PgType) {
        let oid = ty.oid();
        let keys = [
            ty.name_ustr().clone(),
            ty.display_name_ustr().clone(),
            UStr::from(ty.full_name()),
        ];

        for key in keys {
            let oids = self.names.entry(key).or_default();
            if !oids.contains(&oid) {
                oids.push(oid);
            }
        }

        self.types.insert(oid, Arc::new(ty));
    }

    fn remove_type(&mut self, oid: Oid) {
        if self.types.remove(&oid).is_some() {
            self.names.retain(|_, oids| {
                oids.retain(|o| *o != oid);
                !oids.is_empty()
            });
        }
    }

    /// Builds a catalog from the rows returned by the catalog queries.
    ///
    /// Rows that cannot be represented (multiranges, unknown `typtype`) are skipped.
    /// Types that depend on a type missing from the result are dropped, along with
    /// everything depending on them, so every type left in the catalog is fully
    /// resolvable.
    pub fn from_rows(rows: impl IntoIterator<Item = PgTypeRow>) -> Result<Self, InsertTypeError> {
        let mut catalog = Self::new();

        for row in rows {
            let Some(ty) = row.into_type() else {
                continue;
            };

            // the server's definition wins over the preloaded builtin
            catalog.remove_type(ty.oid());
            catalog.insert_type(ty)?;
        }

        loop {
            let missing: Vec<Oid> = catalog
                .types
                .values()
                .filter(|ty| {
                    ty.type_dependencies()
                        .any(|dep| !catalog.types.contains_key(&dep))
                })
                .map(|ty| ty.oid())
                .collect();

            if missing.is_empty() {
                break;
            }

            for oid in missing {
                if let Some(ty) = catalog.types.get(&oid) {
                    log::warn!(
                        "dropping type `{}` (OID {}): one of its dependencies is not in the catalog",
                        ty.full_name(),
                        oid
                    );
                }

                catalog.remove_type(oid);
            }
        }

        Ok(catalog)
    }
}

impl LocalPgCatalog {
    /// Builds a catalog from the results of all three catalog queries.
    ///
    /// `fields` are the `(typoid, name, fieldtypoid)` rows of
    /// [`COMPOSITE_FIELDS_QUERY`] and `labels` the `(typoid, label)` rows of
    /// [`ENUM_LABELS_QUERY`], each in the order the query returns them. They are
    /// attached to their type rows before [`from_rows`](Self::from_rows) runs.
    pub fn from_query_results(
        types: impl IntoIterator<Item = PgTypeRow>,
        fields: impl IntoIterator<Item = (u32, String, u32)>,
        labels: impl IntoIterator<Item = (u32, String)>,
    ) -> Result<Self, InsertTypeError> {
        let mut fields_by_type: HashMap<u32, Vec<(String, u32)>> = HashMap::new();
        for (typoid, name, fieldtypoid) in fields {
            fields_by_type
                .entry(typoid)
                .or_default()
                .push((name, fieldtypoid));
        }

        let mut labels_by_type: HashMap<u32, Vec<String>> = HashMap::new();
        for (typoid, label) in labels {
            labels_by_type.entry(typoid).or_default().push(label);
        }

        let rows = types.into_iter().map(|mut row| {
            if let Some(fields) = fields_by_type.remove(&row.oid) {
                row.fields = fields;
            }

            if let Some(labels) = labels_by_type.remove(&row.oid) {
                row.labels = labels;
            }

            row
        });

        Self::from_rows(rows)
    }
}

impl TypeCatalog for LocalPgCatalog {
    fn by_oid(&self, oid: Oid) -> Option<Arc<PgType>> {
        self.types.get(&oid).cloned()
    }

    fn by_name(&self, name: &str) -> Result<Option<Arc<PgType>>, AmbiguousTypeName> {
        let Some(oids) = self.names.get(name) else {
            return Ok(None);
        };

        match oids.as_slice() {
            [] => Ok(None),
            [oid] => Ok(self.by_oid(*oid)),
            candidates => Err(AmbiguousTypeName {
                name: name.to_owned(),
                candidates: candidates.to_vec(),
            }),
        }
    }
}

/// One row of [`TYPES_QUERY`], joined with its composite fields and enum labels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PgTypeRow {
    pub oid: u32,
    pub namespace: String,
    pub name: String,
    /// `format_type(oid, NULL)`; the internal name is used when absent.
    pub display_name: Option<String>,
    pub typtype: u8,
    pub typcategory: u8,
    pub elemtypoid: u32,
    pub basetypoid: u32,
    pub rngsubtype: u32,
    /// `(attname, atttypid)` for composites.
    pub fields: Vec<(String, u32)>,
    /// `enumlabel` for enums.
    pub labels: Vec<String>,
}

impl PgTypeRow {
    /// The kind described by this row, or `None` when it has no representation here.
    pub fn kind(&self) -> Option<PgTypeKind> {
        let kind = match (self.typtype, self.typcategory) {
            // arrays are base types with an element; checked first
            (b'b', b'A') if self.elemtypoid != 0 => PgTypeKind::Array(Oid(self.elemtypoid)),
            (b'b', _) => PgTypeKind::Base,
            (b'p', _) => PgTypeKind::Pseudo,
            (b'd', _) => PgTypeKind::Domain(Oid(self.basetypoid)),
            (b'e', _) => PgTypeKind::enumeration(self.labels.iter().cloned()),
            (b'r', _) => PgTypeKind::Range(Oid(self.rngsubtype)),
            (b'c', _) => PgTypeKind::composite(
                self.fields
                    .iter()
                    .map(|(name, oid)| (UStr::from(name.clone()), Oid(*oid))),
            ),
            (typtype, _) => {
                log::debug!(
                    "skipping type `{}.{}` (OID {}): unsupported typtype `{}`",
                    self.namespace,
                    self.name,
                    self.oid,
                    char::from(typtype)
                );
                return None;
            }
        };

        Some(kind)
    }

    pub fn into_type(self) -> Option<PgType> {
        let kind = self.kind()?;
        let display_name = self.display_name.unwrap_or_else(|| self.name.clone());

        Some(
            PgType::new(Oid(self.oid), self.name, kind)
                .with_namespace(self.namespace)
                .with_display_name(display_name),
        )
    }
}
