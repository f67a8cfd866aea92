//! The per-connection registry: resolves type OIDs to handlers.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use pgmap_core::{config_err, Error, TypeNotFoundError};

use crate::catalog::TypeCatalog;
use crate::handler::TypeHandler;
use crate::mapper::PgTypeMapper;
use crate::mapping::{MappingSet, MappingStore, Mappings, TypeMapping};
use crate::options::PgTypeMapperOptions;
use crate::translator::NameTranslator;
use crate::type_info::{Oid, PgType, PgTypeKind};
use crate::types::array::ArrayHandler;
use crate::types::builtin_mappings;
use crate::types::enums::UnmappedEnumHandler;
use crate::types::range::RangeHandler;
use crate::value::PgValue;

/// Lifecycle of a [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// No catalog attached; only configuration is possible.
    Unbound,
    /// A catalog is attached and types can be resolved.
    Bound,
    /// Mappings were reset after binding. The catalog is kept, so resolution still
    /// works, against the built-in defaults and whatever was mapped since.
    Reset,
}

#[derive(Debug, Clone)]
enum Binding {
    Unbound,
    Bound(Arc<dyn TypeCatalog>),
    Reset(Arc<dyn TypeCatalog>),
}

impl Binding {
    fn catalog(&self) -> Option<&Arc<dyn TypeCatalog>> {
        match self {
            Binding::Unbound => None,
            Binding::Bound(catalog) | Binding::Reset(catalog) => Some(catalog),
        }
    }
}

/// Resolves type OIDs to handlers for one connection.
///
/// Created from a [`TypeMapper`](crate::mapper::TypeMapper), whose mappings it copies,
/// then bound to the catalog of the connected database. Handlers are built on first
/// use and cached; changing the mappings drops the cache.
///
/// Any number of threads may resolve concurrently. Configuration calls take a write
/// lock and are meant to be rare.
pub struct TypeRegistry {
    options: PgTypeMapperOptions,
    mappings: MappingStore,
    binding: RwLock<Binding>,
    handlers: RwLock<HashMap<Oid, Arc<dyn TypeHandler>>>,
    // bumped by every configuration change; a handler built under an older
    // generation is returned but never cached
    generation: AtomicU64,
}

impl TypeRegistry {
    /// A registry with only the built-in mappings.
    pub fn new() -> Self {
        Self::with_options(PgTypeMapperOptions::default())
    }

    pub fn with_options(options: PgTypeMapperOptions) -> Self {
        let defaults = Arc::new(builtin_mappings());

        Self::from_template(options, Arc::clone(&defaults), defaults)
    }

    pub(crate) fn from_template(
        options: PgTypeMapperOptions,
        defaults: Arc<MappingSet>,
        mappings: Arc<MappingSet>,
    ) -> Self {
        TypeRegistry {
            options,
            mappings: MappingStore::new(defaults, mappings),
            binding: RwLock::new(Binding::Unbound),
            handlers: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> &PgTypeMapperOptions {
        &self.options
    }

    pub fn state(&self) -> RegistryState {
        match &*self.binding.read() {
            Binding::Unbound => RegistryState::Unbound,
            Binding::Bound(_) => RegistryState::Bound,
            Binding::Reset(_) => RegistryState::Reset,
        }
    }

    /// Attaches the catalog of the connected database.
    ///
    /// A registry is bound once; binding it again is a configuration error. Mappings
    /// that name no type in the catalog stay inert until a catalog that has the type
    /// is bound to a new registry.
    pub fn bind(&self, catalog: Arc<dyn TypeCatalog>) -> Result<(), Error> {
        let mut binding = self.binding.write();

        if !matches!(*binding, Binding::Unbound) {
            return Err(config_err!("the type registry is already bound to a catalog"));
        }

        for mapping in self.mappings.snapshot().values() {
            match catalog.by_name(mapping.pg_type_name()) {
                Ok(Some(pg_type)) => log::trace!(
                    "mapping `{}` -> {} resolves to OID {}",
                    mapping.pg_type_name(),
                    mapping.native_type(),
                    pg_type.oid()
                ),
                Ok(None) => log::debug!(
                    "mapping `{}` -> {} is inert: no such type in the database",
                    mapping.pg_type_name(),
                    mapping.native_type()
                ),
                Err(e) => log::warn!(
                    "mapping `{}` -> {} cannot be used: {}",
                    mapping.pg_type_name(),
                    mapping.native_type(),
                    e
                ),
            }
        }

        *binding = Binding::Bound(catalog);

        Ok(())
    }

    fn catalog(&self) -> Result<Arc<dyn TypeCatalog>, Error> {
        self.binding
            .read()
            .catalog()
            .cloned()
            .ok_or_else(|| config_err!("the type registry is not bound to a catalog"))
    }

    /// The handler for the type with this OID, built if not already cached.
    pub fn resolve(&self, oid: Oid) -> Result<Arc<dyn TypeHandler>, Error> {
        let catalog = self.catalog()?;

        self.resolve_in(&*catalog, oid, None)
    }

    /// The handler for the type with this name.
    ///
    /// The name may be qualified with its schema. An unqualified name shared by types
    /// in several schemas is a configuration error.
    pub fn resolve_by_name(&self, name: &str) -> Result<Arc<dyn TypeHandler>, Error> {
        let catalog = self.catalog()?;
        let pg_type = type_by_name(&*catalog, name)?;

        self.resolve_in(&*catalog, pg_type.oid(), None)
    }

    /// Decodes one binary value as received in a data row; `None` is SQL `NULL`.
    pub fn decode_value(&self, oid: Oid, value: Option<&[u8]>) -> Result<PgValue, Error> {
        let Some(mut buf) = value else {
            return Ok(PgValue::Null);
        };

        let handler = self.resolve(oid)?;
        let len = buf.len();

        Ok(handler.read(&mut buf, len)?)
    }

    /// Decodes one text-format value; `None` is SQL `NULL`.
    pub fn decode_text_value(&self, oid: Oid, value: Option<&str>) -> Result<PgValue, Error> {
        let Some(text) = value else {
            return Ok(PgValue::Null);
        };

        let handler = self.resolve(oid)?;

        Ok(handler.decode_text(text)?)
    }

    /// Appends the binary format of `value` to `buf`.
    ///
    /// Returns the number of bytes written, or `None` for [`PgValue::Null`], in which
    /// case nothing is written and the caller sends a `NULL` length.
    pub fn encode_value(
        &self,
        oid: Oid,
        value: &PgValue,
        buf: &mut Vec<u8>,
    ) -> Result<Option<usize>, Error> {
        if value.is_null() {
            return Ok(None);
        }

        let handler = self.resolve(oid)?;

        Ok(Some(handler.write(value, buf)?))
    }

    fn resolve_in(
        &self,
        catalog: &dyn TypeCatalog,
        oid: Oid,
        parent: Option<&HandlerResolver<'_>>,
    ) -> Result<Arc<dyn TypeHandler>, Error> {
        if let Some(handler) = self.handlers.read().get(&oid) {
            log::trace!("handler cache hit for OID {oid}");
            return Ok(Arc::clone(handler));
        }

        let pg_type = catalog
            .by_oid(oid)
            .ok_or(TypeNotFoundError::Oid(oid.0))?;

        let generation = self.generation.load(Ordering::Acquire);

        let resolver = HandlerResolver {
            registry: self,
            catalog,
            oid,
            parent,
        };

        // built without holding any lock: factories call back into the registry
        let handler = self.build(&resolver, pg_type)?;

        let mut handlers = self.handlers.write();

        if self.generation.load(Ordering::Acquire) != generation {
            return Ok(handler);
        }

        Ok(Arc::clone(handlers.entry(oid).or_insert(handler)))
    }

    fn build(
        &self,
        resolver: &HandlerResolver<'_>,
        pg_type: Arc<PgType>,
    ) -> Result<Arc<dyn TypeHandler>, Error> {
        if let Some(mapping) = self.find_mapping(resolver.catalog, &pg_type)? {
            log::trace!(
                "building handler for `{}` (OID {}) from mapping to {}",
                pg_type.name(),
                pg_type.oid(),
                mapping.native_type()
            );

            return mapping.factory().create(pg_type, resolver);
        }

        log::trace!(
            "building handler for {} type `{}` (OID {})",
            pg_type.kind().label(),
            pg_type.name(),
            pg_type.oid()
        );

        match pg_type.kind() {
            PgTypeKind::Array(element) => {
                let element = resolver.resolve(*element)?;

                Ok(Arc::new(ArrayHandler::standard(
                    pg_type,
                    element,
                    self.options.array_nullability,
                )))
            }

            PgTypeKind::Range(subtype) => {
                let subtype = resolver.resolve(*subtype)?;

                Ok(Arc::new(RangeHandler::new(pg_type, subtype)))
            }

            // a domain is read and written exactly like its base type
            PgTypeKind::Domain(base) => resolver.resolve(*base),

            PgTypeKind::Enum(_) => Ok(Arc::new(UnmappedEnumHandler::new(pg_type))),

            PgTypeKind::Base | PgTypeKind::Pseudo | PgTypeKind::Composite(_) => {
                Err(TypeNotFoundError::Unmapped {
                    oid: pg_type.oid().0,
                    name: pg_type.full_name(),
                }
                .into())
            }
        }
    }

    /// The mapping for `pg_type`, looked up by qualified name, then name, then display
    /// name.
    ///
    /// An unqualified key only applies if it designates `pg_type` in the catalog.
    fn find_mapping(
        &self,
        catalog: &dyn TypeCatalog,
        pg_type: &PgType,
    ) -> Result<Option<TypeMapping>, Error> {
        let mappings = self.mappings.snapshot();

        if let Some(mapping) = mappings.get(pg_type.full_name().as_str()) {
            return Ok(Some(mapping.clone()));
        }

        let mut keys = vec![pg_type.name()];
        if pg_type.display_name() != pg_type.name() {
            keys.push(pg_type.display_name());
        }

        for key in keys {
            let Some(mapping) = mappings.get(key) else {
                continue;
            };

            match catalog.by_name(key) {
                Err(e) => {
                    return Err(config_err!(
                        "cannot resolve the mapping of `{}` to {}: {}",
                        key,
                        mapping.native_type(),
                        e
                    ))
                }
                Ok(Some(named)) if named.oid() != pg_type.oid() => continue,
                Ok(_) => return Ok(Some(mapping.clone())),
            }
        }

        Ok(None)
    }

    fn invalidate(&self) {
        let mut handlers = self.handlers.write();

        self.generation.fetch_add(1, Ordering::AcqRel);
        handlers.clear();
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for TypeRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("options", &self.options)
            .field("state", &self.state())
            .field("mappings", &self.mappings.snapshot().len())
            .field("cached_handlers", &self.handlers.read().len())
            .finish()
    }
}

impl PgTypeMapper for TypeRegistry {
    fn add_mapping(&self, mapping: TypeMapping) -> Result<&Self, Error> {
        self.mappings.add(mapping)?;
        self.invalidate();

        Ok(self)
    }

    fn remove_mapping(&self, pg_type_name: &str) -> bool {
        let removed = self.mappings.remove(pg_type_name);

        if removed {
            self.invalidate();
        }

        removed
    }

    fn mappings(&self) -> Mappings {
        Mappings::new(self.mappings.snapshot())
    }

    /// Restores the built-in mappings and drops every cached handler.
    ///
    /// A bound registry keeps its catalog and moves to [`RegistryState::Reset`].
    fn reset(&self) {
        let mut binding = self.binding.write();

        self.mappings.reset();
        self.invalidate();

        if let Binding::Bound(catalog) = &*binding {
            *binding = Binding::Reset(Arc::clone(catalog));
        }
    }

    fn default_name_translator(&self) -> Arc<dyn NameTranslator> {
        Arc::new(self.options.name_translation)
    }
}

fn type_by_name(catalog: &dyn TypeCatalog, name: &str) -> Result<Arc<PgType>, Error> {
    catalog
        .by_name(name)
        .map_err(|e| config_err!(e.to_string()))?
        .ok_or_else(|| TypeNotFoundError::Name(name.to_owned()).into())
}

/// Catalog access for a [`TypeHandlerFactory`](crate::handler::TypeHandlerFactory)
/// building a handler.
///
/// Handlers resolved through it are cached by the registry like any other. Resolving a
/// type that is already being built further up is a configuration error.
pub struct HandlerResolver<'a> {
    registry: &'a TypeRegistry,
    catalog: &'a dyn TypeCatalog,
    // the type being built
    oid: Oid,
    parent: Option<&'a HandlerResolver<'a>>,
}

impl<'a> HandlerResolver<'a> {
    /// The handler for a nested type: an element, field, subtype or base type.
    pub fn resolve(&self, oid: Oid) -> Result<Arc<dyn TypeHandler>, Error> {
        let mut current = Some(self);

        while let Some(resolver) = current {
            if resolver.oid == oid {
                let name = self
                    .catalog
                    .by_oid(oid)
                    .map_or_else(|| oid.to_string(), |pg_type| pg_type.full_name());

                return Err(config_err!("type `{}` contains itself", name));
            }

            current = resolver.parent;
        }

        self.registry.resolve_in(self.catalog, oid, Some(self))
    }

    /// Looks up a type by name; an ambiguous name is a configuration error.
    pub fn type_by_name(&self, name: &str) -> Result<Arc<PgType>, Error> {
        type_by_name(self.catalog, name)
    }

    pub fn options(&self) -> &PgTypeMapperOptions {
        &self.registry.options
    }
}

impl Debug for HandlerResolver<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerResolver")
            .field("oid", &self.oid)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
