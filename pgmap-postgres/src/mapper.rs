//! The mapping configuration surface.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use pgmap_core::{config_err, Error};

use crate::mapping::{MappingStore, Mappings, TypeMapping};
use crate::options::PgTypeMapperOptions;
use crate::registry::TypeRegistry;
use crate::translator::NameTranslator;
use crate::types::builtin_mappings;
use crate::types::enums::{EnumTypeHandlerFactory, PgEnum};
use crate::types::record::{CompositeTypeHandlerFactory, PgComposite};

/// Registers and removes mappings between server types and Rust types.
///
/// Implemented by the shared [`TypeMapper`] and by each connection's
/// [`TypeRegistry`].
///
/// # Server names
///
/// [`map_enum`](Self::map_enum) and [`map_composite`](Self::map_composite) find the
/// server type by, in order:
///
/// 1. the `pg_name` argument, if given;
/// 2. the type's `PG_NAME` constant, if set;
/// 3. the type's `NAME` constant passed through the name translator.
///
/// The translator is the `translator` argument, or the mapper's
/// [default](Self::default_name_translator). Labels and field names are always
/// derived with the translator.
pub trait PgTypeMapper {
    /// Inserts `mapping`, replacing any mapping with the same server type name.
    fn add_mapping(&self, mapping: TypeMapping) -> Result<&Self, Error>;

    /// Removes the mapping for `pg_type_name`; returns `false` if there was none.
    fn remove_mapping(&self, pg_type_name: &str) -> bool;

    /// A snapshot of the current mappings.
    fn mappings(&self) -> Mappings;

    /// Drops every mapping and restores the built-in ones.
    fn reset(&self);

    fn default_name_translator(&self) -> Arc<dyn NameTranslator>;

    fn map_enum<E: PgEnum>(
        &self,
        pg_name: Option<&str>,
        translator: Option<Arc<dyn NameTranslator>>,
    ) -> Result<&Self, Error>
    where
        Self: Sized,
    {
        let translator = translator.unwrap_or_else(|| self.default_name_translator());
        let pg_name = pg_name_for(E::NAME, E::PG_NAME, pg_name, &*translator)?;

        self.add_mapping(TypeMapping::new(
            pg_name,
            Arc::new(EnumTypeHandlerFactory::<E>::new(translator)),
        ))
    }

    fn unmap_enum<E: PgEnum>(
        &self,
        pg_name: Option<&str>,
        translator: Option<Arc<dyn NameTranslator>>,
    ) -> Result<bool, Error>
    where
        Self: Sized,
    {
        let translator = translator.unwrap_or_else(|| self.default_name_translator());
        let pg_name = pg_name_for(E::NAME, E::PG_NAME, pg_name, &*translator)?;

        Ok(self.remove_mapping(&pg_name))
    }

    fn map_composite<T: PgComposite>(
        &self,
        pg_name: Option<&str>,
        translator: Option<Arc<dyn NameTranslator>>,
    ) -> Result<&Self, Error>
    where
        Self: Sized,
    {
        let translator = translator.unwrap_or_else(|| self.default_name_translator());
        let pg_name = pg_name_for(T::NAME, T::PG_NAME, pg_name, &*translator)?;

        self.add_mapping(TypeMapping::new(
            pg_name,
            Arc::new(CompositeTypeHandlerFactory::<T>::new(translator)),
        ))
    }

    fn unmap_composite<T: PgComposite>(
        &self,
        pg_name: Option<&str>,
        translator: Option<Arc<dyn NameTranslator>>,
    ) -> Result<bool, Error>
    where
        Self: Sized,
    {
        let translator = translator.unwrap_or_else(|| self.default_name_translator());
        let pg_name = pg_name_for(T::NAME, T::PG_NAME, pg_name, &*translator)?;

        Ok(self.remove_mapping(&pg_name))
    }
}

fn pg_name_for(
    native_name: &str,
    declared: Option<&str>,
    pg_name: Option<&str>,
    translator: &dyn NameTranslator,
) -> Result<String, Error> {
    match pg_name {
        Some(name) if name.trim().is_empty() => Err(config_err!(
            "the server type name for `{native_name}` cannot be empty"
        )),
        Some(name) => Ok(name.to_owned()),
        None => Ok(declared.map_or_else(
            || translator.translate_type_name(native_name),
            str::to_owned,
        )),
    }
}

/// The shared mapping configuration, copied into every [`TypeRegistry`] it creates.
///
/// Configure it once, typically while setting up a pool, then call
/// [`registry`](Self::registry) for each connection. Later changes only affect
/// registries created afterwards.
pub struct TypeMapper {
    options: PgTypeMapperOptions,
    mappings: MappingStore,
}

impl TypeMapper {
    pub fn new() -> Self {
        Self::with_options(PgTypeMapperOptions::default())
    }

    pub fn with_options(options: PgTypeMapperOptions) -> Self {
        let defaults = Arc::new(builtin_mappings());

        TypeMapper {
            options,
            mappings: MappingStore::new(Arc::clone(&defaults), defaults),
        }
    }

    pub fn options(&self) -> &PgTypeMapperOptions {
        &self.options
    }

    /// A new, unbound registry starting from the current mappings.
    ///
    /// Resetting the registry takes it back to the built-in mappings, not to this
    /// mapper's.
    pub fn registry(&self) -> TypeRegistry {
        TypeRegistry::from_template(
            self.options,
            Arc::clone(self.mappings.defaults()),
            self.mappings.snapshot(),
        )
    }
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for TypeMapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMapper")
            .field("options", &self.options)
            .field("mappings", &self.mappings())
            .finish()
    }
}

impl PgTypeMapper for TypeMapper {
    fn add_mapping(&self, mapping: TypeMapping) -> Result<&Self, Error> {
        self.mappings.add(mapping)?;

        Ok(self)
    }

    fn remove_mapping(&self, pg_type_name: &str) -> bool {
        self.mappings.remove(pg_type_name)
    }

    fn mappings(&self) -> Mappings {
        Mappings::new(self.mappings.snapshot())
    }

    fn reset(&self) {
        self.mappings.reset();
    }

    fn default_name_translator(&self) -> Arc<dyn NameTranslator> {
        Arc::new(self.options.name_translation)
    }
}
