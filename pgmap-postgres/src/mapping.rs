//! Mapping sets: server type name -> handler factory.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use pgmap_core::config_err;
use pgmap_core::ext::ustr::UStr;
use pgmap_core::Error;

use crate::handler::TypeHandlerFactory;

/// Associates a server type name with the factory for its handlers.
///
/// The name may be unqualified (`status`) or qualified with its schema
/// (`inventory.status`); a qualified name only ever matches the type in that schema.
#[derive(Clone)]
pub struct TypeMapping {
    pg_type_name: UStr,
    factory: Arc<dyn TypeHandlerFactory>,
}

impl TypeMapping {
    pub fn new(pg_type_name: impl Into<UStr>, factory: Arc<dyn TypeHandlerFactory>) -> Self {
        TypeMapping {
            pg_type_name: pg_type_name.into(),
            factory,
        }
    }

    pub fn pg_type_name(&self) -> &str {
        &self.pg_type_name
    }

    pub(crate) fn pg_type_name_ustr(&self) -> &UStr {
        &self.pg_type_name
    }

    /// The Rust type handlers built from this mapping decode to.
    pub fn native_type(&self) -> &'static str {
        self.factory.native_type()
    }

    pub fn factory(&self) -> &Arc<dyn TypeHandlerFactory> {
        &self.factory
    }

    fn validate(&self) -> Result<(), Error> {
        if self.pg_type_name.trim().is_empty() {
            return Err(config_err!(
                "cannot map `{}` to an empty server type name",
                self.native_type()
            ));
        }

        Ok(())
    }
}

impl Debug for TypeMapping {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMapping")
            .field("pg_type_name", &self.pg_type_name)
            .field("native_type", &self.native_type())
            .finish()
    }
}

impl PartialEq for TypeMapping {
    /// Two mappings are equal if they name the same type and share a factory.
    fn eq(&self, other: &Self) -> bool {
        self.pg_type_name == other.pg_type_name && Arc::ptr_eq(&self.factory, &other.factory)
    }
}

pub(crate) type MappingSet = IndexMap<UStr, TypeMapping>;

/// A mapping set behind a lock, with the set it resets to.
///
/// Writers replace the set wholesale; readers clone the `Arc` and never observe a
/// set being modified.
#[derive(Debug)]
pub(crate) struct MappingStore {
    defaults: Arc<MappingSet>,
    current: RwLock<Arc<MappingSet>>,
}

impl MappingStore {
    pub(crate) fn new(defaults: Arc<MappingSet>, current: Arc<MappingSet>) -> Self {
        MappingStore {
            defaults,
            current: RwLock::new(current),
        }
    }

    pub(crate) fn add(&self, mapping: TypeMapping) -> Result<(), Error> {
        mapping.validate()?;

        let mut current = self.current.write();
        let key = mapping.pg_type_name.clone();

        if let Some(replaced) = Arc::make_mut(&mut current).insert(key, mapping) {
            log::debug!(
                "replaced mapping of `{}` to `{}`",
                replaced.pg_type_name,
                replaced.native_type()
            );
        }

        Ok(())
    }

    pub(crate) fn remove(&self, pg_type_name: &str) -> bool {
        let mut current = self.current.write();

        if !current.contains_key(pg_type_name) {
            return false;
        }

        Arc::make_mut(&mut current)
            .shift_remove(pg_type_name)
            .is_some()
    }

    pub(crate) fn snapshot(&self) -> Arc<MappingSet> {
        Arc::clone(&self.current.read())
    }

    pub(crate) fn reset(&self) {
        *self.current.write() = Arc::clone(&self.defaults);
    }

    pub(crate) fn defaults(&self) -> &Arc<MappingSet> {
        &self.defaults
    }
}

/// A point-in-time view of a mapping set, in insertion order.
///
/// Changes made to the mapper after this was created are not observed.
#[derive(Clone)]
pub struct Mappings {
    set: Arc<MappingSet>,
    index: usize,
}

impl Mappings {
    pub(crate) fn new(set: Arc<MappingSet>) -> Self {
        Mappings { set, index: 0 }
    }

    pub fn get(&self, pg_type_name: &str) -> Option<&TypeMapping> {
        self.set.get(pg_type_name)
    }

    pub fn contains(&self, pg_type_name: &str) -> bool {
        self.set.contains_key(pg_type_name)
    }
}

impl Iterator for Mappings {
    type Item = TypeMapping;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, mapping) = self.set.get_index(self.index)?;
        self.index += 1;

        Some(mapping.clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.set.len() - self.index;

        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Mappings {}

impl Debug for Mappings {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.set.values().skip(self.index))
            .finish()
    }
}
