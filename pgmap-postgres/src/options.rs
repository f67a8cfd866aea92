use serde::Deserialize;

use crate::translator::NameTranslation;
use crate::types::array::ArrayNullabilityMode;

/// Options shared by a [`TypeMapper`] and every registry created from it.
///
/// Deserializable so it can be embedded in an application's configuration file:
///
/// ```toml
/// [types]
/// name-translation = "snake_case"
/// array-nullability = "never"
/// ```
///
/// [`TypeMapper`]: crate::mapper::TypeMapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PgTypeMapperOptions {
    /// How server names are derived from Rust names when none is given.
    pub name_translation: NameTranslation,

    /// Whether arrays without their own mapping may contain `NULL`.
    pub array_nullability: ArrayNullabilityMode,
}

impl PgTypeMapperOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_translation(mut self, name_translation: NameTranslation) -> Self {
        self.name_translation = name_translation;
        self
    }

    pub fn array_nullability(mut self, array_nullability: ArrayNullabilityMode) -> Self {
        self.array_nullability = array_nullability;
        self
    }
}
