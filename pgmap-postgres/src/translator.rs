//! Translation from Rust names to server names.
//!
//! When an enum or composite is mapped without an explicit server name, the name is
//! derived from the type's `NAME` constant through a [`NameTranslator`]. Enum labels
//! and composite field names are derived from the Rust member names the same way.
//! This is the only link between a Rust symbol and a server name, so translation is
//! a pure function of its input.

use std::str::FromStr;

use heck::{ToKebabCase, ToShoutySnakeCase, ToSnakeCase};
use serde::Deserialize;

/// Maps Rust type and member names to server names.
pub trait NameTranslator: Send + Sync {
    fn translate_type_name(&self, native_name: &str) -> String;

    fn translate_member_name(&self, native_name: &str) -> String;
}

/// The built-in naming strategies.
///
/// Spelled in configuration the way `#[sqlx(rename_all = "...")]` spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum NameTranslation {
    /// Names are used as written.
    #[default]
    #[serde(rename = "exact")]
    Exact,
    #[serde(rename = "lowercase")]
    LowerCase,
    #[serde(rename = "snake_case")]
    SnakeCase,
    #[serde(rename = "UPPERCASE")]
    UpperCase,
    #[serde(rename = "SCREAMING_SNAKE_CASE")]
    ScreamingSnakeCase,
    #[serde(rename = "kebab-case")]
    KebabCase,
}

impl NameTranslation {
    pub fn apply(self, s: &str) -> String {
        match self {
            NameTranslation::Exact => s.to_owned(),
            NameTranslation::LowerCase => s.to_lowercase(),
            NameTranslation::SnakeCase => s.to_snake_case(),
            NameTranslation::UpperCase => s.to_uppercase(),
            NameTranslation::ScreamingSnakeCase => s.to_shouty_snake_case(),
            NameTranslation::KebabCase => s.to_kebab_case(),
        }
    }
}

impl NameTranslator for NameTranslation {
    fn translate_type_name(&self, native_name: &str) -> String {
        self.apply(native_name)
    }

    fn translate_member_name(&self, native_name: &str) -> String {
        self.apply(native_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name translation `{0}`")]
pub struct ParseNameTranslationError(String);

impl FromStr for NameTranslation {
    type Err = ParseNameTranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "exact" => NameTranslation::Exact,
            "lowercase" => NameTranslation::LowerCase,
            "snake_case" => NameTranslation::SnakeCase,
            "UPPERCASE" => NameTranslation::UpperCase,
            "SCREAMING_SNAKE_CASE" => NameTranslation::ScreamingSnakeCase,
            "kebab-case" => NameTranslation::KebabCase,
            other => return Err(ParseNameTranslationError(other.to_owned())),
        })
    }
}
