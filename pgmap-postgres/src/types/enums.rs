//! Enum types.
//!
//! Enums are sent as their label text in both formats. A mapped enum translates each
//! label to a Rust value; an unmapped one passes labels through as
//! [`PgValue::Text`].

use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use pgmap_core::{config_err, DecodeError, EncodeError, Error};

use crate::handler::{TypeHandler, TypeHandlerFactory};
use crate::registry::HandlerResolver;
use crate::translator::NameTranslator;
use crate::type_info::{PgType, PgTypeKind};
use crate::value::PgValue;

/// A Rust enum that can be mapped to a server enum.
///
/// Names are given as constants rather than derived from the type at runtime.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Status {
///     Active,
///     Inactive,
/// }
///
/// impl PgEnum for Status {
///     const NAME: &'static str = "Status";
///
///     fn variants() -> &'static [(&'static str, Self)] {
///         &[("Active", Status::Active), ("Inactive", Status::Inactive)]
///     }
/// }
/// ```
pub trait PgEnum: Copy + PartialEq + Debug + Send + Sync + 'static {
    /// The Rust name; translated to find the server type when no name is given.
    const NAME: &'static str;

    /// The server type name, bypassing translation.
    const PG_NAME: Option<&'static str> = None;

    /// Every variant, with its Rust name.
    fn variants() -> &'static [(&'static str, Self)];

    /// Labels for variants whose server label is not the translated variant name.
    fn label_overrides() -> &'static [(Self, &'static str)] {
        &[]
    }
}

fn read_label<'a>(pg_type: &PgType, buf: &mut &'a [u8]) -> Result<&'a str, DecodeError> {
    let bytes: &'a [u8] = *buf;
    let label =
        std::str::from_utf8(bytes).map_err(|e| DecodeError::malformed(pg_type.name(), e.to_string()))?;

    *buf = &[];

    Ok(label)
}

fn server_labels(pg_type: &PgType) -> &[String] {
    match pg_type.kind() {
        PgTypeKind::Enum(labels) => labels,
        _ => &[],
    }
}

/// Handler for an enum with a Rust mapping.
pub struct EnumHandler<E: PgEnum> {
    pg_type: Arc<PgType>,
    // (value, label) for every variant, in declaration order
    labels: Vec<(E, String)>,
}

impl<E: PgEnum> EnumHandler<E> {
    /// Builds the label table for `pg_type`.
    ///
    /// The label of each variant is, in order of precedence: an entry of
    /// `overrides`, an entry of [`PgEnum::label_overrides`], or the variant name passed
    /// through `translator`.
    pub fn new(
        pg_type: Arc<PgType>,
        translator: &dyn NameTranslator,
        overrides: &[(E, String)],
    ) -> Result<Self, Error> {
        if !matches!(pg_type.kind(), PgTypeKind::Enum(_)) {
            return Err(config_err!(
                "cannot map `{}` to `{}`: it is a {} type, not an enum",
                E::NAME,
                pg_type.name(),
                pg_type.kind().label()
            ));
        }

        let labels: Vec<(E, String)> = E::variants()
            .iter()
            .map(|(member, value)| {
                let label = overrides
                    .iter()
                    .find(|(v, _)| v == value)
                    .map(|(_, label)| label.clone())
                    .or_else(|| {
                        E::label_overrides()
                            .iter()
                            .find(|(v, _)| v == value)
                            .map(|(_, label)| (*label).to_owned())
                    })
                    .unwrap_or_else(|| translator.translate_member_name(member));

                (*value, label)
            })
            .collect();

        let known = server_labels(&pg_type);
        for (value, label) in &labels {
            if !known.contains(label) {
                log::debug!(
                    "{:?} maps to `{}`, which enum `{}` does not define",
                    value,
                    label,
                    pg_type.name()
                );
            }
        }

        Ok(EnumHandler { pg_type, labels })
    }

    pub fn label_of(&self, value: E) -> Option<&str> {
        self.labels
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, label)| label.as_str())
    }

    pub fn value_of(&self, label: &str) -> Option<E> {
        self.labels
            .iter()
            .find(|(_, l)| l == label)
            .map(|(v, _)| *v)
    }

    fn decode_label(&self, label: &str) -> Result<PgValue, DecodeError> {
        self.value_of(label)
            .map(PgValue::native)
            .ok_or_else(|| DecodeError::UnknownEnumLabel {
                type_name: self.pg_type.name().to_owned(),
                label: label.to_owned(),
            })
    }
}

impl<E: PgEnum> Debug for EnumHandler<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumHandler")
            .field("pg_type", &self.pg_type.name())
            .field("native_type", &E::NAME)
            .field("labels", &self.labels)
            .finish()
    }
}

impl<E: PgEnum> TypeHandler for EnumHandler<E> {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        E::NAME
    }

    fn accepts(&self, value: &PgValue) -> bool {
        match value {
            PgValue::Native(native) => native.is::<E>(),
            PgValue::Text(_) => true,
            _ => false,
        }
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        let label = read_label(&self.pg_type, buf)?;

        self.decode_label(label)
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        let label = match value {
            PgValue::Text(label) => label.as_str(),
            PgValue::Native(native) => {
                let value = native
                    .downcast_ref::<E>()
                    .ok_or_else(|| self.unsupported(value))?;

                self.label_of(*value)
                    .ok_or_else(|| EncodeError::UnregisteredEnumValue {
                        type_name: self.pg_type.name().to_owned(),
                        value: format!("{value:?}"),
                    })?
            }
            other => return Err(self.unsupported(other)),
        };

        if !server_labels(&self.pg_type).iter().any(|l| l == label) {
            return Err(EncodeError::UnknownEnumLabel {
                type_name: self.pg_type.name().to_owned(),
                label: label.to_owned(),
            });
        }

        buf.extend_from_slice(label.as_bytes());

        Ok(())
    }

    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        self.decode_label(text)
    }
}

/// Builds [`EnumHandler`]s for `E`.
pub struct EnumTypeHandlerFactory<E: PgEnum> {
    translator: Arc<dyn NameTranslator>,
    overrides: Vec<(E, String)>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: PgEnum> EnumTypeHandlerFactory<E> {
    pub fn new(translator: Arc<dyn NameTranslator>) -> Self {
        EnumTypeHandlerFactory {
            translator,
            overrides: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Sends `value` as `label`, whatever the translator says.
    pub fn with_override(mut self, value: E, label: impl Into<String>) -> Self {
        let label = label.into();

        match self.overrides.iter_mut().find(|(v, _)| *v == value) {
            Some(entry) => entry.1 = label,
            None => self.overrides.push((value, label)),
        }

        self
    }
}

impl<E: PgEnum> Debug for EnumTypeHandlerFactory<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumTypeHandlerFactory")
            .field("native_type", &E::NAME)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

impl<E: PgEnum> TypeHandlerFactory for EnumTypeHandlerFactory<E> {
    fn create(
        &self,
        pg_type: Arc<PgType>,
        _resolver: &HandlerResolver<'_>,
    ) -> Result<Arc<dyn TypeHandler>, Error> {
        let handler = EnumHandler::<E>::new(pg_type, &*self.translator, &self.overrides)?;

        Ok(Arc::new(handler))
    }

    fn native_type(&self) -> &'static str {
        E::NAME
    }
}

/// Handler for an enum nobody mapped: labels are passed through as text.
///
/// Writes are still checked against the labels the server defines.
#[derive(Debug, Clone)]
pub struct UnmappedEnumHandler {
    pg_type: Arc<PgType>,
}

impl UnmappedEnumHandler {
    pub fn new(pg_type: Arc<PgType>) -> Self {
        UnmappedEnumHandler { pg_type }
    }

    fn check_label(&self, label: &str) -> bool {
        server_labels(&self.pg_type).iter().any(|l| l == label)
    }
}

impl TypeHandler for UnmappedEnumHandler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "String"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Text(_))
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        let label = read_label(&self.pg_type, buf)?;

        self.decode_text(label)
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        let PgValue::Text(label) = value else {
            return Err(self.unsupported(value));
        };

        if !self.check_label(label) {
            return Err(EncodeError::UnknownEnumLabel {
                type_name: self.pg_type.name().to_owned(),
                label: label.clone(),
            });
        }

        buf.extend_from_slice(label.as_bytes());

        Ok(())
    }

    fn decode_text(&self, text: &str) -> Result<PgValue, DecodeError> {
        if !self.check_label(text) {
            return Err(DecodeError::UnknownEnumLabel {
                type_name: self.pg_type.name().to_owned(),
                label: text.to_owned(),
            });
        }

        Ok(PgValue::Text(text.to_owned()))
    }
}
