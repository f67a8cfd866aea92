use std::sync::Arc;

use pgmap::prelude::*;
use pgmap::{
    DecodeError, EncodeError, EnumTypeHandlerFactory, Error, NameTranslation, NameTranslator,
    PgRecordDecoder, PgTypeMapperOptions, PgValue, TypeMapper, TypeMapping,
};
use pgmap_test::{PERSON, STATUS, WIDGET_A, WIDGET_B};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Status {
    Active,
    Inactive,
}

impl PgEnum for Status {
    const NAME: &'static str = "Status";

    fn variants() -> &'static [(&'static str, Self)] {
        &[("Active", Status::Active), ("Inactive", Status::Inactive)]
    }
}

// one variant more than the server knows about
#[derive(Debug, Clone, Copy, PartialEq)]
enum Widget {
    Small,
    Large,
    Huge,
}

impl PgEnum for Widget {
    const NAME: &'static str = "Widget";

    fn variants() -> &'static [(&'static str, Self)] {
        &[
            ("Small", Widget::Small),
            ("Large", Widget::Large),
            ("Huge", Widget::Huge),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Person {
    id: i32,
    name: String,
}

impl PgComposite for Person {
    const NAME: &'static str = "Person";
    const FIELDS: &'static [&'static str] = &["id", "name"];

    fn to_fields(&self) -> Vec<PgValue> {
        vec![self.id.into(), self.name.clone().into()]
    }

    fn from_fields(mut fields: PgRecordDecoder) -> Result<Self, DecodeError> {
        Ok(Person {
            id: fields.try_decode()?,
            name: fields.try_decode()?,
        })
    }
}

// same fields as `person`, declared in the other order
#[derive(Debug, Clone, PartialEq)]
struct NamedId {
    name: Option<String>,
    id: i64,
}

impl PgComposite for NamedId {
    const NAME: &'static str = "NamedId";
    const PG_NAME: Option<&'static str> = Some("person");
    const FIELDS: &'static [&'static str] = &["Name", "Id"];

    fn to_fields(&self) -> Vec<PgValue> {
        vec![self.name.clone().into(), PgValue::Int8(self.id)]
    }

    fn from_fields(mut fields: PgRecordDecoder) -> Result<Self, DecodeError> {
        Ok(NamedId {
            name: fields.try_decode()?,
            id: fields.try_decode()?,
        })
    }
}

fn lowercase() -> Option<Arc<dyn NameTranslator>> {
    Some(Arc::new(NameTranslation::LowerCase))
}

#[test]
fn it_maps_enums_through_the_name_translator() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    mapper.map_enum::<Status>(None, lowercase())?;

    let registry = pgmap_test::bound(&mapper)?;

    assert_eq!(
        registry
            .decode_value(STATUS, Some(&b"active"[..]))?
            .downcast_ref::<Status>(),
        Some(&Status::Active)
    );
    assert_eq!(
        registry
            .decode_value(STATUS, Some(&b"inactive"[..]))?
            .downcast_ref::<Status>(),
        Some(&Status::Inactive)
    );

    let err = registry
        .decode_value(STATUS, Some(&b"pending"[..]))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Decode(DecodeError::UnknownEnumLabel { ref label, .. }) if label == "pending"
    ));

    let mut buf = Vec::new();
    registry.encode_value(STATUS, &PgValue::native(Status::Inactive), &mut buf)?;
    assert_eq!(buf, b"inactive");

    Ok(())
}

#[test]
fn enum_arrays_use_the_enum_mapping() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    mapper.map_enum::<Status>(None, lowercase())?;

    let registry = pgmap_test::bound(&mapper)?;

    let value = PgValue::Array(
        [Status::Active, Status::Inactive]
            .into_iter()
            .map(PgValue::native)
            .collect(),
    );

    let mut buf = Vec::new();
    registry.encode_value(pgmap_test::STATUS_ARRAY, &value, &mut buf)?;
    assert_eq!(
        registry.decode_value(pgmap_test::STATUS_ARRAY, Some(&buf[..]))?,
        value
    );

    Ok(())
}

#[test]
fn enum_writes_are_checked_against_the_server() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    mapper.add_mapping(TypeMapping::new(
        "a.widget",
        Arc::new(
            EnumTypeHandlerFactory::<Widget>::new(Arc::new(NameTranslation::LowerCase))
                .with_override(Widget::Large, "large"),
        ),
    ))?;

    let registry = pgmap_test::bound(&mapper)?;

    let mut buf = Vec::new();
    registry.encode_value(WIDGET_A, &PgValue::native(Widget::Large), &mut buf)?;
    assert_eq!(buf, b"large");

    // `huge` is not a label of a.widget
    let mut buf = Vec::new();
    let err = registry
        .encode_value(WIDGET_A, &PgValue::native(Widget::Huge), &mut buf)
        .unwrap_err();
    assert!(matches!(err, Error::Encode(EncodeError::UnknownEnumLabel { .. })));
    assert!(buf.is_empty());

    // a value of another Rust type is outside the input surface
    let err = registry
        .encode_value(WIDGET_A, &PgValue::native(Status::Active), &mut buf)
        .unwrap_err();
    assert!(matches!(err, Error::Encode(EncodeError::UnsupportedValue { .. })));

    Ok(())
}

#[test]
fn ambiguous_names_are_a_configuration_error() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    mapper.map_enum::<Widget>(None, lowercase())?;

    let registry = pgmap_test::bound(&mapper)?;

    for oid in [WIDGET_A, WIDGET_B] {
        let err = registry.resolve(oid).unwrap_err();
        assert!(err.is_configuration(), "{err}");
    }

    let err = registry.resolve_by_name("widget").unwrap_err();
    assert!(err.is_configuration());

    // a failed resolution does not poison later ones
    assert!(registry.resolve_by_name("b.widget").is_err());
    assert!(registry.resolve(PERSON).is_err());
    assert!(registry.resolve(STATUS).is_ok());

    Ok(())
}

#[test]
fn qualified_names_only_match_their_schema() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    mapper.map_enum::<Widget>(Some("a.widget"), lowercase())?;

    let registry = pgmap_test::bound(&mapper)?;

    let value = registry.decode_value(WIDGET_A, Some(&b"small"[..]))?;
    assert_eq!(value.downcast_ref::<Widget>(), Some(&Widget::Small));

    // b.widget has no mapping and is read as text
    let value = registry.decode_value(WIDGET_B, Some(&b"tiny"[..]))?;
    assert_eq!(value, PgValue::Text("tiny".into()));

    Ok(())
}

#[test]
fn it_round_trips_composites() -> anyhow::Result<()> {
    let mapper = TypeMapper::with_options(
        PgTypeMapperOptions::new().name_translation(NameTranslation::SnakeCase),
    );
    mapper.map_composite::<Person>(None, None)?;

    let registry = pgmap_test::bound(&mapper)?;

    let person = Person {
        id: 1,
        name: "Joe".to_owned(),
    };

    let mut buf = Vec::new();
    registry.encode_value(PERSON, &PgValue::native(person.clone()), &mut buf)?;

    let expected: &[u8] = b"\x00\x00\x00\x02\
        \x00\x00\x00\x17\x00\x00\x00\x04\x00\x00\x00\x01\
        \x00\x00\x00\x19\x00\x00\x00\x03Joe";
    assert_eq!(buf, expected);

    let decoded = registry.decode_value(PERSON, Some(&buf[..]))?;
    assert_eq!(decoded.into_native::<Person>()?, person);

    Ok(())
}

#[test]
fn composites_reject_a_different_field_count() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    mapper.map_composite::<Person>(Some("person"), None)?;

    let registry = pgmap_test::bound(&mapper)?;

    // a three-field record
    let payload = b"\x00\x00\x00\x03\
        \x00\x00\x00\x17\x00\x00\x00\x04\x00\x00\x00\x01\
        \x00\x00\x00\x19\x00\x00\x00\x03Joe\
        \x00\x00\x00\x17\xff\xff\xff\xff";

    let err = registry.decode_value(PERSON, Some(&payload[..])).unwrap_err();
    assert!(matches!(
        err,
        Error::Decode(DecodeError::FieldCount {
            expected: 2,
            actual: 3,
            ..
        })
    ));

    // the registry is still usable
    let person = PgValue::native(Person {
        id: -4,
        name: String::new(),
    });
    let mut buf = Vec::new();
    registry.encode_value(PERSON, &person, &mut buf)?;
    assert_eq!(registry.decode_value(PERSON, Some(&buf[..]))?, person);

    Ok(())
}

#[test]
fn composite_fields_are_matched_by_name() -> anyhow::Result<()> {
    let mapper = TypeMapper::with_options(
        PgTypeMapperOptions::new().name_translation(NameTranslation::LowerCase),
    );
    mapper.map_composite::<NamedId>(None, None)?;
    assert!(mapper.mappings().contains("person"));

    let registry = pgmap_test::bound(&mapper)?;

    let value = PgValue::native(NamedId {
        name: None,
        id: 12,
    });

    let mut buf = Vec::new();
    registry.encode_value(PERSON, &value, &mut buf)?;

    // server order: id (int4) first, then a null name
    assert_eq!(&buf[4..16], b"\x00\x00\x00\x17\x00\x00\x00\x04\x00\x00\x00\x0c");
    assert_eq!(&buf[16..], b"\x00\x00\x00\x19\xff\xff\xff\xff");

    assert_eq!(registry.decode_value(PERSON, Some(&buf[..]))?, value);

    Ok(())
}

#[test]
fn composite_field_names_must_line_up() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    // exact translation: `Name` and `Id` are not the server's `name` and `id`
    mapper.map_composite::<NamedId>(None, None)?;

    let registry = pgmap_test::bound(&mapper)?;

    let err = registry.resolve(PERSON).unwrap_err();
    assert!(err.is_configuration());

    Ok(())
}

#[test]
fn mapping_the_wrong_kind_is_a_configuration_error() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    mapper.map_enum::<Status>(Some("person"), None)?;
    mapper.map_composite::<Person>(Some("status"), None)?;

    let registry = pgmap_test::bound(&mapper)?;

    assert!(registry.resolve(PERSON).unwrap_err().is_configuration());
    assert!(registry.resolve(STATUS).unwrap_err().is_configuration());

    Ok(())
}
