use std::sync::Arc;

use pgmap::prelude::*;
use pgmap::{
    DecodeError, Error, LocalPgCatalog, Oid, PgArray, PgBuiltinType, PgRecordDecoder, PgTypeRow,
    PgValue, RegistryState, TypeMapper, TypeMapping, TypeNotFoundError, TypeRegistry,
};
use pgmap_test::{NODE, NODE_ARRAY, PERSON, PERSON_ARRAY, STATUS};

const INT4: Oid = PgBuiltinType::Int4.oid();

#[derive(Debug, Clone, PartialEq)]
struct Person {
    id: i32,
    name: String,
}

impl PgComposite for Person {
    const NAME: &'static str = "person";
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

#[derive(Debug, Clone, PartialEq)]
struct Node {
    id: i32,
    children: PgArray,
}

impl PgComposite for Node {
    const NAME: &'static str = "node";
    const FIELDS: &'static [&'static str] = &["id", "children"];

    fn to_fields(&self) -> Vec<PgValue> {
        vec![self.id.into(), self.children.clone().into()]
    }

    fn from_fields(mut fields: PgRecordDecoder) -> Result<Self, DecodeError> {
        Ok(Node {
            id: fields.try_decode()?,
            children: fields.try_decode()?,
        })
    }
}

fn text_mapping(mapper: &impl PgTypeMapper, pg_type_name: &str) -> TypeMapping {
    let mappings = mapper.mappings();
    let text = mappings.get("text").expect("builtin text mapping");

    TypeMapping::new(pg_type_name.to_owned(), Arc::clone(text.factory()))
}

#[test]
fn it_binds_once() -> anyhow::Result<()> {
    pgmap_test::setup_if_needed();

    let registry = TypeRegistry::new();
    assert_eq!(registry.state(), RegistryState::Unbound);

    let err = registry.resolve(INT4).unwrap_err();
    assert!(err.is_configuration());

    let catalog = Arc::new(pgmap_test::fixture_catalog());
    registry.bind(catalog.clone())?;
    assert_eq!(registry.state(), RegistryState::Bound);

    let err = registry.bind(catalog).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(registry.state(), RegistryState::Bound);

    assert_eq!(
        registry.decode_value(INT4, Some(b"\x00\x00\x00\x2a"))?,
        PgValue::Int4(42)
    );

    Ok(())
}

#[test]
fn reset_restores_the_builtin_mappings() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    mapper.map_composite::<Person>(None, None)?;

    let registry = pgmap_test::bound(&mapper)?;
    assert!(registry.mappings().contains("person"));
    assert!(registry.resolve(PERSON).is_ok());

    let cached = registry.resolve(INT4)?;

    registry.reset();
    assert_eq!(registry.state(), RegistryState::Reset);
    assert_eq!(registry.mappings().len(), TypeMapper::new().mappings().len());
    assert!(!registry.mappings().contains("person"));

    let err = registry.resolve(PERSON).unwrap_err();
    assert!(matches!(
        err,
        Error::TypeNotFound(TypeNotFoundError::Unmapped { oid: 16_387, .. })
    ));
    assert!(registry.resolve(PERSON_ARRAY).is_err());

    // the catalog is kept, the cache is not
    let rebuilt = registry.resolve(INT4)?;
    assert!(!Arc::ptr_eq(&cached, &rebuilt));

    // unmapped enums still fall back to text
    assert_eq!(
        registry.decode_value(STATUS, Some(&b"active"[..]))?,
        PgValue::Text("active".into())
    );

    // and can be configured again
    registry.map_composite::<Person>(None, None)?;
    let person = PgValue::native(Person {
        id: 3,
        name: "Ann".to_owned(),
    });

    let mut buf = Vec::new();
    registry.encode_value(PERSON, &person, &mut buf)?;
    assert_eq!(registry.decode_value(PERSON, Some(&buf[..]))?, person);
    assert_eq!(registry.state(), RegistryState::Reset);

    // a reset registry is still bound
    let err = registry
        .bind(Arc::new(pgmap_test::fixture_catalog()))
        .unwrap_err();
    assert!(err.is_configuration());

    Ok(())
}

#[test]
fn reset_before_binding_stays_unbound() {
    let registry = TypeRegistry::new();

    registry.reset();
    assert_eq!(registry.state(), RegistryState::Unbound);
}

#[test]
fn configuration_changes_drop_cached_handlers() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    let before = registry.resolve(INT4)?;
    assert!(Arc::ptr_eq(&before, &registry.resolve(INT4)?));

    // unrelated to int4, but every change invalidates the whole cache
    registry.map_composite::<Person>(None, None)?;

    let after = registry.resolve(INT4)?;
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(Arc::ptr_eq(&after, &registry.resolve(INT4)?));

    // removing nothing changes nothing
    assert!(!registry.remove_mapping("no_such_type"));
    assert!(Arc::ptr_eq(&after, &registry.resolve(INT4)?));

    Ok(())
}

#[test]
fn removing_an_unknown_mapping_is_a_no_op() {
    let mapper = TypeMapper::new();
    let before: Vec<String> = mapper
        .mappings()
        .map(|m| m.pg_type_name().to_owned())
        .collect();

    assert!(!mapper.remove_mapping("no_such_type"));

    let after: Vec<String> = mapper
        .mappings()
        .map(|m| m.pg_type_name().to_owned())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn blank_names_are_rejected() {
    let mapper = TypeMapper::new();
    let len = mapper.mappings().len();

    for name in ["", "   "] {
        let err = mapper.add_mapping(text_mapping(&mapper, name)).unwrap_err();
        assert!(err.is_configuration(), "{err}");
    }

    let err = mapper.map_composite::<Person>(Some(""), None).unwrap_err();
    assert!(err.is_configuration());

    assert_eq!(mapper.mappings().len(), len);
}

#[test]
fn mappings_are_replaced_by_name() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    let len = mapper.mappings().len();

    // read `person` as text, then map it properly
    mapper.add_mapping(text_mapping(&mapper, "person"))?;
    mapper.map_composite::<Person>(None, None)?;
    assert_eq!(mapper.mappings().len(), len + 1);

    let registry = pgmap_test::bound(&mapper)?;
    let handler = registry.resolve(PERSON)?;
    assert_eq!(handler.native_type(), Person::NAME);

    assert!(mapper.unmap_composite::<Person>(None, None)?);
    assert!(!mapper.unmap_composite::<Person>(None, None)?);

    Ok(())
}

#[test]
fn registries_copy_the_mapper() -> anyhow::Result<()> {
    let mapper = TypeMapper::new();
    let registry = pgmap_test::bound(&mapper)?;

    // a later change to the mapper does not reach existing registries
    mapper.map_composite::<Person>(None, None)?;
    assert!(registry.resolve(PERSON).is_err());
    assert!(pgmap_test::bound(&mapper)?.resolve(PERSON).is_ok());

    // nor does a change to a registry reach the mapper
    registry.add_mapping(text_mapping(&registry, "status"))?;
    assert!(!TypeMapper::new().mappings().contains("status"));
    assert!(!mapper.mappings().contains("status"));

    Ok(())
}

#[test]
fn recursive_composites_are_a_configuration_error() -> anyhow::Result<()> {
    // without a mapping there is nothing to build
    let registry = pgmap_test::registry()?;
    assert!(matches!(
        registry.resolve(NODE).unwrap_err(),
        Error::TypeNotFound(TypeNotFoundError::Unmapped { .. })
    ));

    let mapper = TypeMapper::new();
    mapper.map_composite::<Node>(None, None)?;
    let registry = pgmap_test::bound(&mapper)?;

    for oid in [NODE, NODE_ARRAY] {
        let err = registry.resolve(oid).unwrap_err();
        assert!(err.is_configuration(), "{err}");
        assert!(err.to_string().contains("contains itself"), "{err}");
    }

    // nothing half-built was cached
    assert!(registry.resolve(NODE).unwrap_err().is_configuration());
    assert!(registry.resolve(INT4).is_ok());

    Ok(())
}

#[test]
fn unknown_oids_are_not_found() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    let err = registry.resolve(Oid(999_999)).unwrap_err();
    assert!(matches!(
        err,
        Error::TypeNotFound(TypeNotFoundError::Oid(999_999))
    ));

    let err = registry.resolve_by_name("no_such_type").unwrap_err();
    assert!(matches!(err, Error::TypeNotFound(TypeNotFoundError::Name(_))));

    // NULL never reaches a handler
    assert_eq!(registry.decode_value(Oid(999_999), None)?, PgValue::Null);

    Ok(())
}

#[test]
fn it_resolves_by_name() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    let by_name = registry.resolve_by_name("int4")?;
    assert!(Arc::ptr_eq(&by_name, &registry.resolve(INT4)?));

    let status = registry.resolve_by_name("status")?;
    assert_eq!(status.pg_type().oid(), STATUS);

    assert!(registry.resolve_by_name("a.widget").is_ok());
    assert!(registry
        .resolve_by_name("widget")
        .unwrap_err()
        .is_configuration());

    Ok(())
}

#[test]
fn concurrent_resolution_shares_one_handler() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;
    let oid = PgBuiltinType::Int8RangeArray.oid();

    let handlers = std::thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| s.spawn(|| registry.resolve(oid)))
            .collect();

        workers
            .into_iter()
            .map(|worker| worker.join().expect("worker panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    let cached = registry.resolve(oid)?;
    for handler in &handlers {
        assert!(Arc::ptr_eq(handler, &cached));
    }

    Ok(())
}

#[test]
fn it_binds_a_catalog_loaded_from_rows() -> anyhow::Result<()> {
    pgmap_test::setup_if_needed();

    let rows = vec![
        PgTypeRow {
            oid: 20_001,
            namespace: "public".into(),
            name: "level".into(),
            typtype: b'e',
            typcategory: b'E',
            labels: vec!["low".into(), "high".into()],
            ..PgTypeRow::default()
        },
        PgTypeRow {
            oid: 20_000,
            namespace: "public".into(),
            name: "_level".into(),
            display_name: Some("level[]".into()),
            typtype: b'b',
            typcategory: b'A',
            elemtypoid: 20_001,
            ..PgTypeRow::default()
        },
        // depends on a type the query did not return
        PgTypeRow {
            oid: 20_002,
            namespace: "public".into(),
            name: "orphan".into(),
            typtype: b'd',
            typcategory: b'N',
            basetypoid: 29_999,
            ..PgTypeRow::default()
        },
    ];

    let catalog = LocalPgCatalog::from_rows(rows)?;
    assert!(catalog.by_oid(Oid(20_002)).is_none());
    assert!(catalog.by_name("level[]")?.is_some());

    let registry = TypeRegistry::new();
    registry.bind(Arc::new(catalog))?;

    let value: PgValue = ["high", "low"].into_iter().collect::<PgArray>().into();
    let mut buf = Vec::new();
    registry.encode_value(Oid(20_000), &value, &mut buf)?;
    assert_eq!(registry.decode_value(Oid(20_000), Some(&buf[..]))?, value);

    let err = registry
        .decode_value(Oid(20_001), Some(&b"medium"[..]))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Decode(DecodeError::UnknownEnumLabel { .. })
    ));

    Ok(())
}
