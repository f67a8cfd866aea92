use std::sync::Arc;

use pgmap::{LocalPgCatalog, Oid, PgType, PgTypeKind, PgTypeMapper, TypeMapper, TypeRegistry};

pub fn setup_if_needed() {
    let _ = dotenvy::dotenv();
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const STATUS: Oid = Oid(16_385);
pub const STATUS_ARRAY: Oid = Oid(16_384);
pub const PERSON: Oid = Oid(16_387);
pub const PERSON_ARRAY: Oid = Oid(16_386);
pub const POSITIVE_INT: Oid = Oid(16_389);
pub const POSITIVE_INT_ARRAY: Oid = Oid(16_388);
pub const INT4_RANGE_DOMAIN: Oid = Oid(16_390);
pub const WIDGET_A: Oid = Oid(16_391);
pub const WIDGET_B: Oid = Oid(16_392);
pub const NODE: Oid = Oid(16_394);
pub const NODE_ARRAY: Oid = Oid(16_393);

// Catalog of a database with a few user types, the way it would be loaded at startup
//
//   CREATE TYPE status AS ENUM ('active', 'inactive');
//   CREATE TYPE person AS (id int4, name text);
//   CREATE DOMAIN positive_int AS int4 CHECK (VALUE > 0);
//   CREATE DOMAIN small_span AS int4range;
//   CREATE SCHEMA a; CREATE TYPE a.widget AS ENUM ('small', 'large');
//   CREATE SCHEMA b; CREATE TYPE b.widget AS ENUM ('tiny');
//   CREATE TYPE node AS (id int4, children node[]);  -- not valid SQL, but a catalog can say so
pub fn fixture_catalog() -> LocalPgCatalog {
    let mut catalog = LocalPgCatalog::new();

    let types = [
        PgType::new(STATUS, "status", PgTypeKind::enumeration(["active", "inactive"])),
        PgType::new(STATUS_ARRAY, "_status", PgTypeKind::Array(STATUS))
            .with_display_name("status[]"),
        PgType::new(
            PERSON,
            "person",
            PgTypeKind::composite([("id", Oid(23)), ("name", Oid(25))]),
        ),
        PgType::new(PERSON_ARRAY, "_person", PgTypeKind::Array(PERSON))
            .with_display_name("person[]"),
        PgType::new(POSITIVE_INT, "positive_int", PgTypeKind::Domain(Oid(23))),
        PgType::new(POSITIVE_INT_ARRAY, "_positive_int", PgTypeKind::Array(POSITIVE_INT))
            .with_display_name("positive_int[]"),
        PgType::new(INT4_RANGE_DOMAIN, "small_span", PgTypeKind::Domain(Oid(3904))),
        PgType::new(WIDGET_A, "widget", PgTypeKind::enumeration(["small", "large"]))
            .with_namespace("a"),
        PgType::new(WIDGET_B, "widget", PgTypeKind::enumeration(["tiny"])).with_namespace("b"),
        PgType::new(
            NODE,
            "node",
            PgTypeKind::composite([("id", Oid(23)), ("children", NODE_ARRAY)]),
        ),
        PgType::new(NODE_ARRAY, "_node", PgTypeKind::Array(NODE)).with_display_name("node[]"),
    ];

    for ty in types {
        if let Err(e) = catalog.insert_type(ty) {
            panic!("invalid fixture catalog: {e}");
        }
    }

    catalog
}

/// A registry with the built-in mappings, bound to [`fixture_catalog`].
pub fn registry() -> anyhow::Result<TypeRegistry> {
    bound(&TypeMapper::new())
}

/// A registry created from `mapper`, bound to [`fixture_catalog`].
pub fn bound(mapper: &TypeMapper) -> anyhow::Result<TypeRegistry> {
    setup_if_needed();

    let registry = mapper.registry();
    registry.bind(Arc::new(fixture_catalog()))?;

    log::debug!(
        "bound registry with {} mappings to the fixture catalog",
        registry.mappings().len()
    );

    Ok(registry)
}

// Test that values survive a write and a read through a registry
#[macro_export]
macro_rules! test_round_trip {
    ($name:ident($oid:expr, $($value:expr),+ $(,)?)) => {
        $crate::test_round_trip!($name with $crate::registry()?, ($oid, $($value),+));
    };

    ($name:ident with $registry:expr, ($oid:expr, $($value:expr),+ $(,)?)) => {
        paste::item! {
            #[test]
            fn [< test_round_trip_ $name >] () -> anyhow::Result<()> {
                let registry = $registry;
                let oid: pgmap::Oid = $oid;

                $(
                    let value: pgmap::PgValue = ($value).into();
                    let mut buf = Vec::new();

                    let written = registry.encode_value(oid, &value, &mut buf)?;
                    assert_eq!(written.unwrap_or(0), buf.len());

                    let decoded = registry.decode_value(oid, written.map(|_| &buf[..]))?;
                    assert_eq!(decoded, value, "round trip through OID {}", oid);
                )+

                Ok(())
            }
        }
    };
}

// Test that a binary payload decodes to a value, and that the value encodes back to it
#[macro_export]
macro_rules! test_wire_format {
    ($name:ident($oid:expr, $($bytes:expr => $value:expr),+ $(,)?)) => {
        paste::item! {
            #[test]
            fn [< test_wire_format_ $name >] () -> anyhow::Result<()> {
                let registry = $crate::registry()?;
                let oid: pgmap::Oid = $oid;

                $(
                    let bytes: &[u8] = $bytes;
                    let value: pgmap::PgValue = ($value).into();

                    assert_eq!(registry.decode_value(oid, Some(bytes))?, value);

                    let mut buf = Vec::new();
                    registry.encode_value(oid, &value, &mut buf)?;
                    assert_eq!(buf, bytes);
                )+

                Ok(())
            }
        }
    };
}
