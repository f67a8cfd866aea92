use std::ops::Bound;

use pgmap::types::range::RangeHandler;
use pgmap::{
    ArrayHandler, ArrayNullabilityMode, DecodeError, EncodeError, Error, Oid, PgArray,
    PgArrayDimension, PgBuiltinType, PgRange, PgTypeMapperOptions, PgValue, TypeHandler,
    TypeMapper,
};
use pgmap_test::{test_round_trip, test_wire_format};

const INT4_ARRAY: Oid = PgBuiltinType::Int4Array.oid();
const INT2_VECTOR: Oid = PgBuiltinType::Int2Vector.oid();
const OID_VECTOR: Oid = PgBuiltinType::OidVector.oid();
const INT2_VECTOR_ARRAY: Oid = PgBuiltinType::Int2VectorArray.oid();

fn vector<T: Into<PgValue>>(elements: impl IntoIterator<Item = T>) -> PgValue {
    PgValue::Array(elements.into_iter().collect::<PgArray>().with_lower_bound(0))
}

fn array(elements: Vec<PgValue>) -> PgValue {
    PgValue::Array(PgArray::from_elements(elements))
}

test_round_trip!(int4_array(
    INT4_ARRAY,
    PgArray::default(),
    [1_i32, 2, 3].into_iter().collect::<PgArray>(),
    PgArray::from_elements(vec![PgValue::Null, PgValue::Int4(i32::MAX), PgValue::Null]),
));

test_round_trip!(text_array(
    PgBuiltinType::TextArray.oid(),
    ["", "a", "b c"].into_iter().collect::<PgArray>(),
));

test_round_trip!(int4_matrix(
    INT4_ARRAY,
    PgArray::new(
        [
            PgArrayDimension { len: 2, lower_bound: 1 },
            PgArrayDimension { len: 3, lower_bound: 1 },
        ],
        (1..=6_i32).map(PgValue::from).collect(),
    )
    .unwrap(),
));

test_round_trip!(int2vector(INT2_VECTOR, vector([1_i16, 2, 3]), vector(Vec::<i16>::new())));

test_round_trip!(oidvector(OID_VECTOR, vector([Oid(23), Oid(25)])));

test_round_trip!(int4range(
    PgBuiltinType::Int4Range.oid(),
    PgRange::Empty,
    PgRange::new(Bound::Included(PgValue::Int4(1)), Bound::Excluded(PgValue::Int4(10))),
    PgRange::new(Bound::Unbounded, Bound::Included(PgValue::Int4(i32::MIN))),
));

test_round_trip!(int8range_array(
    PgBuiltinType::Int8RangeArray.oid(),
    PgArray::from_elements(vec![
        PgValue::Range(PgRange::new(
            Bound::Included(PgValue::Int8(-5)),
            Bound::Unbounded
        )),
        PgValue::Null,
    ]),
));

test_round_trip!(domain(pgmap_test::POSITIVE_INT, 7_i32));

test_round_trip!(domain_array(
    pgmap_test::POSITIVE_INT_ARRAY,
    [1_i32, 2].into_iter().collect::<PgArray>(),
));

test_round_trip!(range_domain(
    pgmap_test::INT4_RANGE_DOMAIN,
    PgRange::new(Bound::Excluded(PgValue::Int4(0)), Bound::Unbounded),
));

test_round_trip!(unmapped_enum_array(
    pgmap_test::STATUS_ARRAY,
    ["active", "inactive"].into_iter().collect::<PgArray>(),
));

test_wire_format!(int2vector_lower_bound_zero(
    INT2_VECTOR,
    b"\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x15\x00\x00\x00\x02\x00\x00\x00\x00\
      \x00\x00\x00\x02\x00\x01\x00\x00\x00\x02\x00\x02" => vector([1_i16, 2]),
));

// empty vectors still carry their one dimension
test_wire_format!(empty_vectors(
    INT2_VECTOR,
    b"\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x15\x00\x00\x00\x00\x00\x00\x00\x00"
        => vector(Vec::<i16>::new()),
));

test_wire_format!(empty_oidvector(
    OID_VECTOR,
    b"\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x1a\x00\x00\x00\x00\x00\x00\x00\x00"
        => PgArray::default(),
));

#[test]
fn vectors_always_encode_lower_bound_zero() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    // indexed from 5 on the Rust side
    let value = PgValue::Array(
        [7_i16, 8]
            .into_iter()
            .collect::<PgArray>()
            .with_lower_bound(5),
    );

    let mut buf = Vec::new();
    registry.encode_value(INT2_VECTOR, &value, &mut buf)?;

    // ndim, flags, element OID, length, lower bound
    assert_eq!(&buf[16..20], &0_i32.to_be_bytes());

    let decoded = registry.decode_value(INT2_VECTOR, Some(&buf[..]))?;
    assert_eq!(decoded.as_array().and_then(PgArray::lower_bound), Some(0));

    Ok(())
}

#[test]
fn vectors_reject_more_than_one_dimension() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    let matrix = PgValue::Array(PgArray::new(
        [
            PgArrayDimension { len: 2, lower_bound: 0 },
            PgArrayDimension { len: 1, lower_bound: 0 },
        ],
        vec![PgValue::Oid(Oid(23)), PgValue::Oid(Oid(25))],
    )?);

    let mut buf = Vec::new();
    let err = registry
        .encode_value(OID_VECTOR, &matrix, &mut buf)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Encode(EncodeError::Dimensions { max: 1, actual: 2, .. })
    ));
    assert!(buf.is_empty());

    // the same value is a valid oid[]
    registry.encode_value(PgBuiltinType::OidArray.oid(), &matrix, &mut buf)?;
    assert_eq!(&buf[..4], &2_i32.to_be_bytes());

    Ok(())
}

#[test]
fn vectors_reject_null_elements() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    let payloads: [(Oid, &[u8]); 2] = [
        (
            INT2_VECTOR,
            b"\x00\x00\x00\x01\x00\x00\x00\x01\x00\x00\x00\x15\x00\x00\x00\x02\x00\x00\x00\x00\
              \x00\x00\x00\x02\x00\x07\xff\xff\xff\xff",
        ),
        (
            OID_VECTOR,
            b"\x00\x00\x00\x01\x00\x00\x00\x01\x00\x00\x00\x1a\x00\x00\x00\x01\x00\x00\x00\x00\
              \xff\xff\xff\xff",
        ),
    ];

    for (oid, payload) in payloads {
        let err = registry.decode_value(oid, Some(&payload[..])).unwrap_err();
        assert!(
            matches!(err, Error::Decode(DecodeError::UnexpectedNull { .. })),
            "{err:?}"
        );
    }

    let mut buf = Vec::new();
    let err = registry
        .encode_value(OID_VECTOR, &array(vec![PgValue::Null]), &mut buf)
        .unwrap_err();
    assert!(matches!(err, Error::Encode(EncodeError::UnexpectedNull { .. })));
    assert!(buf.is_empty());

    Ok(())
}

#[test]
fn arrays_of_vectors_compose_vector_handlers() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    let handler = registry.resolve(INT2_VECTOR_ARRAY)?;
    let outer = handler
        .downcast_ref::<ArrayHandler>()
        .expect("array handler");
    assert_eq!(outer.lower_bound(), 1);

    let inner = outer
        .element_handler()
        .downcast_ref::<ArrayHandler>()
        .expect("vector handler");
    assert_eq!(inner.pg_type().name(), "int2vector");
    assert!(inner.is_vector());
    assert!(!outer.is_vector());
    assert_eq!(inner.lower_bound(), 0);
    assert_eq!(inner.nullability(), ArrayNullabilityMode::Never);
    assert_eq!(inner.element_handler().pg_type().name(), "int2");

    let value = array(vec![vector([1_i16, 2]), vector([3_i16, 4, 5])]);

    let mut buf = Vec::new();
    registry.encode_value(INT2_VECTOR_ARRAY, &value, &mut buf)?;
    assert_eq!(
        registry.decode_value(INT2_VECTOR_ARRAY, Some(&buf[..]))?,
        value
    );

    // the same handler instance serves every later lookup
    let again = registry.resolve(INT2_VECTOR_ARRAY)?;
    assert!(std::sync::Arc::ptr_eq(&handler, &again));

    Ok(())
}

#[test]
fn arrays_keep_server_lower_bounds() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    // int4[] '[0:1]={7,8}'
    let payload = b"\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x17\x00\x00\x00\x02\x00\x00\x00\x00\
                    \x00\x00\x00\x04\x00\x00\x00\x07\x00\x00\x00\x04\x00\x00\x00\x08";

    let value = registry.decode_value(INT4_ARRAY, Some(&payload[..]))?;
    let decoded = value.as_array().expect("array");
    assert_eq!(decoded.lower_bound(), Some(0));

    // written back with the standard lower bound
    let mut buf = Vec::new();
    registry.encode_value(INT4_ARRAY, &value, &mut buf)?;
    assert_eq!(&buf[16..20], &1_i32.to_be_bytes());

    Ok(())
}

#[test]
fn arrays_check_the_element_type() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    // a text[] payload read as int4[]
    let payload = b"\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x19\x00\x00\x00\x01\x00\x00\x00\x01\
                    \x00\x00\x00\x01a";

    let err = registry.decode_value(INT4_ARRAY, Some(&payload[..])).unwrap_err();
    assert!(matches!(
        err,
        Error::Decode(DecodeError::ElementType {
            expected: 23,
            actual: 25,
            ..
        })
    ));

    Ok(())
}

#[test]
fn array_nullability_is_configurable() -> anyhow::Result<()> {
    let mapper = TypeMapper::with_options(
        PgTypeMapperOptions::new().array_nullability(ArrayNullabilityMode::Never),
    );
    let registry = pgmap_test::bound(&mapper)?;

    let value = array(vec![PgValue::Int4(1), PgValue::Null]);

    let mut buf = Vec::new();
    let err = registry
        .encode_value(INT4_ARRAY, &value, &mut buf)
        .unwrap_err();
    assert!(matches!(err, Error::Encode(EncodeError::UnexpectedNull { .. })));

    // the same payload is accepted under the default mode
    let registry = pgmap_test::registry()?;
    registry.encode_value(INT4_ARRAY, &value, &mut buf)?;
    assert_eq!(registry.decode_value(INT4_ARRAY, Some(&buf[..]))?, value);

    let strict = pgmap_test::bound(&mapper)?;
    let err = strict.decode_value(INT4_ARRAY, Some(&buf[..])).unwrap_err();
    assert!(matches!(err, Error::Decode(DecodeError::UnexpectedNull { .. })));

    Ok(())
}

#[test]
fn ranges_wrap_their_subtype_handler() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    let handler = registry.resolve(PgBuiltinType::Int8Range.oid())?;
    let range = handler
        .downcast_ref::<RangeHandler>()
        .expect("range handler");
    assert_eq!(range.subtype_handler().pg_type().name(), "int8");

    // a domain over a range resolves to the range's own handler
    let domain = registry.resolve(pgmap_test::INT4_RANGE_DOMAIN)?;
    let range = domain
        .downcast_ref::<RangeHandler>()
        .expect("range handler");
    assert_eq!(range.subtype_handler().pg_type().name(), "int4");
    assert!(std::sync::Arc::ptr_eq(
        &domain,
        &registry.resolve(PgBuiltinType::Int4Range.oid())?
    ));

    Ok(())
}

#[test]
fn ranges_reject_null_bounds() -> anyhow::Result<()> {
    let registry = pgmap_test::registry()?;

    let value = PgValue::Range(PgRange::new(
        Bound::Included(PgValue::Null),
        Bound::Unbounded,
    ));

    let mut buf = Vec::new();
    let err = registry
        .encode_value(PgBuiltinType::Int4Range.oid(), &value, &mut buf)
        .unwrap_err();
    assert!(matches!(err, Error::Encode(EncodeError::UnexpectedNull { .. })));
    assert!(buf.is_empty());

    Ok(())
}
