use bytes::Bytes;
use typewire::{
    CodecError, DynamicObject, FieldType, FieldValue, Object, Record, SerializerContext,
    SerializerOptions, Tag, Value, WireEnum, Writer,
};

#[derive(Record, Debug, Clone, Default, PartialEq)]
struct Address {
    street: String,
    city: String,
}

#[derive(WireEnum, Debug, Clone, Copy, Default, PartialEq)]
enum Color {
    #[default]
    Red,
    Green,
    Blue,
}

#[derive(Record, Debug, Clone, Default, PartialEq)]
#[typewire(collection = "people")]
struct Person {
    #[typewire(rename = "full_name")]
    name: String,
    age: Option<u16>,
    address: Option<Address>,
    previous: Vec<Address>,
    tags: Vec<String>,
    color: Color,
    extra: Value,
    #[typewire(skip)]
    cached: u32,
}

#[derive(Record, Debug, Clone, Default, PartialEq)]
#[typewire(name = "Reading")]
struct ReadingV1 {
    sensor: String,
    value: i32,
    level: i32,
}

#[derive(Record, Debug, Clone, Default, PartialEq)]
#[typewire(name = "Reading")]
struct ReadingV2 {
    sensor: String,
    value: i64,
    level: Color,
    unit: Option<String>,
}

#[derive(Record, Debug, Clone, Default, PartialEq)]
struct Foo {
    count: i32,
    label: String,
    scores: Vec<f64>,
}

#[derive(Record, Debug, Clone, Default, PartialEq)]
struct Inner {
    x: i32,
}

#[derive(Record, Debug, Clone, Default, PartialEq)]
struct Outer {
    inner: Inner,
}

#[derive(Record, Debug, Clone, Default, PartialEq)]
struct Node {
    children: Vec<Node>,
}

#[derive(Record, Debug, Clone, Default, PartialEq)]
struct Holder {
    payload: Value,
}

fn sample_person() -> Person {
    Person {
        name: "Ada Lovelace".into(),
        age: Some(36),
        address: Some(Address {
            street: "St James's Square".into(),
            city: "London".into(),
        }),
        previous: vec![
            Address {
                street: "Marylebone".into(),
                city: "London".into(),
            },
            Address::default(),
        ],
        tags: vec!["math".into(), "engines".into()],
        color: Color::Green,
        extra: Value::Double(1.5),
        cached: 0,
    }
}

// =============================================================================
// Derived records
// =============================================================================

#[test]
fn test_record_round_trip() {
    let ctx = SerializerContext::default();
    let person = sample_person();
    let bytes = ctx.serialize(&person).unwrap();
    assert_eq!(ctx.deserialize::<Person>(bytes).unwrap(), person);
}

#[test]
fn test_nulls_and_empty_collections() {
    let ctx = SerializerContext::default();
    let person = Person {
        name: "Nobody".into(),
        ..Default::default()
    };
    let bytes = ctx.serialize(&person).unwrap();
    assert_eq!(ctx.deserialize::<Person>(bytes).unwrap(), person);
}

#[test]
fn test_skipped_field_is_not_written() {
    let ctx = SerializerContext::default();
    let person = Person {
        cached: 99,
        ..sample_person()
    };
    let decoded = ctx.deserialize::<Person>(ctx.serialize(&person).unwrap()).unwrap();
    assert_eq!(decoded.cached, 0);
    assert!(Person::fields().iter().all(|field| field.name != "cached"));
    assert!(Person::fields().iter().any(|field| field.name == "full_name"));
}

#[test]
fn test_derived_attributes() {
    assert_eq!(Person::TYPE_NAME, "Person");
    assert_eq!(Person::COLLECTION, Some("people"));
    assert_eq!(ReadingV1::TYPE_NAME, "Reading");
    assert_eq!(Address::COLLECTION, None);
    assert!(matches!(
        <Option<Address>>::field_type(),
        FieldType::Record { nullable: true, .. }
    ));
}

#[test]
fn test_registration_reaches_nested_records() {
    let ctx = SerializerContext::default();
    assert!(!ctx.is_registered("Address"));
    assert!(ctx.register::<Person>().is_compiled());
    assert!(ctx.is_registered("Person"));
    assert!(ctx.is_registered("Address"));

    let recursive = SerializerContext::default();
    recursive.register::<Node>();
    assert!(recursive.is_registered("Node"));
}

#[test]
fn test_codecs_are_cached() {
    let ctx = SerializerContext::default();
    let first = ctx.codec_for::<Person>();
    let second = ctx.codec_for::<Person>();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

// =============================================================================
// Schema evolution
// =============================================================================

#[test]
fn test_reader_with_changed_and_added_fields() {
    let ctx = SerializerContext::default();
    let old = ReadingV1 {
        sensor: "s-1".into(),
        value: -40,
        level: 2,
    };
    let decoded = ctx
        .deserialize::<ReadingV2>(ctx.serialize(&old).unwrap())
        .unwrap();
    assert_eq!(
        decoded,
        ReadingV2 {
            sensor: "s-1".into(),
            value: -40,
            level: Color::Blue,
            unit: None,
        }
    );
}

#[test]
fn test_reader_skips_unknown_fields() {
    let ctx = SerializerContext::default();
    let new = ReadingV2 {
        sensor: "s-2".into(),
        value: 12,
        level: Color::Red,
        unit: Some("°C".into()),
    };
    let bytes = ctx.serialize(&new).unwrap();

    // level is an enum name now; an integer field cannot read it
    assert!(ctx.deserialize::<ReadingV1>(bytes.clone()).is_err());

    let mut dynamic = Object::typed(new).to_dynamic();
    dynamic.fields.swap_remove("level");
    let bytes = ctx.serialize_object(&Object::Dynamic(dynamic)).unwrap();
    let decoded = ctx.deserialize::<ReadingV1>(bytes).unwrap();
    assert_eq!(
        decoded,
        ReadingV1 {
            sensor: "s-2".into(),
            value: 12,
            level: 0,
        }
    );
}

#[test]
fn test_value_out_of_range_for_changed_field() {
    let ctx = SerializerContext::default();
    let wide = ReadingV2 {
        sensor: "s-3".into(),
        value: i64::MAX,
        ..Default::default()
    };
    let mut dynamic = Object::typed(wide).to_dynamic();
    dynamic.fields.swap_remove("level");
    let bytes = ctx.serialize_object(&Object::Dynamic(dynamic)).unwrap();
    assert!(matches!(
        ctx.deserialize::<ReadingV1>(bytes),
        Err(CodecError::Overflow { to: "Int32", .. })
    ));
}

// =============================================================================
// Generic decoding
// =============================================================================

#[test]
fn test_unregistered_type_decodes_dynamically() {
    let writer_ctx = SerializerContext::default();
    let foo = Foo {
        count: 7,
        label: "seven".into(),
        scores: vec![0.5, 2.0],
    };
    let bytes = writer_ctx.serialize(&foo).unwrap();

    let reader_ctx =
        SerializerContext::with_names(SerializerOptions::default(), writer_ctx.name_registry());
    let object = reader_ctx.deserialize_object(bytes.clone()).unwrap();
    assert!(!object.is_typed());
    assert_eq!(object.type_name(), "Foo");
    assert_eq!(object.collection(), None);
    assert_eq!(object.get("count"), Some(Value::Int32(7)));
    assert_eq!(
        reader_ctx.try_get_field_value("label", &object),
        Some(Value::String("seven".into()))
    );
    assert_eq!(
        object.get("scores"),
        Some(Value::Array(vec![Value::Double(0.5), Value::Double(2.0)]))
    );
    assert_eq!(object.get("missing"), None);

    // mixed typed and dynamic objects compare by name and fields
    assert_eq!(object, Object::typed(foo.clone()));
    assert_eq!(object.into_record::<Foo>().unwrap(), foo);

    // the writer knows the type and decodes it into the host record
    let typed = writer_ctx.deserialize_object(bytes).unwrap();
    assert_eq!(typed.downcast_ref::<Foo>(), Some(&foo));
}

#[test]
fn test_dynamic_object_round_trip() {
    let ctx = SerializerContext::default();
    let object = DynamicObject::new("Event")
        .with_collection("audit")
        .with_field("id", 12u64)
        .with_field("kind", "login")
        .with_field("ok", true)
        .with_field("note", Value::Null)
        .with_field(
            "where",
            DynamicObject::new("Place").with_field("city", "Paris"),
        );
    let bytes = ctx.serialize_object(&Object::Dynamic(object.clone())).unwrap();
    let decoded = ctx.deserialize_object(bytes).unwrap();
    assert_eq!(decoded, Object::Dynamic(object));
}

#[test]
fn test_dynamic_object_into_record() {
    let object = Object::Dynamic(
        DynamicObject::new("Foo")
            .with_field("count", "12")
            .with_field("unknown", 1i32),
    );
    let foo = object.into_record::<Foo>().unwrap();
    assert_eq!(foo.count, 12);
    assert_eq!(foo.label, "");

    let other = Object::Dynamic(DynamicObject::new("Bar"));
    assert!(matches!(
        other.into_record::<Foo>(),
        Err(CodecError::TypeMismatch { expected: "Foo", .. })
    ));
}

#[test]
fn test_record_of_another_registered_type_is_rejected() {
    let ctx = SerializerContext::default();
    let bytes = ctx
        .serialize(&Foo {
            count: 1,
            ..Default::default()
        })
        .unwrap();
    assert!(matches!(
        ctx.deserialize::<Inner>(bytes),
        Err(CodecError::TypeMismatch { expected: "Inner", actual }) if actual == "Foo"
    ));

    // a name no host type claims still decodes into the requested type
    let legacy = Object::Dynamic(DynamicObject::new("LegacyInner").with_field("x", 3i32));
    let bytes = ctx.serialize_object(&legacy).unwrap();
    assert_eq!(ctx.deserialize::<Inner>(bytes).unwrap(), Inner { x: 3 });
}

#[test]
fn test_try_get_field_value_on_typed_object() {
    let ctx = SerializerContext::default();
    let object = Object::typed(sample_person());
    assert_eq!(
        ctx.try_get_field_value("full_name", &object),
        Some(Value::String("Ada Lovelace".into()))
    );
    assert_eq!(ctx.try_get_field_value("age", &object), Some(Value::UInt16(36)));
    assert_eq!(
        ctx.try_get_field_value("color", &object),
        Some(Value::Enum("Green".into()))
    );
    assert_eq!(ctx.try_get_field_value("name", &object), None);
}

#[test]
fn test_unknown_name_code() {
    let writer_ctx = SerializerContext::default();
    let bytes = writer_ctx.serialize(&Inner { x: 1 }).unwrap();
    let stranger = SerializerContext::default();
    assert!(matches!(
        stranger.deserialize_object(bytes),
        Err(CodecError::UnknownNameCode(_))
    ));
}

// =============================================================================
// Polymorphic fields
// =============================================================================

#[test]
fn test_dynamic_field_holding_a_record() {
    let ctx = SerializerContext::default();
    ctx.register::<Holder>();
    let holder = Holder {
        payload: Value::record(Foo {
            count: 3,
            label: "three".into(),
            scores: vec![],
        }),
    };
    let bytes = ctx.serialize(&holder).unwrap();
    assert!(ctx.is_registered("Foo"));
    let decoded = ctx.deserialize::<Holder>(bytes.clone()).unwrap();
    assert_eq!(decoded, holder);
    assert!(decoded.payload.as_object().is_some_and(Object::is_typed));

    // a reader without Foo still gets its fields
    let reader_ctx =
        SerializerContext::with_names(SerializerOptions::default(), ctx.name_registry());
    reader_ctx.register::<Holder>();
    let decoded = reader_ctx.deserialize::<Holder>(bytes).unwrap();
    let payload = decoded.payload.as_object().unwrap();
    assert!(!payload.is_typed());
    assert_eq!(payload.get("count"), Some(Value::Int32(3)));
}

#[test]
fn test_record_field_accepts_dynamic_object() {
    let ctx = SerializerContext::default();
    let outer = Object::Dynamic(
        DynamicObject::new("Outer")
            .with_field("inner", DynamicObject::new("Inner").with_field("x", 5i32)),
    );
    let bytes = ctx.serialize_object(&outer).unwrap();
    let decoded = ctx.deserialize::<Outer>(bytes).unwrap();
    assert_eq!(decoded, Outer { inner: Inner { x: 5 } });
}

// =============================================================================
// Layout
// =============================================================================

#[test]
fn test_embedded_record_in_same_collection_writes_zero() {
    let ctx = SerializerContext::default();
    let bytes = ctx
        .serialize(&Outer {
            inner: Inner { x: 1 },
        })
        .unwrap();
    // codes: 1 Outer, 2 "default", 3 inner, 4 Inner, 5 x
    let expected: &[u8] = &[
        Tag::Object.code(),
        1,
        2,
        1, // field count
        3,
        Tag::Object.code(),
        4,
        0,
        1,
        5,
        Tag::VarInt32.code(),
        2,
    ];
    assert_eq!(&bytes[..], expected);
}

#[test]
fn test_embedded_record_in_other_collection_writes_its_code() {
    let ctx = SerializerContext::default();
    let person = Object::Dynamic(DynamicObject::new("Tagged").with_field(
        "who",
        Object::typed(Person {
            name: "x".into(),
            ..Default::default()
        }),
    ));
    let bytes = ctx.serialize_object(&person).unwrap();
    let names = ctx.names();
    let decoded = ctx.deserialize_object(bytes).unwrap();
    assert_eq!(decoded, person);
    assert!(names.lookup_code("", "people").is_some());
    assert!(names.lookup_code("people", "Person").is_some());
    assert!(names.lookup_code("people", "full_name").is_some());
    assert!(names.lookup_code("default", "full_name").is_none());
}

#[test]
fn test_default_collection_option() {
    let ctx =
        SerializerContext::new(SerializerOptions::default().with_default_collection("main"));
    let bytes = ctx.serialize(&Inner { x: 2 }).unwrap();
    assert!(ctx.names().lookup_code("", "main").is_some());
    assert!(ctx.names().lookup_code("main", "x").is_some());
    assert_eq!(ctx.deserialize::<Inner>(bytes).unwrap(), Inner { x: 2 });
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_array_at_top_level() {
    let ctx = SerializerContext::default();
    assert!(matches!(
        ctx.serialize_value(&Value::Array(vec![Value::Int32(1)])),
        Err(CodecError::ArrayAtTopLevel)
    ));

    let mut writer = Writer::new();
    writer.write_tag(Tag::Array);
    writer.write_variable_length_uint(0);
    let bytes = writer.finish();
    assert!(matches!(
        ctx.deserialize_value(bytes.clone()),
        Err(CodecError::ArrayAtTopLevel)
    ));
    assert!(matches!(
        ctx.deserialize_object(bytes),
        Err(CodecError::ArrayAtTopLevel)
    ));
}

#[test]
fn test_depth_limit() {
    let ctx = SerializerContext::new(SerializerOptions::default().with_max_depth(2));
    let leaf = Node::default();
    let bytes = ctx.serialize(&leaf).unwrap();
    assert_eq!(ctx.deserialize::<Node>(bytes).unwrap(), leaf);

    let nested = Node {
        children: vec![Node::default()],
    };
    assert!(matches!(
        ctx.serialize(&nested),
        Err(CodecError::DepthExceeded(2))
    ));

    let roomy = SerializerContext::with_names(SerializerOptions::default(), ctx.name_registry());
    let bytes = roomy.serialize(&nested).unwrap();
    assert_eq!(roomy.deserialize::<Node>(bytes.clone()).unwrap(), nested);
    assert!(matches!(
        ctx.deserialize::<Node>(bytes),
        Err(CodecError::DepthExceeded(2))
    ));
}

#[test]
fn test_non_nullable_record_field_rejects_null() {
    let ctx = SerializerContext::default();
    let outer = Object::Dynamic(DynamicObject::new("Outer").with_field("inner", Value::Null));
    let bytes = ctx.serialize_object(&outer).unwrap();
    assert!(matches!(
        ctx.deserialize::<Outer>(bytes),
        Err(CodecError::NullNotAllowed { declared: "Inner" })
    ));
}

#[test]
fn test_truncated_record() {
    let ctx = SerializerContext::default();
    let bytes = ctx.serialize(&sample_person()).unwrap();
    let truncated = Bytes::copy_from_slice(&bytes[..bytes.len() - 3]);
    assert!(ctx.deserialize::<Person>(truncated).is_err());
}

#[test]
fn test_field_count_beyond_input() {
    let ctx = SerializerContext::default();
    let bytes = ctx.serialize(&Inner { x: 1 }).unwrap();
    // [tag][type][collection][count]...
    let mut corrupt = bytes.to_vec();
    assert_eq!(corrupt[3], 1);
    corrupt[3] = 0x7F;
    assert!(matches!(
        ctx.deserialize::<Inner>(Bytes::from(corrupt)),
        Err(CodecError::InsufficientData)
    ));
}

#[test]
fn test_scalar_top_level_value() {
    let ctx = SerializerContext::default();
    for value in [
        Value::Null,
        Value::Int64(-5),
        Value::String("x".into()),
        Value::record(Inner { x: 4 }),
    ] {
        let bytes = ctx.serialize_value(&value).unwrap();
        assert_eq!(ctx.deserialize_value(bytes).unwrap(), value);
    }
}
