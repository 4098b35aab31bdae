use bytes::Bytes;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use typewire::time::{ticks_to_duration, MAX_DATE_TICKS, MIN_DATE_TICKS, TICKS_PER_SECOND};
use typewire::{
    CiString, CodecError, DateTimeKind, DateTimeValue, IntegerEncoding, Reader, ScalarCodec,
    ScalarKind, SerializerContext, SerializerOptions, Tag, Value, Writer,
};
use uuid::Uuid;

fn codec(kind: ScalarKind) -> ScalarCodec {
    ScalarCodec::new(kind, false)
}

fn nullable(kind: ScalarKind) -> ScalarCodec {
    ScalarCodec::new(kind, true)
}

fn write(codec: ScalarCodec, value: &Value) -> Bytes {
    let mut writer = Writer::new();
    codec.serialize(&mut writer, true, true, value).unwrap();
    writer.finish()
}

fn read(codec: ScalarCodec, bytes: Bytes) -> typewire::Result<Value> {
    codec.deserialize(&mut Reader::new(bytes), None, true)
}

fn round_trip(kind: ScalarKind, value: Value) {
    let bytes = write(codec(kind), &value);
    assert_eq!(read(codec(kind), bytes).unwrap(), value, "kind = {:?}", kind);
}

// =============================================================================
// Layout
// =============================================================================

#[test]
fn test_null_is_a_single_tag() {
    let mut writer = Writer::new();
    nullable(ScalarKind::SByte)
        .serialize(&mut writer, true, true, &Value::Null)
        .unwrap();
    assert_eq!(writer.bits_written(), 6);
    assert_eq!(&writer.get_serialization()[..], &[0x00]);
}

#[test]
fn test_variable_length_int32() {
    let bytes = write(codec(ScalarKind::Int32), &Value::Int32(5));
    assert_eq!(&bytes[..], &[Tag::VarInt32.code(), 0x0A]);
}

#[test]
fn test_fixed_int32() {
    let fixed = codec(ScalarKind::Int32).with_integer_encoding(IntegerEncoding::Fixed);
    assert_eq!(fixed.canonical_tag(), Tag::Int32);
    let bytes = write(fixed, &Value::Int32(1));
    assert_eq!(&bytes[..], &[Tag::Int32.code(), 1, 0, 0, 0]);
    // variable-length readers still accept it
    assert_eq!(read(codec(ScalarKind::Int32), bytes).unwrap(), Value::Int32(1));
}

#[test]
fn test_boolean_shares_tag_byte() {
    let bytes = write(codec(ScalarKind::Boolean), &Value::Bool(true));
    assert_eq!(&bytes[..], &[0x43]);
}

#[test]
fn test_untagged_null_string() {
    let mut writer = Writer::new();
    nullable(ScalarKind::String)
        .serialize(&mut writer, false, true, &Value::Null)
        .unwrap();
    assert_eq!(&writer.finish()[..], &[0x00]);

    let mut writer = Writer::new();
    let result = nullable(ScalarKind::Int32).serialize(&mut writer, false, true, &Value::Null);
    assert!(matches!(result, Err(CodecError::Encode(_))));
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_round_trip_every_kind() {
    let date = NaiveDate::from_ymd_opt(2024, 2, 29)
        .unwrap()
        .and_hms_nano_opt(12, 30, 15, 123_456_700)
        .unwrap();
    let offset = FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
        .unwrap();

    round_trip(ScalarKind::Boolean, Value::Bool(false));
    round_trip(ScalarKind::Byte, Value::Byte(200));
    round_trip(ScalarKind::SByte, Value::SByte(-100));
    round_trip(ScalarKind::Int16, Value::Int16(-30_000));
    round_trip(ScalarKind::UInt16, Value::UInt16(60_000));
    round_trip(ScalarKind::Int32, Value::Int32(i32::MIN));
    round_trip(ScalarKind::UInt32, Value::UInt32(u32::MAX));
    round_trip(ScalarKind::Int64, Value::Int64(i64::MIN));
    round_trip(ScalarKind::UInt64, Value::UInt64(u64::MAX));
    round_trip(ScalarKind::Single, Value::Single(1.5));
    round_trip(ScalarKind::Double, Value::Double(-2.25e100));
    round_trip(
        ScalarKind::Decimal,
        Value::Decimal(Decimal::from_str("-12345.6789").unwrap()),
    );
    round_trip(
        ScalarKind::DateTime,
        Value::DateTime(DateTimeValue::new(date, DateTimeKind::Utc)),
    );
    round_trip(
        ScalarKind::DateTime,
        Value::DateTime(DateTimeValue::new(date, DateTimeKind::Local)),
    );
    round_trip(ScalarKind::DateTimeOffset, Value::DateTimeOffset(offset));
    round_trip(
        ScalarKind::TimeSpan,
        Value::TimeSpan(TimeDelta::milliseconds(-93_784_500)),
    );
    round_trip(ScalarKind::Char, Value::Char('λ'));
    round_trip(ScalarKind::String, Value::String("héllo".into()));
    round_trip(ScalarKind::Enum, Value::Enum("Green".into()));
    round_trip(ScalarKind::ByteArray, Value::Bytes(Bytes::from_static(&[0, 1, 2])));
    round_trip(ScalarKind::Guid, Value::Guid(Uuid::new_v4()));
}

#[test]
fn test_date_time_offset_keeps_offset() {
    let offset = FixedOffset::west_opt(5 * 3600)
        .unwrap()
        .with_ymd_and_hms(1999, 12, 31, 23, 59, 59)
        .unwrap();
    let bytes = write(codec(ScalarKind::DateTimeOffset), &Value::DateTimeOffset(offset));
    match read(codec(ScalarKind::DateTimeOffset), bytes).unwrap() {
        Value::DateTimeOffset(decoded) => {
            assert_eq!(decoded, offset);
            assert_eq!(decoded.offset().local_minus_utc(), -5 * 3600);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_case_insensitive_string() {
    let bytes = write(
        codec(ScalarKind::CaseInsensitiveString),
        &Value::CaseInsensitive(CiString::from("Hello")),
    );
    let decoded = read(codec(ScalarKind::CaseInsensitiveString), bytes).unwrap();
    assert_eq!(decoded, Value::CaseInsensitive(CiString::from("HELLO")));
    assert_eq!(decoded.as_str(), Some("Hello"));
}

// =============================================================================
// Nullability
// =============================================================================

#[test]
fn test_nullable_reads_value_written_by_non_nullable() {
    let bytes = write(codec(ScalarKind::Int32), &Value::Int32(-7));
    assert_eq!(read(nullable(ScalarKind::Int32), bytes).unwrap(), Value::Int32(-7));
}

#[test]
fn test_null_into_non_nullable() {
    let bytes = write(nullable(ScalarKind::Int32), &Value::Null);
    assert!(matches!(
        read(codec(ScalarKind::Int32), bytes.clone()),
        Err(CodecError::NullNotAllowed { declared: "Int32" })
    ));
    assert_eq!(read(nullable(ScalarKind::Int64), bytes).unwrap(), Value::Null);

    let mut writer = Writer::new();
    assert!(matches!(
        codec(ScalarKind::Int32).serialize(&mut writer, true, true, &Value::Null),
        Err(CodecError::NullNotAllowed { .. })
    ));
}

#[test]
fn test_null_string_payload_into_non_nullable() {
    let mut writer = Writer::new();
    writer.write_tag(Tag::String);
    writer.write_string(None);
    assert!(matches!(
        read(codec(ScalarKind::String), writer.finish()),
        Err(CodecError::NullNotAllowed { .. })
    ));
}

// =============================================================================
// Cross-tag decoding
// =============================================================================

#[test]
fn test_integer_widening_and_narrowing() {
    let bytes = write(codec(ScalarKind::Int16), &Value::Int16(300));
    assert_eq!(read(codec(ScalarKind::Int64), bytes.clone()).unwrap(), Value::Int64(300));
    assert_eq!(read(codec(ScalarKind::UInt16), bytes.clone()).unwrap(), Value::UInt16(300));
    assert!(matches!(
        read(codec(ScalarKind::Byte), bytes),
        Err(CodecError::Overflow { to: "Byte", .. })
    ));

    let bytes = write(codec(ScalarKind::Int32), &Value::Int32(-1));
    assert!(matches!(
        read(codec(ScalarKind::UInt32), bytes),
        Err(CodecError::Overflow { .. })
    ));
}

#[test]
fn test_float_to_integer_rounds_half_even() {
    let cases = [(2.5, 2), (3.5, 4), (-2.5, -2), (2.4, 2), (2.6, 3)];
    for (input, expected) in cases {
        let bytes = write(codec(ScalarKind::Double), &Value::Double(input));
        assert_eq!(
            read(codec(ScalarKind::Int32), bytes).unwrap(),
            Value::Int32(expected),
            "input = {}",
            input
        );
    }

    let bytes = write(
        codec(ScalarKind::Decimal),
        &Value::Decimal(Decimal::from_str("6.5").unwrap()),
    );
    assert_eq!(read(codec(ScalarKind::Byte), bytes).unwrap(), Value::Byte(6));
}

#[test]
fn test_numbers_and_text() {
    let bytes = write(codec(ScalarKind::Int32), &Value::Int32(42));
    assert_eq!(
        read(codec(ScalarKind::String), bytes).unwrap(),
        Value::String("42".into())
    );

    let bytes = write(codec(ScalarKind::String), &Value::String(" 42 ".into()));
    assert_eq!(read(codec(ScalarKind::Int32), bytes).unwrap(), Value::Int32(42));

    let bytes = write(codec(ScalarKind::String), &Value::String("1.5e2".into()));
    assert_eq!(read(codec(ScalarKind::Int64), bytes).unwrap(), Value::Int64(150));

    let bytes = write(codec(ScalarKind::String), &Value::String("forty".into()));
    assert!(matches!(
        read(codec(ScalarKind::Int32), bytes),
        Err(CodecError::Parse { to: "Int32", .. })
    ));
}

#[test]
fn test_boolean_coercions() {
    let bytes = write(codec(ScalarKind::Boolean), &Value::Bool(true));
    assert_eq!(read(codec(ScalarKind::Int32), bytes.clone()).unwrap(), Value::Int32(1));
    assert_eq!(
        read(codec(ScalarKind::String), bytes).unwrap(),
        Value::String("true".into())
    );

    let bytes = write(codec(ScalarKind::String), &Value::String("FALSE".into()));
    assert_eq!(read(codec(ScalarKind::Boolean), bytes).unwrap(), Value::Bool(false));

    let bytes = write(codec(ScalarKind::Int64), &Value::Int64(-3));
    assert_eq!(read(codec(ScalarKind::Boolean), bytes).unwrap(), Value::Bool(true));
}

#[test]
fn test_text_into_temporal_kinds() {
    let bytes = write(codec(ScalarKind::String), &Value::String("2024-01-02".into()));
    let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(
        read(codec(ScalarKind::DateTime), bytes).unwrap(),
        Value::DateTime(DateTimeValue::unspecified(expected))
    );

    let bytes = write(
        codec(ScalarKind::String),
        &Value::String("2024-01-02T03:04:05Z".into()),
    );
    match read(codec(ScalarKind::DateTime), bytes).unwrap() {
        Value::DateTime(value) => assert_eq!(value.kind, DateTimeKind::Utc),
        other => panic!("unexpected {:?}", other),
    }

    let bytes = write(codec(ScalarKind::String), &Value::String("1.02:03:04.5".into()));
    let expected = TimeDelta::days(1)
        + TimeDelta::hours(2)
        + TimeDelta::minutes(3)
        + TimeDelta::milliseconds(4_500);
    assert_eq!(
        read(codec(ScalarKind::TimeSpan), bytes).unwrap(),
        Value::TimeSpan(expected)
    );
}

#[test]
fn test_time_span_to_text() {
    let span = TimeDelta::days(1)
        + TimeDelta::hours(2)
        + TimeDelta::minutes(3)
        + TimeDelta::milliseconds(4_500);
    let bytes = write(codec(ScalarKind::TimeSpan), &Value::TimeSpan(span));
    assert_eq!(
        read(codec(ScalarKind::String), bytes).unwrap(),
        Value::String("1.02:03:04.5000000".into())
    );
}

#[test]
fn test_guid_and_bytes() {
    let guid = Uuid::new_v4();
    let bytes = write(codec(ScalarKind::Guid), &Value::Guid(guid));
    assert_eq!(
        read(codec(ScalarKind::ByteArray), bytes).unwrap(),
        Value::Bytes(Bytes::copy_from_slice(guid.as_bytes()))
    );

    let bytes = write(
        codec(ScalarKind::ByteArray),
        &Value::Bytes(Bytes::copy_from_slice(guid.as_bytes())),
    );
    assert_eq!(read(codec(ScalarKind::Guid), bytes).unwrap(), Value::Guid(guid));

    let bytes = write(codec(ScalarKind::String), &Value::String(guid.to_string()));
    assert_eq!(read(codec(ScalarKind::Guid), bytes).unwrap(), Value::Guid(guid));
}

#[test]
fn test_serialize_coerces_into_declared_kind() {
    let bytes = write(codec(ScalarKind::Int64), &Value::Int32(9));
    assert_eq!(bytes[0], Tag::VarInt64.code());
    assert_eq!(read(codec(ScalarKind::Int64), bytes).unwrap(), Value::Int64(9));

    let mut writer = Writer::new();
    assert!(matches!(
        codec(ScalarKind::Byte).serialize(&mut writer, true, true, &Value::Int32(256)),
        Err(CodecError::Overflow { .. })
    ));
}

#[test]
fn test_unsupported_tag() {
    let bytes = write(codec(ScalarKind::Guid), &Value::Guid(Uuid::nil()));
    assert!(matches!(
        read(codec(ScalarKind::Int32), bytes),
        Err(CodecError::UnsupportedTag {
            tag: Tag::Guid,
            declared: "Int32"
        })
    ));

    let bytes = write(codec(ScalarKind::Double), &Value::Double(1.0));
    assert!(matches!(
        read(codec(ScalarKind::Guid), bytes),
        Err(CodecError::UnsupportedTag { tag: Tag::Double, .. })
    ));

    let mut writer = Writer::new();
    writer.write_tag(Tag::Object);
    assert!(matches!(
        read(codec(ScalarKind::String), writer.finish()),
        Err(CodecError::UnsupportedTag { tag: Tag::Object, .. })
    ));
}

// =============================================================================
// Range sentinels
// =============================================================================

#[test]
fn test_sentinels_decode_to_kind_bounds() {
    let min = write(nullable(ScalarKind::Int32), &Value::Min);
    let max = write(nullable(ScalarKind::Int32), &Value::Max);
    assert_eq!(&min[..], &[Tag::Min.code()]);
    assert_eq!(&max[..], &[Tag::Max.code()]);
    assert_eq!(read(nullable(ScalarKind::Int32), min.clone()).unwrap(), Value::Int32(i32::MIN));
    assert_eq!(read(nullable(ScalarKind::Int32), max.clone()).unwrap(), Value::Int32(i32::MAX));
    assert_eq!(read(nullable(ScalarKind::Byte), min.clone()).unwrap(), Value::Byte(0));
    assert_eq!(read(nullable(ScalarKind::String), max.clone()).unwrap(), Value::Max);
    assert_eq!(
        read(nullable(ScalarKind::String), min).unwrap(),
        Value::String(String::new())
    );

    // only the nullable flavor understands sentinels
    assert!(matches!(
        read(codec(ScalarKind::Int32), max),
        Err(CodecError::UnsupportedTag { tag: Tag::Max, .. })
    ));
    let mut writer = Writer::new();
    assert!(matches!(
        codec(ScalarKind::Int32).serialize(&mut writer, true, true, &Value::Min),
        Err(CodecError::SentinelNotAllowed { declared: "Int32" })
    ));
}

#[test]
fn test_sentinel_ordering() {
    let values = [
        Value::Int32(i32::MIN),
        Value::Int64(0),
        Value::Double(f64::MAX),
        Value::String(String::new()),
        Value::String("zzz".into()),
        Value::Bool(true),
    ];
    for value in &values {
        assert!(Value::Min < *value, "{:?}", value);
        assert!(*value < Value::Max, "{:?}", value);
    }
    assert!(Value::Null < Value::Min);
    assert!(Value::Int32(1) < Value::Int32(2));
}

#[test]
fn test_range_bound() {
    let ctx = SerializerContext::default();
    let min = ctx.range_bound(ScalarKind::Int64, &Value::Min).unwrap();
    let max = ctx.range_bound(ScalarKind::Int64, &Value::Max).unwrap();
    let decoded_min = read(nullable(ScalarKind::Int64), min).unwrap();
    let decoded_max = read(nullable(ScalarKind::Int64), max).unwrap();
    for v in [i64::MIN, -1, 0, 1, i64::MAX] {
        assert!(decoded_min <= Value::Int64(v));
        assert!(Value::Int64(v) <= decoded_max);
    }
    assert!(matches!(
        ctx.range_bound(ScalarKind::Int64, &Value::Int64(3)),
        Err(CodecError::Encode(_))
    ));
}

#[test]
fn test_context_value_round_trip_with_fixed_integers() {
    let ctx = SerializerContext::new(
        SerializerOptions::default().with_integer_encoding(IntegerEncoding::Fixed),
    );
    let bytes = ctx.serialize_value(&Value::UInt16(0xBEEF)).unwrap();
    assert_eq!(&bytes[..], &[Tag::UInt16.code(), 0xEF, 0xBE]);
    assert_eq!(ctx.deserialize_value(bytes).unwrap(), Value::UInt16(0xBEEF));
}

// =============================================================================
// Temporal limits
// =============================================================================

#[test]
fn test_time_span_text_out_of_range() {
    for text in [
        "999999999999999.00:00:00",
        "-999999999999999.00:00:00",
        "10675199.02:48:05.4775808",
    ] {
        let bytes = write(codec(ScalarKind::String), &Value::String(text.into()));
        assert!(
            matches!(
                read(codec(ScalarKind::TimeSpan), bytes),
                Err(CodecError::Overflow { to: "TimeSpan", .. })
            ),
            "text = {}",
            text
        );
    }
}

#[test]
fn test_time_span_text_at_tick_limits() {
    for ticks in [i64::MIN, i64::MAX] {
        let span = Value::TimeSpan(ticks_to_duration(ticks));
        let text = read(
            codec(ScalarKind::String),
            write(codec(ScalarKind::TimeSpan), &span),
        )
        .unwrap();
        let back = read(
            codec(ScalarKind::TimeSpan),
            write(codec(ScalarKind::String), &text),
        )
        .unwrap();
        assert_eq!(back, span, "text = {:?}", text);
    }
}

#[test]
fn test_date_time_offset_extreme_offsets() {
    let clock = NaiveDate::from_ymd_opt(2020, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    for seconds in [-86_399, -14 * 3600 - 1, 15 * 3600, 86_399] {
        let value = FixedOffset::east_opt(seconds)
            .unwrap()
            .from_local_datetime(&clock)
            .single()
            .unwrap();
        let bytes = write(codec(ScalarKind::DateTimeOffset), &Value::DateTimeOffset(value));
        match read(codec(ScalarKind::DateTimeOffset), bytes).unwrap() {
            Value::DateTimeOffset(decoded) => {
                assert_eq!(decoded, value);
                assert_eq!(decoded.offset().local_minus_utc(), seconds);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[test]
fn test_date_time_offset_rejects_unrepresentable_offset() {
    for offset in [
        86_400 * TICKS_PER_SECOND,
        -86_400 * TICKS_PER_SECOND,
        1,
        i64::MIN,
    ] {
        let mut writer = Writer::new();
        writer.write_tag(Tag::DateTimeOffset);
        writer.write_i64(0);
        writer.write_i64(offset);
        assert!(
            matches!(
                read(codec(ScalarKind::DateTimeOffset), writer.finish()),
                Err(CodecError::Decode(_))
            ),
            "offset = {}",
            offset
        );
    }
}

#[test]
fn test_integer_limits_in_both_encodings() {
    let cases = [
        (ScalarKind::Byte, Value::Byte(u8::MIN), Value::Byte(u8::MAX)),
        (ScalarKind::SByte, Value::SByte(i8::MIN), Value::SByte(i8::MAX)),
        (ScalarKind::Int16, Value::Int16(i16::MIN), Value::Int16(i16::MAX)),
        (ScalarKind::UInt16, Value::UInt16(u16::MIN), Value::UInt16(u16::MAX)),
        (ScalarKind::Int32, Value::Int32(i32::MIN), Value::Int32(i32::MAX)),
        (ScalarKind::UInt32, Value::UInt32(u32::MIN), Value::UInt32(u32::MAX)),
        (ScalarKind::Int64, Value::Int64(i64::MIN), Value::Int64(i64::MAX)),
        (ScalarKind::UInt64, Value::UInt64(u64::MIN), Value::UInt64(u64::MAX)),
    ];
    for encoding in [IntegerEncoding::Variable, IntegerEncoding::Fixed] {
        for (kind, min, max) in &cases {
            for value in [min, max] {
                let codec = codec(*kind).with_integer_encoding(encoding);
                let bytes = write(codec, value);
                assert_eq!(
                    read(codec, bytes.clone()).unwrap(),
                    *value,
                    "{:?} {:?}",
                    kind,
                    encoding
                );
                assert_eq!(read(nullable(*kind), bytes).unwrap(), *value);
            }
        }
    }
}

// =============================================================================
// Properties
// =============================================================================

fn clock(ticks: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + TimeDelta::seconds(ticks / TICKS_PER_SECOND)
        + TimeDelta::nanoseconds(ticks % TICKS_PER_SECOND * 100)
}

fn clock_ticks() -> impl Strategy<Value = i64> {
    prop_oneof![
        Just(MIN_DATE_TICKS),
        Just(MAX_DATE_TICKS),
        MIN_DATE_TICKS..=MAX_DATE_TICKS,
    ]
}

fn integer_values() -> impl Strategy<Value = (ScalarKind, Value)> {
    prop_oneof![
        any::<u8>().prop_map(|v| (ScalarKind::Byte, Value::Byte(v))),
        any::<i8>().prop_map(|v| (ScalarKind::SByte, Value::SByte(v))),
        any::<i16>().prop_map(|v| (ScalarKind::Int16, Value::Int16(v))),
        any::<u16>().prop_map(|v| (ScalarKind::UInt16, Value::UInt16(v))),
        any::<i32>().prop_map(|v| (ScalarKind::Int32, Value::Int32(v))),
        any::<u32>().prop_map(|v| (ScalarKind::UInt32, Value::UInt32(v))),
        any::<i64>().prop_map(|v| (ScalarKind::Int64, Value::Int64(v))),
        any::<u64>().prop_map(|v| (ScalarKind::UInt64, Value::UInt64(v))),
    ]
}

fn numeric_and_temporal_values() -> impl Strategy<Value = (ScalarKind, Value)> {
    prop_oneof![
        any::<bool>().prop_map(|v| (ScalarKind::Boolean, Value::Bool(v))),
        any::<f32>()
            .prop_filter("NaN never equals itself", |v| !v.is_nan())
            .prop_map(|v| (ScalarKind::Single, Value::Single(v))),
        any::<f64>()
            .prop_filter("NaN never equals itself", |v| !v.is_nan())
            .prop_map(|v| (ScalarKind::Double, Value::Double(v))),
        (any::<u32>(), any::<u32>(), any::<u32>(), any::<bool>(), 0u32..=28).prop_map(
            |(lo, mid, hi, negative, scale)| {
                let value = Decimal::from_parts(lo, mid, hi, negative, scale);
                (ScalarKind::Decimal, Value::Decimal(value))
            }
        ),
        (clock_ticks(), 0u8..3).prop_map(|(ticks, kind)| {
            let kind = DateTimeKind::from_bits(kind).unwrap();
            (
                ScalarKind::DateTime,
                Value::DateTime(DateTimeValue::new(clock(ticks), kind)),
            )
        }),
        (clock_ticks(), -86_399i32..=86_399).prop_map(|(ticks, seconds)| {
            let value = FixedOffset::east_opt(seconds)
                .unwrap()
                .from_local_datetime(&clock(ticks))
                .single()
                .unwrap();
            (ScalarKind::DateTimeOffset, Value::DateTimeOffset(value))
        }),
        prop_oneof![Just(i64::MIN), Just(i64::MAX), any::<i64>()]
            .prop_map(|ticks| (ScalarKind::TimeSpan, Value::TimeSpan(ticks_to_duration(ticks)))),
    ]
}

fn text_and_binary_values() -> impl Strategy<Value = (ScalarKind, Value)> {
    prop_oneof![
        any::<char>().prop_map(|v| (ScalarKind::Char, Value::Char(v))),
        ".*".prop_map(|v| (ScalarKind::String, Value::String(v))),
        ".*".prop_map(|v| {
            (
                ScalarKind::CaseInsensitiveString,
                Value::CaseInsensitive(CiString::new(v)),
            )
        }),
        "[A-Za-z][A-Za-z0-9]{0,15}".prop_map(|v| (ScalarKind::Enum, Value::Enum(v))),
        proptest::collection::vec(any::<u8>(), 0..64)
            .prop_map(|v| (ScalarKind::ByteArray, Value::Bytes(Bytes::from(v)))),
        any::<[u8; 16]>().prop_map(|v| (ScalarKind::Guid, Value::Guid(Uuid::from_bytes(v)))),
    ]
}

fn assert_round_trips(
    kind: ScalarKind,
    encoding: IntegerEncoding,
    value: &Value,
) -> Result<(), TestCaseError> {
    let codec = codec(kind).with_integer_encoding(encoding);
    let bytes = write(codec, value);
    prop_assert_eq!(&read(codec, bytes.clone()).unwrap(), value);
    // nullable readers accept what non-nullable writers produce
    prop_assert_eq!(&read(nullable(kind), bytes).unwrap(), value);
    Ok(())
}

proptest! {
    #[test]
    fn prop_integer_round_trip(
        (kind, value) in integer_values(),
        fixed in any::<bool>(),
    ) {
        let encoding = if fixed { IntegerEncoding::Fixed } else { IntegerEncoding::Variable };
        assert_round_trips(kind, encoding, &value)?;
    }

    #[test]
    fn prop_numeric_and_temporal_round_trip((kind, value) in numeric_and_temporal_values()) {
        assert_round_trips(kind, IntegerEncoding::Variable, &value)?;
    }

    #[test]
    fn prop_text_and_binary_round_trip((kind, value) in text_and_binary_values()) {
        assert_round_trips(kind, IntegerEncoding::Variable, &value)?;
    }

    #[test]
    fn prop_time_span_text_never_panics(
        negative in any::<bool>(),
        days in 0..=i64::MAX,
        hours in 0i64..24,
    ) {
        let sign = if negative { "-" } else { "" };
        let text = format!("{}{}.{:02}:00:00", sign, days, hours);
        let bytes = write(codec(ScalarKind::String), &Value::String(text));
        match read(codec(ScalarKind::TimeSpan), bytes) {
            Ok(Value::TimeSpan(_)) | Err(CodecError::Overflow { .. }) => {}
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }
}
