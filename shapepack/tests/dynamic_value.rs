use eyre::Result;
use shapepack::{
    MsgPackWriter, Timestamp, Value, VecBufferWriter, convert_to_json, JsonOptions,
    MsgPackReader,
};

/// Builds the map from the dynamic-access scenario:
/// {"Prop1": "Value1", "Prop2": 42,
///  "deeper": [true, 3.5, ext(15, [1,2,3]), timestamp(2023-01-02)],
///  45: [1, 2, 3], -45: false}
fn scenario_bytes() -> Vec<u8> {
    let mut out = VecBufferWriter::new();
    let mut w = MsgPackWriter::new(&mut out);
    w.write_map_header(5).unwrap();
    w.write_str("Prop1").unwrap();
    w.write_str("Value1").unwrap();
    w.write_str("Prop2").unwrap();
    w.write_u64(42).unwrap();
    w.write_str("deeper").unwrap();
    w.write_array_header(4).unwrap();
    w.write_bool(true).unwrap();
    w.write_f64(3.5).unwrap();
    w.write_ext(15, &[1, 2, 3]).unwrap();
    w.write_timestamp(Timestamp::from_seconds(1672617600)).unwrap();
    w.write_i64(45).unwrap();
    w.write_array_header(3).unwrap();
    w.write_u64(1).unwrap();
    w.write_u64(2).unwrap();
    w.write_u64(3).unwrap();
    w.write_i64(-45).unwrap();
    w.write_bool(false).unwrap();
    out.into_vec()
}

#[test]
fn untyped_reads_expose_the_whole_tree() -> Result<()> {
    shapepack_testhelpers::setup();

    let bytes = scenario_bytes();
    let value: Value = shapepack::from_slice(&bytes)?;

    assert_eq!(value.get("Prop1").and_then(Value::as_str), Some("Value1"));
    assert_eq!(value.get("Prop2").and_then(Value::as_u64), Some(42));

    let deeper = value.get("deeper").and_then(Value::as_array).unwrap();
    assert_eq!(deeper[0].as_bool(), Some(true));
    assert_eq!(deeper[1], Value::F64(3.5));
    assert_eq!(deeper[2], Value::Ext(15, vec![1, 2, 3]));
    assert_eq!(
        deeper[3],
        Value::Timestamp(Timestamp::from_seconds(1672617600))
    );
    Ok(())
}

#[test]
fn integer_keys_index_under_any_width_coercion() -> Result<()> {
    shapepack_testhelpers::setup();

    let value: Value = shapepack::from_slice(&scenario_bytes())?;

    let expected = Value::Array(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)]);
    assert_eq!(value.get(45u8), Some(&expected));
    assert_eq!(value.get(45u64), Some(&expected));
    assert_eq!(value.get(45i16), Some(&expected));
    assert_eq!(value.get(45i64), Some(&expected));

    assert_eq!(value.get(-45i8), Some(&Value::Bool(false)));
    assert_eq!(value.get(-45i64), Some(&Value::Bool(false)));
    Ok(())
}

#[test]
fn dynamic_round_trips_are_byte_stable() -> Result<()> {
    shapepack_testhelpers::setup();

    let bytes = scenario_bytes();
    let value: Value = shapepack::from_slice(&bytes)?;
    assert_eq!(shapepack::to_vec(&value)?, bytes);
    Ok(())
}

#[test]
fn the_json_printer_renders_the_scenario() -> Result<()> {
    shapepack_testhelpers::setup();

    let bytes = scenario_bytes();
    let mut reader = MsgPackReader::new(&bytes);
    let mut out = String::new();
    convert_to_json(
        &mut reader,
        &mut out,
        &JsonOptions {
            pretty: false,
            indent_width: 0,
        },
    )?;
    assert_eq!(
        out,
        "{\"Prop1\":\"Value1\",\"Prop2\":42,\"deeper\":[true,3.5,\
         {\"$ext\": 15, \"data\": \"base16:010203\"},\
         {\"$timestamp\": {\"secs\": 1672617600, \"nanos\": 0}}],\
         \"45\":[1,2,3],\"-45\":false}"
    );
    Ok(())
}
