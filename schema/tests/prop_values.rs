use bitstream::{BitReader, BitWriter};
use proptest::prelude::*;
use schema::{
    read_value, write_value, ObjectValue, Pose, Quat, SerializerRegistry, Value, ValueLimits,
    Vec3,
};

fn finite_f32() -> impl Strategy<Value = f32> {
    prop::num::f32::NORMAL | prop::num::f32::ZERO | prop::num::f32::SUBNORMAL
}

fn vec3() -> impl Strategy<Value = Vec3> {
    (finite_f32(), finite_f32(), finite_f32()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn quat() -> impl Strategy<Value = Quat> {
    (finite_f32(), finite_f32(), finite_f32(), finite_f32())
        .prop_map(|(x, y, z, w)| Quat::new(x, y, z, w))
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<u8>().prop_map(Value::U8),
        any::<u16>().prop_map(Value::U16),
        any::<u32>().prop_map(Value::U32),
        any::<u64>().prop_map(Value::U64),
        any::<i8>().prop_map(Value::I8),
        any::<i16>().prop_map(Value::I16),
        any::<i32>().prop_map(Value::I32),
        any::<i64>().prop_map(Value::I64),
        finite_f32().prop_map(Value::F32),
        (prop::num::f64::NORMAL | prop::num::f64::ZERO).prop_map(Value::F64),
        ".{0,32}".prop_map(Value::String),
        vec3().prop_map(Value::Vec3),
        quat().prop_map(Value::Quat),
        (vec3(), quat()).prop_map(|(p, q)| Value::Pose(Pose::new(p, q))),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
        prop::collection::vec(any::<i32>(), 0..32).prop_map(Value::IntArray),
        (any::<u8>(), any::<i64>()).prop_map(|(a, b)| {
            Value::Object(ObjectValue::new(7, vec![Value::U8(a), Value::I64(b)]))
        }),
    ]
}

fn registry() -> SerializerRegistry {
    let mut registry = SerializerRegistry::new();
    registry.register_fields(7, vec![schema::ValueType::U8, schema::ValueType::I64]);
    registry
}

proptest! {
    #[test]
    fn prop_value_roundtrip_is_exact(values in prop::collection::vec(value(), 1..24)) {
        let registry = registry();
        let mut writer = BitWriter::new();
        for v in &values {
            write_value(&mut writer, v, &registry).unwrap();
        }
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        for v in &values {
            let out = read_value(&mut reader, v.value_type(), &registry, ValueLimits::default()).unwrap();
            prop_assert_eq!(&out, v);
        }
        prop_assert!(reader.is_empty());
    }

    #[test]
    fn prop_truncated_input_never_panics(v in value(), cut in 0usize..64) {
        let registry = registry();
        let mut writer = BitWriter::new();
        write_value(&mut writer, &v, &registry).unwrap();
        let bytes = writer.finish();
        let cut = cut.min(bytes.len());
        let mut reader = BitReader::new(&bytes[..cut]);
        let result = read_value(&mut reader, v.value_type(), &registry, ValueLimits::default());
        if cut < bytes.len() {
            prop_assert!(result.is_err());
        }
    }
}
