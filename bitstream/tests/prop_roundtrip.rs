use bitstream::{BitReader, BitWriter};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Bits { bits: u8, value: u64 },
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Ints(Vec<i32>),
}

fn mask_value(bits: u8, value: u64) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u8..=64, any::<u64>()).prop_map(|(bits, value)| Op::Bits {
            bits,
            value: mask_value(bits, value),
        }),
        any::<bool>().prop_map(Op::Bool),
        any::<u8>().prop_map(Op::U8),
        any::<u16>().prop_map(Op::U16),
        any::<u32>().prop_map(Op::U32),
        any::<u64>().prop_map(Op::U64),
        any::<i8>().prop_map(Op::I8),
        any::<i16>().prop_map(Op::I16),
        any::<i32>().prop_map(Op::I32),
        any::<i64>().prop_map(Op::I64),
        any::<f32>().prop_map(Op::F32),
        any::<f64>().prop_map(Op::F64),
        ".{0,24}".prop_map(Op::Str),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Op::Bytes),
        prop::collection::vec(any::<i32>(), 0..16).prop_map(Op::Ints),
    ]
}

proptest! {
    #[test]
    fn prop_roundtrip_ops(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let mut writer = BitWriter::new();

        for op in &ops {
            if !matches!(op, Op::Bits { .. }) {
                writer.align_to_byte();
            }
            match op {
                Op::Bits { bits, value } => writer.write_bits(*value, *bits).unwrap(),
                Op::Bool(v) => writer.write_bool_aligned(*v).unwrap(),
                Op::U8(v) => writer.write_u8_aligned(*v).unwrap(),
                Op::U16(v) => writer.write_u16_aligned(*v).unwrap(),
                Op::U32(v) => writer.write_u32_aligned(*v).unwrap(),
                Op::U64(v) => writer.write_u64_aligned(*v).unwrap(),
                Op::I8(v) => writer.write_i8_aligned(*v).unwrap(),
                Op::I16(v) => writer.write_i16_aligned(*v).unwrap(),
                Op::I32(v) => writer.write_i32_aligned(*v).unwrap(),
                Op::I64(v) => writer.write_i64_aligned(*v).unwrap(),
                Op::F32(v) => writer.write_f32_aligned(*v).unwrap(),
                Op::F64(v) => writer.write_f64_aligned(*v).unwrap(),
                Op::Str(v) => writer.write_str_aligned(v).unwrap(),
                Op::Bytes(v) => writer.write_bytes_aligned(v).unwrap(),
                Op::Ints(v) => writer.write_i32_array_aligned(v).unwrap(),
            }
        }

        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);

        for op in &ops {
            if !matches!(op, Op::Bits { .. }) {
                reader.align_to_byte().unwrap();
            }
            match op {
                Op::Bits { bits, value } => prop_assert_eq!(reader.read_bits(*bits).unwrap(), *value),
                Op::Bool(v) => prop_assert_eq!(reader.read_bool_aligned().unwrap(), *v),
                Op::U8(v) => prop_assert_eq!(reader.read_u8_aligned().unwrap(), *v),
                Op::U16(v) => prop_assert_eq!(reader.read_u16_aligned().unwrap(), *v),
                Op::U32(v) => prop_assert_eq!(reader.read_u32_aligned().unwrap(), *v),
                Op::U64(v) => prop_assert_eq!(reader.read_u64_aligned().unwrap(), *v),
                Op::I8(v) => prop_assert_eq!(reader.read_i8_aligned().unwrap(), *v),
                Op::I16(v) => prop_assert_eq!(reader.read_i16_aligned().unwrap(), *v),
                Op::I32(v) => prop_assert_eq!(reader.read_i32_aligned().unwrap(), *v),
                Op::I64(v) => prop_assert_eq!(reader.read_i64_aligned().unwrap(), *v),
                Op::F32(v) => prop_assert_eq!(reader.read_f32_aligned().unwrap().to_bits(), v.to_bits()),
                Op::F64(v) => prop_assert_eq!(reader.read_f64_aligned().unwrap().to_bits(), v.to_bits()),
                Op::Str(v) => prop_assert_eq!(&reader.read_string_aligned(1024).unwrap(), v),
                Op::Bytes(v) => prop_assert_eq!(&reader.read_bytes_aligned(1024).unwrap(), v),
                Op::Ints(v) => prop_assert_eq!(&reader.read_i32_array_aligned(1024).unwrap(), v),
            }
        }
    }
}
