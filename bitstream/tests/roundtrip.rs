use bitstream::{BitError, BitReader, BitWriter};

#[test]
fn writer_roundtrip_mixed() {
    let mut writer = BitWriter::new();
    writer.write_bit(true);
    writer.write_bits(0b1010, 4).unwrap();
    writer.align_to_byte();
    writer.write_u16_aligned(0xBEEF).unwrap();
    writer.write_str_aligned("héllo").unwrap();
    writer.write_bytes_aligned(&[]).unwrap();
    let bytes = writer.finish();

    let mut reader = BitReader::new(&bytes);
    assert!(reader.read_bit().unwrap());
    assert_eq!(reader.read_bits(4).unwrap(), 0b1010);
    reader.align_to_byte().unwrap();
    assert_eq!(reader.read_u16_aligned().unwrap(), 0xBEEF);
    assert_eq!(reader.read_string_aligned(32).unwrap(), "héllo");
    assert!(reader.read_bytes_aligned(32).unwrap().is_empty());
    assert!(reader.is_empty());
}

#[test]
fn truncated_stream_reports_underrun() {
    let mut writer = BitWriter::new();
    writer.write_u64_aligned(7).unwrap();
    let bytes = writer.finish();

    let mut reader = BitReader::new(&bytes[..5]);
    let err = reader.read_u64_aligned().unwrap_err();
    assert!(matches!(err, BitError::UnexpectedEof { requested: 64, .. }));
}
