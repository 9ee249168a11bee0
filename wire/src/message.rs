//! Message layouts for each logical channel.
//!
//! Tick state:
//!
//! ```text
//! [tick u32][updated-entity mask u64]
//! per set bit, ascending local id:
//!   [flags u8]
//!   if flags.payload: [entity type u16][property mask u64][property payloads]
//! ```
//!
//! Ack: `[tick u32]`. Release notice: `[count u8][local id u8 ...]`.
//! Input: `[tick u32][count u8]` then per entity `[local id u8][property mask u64][payloads]`.
//!
//! Property payloads are written by the codec layer; this module only frames them.

use bitstream::{BitReader, BitWriter};

use crate::error::{DecodeError, EncodeError, WireResult};
use crate::types::{LocalId, Tick, MAX_LOCAL_IDS};

/// Size of the tick message header in bytes.
pub const TICK_HEADER_SIZE: usize = 4 + 8;

/// Size of an ack message in bytes.
pub const ACK_SIZE: usize = 4;

/// Per-entity flag byte in a tick message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityFlags(u8);

impl EntityFlags {
    /// A property payload follows. Always set on entries the authority writes.
    pub const PAYLOAD: u8 = 1 << 0;
    /// The receiving peer owns (controls) this entity.
    pub const OWNED: u8 = 1 << 1;

    const KNOWN: u8 = Self::PAYLOAD | Self::OWNED;

    #[must_use]
    pub const fn new(payload: bool, owned: bool) -> Self {
        let mut bits = 0;
        if payload {
            bits |= Self::PAYLOAD;
        }
        if owned {
            bits |= Self::OWNED;
        }
        Self(bits)
    }

    /// Parses a flag byte, rejecting undefined bits.
    pub fn from_bits(bits: u8) -> WireResult<Self> {
        if bits & !Self::KNOWN != 0 {
            return Err(DecodeError::InvalidEntityFlags { flags: bits });
        }
        Ok(Self(bits))
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn has_payload(self) -> bool {
        self.0 & Self::PAYLOAD != 0
    }

    #[must_use]
    pub const fn is_owned(self) -> bool {
        self.0 & Self::OWNED != 0
    }
}

/// Header of a tick-state message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHeader {
    pub tick: Tick,
    /// Bit `id - 1` set for every local id with an entry in this message.
    pub entity_mask: u64,
}

/// Header of one entity entry in a tick-state message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityHeader {
    pub flags: EntityFlags,
    pub type_id: u16,
    pub property_mask: u64,
}

impl EntityHeader {
    /// Entry carrying property payloads.
    #[must_use]
    pub const fn with_payload(type_id: u16, property_mask: u64, owned: bool) -> Self {
        Self {
            flags: EntityFlags::new(true, owned),
            type_id,
            property_mask,
        }
    }
}

pub fn encode_tick_header(writer: &mut BitWriter, header: &TickHeader) -> Result<(), EncodeError> {
    writer.write_u32_aligned(header.tick.raw())?;
    writer.write_u64_aligned(header.entity_mask)?;
    Ok(())
}

pub fn decode_tick_header(reader: &mut BitReader<'_>) -> WireResult<TickHeader> {
    let tick = Tick::new(reader.read_u32_aligned()?);
    let entity_mask = reader.read_u64_aligned()?;
    Ok(TickHeader { tick, entity_mask })
}

pub fn encode_entity_header(
    writer: &mut BitWriter,
    header: &EntityHeader,
) -> Result<(), EncodeError> {
    if !header.flags.has_payload() {
        return Err(EncodeError::MissingPayload);
    }
    writer.write_u8_aligned(header.flags.bits())?;
    writer.write_u16_aligned(header.type_id)?;
    writer.write_u64_aligned(header.property_mask)?;
    Ok(())
}

pub fn decode_entity_header(reader: &mut BitReader<'_>) -> WireResult<EntityHeader> {
    let flags = EntityFlags::from_bits(reader.read_u8_aligned()?)?;
    if !flags.has_payload() {
        return Err(DecodeError::MissingPayload);
    }
    let type_id = reader.read_u16_aligned()?;
    let property_mask = reader.read_u64_aligned()?;
    Ok(EntityHeader {
        flags,
        type_id,
        property_mask,
    })
}

/// Reads only the tick number of a tick-state message.
pub fn peek_tick(bytes: &[u8]) -> WireResult<Tick> {
    let mut reader = BitReader::new(bytes);
    Ok(Tick::new(reader.read_u32_aligned()?))
}

#[must_use]
pub fn encode_ack(tick: Tick) -> Vec<u8> {
    tick.raw().to_le_bytes().to_vec()
}

pub fn decode_ack(bytes: &[u8]) -> WireResult<Tick> {
    let mut reader = BitReader::new(bytes);
    let tick = Tick::new(reader.read_u32_aligned()?);
    ensure_consumed(&reader)?;
    Ok(tick)
}

/// Encodes a local id release notice for the spawn channel.
pub fn encode_release(ids: &[LocalId]) -> Result<Vec<u8>, EncodeError> {
    let count = u8::try_from(ids.len())
        .ok()
        .filter(|count| *count <= MAX_LOCAL_IDS)
        .ok_or(EncodeError::TooManyEntries { count: ids.len() })?;
    let mut writer = BitWriter::with_capacity(1 + ids.len());
    writer.write_u8_aligned(count)?;
    for id in ids {
        if !id.is_registered() {
            return Err(EncodeError::InvalidLocalId { id: id.raw() });
        }
        writer.write_u8_aligned(id.raw())?;
    }
    Ok(writer.finish())
}

pub fn decode_release(bytes: &[u8]) -> WireResult<Vec<LocalId>> {
    let mut reader = BitReader::new(bytes);
    let count = reader.read_u8_aligned()?;
    if count > MAX_LOCAL_IDS {
        return Err(DecodeError::TooManyEntries {
            count: usize::from(count),
            max: usize::from(MAX_LOCAL_IDS),
        });
    }
    let mut ids = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        ids.push(read_local_id(&mut reader)?);
    }
    ensure_consumed(&reader)?;
    Ok(ids)
}

/// Header of an input message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputHeader {
    /// Observer tick the input was produced at.
    pub tick: Tick,
    pub count: u8,
}

pub fn encode_input_header(writer: &mut BitWriter, header: &InputHeader) -> Result<(), EncodeError> {
    if header.count > MAX_LOCAL_IDS {
        return Err(EncodeError::TooManyEntries {
            count: usize::from(header.count),
        });
    }
    writer.write_u32_aligned(header.tick.raw())?;
    writer.write_u8_aligned(header.count)?;
    Ok(())
}

pub fn decode_input_header(reader: &mut BitReader<'_>) -> WireResult<InputHeader> {
    let tick = Tick::new(reader.read_u32_aligned()?);
    let count = reader.read_u8_aligned()?;
    if count > MAX_LOCAL_IDS {
        return Err(DecodeError::TooManyEntries {
            count: usize::from(count),
            max: usize::from(MAX_LOCAL_IDS),
        });
    }
    Ok(InputHeader { tick, count })
}

pub fn encode_input_entry(
    writer: &mut BitWriter,
    id: LocalId,
    property_mask: u64,
) -> Result<(), EncodeError> {
    if !id.is_registered() {
        return Err(EncodeError::InvalidLocalId { id: id.raw() });
    }
    writer.write_u8_aligned(id.raw())?;
    writer.write_u64_aligned(property_mask)?;
    Ok(())
}

pub fn decode_input_entry(reader: &mut BitReader<'_>) -> WireResult<(LocalId, u64)> {
    let id = read_local_id(reader)?;
    let mask = reader.read_u64_aligned()?;
    Ok((id, mask))
}

fn read_local_id(reader: &mut BitReader<'_>) -> WireResult<LocalId> {
    let raw = reader.read_u8_aligned()?;
    LocalId::new(raw).ok_or(DecodeError::InvalidLocalId { id: raw })
}

fn ensure_consumed(reader: &BitReader<'_>) -> WireResult<()> {
    if reader.is_empty() {
        Ok(())
    } else {
        Err(DecodeError::TrailingBits {
            remaining: reader.bits_remaining(),
        })
    }
}
