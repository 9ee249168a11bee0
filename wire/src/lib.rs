//! Tick message framing and logical channels for statecast.
//!
//! This crate handles the binary layout of the replication messages: the
//! tick-state frame, per-entity entry headers, acknowledgements, local id
//! release notices and input frames. It does not know how property values are
//! encoded, only where they sit in a message.
//!
//! # Design Principles
//!
//! - **Fixed widths** - Every header field has a fixed size, so message size follows from content.
//! - **Local ids only** - Entities are addressed by one-byte per-peer ids, never by global id.
//! - **Bounded decoding** - Counts are validated before iteration.

mod error;
mod limits;
mod message;
mod types;

pub use error::{DecodeError, EncodeError, WireResult};
pub use limits::Limits;
pub use message::{
    decode_ack, decode_entity_header, decode_input_entry, decode_input_header, decode_release,
    decode_tick_header, encode_ack, encode_entity_header, encode_input_entry, encode_input_header,
    encode_release, encode_tick_header, peek_tick, EntityFlags, EntityHeader, InputHeader,
    TickHeader, ACK_SIZE, TICK_HEADER_SIZE,
};
pub use types::{Channel, LocalId, Reliability, Tick, MAX_LOCAL_IDS};
