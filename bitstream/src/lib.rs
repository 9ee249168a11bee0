//! Fixed-width binary read/write primitives for statecast.
//!
//! This crate provides [`BitWriter`] and [`BitReader`] for encoding and decoding
//! the replication wire format. Scalars have a fixed byte width per type (no
//! variable-length integers), which keeps packet sizes predictable from the
//! layout alone. Sub-byte fields such as packed quaternions use the raw
//! bit-level calls.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads/writes are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about entities, properties, or ticks.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_u32_aligned(42).unwrap();
//! writer.write_str_aligned("crate").unwrap();
//!
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_u32_aligned().unwrap(), 42);
//! assert_eq!(reader.read_string_aligned(64).unwrap(), "crate");
//! ```

mod error;
mod reader;
mod writer;

pub use error::{BitError, BitResult};
pub use reader::BitReader;
pub use writer::{BitWriter, MAX_PREFIXED_LEN};
