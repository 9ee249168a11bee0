//! Pose compression, dirty tracking and property payloads for statecast.
//!
//! This crate sits between the value model and the replication graph:
//! - Smallest-three quaternion packing at standard and high precision
//! - Pose keyframe/delta encoding with per-receiver write modes
//! - Per-entity dirty masks with a snapshot/clear cycle
//! - Masked property payloads, with pose properties routed to the pose codec
//!
//! # Design Principles
//!
//! - **Bounded error** - Quantization error is fixed per precision; overflowing deltas clamp.
//! - **Reference-relative deltas** - A lost delta never corrupts later ones.
//! - **Deterministic order** - Payloads are written in ascending property index.

mod dirty;
mod error;
mod payload;
mod pose;
mod quat;

pub use dirty::{DirtyMask, DirtyTracker};
pub use error::{CodecError, CodecResult};
pub use payload::{
    check_values, decode_properties, decode_properties_plain, encode_properties,
    encode_properties_plain, writable_mask,
};
pub use pose::{PoseConfig, PoseDecoder, PoseEncoder, PoseWrite};
pub use quat::{pack_quat, quantize_quat, read_quat, unpack_quat, write_quat, QuatPrecision};
