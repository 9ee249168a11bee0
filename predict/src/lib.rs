//! Client-side prediction for statecast.
//!
//! An observer simulates the entities it owns ahead of confirmation. Each
//! predicted property keeps a ring of the values it predicted per tick; when
//! the authority's value for a tick arrives, the two are compared with a
//! per-type tolerance and only diverging properties are snapped back.

mod buffer;
mod compare;
mod error;
mod state;

pub use buffer::PredictionBuffer;
pub use compare::within_tolerance;
pub use error::{PredictError, PredictResult};
pub use state::{EntityPrediction, PredictedProperty};
