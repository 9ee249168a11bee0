//! Tick orchestration for statecast.
//!
//! An [`Authority`] owns one world: the entity arena, the replication graph
//! and the pose encoders. Each call to [`Authority::tick`] snapshots dirty
//! state, exports one tick-state message per peer and reports what should go
//! on the wire. An [`Observer`] applies those messages, acknowledges them,
//! reconciles predicted properties of owned entities and produces input.
//!
//! # Tick flow
//!
//! ```text
//! authority                         observer
//! ---------                         --------
//! set / mark_dirty
//! tick()  ── TickState ───────────► receive()  ── hooks
//!         ── Spawn (releases) ────► receive_release()
//! acknowledge() ◄──── Ack ────────  outcome.ack()
//! receive_input() ◄── Input ──────  set_local() / build_input()
//! ```
//!
//! Worlds share nothing. Run one authority per world on whatever scheduler
//! the application uses.

mod arena;
mod authority;
mod config;
mod error;
mod hooks;
mod observer;
mod report;

pub use arena::{EntityArena, EntityRecord};
pub use authority::Authority;
pub use config::{Disposal, RuntimeConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use hooks::{NoHooks, RecordingHooks, ReplicationHooks};
pub use observer::{Observer, ReceiveOutcome, RemoteEntity};
pub use report::{Outgoing, TickReport, Transport};

pub use repgraph::{EntityId, PeerId};
pub use wire::{Channel, LocalId, Tick};
