//! The live reading session.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐  mpsc   ┌──────────────────────────────┐
//!  │ SessionHandle│────────▶│ SessionActor (one tokio task)│
//!  │ (per socket) │         │  SessionState                │
//!  └──────────────┘         │  LifecycleManager ──▶ store  │
//!         ▲                 │  GraceTimer                  │
//!         │ state/error     │  Connections ──▶ outbound tx │
//!         └─────────────────┴──────────────────────────────┘
//! ```
//!
//! - **SessionState**: what is on screen right now; pure data plus `snapshot()`.
//! - **LifecycleManager**: `queued → displayed → completed`; awaits the
//!   paired storage write before committing any change.
//! - **GraceTimer**: idle deadline polled by the actor; expiry ends the session.
//! - **SessionActor**: serializes every command, broadcasts after each change.
//! - **SessionHandle**: cloneable sender used by connections and HTTP handlers.

mod actor;
mod actor_types;
mod grace_timer;
mod handle;
mod illustration;
mod lifecycle;
mod state;

#[cfg(test)]
mod testing;

pub use actor::SessionActor;
pub use actor_types::{ActorConfig, ActorError, OUTBOUND_CAPACITY};
pub use grace_timer::GraceTimer;
pub use handle::SessionHandle;
pub use illustration::choose_illustration;
pub use lifecycle::{LifecycleError, LifecycleManager, StateError, Transition};
pub use state::{CurrentItem, QueueEntry, SessionState, step_cursor};
