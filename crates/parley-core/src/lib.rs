//! # parley-core
//!
//! Domain logic for the parley chat backend:
//! - **Session registry**: issues opaque session tokens at login, tracks
//!   per-user presence and last-activity time, enforces username uniqueness
//! - **Inactivity reaper**: background task that marks idle sessions offline
//! - **Message log**: append-only, in-memory message sequence with clamped
//!   offset pagination
//!
//! All state is volatile; nothing survives a restart. The HTTP layer lives
//! in `parley-server` and only ever talks to the handle types exported here.

pub mod error;
pub mod messages;
pub mod reaper;
pub mod registry;

pub use error::RegistryError;
pub use messages::{Message, MessageLog};
pub use reaper::{spawn_reaper, ReaperHandle};
pub use registry::{Presence, Session, SessionRegistry};
