//! Playback session: lifecycle, events, reporting and monitoring

pub mod events;
pub mod lifecycle;
pub mod monitor;
pub mod reporter;
pub mod session;

pub use events::{underflow_abort, Event, EventQueue, PrefetchReport};
pub use lifecycle::{Resource, ResourceKind, ResourceState};
pub use reporter::Reporter;
pub use session::{play_file, Session};
