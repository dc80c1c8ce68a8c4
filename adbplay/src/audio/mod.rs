//! Native audio backend
//!
//! Implements [`crate::subsystem::AudioSubsystem`] on top of symphonia
//! (decoding), rubato (resampling), ringbuf (prefetch buffer) and cpal
//! (device output).

pub mod decoder;
pub mod native;
pub mod notifier;
pub mod output;
pub mod player;
pub mod prefetch;
pub mod resampler;

pub use native::NativeSubsystem;
