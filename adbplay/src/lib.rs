//! # adbplay
//!
//! Plays one audio file through an OpenSL ES style audio subsystem and tracks
//! it until the transport reaches Stopped.
//!
//! **Architecture:** a [`playback::Session`] owns the engine, output mix and
//! player, routes every subsystem call through the result reporter, and
//! handles object, play and prefetch events on the main task. The
//! [`audio::NativeSubsystem`] backend plays through symphonia + rubato + cpal.

pub mod audio;
pub mod config;
pub mod error;
pub mod logging;
pub mod playback;
pub mod subsystem;

pub use config::{Overrides, Settings};
pub use error::{Error, Result};
pub use logging::LogStream;
pub use playback::{play_file, Session};
pub use subsystem::AudioSubsystem;

/// Version line shown by `--version` and logged at startup
pub const BUILD_INFO: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " [",
    env!("GIT_HASH"),
    "] built ",
    env!("BUILD_TIMESTAMP"),
    " (",
    env!("BUILD_PROFILE"),
    ")"
);
