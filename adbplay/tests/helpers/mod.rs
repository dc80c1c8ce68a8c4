//! Test helpers for adbplay integration tests
//!
//! - FakeSubsystem: scripted, call-recording AudioSubsystem
//! - session(): fresh capture log for a session under test

#![allow(dead_code)]

pub mod fake_subsystem;

pub use fake_subsystem::FakeSubsystem;

use adbplay::logging::{LogCapture, LogStream};

/// In-memory log stream and its capture
pub fn capture_log() -> (LogStream, LogCapture) {
    LogStream::capture()
}
