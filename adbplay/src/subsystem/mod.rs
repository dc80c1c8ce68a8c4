//! Boundary to the native audio subsystem
//!
//! The subsystem follows the OpenSL ES object model: objects (engine, output
//! mix, player) are created, realized, queried for capability interfaces and
//! destroyed. Every fallible primitive returns the raw [`ResultCode`] so that
//! callers can route it through the result reporter.
//!
//! Callbacks registered here are invoked on threads owned by the subsystem.

pub mod codes;
pub mod interfaces;

use std::fmt;
use std::path::PathBuf;

pub use codes::{
    ObjectEvent, Permille, PlayEvents, PlayState, PrefetchEvents, PrefetchStatus, ResultCode,
    PERMILLE_FULL,
};
pub use interfaces::{InterfaceId, InterfaceRequest};

/// Outcome of a subsystem primitive
pub type SlResult<T> = std::result::Result<T, ResultCode>;

/// Opaque object handle allocated by the subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(u32);

impl ObjectHandle {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability view obtained from a realized object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceHandle {
    pub object: ObjectHandle,
    pub id: InterfaceId,
}

/// Engine factory interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineItf(pub InterfaceHandle);

/// Transport control interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayItf(pub InterfaceHandle);

/// Buffering status interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchStatusItf(pub InterfaceHandle);

/// Options for engine creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub thread_safe: bool,
}

/// Container of the source data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    /// Detected from the content
    Unspecified,
}

/// Where the player reads from plus how the data is formatted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub uri: PathBuf,
    pub mime_type: Option<String>,
    pub container: ContainerType,
}

impl DataSource {
    /// File path with auto-detected container
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            uri: path.into(),
            mime_type: None,
            container: ContainerType::Unspecified,
        }
    }
}

/// Where the player renders to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSink {
    pub output_mix: ObjectHandle,
}

/// Object lifecycle callback
pub type ObjectCallback = Box<dyn Fn(ObjectEvent, ResultCode) + Send + 'static>;

/// Transport callback
pub type PlayCallback = Box<dyn Fn(PlayEvents) + Send + 'static>;

/// Buffering callback
pub type PrefetchCallback = Box<dyn Fn(PrefetchEvents) + Send + 'static>;

/// Primitives consumed from the native audio subsystem
pub trait AudioSubsystem {
    fn create_engine(&self, options: &EngineOptions, request: &InterfaceRequest)
        -> SlResult<ObjectHandle>;

    /// Synchronous realization
    fn realize(&self, object: ObjectHandle) -> SlResult<()>;

    fn get_interface(&self, object: ObjectHandle, id: InterfaceId) -> SlResult<InterfaceHandle>;

    fn register_object_callback(&self, object: ObjectHandle, callback: ObjectCallback)
        -> SlResult<()>;

    fn destroy(&self, object: ObjectHandle);

    fn create_output_mix(&self, engine: EngineItf, request: &InterfaceRequest)
        -> SlResult<ObjectHandle>;

    fn create_audio_player(
        &self,
        engine: EngineItf,
        source: &DataSource,
        sink: &DataSink,
        request: &InterfaceRequest,
    ) -> SlResult<ObjectHandle>;

    fn get_play_state(&self, play: PlayItf) -> SlResult<PlayState>;

    fn set_play_state(&self, play: PlayItf, state: PlayState) -> SlResult<()>;

    fn register_play_callback(&self, play: PlayItf, callback: PlayCallback) -> SlResult<()>;

    fn set_play_events_mask(&self, play: PlayItf, mask: PlayEvents) -> SlResult<()>;

    fn get_fill_level(&self, prefetch: PrefetchStatusItf) -> SlResult<Permille>;

    fn get_prefetch_status(&self, prefetch: PrefetchStatusItf) -> SlResult<PrefetchStatus>;

    fn register_prefetch_callback(
        &self,
        prefetch: PrefetchStatusItf,
        callback: PrefetchCallback,
    ) -> SlResult<()>;

    fn set_prefetch_events_mask(&self, prefetch: PrefetchStatusItf, mask: PrefetchEvents)
        -> SlResult<()>;
}
