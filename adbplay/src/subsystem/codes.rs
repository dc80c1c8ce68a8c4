//! Numeric codes exchanged with the audio subsystem and their stable labels
//!
//! Values follow the OpenSL ES object model. Every decoder is total: a value
//! outside the known table decodes to `(unknown <domain>)` instead of failing.

use bitflags::bitflags;
use std::fmt;

/// Status returned by every fallible subsystem call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    PreconditionsViolated,
    ParameterInvalid,
    MemoryFailure,
    ResourceError,
    ResourceLost,
    IoError,
    BufferInsufficient,
    ContentCorrupted,
    ContentUnsupported,
    ContentNotFound,
    PermissionDenied,
    FeatureUnsupported,
    InternalError,
    UnknownError,
    OperationAborted,
    ControlLost,
    /// Value outside the documented table
    Unknown(u32),
}

impl ResultCode {
    /// Every documented non-success code, in numeric order
    pub const FAILURES: [ResultCode; 16] = [
        ResultCode::PreconditionsViolated,
        ResultCode::ParameterInvalid,
        ResultCode::MemoryFailure,
        ResultCode::ResourceError,
        ResultCode::ResourceLost,
        ResultCode::IoError,
        ResultCode::BufferInsufficient,
        ResultCode::ContentCorrupted,
        ResultCode::ContentUnsupported,
        ResultCode::ContentNotFound,
        ResultCode::PermissionDenied,
        ResultCode::FeatureUnsupported,
        ResultCode::InternalError,
        ResultCode::UnknownError,
        ResultCode::OperationAborted,
        ResultCode::ControlLost,
    ];

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => ResultCode::Success,
            1..=16 => Self::FAILURES[raw as usize - 1],
            other => ResultCode::Unknown(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::PreconditionsViolated => 1,
            ResultCode::ParameterInvalid => 2,
            ResultCode::MemoryFailure => 3,
            ResultCode::ResourceError => 4,
            ResultCode::ResourceLost => 5,
            ResultCode::IoError => 6,
            ResultCode::BufferInsufficient => 7,
            ResultCode::ContentCorrupted => 8,
            ResultCode::ContentUnsupported => 9,
            ResultCode::ContentNotFound => 10,
            ResultCode::PermissionDenied => 11,
            ResultCode::FeatureUnsupported => 12,
            ResultCode::InternalError => 13,
            ResultCode::UnknownError => 14,
            ResultCode::OperationAborted => 15,
            ResultCode::ControlLost => 16,
            ResultCode::Unknown(raw) => raw,
        }
    }

    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }

    pub fn label(self) -> &'static str {
        match self {
            ResultCode::Success => "SL_RESULT_SUCCESS",
            ResultCode::PreconditionsViolated => "SL_RESULT_PRECONDITIONS_VIOLATED",
            ResultCode::ParameterInvalid => "SL_RESULT_PARAMETER_INVALID",
            ResultCode::MemoryFailure => "SL_RESULT_MEMORY_FAILURE",
            ResultCode::ResourceError => "SL_RESULT_RESOURCE_ERROR",
            ResultCode::ResourceLost => "SL_RESULT_RESOURCE_LOST",
            ResultCode::IoError => "SL_RESULT_IO_ERROR",
            ResultCode::BufferInsufficient => "SL_RESULT_BUFFER_INSUFFICIENT",
            ResultCode::ContentCorrupted => "SL_RESULT_CONTENT_CORRUPTED",
            ResultCode::ContentUnsupported => "SL_RESULT_CONTENT_UNSUPPORTED",
            ResultCode::ContentNotFound => "SL_RESULT_CONTENT_NOT_FOUND",
            ResultCode::PermissionDenied => "SL_RESULT_PERMISSION_DENIED",
            ResultCode::FeatureUnsupported => "SL_RESULT_FEATURE_UNSUPPORTED",
            ResultCode::InternalError => "SL_RESULT_INTERNAL_ERROR",
            ResultCode::UnknownError => "SL_RESULT_UNKNOWN_ERROR",
            ResultCode::OperationAborted => "SL_RESULT_OPERATION_ABORTED",
            ResultCode::ControlLost => "SL_RESULT_CONTROL_LOST",
            ResultCode::Unknown(_) => "(unknown SL_RESULT)",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Transport state of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayState {
    Stopped,
    Paused,
    Playing,
    Unknown(u32),
}

impl PlayState {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => PlayState::Stopped,
            2 => PlayState::Paused,
            3 => PlayState::Playing,
            other => PlayState::Unknown(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            PlayState::Stopped => 1,
            PlayState::Paused => 2,
            PlayState::Playing => 3,
            PlayState::Unknown(raw) => raw,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlayState::Stopped => "SL_PLAYSTATE_STOPPED",
            PlayState::Paused => "SL_PLAYSTATE_PAUSED",
            PlayState::Playing => "SL_PLAYSTATE_PLAYING",
            PlayState::Unknown(_) => "(unknown SL_PLAYSTATE)",
        }
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-ahead status reported by the buffering-status interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefetchStatus {
    Underflow,
    SufficientData,
    Overflow,
    Unknown(u32),
}

impl PrefetchStatus {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => PrefetchStatus::Underflow,
            2 => PrefetchStatus::SufficientData,
            3 => PrefetchStatus::Overflow,
            other => PrefetchStatus::Unknown(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            PrefetchStatus::Underflow => 1,
            PrefetchStatus::SufficientData => 2,
            PrefetchStatus::Overflow => 3,
            PrefetchStatus::Unknown(raw) => raw,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PrefetchStatus::Underflow => "SL_PREFETCHSTATUS_UNDERFLOW",
            PrefetchStatus::SufficientData => "SL_PREFETCHSTATUS_SUFFICIENTDATA",
            PrefetchStatus::Overflow => "SL_PREFETCHSTATUS_OVERFLOW",
            PrefetchStatus::Unknown(_) => "(unknown SL_PREFETCHSTATUS)",
        }
    }
}

impl fmt::Display for PrefetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Object lifecycle event code, logged numerically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectEvent(pub u32);

impl ObjectEvent {
    pub const RUNTIME_ERROR: ObjectEvent = ObjectEvent(1);
    pub const ASYNC_TERMINATION: ObjectEvent = ObjectEvent(2);
    pub const RESOURCES_LOST: ObjectEvent = ObjectEvent(3);
    pub const RESOURCES_AVAILABLE: ObjectEvent = ObjectEvent(4);
    pub const ITF_CONTROL_TAKEN: ObjectEvent = ObjectEvent(5);
    pub const ITF_CONTROL_RETURNED: ObjectEvent = ObjectEvent(6);
    pub const ITF_PARAMETERS_CHANGED: ObjectEvent = ObjectEvent(7);
}

impl fmt::Display for ObjectEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Transport notifications selectable on the play interface
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PlayEvents: u32 {
        const HEAD_AT_END = 0x0000_0001;
        const HEAD_AT_MARKER = 0x0000_0002;
        const HEAD_AT_NEW_POS = 0x0000_0004;
        const HEAD_MOVING = 0x0000_0008;
        const HEAD_STALLED = 0x0000_0010;
    }
}

bitflags! {
    /// Buffering notifications selectable on the prefetch-status interface
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PrefetchEvents: u32 {
        const STATUS_CHANGE = 0x0000_0001;
        const FILL_LEVEL_CHANGE = 0x0000_0002;
    }
}

/// Fill level in thousandths of the prefetch buffer (0..=1000)
pub type Permille = u16;

/// Upper bound of [`Permille`]
pub const PERMILLE_FULL: Permille = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_raw_roundtrip_for_documented_codes() {
        for raw in 0..=16 {
            assert_eq!(ResultCode::from_raw(raw).raw(), raw);
        }
    }

    #[test]
    fn test_result_code_labels() {
        assert_eq!(ResultCode::Success.label(), "SL_RESULT_SUCCESS");
        assert_eq!(ResultCode::from_raw(6).label(), "SL_RESULT_IO_ERROR");
        assert_eq!(ResultCode::from_raw(16).label(), "SL_RESULT_CONTROL_LOST");
    }

    #[test]
    fn test_unknown_result_code_decodes_to_generic_label() {
        let code = ResultCode::from_raw(0x1234);
        assert_eq!(code, ResultCode::Unknown(0x1234));
        assert_eq!(code.to_string(), "(unknown SL_RESULT)");
        assert!(!code.is_success());
    }

    #[test]
    fn test_failures_table_excludes_success() {
        assert!(ResultCode::FAILURES.iter().all(|code| !code.is_success()));
        assert_eq!(ResultCode::FAILURES.len(), 16);
    }

    #[test]
    fn test_play_state_decoding() {
        assert_eq!(PlayState::from_raw(1), PlayState::Stopped);
        assert_eq!(PlayState::from_raw(3).label(), "SL_PLAYSTATE_PLAYING");
        assert_eq!(PlayState::from_raw(0).label(), "(unknown SL_PLAYSTATE)");
        assert_eq!(PlayState::Paused.raw(), 2);
    }

    #[test]
    fn test_prefetch_status_decoding() {
        assert_eq!(PrefetchStatus::from_raw(1), PrefetchStatus::Underflow);
        assert_eq!(PrefetchStatus::SufficientData.raw(), 2);
        assert_eq!(PrefetchStatus::from_raw(9).label(), "(unknown SL_PREFETCHSTATUS)");
    }

    #[test]
    fn test_event_mask_bits() {
        let all = PlayEvents::HEAD_AT_END
            | PlayEvents::HEAD_AT_MARKER
            | PlayEvents::HEAD_AT_NEW_POS
            | PlayEvents::HEAD_MOVING
            | PlayEvents::HEAD_STALLED;
        assert_eq!(all.bits(), 0x1f);
        assert_eq!(PrefetchEvents::all().bits(), 0x3);
    }
}
