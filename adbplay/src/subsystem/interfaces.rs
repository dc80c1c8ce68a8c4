//! Capability interface identifiers and per-resource interface requests

use crate::error::{Error, Result};
use std::fmt;

/// Capability interface that can be requested from a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceId {
    /// Engine factory (create output mix / audio player)
    Engine,
    /// Transport control
    Play,
    /// Buffering status
    PrefetchStatus,
    Seek,
    MuteSolo,
}

impl InterfaceId {
    pub fn label(self) -> &'static str {
        match self {
            InterfaceId::Engine => "SL_IID_ENGINE",
            InterfaceId::Play => "SL_IID_PLAY",
            InterfaceId::PrefetchStatus => "SL_IID_PREFETCHSTATUS",
            InterfaceId::Seek => "SL_IID_SEEK",
            InterfaceId::MuteSolo => "SL_IID_MUTESOLO",
        }
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered interface identifiers plus matching required flags, passed verbatim
/// into a creation call.
///
/// Both lists always have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceRequest {
    ids: Vec<InterfaceId>,
    required: Vec<bool>,
}

impl InterfaceRequest {
    /// Request nothing beyond the resource's implicit interfaces
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a request from `(interface, required)` pairs
    pub fn declare(entries: &[(InterfaceId, bool)]) -> Self {
        let (ids, required) = entries.iter().copied().unzip();
        Self { ids, required }
    }

    /// Build a request from separately declared lists.
    ///
    /// # Errors
    /// [`Error::InterfaceRequestMismatch`] if the lists differ in length.
    pub fn from_parts(ids: Vec<InterfaceId>, required: Vec<bool>) -> Result<Self> {
        if ids.len() != required.len() {
            return Err(Error::InterfaceRequestMismatch {
                ids: ids.len(),
                required: required.len(),
            });
        }
        Ok(Self { ids, required })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[InterfaceId] {
        &self.ids
    }

    pub fn required(&self) -> &[bool] {
        &self.required
    }

    pub fn iter(&self) -> impl Iterator<Item = (InterfaceId, bool)> + '_ {
        self.ids.iter().copied().zip(self.required.iter().copied())
    }

    /// Whether `id` is listed and marked mandatory
    pub fn is_required(&self, id: InterfaceId) -> bool {
        self.iter().any(|(listed, required)| listed == id && required)
    }
}

/// Engine: seek and mute/solo declared, neither mandatory
pub fn engine_request() -> InterfaceRequest {
    InterfaceRequest::declare(&[(InterfaceId::Seek, false), (InterfaceId::MuteSolo, false)])
}

/// Output mix: defaults only
pub fn output_mix_request() -> InterfaceRequest {
    InterfaceRequest::empty()
}

/// Player: transport and buffering status are mandatory, seek and mute/solo optional
pub fn player_request() -> InterfaceRequest {
    InterfaceRequest::declare(&[
        (InterfaceId::Seek, false),
        (InterfaceId::MuteSolo, false),
        (InterfaceId::PrefetchStatus, true),
        (InterfaceId::Play, true),
    ])
}
