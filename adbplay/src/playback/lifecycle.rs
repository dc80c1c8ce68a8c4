//! Resource lifecycle manager
//!
//! Tracks the engine, output mix and player through
//! Unrealized → Realized → Destroyed. Misuse (querying an unrealized resource,
//! destroying twice, destroying the engine under live children) is rejected
//! before the subsystem is reached.

use super::session::Session;
use crate::error::{Error, Result};
use crate::subsystem::{
    AudioSubsystem, DataSink, DataSource, EngineItf, EngineOptions, InterfaceHandle, InterfaceId,
    InterfaceRequest, ObjectHandle,
};
use std::fmt;
use tracing::debug;

/// The three resources of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Engine,
    OutputMix,
    Player,
}

impl ResourceKind {
    /// Name used in operation labels and object event tags
    pub fn tag(self) -> &'static str {
        match self {
            ResourceKind::Engine => "engine",
            ResourceKind::OutputMix => "outputMix",
            ResourceKind::Player => "audioPlayer",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Unrealized,
    Realized,
    Destroyed,
}

/// A created subsystem object and where it is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    kind: ResourceKind,
    handle: ObjectHandle,
    state: ResourceState,
}

impl Resource {
    pub(crate) fn new(kind: ResourceKind, handle: ObjectHandle) -> Self {
        Self {
            kind,
            handle,
            state: ResourceState::Unrealized,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state != ResourceState::Destroyed
    }

    /// Move forward in the lifecycle. Transitions never go backwards.
    pub(crate) fn advance(&mut self, next: ResourceState) -> Result<()> {
        use ResourceState::*;
        match (self.state, next) {
            (Unrealized, Realized) | (Unrealized, Destroyed) | (Realized, Destroyed) => {
                self.state = next;
                Ok(())
            }
            (from, to) => Err(Error::InvalidState(format!(
                "{}: cannot go from {:?} to {:?}",
                self.kind, from, to
            ))),
        }
    }
}

impl<'a, S: AudioSubsystem + ?Sized> Session<'a, S> {
    /// Look up a created resource
    pub fn resource(&self, kind: ResourceKind) -> Option<&Resource> {
        self.resources.iter().find(|r| r.kind() == kind)
    }

    fn resource_mut(&mut self, kind: ResourceKind) -> Result<&mut Resource> {
        self.resources
            .iter_mut()
            .find(|r| r.kind() == kind)
            .ok_or_else(|| Error::InvalidState(format!("{} has not been created", kind)))
    }

    fn realized(&self, kind: ResourceKind) -> Result<&Resource> {
        match self.resource(kind) {
            Some(r) if r.state() == ResourceState::Realized => Ok(r),
            Some(r) => Err(Error::InvalidState(format!(
                "{} is {:?}, not realized",
                kind,
                r.state()
            ))),
            None => Err(Error::InvalidState(format!("{} has not been created", kind))),
        }
    }

    fn track(&mut self, kind: ResourceKind, handle: ObjectHandle) -> Result<()> {
        if self.resource(kind).is_some() {
            return Err(Error::InvalidState(format!("{} already created", kind)));
        }
        debug!(resource = %kind, handle = %handle, "Resource created");
        self.resources.push(Resource::new(kind, handle));
        Ok(())
    }

    /// Every created resource kind, oldest first
    pub fn creation_order(&self) -> Vec<ResourceKind> {
        self.resources.iter().map(Resource::kind).collect()
    }

    pub fn create_engine(
        &mut self,
        options: &EngineOptions,
        request: &InterfaceRequest,
    ) -> Result<ObjectHandle> {
        if self.resource(ResourceKind::Engine).is_some() {
            return Err(Error::InvalidState("engine already created".to_string()));
        }
        let sl = self.sl;
        let handle = self
            .reporter
            .invoke("create_engine", || sl.create_engine(options, request))?;
        self.track(ResourceKind::Engine, handle)?;
        Ok(handle)
    }

    /// Synchronous realization
    pub fn realize(&mut self, kind: ResourceKind) -> Result<()> {
        let resource = *self.resource_mut(kind)?;
        if resource.state() != ResourceState::Unrealized {
            return Err(Error::InvalidState(format!(
                "{} is {:?}, cannot realize",
                kind,
                resource.state()
            )));
        }

        let sl = self.sl;
        self.reporter
            .invoke(&format!("{}.realize", kind), || sl.realize(resource.handle()))?;
        self.resource_mut(kind)?.advance(ResourceState::Realized)
    }

    /// Query a capability interface from a realized resource
    pub fn get_interface(&self, kind: ResourceKind, id: InterfaceId) -> Result<InterfaceHandle> {
        let handle = self.realized(kind)?.handle();
        let sl = self.sl;
        self.reporter.invoke(&format!("{}.get_interface({})", kind, id), || {
            sl.get_interface(handle, id)
        })
    }

    /// Acquire and keep the engine factory interface
    pub fn acquire_engine_interface(&mut self) -> Result<EngineItf> {
        let itf = EngineItf(self.get_interface(ResourceKind::Engine, InterfaceId::Engine)?);
        self.engine_itf = Some(itf);
        Ok(itf)
    }

    fn engine_interface(&self) -> Result<EngineItf> {
        self.engine_itf
            .ok_or_else(|| Error::InvalidState("engine interface not acquired".to_string()))
    }

    pub fn create_output_mix(&mut self, request: &InterfaceRequest) -> Result<ObjectHandle> {
        if self.resource(ResourceKind::OutputMix).is_some() {
            return Err(Error::InvalidState("outputMix already created".to_string()));
        }
        let engine = self.engine_interface()?;
        let sl = self.sl;
        let handle = self
            .reporter
            .invoke("engine.create_output_mix", || sl.create_output_mix(engine, request))?;
        self.track(ResourceKind::OutputMix, handle)?;
        Ok(handle)
    }

    /// Create the player reading `source` and rendering into the realized output mix
    pub fn create_audio_player(
        &mut self,
        source: &DataSource,
        request: &InterfaceRequest,
    ) -> Result<ObjectHandle> {
        if self.resource(ResourceKind::Player).is_some() {
            return Err(Error::InvalidState("audioPlayer already created".to_string()));
        }
        let engine = self.engine_interface()?;
        let sink = DataSink {
            output_mix: self.realized(ResourceKind::OutputMix)?.handle(),
        };
        let sl = self.sl;
        let handle = self.reporter.invoke("engine.create_audio_player", || {
            sl.create_audio_player(engine, source, &sink, request)
        })?;
        self.track(ResourceKind::Player, handle)?;
        Ok(handle)
    }

    pub fn destroy(&mut self, kind: ResourceKind) -> Result<()> {
        let resource = *self.resource_mut(kind)?;
        if !resource.is_alive() {
            return Err(Error::InvalidState(format!("{} already destroyed", kind)));
        }
        if kind == ResourceKind::Engine {
            if let Some(child) = self
                .resources
                .iter()
                .find(|r| r.kind() != ResourceKind::Engine && r.is_alive())
            {
                return Err(Error::InvalidState(format!(
                    "engine still owns a live {}",
                    child.kind()
                )));
            }
        }

        let sl = self.sl;
        self.reporter
            .invoke_void(&format!("{}.destroy", kind), || sl.destroy(resource.handle()));
        self.resource_mut(kind)?.advance(ResourceState::Destroyed)?;
        self.invalidate_interfaces(resource.handle());
        Ok(())
    }

    fn invalidate_interfaces(&mut self, object: ObjectHandle) {
        if self.engine_itf.map_or(false, |itf| itf.0.object == object) {
            self.engine_itf = None;
        }
        if self.play_itf.map_or(false, |itf| itf.0.object == object) {
            self.play_itf = None;
        }
        if self.prefetch_itf.map_or(false, |itf| itf.0.object == object) {
            self.prefetch_itf = None;
        }
    }

    /// Destroy every live resource in reverse creation order
    pub fn teardown(&mut self) -> Result<()> {
        let live: Vec<ResourceKind> = self
            .resources
            .iter()
            .rev()
            .filter(|r| r.is_alive())
            .map(Resource::kind)
            .collect();

        for kind in live {
            self.destroy(kind)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_starts_unrealized() {
        let resource = Resource::new(ResourceKind::Player, ObjectHandle::new(3));
        assert_eq!(resource.state(), ResourceState::Unrealized);
        assert!(resource.is_alive());
    }

    #[test]
    fn test_resource_transitions_are_monotonic() {
        let mut resource = Resource::new(ResourceKind::Engine, ObjectHandle::new(1));
        resource.advance(ResourceState::Realized).unwrap();
        assert!(resource.advance(ResourceState::Realized).is_err());
        assert!(resource.advance(ResourceState::Unrealized).is_err());
        resource.advance(ResourceState::Destroyed).unwrap();
        assert!(resource.advance(ResourceState::Destroyed).is_err());
        assert!(!resource.is_alive());
    }

    #[test]
    fn test_unrealized_resource_can_be_destroyed() {
        let mut resource = Resource::new(ResourceKind::OutputMix, ObjectHandle::new(2));
        resource.advance(ResourceState::Destroyed).unwrap();
        assert_eq!(resource.state(), ResourceState::Destroyed);
    }

    #[test]
    fn test_tags() {
        assert_eq!(ResourceKind::Engine.tag(), "engine");
        assert_eq!(ResourceKind::OutputMix.to_string(), "outputMix");
        assert_eq!(ResourceKind::Player.to_string(), "audioPlayer");
    }
}
