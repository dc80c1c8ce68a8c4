//! Native audio subsystem backed by symphonia, rubato and cpal
//!
//! Objects live in a registry keyed by handle. The engine is bookkeeping only,
//! the output mix opens the output device when realized, and the player owns
//! decoding, buffering and rendering (see [`NativePlayer`]).
//!
//! The output stream is not `Send`, so the subsystem is driven from a single
//! thread; callbacks still arrive on the player's notifier thread.

use super::output::AudioOutput;
use super::player::{NativePlayer, PlayerConfig};
use crate::config::Settings;
use crate::subsystem::{
    AudioSubsystem, DataSink, DataSource, EngineItf, EngineOptions, InterfaceHandle, InterfaceId,
    InterfaceRequest, ObjectCallback, ObjectHandle, Permille, PlayCallback, PlayEvents, PlayItf,
    PlayState, PrefetchCallback, PrefetchEvents, PrefetchStatus, PrefetchStatusItf, ResultCode,
    SlResult,
};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::{debug, info, warn};

enum Body {
    Engine,
    OutputMix {
        output: Option<AudioOutput>,
    },
    Player {
        sink: ObjectHandle,
        player: NativePlayer,
    },
}

struct NativeObject {
    body: Body,
    realized: bool,
    exposed: Vec<InterfaceId>,
}

impl NativeObject {
    fn new(body: Body, exposed: Vec<InterfaceId>) -> Self {
        Self {
            body,
            realized: false,
            exposed,
        }
    }

    fn label(&self) -> &'static str {
        match self.body {
            Body::Engine => "engine",
            Body::OutputMix { .. } => "output mix",
            Body::Player { .. } => "audio player",
        }
    }
}

#[derive(Default)]
struct Registry {
    next_handle: u32,
    objects: HashMap<ObjectHandle, NativeObject>,
}

impl Registry {
    fn insert(&mut self, object: NativeObject) -> ObjectHandle {
        self.next_handle += 1;
        let handle = ObjectHandle::new(self.next_handle);
        debug!("Created {} {}", object.label(), handle);
        self.objects.insert(handle, object);
        handle
    }

    fn get(&self, handle: ObjectHandle) -> SlResult<&NativeObject> {
        self.objects.get(&handle).ok_or(ResultCode::ParameterInvalid)
    }

    fn get_mut(&mut self, handle: ObjectHandle) -> SlResult<&mut NativeObject> {
        self.objects
            .get_mut(&handle)
            .ok_or(ResultCode::ParameterInvalid)
    }

    /// Check that `itf` came from a realized object exposing `id`
    fn resolve(&self, itf: InterfaceHandle, id: InterfaceId) -> SlResult<&NativeObject> {
        if itf.id != id {
            return Err(ResultCode::ParameterInvalid);
        }
        let object = self.get(itf.object)?;
        if !object.realized {
            return Err(ResultCode::PreconditionsViolated);
        }
        if !object.exposed.contains(&id) {
            return Err(ResultCode::FeatureUnsupported);
        }
        Ok(object)
    }

    fn player(&self, itf: InterfaceHandle, id: InterfaceId) -> SlResult<&NativePlayer> {
        match &self.resolve(itf, id)?.body {
            Body::Player { player, .. } => Ok(player),
            _ => Err(ResultCode::ParameterInvalid),
        }
    }
}

/// Implicit interfaces plus the requested ones this object supports.
///
/// A required interface that is not supported fails creation; optional ones
/// are left out.
fn expose(
    implicit: &[InterfaceId],
    supported: &[InterfaceId],
    request: &InterfaceRequest,
) -> SlResult<Vec<InterfaceId>> {
    let mut exposed = implicit.to_vec();
    for (id, required) in request.iter() {
        if implicit.contains(&id) || supported.contains(&id) {
            if !exposed.contains(&id) {
                exposed.push(id);
            }
        } else if required {
            warn!("Required interface {} is not supported", id);
            return Err(ResultCode::FeatureUnsupported);
        } else {
            debug!("Optional interface {} not supported, skipping", id);
        }
    }
    Ok(exposed)
}

/// [`AudioSubsystem`] that plays through the host's audio output
pub struct NativeSubsystem {
    registry: RefCell<Registry>,
    player_config: PlayerConfig,
    output_device: Option<String>,
}

impl NativeSubsystem {
    pub fn new(settings: &Settings) -> Self {
        Self {
            registry: RefCell::new(Registry::default()),
            player_config: PlayerConfig {
                prefetch_buffer: settings.prefetch_buffer(),
                sufficient_fill: settings.sufficient_fill_permille,
                fill_update: settings.fill_update_permille,
                position_update: settings.position_update(),
            },
            output_device: settings.output_device.clone(),
        }
    }

    /// Number of objects not yet destroyed
    pub fn live_objects(&self) -> usize {
        self.registry.borrow().objects.len()
    }

    fn realize_output_mix(&self, object: ObjectHandle) -> SlResult<()> {
        let output = AudioOutput::open(self.output_device.as_deref())?;
        let mut registry = self.registry.borrow_mut();
        let entry = registry.get_mut(object)?;
        if let Body::OutputMix { output: slot } = &mut entry.body {
            *slot = Some(output);
        }
        entry.realized = true;
        Ok(())
    }

    fn realize_player(&self, object: ObjectHandle, sink: ObjectHandle) -> SlResult<()> {
        let mut registry = self.registry.borrow_mut();

        let output = match registry.get(sink).map(|mix| (&mix.body, mix.realized)) {
            Ok((Body::OutputMix { output: Some(output) }, true)) => output.detached(),
            _ => {
                warn!("Output mix {} is not realized", sink);
                return Err(ResultCode::PreconditionsViolated);
            }
        };

        let entry = registry.get_mut(object)?;
        if let Body::Player { player, .. } = &mut entry.body {
            player.realize(output, self.player_config)?;
        }
        entry.realized = true;
        Ok(())
    }
}

impl AudioSubsystem for NativeSubsystem {
    fn create_engine(
        &self,
        options: &EngineOptions,
        request: &InterfaceRequest,
    ) -> SlResult<ObjectHandle> {
        let exposed = expose(&[InterfaceId::Engine], &[], request)?;
        debug!("Engine options: thread_safe={}", options.thread_safe);
        Ok(self
            .registry
            .borrow_mut()
            .insert(NativeObject::new(Body::Engine, exposed)))
    }

    fn realize(&self, object: ObjectHandle) -> SlResult<()> {
        enum Step {
            Engine,
            OutputMix,
            Player(ObjectHandle),
        }

        let step = {
            let registry = self.registry.borrow();
            let entry = registry.get(object)?;
            if entry.realized {
                return Err(ResultCode::PreconditionsViolated);
            }
            match &entry.body {
                Body::Engine => Step::Engine,
                Body::OutputMix { .. } => Step::OutputMix,
                Body::Player { sink, .. } => Step::Player(*sink),
            }
        };

        match step {
            Step::Engine => {
                self.registry.borrow_mut().get_mut(object)?.realized = true;
                Ok(())
            }
            Step::OutputMix => self.realize_output_mix(object),
            Step::Player(sink) => self.realize_player(object, sink),
        }
    }

    fn get_interface(&self, object: ObjectHandle, id: InterfaceId) -> SlResult<InterfaceHandle> {
        let registry = self.registry.borrow();
        let entry = registry.get(object)?;
        if !entry.realized {
            return Err(ResultCode::PreconditionsViolated);
        }
        if !entry.exposed.contains(&id) {
            return Err(ResultCode::FeatureUnsupported);
        }
        Ok(InterfaceHandle { object, id })
    }

    fn register_object_callback(
        &self,
        object: ObjectHandle,
        callback: ObjectCallback,
    ) -> SlResult<()> {
        let registry = self.registry.borrow();
        let entry = registry.get(object)?;
        match &entry.body {
            Body::Player { player, .. } => player.callbacks().set_object(callback),
            // The engine and output mix never raise object events
            _ => debug!("Object callback on {} {} will not fire", entry.label(), object),
        }
        Ok(())
    }

    fn destroy(&self, object: ObjectHandle) {
        let removed = self.registry.borrow_mut().objects.remove(&object);
        match removed {
            Some(entry) => {
                info!("Destroying {} {}", entry.label(), object);
                drop(entry);
            }
            None => warn!("Destroy of unknown object {}", object),
        }
    }

    fn create_output_mix(
        &self,
        engine: EngineItf,
        request: &InterfaceRequest,
    ) -> SlResult<ObjectHandle> {
        let mut registry = self.registry.borrow_mut();
        registry.resolve(engine.0, InterfaceId::Engine)?;
        let exposed = expose(&[], &[], request)?;
        Ok(registry.insert(NativeObject::new(Body::OutputMix { output: None }, exposed)))
    }

    fn create_audio_player(
        &self,
        engine: EngineItf,
        source: &DataSource,
        sink: &DataSink,
        request: &InterfaceRequest,
    ) -> SlResult<ObjectHandle> {
        let mut registry = self.registry.borrow_mut();
        registry.resolve(engine.0, InterfaceId::Engine)?;
        if !matches!(registry.get(sink.output_mix)?.body, Body::OutputMix { .. }) {
            return Err(ResultCode::ParameterInvalid);
        }
        if source.uri.as_os_str().is_empty() {
            return Err(ResultCode::ParameterInvalid);
        }

        let exposed = expose(&[InterfaceId::Play], &[InterfaceId::PrefetchStatus], request)?;
        let player = NativePlayer::new(source.uri.clone());
        Ok(registry.insert(NativeObject::new(
            Body::Player {
                sink: sink.output_mix,
                player,
            },
            exposed,
        )))
    }

    fn get_play_state(&self, play: PlayItf) -> SlResult<PlayState> {
        let registry = self.registry.borrow();
        Ok(registry.player(play.0, InterfaceId::Play)?.shared().play_state())
    }

    fn set_play_state(&self, play: PlayItf, state: PlayState) -> SlResult<()> {
        if matches!(state, PlayState::Unknown(_)) {
            return Err(ResultCode::ParameterInvalid);
        }
        let registry = self.registry.borrow();
        let player = registry.player(play.0, InterfaceId::Play)?;
        debug!("Play state -> {}", state);
        player.shared().set_play_state(state);
        Ok(())
    }

    fn register_play_callback(&self, play: PlayItf, callback: PlayCallback) -> SlResult<()> {
        let registry = self.registry.borrow();
        registry
            .player(play.0, InterfaceId::Play)?
            .callbacks()
            .set_play(callback);
        Ok(())
    }

    fn set_play_events_mask(&self, play: PlayItf, mask: PlayEvents) -> SlResult<()> {
        let registry = self.registry.borrow();
        registry
            .player(play.0, InterfaceId::Play)?
            .callbacks()
            .set_play_mask(mask);
        Ok(())
    }

    fn get_fill_level(&self, prefetch: PrefetchStatusItf) -> SlResult<Permille> {
        let registry = self.registry.borrow();
        Ok(registry
            .player(prefetch.0, InterfaceId::PrefetchStatus)?
            .shared()
            .fill_level())
    }

    fn get_prefetch_status(&self, prefetch: PrefetchStatusItf) -> SlResult<PrefetchStatus> {
        let registry = self.registry.borrow();
        Ok(registry
            .player(prefetch.0, InterfaceId::PrefetchStatus)?
            .shared()
            .prefetch_status())
    }

    fn register_prefetch_callback(
        &self,
        prefetch: PrefetchStatusItf,
        callback: PrefetchCallback,
    ) -> SlResult<()> {
        let registry = self.registry.borrow();
        registry
            .player(prefetch.0, InterfaceId::PrefetchStatus)?
            .callbacks()
            .set_prefetch(callback);
        Ok(())
    }

    fn set_prefetch_events_mask(
        &self,
        prefetch: PrefetchStatusItf,
        mask: PrefetchEvents,
    ) -> SlResult<()> {
        let registry = self.registry.borrow();
        registry
            .player(prefetch.0, InterfaceId::PrefetchStatus)?
            .callbacks()
            .set_prefetch_mask(mask);
        Ok(())
    }
}
