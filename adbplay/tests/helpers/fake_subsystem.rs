//! Scripted AudioSubsystem that records every call
//!
//! Calls are recorded with the same operation names the session reports
//! (`engine.realize`, `play.get_play_state`, ...), so a failure can be injected
//! on any of them by name.

use adbplay::subsystem::{
    AudioSubsystem, DataSink, DataSource, EngineItf, EngineOptions, InterfaceHandle, InterfaceId,
    InterfaceRequest, ObjectCallback, ObjectEvent, ObjectHandle, Permille, PlayCallback,
    PlayEvents, PlayItf, PlayState, PrefetchCallback, PrefetchEvents, PrefetchStatus,
    PrefetchStatusItf, ResultCode, SlResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
struct Script {
    play_states: VecDeque<PlayState>,
    last_state: Option<PlayState>,
    failures: HashMap<String, ResultCode>,
    fill_level: Permille,
    prefetch_status: Option<PrefetchStatus>,
}

#[derive(Default)]
struct Callbacks {
    object: HashMap<u32, ObjectCallback>,
    play: Option<PlayCallback>,
    prefetch: Option<PrefetchCallback>,
}

#[derive(Default)]
pub struct FakeSubsystem {
    calls: Mutex<Vec<String>>,
    tags: Mutex<HashMap<u32, &'static str>>,
    next_handle: Mutex<u32>,
    script: Mutex<Script>,
    callbacks: Mutex<Callbacks>,
    play_mask: Mutex<Option<PlayEvents>>,
    prefetch_mask: Mutex<Option<PrefetchEvents>>,
    last_source: Mutex<Option<DataSource>>,
    last_set_state: Mutex<Option<PlayState>>,
}

impl FakeSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values returned by successive `get_play_state` calls; the last one repeats
    pub fn with_play_states(self, states: &[PlayState]) -> Self {
        self.script.lock().unwrap().play_states = states.iter().copied().collect();
        self
    }

    /// Make the call named `operation` fail with `code`
    pub fn fail_on(self, operation: &str, code: ResultCode) -> Self {
        self.script
            .lock()
            .unwrap()
            .failures
            .insert(operation.to_string(), code);
        self
    }

    pub fn set_prefetch(&self, fill_level: Permille, status: PrefetchStatus) {
        let mut script = self.script.lock().unwrap();
        script.fill_level = fill_level;
        script.prefetch_status = Some(status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| *c == operation).count()
    }

    pub fn play_mask(&self) -> Option<PlayEvents> {
        *self.play_mask.lock().unwrap()
    }

    pub fn prefetch_mask(&self) -> Option<PrefetchEvents> {
        *self.prefetch_mask.lock().unwrap()
    }

    pub fn last_source(&self) -> Option<DataSource> {
        self.last_source.lock().unwrap().clone()
    }

    pub fn last_set_state(&self) -> Option<PlayState> {
        *self.last_set_state.lock().unwrap()
    }

    /// Invoke the object callback registered on the `tag` resource
    pub fn fire_object(&self, tag: &str, event: ObjectEvent, result: ResultCode) {
        let handle = self
            .tags
            .lock()
            .unwrap()
            .iter()
            .find(|(_, t)| **t == tag)
            .map(|(h, _)| *h)
            .expect("no resource with that tag");
        let callbacks = self.callbacks.lock().unwrap();
        let callback = callbacks.object.get(&handle).expect("no object callback");
        callback(event, result);
    }

    pub fn fire_play(&self, events: PlayEvents) {
        let callbacks = self.callbacks.lock().unwrap();
        (callbacks.play.as_ref().expect("no play callback"))(events);
    }

    pub fn fire_prefetch(&self, events: PrefetchEvents) {
        let callbacks = self.callbacks.lock().unwrap();
        (callbacks.prefetch.as_ref().expect("no prefetch callback"))(events);
    }

    fn tag(&self, handle: ObjectHandle) -> &'static str {
        self.tags
            .lock()
            .unwrap()
            .get(&handle.raw())
            .copied()
            .unwrap_or("unknown")
    }

    /// Record `operation` and return its scripted outcome
    fn record(&self, operation: String) -> SlResult<()> {
        let failure = self.script.lock().unwrap().failures.get(&operation).copied();
        self.calls.lock().unwrap().push(operation);
        match failure {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn allocate(&self, tag: &'static str) -> ObjectHandle {
        let mut next = self.next_handle.lock().unwrap();
        *next += 1;
        self.tags.lock().unwrap().insert(*next, tag);
        ObjectHandle::new(*next)
    }
}

impl AudioSubsystem for FakeSubsystem {
    fn create_engine(
        &self,
        _options: &EngineOptions,
        _request: &InterfaceRequest,
    ) -> SlResult<ObjectHandle> {
        self.record("create_engine".to_string())?;
        Ok(self.allocate("engine"))
    }

    fn realize(&self, object: ObjectHandle) -> SlResult<()> {
        self.record(format!("{}.realize", self.tag(object)))
    }

    fn get_interface(&self, object: ObjectHandle, id: InterfaceId) -> SlResult<InterfaceHandle> {
        self.record(format!("{}.get_interface({})", self.tag(object), id))?;
        Ok(InterfaceHandle { object, id })
    }

    fn register_object_callback(
        &self,
        object: ObjectHandle,
        callback: ObjectCallback,
    ) -> SlResult<()> {
        self.record(format!("{}.register_callback", self.tag(object)))?;
        self.callbacks
            .lock()
            .unwrap()
            .object
            .insert(object.raw(), callback);
        Ok(())
    }

    fn destroy(&self, object: ObjectHandle) {
        let _ = self.record(format!("{}.destroy", self.tag(object)));
    }

    fn create_output_mix(
        &self,
        _engine: EngineItf,
        _request: &InterfaceRequest,
    ) -> SlResult<ObjectHandle> {
        self.record("engine.create_output_mix".to_string())?;
        Ok(self.allocate("outputMix"))
    }

    fn create_audio_player(
        &self,
        _engine: EngineItf,
        source: &DataSource,
        _sink: &DataSink,
        _request: &InterfaceRequest,
    ) -> SlResult<ObjectHandle> {
        self.record("engine.create_audio_player".to_string())?;
        *self.last_source.lock().unwrap() = Some(source.clone());
        Ok(self.allocate("audioPlayer"))
    }

    fn get_play_state(&self, _play: PlayItf) -> SlResult<PlayState> {
        self.record("play.get_play_state".to_string())?;
        let mut script = self.script.lock().unwrap();
        let state = match script.play_states.pop_front() {
            Some(state) => state,
            None => script.last_state.unwrap_or(PlayState::Stopped),
        };
        script.last_state = Some(state);
        Ok(state)
    }

    fn set_play_state(&self, _play: PlayItf, state: PlayState) -> SlResult<()> {
        self.record("play.set_play_state".to_string())?;
        *self.last_set_state.lock().unwrap() = Some(state);
        Ok(())
    }

    fn register_play_callback(&self, _play: PlayItf, callback: PlayCallback) -> SlResult<()> {
        self.record("play.register_callback".to_string())?;
        self.callbacks.lock().unwrap().play = Some(callback);
        Ok(())
    }

    fn set_play_events_mask(&self, _play: PlayItf, mask: PlayEvents) -> SlResult<()> {
        self.record("play.set_callback_events_mask".to_string())?;
        *self.play_mask.lock().unwrap() = Some(mask);
        Ok(())
    }

    fn get_fill_level(&self, _prefetch: PrefetchStatusItf) -> SlResult<Permille> {
        self.record("prefetch.get_fill_level".to_string())?;
        Ok(self.script.lock().unwrap().fill_level)
    }

    fn get_prefetch_status(&self, _prefetch: PrefetchStatusItf) -> SlResult<PrefetchStatus> {
        self.record("prefetch.get_prefetch_status".to_string())?;
        Ok(self
            .script
            .lock()
            .unwrap()
            .prefetch_status
            .unwrap_or(PrefetchStatus::SufficientData))
    }

    fn register_prefetch_callback(
        &self,
        _prefetch: PrefetchStatusItf,
        callback: PrefetchCallback,
    ) -> SlResult<()> {
        self.record("prefetch.register_callback".to_string())?;
        self.callbacks.lock().unwrap().prefetch = Some(callback);
        Ok(())
    }

    fn set_prefetch_events_mask(
        &self,
        _prefetch: PrefetchStatusItf,
        mask: PrefetchEvents,
    ) -> SlResult<()> {
        self.record("prefetch.set_callback_events_mask".to_string())?;
        *self.prefetch_mask.lock().unwrap() = Some(mask);
        Ok(())
    }
}
