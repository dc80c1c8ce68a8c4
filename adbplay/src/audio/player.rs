//! Native audio player object
//!
//! A realized player owns three activities: the decode thread filling the
//! prefetch ring buffer, the cpal output stream draining it, and the notifier
//! thread turning shared counters into client callbacks. They communicate only
//! through [`PlayerShared`] atomics.

use super::decoder::StreamDecoder;
use super::notifier::{self, NotifierConfig};
use super::output::{AudioOutput, Renderer};
use super::prefetch;
use crate::subsystem::{
    ObjectCallback, ObjectEvent, Permille, PlayCallback, PlayEvents, PlayState, PrefetchCallback,
    PrefetchEvents, PrefetchStatus, ResultCode, SlResult,
};
use ringbuf::{traits::*, HeapRb};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// No failure pending
const NO_FAILURE: u32 = 0;

/// State shared between the main task, the decode thread, the output
/// callback and the notifier
#[derive(Debug)]
pub struct PlayerShared {
    play_state: AtomicU32,
    prefetch_status: AtomicU32,
    fill_level: AtomicU16,
    /// Samples currently held in the ring buffer
    buffered: AtomicUsize,
    capacity: AtomicUsize,
    decode_finished: AtomicBool,
    /// Frames handed to the device while playing
    frames_played: AtomicU64,
    failure: AtomicU32,
    stream_error: AtomicBool,
    stop: AtomicBool,
}

impl PlayerShared {
    pub fn new() -> Self {
        Self {
            play_state: AtomicU32::new(PlayState::Stopped.raw()),
            prefetch_status: AtomicU32::new(PrefetchStatus::Underflow.raw()),
            fill_level: AtomicU16::new(0),
            buffered: AtomicUsize::new(0),
            capacity: AtomicUsize::new(0),
            decode_finished: AtomicBool::new(false),
            frames_played: AtomicU64::new(0),
            failure: AtomicU32::new(NO_FAILURE),
            stream_error: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }

    pub fn play_state(&self) -> PlayState {
        PlayState::from_raw(self.play_state.load(Ordering::Acquire))
    }

    pub fn set_play_state(&self, state: PlayState) {
        self.play_state.store(state.raw(), Ordering::Release);
    }

    pub fn prefetch_status(&self) -> PrefetchStatus {
        PrefetchStatus::from_raw(self.prefetch_status.load(Ordering::Acquire))
    }

    pub fn fill_level(&self) -> Permille {
        self.fill_level.load(Ordering::Acquire)
    }

    /// Publish what the notifier reported, so queries match the last event
    pub fn publish_prefetch(&self, status: PrefetchStatus, fill: Permille) {
        self.fill_level.store(fill, Ordering::Release);
        self.prefetch_status.store(status.raw(), Ordering::Release);
    }

    pub fn buffered(&self) -> usize {
        self.buffered.load(Ordering::Acquire)
    }

    pub fn set_buffered(&self, samples: usize) {
        self.buffered.store(samples, Ordering::Release);
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    pub fn set_capacity(&self, samples: usize) {
        self.capacity.store(samples, Ordering::Release);
    }

    pub fn decode_finished(&self) -> bool {
        self.decode_finished.load(Ordering::Acquire)
    }

    pub fn mark_decode_finished(&self) {
        self.decode_finished.store(true, Ordering::Release);
    }

    pub fn frames_played(&self) -> u64 {
        self.frames_played.load(Ordering::Acquire)
    }

    pub fn add_frames_played(&self, frames: u64) {
        self.frames_played.fetch_add(frames, Ordering::AcqRel);
    }

    /// Record a failure for the notifier; the first one wins
    pub fn report_failure(&self, code: ResultCode) {
        let _ = self.failure.compare_exchange(
            NO_FAILURE,
            code.raw(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn take_failure(&self) -> Option<ResultCode> {
        match self.failure.swap(NO_FAILURE, Ordering::AcqRel) {
            NO_FAILURE => None,
            raw => Some(ResultCode::from_raw(raw)),
        }
    }

    pub fn report_stream_error(&self) {
        self.stream_error.store(true, Ordering::Release);
    }

    pub fn take_stream_error(&self) -> bool {
        self.stream_error.swap(false, Ordering::AcqRel)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl Default for PlayerShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Registered callbacks and their event masks.
///
/// Masks start empty, so nothing is delivered until a client selects events.
#[derive(Default)]
pub struct PlayerCallbacks {
    object: Mutex<Option<ObjectCallback>>,
    play: Mutex<Option<PlayCallback>>,
    play_mask: AtomicU32,
    prefetch: Mutex<Option<PrefetchCallback>>,
    prefetch_mask: AtomicU32,
}

impl PlayerCallbacks {
    pub fn set_object(&self, callback: ObjectCallback) {
        if let Ok(mut slot) = self.object.lock() {
            *slot = Some(callback);
        }
    }

    pub fn set_play(&self, callback: PlayCallback) {
        if let Ok(mut slot) = self.play.lock() {
            *slot = Some(callback);
        }
    }

    pub fn set_play_mask(&self, mask: PlayEvents) {
        self.play_mask.store(mask.bits(), Ordering::Release);
    }

    pub fn set_prefetch(&self, callback: PrefetchCallback) {
        if let Ok(mut slot) = self.prefetch.lock() {
            *slot = Some(callback);
        }
    }

    pub fn set_prefetch_mask(&self, mask: PrefetchEvents) {
        self.prefetch_mask.store(mask.bits(), Ordering::Release);
    }

    pub fn dispatch_object(&self, event: ObjectEvent, result: ResultCode) {
        if let Ok(slot) = self.object.lock() {
            if let Some(callback) = slot.as_ref() {
                callback(event, result);
            }
        }
    }

    /// Deliver the selected subset of `events`, if any
    pub fn dispatch_play(&self, events: PlayEvents) {
        let selected = events & PlayEvents::from_bits_retain(self.play_mask.load(Ordering::Acquire));
        if selected.is_empty() {
            return;
        }
        if let Ok(slot) = self.play.lock() {
            if let Some(callback) = slot.as_ref() {
                callback(selected);
            }
        }
    }

    /// Deliver the selected subset of `events`, if any
    pub fn dispatch_prefetch(&self, events: PrefetchEvents) {
        let selected =
            events & PrefetchEvents::from_bits_retain(self.prefetch_mask.load(Ordering::Acquire));
        if selected.is_empty() {
            return;
        }
        if let Ok(slot) = self.prefetch.lock() {
            if let Some(callback) = slot.as_ref() {
                callback(selected);
            }
        }
    }
}

/// Tunables applied when a player is realized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    pub prefetch_buffer: Duration,
    pub sufficient_fill: Permille,
    pub fill_update: Permille,
    pub position_update: Duration,
}

/// Threads and stream of a realized player
struct Running {
    output: AudioOutput,
    decode_thread: Option<JoinHandle<()>>,
    notifier_thread: Option<JoinHandle<()>>,
}

pub struct NativePlayer {
    uri: PathBuf,
    shared: Arc<PlayerShared>,
    callbacks: Arc<PlayerCallbacks>,
    running: Option<Running>,
}

impl NativePlayer {
    pub fn new(uri: PathBuf) -> Self {
        Self {
            uri,
            shared: Arc::new(PlayerShared::new()),
            callbacks: Arc::new(PlayerCallbacks::default()),
            running: None,
        }
    }

    pub fn shared(&self) -> &Arc<PlayerShared> {
        &self.shared
    }

    pub fn callbacks(&self) -> &Arc<PlayerCallbacks> {
        &self.callbacks
    }

    /// Open the content and start decoding, output and notification.
    ///
    /// `output` is an opened, not yet started stream on the sink's device.
    pub fn realize(&mut self, mut output: AudioOutput, config: PlayerConfig) -> SlResult<()> {
        let decoder = StreamDecoder::open(&self.uri)?;

        let rate = output.sample_rate();
        let channels = output.channels() as usize;
        let capacity_frames =
            (config.prefetch_buffer.as_millis() as u64 * rate as u64 / 1000).max(1) as usize;
        let capacity = capacity_frames * channels.max(1);

        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        self.shared.set_capacity(capacity);

        let decode_thread = {
            let shared = Arc::clone(&self.shared);
            thread::Builder::new()
                .name("adbplay-prefetch".to_string())
                .spawn(move || prefetch::run_decode(decoder, rate, channels, producer, shared))
                .map_err(|e| {
                    warn!("Failed to spawn prefetch thread: {}", e);
                    ResultCode::ResourceError
                })?
        };

        let renderer = Renderer::new(consumer, Arc::clone(&self.shared), channels);
        if let Err(code) = output.start(renderer) {
            self.shared.request_stop();
            let _ = decode_thread.join();
            return Err(code);
        }

        let notifier_config = NotifierConfig {
            sufficient_fill: config.sufficient_fill,
            fill_update: config.fill_update,
            position_update_frames: config.position_update.as_millis() as u64 * rate as u64
                / 1000,
        };
        let notifier_thread = {
            let shared = Arc::clone(&self.shared);
            let callbacks = Arc::clone(&self.callbacks);
            thread::Builder::new()
                .name("adbplay-notifier".to_string())
                .spawn(move || notifier::run(shared, callbacks, notifier_config))
        };
        let notifier_thread = match notifier_thread {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to spawn notifier thread: {}", e);
                self.shared.request_stop();
                let _ = decode_thread.join();
                return Err(ResultCode::ResourceError);
            }
        };

        info!(
            "Player realized: {} ({} Hz, {} channels, {} sample buffer)",
            self.uri.display(),
            rate,
            channels,
            capacity
        );

        self.running = Some(Running {
            output,
            decode_thread: Some(decode_thread),
            notifier_thread: Some(notifier_thread),
        });
        Ok(())
    }

    pub fn is_realized(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for NativePlayer {
    fn drop(&mut self) {
        self.shared.request_stop();
        if let Some(mut running) = self.running.take() {
            running.output.stop();
            for handle in [running.decode_thread.take(), running.notifier_thread.take()]
                .into_iter()
                .flatten()
            {
                if handle.join().is_err() {
                    warn!("Player thread panicked");
                }
            }
            debug!("Player threads stopped: {}", self.uri.display());
        }
    }
}
