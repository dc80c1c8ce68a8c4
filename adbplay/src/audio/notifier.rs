//! Notifier thread: polls player counters and delivers client callbacks
//!
//! The output callback and decode thread only touch atomics. This thread
//! observes them on a short tick, derives prefetch and play events, detects
//! end of content and failures, and invokes the registered callbacks.

use super::player::{PlayerCallbacks, PlayerShared};
use super::prefetch::{failure_result, fill_permille, PrefetchTracker};
use crate::subsystem::{ObjectEvent, Permille, PlayEvents, PlayState, PrefetchStatus, ResultCode};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Observation period
const TICK: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy)]
pub struct NotifierConfig {
    pub sufficient_fill: Permille,
    pub fill_update: Permille,
    /// Played frames between two new-position events; 0 disables them
    pub position_update_frames: u64,
}

/// Derives transport events from the played-frame counter
#[derive(Debug, Clone)]
pub struct PlayTracker {
    last_frames: u64,
    moving: bool,
    ended: bool,
    period: u64,
    next_position: u64,
}

impl PlayTracker {
    pub fn new(period_frames: u64) -> Self {
        Self {
            last_frames: 0,
            moving: false,
            ended: false,
            period: period_frames,
            next_position: period_frames,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Observe the played-frame counter.
    ///
    /// `starved` is true while prefetch is in UNDERFLOW; `ended` once the
    /// content has been fully played.
    pub fn update(&mut self, frames_played: u64, starved: bool, ended: bool) -> PlayEvents {
        let mut events = PlayEvents::empty();
        let advancing = frames_played > self.last_frames;

        if advancing && !self.moving {
            events |= PlayEvents::HEAD_MOVING;
            self.moving = true;
        } else if !advancing && self.moving {
            if starved {
                events |= PlayEvents::HEAD_STALLED;
            }
            self.moving = false;
        }

        if self.period > 0 && frames_played >= self.next_position {
            events |= PlayEvents::HEAD_AT_NEW_POS;
            while self.next_position <= frames_played {
                self.next_position += self.period;
            }
        }

        if ended && !self.ended {
            events |= PlayEvents::HEAD_AT_END;
            events.remove(PlayEvents::HEAD_STALLED);
            self.ended = true;
            self.moving = false;
        }

        self.last_frames = frames_played;
        events
    }
}

/// Whether the transport has played everything there is
pub fn content_ended(shared: &PlayerShared) -> bool {
    shared.play_state() == PlayState::Playing && shared.decode_finished() && shared.buffered() == 0
}

/// Thread body; returns once the player is torn down
pub(crate) fn run(shared: Arc<PlayerShared>, callbacks: Arc<PlayerCallbacks>, config: NotifierConfig) {
    let mut prefetch = PrefetchTracker::new(config.sufficient_fill, config.fill_update);
    let mut play = PlayTracker::new(config.position_update_frames);
    debug!("Notifier started");

    while !shared.stop_requested() {
        tick(&shared, &callbacks, &mut prefetch, &mut play);
        thread::sleep(TICK);
    }

    debug!("Notifier stopped");
}

/// One observation step
pub(crate) fn tick(
    shared: &PlayerShared,
    callbacks: &PlayerCallbacks,
    prefetch: &mut PrefetchTracker,
    play: &mut PlayTracker,
) {
    let fill = fill_permille(shared.buffered(), shared.capacity());
    let prefetch_events = prefetch.update(fill, shared.decode_finished());
    shared.publish_prefetch(prefetch.status(), prefetch.reported_fill());

    let ended = content_ended(shared);
    if ended {
        info!("End of content reached");
        shared.set_play_state(PlayState::Stopped);
    }
    let play_events = play.update(
        shared.frames_played(),
        prefetch.status() == PrefetchStatus::Underflow,
        ended,
    );

    if let Some(code) = shared.take_failure() {
        warn!("Player runtime error: {}", code);
        callbacks.dispatch_object(ObjectEvent::RUNTIME_ERROR, failure_result(code));
    }
    if shared.take_stream_error() {
        callbacks.dispatch_object(ObjectEvent::RUNTIME_ERROR, ResultCode::ResourceLost);
    }

    callbacks.dispatch_prefetch(prefetch_events);
    callbacks.dispatch_play(play_events);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::PrefetchEvents;
    use std::sync::Mutex;

    #[test]
    fn test_moving_then_stalled() {
        let mut tracker = PlayTracker::new(0);
        assert_eq!(tracker.update(0, false, false), PlayEvents::empty());
        assert_eq!(tracker.update(512, false, false), PlayEvents::HEAD_MOVING);
        assert_eq!(tracker.update(1024, false, false), PlayEvents::empty());
        assert_eq!(tracker.update(1024, true, false), PlayEvents::HEAD_STALLED);
        assert!(!tracker.is_moving());
        assert_eq!(tracker.update(1536, false, false), PlayEvents::HEAD_MOVING);
    }

    #[test]
    fn test_pause_is_not_a_stall() {
        let mut tracker = PlayTracker::new(0);
        tracker.update(512, false, false);
        assert_eq!(tracker.update(512, false, false), PlayEvents::empty());
        assert!(!tracker.is_moving());
    }

    #[test]
    fn test_new_position_once_per_period() {
        let mut tracker = PlayTracker::new(1000);
        let events = tracker.update(900, false, false);
        assert!(!events.contains(PlayEvents::HEAD_AT_NEW_POS));
        assert!(tracker.update(1000, false, false).contains(PlayEvents::HEAD_AT_NEW_POS));
        assert!(!tracker.update(1500, false, false).contains(PlayEvents::HEAD_AT_NEW_POS));
        // A jump over several periods yields a single event
        assert!(tracker.update(4200, false, false).contains(PlayEvents::HEAD_AT_NEW_POS));
        assert!(!tracker.update(4900, false, false).contains(PlayEvents::HEAD_AT_NEW_POS));
        assert!(tracker.update(5000, false, false).contains(PlayEvents::HEAD_AT_NEW_POS));
    }

    #[test]
    fn test_head_at_end_once() {
        let mut tracker = PlayTracker::new(0);
        tracker.update(512, false, false);
        let events = tracker.update(512, false, true);
        assert!(events.contains(PlayEvents::HEAD_AT_END));
        assert!(!tracker.update(512, false, true).contains(PlayEvents::HEAD_AT_END));
    }

    #[test]
    fn test_tick_stops_player_at_end_of_content() {
        let shared = PlayerShared::new();
        shared.set_capacity(1000);
        shared.set_play_state(PlayState::Playing);
        shared.mark_decode_finished();
        shared.add_frames_played(100);

        let callbacks = PlayerCallbacks::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            callbacks.set_play(Box::new(move |events| {
                seen.lock().unwrap().push(events);
            }));
        }
        callbacks.set_play_mask(PlayEvents::all());

        let mut prefetch = PrefetchTracker::new(250, 100);
        let mut play = PlayTracker::new(0);
        tick(&shared, &callbacks, &mut prefetch, &mut play);

        assert_eq!(shared.play_state(), PlayState::Stopped);
        assert_eq!(shared.prefetch_status(), PrefetchStatus::SufficientData);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains(PlayEvents::HEAD_AT_END));
    }

    #[test]
    fn test_tick_reports_starvation() {
        let shared = PlayerShared::new();
        shared.set_capacity(1000);
        shared.set_play_state(PlayState::Playing);

        let callbacks = PlayerCallbacks::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            callbacks.set_prefetch(Box::new(move |events| {
                seen.lock().unwrap().push(events);
            }));
        }
        callbacks.set_prefetch_mask(PrefetchEvents::all());

        let mut prefetch = PrefetchTracker::new(250, 100);
        let mut play = PlayTracker::new(0);

        shared.set_buffered(600);
        tick(&shared, &callbacks, &mut prefetch, &mut play);
        assert_eq!(shared.prefetch_status(), PrefetchStatus::SufficientData);

        shared.set_buffered(0);
        tick(&shared, &callbacks, &mut prefetch, &mut play);
        assert_eq!(shared.prefetch_status(), PrefetchStatus::Underflow);
        assert_eq!(shared.fill_level(), 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&PrefetchEvents::all()));
    }

    #[test]
    fn test_tick_reports_failures_as_object_events() {
        let shared = PlayerShared::new();
        let callbacks = PlayerCallbacks::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            callbacks.set_object(Box::new(move |event, result| {
                seen.lock().unwrap().push((event, result));
            }));
        }

        shared.report_failure(ResultCode::ContentCorrupted);
        shared.report_stream_error();
        let mut prefetch = PrefetchTracker::new(250, 100);
        let mut play = PlayTracker::new(0);
        tick(&shared, &callbacks, &mut prefetch, &mut play);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (ObjectEvent::RUNTIME_ERROR, ResultCode::ContentCorrupted),
                (ObjectEvent::RUNTIME_ERROR, ResultCode::ResourceLost),
            ]
        );
    }
}
