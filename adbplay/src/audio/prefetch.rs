//! Read-ahead (prefetch) buffering
//!
//! The decode thread fills a lock-free ring buffer of interleaved f32 samples
//! ahead of the output callback. [`PrefetchTracker`] turns buffer occupancy
//! into the prefetch status and the fill/status events reported to clients.

use super::decoder::StreamDecoder;
use super::player::PlayerShared;
use super::resampler::{map_channels, StreamResampler};
use crate::subsystem::{Permille, PrefetchEvents, PrefetchStatus, ResultCode, PERMILLE_FULL};
use ringbuf::{traits::*, HeapProd};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Back-off while the ring buffer is full
const FULL_BACKOFF: Duration = Duration::from_millis(5);

/// Occupancy as thousandths of capacity
pub fn fill_permille(buffered: usize, capacity: usize) -> Permille {
    if capacity == 0 {
        return 0;
    }
    let permille = (buffered.min(capacity) as u64 * PERMILLE_FULL as u64) / capacity as u64;
    permille as Permille
}

/// Derives prefetch status and events from successive fill observations
#[derive(Debug, Clone)]
pub struct PrefetchTracker {
    status: PrefetchStatus,
    reported_fill: Permille,
    sufficient: Permille,
    update_step: Permille,
}

impl PrefetchTracker {
    /// Starts in UNDERFLOW at fill level 0
    pub fn new(sufficient: Permille, update_step: Permille) -> Self {
        Self {
            status: PrefetchStatus::Underflow,
            reported_fill: 0,
            sufficient: sufficient.min(PERMILLE_FULL),
            update_step: update_step.max(1),
        }
    }

    pub fn status(&self) -> PrefetchStatus {
        self.status
    }

    /// Last fill level reported through an event (or the initial 0)
    pub fn reported_fill(&self) -> Permille {
        self.reported_fill
    }

    /// Observe the current fill level.
    ///
    /// `finished` means no more data will arrive; a finished source never
    /// underflows.
    pub fn update(&mut self, fill: Permille, finished: bool) -> PrefetchEvents {
        let mut events = PrefetchEvents::empty();

        let next = match self.status {
            PrefetchStatus::Underflow if finished || fill >= self.sufficient => {
                PrefetchStatus::SufficientData
            }
            PrefetchStatus::SufficientData if fill == 0 && !finished => PrefetchStatus::Underflow,
            current => current,
        };

        if next != self.status {
            events |= PrefetchEvents::STATUS_CHANGE;
            if next == PrefetchStatus::Underflow {
                // A starved buffer is always reported with its fill level
                events |= PrefetchEvents::FILL_LEVEL_CHANGE;
            }
            self.status = next;
        }

        let moved = fill.abs_diff(self.reported_fill);
        let at_bound = fill == 0 || fill == PERMILLE_FULL;
        if moved >= self.update_step || (at_bound && moved > 0) {
            events |= PrefetchEvents::FILL_LEVEL_CHANGE;
        }
        if events.contains(PrefetchEvents::FILL_LEVEL_CHANGE) {
            self.reported_fill = fill;
        }

        events
    }
}

/// Decode thread body: decode, resample and remix into the ring buffer until
/// the content ends, an unrecoverable error occurs or the player is torn down.
pub(crate) fn run_decode(
    mut decoder: StreamDecoder,
    output_rate: u32,
    output_channels: usize,
    mut producer: HeapProd<f32>,
    shared: Arc<PlayerShared>,
) {
    let mut resampler: Option<StreamResampler> = None;
    let mut resampler_ready = false;

    loop {
        if shared.stop_requested() {
            debug!("Decode thread stopping");
            return;
        }

        let chunk = match decoder.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(code) => {
                shared.report_failure(code);
                shared.mark_decode_finished();
                return;
            }
        };

        let channels = decoder.channels();
        if !resampler_ready {
            match StreamResampler::new(decoder.sample_rate(), output_rate, channels) {
                Ok(r) => resampler = r,
                Err(code) => {
                    shared.report_failure(code);
                    shared.mark_decode_finished();
                    return;
                }
            }
            resampler_ready = true;
        }

        let samples = match resampler.as_mut().map(|r| r.process(&chunk)) {
            Some(Ok(resampled)) => resampled,
            Some(Err(code)) => {
                shared.report_failure(code);
                shared.mark_decode_finished();
                return;
            }
            None => chunk,
        };

        let mapped = map_channels(&samples, channels, output_channels);
        if !push_all(&mut producer, &mapped, &shared) {
            return;
        }
    }

    if let Some(r) = resampler.as_mut() {
        match r.flush() {
            Ok(tail) => {
                let mapped = map_channels(&tail, decoder.channels(), output_channels);
                push_all(&mut producer, &mapped, &shared);
            }
            Err(code) => {
                warn!("Dropping resampler tail");
                shared.report_failure(code);
            }
        }
    }

    debug!("Decoding finished");
    shared.mark_decode_finished();
}

/// Push every sample, waiting while the buffer is full. `false` if stopped first.
fn push_all(producer: &mut HeapProd<f32>, samples: &[f32], shared: &PlayerShared) -> bool {
    let mut offset = 0;
    while offset < samples.len() {
        if shared.stop_requested() {
            return false;
        }
        let pushed = producer.push_slice(&samples[offset..]);
        offset += pushed;
        shared.set_buffered(producer.occupied_len());
        if pushed == 0 {
            thread::sleep(FULL_BACKOFF);
        }
    }
    true
}

/// Code reported to the object callback for a decode-side failure
pub(crate) fn failure_result(code: ResultCode) -> ResultCode {
    match code {
        ResultCode::ContentCorrupted | ResultCode::IoError => code,
        _ => ResultCode::ContentCorrupted,
    }
}
