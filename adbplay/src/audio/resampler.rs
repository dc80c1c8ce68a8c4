//! Streaming sample-rate conversion using rubato
//!
//! Decoded chunks arrive in arbitrary sizes; rubato's FastFixedIn wants fixed
//! input chunks, so input is staged per channel until a full chunk is ready.

use crate::subsystem::{ResultCode, SlResult};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::{debug, warn};

/// Input frames handed to rubato per call
const CHUNK_FRAMES: usize = 1024;

pub struct StreamResampler {
    resampler: FastFixedIn<f32>,
    channels: usize,
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    /// `None` when the rates already match
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> SlResult<Option<Self>> {
        if input_rate == output_rate {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(None);
        }
        if channels == 0 || input_rate == 0 {
            return Err(ResultCode::ContentUnsupported);
        }

        debug!(
            "Resampling from {}Hz to {}Hz ({} channels)",
            input_rate, output_rate, channels
        );

        let resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            CHUNK_FRAMES,
            channels,
        )
        .map_err(|e| {
            warn!("Failed to create resampler: {}", e);
            ResultCode::ContentUnsupported
        })?;

        Ok(Some(Self {
            resampler,
            channels,
            pending: vec![Vec::with_capacity(CHUNK_FRAMES * 2); channels],
        }))
    }

    /// Feed interleaved input, returning whatever output is ready
    pub fn process(&mut self, interleaved: &[f32]) -> SlResult<Vec<f32>> {
        for frame in interleaved.chunks_exact(self.channels) {
            for (ch, sample) in frame.iter().enumerate() {
                self.pending[ch].push(*sample);
            }
        }

        let mut output = Vec::new();
        loop {
            let needed = self.resampler.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }

            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| ch.drain(..needed).collect())
                .collect();
            let planar = self.resampler.process(&chunk, None).map_err(|e| {
                warn!("Resampling failed: {}", e);
                ResultCode::InternalError
            })?;
            output.extend(interleave(&planar));
        }
        Ok(output)
    }

    /// Resample what is left at end of content
    pub fn flush(&mut self) -> SlResult<Vec<f32>> {
        if self.pending[0].is_empty() {
            return Ok(Vec::new());
        }
        let rest: Vec<Vec<f32>> = self.pending.iter_mut().map(std::mem::take).collect();
        let planar = self
            .resampler
            .process_partial(Some(rest.as_slice()), None)
            .map_err(|e| {
                warn!("Resampling failed: {}", e);
                ResultCode::InternalError
            })?;
        Ok(interleave(&planar))
    }
}

/// Planar to interleaved.
///
/// Input:  [[L, L, L, ...], [R, R, R, ...]]
/// Output: [L, R, L, R, L, R, ...]
pub fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };
    let frames = first.len();
    let mut interleaved = Vec::with_capacity(frames * planar.len());
    for frame_idx in 0..frames {
        for channel in planar {
            interleaved.push(channel[frame_idx]);
        }
    }
    interleaved
}

/// Map interleaved audio from `from` channels to `to` channels.
///
/// Mono is duplicated to every output channel; down-mixing to mono averages;
/// otherwise channels are copied by index and extra output channels are silent.
pub fn map_channels(input: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return input.to_vec();
    }

    let frames = input.len() / from;
    let mut output = Vec::with_capacity(frames * to);
    for frame in input.chunks_exact(from) {
        if from == 1 {
            output.extend(std::iter::repeat(frame[0]).take(to));
        } else if to == 1 {
            output.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            output.extend((0..to).map(|ch| frame.get(ch).copied().unwrap_or(0.0)));
        }
    }
    output
}
