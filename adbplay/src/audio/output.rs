//! Audio output using cpal
//!
//! The output mix opens a device; each realized player starts its own stream
//! on that device, fed by a [`Renderer`] draining the player's ring buffer.

use super::player::PlayerShared;
use crate::subsystem::{PlayState, PrefetchStatus, ResultCode, SlResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pulls interleaved f32 samples out of the prefetch buffer for the device.
///
/// Outputs silence while the transport is not Playing or while prefetch is
/// starved.
pub struct Renderer {
    consumer: HeapCons<f32>,
    shared: Arc<PlayerShared>,
    channels: usize,
    scratch: Vec<f32>,
}

impl Renderer {
    pub fn new(consumer: HeapCons<f32>, shared: Arc<PlayerShared>, channels: usize) -> Self {
        Self {
            consumer,
            shared,
            channels: channels.max(1),
            scratch: Vec::new(),
        }
    }

    /// Fill `out` in the device's sample type
    pub fn render<T: Sample + FromSample<f32>>(&mut self, out: &mut [T]) {
        if self.scratch.len() < out.len() {
            self.scratch.resize(out.len(), 0.0);
        }

        let playing = self.shared.play_state() == PlayState::Playing
            && self.shared.prefetch_status() != PrefetchStatus::Underflow;

        let mut popped = 0;
        if playing {
            // Whole frames only, so channels never shift
            let wanted = out.len() - out.len() % self.channels;
            popped = self.consumer.pop_slice(&mut self.scratch[..wanted]);
            popped -= popped % self.channels;
            self.shared.set_buffered(self.consumer.occupied_len());
            self.shared
                .add_frames_played((popped / self.channels) as u64);
        }

        for (slot, sample) in out.iter_mut().zip(&self.scratch[..popped]) {
            *slot = T::from_sample(*sample);
        }
        for slot in out.iter_mut().skip(popped) {
            *slot = T::EQUILIBRIUM;
        }
    }
}

pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
}

impl AudioOutput {
    /// List available output device names
    pub fn list_devices() -> Vec<String> {
        let host = cpal::default_host();
        match host.output_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                warn!("Failed to enumerate devices: {}", e);
                Vec::new()
            }
        }
    }

    /// Open the named device, falling back to the host default when it is
    /// missing.
    pub fn open(device_name: Option<&str>) -> SlResult<Self> {
        let host = cpal::default_host();

        let named = device_name.and_then(|name| {
            let found = host
                .output_devices()
                .ok()
                .and_then(|mut devices| devices.find(|d| d.name().ok().as_deref() == Some(name)));
            match &found {
                Some(_) => info!("Found requested audio device: {}", name),
                None => {
                    warn!(
                        "Requested device '{}' not found, falling back to default device",
                        name
                    );
                    debug!("Available devices: {:?}", Self::list_devices());
                }
            }
            found
        });

        let device = match named {
            Some(device) => device,
            None => host.default_output_device().ok_or_else(|| {
                error!("No default output device found");
                ResultCode::ResourceError
            })?,
        };

        let supported = device.default_output_config().map_err(|e| {
            error!("Failed to get default output config: {}", e);
            ResultCode::ResourceError
        })?;
        let sample_format = supported.sample_format();
        let config = supported.config();

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );
        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
        })
    }

    /// Same device and format, no stream
    pub fn detached(&self) -> Self {
        Self {
            device: self.device.clone(),
            config: self.config.clone(),
            sample_format: self.sample_format,
            stream: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Build and start the stream. Stream errors are flagged on `renderer`'s
    /// player for the notifier.
    pub fn start(&mut self, renderer: Renderer) -> SlResult<()> {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build::<f32>(renderer)?,
            SampleFormat::F64 => self.build::<f64>(renderer)?,
            SampleFormat::I16 => self.build::<i16>(renderer)?,
            SampleFormat::I32 => self.build::<i32>(renderer)?,
            SampleFormat::U16 => self.build::<u16>(renderer)?,
            SampleFormat::U8 => self.build::<u8>(renderer)?,
            SampleFormat::I8 => self.build::<i8>(renderer)?,
            other => {
                error!("Unsupported sample format: {:?}", other);
                return Err(ResultCode::FeatureUnsupported);
            }
        };

        stream.play().map_err(|e| {
            error!("Failed to start stream: {}", e);
            ResultCode::ResourceError
        })?;
        self.stream = Some(stream);
        info!("Audio stream started");
        Ok(())
    }

    fn build<T>(&self, mut renderer: Renderer) -> SlResult<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let shared = Arc::clone(&renderer.shared);
        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| renderer.render(data),
                move |err| {
                    error!("Audio stream error: {}", err);
                    shared.report_stream_error();
                },
                None,
            )
            .map_err(|e| {
                error!("Failed to build stream: {}", e);
                ResultCode::ResourceError
            })
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause stream: {}", e);
            }
            info!("Audio stream stopped");
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
