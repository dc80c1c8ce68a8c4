//! Playback session: owns every handle of one run and drives the sequence
//!
//! create engine → realize → engine interface → create output mix → realize
//! → create player → object events → realize → prefetch events → play
//! interface → play events → monitor → teardown

use super::events::EventQueue;
use super::lifecycle::{Resource, ResourceKind};
use super::reporter::Reporter;
use crate::config::Settings;
use crate::error::Result;
use crate::logging::LogStream;
use crate::subsystem::interfaces::{engine_request, output_mix_request, player_request};
use crate::subsystem::{
    AudioSubsystem, DataSource, EngineItf, EngineOptions, PlayItf, PrefetchStatusItf,
};
use std::path::Path;
use tracing::info;

/// Context for one playback run
pub struct Session<'a, S: AudioSubsystem + ?Sized> {
    pub(crate) sl: &'a S,
    pub(crate) reporter: Reporter,
    /// Creation order
    pub(crate) resources: Vec<Resource>,
    pub(crate) engine_itf: Option<EngineItf>,
    pub(crate) play_itf: Option<PlayItf>,
    pub(crate) prefetch_itf: Option<PrefetchStatusItf>,
    pub(crate) events: EventQueue,
}

impl<'a, S: AudioSubsystem + ?Sized> Session<'a, S> {
    pub fn new(sl: &'a S, log: LogStream) -> Self {
        Self {
            sl,
            reporter: Reporter::new(log),
            resources: Vec::new(),
            engine_itf: None,
            play_itf: None,
            prefetch_itf: None,
            events: EventQueue::new(),
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn log(&self) -> &LogStream {
        self.reporter.log()
    }

    pub fn engine_itf(&self) -> Option<EngineItf> {
        self.engine_itf
    }

    pub fn play_itf(&self) -> Option<PlayItf> {
        self.play_itf
    }

    pub fn prefetch_itf(&self) -> Option<PrefetchStatusItf> {
        self.prefetch_itf
    }

    /// Build engine, output mix and player, and subscribe to all three event channels
    pub fn open(&mut self, path: &Path) -> Result<()> {
        self.create_engine(&EngineOptions { thread_safe: true }, &engine_request())?;
        self.realize(ResourceKind::Engine)?;
        self.acquire_engine_interface()?;

        self.create_output_mix(&output_mix_request())?;
        self.realize(ResourceKind::OutputMix)?;

        self.create_audio_player(&DataSource::file(path), &player_request())?;
        self.enable_object_events(ResourceKind::Player, ResourceKind::Player.tag())?;
        self.realize(ResourceKind::Player)?;
        self.enable_prefetch_events()?;
        self.acquire_play_interface()?;
        self.enable_play_events()?;
        Ok(())
    }
}

/// Play `path` to completion.
///
/// Any error is fatal and leaves the resources as they are; teardown only
/// happens after the transport reached Stopped.
pub async fn play_file<S: AudioSubsystem + ?Sized>(
    sl: &S,
    path: &Path,
    settings: &Settings,
    log: LogStream,
) -> Result<u64> {
    log.line(format!("Playing audio file: {}", path.display()));

    let mut session = Session::new(sl, log);
    session.open(path)?;

    let polls = session.run_until_stopped(settings.poll_interval()).await?;
    session.drain_events()?;
    session.teardown()?;

    info!(polls, "Playback finished");
    Ok(polls)
}
