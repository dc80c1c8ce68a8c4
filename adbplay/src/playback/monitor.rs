//! Playback monitor: start the transport and poll until it stops

use super::session::Session;
use crate::error::Result;
use crate::subsystem::{AudioSubsystem, PlayItf, PlayState};
use std::time::Duration;
use tracing::{debug, info};

impl<'a, S: AudioSubsystem + ?Sized> Session<'a, S> {
    pub fn play_state(&self, play: PlayItf) -> Result<PlayState> {
        let sl = self.sl;
        self.reporter
            .invoke("play.get_play_state", || sl.get_play_state(play))
    }

    pub fn set_play_state(&self, play: PlayItf, state: PlayState) -> Result<()> {
        let sl = self.sl;
        self.reporter
            .invoke("play.set_play_state", || sl.set_play_state(play, state))
    }

    /// Command Playing, then poll every `poll_interval` until Stopped is observed.
    ///
    /// Queued events are handled while waiting between polls. There is no
    /// timeout: a player that never stops keeps this future pending.
    ///
    /// Returns the number of polls made after the transport was started.
    pub async fn run_until_stopped(&mut self, poll_interval: Duration) -> Result<u64> {
        let play = self.play_interface()?;
        let log = self.reporter.log().clone();

        let before = self.play_state(play)?;
        log.line(format!("PlayState[before]={}", before));

        self.set_play_state(play, PlayState::Playing)?;

        let mut state = self.play_state(play)?;
        log.line(format!("PlayState[after]={}", state));
        info!("Playback started");

        let mut polls = 0u64;
        while state != PlayState::Stopped {
            state = self.play_state(play)?;
            polls += 1;
            log.line(format!("PlayState={}", state));

            if state != PlayState::Stopped {
                self.wait_for_events(poll_interval).await?;
            }
        }

        debug!(polls, "Transport stopped");
        Ok(polls)
    }
}
