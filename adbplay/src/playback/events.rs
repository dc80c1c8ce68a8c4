//! Asynchronous event channels: object, play and prefetch
//!
//! Subsystem callbacks run on subsystem threads. They only push an [`Event`]
//! onto the session's queue; the main task handles events at its suspension
//! points, so handlers run without locks and an underflow abort surfaces as an
//! ordinary error.

use super::lifecycle::ResourceKind;
use super::session::Session;
use crate::error::{Error, Result};
use crate::subsystem::{
    AudioSubsystem, InterfaceId, ObjectEvent, Permille, PlayEvents, PlayItf, PrefetchEvents,
    PrefetchStatus, PrefetchStatusItf, ResultCode,
};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Notification delivered by a subsystem callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Object {
        tag: String,
        event: ObjectEvent,
        result: ResultCode,
    },
    Play {
        events: PlayEvents,
    },
    Prefetch {
        events: PrefetchEvents,
    },
}

/// Single-consumer queue between subsystem threads and the main task
#[derive(Debug)]
pub struct EventQueue {
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Producer side handed to callbacks
    pub fn sender(&self) -> UnboundedSender<Event> {
        self.tx.clone()
    }

    fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// A prefetch event completed with a fresh fill level and status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchReport {
    pub fill_level: Permille,
    pub status: PrefetchStatus,
    pub events: PrefetchEvents,
}

/// Whether a prefetch report means the content can no longer be read.
///
/// All of: both mask bits set, fill level exactly 0, status UNDERFLOW.
pub fn underflow_abort(report: &PrefetchReport) -> bool {
    report
        .events
        .contains(PrefetchEvents::FILL_LEVEL_CHANGE | PrefetchEvents::STATUS_CHANGE)
        && report.fill_level == 0
        && report.status == PrefetchStatus::Underflow
}

/// Every transport notification
pub fn all_play_events() -> PlayEvents {
    PlayEvents::HEAD_AT_END
        | PlayEvents::HEAD_AT_MARKER
        | PlayEvents::HEAD_AT_NEW_POS
        | PlayEvents::HEAD_MOVING
        | PlayEvents::HEAD_STALLED
}

/// Every buffering notification
pub fn all_prefetch_events() -> PrefetchEvents {
    PrefetchEvents::FILL_LEVEL_CHANGE | PrefetchEvents::STATUS_CHANGE
}

impl<'a, S: AudioSubsystem + ?Sized> Session<'a, S> {
    /// Register the object callback on `kind`; events carry `tag`
    pub fn enable_object_events(&mut self, kind: ResourceKind, tag: &str) -> Result<()> {
        let handle = match self.resource(kind) {
            Some(r) if r.is_alive() => r.handle(),
            _ => {
                return Err(Error::InvalidState(format!(
                    "{} is not alive, cannot register callback",
                    kind
                )))
            }
        };

        let tx = self.events.sender();
        let tag = tag.to_string();
        let sl = self.sl;
        self.reporter.invoke(&format!("{}.register_callback", kind), || {
            sl.register_object_callback(
                handle,
                Box::new(move |event, result| {
                    let _ = tx.send(Event::Object {
                        tag: tag.clone(),
                        event,
                        result,
                    });
                }),
            )
        })
    }

    /// Acquire the buffering-status interface and subscribe to both prefetch events
    pub fn enable_prefetch_events(&mut self) -> Result<PrefetchStatusItf> {
        let itf = PrefetchStatusItf(
            self.get_interface(ResourceKind::Player, InterfaceId::PrefetchStatus)?,
        );
        self.prefetch_itf = Some(itf);

        let tx = self.events.sender();
        let sl = self.sl;
        self.reporter.invoke("prefetch.register_callback", || {
            sl.register_prefetch_callback(
                itf,
                Box::new(move |events| {
                    let _ = tx.send(Event::Prefetch { events });
                }),
            )
        })?;
        self.reporter.invoke("prefetch.set_callback_events_mask", || {
            sl.set_prefetch_events_mask(itf, all_prefetch_events())
        })?;
        Ok(itf)
    }

    /// Acquire and keep the transport interface
    pub fn acquire_play_interface(&mut self) -> Result<PlayItf> {
        let itf = PlayItf(self.get_interface(ResourceKind::Player, InterfaceId::Play)?);
        self.play_itf = Some(itf);
        Ok(itf)
    }

    /// Subscribe to every transport event on the acquired play interface
    pub fn enable_play_events(&mut self) -> Result<()> {
        let itf = self.play_interface()?;
        let tx = self.events.sender();
        let sl = self.sl;
        self.reporter.invoke("play.register_callback", || {
            sl.register_play_callback(
                itf,
                Box::new(move |events| {
                    let _ = tx.send(Event::Play { events });
                }),
            )
        })?;
        self.reporter.invoke("play.set_callback_events_mask", || {
            sl.set_play_events_mask(itf, all_play_events())
        })
    }

    pub(crate) fn play_interface(&self) -> Result<PlayItf> {
        self.play_itf
            .ok_or_else(|| Error::InvalidState("play interface not acquired".to_string()))
    }

    fn prefetch_interface(&self) -> Result<PrefetchStatusItf> {
        self.prefetch_itf
            .ok_or_else(|| Error::InvalidState("prefetch interface not acquired".to_string()))
    }

    /// Complete a prefetch event by re-querying the buffering-status interface
    pub fn prefetch_report(&self, events: PrefetchEvents) -> Result<PrefetchReport> {
        let itf = self.prefetch_interface()?;
        let sl = self.sl;
        let fill_level = self
            .reporter
            .invoke("prefetch.get_fill_level", || sl.get_fill_level(itf))?;
        let status = self
            .reporter
            .invoke("prefetch.get_prefetch_status", || sl.get_prefetch_status(itf))?;
        Ok(PrefetchReport {
            fill_level,
            status,
            events,
        })
    }

    /// Handle one event.
    ///
    /// # Errors
    /// [`Error::Underflow`] when a prefetch event reports an unrecoverable underflow.
    pub fn handle_event(&self, event: Event) -> Result<()> {
        let log = self.reporter.log();
        match event {
            Event::Object { tag, event, result } => {
                if event == ObjectEvent::RUNTIME_ERROR {
                    warn!(resource = %tag, result = %result, "Runtime error reported");
                }
                log.line(format!("OBJECT[{}]: event={} result={}", tag, event, result));
            }
            Event::Play { events } => {
                log.line(format!("PLAY: event={}", events.bits()));
            }
            Event::Prefetch { events } => {
                let report = self.prefetch_report(events)?;
                log.line(format!(
                    "PREFETCH: fillLevel={}, prefetchStatus={}, event={}",
                    report.fill_level,
                    report.status.raw(),
                    report.events.bits()
                ));

                if underflow_abort(&report) {
                    self.reporter.aborted(PrefetchStatus::Underflow.label());
                    return Err(Error::Underflow {
                        fill_level: report.fill_level,
                        status: report.status,
                    });
                }
            }
        }
        Ok(())
    }

    /// Handle everything already queued without waiting
    pub fn drain_events(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(event) = self.events.try_next() {
            self.handle_event(event)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Suspend for `period`, handling events as they arrive
    pub async fn wait_for_events(&mut self, period: Duration) -> Result<()> {
        let deadline = Instant::now() + period;
        loop {
            let next = timeout_at(deadline, self.events.rx.recv()).await;
            match next {
                Ok(Some(event)) => self.handle_event(event)?,
                Ok(None) => {
                    debug!("Event queue closed");
                    tokio::time::sleep_until(deadline).await;
                    return Ok(());
                }
                Err(_) => return Ok(()),
            }
        }
    }
}
