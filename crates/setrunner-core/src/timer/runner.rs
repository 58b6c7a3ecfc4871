//! Async driver for [`TimerEngine`].
//!
//! One actor task owns the engine and is its only writer. Control messages
//! and ticks arrive on channels that only the actor drains, so mutations are
//! serialized. The tick source is a separate task feeding a capacity-1
//! channel, which keeps at most one tick in flight. Pause stops the tick
//! task and resume starts a new one. Restart and abort also replace it and
//! move the engine to a new generation, so a tick already queued by the old
//! stream is ignored by the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::config::SessionConfig;
use super::engine::{Snapshot, TimerEngine};
use super::tone::ToneEmitter;
use crate::error::Result;
use crate::events::Event;

#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    /// Wall-clock period of one engine tick (one logical second).
    pub tick: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
        }
    }
}

impl RunnerOptions {
    pub fn with_tick_ms(tick_ms: u64) -> Self {
        Self {
            tick: Duration::from_millis(tick_ms.max(1)),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        config: SessionConfig,
    },
    Abandoned {
        config: SessionConfig,
        snapshot: Snapshot,
    },
    /// Every control handle was dropped before the run ended. Nothing is
    /// reported or recorded for such a run.
    Detached {
        snapshot: Snapshot,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Pause,
    Resume,
    TogglePause,
    Restart,
    Abort,
}

/// Cloneable control surface for a running session.
#[derive(Debug, Clone)]
pub struct SessionControl {
    tx: mpsc::UnboundedSender<Control>,
    snapshots: watch::Receiver<Snapshot>,
}

impl SessionControl {
    pub fn pause(&self) {
        self.send(Control::Pause);
    }

    pub fn resume(&self) {
        self.send(Control::Resume);
    }

    pub fn toggle_pause(&self) {
        self.send(Control::TogglePause);
    }

    pub fn restart(&self) {
        self.send(Control::Restart);
    }

    /// Ask the run to end as abandoned. A run that already finished is left
    /// as completed.
    pub fn abort(&self) {
        self.send(Control::Abort);
    }

    /// Latest published snapshot. Never blocks and never mutates the run.
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshots.borrow()
    }

    /// Wait until a snapshot newer than the last one seen is published.
    /// Returns `false` once the run has ended.
    pub async fn changed(&mut self) -> bool {
        self.snapshots.changed().await.is_ok()
    }

    fn send(&self, control: Control) {
        if self.tx.send(control).is_err() {
            tracing::debug!(?control, "session already ended, control ignored");
        }
    }
}

/// A running session: its control surface, its event stream and the actor
/// task.
pub struct SessionHandle {
    control: SessionControl,
    events: mpsc::UnboundedReceiver<Event>,
    task: JoinHandle<RunOutcome>,
}

impl SessionHandle {
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.control.snapshot()
    }

    /// Next event from the run, or `None` once the run has ended and every
    /// event has been delivered.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Stop delivering events. Events already queued can still be read;
    /// later ones are dropped instead of buffered. For callers that only
    /// poll snapshots.
    pub fn ignore_events(&mut self) {
        self.events.close();
    }

    /// Wait for the run to end.
    ///
    /// Undelivered events are discarded; drain `next_event` first if they
    /// matter.
    ///
    /// # Errors
    /// Returns an error if the actor task panicked or was cancelled.
    pub async fn wait(self) -> Result<RunOutcome> {
        let SessionHandle { control, task, .. } = self;
        // The actor stops when it sees the control channel close; keep ours
        // alive until it is done on its own.
        let outcome = task.await?;
        drop(control);
        Ok(outcome)
    }
}

pub struct SessionRunner;

impl SessionRunner {
    /// Start a session on the current tokio runtime.
    ///
    /// The `SessionStarted` event and an initial `Progress` are the first
    /// two events delivered. The event channel is unbounded: drain it with
    /// [`SessionHandle::next_event`] or call [`SessionHandle::ignore_events`].
    pub fn spawn(
        config: SessionConfig,
        tones: Arc<dyn ToneEmitter>,
        options: RunnerOptions,
    ) -> SessionHandle {
        let (engine, started) = TimerEngine::start(config, tones);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());

        let actor = Actor {
            engine,
            period: options.tick,
            events: events_tx,
            snapshots: snapshot_tx,
        };
        actor.emit(started);
        actor.emit_progress();

        let task = tokio::spawn(actor.run(control_rx));
        SessionHandle {
            control: SessionControl {
                tx: control_tx,
                snapshots: snapshot_rx,
            },
            events: events_rx,
            task,
        }
    }
}

struct Actor {
    engine: TimerEngine,
    period: Duration,
    events: mpsc::UnboundedSender<Event>,
    snapshots: watch::Sender<Snapshot>,
}

struct Ticker {
    task: JoinHandle<()>,
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Actor {
    async fn run(mut self, mut control_rx: mpsc::UnboundedReceiver<Control>) -> RunOutcome {
        let (tick_tx, mut tick_rx) = mpsc::channel::<u64>(1);
        let mut ticker = Some(self.spawn_ticker(&tick_tx));

        loop {
            tokio::select! {
                biased;
                control = control_rx.recv() => {
                    let Some(control) = control else {
                        tracing::debug!("all session controls dropped; run detached");
                        return RunOutcome::Detached { snapshot: self.engine.snapshot() };
                    };
                    if let Some(outcome) = self.apply(control, &mut ticker, &tick_tx) {
                        return outcome;
                    }
                }
                Some(generation) = tick_rx.recv() => {
                    if let Some(event) = self.engine.tick_at(generation) {
                        let completed = matches!(event, Event::SessionCompleted { .. });
                        let is_progress = matches!(event, Event::Progress { .. });
                        self.publish_snapshot();
                        if !is_progress {
                            self.emit_progress();
                        }
                        self.emit(event);
                        if completed {
                            return RunOutcome::Completed { config: self.engine.config().clone() };
                        }
                    }
                }
            }
        }
    }

    fn apply(
        &mut self,
        control: Control,
        ticker: &mut Option<Ticker>,
        tick_tx: &mpsc::Sender<u64>,
    ) -> Option<RunOutcome> {
        match control {
            Control::Pause => self.pause(ticker),
            Control::Resume => self.resume(ticker, tick_tx),
            Control::TogglePause => {
                if self.engine.snapshot().is_paused {
                    self.resume(ticker, tick_tx);
                } else {
                    self.pause(ticker);
                }
            }
            Control::Restart => {
                if let Some(event) = self.engine.restart() {
                    *ticker = if self.engine.snapshot().is_paused {
                        None
                    } else {
                        Some(self.spawn_ticker(tick_tx))
                    };
                    self.after_change(event);
                }
            }
            Control::Abort => {
                *ticker = None;
                let snapshot = self.engine.snapshot();
                return match self.engine.abort() {
                    Some(event) => {
                        self.emit(event);
                        Some(RunOutcome::Abandoned {
                            config: self.engine.config().clone(),
                            snapshot,
                        })
                    }
                    None => Some(RunOutcome::Detached { snapshot }),
                };
            }
        }
        None
    }

    fn pause(&mut self, ticker: &mut Option<Ticker>) {
        if let Some(event) = self.engine.pause() {
            // The clock stops entirely. A tick already queued is drained
            // while paused and ignored by the engine.
            *ticker = None;
            self.after_change(event);
        }
    }

    fn resume(&mut self, ticker: &mut Option<Ticker>, tick_tx: &mpsc::Sender<u64>) {
        if let Some(event) = self.engine.resume() {
            // A fresh stream, so the first tick after resuming is a full
            // period away.
            *ticker = Some(self.spawn_ticker(tick_tx));
            self.after_change(event);
        }
    }

    fn spawn_ticker(&self, tick_tx: &mpsc::Sender<u64>) -> Ticker {
        let generation = self.engine.generation();
        let period = self.period;
        let tx = tick_tx.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(generation).await.is_err() {
                    break;
                }
            }
        });
        tracing::trace!(generation, "tick stream started");
        Ticker { task }
    }

    fn after_change(&self, event: Event) {
        self.publish_snapshot();
        self.emit_progress();
        self.emit(event);
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(self.engine.snapshot());
    }

    fn emit(&self, event: Event) {
        // A caller that stopped listening still gets the outcome from wait().
        let _ = self.events.send(event);
    }

    fn emit_progress(&self) {
        self.emit(Event::Progress {
            snapshot: self.engine.snapshot(),
            at: chrono::Utc::now(),
        });
    }
}
