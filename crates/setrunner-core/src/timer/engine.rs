//! Timer engine implementation.
//!
//! The timer engine is a tick-driven state machine. It does not own a clock
//! or a thread: something else (normally [`SessionRunner`](super::SessionRunner))
//! calls `tick()` once per second, and the engine advances by exactly one
//! second each time.
//!
//! ## State Transitions
//!
//! ```text
//! RunningStep -> RunningRest -> RunningStep -> ... -> Finished
//!      \______ Paused (either running state) ______/
//! any non-finished state -> Abandoned (abort)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let (mut engine, _started) = TimerEngine::start(config, tones);
//! // Once per second:
//! if let Some(event) = engine.tick() { /* publish */ }
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::config::{CounterType, SessionConfig};
use super::tone::{Tone, ToneEmitter};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    RunningStep,
    RunningRest,
    Paused,
    Finished,
    /// Ended by `abort()` before finishing.
    Abandoned,
}

/// Progress of one run. Only the engine's tick handler mutates it; everyone
/// else receives copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRunState {
    /// 1-based.
    pub current_set: u32,
    /// 1-based.
    pub current_step: u32,
    /// Step clock. Counts up from 0 or down from `duration` per `CounterType`.
    pub elapsed: u32,
    pub is_resting: bool,
    /// Seconds left in the current rest. Meaningful only while resting.
    pub rest_remaining: u32,
    pub is_paused: bool,
    pub is_finished: bool,
    /// Set to resume on when the current rest ends. Captured when the rest
    /// begins so a late tick cannot advance the set twice.
    pub rest_target: Option<u32>,
}

/// An immutable read of run progress at a point in time.
pub type Snapshot = TimerRunState;

impl TimerRunState {
    fn initial(config: &SessionConfig) -> Self {
        Self {
            current_set: 1,
            current_step: 1,
            elapsed: config.initial_clock(),
            is_resting: false,
            rest_remaining: config.delay,
            is_paused: false,
            is_finished: false,
            rest_target: None,
        }
    }

    /// `(set, step)`, ordered lexicographically.
    pub fn position(&self) -> (u32, u32) {
        (self.current_set, self.current_step)
    }

    /// Clock value to show the user. Count-up shows `elapsed + 1` so a step
    /// never displays 0 as its first second.
    pub fn display_clock(&self, counter_type: CounterType) -> u32 {
        match counter_type {
            CounterType::Down => self.elapsed,
            CounterType::Up => self.elapsed + 1,
        }
    }

    /// Set shown as "next" during a rest.
    pub fn next_set(&self) -> Option<u32> {
        self.is_resting
            .then(|| self.rest_target.unwrap_or(self.current_set + 1))
    }
}

/// Core timer engine.
///
/// Owns the run state for a single session. The caller drives it with
/// `tick()`/`tick_at()`.
pub struct TimerEngine {
    config: SessionConfig,
    state: TimerRunState,
    abandoned: bool,
    /// Identifies the live tick stream. Ticks stamped with any other value
    /// are stale and dropped.
    generation: u64,
    tones: Arc<dyn ToneEmitter>,
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("abandoned", &self.abandoned)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    /// Start a run for an already validated config.
    ///
    /// The engine begins in `RunningStep` at set 1, step 1.
    pub fn start(config: SessionConfig, tones: Arc<dyn ToneEmitter>) -> (Self, Event) {
        let state = TimerRunState::initial(&config);
        let started = Event::SessionStarted {
            total_ticks: config.total_ticks(),
            config: config.clone(),
            at: Utc::now(),
        };
        tracing::info!(
            name = %config.display_name(),
            steps = config.steps,
            duration = config.duration,
            sets = config.sets,
            delay = config.delay,
            counter = %config.counter_type,
            "session started"
        );
        let engine = Self {
            config,
            state,
            abandoned: false,
            generation: 0,
            tones,
        };
        (engine, started)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> TimerPhase {
        if self.abandoned {
            TimerPhase::Abandoned
        } else if self.state.is_finished {
            TimerPhase::Finished
        } else if self.state.is_paused {
            TimerPhase::Paused
        } else if self.state.is_resting {
            TimerPhase::RunningRest
        } else {
            TimerPhase::RunningStep
        }
    }

    /// True once the run has finished or been abandoned.
    pub fn is_over(&self) -> bool {
        self.abandoned || self.state.is_finished
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn pause(&mut self) -> Option<Event> {
        if self.is_over() || self.state.is_paused {
            return None;
        }
        self.state.is_paused = true;
        tracing::debug!(set = self.state.current_set, step = self.state.current_step, "paused");
        Some(Event::Paused {
            snapshot: self.state,
            at: Utc::now(),
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        if self.is_over() || !self.state.is_paused {
            return None;
        }
        self.state.is_paused = false;
        tracing::debug!(set = self.state.current_set, step = self.state.current_step, "resumed");
        Some(Event::Resumed {
            snapshot: self.state,
            at: Utc::now(),
        })
    }

    /// Reset progress to set 1, step 1 regardless of phase, keeping the
    /// pause flag. Any rest in progress is cancelled and every tick already
    /// scheduled for the old generation becomes stale.
    pub fn restart(&mut self) -> Option<Event> {
        if self.abandoned {
            return None;
        }
        let is_paused = self.state.is_paused;
        self.state = TimerRunState {
            is_paused,
            ..TimerRunState::initial(&self.config)
        };
        self.generation += 1;
        tracing::info!(generation = self.generation, "session restarted");
        Some(Event::Restarted { at: Utc::now() })
    }

    /// End the run without finishing it. Returns the abandonment event with
    /// the last snapshot, or `None` if the run is already over.
    pub fn abort(&mut self) -> Option<Event> {
        if self.is_over() {
            return None;
        }
        self.abandoned = true;
        self.generation += 1;
        tracing::info!(
            set = self.state.current_set,
            step = self.state.current_step,
            resting = self.state.is_resting,
            "session abandoned"
        );
        Some(Event::SessionAbandoned {
            config: self.config.clone(),
            snapshot: self.state,
            at: Utc::now(),
        })
    }

    /// Tick on behalf of the current generation.
    pub fn tick(&mut self) -> Option<Event> {
        self.tick_at(self.generation)
    }

    /// Advance one second.
    ///
    /// Returns `None` when the tick changed nothing: it was stale, or the run
    /// is paused, finished or abandoned. Otherwise returns the transition
    /// event, or `Progress` for a plain clock movement.
    pub fn tick_at(&mut self, generation: u64) -> Option<Event> {
        if generation != self.generation {
            tracing::debug!(
                stale = generation,
                current = self.generation,
                "dropping stale tick"
            );
            return None;
        }
        if self.is_over() || self.state.is_paused {
            return None;
        }

        // Decide against the state as it was when the tick began.
        let captured = self.state;
        let event = if captured.is_resting {
            self.tick_rest(captured)
        } else {
            self.tick_step(captured)
        };

        debug_assert!(
            self.state.position() >= captured.position(),
            "run position went backwards: {:?} -> {:?}",
            captured.position(),
            self.state.position()
        );
        Some(event)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn tick_rest(&mut self, captured: TimerRunState) -> Event {
        if captured.rest_remaining > 1 {
            self.state.rest_remaining = captured.rest_remaining - 1;
            return self.progress();
        }

        self.tones.emit(Tone::STEP);
        let target = captured
            .rest_target
            .unwrap_or(captured.current_set + 1)
            .min(self.config.sets);
        self.state = TimerRunState {
            current_set: target,
            current_step: 1,
            elapsed: self.config.initial_clock(),
            is_resting: false,
            rest_remaining: self.config.delay,
            rest_target: None,
            ..captured
        };
        tracing::debug!(set = target, "rest over");
        Event::RestEnded {
            set: target,
            at: Utc::now(),
        }
    }

    fn tick_step(&mut self, captured: TimerRunState) -> Event {
        let step_complete = match self.config.counter_type {
            CounterType::Down => captured.elapsed <= 1,
            CounterType::Up => captured.elapsed + 1 >= self.config.duration,
        };

        if !step_complete {
            self.state.elapsed = match self.config.counter_type {
                CounterType::Down => captured.elapsed - 1,
                CounterType::Up => captured.elapsed + 1,
            };
            return self.progress();
        }

        let last_step = captured.current_step == self.config.steps;
        let last_set = captured.current_set == self.config.sets;

        if last_step && last_set {
            self.tones.emit(Tone::FINISH);
            self.state.is_finished = true;
            tracing::info!(name = %self.config.display_name(), "session completed");
            return Event::SessionCompleted {
                config: self.config.clone(),
                at: Utc::now(),
            };
        }

        self.tones.emit(Tone::STEP);

        if last_step {
            let next_set = captured.current_set + 1;
            self.state.rest_target = Some(next_set);
            self.state.is_resting = true;
            self.state.rest_remaining = self.config.delay;
            tracing::debug!(after_set = captured.current_set, next_set, "rest started");
            return Event::RestStarted {
                after_set: captured.current_set,
                next_set,
                rest_secs: self.config.delay,
                at: Utc::now(),
            };
        }

        self.state.current_step = captured.current_step + 1;
        self.state.elapsed = self.config.initial_clock();
        tracing::debug!(
            set = captured.current_set,
            step = self.state.current_step,
            "step advanced"
        );
        Event::StepAdvanced {
            set: captured.current_set,
            step: self.state.current_step,
            at: Utc::now(),
        }
    }

    fn progress(&self) -> Event {
        Event::Progress {
            snapshot: self.state,
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::tone::RecordingEmitter;

    fn config(steps: u32, duration: u32, sets: u32, delay: u32, counter_type: CounterType) -> SessionConfig {
        SessionConfig {
            name: "test".into(),
            steps,
            duration,
            sets,
            delay,
            counter_type,
        }
    }

    fn engine(config: SessionConfig) -> (TimerEngine, Arc<RecordingEmitter>) {
        let tones = Arc::new(RecordingEmitter::new());
        let (engine, _) = TimerEngine::start(config, tones.clone());
        (engine, tones)
    }

    /// What a display would show after each tick: the rest countdown while
    /// resting, otherwise the step clock.
    fn shown(engine: &TimerEngine) -> (u32, u32, bool, u32) {
        let s = engine.snapshot();
        let clock = if s.is_resting { s.rest_remaining } else { s.elapsed };
        (s.current_set, s.current_step, s.is_resting, clock)
    }

    #[test]
    fn starts_at_first_step_with_counter_specific_clock() {
        let (down, _) = engine(config(3, 10, 2, 5, CounterType::Down));
        assert_eq!(down.snapshot().elapsed, 10);
        assert_eq!(down.phase(), TimerPhase::RunningStep);

        let (up, _) = engine(config(3, 10, 2, 5, CounterType::Up));
        assert_eq!(up.snapshot().elapsed, 0);
        assert_eq!(up.snapshot().position(), (1, 1));
        assert_eq!(up.snapshot().rest_remaining, 5);
    }

    #[test]
    fn countdown_example_runs_fourteen_ticks() {
        let (mut engine, tones) = engine(config(2, 3, 2, 2, CounterType::Down));
        let mut trace = Vec::new();
        let mut completions = 0;
        for _ in 0..14 {
            if let Some(Event::SessionCompleted { .. }) = engine.tick() {
                completions += 1;
            }
            trace.push(shown(&engine));
        }

        assert_eq!(
            &trace[..13],
            &[
                (1, 1, false, 2),
                (1, 1, false, 1),
                (1, 2, false, 3),
                (1, 2, false, 2),
                (1, 2, false, 1),
                (1, 2, true, 2),
                (1, 2, true, 1),
                (2, 1, false, 3),
                (2, 1, false, 2),
                (2, 1, false, 1),
                (2, 2, false, 3),
                (2, 2, false, 2),
                (2, 2, false, 1),
            ]
        );
        assert_eq!(engine.phase(), TimerPhase::Finished);
        assert_eq!(completions, 1);
        assert_eq!(tones.count(Tone::STEP), 4);
        assert_eq!(tones.count(Tone::FINISH), 1);
    }

    #[test]
    fn count_up_completes_on_tick_reaching_duration_minus_one() {
        let (mut engine, _) = engine(config(2, 3, 1, 1, CounterType::Up));
        engine.tick();
        assert_eq!(engine.snapshot().elapsed, 1);
        assert_eq!(engine.snapshot().display_clock(CounterType::Up), 2);
        engine.tick();
        assert_eq!(engine.snapshot().elapsed, 2);
        assert!(matches!(engine.tick(), Some(Event::StepAdvanced { set: 1, step: 2, .. })));
        assert_eq!(engine.snapshot().elapsed, 0);
    }

    #[test]
    fn one_second_steps_complete_every_tick() {
        for counter in [CounterType::Up, CounterType::Down] {
            let (mut engine, _) = engine(config(3, 1, 1, 1, counter));
            assert!(matches!(engine.tick(), Some(Event::StepAdvanced { step: 2, .. })));
            assert!(matches!(engine.tick(), Some(Event::StepAdvanced { step: 3, .. })));
            assert!(matches!(engine.tick(), Some(Event::SessionCompleted { .. })));
        }
    }

    #[test]
    fn rest_captures_target_and_resumes_on_next_set() {
        let (mut engine, _) = engine(config(1, 1, 3, 2, CounterType::Down));
        match engine.tick() {
            Some(Event::RestStarted {
                after_set,
                next_set,
                rest_secs,
                ..
            }) => {
                assert_eq!((after_set, next_set, rest_secs), (1, 2, 2));
            }
            other => panic!("expected RestStarted, got {other:?}"),
        }
        assert_eq!(engine.snapshot().rest_target, Some(2));
        assert_eq!(engine.snapshot().next_set(), Some(2));
        assert_eq!(engine.phase(), TimerPhase::RunningRest);

        engine.tick();
        assert_eq!(engine.snapshot().rest_remaining, 1);
        assert!(matches!(engine.tick(), Some(Event::RestEnded { set: 2, .. })));
        let snap = engine.snapshot();
        assert_eq!(snap.position(), (2, 1));
        assert_eq!(snap.rest_target, None);
        assert_eq!(snap.rest_remaining, 2);
        assert!(!snap.is_resting);
    }

    #[test]
    fn no_rest_after_final_set() {
        let (mut engine, _) = engine(config(1, 2, 2, 3, CounterType::Down));
        let mut ticks = 0;
        while !engine.is_over() {
            engine.tick();
            ticks += 1;
        }
        assert_eq!(ticks, 2 + 3 + 2);
        assert!(!engine.snapshot().is_resting);
    }

    #[test]
    fn paused_ticks_change_nothing() {
        let (mut engine, tones) = engine(config(2, 5, 2, 3, CounterType::Down));
        engine.tick();
        engine.tick();
        assert!(engine.pause().is_some());
        let before = engine.snapshot();
        for _ in 0..20 {
            assert!(engine.tick().is_none());
        }
        assert_eq!(engine.snapshot(), before);
        assert!(tones.tones().is_empty());

        assert!(engine.resume().is_some());
        let resumed = engine.snapshot();
        assert_eq!(resumed, TimerRunState { is_paused: false, ..before });
        engine.tick();
        assert_eq!(engine.snapshot().elapsed, before.elapsed - 1);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let (mut engine, _) = engine(config(2, 5, 2, 3, CounterType::Down));
        assert!(engine.resume().is_none());
        assert!(engine.pause().is_some());
        assert!(engine.pause().is_none());
        assert_eq!(engine.phase(), TimerPhase::Paused);
        assert!(engine.resume().is_some());
        assert!(engine.resume().is_none());
    }

    #[test]
    fn restart_during_rest_resets_and_keeps_pause_flag() {
        let (mut engine, _) = engine(config(1, 1, 3, 5, CounterType::Up));
        engine.tick();
        engine.tick();
        assert!(engine.snapshot().is_resting);
        engine.pause();

        let generation = engine.generation();
        assert!(matches!(engine.restart(), Some(Event::Restarted { .. })));
        let snap = engine.snapshot();
        assert_eq!(snap.position(), (1, 1));
        assert!(!snap.is_resting);
        assert!(!snap.is_finished);
        assert_eq!(snap.rest_target, None);
        assert_eq!(snap.rest_remaining, 5);
        assert!(snap.is_paused);
        assert_eq!(engine.generation(), generation + 1);
    }

    #[test]
    fn restart_after_finish_starts_a_new_run() {
        let (mut engine, tones) = engine(config(1, 1, 1, 1, CounterType::Down));
        assert!(matches!(engine.tick(), Some(Event::SessionCompleted { .. })));
        assert!(engine.tick().is_none());
        engine.restart();
        assert_eq!(engine.phase(), TimerPhase::RunningStep);
        assert!(matches!(engine.tick(), Some(Event::SessionCompleted { .. })));
        assert_eq!(tones.count(Tone::FINISH), 2);
    }

    #[test]
    fn stale_generation_ticks_are_dropped() {
        let (mut engine, _) = engine(config(2, 5, 2, 3, CounterType::Down));
        let old = engine.generation();
        engine.tick_at(old);
        engine.restart();
        let before = engine.snapshot();
        assert!(engine.tick_at(old).is_none());
        assert_eq!(engine.snapshot(), before);
        assert!(engine.tick_at(engine.generation()).is_some());
    }

    #[test]
    fn abort_reports_last_snapshot_once() {
        let (mut engine, _) = engine(config(5, 2, 3, 2, CounterType::Down));
        engine.tick();
        match engine.abort() {
            Some(Event::SessionAbandoned { snapshot, config, .. }) => {
                assert_eq!(snapshot.position(), (1, 1));
                assert_eq!(config.steps, 5);
            }
            other => panic!("expected SessionAbandoned, got {other:?}"),
        }
        assert_eq!(engine.phase(), TimerPhase::Abandoned);
        assert!(engine.abort().is_none());
        assert!(engine.tick().is_none());
        assert!(engine.restart().is_none());
        assert!(engine.pause().is_none());
    }

    #[test]
    fn abort_after_finish_is_a_no_op() {
        let (mut engine, _) = engine(config(1, 1, 1, 1, CounterType::Up));
        engine.tick();
        assert!(engine.abort().is_none());
        assert_eq!(engine.phase(), TimerPhase::Finished);
    }

    #[test]
    fn next_set_only_while_resting() {
        let (engine, _) = engine(config(1, 1, 2, 1, CounterType::Up));
        assert_eq!(engine.snapshot().next_set(), None);
    }
}
