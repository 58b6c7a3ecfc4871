//! Property tests for the timer engine.
//!
//! Every property runs over small random setups in both counter directions.

use std::sync::Arc;

use proptest::prelude::*;
use setrunner_core::timer::{ticks_elapsed, RecordingEmitter, SilentEmitter};
use setrunner_core::{
    CellState, CounterType, Event, ProgressGrid, SessionConfig, TimerEngine, TimerPhase, Tone,
};

fn arb_config() -> impl Strategy<Value = SessionConfig> {
    (
        1u32..=6,
        1u32..=5,
        1u32..=4,
        1u32..=4,
        prop_oneof![Just(CounterType::Up), Just(CounterType::Down)],
    )
        .prop_map(|(steps, duration, sets, delay, counter_type)| SessionConfig {
            name: String::new(),
            steps,
            duration,
            sets,
            delay,
            counter_type,
        })
}

fn fresh(config: &SessionConfig) -> TimerEngine {
    TimerEngine::start(config.clone(), Arc::new(SilentEmitter)).0
}

proptest! {
    #[test]
    fn finishes_after_exactly_total_ticks(config in arb_config()) {
        let tones = Arc::new(RecordingEmitter::new());
        let (mut engine, _) = TimerEngine::start(config.clone(), tones.clone());
        let total = config.total_ticks();
        let mut completions = 0;

        for n in 1..=total {
            prop_assert!(!engine.snapshot().is_finished, "finished early at tick {}", n);
            if let Some(Event::SessionCompleted { .. }) = engine.tick() {
                completions += 1;
            }
            prop_assert_eq!(ticks_elapsed(&config, &engine.snapshot()), n);
        }

        prop_assert_eq!(completions, 1);
        prop_assert_eq!(engine.phase(), TimerPhase::Finished);
        prop_assert!(engine.tick().is_none());

        let cells = (config.steps * config.sets) as usize;
        let rests = (config.sets - 1) as usize;
        prop_assert_eq!(tones.count(Tone::STEP), cells - 1 + rests);
        prop_assert_eq!(tones.count(Tone::FINISH), 1);
    }

    #[test]
    fn position_never_goes_backwards(config in arb_config()) {
        let mut engine = fresh(&config);
        let mut last = engine.snapshot().position();
        while !engine.is_over() {
            engine.tick();
            let snap = engine.snapshot();
            prop_assert!(snap.position() >= last);
            prop_assert!(snap.current_set >= 1 && snap.current_set <= config.sets);
            prop_assert!(snap.current_step >= 1 && snap.current_step <= config.steps);
            prop_assert!(snap.elapsed <= config.duration);
            last = snap.position();
        }
    }

    #[test]
    fn paused_ticks_cost_nothing(config in arb_config(), at in 0u64..40, idle in 1usize..20) {
        let total = config.total_ticks();
        let at = at % total;
        let mut engine = fresh(&config);
        for _ in 0..at {
            engine.tick();
        }

        prop_assert!(engine.pause().is_some());
        let frozen = engine.snapshot();
        for _ in 0..idle {
            prop_assert!(engine.tick().is_none());
        }
        prop_assert_eq!(engine.snapshot(), frozen);

        engine.resume();
        let mut remaining = 0;
        while !engine.is_over() {
            engine.tick();
            remaining += 1;
        }
        prop_assert_eq!(remaining, total - at);
    }

    #[test]
    fn restart_always_returns_to_the_first_step(config in arb_config(), at in 0u64..60) {
        let at = at % (config.total_ticks() + 1);
        let mut engine = fresh(&config);
        let initial = engine.snapshot();
        for _ in 0..at {
            engine.tick();
        }

        prop_assert!(engine.restart().is_some());
        prop_assert_eq!(engine.snapshot(), initial);

        let mut ticks = 0;
        while !engine.is_over() {
            engine.tick();
            ticks += 1;
        }
        prop_assert_eq!(ticks, config.total_ticks());
    }

    #[test]
    fn grid_has_one_active_cell_until_finished(config in arb_config()) {
        let mut engine = fresh(&config);
        loop {
            let snap = engine.snapshot();
            let grid = ProgressGrid::project(&config, &snap);
            if snap.is_finished {
                prop_assert_eq!(grid.count(CellState::Active), 0);
                break;
            }
            prop_assert_eq!(grid.count(CellState::Active), 1);
            let done = (snap.current_set - 1) * config.steps + snap.current_step - 1;
            prop_assert_eq!(grid.count(CellState::Completed), done as usize);
            engine.tick();
        }
    }
}
