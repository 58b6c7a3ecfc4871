//! Per-cell progress for a `sets x steps` grid.
//!
//! Everything here is a pure function of a config and a snapshot and is
//! recomputed from scratch on every snapshot.

use serde::{Deserialize, Serialize};

use super::config::SessionConfig;
use super::engine::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    Completed,
    Active,
    Upcoming,
}

/// State of the cell at 1-based `(set, step)`.
pub fn cell_state(set: u32, step: u32, snapshot: &Snapshot) -> CellState {
    let cell = (set, step);
    let current = snapshot.position();
    if cell < current {
        CellState::Completed
    } else if cell == current && !snapshot.is_finished {
        CellState::Active
    } else {
        CellState::Upcoming
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressGrid {
    pub sets: u32,
    pub steps: u32,
    /// Row-major: all steps of set 1, then set 2, ...
    pub cells: Vec<CellState>,
}

impl ProgressGrid {
    pub fn project(config: &SessionConfig, snapshot: &Snapshot) -> Self {
        let cells = (1..=config.sets)
            .flat_map(|set| (1..=config.steps).map(move |step| cell_state(set, step, snapshot)))
            .collect();
        Self {
            sets: config.sets,
            steps: config.steps,
            cells,
        }
    }

    /// Cells of one 1-based set.
    pub fn row(&self, set: u32) -> &[CellState] {
        if set == 0 || set > self.sets {
            return &[];
        }
        let width = self.steps as usize;
        let start = (set as usize - 1) * width;
        &self.cells[start..start + width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellState]> {
        self.cells.chunks(self.steps.max(1) as usize)
    }

    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|c| **c == state).count()
    }
}

/// Ticks already spent in the run, including rests.
pub fn ticks_elapsed(config: &SessionConfig, snapshot: &Snapshot) -> u64 {
    if snapshot.is_finished {
        return config.total_ticks();
    }
    let duration = u64::from(config.duration);
    let delay = u64::from(config.delay);
    let steps = u64::from(config.steps);
    let finished_sets = u64::from(snapshot.current_set - 1);

    let mut ticks = finished_sets * (steps * duration + delay);
    if snapshot.is_resting {
        ticks += steps * duration + delay - u64::from(snapshot.rest_remaining);
    } else {
        let into_step = match config.counter_type {
            super::config::CounterType::Up => u64::from(snapshot.elapsed),
            super::config::CounterType::Down => duration - u64::from(snapshot.elapsed),
        };
        ticks += u64::from(snapshot.current_step - 1) * duration + into_step;
    }
    ticks
}

/// 0.0 ..= 100.0 progress across the whole run.
pub fn schedule_progress_pct(config: &SessionConfig, snapshot: &Snapshot) -> f64 {
    let total = config.total_ticks();
    if total == 0 {
        return 0.0;
    }
    (ticks_elapsed(config, snapshot) as f64 / total as f64 * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::config::CounterType;
    use crate::timer::engine::TimerEngine;
    use crate::timer::tone::SilentEmitter;
    use std::sync::Arc;

    fn snapshot_at(set: u32, step: u32, is_finished: bool) -> Snapshot {
        Snapshot {
            current_set: set,
            current_step: step,
            elapsed: 0,
            is_resting: false,
            rest_remaining: 5,
            is_paused: false,
            is_finished,
            rest_target: None,
        }
    }

    #[test]
    fn cells_before_current_are_completed() {
        let snap = snapshot_at(2, 3, false);
        assert_eq!(cell_state(1, 5, &snap), CellState::Completed);
        assert_eq!(cell_state(2, 2, &snap), CellState::Completed);
        assert_eq!(cell_state(2, 3, &snap), CellState::Active);
        assert_eq!(cell_state(2, 4, &snap), CellState::Upcoming);
        assert_eq!(cell_state(3, 1, &snap), CellState::Upcoming);
    }

    #[test]
    fn finished_run_has_no_active_cell() {
        let snap = snapshot_at(2, 3, true);
        assert_eq!(cell_state(2, 3, &snap), CellState::Upcoming);
        assert_eq!(cell_state(2, 2, &snap), CellState::Completed);
    }

    #[test]
    fn grid_has_one_row_per_set() {
        let config = SessionConfig {
            steps: 3,
            sets: 2,
            ..SessionConfig::default()
        };
        let grid = ProgressGrid::project(&config, &snapshot_at(1, 2, false));
        assert_eq!(grid.cells.len(), 6);
        assert_eq!(grid.rows().count(), 2);
        assert_eq!(
            grid.row(1),
            &[CellState::Completed, CellState::Active, CellState::Upcoming]
        );
        assert_eq!(grid.row(2), &[CellState::Upcoming; 3]);
        assert!(grid.row(3).is_empty());
        assert_eq!(grid.count(CellState::Completed), 1);
    }

    #[test]
    fn elapsed_ticks_track_the_engine() {
        for counter in [CounterType::Up, CounterType::Down] {
            let config = SessionConfig {
                name: String::new(),
                steps: 2,
                duration: 3,
                sets: 3,
                delay: 2,
                counter_type: counter,
            };
            let (mut engine, _) = TimerEngine::start(config.clone(), Arc::new(SilentEmitter));
            assert_eq!(ticks_elapsed(&config, &engine.snapshot()), 0);
            for n in 1..=config.total_ticks() {
                engine.tick();
                assert_eq!(ticks_elapsed(&config, &engine.snapshot()), n, "{counter} tick {n}");
            }
            assert_eq!(schedule_progress_pct(&config, &engine.snapshot()), 100.0);
        }
    }
}
