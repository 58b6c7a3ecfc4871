mod config;
mod engine;
mod progress;
mod runner;
mod tone;

pub use config::{
    validate, CounterType, RawSessionInput, SessionConfig, MAX_DELAY_SECS, MAX_DURATION_SECS,
    MAX_GRID_CELLS, MAX_NAME_CHARS, MAX_SETS, MAX_STEPS,
};
pub use engine::{Snapshot, TimerEngine, TimerPhase, TimerRunState};
pub use progress::{cell_state, schedule_progress_pct, ticks_elapsed, CellState, ProgressGrid};
pub use runner::{RunOutcome, RunnerOptions, SessionControl, SessionHandle, SessionRunner};
pub use tone::{
    CommandEmitter, RecordingEmitter, Scaled, SilentEmitter, TerminalBell, Tone, ToneEmitter,
};
