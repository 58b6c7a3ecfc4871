//! # setrunner Core Library
//!
//! Core logic for setrunner, an interval timer that runs a number of timed
//! steps per set, rests between sets, and keeps a history of finished and
//! abandoned sessions.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a tick-driven state machine ([`TimerEngine`]) plus an
//!   async driver ([`SessionRunner`]) that feeds it one tick per second
//! - **Validation**: raw setup input to [`SessionConfig`]
//! - **History**: the [`SessionRecorder`] turns terminal events into
//!   [`SessionHistoryItem`]s in a [`HistoryStore`]
//! - **Storage**: SQLite history and key-value store, TOML preferences
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: core timer state machine
//! - [`SessionRunner`]: one-second tick loop with pause/resume/restart/abort
//! - [`ProgressGrid`]: completed/active/upcoming cells for rendering
//! - [`Database`]: history and key-value persistence
//! - [`Config`]: user preferences

pub mod error;
pub mod events;
pub mod history;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use history::{HistoryStore, MemoryHistory, SessionHistoryItem, SessionRecorder, SessionStatus};
pub use storage::{Config, Database, Theme};
pub use timer::{
    validate, CellState, CounterType, ProgressGrid, RawSessionInput, RunOutcome, RunnerOptions,
    SessionConfig, SessionControl, SessionHandle, SessionRunner, Snapshot, TimerEngine, TimerPhase,
    Tone, ToneEmitter,
};
