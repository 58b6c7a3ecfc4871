//! Session history records and the store they live in.

mod recorder;

pub use recorder::SessionRecorder;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::timer::{CounterType, SessionConfig, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Completed,
    Incomplete,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Completed => "Completed",
            SessionStatus::Incomplete => "Incomplete",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Completed" => Ok(SessionStatus::Completed),
            "Incomplete" => Ok(SessionStatus::Incomplete),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// One finished or abandoned run. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHistoryItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: SessionStatus,
    pub name: String,
    pub steps: u32,
    pub duration: u32,
    pub sets: u32,
    pub delay: u32,
    pub counter_type: CounterType,
    pub completed_sets: u32,
    /// Steps done in the set that was interrupted. Always 0 for completed
    /// sessions.
    pub completed_steps: u32,
}

impl SessionHistoryItem {
    pub fn completed(config: &SessionConfig, timestamp: DateTime<Utc>) -> Self {
        Self::build(config, timestamp, SessionStatus::Completed, config.sets, 0)
    }

    /// Progress counters come from the last snapshot. During a rest the set
    /// just finished counts in full; otherwise the step in progress does not
    /// count.
    pub fn abandoned(config: &SessionConfig, snapshot: &Snapshot, timestamp: DateTime<Utc>) -> Self {
        let (completed_sets, completed_steps) = if snapshot.is_resting {
            (snapshot.current_set, config.steps)
        } else {
            (
                snapshot.current_set.saturating_sub(1),
                snapshot.current_step.saturating_sub(1),
            )
        };
        Self::build(
            config,
            timestamp,
            SessionStatus::Incomplete,
            completed_sets,
            completed_steps,
        )
    }

    fn build(
        config: &SessionConfig,
        timestamp: DateTime<Utc>,
        status: SessionStatus,
        completed_sets: u32,
        completed_steps: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            status,
            name: config.name.clone(),
            steps: config.steps,
            duration: config.duration,
            sets: config.sets,
            delay: config.delay,
            counter_type: config.counter_type,
            completed_sets,
            completed_steps,
        }
    }

    /// The setup this run used, without the record-only fields.
    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            name: self.name.clone(),
            steps: self.steps,
            duration: self.duration,
            sets: self.sets,
            delay: self.delay,
            counter_type: self.counter_type,
        }
    }

    /// One-line progress summary, e.g. "2 Sets • 3 Steps" or
    /// "Completed 1/2 sets, 2/3 steps".
    pub fn summary(&self) -> String {
        match self.status {
            SessionStatus::Completed => format!("{} Sets • {} Steps", self.sets, self.steps),
            SessionStatus::Incomplete => format!(
                "Completed {}/{} sets, {}/{} steps",
                self.completed_sets, self.sets, self.completed_steps, self.steps
            ),
        }
    }
}

/// Where history items are kept, most recent first.
pub trait HistoryStore {
    /// Insert an item ahead of every existing one.
    fn prepend(&mut self, item: &SessionHistoryItem) -> Result<()>;

    /// All items, most recent first.
    fn list(&self) -> Result<Vec<SessionHistoryItem>>;

    fn get(&self, id: &str) -> Result<Option<SessionHistoryItem>>;

    /// Remove every item. Returns how many were removed.
    fn clear(&mut self) -> Result<usize>;
}

/// History held in memory for the life of the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    items: Vec<SessionHistoryItem>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn prepend(&mut self, item: &SessionHistoryItem) -> Result<()> {
        self.items.insert(0, item.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionHistoryItem>> {
        Ok(self.items.clone())
    }

    fn get(&self, id: &str) -> Result<Option<SessionHistoryItem>> {
        Ok(self.items.iter().find(|item| item.id == id).cloned())
    }

    fn clear(&mut self) -> Result<usize> {
        let removed = self.items.len();
        self.items.clear();
        Ok(removed)
    }
}
