use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{SessionConfig, Snapshot};

/// Every state change of a run produces an Event.
/// The presentation layer renders `Progress`; the recorder listens for the
/// two terminal variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        config: SessionConfig,
        total_ticks: u64,
        at: DateTime<Utc>,
    },
    /// Fired after every state change with the new snapshot.
    Progress {
        snapshot: Snapshot,
        at: DateTime<Utc>,
    },
    StepAdvanced {
        set: u32,
        step: u32,
        at: DateTime<Utc>,
    },
    RestStarted {
        after_set: u32,
        next_set: u32,
        rest_secs: u32,
        at: DateTime<Utc>,
    },
    RestEnded {
        set: u32,
        at: DateTime<Utc>,
    },
    Paused {
        snapshot: Snapshot,
        at: DateTime<Utc>,
    },
    Resumed {
        snapshot: Snapshot,
        at: DateTime<Utc>,
    },
    Restarted {
        at: DateTime<Utc>,
    },
    /// Terminal. Fired exactly once per run, when the last step of the last
    /// set completes.
    SessionCompleted {
        config: SessionConfig,
        at: DateTime<Utc>,
    },
    /// Terminal. The caller ended a run that had not finished.
    SessionAbandoned {
        config: SessionConfig,
        snapshot: Snapshot,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::SessionCompleted { .. } | Event::SessionAbandoned { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::SessionStarted { .. } => "session_started",
            Event::Progress { .. } => "progress",
            Event::StepAdvanced { .. } => "step_advanced",
            Event::RestStarted { .. } => "rest_started",
            Event::RestEnded { .. } => "rest_ended",
            Event::Paused { .. } => "paused",
            Event::Resumed { .. } => "resumed",
            Event::Restarted { .. } => "restarted",
            Event::SessionCompleted { .. } => "session_completed",
            Event::SessionAbandoned { .. } => "session_abandoned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_tag_matches_kind() {
        let event = Event::RestEnded {
            set: 2,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
        assert_eq!(json["set"], 2);
    }

    #[test]
    fn only_completion_and_abandonment_are_terminal() {
        let config = SessionConfig::default();
        assert!(Event::SessionCompleted {
            config: config.clone(),
            at: Utc::now()
        }
        .is_terminal());
        assert!(!Event::Restarted { at: Utc::now() }.is_terminal());
    }
}
