use chrono::Utc;

use super::{HistoryStore, SessionHistoryItem};
use crate::error::Result;
use crate::events::Event;

/// Turns the two terminal run events into history items.
///
/// The store is handed in by the caller; the recorder never reads progress
/// from anywhere but the event itself.
#[derive(Debug)]
pub struct SessionRecorder<S: HistoryStore> {
    store: S,
}

impl<S: HistoryStore> SessionRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Record a terminal event. Every other event is ignored and yields
    /// `Ok(None)`.
    ///
    /// # Errors
    /// Returns an error if the store rejects the item.
    pub fn record(&mut self, event: &Event) -> Result<Option<SessionHistoryItem>> {
        let item = match event {
            Event::SessionCompleted { config, .. } => {
                SessionHistoryItem::completed(config, Utc::now())
            }
            Event::SessionAbandoned {
                config, snapshot, ..
            } => SessionHistoryItem::abandoned(config, snapshot, Utc::now()),
            _ => return Ok(None),
        };
        self.store.prepend(&item)?;
        tracing::info!(
            id = %item.id,
            status = item.status.as_str(),
            completed_sets = item.completed_sets,
            completed_steps = item.completed_steps,
            "session recorded"
        );
        Ok(Some(item))
    }
}
