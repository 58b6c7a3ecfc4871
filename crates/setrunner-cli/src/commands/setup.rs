use clap::Args;
use setrunner_core::storage::Database;
use setrunner_core::timer::MAX_NAME_CHARS;
use setrunner_core::{CoreError, CounterType, HistoryStore, RawSessionInput, SessionConfig};

/// Session setup flags shared by `run` and `validate`.
///
/// Numbers are taken as text so the validator sees exactly what was typed.
/// Unset flags fall back to `--from`, then to the last setup, then to the
/// built-in defaults.
#[derive(Args, Debug, Default)]
pub struct SetupArgs {
    /// Session name (at most 100 characters are kept)
    #[arg(long)]
    pub name: Option<String>,
    /// Steps per set (1-50)
    #[arg(long, allow_hyphen_values = true)]
    pub steps: Option<String>,
    /// Seconds per step (1-3600)
    #[arg(long, allow_hyphen_values = true)]
    pub duration: Option<String>,
    /// Number of sets (1-100)
    #[arg(long, allow_hyphen_values = true)]
    pub sets: Option<String>,
    /// Rest seconds between sets (1-3600)
    #[arg(long, allow_hyphen_values = true)]
    pub delay: Option<String>,
    /// Step clock direction: up or down
    #[arg(long)]
    pub counter: Option<CounterType>,
    /// Start from the setup of a history entry
    #[arg(long, value_name = "HISTORY_ID")]
    pub from: Option<String>,
}

impl SetupArgs {
    /// Setup the flags are applied on top of.
    fn base(&self, db: &Database) -> Result<SessionConfig, CoreError> {
        if let Some(id) = &self.from {
            return db
                .get(id)?
                .map(|item| item.config())
                .ok_or_else(|| CoreError::HistoryNotFound(id.clone()));
        }
        Ok(db.load_setup()?.unwrap_or_default())
    }

    /// Merge flags over the base setup into raw validator input.
    pub fn resolve(&self, db: &Database) -> Result<RawSessionInput, CoreError> {
        let base = RawSessionInput::from(&self.base(db)?);
        let pick = |flag: &Option<String>, fallback: String| flag.clone().unwrap_or(fallback);
        Ok(RawSessionInput {
            name: truncate_name(&pick(&self.name, base.name)),
            steps: pick(&self.steps, base.steps),
            duration: pick(&self.duration, base.duration),
            sets: pick(&self.sets, base.sets),
            delay: pick(&self.delay, base.delay),
            counter_type: self.counter.unwrap_or(base.counter_type),
        })
    }
}

fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_NAME_CHARS).collect()
}
