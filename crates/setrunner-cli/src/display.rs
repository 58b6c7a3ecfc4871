//! Terminal rendering of a running session.

use std::io::{IsTerminal, Write};

use setrunner_core::timer::cell_state;
use setrunner_core::{CellState, Event, SessionConfig, Snapshot, Theme};

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// One-line status for a snapshot.
pub fn status_line(config: &SessionConfig, snapshot: &Snapshot) -> String {
    if snapshot.is_finished {
        let name = if config.name.is_empty() {
            "Great work!"
        } else {
            config.name.as_str()
        };
        return format!("COMPLETE! {name}");
    }
    if snapshot.is_resting {
        let next = snapshot.next_set().unwrap_or(snapshot.current_set + 1);
        let paused = if snapshot.is_paused { " (paused)" } else { "" };
        return format!(
            "REST {}s • Next: Set {next}{paused}",
            snapshot.rest_remaining
        );
    }
    let position = format!(
        "Set {}/{} • Step {}/{}",
        snapshot.current_set, config.sets, snapshot.current_step, config.steps
    );
    if snapshot.is_paused {
        format!("PAUSED • {position}")
    } else {
        format!(
            "{position} • {}s",
            snapshot.display_clock(config.counter_type)
        )
    }
}

/// Cells of the current set, e.g. `●●◉○○`.
pub fn set_row(config: &SessionConfig, snapshot: &Snapshot, accent: Option<&str>) -> String {
    let mut out = String::new();
    for step in 1..=config.steps {
        let cell = cell_state(snapshot.current_set, step, snapshot);
        let (glyph, color) = match cell {
            CellState::Completed => ('●', accent),
            CellState::Active => ('◉', accent),
            CellState::Upcoming => ('○', accent.map(|_| DIM)),
        };
        match color {
            Some(color) => {
                out.push_str(color);
                out.push(glyph);
                out.push_str(RESET);
            }
            None => out.push(glyph),
        }
    }
    out
}

/// Writes session events to stdout, redrawing in place on a terminal and
/// printing one line per transition otherwise.
pub struct Display {
    config: SessionConfig,
    accent: Option<&'static str>,
    interactive: bool,
    json: bool,
}

impl Display {
    pub fn new(config: SessionConfig, theme: Theme, json: bool) -> Self {
        let interactive = !json && std::io::stdout().is_terminal();
        Self {
            config,
            accent: interactive.then(|| theme.accent_ansi()),
            interactive,
            json,
        }
    }

    pub fn show(&self, event: &Event) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        if self.json {
            let line = serde_json::to_string(event).map_err(std::io::Error::other)?;
            writeln!(out, "{line}")?;
            return out.flush();
        }

        match event {
            Event::SessionStarted { config, total_ticks, .. } => {
                writeln!(
                    out,
                    "{}: {} sets x {} steps of {}s, {}s rest ({}s total)",
                    config.display_name(),
                    config.sets,
                    config.steps,
                    config.duration,
                    config.delay,
                    total_ticks
                )?;
                if self.interactive {
                    writeln!(out, "{DIM}p = pause/resume, r = restart, q = quit (then Enter){RESET}")?;
                }
            }
            Event::Progress { snapshot, .. } => {
                if self.interactive {
                    write!(
                        out,
                        "\r\x1b[2K{}  {}",
                        set_row(&self.config, snapshot, self.accent),
                        status_line(&self.config, snapshot)
                    )?;
                }
            }
            Event::SessionCompleted { .. } | Event::SessionAbandoned { .. } => {
                if self.interactive {
                    writeln!(out)?;
                }
            }
            Event::StepAdvanced { .. }
            | Event::RestStarted { .. }
            | Event::RestEnded { .. }
            | Event::Paused { .. }
            | Event::Resumed { .. }
            | Event::Restarted { .. } => {
                if !self.interactive {
                    writeln!(out, "{}", event_line(event))?;
                }
            }
        }
        out.flush()
    }
}

fn event_line(event: &Event) -> String {
    match event {
        Event::StepAdvanced { set, step, .. } => format!("Set {set} • Step {step}"),
        Event::RestStarted {
            after_set,
            next_set,
            rest_secs,
            ..
        } => format!("Set {after_set} done. REST {rest_secs}s • Next: Set {next_set}"),
        Event::RestEnded { set, .. } => format!("Set {set} • Step 1"),
        Event::Paused { .. } => "PAUSED".to_string(),
        Event::Resumed { .. } => "Resumed".to_string(),
        Event::Restarted { .. } => "Restarted from Set 1 • Step 1".to_string(),
        other => other.kind().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setrunner_core::CounterType;

    fn config(counter_type: CounterType) -> SessionConfig {
        SessionConfig {
            name: String::new(),
            steps: 3,
            duration: 10,
            sets: 2,
            delay: 5,
            counter_type,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            current_set: 1,
            current_step: 2,
            elapsed: 4,
            is_resting: false,
            rest_remaining: 5,
            is_paused: false,
            is_finished: false,
            rest_target: None,
        }
    }

    #[test]
    fn running_step_shows_position_and_clock() {
        assert_eq!(
            status_line(&config(CounterType::Down), &snapshot()),
            "Set 1/2 • Step 2/3 • 4s"
        );
        assert_eq!(
            status_line(&config(CounterType::Up), &snapshot()),
            "Set 1/2 • Step 2/3 • 5s"
        );
    }

    #[test]
    fn rest_shows_next_set_from_target() {
        let snap = Snapshot {
            is_resting: true,
            rest_remaining: 3,
            rest_target: Some(2),
            ..snapshot()
        };
        assert_eq!(
            status_line(&config(CounterType::Down), &snap),
            "REST 3s • Next: Set 2"
        );
    }

    #[test]
    fn paused_and_finished_lines() {
        let paused = Snapshot {
            is_paused: true,
            ..snapshot()
        };
        assert_eq!(
            status_line(&config(CounterType::Up), &paused),
            "PAUSED • Set 1/2 • Step 2/3"
        );

        let finished = Snapshot {
            is_finished: true,
            ..snapshot()
        };
        assert_eq!(
            status_line(&config(CounterType::Up), &finished),
            "COMPLETE! Great work!"
        );
    }

    #[test]
    fn set_row_marks_cells_without_colour() {
        assert_eq!(set_row(&config(CounterType::Up), &snapshot(), None), "●◉○");
    }

    #[test]
    fn set_row_covers_only_the_current_set() {
        let config = SessionConfig {
            steps: 4,
            sets: 100,
            ..config(CounterType::Down)
        };
        let second = Snapshot {
            current_set: 2,
            current_step: 1,
            ..snapshot()
        };
        assert_eq!(set_row(&config, &second, None), "◉○○○");

        let finished = Snapshot {
            current_set: 100,
            current_step: 4,
            is_finished: true,
            ..snapshot()
        };
        assert_eq!(set_row(&config, &finished, None), "●●●○");
    }
}
