use std::io::BufRead;

use clap::Args;
use setrunner_core::storage::Database;
use setrunner_core::{
    validate, Config, RunOutcome, RunnerOptions, SessionConfig, SessionControl,
    SessionHistoryItem, SessionRecorder, SessionRunner,
};

use super::setup::SetupArgs;
use crate::display::Display;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub setup: SetupArgs,
    /// Print every event as a JSON line instead of the progress display
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = validate(&args.setup.resolve(&db)?)?;
    db.save_setup(&config)?;

    let prefs = Config::load_or_default();
    let display = Display::new(config.clone(), prefs.ui.theme, args.json);
    let mut recorder = SessionRecorder::new(db);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (outcome, recorded) = runtime.block_on(drive(config, &prefs, &display, &mut recorder))?;

    if !args.json {
        report(&outcome, recorded.as_ref());
    }
    Ok(())
}

async fn drive(
    config: SessionConfig,
    prefs: &Config,
    display: &Display,
    recorder: &mut SessionRecorder<Database>,
) -> Result<(RunOutcome, Option<SessionHistoryItem>), Box<dyn std::error::Error>> {
    let mut handle = SessionRunner::spawn(
        config,
        prefs.tone_emitter(),
        RunnerOptions::with_tick_ms(prefs.timer.tick_ms),
    );
    spawn_input_reader(handle.control());

    let control = handle.control();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut recorded = None;

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                display.show(&event)?;
                if event.is_terminal() {
                    recorded = recorder.record(&event)?;
                }
            }
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "cannot listen for Ctrl+C");
                } else {
                    control.abort();
                }
            }
        }
    }

    let outcome = handle.wait().await?;
    Ok((outcome, recorded))
}

/// Keyboard controls, one command per line. Runs on a plain thread so a
/// pending read never holds up shutdown.
fn spawn_input_reader(control: SessionControl) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "p" | "P" => control.toggle_pause(),
                "r" | "R" => control.restart(),
                "q" | "Q" => {
                    control.abort();
                    break;
                }
                "" => {}
                other => tracing::debug!(input = other, "ignoring unknown control"),
            }
        }
    });
}

fn report(outcome: &RunOutcome, recorded: Option<&SessionHistoryItem>) {
    match outcome {
        RunOutcome::Completed { config } => {
            println!("Session complete: {}", config.display_name());
        }
        RunOutcome::Abandoned { config, snapshot } => {
            println!(
                "Session abandoned at set {}, step {}: {}",
                snapshot.current_set,
                snapshot.current_step,
                config.display_name()
            );
        }
        RunOutcome::Detached { .. } => {}
    }
    if let Some(item) = recorded {
        println!("{} [{}] {}", item.summary(), item.status.as_str(), item.id);
    }
}
