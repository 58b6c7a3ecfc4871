//! Audible cues at step, rest and session boundaries.
//!
//! The engine only knows the [`ToneEmitter`] trait. Emission is fire-and-forget:
//! implementations must return promptly and swallow their own failures.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// A single tone request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    pub frequency_hz: u32,
    pub duration_ms: u32,
    /// 0.0 ..= 1.0
    pub volume: f32,
}

impl Tone {
    /// Short C5 beep on step and rest transitions.
    pub const STEP: Tone = Tone {
        frequency_hz: 523,
        duration_ms: 150,
        volume: 0.5,
    };

    /// Longer G5 tone when the last step of the last set completes.
    pub const FINISH: Tone = Tone {
        frequency_hz: 784,
        duration_ms: 500,
        volume: 0.5,
    };

    /// Scale the volume by a 0..=100 preference.
    pub fn scaled(self, volume_pct: u32) -> Tone {
        let factor = volume_pct.min(100) as f32 / 100.0;
        Tone {
            volume: (self.volume * factor).clamp(0.0, 1.0),
            ..self
        }
    }
}

pub trait ToneEmitter: Send + Sync {
    fn emit(&self, tone: Tone);
}

impl<T: ToneEmitter + ?Sized> ToneEmitter for std::sync::Arc<T> {
    fn emit(&self, tone: Tone) {
        (**self).emit(tone);
    }
}

/// Emits nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentEmitter;

impl ToneEmitter for SilentEmitter {
    fn emit(&self, _tone: Tone) {}
}

/// Rings the terminal bell on stderr. Pitch cannot be expressed; the finish
/// tone rings twice so the two cues stay distinguishable.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl ToneEmitter for TerminalBell {
    fn emit(&self, tone: Tone) {
        if tone.volume <= 0.0 {
            return;
        }
        let bell: &[u8] = if tone.duration_ms >= Tone::FINISH.duration_ms {
            b"\x07\x07"
        } else {
            b"\x07"
        };
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(bell).and_then(|()| stderr.flush()) {
            tracing::debug!(error = %e, "terminal bell failed");
        }
    }
}

/// Spawns an external player for each tone without blocking the caller.
/// A short-lived thread reaps each player once it exits.
///
/// The template is split on whitespace; `{frequency}`, `{duration}` (seconds)
/// and `{volume}` (0.0-1.0) are substituted per argument, e.g.
/// `play -q -n synth {duration} sine {frequency} vol {volume}`.
#[derive(Debug, Clone)]
pub struct CommandEmitter {
    template: String,
}

impl CommandEmitter {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Program and arguments for a tone, or `None` for an empty template.
    pub fn command_line(&self, tone: Tone) -> Option<(String, Vec<String>)> {
        let duration = format!("{:.3}", f64::from(tone.duration_ms) / 1000.0);
        let frequency = tone.frequency_hz.to_string();
        let volume = format!("{:.2}", tone.volume);
        let mut parts = self.template.split_whitespace().map(|part| {
            part.replace("{frequency}", &frequency)
                .replace("{duration}", &duration)
                .replace("{volume}", &volume)
        });
        let program = parts.next()?;
        Some((program, parts.collect()))
    }
}

impl ToneEmitter for CommandEmitter {
    fn emit(&self, tone: Tone) {
        let Some((program, args)) = self.command_line(tone) else {
            return;
        };
        let spawned = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(%program, error = %e, "tone command failed to start");
                return;
            }
        };
        // Reap off the tick path so finished players do not linger as zombies.
        let reaper = std::thread::Builder::new()
            .name("tone-reaper".into())
            .spawn(move || {
                if let Err(e) = child.wait() {
                    tracing::debug!(error = %e, "tone command wait failed");
                }
            });
        if let Err(e) = reaper {
            tracing::warn!(%program, error = %e, "could not reap tone command");
        }
    }
}

/// Applies a 0..=100 volume preference before handing tones on.
pub struct Scaled {
    inner: Box<dyn ToneEmitter>,
    volume_pct: u32,
}

impl Scaled {
    pub fn new(inner: Box<dyn ToneEmitter>, volume_pct: u32) -> Self {
        Self { inner, volume_pct }
    }
}

impl ToneEmitter for Scaled {
    fn emit(&self, tone: Tone) {
        self.inner.emit(tone.scaled(self.volume_pct));
    }
}

/// Keeps every emitted tone in memory. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    tones: Mutex<Vec<Tone>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tones(&self) -> Vec<Tone> {
        self.tones
            .lock()
            .map(|tones| tones.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, tone: Tone) -> usize {
        self.tones().iter().filter(|t| **t == tone).count()
    }
}

impl ToneEmitter for RecordingEmitter {
    fn emit(&self, tone: Tone) {
        if let Ok(mut tones) = self.tones.lock() {
            tones.push(tone);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_and_finish_tones_are_distinct() {
        assert_ne!(Tone::STEP.frequency_hz, Tone::FINISH.frequency_hz);
        assert!(Tone::FINISH.duration_ms > Tone::STEP.duration_ms);
    }

    #[test]
    fn scaled_volume_clamps() {
        assert_eq!(Tone::STEP.scaled(100).volume, 0.5);
        assert_eq!(Tone::STEP.scaled(0).volume, 0.0);
        assert_eq!(Tone::STEP.scaled(500).volume, 0.5);
    }

    #[test]
    fn command_template_substitutes_placeholders() {
        let emitter = CommandEmitter::new("play -q -n synth {duration} sine {frequency} vol {volume}");
        let (program, args) = emitter.command_line(Tone::STEP).unwrap();
        assert_eq!(program, "play");
        assert_eq!(
            args,
            vec!["-q", "-n", "synth", "0.150", "sine", "523", "vol", "0.50"]
        );
    }

    #[test]
    fn empty_template_is_a_no_op() {
        let emitter = CommandEmitter::new("   ");
        assert!(emitter.command_line(Tone::FINISH).is_none());
        emitter.emit(Tone::FINISH);
    }

    /// Children of this process that have exited but were never waited on.
    #[cfg(target_os = "linux")]
    fn zombie_children() -> usize {
        let me = std::process::id().to_string();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return 0;
        };
        entries
            .filter_map(|entry| std::fs::read_to_string(entry.ok()?.path().join("stat")).ok())
            .filter(|stat| {
                let Some((_, rest)) = stat.rsplit_once(')') else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                fields.next() == Some("Z") && fields.next() == Some(me.as_str())
            })
            .count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn command_emitter_reaps_finished_players() {
        let emitter = CommandEmitter::new("true {frequency}");
        for _ in 0..50 {
            emitter.emit(Tone::STEP);
        }

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while zombie_children() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        assert_eq!(zombie_children(), 0);
    }

    #[test]
    fn scaled_emitter_applies_volume() {
        let recorder = std::sync::Arc::new(RecordingEmitter::new());
        let scaled = Scaled::new(Box::new(recorder.clone()), 40);
        scaled.emit(Tone::FINISH);
        let tones = recorder.tones();
        assert_eq!(tones.len(), 1);
        assert!((tones[0].volume - 0.2).abs() < f32::EPSILON);
        assert_eq!(tones[0].frequency_hz, Tone::FINISH.frequency_hz);
    }

    #[test]
    fn recording_emitter_counts() {
        let emitter = RecordingEmitter::new();
        emitter.emit(Tone::STEP);
        emitter.emit(Tone::STEP);
        emitter.emit(Tone::FINISH);
        assert_eq!(emitter.count(Tone::STEP), 2);
        assert_eq!(emitter.count(Tone::FINISH), 1);
        assert_eq!(emitter.tones().len(), 3);
    }
}
