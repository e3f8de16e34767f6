use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use symdesign::engine::progress::{Progress, ProgressCallback};
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

struct PhaseBar {
    bar: ProgressBar,
    phase: Option<&'static str>,
    completed: Vec<&'static str>,
}

/// Renders exploration phases as a spinner and per-point tasks as a bar on stderr.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<PhaseBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::new(0)
            .with_style(Self::spinner_style())
            .with_message("Preparing...");
        bar.set_draw_target(target);
        bar.finish_and_clear();

        Self {
            state: Arc::new(Mutex::new(PhaseBar {
                bar,
                phase: None,
                completed: Vec::new(),
            })),
        }
    }

    /// Names of the phases finished so far, in order.
    pub fn completed_phases(&self) -> Vec<&'static str> {
        self.state
            .lock()
            .map(|state| state.completed.clone())
            .unwrap_or_default()
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut guard) = state.lock() else {
                warn!("Progress state mutex was poisoned. Cannot update progress.");
                return;
            };
            let PhaseBar {
                bar,
                phase,
                completed,
            } = &mut *guard;

            match progress {
                Progress::PhaseStart { name } => {
                    *phase = Some(name);
                    bar.reset();
                    bar.set_length(0);
                    bar.set_style(Self::spinner_style());
                    bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    bar.set_message(format!("{}...", name));
                }
                Progress::PhaseFinish => {
                    bar.disable_steady_tick();
                    match phase.take() {
                        Some(name) => {
                            completed.push(name);
                            bar.finish_with_message(format!("✓ {}", name));
                        }
                        None => bar.finish_with_message("✓ Done"),
                    }
                }
                Progress::TaskStart { total_steps } => {
                    bar.disable_steady_tick();
                    bar.reset();
                    bar.set_length(total_steps);
                    bar.set_position(0);
                    bar.set_style(Self::bar_style());
                    bar.set_message(phase.unwrap_or("Working").to_string());
                }
                Progress::TaskIncrement => bar.inc(1),
                Progress::TaskFinish => {
                    let length = bar.length().unwrap_or(0);
                    if bar.position() < length {
                        bar.set_position(length);
                    }
                    bar.finish();
                }
                Progress::Message(msg) => {
                    if bar.is_finished() {
                        bar.set_message(msg);
                    } else {
                        bar.println(format!("  {}", msg));
                    }
                }
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Failed to create spinner style template")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<24} [{bar:40.cyan/blue}] {pos}/{len} points ({eta})")
            .expect("Failed to create bar style template")
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn hidden() -> CliProgressHandler {
        CliProgressHandler::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn handler_starts_finished_with_no_phases() {
        let handler = hidden();
        let state = handler.state.lock().unwrap();
        assert_eq!(state.bar.length(), Some(0));
        assert!(state.bar.is_finished());
        assert!(state.phase.is_none());
        drop(state);
        assert!(handler.completed_phases().is_empty());
    }

    #[test]
    fn task_bar_is_labelled_with_the_current_phase() {
        let handler = hidden();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Residual Minimization",
        });
        {
            let state = handler.state.lock().unwrap();
            assert_eq!(state.bar.message(), "Residual Minimization...");
            assert!(!state.bar.is_finished());
        }

        callback(Progress::TaskStart { total_steps: 50 });
        callback(Progress::TaskIncrement);
        {
            let state = handler.state.lock().unwrap();
            assert_eq!(state.bar.length(), Some(50));
            assert_eq!(state.bar.position(), 1);
            assert_eq!(state.bar.message(), "Residual Minimization");
        }

        callback(Progress::TaskFinish);
        {
            let state = handler.state.lock().unwrap();
            assert!(state.bar.is_finished());
            assert_eq!(state.bar.position(), 50);
        }

        callback(Progress::PhaseFinish);
        let state = handler.state.lock().unwrap();
        assert_eq!(state.bar.message(), "✓ Residual Minimization");
        drop(state);
        assert_eq!(handler.completed_phases(), vec!["Residual Minimization"]);
    }

    #[test]
    fn unmatched_phase_finish_reports_done() {
        let handler = hidden();
        let callback = handler.get_callback();
        callback(Progress::PhaseFinish);
        let state = handler.state.lock().unwrap();
        assert_eq!(state.bar.message(), "✓ Done");
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = hidden();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::PhaseStart { name: "Seeding" });
            callback(Progress::TaskIncrement);
            callback(Progress::PhaseFinish);
            callback(Progress::PhaseStart {
                name: "Pareto Pruning",
            });
            callback(Progress::PhaseFinish);
        })
        .join()
        .unwrap();

        assert_eq!(
            handler.completed_phases(),
            vec!["Seeding", "Pareto Pruning"]
        );
    }
}
