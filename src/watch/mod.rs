//! Watch bindings: "when files matching G change, run S then notify".
//!
//! # Module Structure
//!
//! ```text
//! watch/
//! ├── registrar   # notify watcher → binding dispatch on a tokio runtime
//! └── mod.rs      # WatchBinding, Action, ActionRunner (this file)
//! ```
//!
//! Each binding owns an ordered action list. A matching event runs the whole
//! list on a blocking worker: actions execute strictly in order, and a step
//! that fails with a step-level error skips the rest of its chain. Bindings
//! are independent of each other; there is no debouncing or queueing.

mod registrar;


pub use registrar::WatchRegistrar;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use glob::{MatchOptions, Pattern, PatternError};

use crate::logger::{status_error, status_success};
use crate::reload::Notifier;
use crate::step::{StepError, StepName, StepRegistry, StepReport};
use crate::debug;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// One link of a binding's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Run a registered step to completion.
    Run(StepName),
    /// Tell connected browsers to reload.
    Notify,
}

/// A glob over paths relative to the source root, plus what to do on change.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pattern: Pattern,
    actions: Vec<Action>,
}

impl WatchBinding {
    pub fn new(glob: &str, actions: Vec<Action>) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: Pattern::new(glob)?,
            actions,
        })
    }

    pub fn glob(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// `rel` is relative to the source root.
    pub fn matches(&self, rel: &Path) -> bool {
        self.pattern.matches_path_with(rel, MATCH_OPTIONS)
    }
}

/// The standard bindings, relative to the source root.
pub fn default_bindings() -> Vec<WatchBinding> {
    const BINDINGS: [(&str, StepName); 7] = [
        ("html/pages/**/*.html", StepName::Html),
        ("html/layouts/**/*", StepName::Html),
        ("html/partials/**/*", StepName::Html),
        ("scss/**/*.scss", StepName::Css),
        ("js/**/*.js", StepName::Js),
        ("images/**/*", StepName::Images),
        ("fonts/**/*", StepName::Fonts),
    ];

    BINDINGS
        .iter()
        .filter_map(|(glob, step)| WatchBinding::new(glob, vec![Action::Run(*step), Action::Notify]).ok())
        .collect()
}

/// Editor swap/backup files and dot-files never trigger a binding.
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Where the registrar is in its cycle:
/// `Idle → Watching → RunningStep → Notifying → Watching`.
///
/// Chains run concurrently, so the state reports the furthest phase reached
/// by any chain in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrarState {
    Idle,
    Watching,
    RunningStep,
    Notifying,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    RunningStep,
    Notifying,
}

/// Shared view of the watcher lifecycle and the chains in flight.
#[derive(Debug, Default)]
pub struct WatchActivity {
    watching: AtomicBool,
    running: AtomicUsize,
    notifying: AtomicUsize,
}

impl WatchActivity {
    pub fn state(&self) -> RegistrarState {
        if self.notifying.load(Ordering::SeqCst) > 0 {
            RegistrarState::Notifying
        } else if self.running.load(Ordering::SeqCst) > 0 {
            RegistrarState::RunningStep
        } else if self.watching.load(Ordering::SeqCst) {
            RegistrarState::Watching
        } else {
            RegistrarState::Idle
        }
    }

    fn set_watching(&self, watching: bool) {
        self.watching.store(watching, Ordering::SeqCst);
    }

    fn enter(&self, phase: Phase) -> PhaseGuard<'_> {
        let counter = match phase {
            Phase::RunningStep => &self.running,
            Phase::Notifying => &self.notifying,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        PhaseGuard { counter }
    }
}

/// Leaves its phase when dropped.
struct PhaseGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// How a chain ended.
#[derive(Debug)]
pub enum ChainOutcome {
    /// Every action ran. Reports are in step order.
    Completed { reports: Vec<StepReport> },
    /// A step failed at step level; later actions were skipped.
    Aborted { step: StepName, error: StepError },
}

/// Runs action chains against a registry and a notifier.
pub struct ActionRunner {
    registry: Arc<StepRegistry>,
    notifier: Arc<dyn Notifier>,
    activity: Arc<WatchActivity>,
}

impl ActionRunner {
    pub fn new(registry: Arc<StepRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            registry,
            notifier,
            activity: Arc::new(WatchActivity::default()),
        }
    }

    pub fn activity(&self) -> Arc<WatchActivity> {
        Arc::clone(&self.activity)
    }

    /// Execute `actions` in order on the calling thread.
    pub fn run(&self, actions: &[Action]) -> ChainOutcome {
        let mut reports = Vec::new();

        for action in actions {
            match *action {
                Action::Run(step) => {
                    debug!("watch"; "running {} ({})", step, self.registry.mode().label());
                    let result = {
                        let _phase = self.activity.enter(Phase::RunningStep);
                        self.registry.run(step)
                    };
                    match result {
                        Ok(report) => {
                            log_report(&report);
                            reports.push(report);
                        }
                        Err(error) => {
                            status_error(&format!("{step} failed"), &error.to_string());
                            return ChainOutcome::Aborted { step, error };
                        }
                    }
                }
                Action::Notify => {
                    let reason = reason(&reports);
                    debug!("watch"; "notifying ({})", reason);
                    let _phase = self.activity.enter(Phase::Notifying);
                    self.notifier.reload(&reason);
                }
            }
        }

        ChainOutcome::Completed { reports }
    }
}

fn log_report(report: &StepReport) {
    let summary = format!("{}: {}", report.step, report.summary());
    if report.is_clean() {
        status_success(&summary);
    } else {
        status_error(&summary, &report.failure_detail());
    }
}

/// Reload reason: the steps that ran before the notify.
fn reason(reports: &[StepReport]) -> String {
    if reports.is_empty() {
        return "change".to_owned();
    }
    reports
        .iter()
        .map(|r| r.step.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
