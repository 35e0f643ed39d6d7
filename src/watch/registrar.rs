//! The watch registrar: filesystem events in, binding chains out.
//!
//! notify delivers events on its own thread; they are bridged into a tokio
//! channel and each matching binding is started with `spawn_blocking`, so
//! slow steps never hold up event intake.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use glob::PatternError;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::task::JoinHandle;

use super::{
    Action, ActionRunner, ChainOutcome, RegistrarState, WatchActivity, WatchBinding,
    default_bindings, is_temp_file,
};
use crate::utils::path::normalize_path;
use crate::{debug, log};

pub struct WatchRegistrar {
    root: PathBuf,
    bindings: Vec<Arc<WatchBinding>>,
    runner: Arc<ActionRunner>,
    activity: Arc<WatchActivity>,
}

impl WatchRegistrar {
    /// Registrar without bindings, watching `root` once started.
    pub fn new(root: &Path, runner: ActionRunner) -> Self {
        Self {
            root: normalize_path(root),
            bindings: Vec::new(),
            activity: runner.activity(),
            runner: Arc::new(runner),
        }
    }

    /// Registrar with the standard bindings.
    pub fn with_default_bindings(root: &Path, runner: ActionRunner) -> Self {
        let mut registrar = Self::new(root, runner);
        registrar.bindings = default_bindings().into_iter().map(Arc::new).collect();
        registrar
    }

    /// Add a binding. `glob` is relative to the watched root.
    pub fn bind(&mut self, glob: &str, actions: Vec<Action>) -> Result<(), PatternError> {
        self.bindings.push(Arc::new(WatchBinding::new(glob, actions)?));
        Ok(())
    }

    pub fn bindings(&self) -> &[Arc<WatchBinding>] {
        &self.bindings
    }

    pub fn state(&self) -> RegistrarState {
        self.activity.state()
    }

    /// Bindings an event triggers, each at most once.
    pub fn matching(&self, event: &Event) -> Vec<Arc<WatchBinding>> {
        if !is_content_change(&event.kind) {
            return Vec::new();
        }

        let rels: Vec<&Path> = event
            .paths
            .iter()
            .filter(|path| !is_temp_file(path))
            .filter_map(|path| path.strip_prefix(&self.root).ok())
            .collect();
        if rels.is_empty() {
            return Vec::new();
        }

        self.bindings
            .iter()
            .filter(|binding| rels.iter().any(|rel| binding.matches(rel)))
            .cloned()
            .collect()
    }

    /// Start the chain of every matching binding on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, event: &Event) -> Vec<JoinHandle<ChainOutcome>> {
        self.matching(event)
            .into_iter()
            .map(|binding| {
                debug!("watch"; "{:?} {} -> {}", event.kind, display_paths(&event.paths), binding.glob());
                let runner = Arc::clone(&self.runner);
                tokio::task::spawn_blocking(move || runner.run(binding.actions()))
            })
            .collect()
    }

    /// Watch until a shutdown signal arrives. Blocks the calling thread.
    pub fn run(self, shutdown: Receiver<()>) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("sitepipe-watch")
            .build()
            .context("failed to start watch runtime")?;

        let result = runtime.block_on(self.watch(shutdown));
        runtime.shutdown_timeout(Duration::from_secs(5));
        result
    }

    async fn watch(self, shutdown: Receiver<()>) -> Result<()> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .context("failed to create file watcher")?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", self.root.display()))?;

        self.activity.set_watching(true);
        log!("watch"; "watching {} ({} bindings)", self.root.display(), self.bindings.len());

        let mut stop = tokio::task::spawn_blocking(move || {
            let _ = shutdown.recv();
        });

        loop {
            tokio::select! {
                _ = &mut stop => break,
                Some(res) = rx.recv() => match res {
                    Ok(event) => {
                        for handle in self.dispatch(&event) {
                            tokio::spawn(async move {
                                if let Ok(outcome) = handle.await {
                                    trace_outcome(&outcome);
                                }
                            });
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                },
            }
        }

        drop(watcher);
        if self.state() != RegistrarState::Watching {
            log!("watch"; "stopping with chains in flight");
        }
        self.activity.set_watching(false);
        debug!("watch"; "stopped");
        Ok(())
    }
}

/// Creations, removals and content/name changes. Metadata-only and access
/// events are noise (mtime/chmod churn).
fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

fn trace_outcome(outcome: &ChainOutcome) {
    match outcome {
        ChainOutcome::Completed { reports } => {
            debug!("watch"; "chain done ({} steps)", reports.len());
        }
        ChainOutcome::Aborted { step, error } => {
            debug!("watch"; "chain aborted at {}: {}", step, error);
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
