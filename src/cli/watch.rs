//! `sitepipe watch`: dev server, reload channel and watch bindings.
//!
//! Startup order:
//! 1. run every dev step once so the server has something to serve
//! 2. start the reload hub, then the HTTP server pointing at it
//! 3. start the registrar on its own thread
//! 4. serve until Ctrl+C unblocks the server and stops the registrar

use std::fs;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};

use crate::config::PipelineConfig;
use crate::core::{BuildMode, register_server};
use crate::logger::{status_error, status_success};
use crate::reload::{Notifier, ReloadHub};
use crate::serve::DevServer;
use crate::step::{StepRegistry, init};
use crate::watch::{ActionRunner, WatchRegistrar};
use crate::{debug, log};

pub fn serve_and_watch(config: &PipelineConfig) -> Result<()> {
    let registry = Arc::new(init(config, BuildMode::Development, config.output_dir())?);
    initial_build(&registry);

    let output = config.output_dir();
    fs::create_dir_all(output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let serve = &config.serve;
    let hub = ReloadHub::start(serve.interface, serve.reload_port)?;
    if hub.port() != serve.reload_port {
        log!("reload"; "port {} in use, using {} instead", serve.reload_port, hub.port());
    }
    debug!("reload"; "ws://{}:{}", serve.interface, hub.port());

    let server = DevServer::bind(serve.interface, serve.port, output, Some(hub.port()))?;
    log!("serve"; "http://{}", server.addr());

    let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
    register_server(server.handle(), shutdown_tx);

    let notifier: Arc<dyn Notifier> = Arc::clone(&hub) as Arc<dyn Notifier>;
    let registrar =
        WatchRegistrar::with_default_bindings(config.source_dir(), ActionRunner::new(registry, notifier));
    let watcher = thread::Builder::new()
        .name("sitepipe-watch".into())
        .spawn(move || {
            let result = registrar.run(shutdown_rx);
            if let Err(e) = &result {
                log!("watch"; "stopped: {:#}", e);
            }
            result
        })
        .context("failed to spawn watch thread")?;

    server.run()?;
    hub.stop();

    watcher
        .join()
        .map_err(|_| anyhow!("watch thread panicked"))?
}

/// Every dev step once. Failures are reported, not fatal: the watcher will
/// retry on the next change.
fn initial_build(registry: &StepRegistry) {
    for name in registry.names() {
        match registry.run(name) {
            Ok(report) if report.is_clean() => {
                status_success(&format!("{}: {}", name, report.summary()));
            }
            Ok(report) => {
                status_error(&format!("{}: {}", name, report.summary()), &report.failure_detail());
            }
            Err(e) => status_error(&format!("{name} failed"), &e.to_string()),
        }
    }
}
