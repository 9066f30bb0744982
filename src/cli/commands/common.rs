//! Helpers shared by the command handlers: document input, backend wiring,
//! Ctrl-C handling and progress output.

use anyhow::{Context, Result};
use clausecheck_config::Config;
use clausecheck_engine::{Orchestrator, ProgressEvent, ReviewSettings, RunContext};
use clausecheck_llm::LlmBackend;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Read a plain-text contract.
pub fn read_document(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    String::from_utf8(bytes).with_context(|| {
        format!(
            "{} is not UTF-8 text; convert the contract to plain text first",
            path.display()
        )
    })
}

/// File stem used as the contract name in reports and history.
pub fn contract_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Build the orchestrator for the configured provider, reporting a fallback.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let (backend, fallback) = clausecheck_llm::from_config_with_fallback(config)?;
    let mut settings = ReviewSettings::from_config(config);

    if let Some(info) = fallback {
        eprintln!(
            "⚠ Provider '{}' unavailable, using '{}' instead",
            info.primary_provider, info.fallback_provider
        );
        settings.model = config.model_for_provider(&info.fallback_provider);
    }

    let backend: Arc<dyn LlmBackend> = Arc::from(backend);
    Ok(Orchestrator::new(backend, settings))
}

/// A cancellation token that fires on Ctrl-C, plus the watcher task.
pub fn cancel_on_ctrl_c() -> (CancellationToken, JoinHandle<()>) {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let watcher = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\n正在取消审查...");
                token.cancel();
            }
            Err(err) => warn!(error = %err, "Failed to listen for Ctrl-C"),
        }
    });
    (cancel, watcher)
}

/// Attach a stderr progress printer to `ctx`.
///
/// The printer ends once every clone of the returned context is dropped.
pub fn with_progress_printer(ctx: RunContext) -> (RunContext, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            eprintln!("{event}");
        }
    });
    (ctx.with_progress(tx), printer)
}
