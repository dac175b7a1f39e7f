use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the decision log writer flushing until the process exits.
static DECISION_LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Default verbosity: decisions at info, everything else at warn.
const DEFAULT_FILTER: &str = "warn,servegate=info";

/// Set up logging for the gate.
///
/// Denials and faults are logged by [`crate::Gatekeeper::decide`]; they go
/// to stderr for the operator (stdout carries `check` and `validate`
/// results) and to `<log_dir>/<service>.jsonl.<hour>` for later review of
/// who was turned away. `RUST_LOG` overrides the default filter, e.g.
/// `servegate::policy=trace` to see every check.
pub fn init_tracing(service: &str, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("create log dir: {}", log_dir.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let decisions = tracing_appender::rolling::hourly(log_dir, format!("{service}.jsonl"));
    let (decision_writer, guard) = tracing_appender::non_blocking(decisions);
    let _ = DECISION_LOG_GUARD.set(guard);

    let operator = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let decision_log = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_target(true)
        .with_writer(decision_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(operator)
        .with(decision_log)
        .try_init()
        .context("install tracing subscriber")?;

    Ok(())
}
