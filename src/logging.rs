//! Diagnostic tracing for embedders of the engine.
//!
//! The engine only emits `tracing` events; nothing is printed unless a
//! subscriber is installed. Execution results travel in `ExecutionReport`,
//! not in logs.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format. Panics if a global subscriber is
/// already set.
///
/// # Example
/// ```bash
/// RUST_LOG=reorganize=debug my-organizer apply plan.jsonl
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Like [`init`], but a no-op when a subscriber is already installed.
pub fn try_init() -> bool {
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .is_ok()
}
