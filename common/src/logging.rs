//! Structured logging setup, shared by every binary in the workspace so the
//! gate and lobby acceptors produce consistently-shaped log lines.

/// Initialises `tracing` from `RUST_LOG` (defaulting to `info`), selecting
/// JSON output when `LOG_FORMAT=json` is set and human-readable compact
/// output otherwise, and installs a panic hook that logs panics with a
/// captured backtrace instead of letting them print to stderr unstructured.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}
