use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::RunMode;

const DEFAULT_FILTER: &str = "info,sqlx=warn,kube_runtime=warn";

/// Initialize logging for the given run mode: JSON lines in release, pretty in development.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing(mode: RunMode) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(DEFAULT_FILTER)
            .wrap_err_with(|| format!("Invalid log filter: {DEFAULT_FILTER}"))?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    match mode {
        RunMode::Release => Registry::default()
            .with(env_filter)
            .with(
                fmt_layer
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?,
        RunMode::Development => Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?,
    }

    tracing::info!(?mode, "keel logging initialized");
    Ok(())
}

/// Create a request-scoped span for business-handler execution
pub fn create_request_span(method: &str, path: &str, trace_id: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        http.method = method,
        http.path = path,
        trace_id = trace_id,
        http.status_code = tracing::field::Empty,
    )
}
