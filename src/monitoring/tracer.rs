/*!
 * Decision Tracing
 * Structured tracing for mediation decisions using the tracing crate
 */

use tracing::{span, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - LABELGATE_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("LABELGATE_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        tracing::info!(json = use_json, "decision tracing initialized");
    }
}

/// Generate a unique trace ID for decision correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Debug span around one mediation decision
pub fn span_decision(op: &str, class: &str, label: &str) -> Span {
    span!(
        Level::DEBUG,
        "decision",
        trace_id = %generate_trace_id(),
        op = op,
        class = class,
        label = label,
        verdict = tracing::field::Empty,
    )
}
