/*!
 * Tracing
 * Structured logging setup and the per-session span
 *
 * Features:
 * - Session ID generation for correlating every event of one run
 * - JSON-formatted logs for structured parsing
 * - Human-readable compact output by default
 */

use std::time::Instant;
use tracing::{info, span, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::core::Pid;

/// Initialize structured tracing
///
/// Logs go to stderr so stdout stays free for process listings and prompts.
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - MEMWATCH_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("MEMWATCH_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "tracing initialized");
    }
}

/// Generate a unique ID for correlating one monitoring session
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one monitoring session
///
/// Every sample, rotation and shutdown event is recorded inside it, so the
/// session ID shows up on each line in JSON mode.
pub struct SessionSpan {
    span: Span,
    start: Instant,
    session_id: String,
}

impl SessionSpan {
    pub fn new(pid: Pid, process_name: &str) -> Self {
        let session_id = generate_session_id();
        let span = span!(
            Level::INFO,
            "session",
            session_id = %session_id,
            pid = pid,
            process = process_name,
        );

        Self {
            span,
            start: Instant::now(),
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The underlying span, for instrumenting the session future
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for SessionSpan {
    fn drop(&mut self) {
        let _entered = self.span.enter();
        info!(
            session_id = %self.session_id,
            elapsed_secs = self.start.elapsed().as_secs(),
            "session span closed"
        );
    }
}
