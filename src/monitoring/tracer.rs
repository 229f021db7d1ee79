/*!
 * Structured Tracing
 * Subscriber setup and timed spans for heap operations
 */

use std::time::{Duration, Instant};
use tracing::{debug, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Operations slower than this are reported at WARN
const SLOW_OPERATION: Duration = Duration::from_millis(10);

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceFormat {
    #[default]
    Compact,
    Json,
}

impl TraceFormat {
    /// REMOTE_HEAP_TRACE_JSON=1|true selects JSON output
    pub fn from_env() -> Self {
        match std::env::var("REMOTE_HEAP_TRACE_JSON").as_deref() {
            Ok("1") | Ok("true") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - REMOTE_HEAP_TRACE_JSON: Enable JSON output (default: false)
///
/// A subscriber installed earlier (e.g. by a test harness) is left in place.
pub fn init_tracing() {
    let format = TraceFormat::from_env();
    match try_init_tracing(format) {
        Ok(()) => debug!(?format, "Structured tracing initialized"),
        Err(e) => debug!(error = %e, "Tracing subscriber already installed"),
    }
}

/// Install the global subscriber with `format`
pub fn try_init_tracing(
    format: TraceFormat,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        TraceFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        TraceFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .compact(),
            )
            .try_init(),
    }
}

/// Timed span around one heap operation
///
/// Logs the elapsed time when dropped; slow operations are logged at WARN.
pub struct HeapSpan {
    span: Span,
    start: Instant,
    operation: &'static str,
}

impl HeapSpan {
    pub fn new(operation: &'static str, live_blocks: usize, free_ranges: usize) -> Self {
        let span = span!(
            Level::DEBUG,
            "heap_op",
            operation,
            live_blocks,
            free_ranges,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            operation,
        }
    }

    /// Enter the span so events inside it carry its fields
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn record_result(&self, success: bool) {
        self.span.record("result", if success { "success" } else { "error" });
    }
}

impl Drop for HeapSpan {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.span.record("duration_us", elapsed.as_micros() as u64);
        let _entered = self.span.enter();

        if elapsed > SLOW_OPERATION {
            warn!(
                operation = self.operation,
                duration_ms = elapsed.as_millis() as u64,
                slow = true,
                "Slow heap operation"
            );
        } else {
            debug!(
                operation = self.operation,
                duration_us = elapsed.as_micros() as u64,
                "Heap operation completed"
            );
        }
    }
}
