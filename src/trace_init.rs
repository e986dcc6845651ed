//! Structured trace output for recognition runs.
//!
//! With the `trace` feature the frame loop spans of `hark_core`, the
//! lattice and sausage spans of `hark_lattice` and the utterance span of
//! [`crate::Recognizer`] are written as JSON lines, one span close per
//! line. `RUST_LOG` overrides the default filter. Without the feature
//! every event is compiled out and [`init_tracing`] does nothing.

#[cfg(feature = "trace")]
use std::path::Path;
#[cfg(feature = "trace")]
use std::sync::Once;

/// File created in the log directory.
pub const TRACE_FILE: &str = "hark-trace.jsonl";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "hark_engine=debug,hark_core=debug,hark_lattice=debug";

#[cfg(feature = "trace")]
static INIT: Once = Once::new();

/// Installs the global subscriber writing [`TRACE_FILE`] into `log_dir`.
/// Later calls, including ones with another directory, are ignored.
#[cfg(feature = "trace")]
pub fn init_tracing(log_dir: &Path) {
    INIT.call_once(|| {
        let file_appender = tracing_appender::rolling::never(log_dir, TRACE_FILE);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // the recognizer may decode until the process exits
        std::mem::forget(guard);

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
        tracing_subscriber::fmt()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .with_env_filter(filter)
            .init();
    });
}

#[cfg(not(feature = "trace"))]
pub fn init_tracing(_log_dir: &std::path::Path) {}
