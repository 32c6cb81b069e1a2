//! Progress reporting for pulls.
//!
//! Pull events are rendered as structured `tracing` output on stderr, leaving
//! stdout for the JSON result.

mod logging;

use std::sync::Arc;

use intake::sync::ProgressCallback;

pub use logging::LoggingReporter;

/// Wrap a reporter into the callback the library expects.
pub fn as_callback(reporter: &Arc<LoggingReporter>) -> ProgressCallback {
    let reporter = Arc::clone(reporter);
    Box::new(move |event| reporter.handle(event))
}
