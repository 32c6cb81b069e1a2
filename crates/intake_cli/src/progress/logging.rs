use intake::sync::PullProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: PullProgress) {
        match event {
            PullProgress::PullStarted {
                source,
                resource_types,
            } => {
                let types: Vec<&str> = resource_types.iter().map(|rt| rt.as_str()).collect();
                tracing::info!(source = %source, types = %types.join(","), "Starting pull");
            }

            PullProgress::RateLimitRefreshed { remaining, limit } => {
                tracing::info!(remaining, limit, "Rate limit budget");
            }

            PullProgress::RateLimitWait { label, wait_ms } => {
                tracing::warn!(operation = %label, wait_ms, "Budget low, waiting for reset");
            }

            PullProgress::ScopeResolved { targets } => {
                tracing::info!(targets, "Resolved scope");
            }

            PullProgress::FetchingResource { resource, target } => {
                tracing::debug!(resource = %resource, target = %target, "Fetching");
            }

            PullProgress::FetchedPage {
                resource,
                target,
                page,
                count,
                total_so_far,
            } => {
                tracing::debug!(resource = %resource, target = %target, page, count, total_so_far, "Fetched page");
            }

            PullProgress::RetryBackoff {
                label,
                attempt,
                kind,
                delay_ms,
            } => {
                tracing::warn!(operation = %label, attempt, kind = %kind, delay_ms, "Retrying after failure");
            }

            PullProgress::Recovered { label, attempts } => {
                tracing::info!(operation = %label, attempts, "Recovered");
            }

            PullProgress::ResourceComplete {
                resource,
                documents,
                truncated,
            } => {
                if truncated {
                    tracing::warn!(resource = %resource, documents, "Resource complete (truncated)");
                } else {
                    tracing::info!(resource = %resource, documents, "Resource complete");
                }
            }

            PullProgress::ResourceFailed {
                resource,
                target,
                error,
            } => {
                tracing::error!(resource = %resource, target = %target, error = %error, "Resource failed");
            }

            PullProgress::DeadlineReached { resource } => {
                tracing::warn!(resource = %resource, "Timeout reached, returning partial batch");
            }

            PullProgress::PullComplete {
                documents,
                failed_types,
            } => {
                if failed_types.is_empty() {
                    tracing::info!(documents, "Pull complete");
                } else {
                    let failed: Vec<&str> = failed_types.iter().map(|rt| rt.as_str()).collect();
                    tracing::warn!(documents, failed = %failed.join(","), "Pull complete with failures");
                }
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
