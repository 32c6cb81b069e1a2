//! Progress reporting types for pulls.
//!
//! Events are delivered through an optional callback so front ends can render
//! or log them without the library knowing how.

use crate::platform::{ErrorKind, ProgressCallback, ResourceType, SourceKind};

/// Progress events emitted during a pull.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum PullProgress {
    /// A pull passed validation and is starting.
    PullStarted {
        /// Source being pulled.
        source: SourceKind,
        /// Requested resource types, in processing order.
        resource_types: Vec<ResourceType>,
    },

    /// Rate-limit state was refreshed at the start of a pull.
    RateLimitRefreshed {
        /// Requests remaining in the window.
        remaining: usize,
        /// Window size.
        limit: usize,
    },

    /// The budget ran low and the pull waited for the window reset.
    RateLimitWait {
        /// Operation that was about to run.
        label: String,
        /// Time waited in milliseconds.
        wait_ms: u64,
    },

    /// Scope was expanded into concrete targets.
    ScopeResolved {
        /// Number of repositories or spaces.
        targets: usize,
    },

    /// Starting to fetch one resource type for one target.
    FetchingResource {
        /// Resource type being fetched.
        resource: ResourceType,
        /// Repository full name or space key.
        target: String,
    },

    /// Fetched a page of items.
    FetchedPage {
        /// Resource type the page belongs to.
        resource: ResourceType,
        /// Repository full name or space key.
        target: String,
        /// Page number (1-indexed).
        page: u32,
        /// Items on this page.
        count: usize,
        /// Running total of kept items for this walk.
        total_so_far: usize,
    },

    /// A retryable failure is being backed off.
    RetryBackoff {
        /// Operation being retried.
        label: String,
        /// Attempt that just failed (1-indexed).
        attempt: u32,
        /// Classification of the failure.
        kind: ErrorKind,
        /// Delay before the next attempt in milliseconds.
        delay_ms: u64,
    },

    /// An operation succeeded after at least one failed attempt.
    Recovered {
        /// Operation that recovered.
        label: String,
        /// Attempt that succeeded.
        attempts: u32,
    },

    /// Finished one resource type.
    ResourceComplete {
        /// Resource type.
        resource: ResourceType,
        /// Documents added to the batch.
        documents: usize,
        /// Whether a page cap or the deadline cut the walk short.
        truncated: bool,
    },

    /// One target of one resource type failed; the pull continues.
    ResourceFailed {
        /// Resource type.
        resource: ResourceType,
        /// Repository full name, space key, or `scope`.
        target: String,
        /// Error message.
        error: String,
    },

    /// The pull's timeout elapsed; remaining work is skipped.
    DeadlineReached {
        /// First resource type that did not finish.
        resource: ResourceType,
    },

    /// The pull finished.
    PullComplete {
        /// Documents in the batch.
        documents: usize,
        /// Resource types that recorded failures.
        failed_types: Vec<ResourceType>,
    },
}

/// Helper to emit progress events if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: PullProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
