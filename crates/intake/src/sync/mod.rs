//! Pull orchestration shared by all sources.
//!
//! # Module Structure
//!
//! - [`types`] - Pull spec, outcome, per-type reports, constants
//! - [`progress`] - Progress reporting: `PullProgress`, `emit()`
//! - [`engine`] - `PullOrchestrator`: validate, refresh, resolve, fetch, normalize
//!
//! # Example
//!
//! ```ignore
//! use intake::github::GitHubClient;
//! use intake::platform::{ClientOptions, ResourceType, Scope, SourceKind};
//! use intake::sync::{PullOrchestrator, PullSpec};
//!
//! let client = GitHubClient::new(&token, ClientOptions::for_source(SourceKind::GitHub))?;
//! let puller = PullOrchestrator::new(client);
//! let spec = PullSpec::new(
//!     Scope::Owner { owner: "my-org".into(), repo: None },
//!     [ResourceType::Repository, ResourceType::Release],
//! );
//! let outcome = puller.pull(&spec, None).await?;
//! println!("{} documents, resume from {}", outcome.documents.len(), outcome.next_since);
//! ```

pub mod engine;
mod progress;
mod types;

// Re-export types
pub use types::{
    FetchLimits, PullOutcome, PullSpec, ResourceCursor, ResourceReport, TargetFailure,
};

// Re-export constants
pub use types::{
    DEFAULT_COMMIT_CAP, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE,
    DESCRIPTION_EXCERPT_CHARS, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, RATE_LIMIT_WINDOW_MS,
};

// Re-export progress types
pub use crate::platform::ProgressCallback;
pub use progress::{PullProgress, emit};

pub use engine::PullOrchestrator;
