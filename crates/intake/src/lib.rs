//! Intake - resilient document ingestion from SaaS APIs.
//!
//! This library pulls records from GitHub (repositories, issues, pull
//! requests, commits, releases) and Confluence (spaces, pages, blog posts,
//! attachments, comments, inline tasks) and normalizes them into one
//! [`Document`] shape. Every upstream call goes through a shared rate-limit
//! budget and a bounded retry loop; a pull that partially fails still returns
//! what it collected along with per-type reports.
//!
//! # Features
//!
//! - `github` - GitHub REST client (default)
//! - `confluence` - Confluence Cloud REST client (default)
//!
//! # Example
//!
//! ```ignore
//! use intake::github::GitHubClient;
//! use intake::{ClientOptions, PullOrchestrator, PullSpec, ResourceType, Scope, SourceKind};
//!
//! let client = GitHubClient::new(&token, ClientOptions::for_source(SourceKind::GitHub))?;
//! let puller = PullOrchestrator::new(client);
//! let spec = PullSpec::new(
//!     Scope::Owner { owner: "rust-lang".into(), repo: Some("cargo".into()) },
//!     [ResourceType::PullRequest],
//! )
//! .since(last_run);
//! let outcome = puller.pull(&spec, None).await?;
//! for report in &outcome.resources {
//!     println!("{}: {} documents", report.resource_type, report.documents);
//! }
//! ```

pub mod clock;
pub mod http;
pub mod platform;
pub mod retry;
pub mod sync;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "confluence")]
pub mod confluence;

pub use platform::{
    ApiRateLimiter, Author, ClientOptions, Document, ErrorKind, IngestError, RateLimitInfo,
    RateLimitSettings, RateLimitState, RepoRef, ResourceType, Scope, SourceClient, SourceKind,
    Target, normalize, rate_limits,
};
pub use retry::{RetryExecutor, RetryPolicy};
pub use sync::{PullOrchestrator, PullOutcome, PullProgress, PullSpec, ResourceReport};
