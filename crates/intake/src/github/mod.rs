//! GitHub source: repositories, issues, pull requests, commits and releases.
//!
//! # Module Structure
//!
//! - [`types`] - Rate limit payloads and API constants
//! - [`client`] - Client creation, scope resolution and per-resource fetchers
//! - [`convert`] - Raw GitHub items to [`Document`](crate::platform::Document)s
//!
//! # Example
//!
//! ```ignore
//! use intake::github::GitHubClient;
//! use intake::platform::{ClientOptions, ResourceType, Scope};
//! use intake::sync::{PullOrchestrator, PullSpec};
//!
//! let client = GitHubClient::new(&token, ClientOptions::default())?;
//! let puller = PullOrchestrator::new(client);
//! let spec = PullSpec::new(
//!     Scope::Owner { owner: "rust-lang".into(), repo: Some("cargo".into()) },
//!     [ResourceType::Repository, ResourceType::Issue],
//! );
//! let outcome = puller.pull(&spec, None).await?;
//! ```

mod client;
pub mod convert;
pub mod types;

pub use client::{GitHubClient, REPOSITORY_KEY};
pub use types::{
    DEFAULT_API_URL, GitHubRateLimitResponse, GitHubRateLimits, RAW_MEDIA_TYPE, RateLimitResource,
};
