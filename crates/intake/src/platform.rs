//! Source-agnostic building blocks shared by every upstream client.
//!
//! This module defines the [`SourceClient`] trait the pull orchestrator drives,
//! the [`Document`] model, error classification, the shared rate-limit budget,
//! and the request/pagination plumbing the GitHub and Confluence clients sit
//! on.
//!
//! # Example
//!
//! ```ignore
//! use intake::platform::{FetchContext, ResourceType, SourceClient, Target};
//!
//! async fn issues<C: SourceClient>(client: &C) -> intake::platform::Result<usize> {
//!     let target = Target::repository("rust-lang", "rust");
//!     let fetched = client
//!         .fetch(ResourceType::Issue, &target, &FetchContext::new(None))
//!         .await?;
//!     Ok(fetched.items.len())
//! }
//! ```

pub mod convert;
mod errors;
pub mod paginate;
mod rate_limit;
mod session;
mod types;

pub use convert::{normalize, strip_null_values};
pub use errors::{ErrorKind, FailureOrigin, IngestError, Result, UpstreamFailure, classify};
pub use paginate::{LinkPagination, PageRequest, PageStyle, Visit, parse_link_header};
pub use rate_limit::{
    ApiRateLimiter, RateLimitHeaders, RateLimitSettings, RateLimitState, parse_rate_limit_headers,
    rate_limits,
};
pub use session::{ApiSession, ClientOptions, JsonPage};
pub use types::{
    Author, Document, FetchContext, FetchedItems, ProgressCallback, RateLimitInfo, RepoRef,
    ResourceType, Scope, SourceClient, SourceKind, Target,
};
