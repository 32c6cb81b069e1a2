//! Confluence Cloud source: spaces, pages, blog posts, attachments, comments
//! and inline tasks.
//!
//! # Module Structure
//!
//! - [`types`] - API constants and CQL builders
//! - [`client`] - Client creation, space resolution and per-resource fetchers
//! - [`convert`] - Raw Confluence items to [`Document`](crate::platform::Document)s
//!
//! # Example
//!
//! ```ignore
//! use intake::confluence::ConfluenceClient;
//! use intake::platform::{ClientOptions, ResourceType, Scope, SourceKind};
//! use intake::sync::{PullOrchestrator, PullSpec};
//!
//! let options = ClientOptions::for_source(SourceKind::Confluence);
//! let client = ConfluenceClient::new("https://acme.atlassian.net", &email, &token, options)?;
//! let spec = PullSpec::new(
//!     Scope::Space { key: Some("ENG".into()) },
//!     [ResourceType::Page, ResourceType::Comment],
//! );
//! let outcome = PullOrchestrator::new(client).pull(&spec, None).await?;
//! ```

mod client;
pub mod convert;
pub mod types;

pub use client::ConfluenceClient;
pub use convert::storage_to_text;
