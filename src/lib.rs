#![cfg_attr(docsrs, feature(doc_auto_cfg))]
//! Remote resources kept fresh in the background.
//!
//! A [`ResourceRefresher`] owns one remote JSON resource: it decides when to fetch it,
//! sends conditional requests through a [`ResourceRetriever`] (which retries transient
//! failures), backs off a failing endpoint with an [`ErrorCooldown`], persists what it
//! loads in a [`DiskStorage`](storage::DiskStorage) and notifies a delegate.
//!
//! ```no_run
//! # #[cfg(feature = "http")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use serde::{Deserialize, Serialize};
//! use remote_resource::{EtagResource, RefreshParameters, ResourceRefresher, ResourceRetriever};
//! use remote_resource::storage::FileStorage;
//! use remote_resource::transport::http::ReqwestTransport;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Blocklist {
//!     events: Vec<String>,
//!     #[serde(default)]
//!     etag: Option<String>,
//! }
//!
//! impl EtagResource for Blocklist {
//!     fn etag(&self) -> Option<&str> {
//!         self.etag.as_deref()
//!     }
//! }
//!
//! let retriever = ResourceRetriever::new(ReqwestTransport::default(), |data, etag| {
//!     let mut blocklist: Blocklist = serde_json::from_slice(data).ok()?;
//!     blocklist.etag = etag.map(str::to_owned);
//!     Some(blocklist)
//! });
//! let parameters = RefreshParameters::new("blocklist", "https://example.com/blocklist.json")
//!     .with_refresh_interval(Duration::from_secs(900))
//!     .with_error_cooldown_base_interval(Some(Duration::from_secs(30)));
//! let refresher = ResourceRefresher::new(
//!     retriever,
//!     Arc::new(FileStorage::new("/tmp/remote_resource")?),
//!     parameters,
//!     tokio::runtime::Handle::current(),
//! );
//!
//! let cached = refresher.read_resource();
//! refresher.request_refresh();
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod log;

/// Refresh and retry configuration
pub mod config;
/// Error cooldown for failing endpoints
pub mod cooldown;
/// Error taxonomy
pub mod error;
/// Cached list of items from a local or remote location
pub mod items;
/// Refresh orchestration for a single resource
pub mod refresher;
/// Resource capabilities and common resource types
pub mod resource;
/// Conditional, retryable resource fetching
pub mod retriever;
/// Durable storage for loaded resources.
/// Public traits are included to allow easy use of custom implementations.
pub mod storage;
/// HTTP transport used by the retriever.
/// Public traits are included to allow easy use of custom implementations.
pub mod transport;

pub use config::{RefreshParameters, RetryPolicy};
pub use cooldown::ErrorCooldown;
pub use error::{RetrieverError, StorageError, TransportError};
pub use items::{ItemsFileLocation, ItemsProvider, ItemsProviderDelegate};
pub use refresher::{ResourceRefresher, ResourceRefresherDelegate};
pub use resource::{EtagResource, ItemsFile};
pub use retriever::{ResourceBuilder, ResourceRetriever};
