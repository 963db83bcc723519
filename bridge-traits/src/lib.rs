//! # Host Bridge Traits
//!
//! Capability traits that the transfer core consumes and that provider or
//! platform crates implement.
//!
//! ## Overview
//!
//! The core never talks to a cloud API or to the local disk directly. Each
//! external concern is a trait defined here, so the skip/copy logic can be
//! exercised against in-memory fakes and wired to real services by the binary.
//!
//! ## Traits
//!
//! ### Photo services
//! - [`PhotoSource`](photos::PhotoSource) - Paged folder listing and downloads (e.g. Dropbox)
//! - [`PhotoDestination`](photos::PhotoDestination) - Paged photo listing, metadata and uploads (e.g. Google Drive)
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Local file I/O for state files and scratch copies
//!
//! ### Logging
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to a host logger
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert their own errors into it and keep the message actionable
//! (status codes, paths, ids).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! behind `Arc` across async tasks.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::photos::{FolderPage, PhotoSource};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//! use std::path::Path;
//!
//! struct LocalSource;
//!
//! #[async_trait]
//! impl PhotoSource for LocalSource {
//!     async fn list_folder(&self, path: &str, cursor: Option<String>) -> Result<FolderPage> {
//!         todo!()
//!     }
//!
//!     async fn download(&self, path: &str, local_destination: &Path) -> Result<()> {
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod logging;
pub mod photos;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use photos::{
    DestinationPhoto, EntryKind, FolderPage, PhotoDestination, PhotoMetadata, PhotoPage,
    PhotoSource, SourceEntry, UploadOutcome,
};
pub use storage::FileSystemAccess;
pub use logging::{LogEntry, LogLevel, LoggerSink};
