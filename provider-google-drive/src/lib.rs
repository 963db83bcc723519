//! # Google Drive Provider
//!
//! Implements the `PhotoDestination` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Paged listing of photos with their image metadata
//! - Per-file metadata lookup for listings that omit it
//! - Multipart uploads into an optional parent folder
//! - Rate limiting and exponential backoff for reads

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};
