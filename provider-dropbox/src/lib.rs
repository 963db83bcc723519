//! # Dropbox Provider
//!
//! Implements the `PhotoSource` trait for the Dropbox API v2.
//!
//! ## Overview
//!
//! This module provides:
//! - Paged folder listing with photo media info (`files/list_folder`)
//! - Cursor continuation (`files/list_folder/continue`)
//! - Downloads through the content endpoint into local files
//! - Exponential backoff on rate limiting and server errors

pub mod connector;
pub mod error;
pub mod types;

pub use connector::DropboxConnector;
pub use error::{DropboxError, Result};
