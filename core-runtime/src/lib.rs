//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the photo transfer core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the transfer core and the
//! binary depend on. It establishes the logging conventions, the validated
//! run configuration, and the event broadcasting used to observe a run.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
