//! # Transfer Configuration
//!
//! One validated configuration for a transfer run, built once and passed to
//! every component.
//!
//! ## Overview
//!
//! [`TransferConfig`] is constructed either through [`TransferConfig::builder`]
//! or from a YAML file with [`TransferConfig::from_yaml_file`]. Both paths end
//! in [`TransferConfigBuilder::build`], which validates fail-fast and returns
//! actionable error messages.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::TransferConfig;
//!
//! let config = TransferConfig::builder()
//!     .source_token("dropbox-access-token")
//!     .destination_token("google-access-token")
//!     .source_root("/Photos")
//!     .source_root("/Camera Uploads")
//!     .destination_folder_id("0B8NZdrRKKIkB")
//!     .build()?;
//! ```
//!
//! ## YAML format
//!
//! ```yaml
//! dropbox-token: "sl.xxxxx"          # or: source: { access_token: ... }
//! google:
//!   access_token: "ya29.xxxxx"
//! roots: ["/Photos/", "/Camera Uploads/"]
//! destination_folder_id: "0B8NZdrRKKIkB"
//! checkpoint_path: "processed_hashes.json"
//! destination_index_path: "persist_hashes.json"
//! unfingerprinted_policy: skip
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default file holding the destination fingerprint index
pub const DEFAULT_DESTINATION_INDEX_PATH: &str = "destination_index.json";

/// Default file holding fingerprints copied by previous runs
pub const DEFAULT_CHECKPOINT_PATH: &str = "processed_fingerprints.json";

/// Default Google Drive space listed for existing photos
pub const DEFAULT_DESTINATION_SPACE: &str = "photos";

/// Default photo extensions (matched case-insensitively)
pub const DEFAULT_PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Access credentials for one photo service.
///
/// The token never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// What to do with source photos that have no fingerprint
/// (missing height or width).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnfingerprintedPolicy {
    /// Leave them at the source
    #[default]
    Skip,
    /// Copy them on every run under their source file name
    Copy,
}

impl UnfingerprintedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Copy => "copy",
        }
    }
}

impl FromStr for UnfingerprintedPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "copy" => Ok(Self::Copy),
            other => Err(Error::Config(format!(
                "Unknown unfingerprinted policy '{}', expected 'skip' or 'copy'",
                other
            ))),
        }
    }
}

impl fmt::Display for UnfingerprintedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one transfer run.
///
/// Use [`TransferConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Credentials for the source (Dropbox)
    pub source_credentials: Credentials,

    /// Credentials for the destination (Google Drive)
    pub destination_credentials: Credentials,

    /// Source folders walked in order, normalized without trailing slash
    pub source_roots: Vec<String>,

    /// Destination folder that receives uploads
    pub destination_folder_id: Option<String>,

    /// Destination space listed when building the fingerprint index
    pub destination_space: String,

    /// Persisted destination fingerprint index
    pub destination_index_path: PathBuf,

    /// Persisted fingerprints of photos copied by this tool
    pub checkpoint_path: PathBuf,

    /// Parent of the per-run scratch directories
    pub scratch_dir: PathBuf,

    /// Lowercase file extensions treated as photos, without leading dot
    pub photo_extensions: Vec<String>,

    /// Handling of photos without a fingerprint
    pub unfingerprinted_policy: UnfingerprintedPolicy,

    /// Rescan the destination even when the persisted index is complete
    pub rescan_completed_index: bool,

    /// Maximum destination index pages fetched per run
    pub index_page_limit: Option<u32>,
}

impl TransferConfig {
    /// Creates a new builder for constructing a `TransferConfig`.
    pub fn builder() -> TransferConfigBuilder {
        TransferConfigBuilder::default()
    }

    /// Loads and validates a YAML configuration file.
    ///
    /// Paths in the file are used as written, relative to the process
    /// working directory.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parses and validates YAML configuration text.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(contents)
            .map_err(|e| Error::Config(format!("Invalid YAML configuration: {}", e)))?;
        file.into_builder().build()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Both access tokens are present
    /// - At least one source root is configured
    /// - State file paths are set and distinct
    /// - At least one photo extension is configured
    /// - The index page limit, when set, is positive
    pub fn validate(&self) -> Result<()> {
        if self.source_credentials.access_token.trim().is_empty() {
            return Err(Error::Config(
                "Source access token is empty. Set 'dropbox-token' (or source.access_token)."
                    .to_string(),
            ));
        }

        if self.destination_credentials.access_token.trim().is_empty() {
            return Err(Error::Config(
                "Destination access token is empty. Set google.access_token.".to_string(),
            ));
        }

        if self.source_roots.is_empty() {
            return Err(Error::Config(
                "No source roots configured. Add at least one folder under 'roots'.".to_string(),
            ));
        }

        if self.destination_index_path.as_os_str().is_empty() {
            return Err(Error::Config(
                "Destination index path cannot be empty".to_string(),
            ));
        }

        if self.checkpoint_path.as_os_str().is_empty() {
            return Err(Error::Config("Checkpoint path cannot be empty".to_string()));
        }

        if self.destination_index_path == self.checkpoint_path {
            return Err(Error::Config(format!(
                "Destination index and checkpoint must use different files (both are {})",
                self.checkpoint_path.display()
            )));
        }

        if self.scratch_dir.as_os_str().is_empty() {
            return Err(Error::Config("Scratch directory cannot be empty".to_string()));
        }

        if self.photo_extensions.is_empty() {
            return Err(Error::Config(
                "At least one photo extension must be configured".to_string(),
            ));
        }

        if self.destination_space.trim().is_empty() {
            return Err(Error::Config("Destination space cannot be empty".to_string()));
        }

        if self.index_page_limit == Some(0) {
            return Err(Error::Config(
                "Index page limit must be greater than 0 (omit it for no limit)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Returns true when `file_name` ends in `.<ext>` for one of `extensions`
/// (compared case-insensitively).
pub fn has_photo_extension(file_name: &str, extensions: &[String]) -> bool {
    let Some((stem, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() || stem.ends_with('/') {
        return false;
    }
    extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
}

fn normalize_root(root: &str) -> String {
    let trimmed = root.trim();
    let without_slash = trimmed.trim_end_matches('/');
    if without_slash.is_empty() {
        // Dropbox addresses the account root as ""
        return String::new();
    }
    if without_slash.starts_with('/') {
        without_slash.to_string()
    } else {
        format!("/{}", without_slash)
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Builder for [`TransferConfig`]
#[derive(Debug, Default)]
pub struct TransferConfigBuilder {
    source_credentials: Option<Credentials>,
    destination_credentials: Option<Credentials>,
    source_roots: Vec<String>,
    destination_folder_id: Option<String>,
    destination_space: Option<String>,
    destination_index_path: Option<PathBuf>,
    checkpoint_path: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    photo_extensions: Option<Vec<String>>,
    unfingerprinted_policy: UnfingerprintedPolicy,
    rescan_completed_index: Option<bool>,
    index_page_limit: Option<u32>,
}

impl TransferConfigBuilder {
    /// Sets the source access token.
    pub fn source_token(mut self, token: impl Into<String>) -> Self {
        self.source_credentials = Some(Credentials::new(token));
        self
    }

    /// Sets the destination access token.
    pub fn destination_token(mut self, token: impl Into<String>) -> Self {
        self.destination_credentials = Some(Credentials::new(token));
        self
    }

    /// Adds a source folder to walk. Trailing slashes are removed.
    pub fn source_root(mut self, root: impl AsRef<str>) -> Self {
        self.source_roots.push(normalize_root(root.as_ref()));
        self
    }

    /// Replaces all source folders.
    pub fn source_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.source_roots = roots
            .into_iter()
            .map(|r| normalize_root(r.as_ref()))
            .collect();
        self
    }

    /// Sets the destination folder that receives uploads.
    pub fn destination_folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.destination_folder_id = Some(folder_id.into());
        self
    }

    /// Sets the destination space listed for existing photos.
    pub fn destination_space(mut self, space: impl Into<String>) -> Self {
        self.destination_space = Some(space.into());
        self
    }

    pub fn destination_index_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.destination_index_path = Some(path.into());
        self
    }

    pub fn checkpoint_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    pub fn scratch_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.scratch_dir = Some(path.into());
        self
    }

    /// Sets the photo extensions. Leading dots and case are ignored.
    pub fn photo_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.photo_extensions = Some(
            extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        );
        self
    }

    pub fn unfingerprinted_policy(mut self, policy: UnfingerprintedPolicy) -> Self {
        self.unfingerprinted_policy = policy;
        self
    }

    pub fn rescan_completed_index(mut self, rescan: bool) -> Self {
        self.rescan_completed_index = Some(rescan);
        self
    }

    pub fn index_page_limit(mut self, limit: u32) -> Self {
        self.index_page_limit = Some(limit);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<TransferConfig> {
        let source_credentials = self.source_credentials.ok_or_else(|| {
            Error::Config(
                "Missing source credentials. Provide a Dropbox access token.".to_string(),
            )
        })?;
        let destination_credentials = self.destination_credentials.ok_or_else(|| {
            Error::Config(
                "Missing destination credentials. Provide a Google Drive access token."
                    .to_string(),
            )
        })?;

        let config = TransferConfig {
            source_credentials,
            destination_credentials,
            source_roots: self.source_roots,
            destination_folder_id: self.destination_folder_id.filter(|id| !id.is_empty()),
            destination_space: self
                .destination_space
                .unwrap_or_else(|| DEFAULT_DESTINATION_SPACE.to_string()),
            destination_index_path: self
                .destination_index_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DESTINATION_INDEX_PATH)),
            checkpoint_path: self
                .checkpoint_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_PATH)),
            scratch_dir: self
                .scratch_dir
                .unwrap_or_else(|| std::env::temp_dir().join("photo-transfer")),
            photo_extensions: self.photo_extensions.unwrap_or_else(|| {
                DEFAULT_PHOTO_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect()
            }),
            unfingerprinted_policy: self.unfingerprinted_policy,
            rescan_completed_index: self.rescan_completed_index.unwrap_or(true),
            index_page_limit: self.index_page_limit,
        };

        config.validate()?;
        Ok(config)
    }
}

/// On-disk shape of the YAML configuration file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(rename = "dropbox-token", default)]
    dropbox_token: Option<String>,
    #[serde(default, alias = "dropbox")]
    source: Option<Credentials>,
    #[serde(default, alias = "google")]
    destination: Option<Credentials>,
    #[serde(default, alias = "dropbox_dirs")]
    roots: Vec<String>,
    #[serde(default)]
    destination_folder_id: Option<String>,
    #[serde(default)]
    destination_space: Option<String>,
    #[serde(default)]
    destination_index_path: Option<PathBuf>,
    #[serde(default)]
    checkpoint_path: Option<PathBuf>,
    #[serde(default)]
    scratch_dir: Option<PathBuf>,
    #[serde(default)]
    photo_extensions: Option<Vec<String>>,
    #[serde(default)]
    unfingerprinted_policy: Option<UnfingerprintedPolicy>,
    #[serde(default)]
    rescan_completed_index: Option<bool>,
    #[serde(default)]
    index_page_limit: Option<u32>,
}

impl ConfigFile {
    fn into_builder(self) -> TransferConfigBuilder {
        let mut builder = TransferConfig::builder().source_roots(self.roots);

        // An explicit source section wins over the legacy top-level key
        if let Some(token) = self
            .source
            .map(|c| c.access_token)
            .or(self.dropbox_token)
        {
            builder = builder.source_token(token);
        }
        if let Some(destination) = self.destination {
            builder = builder.destination_token(destination.access_token);
        }
        if let Some(folder_id) = self.destination_folder_id {
            builder = builder.destination_folder_id(folder_id);
        }
        if let Some(space) = self.destination_space {
            builder = builder.destination_space(space);
        }
        if let Some(path) = self.destination_index_path {
            builder = builder.destination_index_path(path);
        }
        if let Some(path) = self.checkpoint_path {
            builder = builder.checkpoint_path(path);
        }
        if let Some(path) = self.scratch_dir {
            builder = builder.scratch_dir(path);
        }
        if let Some(extensions) = self.photo_extensions {
            builder = builder.photo_extensions(extensions);
        }
        if let Some(policy) = self.unfingerprinted_policy {
            builder = builder.unfingerprinted_policy(policy);
        }
        if let Some(rescan) = self.rescan_completed_index {
            builder = builder.rescan_completed_index(rescan);
        }
        if let Some(limit) = self.index_page_limit {
            builder = builder.index_page_limit(limit);
        }

        builder
    }
}
