//! Dropbox API connector implementation
//!
//! Implements the `PhotoSource` trait for Dropbox API v2.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::photos::{FolderPage, PhotoMetadata, PhotoSource, SourceEntry};
use bridge_traits::storage::FileSystemAccess;
use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::DropboxError;
use crate::types::{
    ApiErrorResponse, DownloadArg, ListFolderArg, ListFolderContinueArg, ListFolderResult,
    MediaInfo, Metadata,
};

/// Dropbox RPC endpoint base URL
const API_BASE: &str = "https://api.dropboxapi.com/2";

/// Dropbox content endpoint base URL
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// Attempts per request before giving up on 429/5xx
const MAX_RETRIES: u32 = 3;

/// Capture time layout shared with the destination's EXIF-style timestamps
const CAPTURE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Dropbox API connector
///
/// Implements `PhotoSource` for Dropbox API v2.
///
/// # Features
///
/// - Folder listing with photo dimensions and capture time
/// - Cursor-based continuation of large folders
/// - Downloads written through `FileSystemAccess`
/// - Exponential backoff for rate limiting
///
/// # Example
///
/// ```ignore
/// use provider_dropbox::DropboxConnector;
/// use bridge_traits::photos::PhotoSource;
///
/// let connector = DropboxConnector::new(http_client, file_system, access_token);
/// let page = connector.list_folder("/Photos", None).await?;
/// ```
pub struct DropboxConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Where downloads are written
    file_system: Arc<dyn FileSystemAccess>,

    /// OAuth 2.0 access token
    access_token: String,
}

impl DropboxConnector {
    /// Create a new Dropbox connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `file_system` - File system used to store downloads
    /// * `access_token` - Dropbox access token with `files.content.read` scope
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        file_system: Arc<dyn FileSystemAccess>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            file_system,
            access_token: access_token.into(),
        }
    }

    /// Convert a Dropbox entry; deleted entries are dropped
    fn convert_entry(entry: Metadata) -> Option<SourceEntry> {
        match entry {
            Metadata::Folder(folder) => {
                let path = folder
                    .path_display
                    .or(folder.path_lower)
                    .unwrap_or(folder.name);
                Some(SourceEntry::folder(path))
            }
            Metadata::File(file) => {
                let path = file.path_display.or(file.path_lower).unwrap_or(file.name);
                let metadata = file.media_info.and_then(Self::convert_media_info);
                Some(SourceEntry::file(path, metadata))
            }
            Metadata::Deleted(deleted) => {
                debug!(name = %deleted.name, "Ignoring deleted entry");
                None
            }
        }
    }

    fn convert_media_info(media_info: MediaInfo) -> Option<PhotoMetadata> {
        match media_info {
            MediaInfo::Pending => None,
            MediaInfo::Metadata { metadata } => Some(PhotoMetadata {
                height: metadata.dimensions.map(|d| d.height),
                width: metadata.dimensions.map(|d| d.width),
                capture_time: metadata.time_taken.as_deref().map(Self::format_time_taken),
            }),
        }
    }

    /// Render an ISO 8601 `time_taken` as `YYYY:MM:DD HH:MM:SS`
    fn format_time_taken(raw: &str) -> String {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return parsed.naive_local().format(CAPTURE_TIME_FORMAT).to_string();
        }
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return parsed.format(CAPTURE_TIME_FORMAT).to_string();
        }
        warn!(time_taken = raw, "Unrecognized capture time, using it verbatim");
        raw.to_string()
    }

    /// Build an RPC request with a JSON body
    fn rpc_request<T: Serialize>(&self, endpoint: &str, arg: &T) -> Result<HttpRequest> {
        HttpRequest::new(HttpMethod::Post, format!("{}/{}", API_BASE, endpoint))
            .bearer_token(&self.access_token)
            .timeout(Duration::from_secs(30))
            .json(arg)
    }

    /// Map a non-success response to a provider error
    fn error_for(status: u16, body: &[u8], path: &str) -> DropboxError {
        let message = serde_json::from_slice::<ApiErrorResponse>(body)
            .map(|e| e.error_summary)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).to_string());

        match status {
            401 => DropboxError::AuthenticationFailed(message),
            409 if message.contains("not_found") => DropboxError::PathNotFound {
                path: path.to_string(),
            },
            _ => DropboxError::ApiError {
                status_code: status,
                message,
            },
        }
    }

    /// Execute an API request, retrying rate limits and server errors
    ///
    /// Listing and download calls are idempotent, so every call made here is
    /// safe to repeat.
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn execute_with_retry(&self, request: HttpRequest, path: &str) -> Result<HttpResponse> {
        let policy = RetryPolicy {
            max_attempts: MAX_RETRIES,
            ..RetryPolicy::default()
        };
        let response = self.http_client.execute_with_retry(request, policy).await?;

        if response.is_success() {
            debug!("API request succeeded: status={}", response.status);
            return Ok(response);
        }

        warn!("API request failed: status={}", response.status);
        let error = if response.status == 429 {
            DropboxError::RateLimitExceeded {
                attempts: MAX_RETRIES,
            }
        } else {
            Self::error_for(response.status, &response.body, path)
        };
        Err(error.into())
    }
}

/// JSON for the `Dropbox-API-Arg` header, with non-ASCII characters escaped
fn header_safe_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)
        .map_err(|e| DropboxError::ParseError(format!("Failed to encode argument: {}", e)))?;

    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(escaped)
}

#[async_trait]
impl PhotoSource for DropboxConnector {
    #[instrument(skip(self), fields(path = %path))]
    async fn list_folder(&self, path: &str, cursor: Option<String>) -> Result<FolderPage> {
        let request = match &cursor {
            Some(cursor) => self.rpc_request(
                "files/list_folder/continue",
                &ListFolderContinueArg { cursor },
            )?,
            None => self.rpc_request(
                "files/list_folder",
                &ListFolderArg {
                    path,
                    include_media_info: true,
                },
            )?,
        };

        let response = self.execute_with_retry(request, path).await?;
        let result: ListFolderResult = serde_json::from_slice(&response.body).map_err(|e| {
            DropboxError::ParseError(format!("Failed to parse list_folder response: {}", e))
        })?;

        let entries: Vec<SourceEntry> = result
            .entries
            .into_iter()
            .filter_map(Self::convert_entry)
            .collect();
        let next_cursor = result.has_more.then_some(result.cursor);

        debug!(
            entries = entries.len(),
            has_more = next_cursor.is_some(),
            "Listed Dropbox folder page"
        );

        Ok(FolderPage {
            entries,
            next_cursor,
        })
    }

    #[instrument(skip(self, local_destination), fields(path = %path))]
    async fn download(&self, path: &str, local_destination: &Path) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/files/download", CONTENT_BASE))
            .bearer_token(&self.access_token)
            .header("Dropbox-API-Arg", header_safe_json(&DownloadArg { path })?)
            .timeout(Duration::from_secs(300));

        let response = self.execute_with_retry(request, path).await?;
        let size = response.body.len();
        self.file_system
            .write_file(local_destination, response.body)
            .await?;

        info!(size, to = %local_destination.display(), "Downloaded file");
        Ok(())
    }
}
