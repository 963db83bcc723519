//! Google Drive API connector implementation
//!
//! Implements the `PhotoDestination` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::photos::{
    DestinationPhoto, PhotoDestination, PhotoMetadata, PhotoPage, UploadOutcome,
};
use bridge_traits::storage::FileSystemAccess;
use bytes::{BufMut, Bytes, BytesMut};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::types::{ApiErrorResponse, DriveFile, FilesListResponse, ImageMediaMetadata, UploadMetadata};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive upload API base URL
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Attempts per read request before giving up on 429/5xx
const MAX_RETRIES: u32 = 3;

/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,imageMediaMetadata";

/// Google Drive API connector
///
/// Implements `PhotoDestination` for Google Drive API v3.
///
/// # Features
///
/// - Paginated photo listing with image metadata
/// - Multipart upload with an optional parent folder
/// - Exponential backoff for rate limiting on reads
/// - OAuth 2.0 bearer authentication via `HttpClient`
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::photos::PhotoDestination;
///
/// let connector = GoogleDriveConnector::new(http_client, file_system, access_token)
///     .with_folder_id(Some("0B8NZdrRKKIkB".to_string()));
/// let page = connector.list_photos(None).await?;
/// ```
pub struct GoogleDriveConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Where upload sources are read from
    file_system: Arc<dyn FileSystemAccess>,

    /// OAuth 2.0 access token
    access_token: String,

    /// Corpus listed by `list_photos`
    space: String,

    /// Parent folder for uploads
    folder_id: Option<String>,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector listing the `photos` space
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `file_system` - File system uploads are read from
    /// * `access_token` - OAuth 2.0 access token with `drive` scope
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        file_system: Arc<dyn FileSystemAccess>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            file_system,
            access_token: access_token.into(),
            space: "photos".to_string(),
            folder_id: None,
        }
    }

    /// List a different space (`drive`, `photos`, `appDataFolder`)
    pub fn with_space(mut self, space: impl Into<String>) -> Self {
        self.space = space.into();
        self
    }

    /// Upload into this folder instead of the drive root
    pub fn with_folder_id(mut self, folder_id: Option<String>) -> Self {
        self.folder_id = folder_id;
        self
    }

    fn convert_metadata(metadata: ImageMediaMetadata) -> PhotoMetadata {
        PhotoMetadata {
            height: metadata.height,
            width: metadata.width,
            capture_time: metadata.time,
        }
    }

    fn convert_file(file: DriveFile) -> DestinationPhoto {
        DestinationPhoto {
            id: file.id,
            metadata: file.image_media_metadata.map(Self::convert_metadata),
        }
    }

    /// Extract the API's error message, falling back to the raw body
    fn error_message(body: &[u8]) -> String {
        serde_json::from_slice::<ApiErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).to_string())
    }

    fn media_type(file_name: &str) -> &'static str {
        match file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
            Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
            Some(ext) if ext == "png" => "image/png",
            Some(ext) if ext == "heic" => "image/heic",
            _ => "application/octet-stream",
        }
    }

    /// Build a `multipart/related` body of JSON metadata plus file content.
    ///
    /// Returns the body and its content type.
    fn multipart_body(metadata: &UploadMetadata<'_>, media_type: &str, content: &[u8]) -> Result<(Bytes, String)> {
        let json = serde_json::to_vec(metadata).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to encode upload metadata: {}", e))
        })?;
        let boundary = format!("photo_transfer_{}", uuid::Uuid::new_v4().simple());

        let mut body = BytesMut::with_capacity(json.len() + content.len() + 256);
        body.put_slice(format!("--{}\r\n", boundary).as_bytes());
        body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.put_slice(&json);
        body.put_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
        body.put_slice(format!("Content-Type: {}\r\n\r\n", media_type).as_bytes());
        body.put_slice(content);
        body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Ok((
            body.freeze(),
            format!("multipart/related; boundary={}", boundary),
        ))
    }

    /// Execute a read request with retry logic
    ///
    /// Rate limiting and server errors are retried with exponential backoff.
    /// Any other status is returned to the caller as a response.
    #[instrument(skip(self), fields(url = %url))]
    async fn get_with_retry(&self, url: String) -> Result<HttpResponse> {
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(&self.access_token)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(30));
        let policy = RetryPolicy {
            max_attempts: MAX_RETRIES,
            ..RetryPolicy::default()
        };

        let response = self.http_client.execute_with_retry(request, policy).await?;
        if response.status == 429 {
            warn!("API request still rate limited after {} attempts", MAX_RETRIES);
            return Err(GoogleDriveError::RateLimitExceeded {
                attempts: MAX_RETRIES,
            }
            .into());
        }

        debug!("API request finished: status={}", response.status);
        Ok(response)
    }

    fn check_status(response: &HttpResponse) -> Result<()> {
        match response.status {
            200..=299 => Ok(()),
            401 => Err(GoogleDriveError::AuthenticationFailed(Self::error_message(&response.body)).into()),
            status => Err(GoogleDriveError::ApiError {
                status_code: status,
                message: Self::error_message(&response.body),
            }
            .into()),
        }
    }
}

#[async_trait]
impl PhotoDestination for GoogleDriveConnector {
    #[instrument(skip(self))]
    async fn list_photos(&self, cursor: Option<String>) -> Result<PhotoPage> {
        let mut url = format!(
            "{}/files?spaces={}&q={}&pageSize={}&fields=nextPageToken,files({})",
            DRIVE_API_BASE,
            urlencoding::encode(&self.space),
            urlencoding::encode("trashed=false"),
            MAX_PAGE_SIZE,
            FILE_FIELDS
        );

        if let Some(page_token) = cursor {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&page_token)));
        }

        let response = self.get_with_retry(url).await?;
        Self::check_status(&response)?;

        let list_response: FilesListResponse = serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse files list response: {}", e))
        })?;

        let entries: Vec<DestinationPhoto> = list_response
            .files
            .into_iter()
            .map(Self::convert_file)
            .collect();

        debug!(
            entries = entries.len(),
            has_more = list_response.next_page_token.is_some(),
            "Listed Google Drive photos"
        );

        Ok(PhotoPage {
            entries,
            next_cursor: list_response.next_page_token,
        })
    }

    #[instrument(skip(self), fields(file_id = %id))]
    async fn get_metadata(&self, id: &str) -> Result<Option<PhotoMetadata>> {
        let url = format!(
            "{}/files/{}?fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(id),
            FILE_FIELDS
        );

        let response = self.get_with_retry(url).await?;
        if response.status == 404 {
            debug!("File no longer exists");
            return Ok(None);
        }
        Self::check_status(&response)?;

        let file: DriveFile = serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse file metadata: {}", e))
        })?;

        Ok(file.image_media_metadata.map(Self::convert_metadata))
    }

    #[instrument(skip(self, local_path), fields(name = %display_name))]
    async fn upload(&self, local_path: &Path, display_name: &str) -> Result<UploadOutcome> {
        let content = self.file_system.read_file(local_path).await?;

        let metadata = UploadMetadata {
            name: display_name,
            parents: self.folder_id.as_deref().into_iter().collect(),
        };
        let media_type = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(Self::media_type)
            .unwrap_or("application/octet-stream");
        let (body, content_type) = Self::multipart_body(&metadata, media_type, &content)?;

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!(
                "{}/files?uploadType=multipart&fields=id",
                DRIVE_UPLOAD_BASE
            ),
        )
        .bearer_token(&self.access_token)
        .header("Content-Type", content_type)
        .body(body)
        .timeout(Duration::from_secs(300));

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            let message = Self::error_message(&response.body);
            warn!(status = response.status, message = %message, "Upload rejected");
            return Ok(UploadOutcome::Rejected {
                status: response.status,
                message,
            });
        }

        let created: DriveFile = serde_json::from_slice(&response.body).map_err(|e| {
            BridgeError::from(GoogleDriveError::ParseError(format!(
                "Failed to parse upload response: {}",
                e
            )))
        })?;

        info!(id = %created.id, size = content.len(), "Uploaded file");
        Ok(UploadOutcome::Uploaded { id: created.id })
    }
}
