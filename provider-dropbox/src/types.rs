//! Dropbox API request and response types
//!
//! Data structures for the `files/list_folder` family of endpoints.

use serde::{Deserialize, Serialize};

/// `files/list_folder` arguments
///
/// See: https://www.dropbox.com/developers/documentation/http/documentation#files-list_folder
#[derive(Debug, Serialize)]
pub struct ListFolderArg<'a> {
    /// Folder path; the account root is `""`
    pub path: &'a str,
    pub include_media_info: bool,
}

/// `files/list_folder/continue` arguments
#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

/// `files/download` arguments, sent in the `Dropbox-API-Arg` header
#[derive(Debug, Serialize)]
pub struct DownloadArg<'a> {
    pub path: &'a str,
}

/// `files/list_folder` and `files/list_folder/continue` response
#[derive(Debug, Deserialize)]
pub struct ListFolderResult {
    pub entries: Vec<Metadata>,

    /// Cursor for `list_folder/continue`
    pub cursor: String,

    /// Whether `list_folder/continue` has more entries
    pub has_more: bool,
}

/// One folder entry
#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum Metadata {
    File(FileMetadata),
    Folder(FolderMetadata),
    Deleted(DeletedMetadata),
}

#[derive(Debug, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub path_lower: Option<String>,
    #[serde(default)]
    pub media_info: Option<MediaInfo>,
}

#[derive(Debug, Deserialize)]
pub struct FolderMetadata {
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub path_lower: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeletedMetadata {
    pub name: String,
}

/// Media info attached to photo and video files
#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum MediaInfo {
    /// Dropbox has not extracted the metadata yet
    Pending,
    Metadata { metadata: MediaMetadata },
}

#[derive(Debug, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub dimensions: Option<Dimensions>,

    /// Capture time (ISO 8601, UTC)
    #[serde(default)]
    pub time_taken: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Dimensions {
    pub height: u32,
    pub width: u32,
}

/// Error body returned with status 409
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error_summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_list_folder_result() {
        let json = r#"{
            "entries": [
                {
                    ".tag": "file",
                    "name": "IMG_0001.jpg",
                    "id": "id:a4ayc_80_OEAAAAAAAAAXw",
                    "path_lower": "/photos/img_0001.jpg",
                    "path_display": "/Photos/IMG_0001.jpg",
                    "size": 7212,
                    "media_info": {
                        ".tag": "metadata",
                        "metadata": {
                            ".tag": "photo",
                            "dimensions": {"height": 1500, "width": 1500},
                            "time_taken": "2015-05-12T15:50:38Z"
                        }
                    }
                },
                {
                    ".tag": "folder",
                    "name": "2019",
                    "id": "id:a4ayc_80_OEAAAAAAAAAXz",
                    "path_lower": "/photos/2019",
                    "path_display": "/Photos/2019"
                },
                {
                    ".tag": "deleted",
                    "name": "old.jpg"
                }
            ],
            "cursor": "ZtkX9_EHj3x7PMkVuFIhwKYXEpwpLwyxp9vMKomUhllil9q7eWiAu",
            "has_more": true
        }"#;

        let result: ListFolderResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.entries.len(), 3);
        assert!(result.has_more);

        match &result.entries[0] {
            Metadata::File(file) => {
                assert_eq!(file.path_display.as_deref(), Some("/Photos/IMG_0001.jpg"));
                match &file.media_info {
                    Some(MediaInfo::Metadata { metadata }) => {
                        let dims = metadata.dimensions.unwrap();
                        assert_eq!((dims.height, dims.width), (1500, 1500));
                        assert_eq!(metadata.time_taken.as_deref(), Some("2015-05-12T15:50:38Z"));
                    }
                    other => panic!("unexpected media info: {:?}", other),
                }
            }
            other => panic!("unexpected entry: {:?}", other),
        }
        assert!(matches!(result.entries[1], Metadata::Folder(_)));
        assert!(matches!(result.entries[2], Metadata::Deleted(_)));
    }

    #[test]
    fn test_deserialize_pending_media_info() {
        let json = r#"{".tag": "file", "name": "new.jpg", "media_info": {".tag": "pending"}}"#;
        let entry: Metadata = serde_json::from_str(json).unwrap();
        assert!(matches!(
            entry,
            Metadata::File(FileMetadata {
                media_info: Some(MediaInfo::Pending),
                ..
            })
        ));
    }

    #[test]
    fn test_serialize_list_folder_arg() {
        let arg = ListFolderArg {
            path: "/Photos",
            include_media_info: true,
        };
        assert_eq!(
            serde_json::to_string(&arg).unwrap(),
            r#"{"path":"/Photos","include_media_info":true}"#
        );
    }
}
