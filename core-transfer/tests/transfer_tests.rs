//! Integration tests for the transfer pipeline
//!
//! These tests run the orchestrator end to end against in-memory services:
//! - Deduplication against the destination and against earlier runs
//! - Idempotence of repeated runs
//! - Recovery after a failure between upload and checkpoint write
//! - Upload rejection and scratch cleanup
//! - The unfingerprinted-photo policy

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    DestinationPhoto, FileSystemAccess, FolderPage, PhotoDestination, PhotoMetadata, PhotoPage,
    PhotoSource, SourceEntry, UploadOutcome,
};
use bytes::Bytes;
use core_runtime::config::{TransferConfig, UnfingerprintedPolicy};
use core_runtime::events::{EventBus, SkipReason, TransferEvent};
use core_transfer::{
    CheckpointStore, Fingerprint, RunPhase, TransferError, TransferOrchestrator,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

// ============================================================================
// Fake Services
// ============================================================================

/// Source serving a folder tree; downloaded files contain the photo's
/// metadata as JSON so the destination can recover it on upload.
struct FakeSource {
    folders: HashMap<String, Vec<SourceEntry>>,
    page_size: usize,
    downloads: AsyncMutex<Vec<String>>,
}

impl FakeSource {
    fn new(page_size: usize) -> Self {
        Self {
            folders: HashMap::new(),
            page_size,
            downloads: AsyncMutex::new(Vec::new()),
        }
    }

    fn folder(mut self, path: &str, entries: Vec<SourceEntry>) -> Self {
        self.folders.insert(path.to_string(), entries);
        self
    }

    fn find(&self, path: &str) -> Option<&SourceEntry> {
        self.folders
            .values()
            .flat_map(|entries| entries.iter())
            .find(|entry| entry.path == path)
    }
}

#[async_trait]
impl PhotoSource for FakeSource {
    async fn list_folder(&self, path: &str, cursor: Option<String>) -> BridgeResult<FolderPage> {
        let entries = self
            .folders
            .get(path)
            .ok_or_else(|| BridgeError::NotFound(path.to_string()))?;
        let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(entries.len());
        Ok(FolderPage {
            entries: entries[start..end].to_vec(),
            next_cursor: (end < entries.len()).then(|| end.to_string()),
        })
    }

    async fn download(&self, path: &str, local_destination: &Path) -> BridgeResult<()> {
        let entry = self
            .find(path)
            .ok_or_else(|| BridgeError::NotFound(path.to_string()))?;
        let body = serde_json::to_vec(&entry.metadata).unwrap();
        tokio::fs::write(local_destination, body).await?;
        self.downloads.lock().await.push(path.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Upload {
    display_name: String,
    metadata: Option<PhotoMetadata>,
}

/// Destination holding photos in memory, listed `page_size` at a time
struct FakeDestination {
    photos: AsyncMutex<Vec<DestinationPhoto>>,
    uploads: AsyncMutex<Vec<Upload>>,
    page_size: usize,
    reject_with: AsyncMutex<Option<u16>>,
}

impl FakeDestination {
    fn new(page_size: usize) -> Self {
        Self {
            photos: AsyncMutex::new(Vec::new()),
            uploads: AsyncMutex::new(Vec::new()),
            page_size,
            reject_with: AsyncMutex::new(None),
        }
    }

    async fn add_photo(&self, metadata: PhotoMetadata) {
        let mut photos = self.photos.lock().await;
        let id = format!("existing-{}", photos.len() + 1);
        photos.push(DestinationPhoto {
            id,
            metadata: Some(metadata),
        });
    }

    async fn upload_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .await
            .iter()
            .map(|u| u.display_name.clone())
            .collect()
    }
}

#[async_trait]
impl PhotoDestination for FakeDestination {
    async fn list_photos(&self, cursor: Option<String>) -> BridgeResult<PhotoPage> {
        let photos = self.photos.lock().await;
        let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(photos.len());
        Ok(PhotoPage {
            entries: photos[start..end].to_vec(),
            next_cursor: (end < photos.len()).then(|| end.to_string()),
        })
    }

    async fn get_metadata(&self, id: &str) -> BridgeResult<Option<PhotoMetadata>> {
        Ok(self
            .photos
            .lock()
            .await
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| p.metadata.clone()))
    }

    async fn upload(&self, local_path: &Path, display_name: &str) -> BridgeResult<UploadOutcome> {
        let body = tokio::fs::read(local_path).await?;
        if let Some(status) = *self.reject_with.lock().await {
            return Ok(UploadOutcome::Rejected {
                status,
                message: "insufficient permissions".to_string(),
            });
        }

        let metadata: Option<PhotoMetadata> = serde_json::from_slice(&body).unwrap();
        let mut uploads = self.uploads.lock().await;
        uploads.push(Upload {
            display_name: display_name.to_string(),
            metadata: metadata.clone(),
        });
        let id = format!("F{}", uploads.len());
        self.photos.lock().await.push(DestinationPhoto {
            id: id.clone(),
            metadata,
        });
        Ok(UploadOutcome::Uploaded { id })
    }
}

/// File system that can refuse to replace one particular file
struct FlakyFileSystem {
    inner: TokioFileSystem,
    protected: PathBuf,
    refuse: AtomicBool,
}

#[async_trait]
impl FileSystemAccess for FlakyFileSystem {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        self.inner.exists(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.inner.create_dir_all(path).await
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.inner.read_file(path).await
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.inner.write_file(path, data).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> BridgeResult<()> {
        if to == self.protected && self.refuse.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("disk full".to_string()));
        }
        self.inner.rename(from, to).await
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        self.inner.delete_file(path).await
    }

    async fn delete_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.inner.delete_dir_all(path).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

const T1: &str = "2019:01:01 10:00:00";
const T2: &str = "2019:02:02 12:30:00";

fn photo(path: &str, height: u32, width: u32, time: &str) -> SourceEntry {
    SourceEntry::file(path, Some(PhotoMetadata::new(height, width, time)))
}

fn abc_source(page_size: usize) -> FakeSource {
    FakeSource::new(page_size).folder(
        "/Photos",
        vec![
            photo("/Photos/a.jpg", 1000, 1000, T1),
            photo("/Photos/b.jpg", 1000, 1000, T1),
            photo("/Photos/c.jpg", 500, 500, T2),
        ],
    )
}

fn config(dir: &Path) -> core_runtime::config::TransferConfigBuilder {
    TransferConfig::builder()
        .source_token("dropbox-token")
        .destination_token("google-token")
        .source_root("/Photos/")
        .destination_index_path(dir.join("destination_index.json"))
        .checkpoint_path(dir.join("processed.json"))
        .scratch_dir(dir.join("scratch"))
}

fn orchestrator(
    config: TransferConfig,
    source: Arc<FakeSource>,
    destination: Arc<FakeDestination>,
    fs: Arc<dyn FileSystemAccess>,
    event_bus: EventBus,
) -> TransferOrchestrator {
    TransferOrchestrator::new(config, source, destination, fs, event_bus)
}

fn local_fs() -> Arc<dyn FileSystemAccess> {
    Arc::new(TokioFileSystem::new())
}

async fn checkpoint(dir: &Path) -> Vec<Fingerprint> {
    CheckpointStore::load(local_fs(), dir.join("processed.json"))
        .await
        .unwrap()
        .fingerprints()
        .copied()
        .collect()
}

fn scratch_is_empty(dir: &Path) -> bool {
    match std::fs::read_dir(dir.join("scratch")) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<TransferEvent>) -> Vec<TransferEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_duplicate_photos_copied_once() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(abc_source(10));
    let destination = Arc::new(FakeDestination::new(10));
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();

    let report = orchestrator(
        config(dir.path()).build().unwrap(),
        source.clone(),
        destination.clone(),
        local_fs(),
        bus,
    )
    .run()
    .await
    .unwrap();

    let f1 = Fingerprint::from_parts(1000, 1000, T1);
    let f2 = Fingerprint::from_parts(500, 500, T2);

    assert_eq!(report.copied, 2);
    assert_eq!(report.skipped_known, 1);
    assert_eq!(report.skipped_unfingerprinted, 0);
    assert!(report.destination_index_complete);
    assert_eq!(report.phase, RunPhase::Done);

    assert_eq!(destination.upload_names().await, vec![f1.to_hex(), f2.to_hex()]);
    assert_eq!(
        *source.downloads.lock().await,
        vec!["/Photos/a.jpg".to_string(), "/Photos/c.jpg".to_string()]
    );

    let mut recorded = checkpoint(dir.path()).await;
    recorded.sort();
    let mut expected = vec![f1, f2];
    expected.sort();
    assert_eq!(recorded, expected);
    assert!(scratch_is_empty(dir.path()));

    let events = drain(&mut events);
    assert!(matches!(events.first(), Some(TransferEvent::Started { .. })));
    assert!(matches!(
        events.last(),
        Some(TransferEvent::Completed { copied: 2, skipped: 1, .. })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        TransferEvent::PhotoSkipped { path, reason: SkipReason::AlreadyCopied, .. }
            if path == "/Photos/b.jpg"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        TransferEvent::PhotoCopied { destination_id, .. } if destination_id == "F2"
    )));
}

#[tokio::test]
async fn test_second_run_copies_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(abc_source(10));
    let destination = Arc::new(FakeDestination::new(1));

    for _ in 0..2 {
        orchestrator(
            config(dir.path()).build().unwrap(),
            source.clone(),
            destination.clone(),
            local_fs(),
            EventBus::default(),
        )
        .run()
        .await
        .unwrap();
    }
    let third = orchestrator(
        config(dir.path()).build().unwrap(),
        source.clone(),
        destination.clone(),
        local_fs(),
        EventBus::default(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(third.copied, 0);
    assert_eq!(third.skipped_known, 3);
    assert_eq!(destination.uploads.lock().await.len(), 2);
}

#[tokio::test]
async fn test_photos_at_destination_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let destination = Arc::new(FakeDestination::new(1));
    destination
        .add_photo(PhotoMetadata::new(500, 500, "2019:02:0212:30:00"))
        .await;

    let report = orchestrator(
        config(dir.path()).build().unwrap(),
        Arc::new(abc_source(10)),
        destination.clone(),
        local_fs(),
        EventBus::default(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(report.copied, 1);
    assert_eq!(report.skipped_known, 2);
    assert_eq!(
        destination.upload_names().await,
        vec![Fingerprint::from_parts(1000, 1000, T1).to_hex()]
    );
}

#[tokio::test]
async fn test_source_page_size_does_not_change_uploads() {
    let nested = |page_size| {
        FakeSource::new(page_size)
            .folder(
                "/Photos",
                vec![
                    photo("/Photos/1.jpg", 1, 1, T1),
                    SourceEntry::folder("/Photos/2019"),
                    photo("/Photos/3.jpeg", 3, 3, T1),
                ],
            )
            .folder(
                "/Photos/2019",
                vec![
                    photo("/Photos/2019/2a.jpg", 2, 1, T1),
                    SourceEntry::file("/Photos/2019/movie.mov", None),
                    photo("/Photos/2019/2b.JPG", 2, 2, T1),
                ],
            )
    };

    let mut uploads = Vec::new();
    for page_size in [1, 2, 100] {
        let dir = tempfile::tempdir().unwrap();
        let destination = Arc::new(FakeDestination::new(10));
        orchestrator(
            config(dir.path()).build().unwrap(),
            Arc::new(nested(page_size)),
            destination.clone(),
            local_fs(),
            EventBus::default(),
        )
        .run()
        .await
        .unwrap();
        uploads.push(destination.upload_names().await);
    }

    assert_eq!(uploads[0].len(), 4);
    assert_eq!(uploads[0], uploads[1]);
    assert_eq!(uploads[0], uploads[2]);
    assert_eq!(uploads[0][1], Fingerprint::from_parts(2, 1, T1).to_hex());
}

#[tokio::test]
async fn test_failure_before_checkpoint_write_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(abc_source(10));
    let destination = Arc::new(FakeDestination::new(10));
    let flaky = Arc::new(FlakyFileSystem {
        inner: TokioFileSystem::new(),
        protected: dir.path().join("processed.json"),
        refuse: AtomicBool::new(true),
    });
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();

    let err = orchestrator(
        config(dir.path()).build().unwrap(),
        source.clone(),
        destination.clone(),
        flaky.clone(),
        bus,
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, TransferError::Persistence { .. }));
    assert_eq!(destination.uploads.lock().await.len(), 1);
    assert!(checkpoint(dir.path()).await.is_empty());
    assert!(scratch_is_empty(dir.path()));
    assert!(matches!(
        drain(&mut events).last(),
        Some(TransferEvent::Failed { copied: 0, .. })
    ));

    flaky.refuse.store(false, Ordering::SeqCst);
    let report = orchestrator(
        config(dir.path()).build().unwrap(),
        source,
        destination.clone(),
        flaky,
        EventBus::default(),
    )
    .run()
    .await
    .unwrap();

    // A is found through the destination index, so only C is uploaded
    assert_eq!(report.copied, 1);
    assert_eq!(report.skipped_known, 2);
    assert_eq!(destination.uploads.lock().await.len(), 2);
    assert_eq!(
        checkpoint(dir.path()).await,
        vec![Fingerprint::from_parts(500, 500, T2)]
    );
}

#[tokio::test]
async fn test_upload_rejection_aborts_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let destination = Arc::new(FakeDestination::new(10));
    *destination.reject_with.lock().await = Some(403);

    let err = orchestrator(
        config(dir.path()).build().unwrap(),
        Arc::new(abc_source(10)),
        destination.clone(),
        local_fs(),
        EventBus::default(),
    )
    .run()
    .await
    .unwrap_err();

    match err {
        TransferError::DestinationUpload { path, status, .. } => {
            assert_eq!(path, "/Photos/a.jpg");
            assert_eq!(status, 403);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(scratch_is_empty(dir.path()));
    assert!(checkpoint(dir.path()).await.is_empty());
}

#[tokio::test]
async fn test_download_failure_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MissingFileSource(Arc::new(abc_source(10))));
    let destination = Arc::new(FakeDestination::new(10));

    let err = TransferOrchestrator::new(
        config(dir.path()).build().unwrap(),
        source,
        destination.clone(),
        local_fs(),
        EventBus::default(),
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        TransferError::SourceDownload { ref path, .. } if path == "/Photos/a.jpg"
    ));
    assert!(destination.uploads.lock().await.is_empty());
    assert!(scratch_is_empty(dir.path()));
}

/// Lists like the wrapped source but every download fails
struct MissingFileSource(Arc<FakeSource>);

#[async_trait]
impl PhotoSource for MissingFileSource {
    async fn list_folder(&self, path: &str, cursor: Option<String>) -> BridgeResult<FolderPage> {
        self.0.list_folder(path, cursor).await
    }

    async fn download(&self, path: &str, _local_destination: &Path) -> BridgeResult<()> {
        Err(BridgeError::NotFound(path.to_string()))
    }
}

#[tokio::test]
async fn test_partial_destination_index_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let destination = Arc::new(FakeDestination::new(1));
    destination.add_photo(PhotoMetadata::new(1000, 1000, T1)).await;
    destination.add_photo(PhotoMetadata::new(500, 500, T2)).await;

    let report = orchestrator(
        config(dir.path()).index_page_limit(1).build().unwrap(),
        Arc::new(abc_source(10)),
        destination.clone(),
        local_fs(),
        EventBus::default(),
    )
    .run()
    .await
    .unwrap();

    // Only the first destination page is known, so C is copied again
    assert!(!report.destination_index_complete);
    assert_eq!(report.copied, 1);
    assert_eq!(report.skipped_known, 2);

    let index: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("destination_index.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(index["complete"], false);
    assert_eq!(index["next_cursor"], "1");
}

#[tokio::test]
async fn test_unfingerprinted_photos_skipped_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeSource::new(10).folder(
        "/Photos",
        vec![
            SourceEntry::file("/Photos/scan.jpg", None),
            photo("/Photos/a.jpg", 1000, 1000, T1),
        ],
    ));
    let destination = Arc::new(FakeDestination::new(10));

    let report = orchestrator(
        config(dir.path()).build().unwrap(),
        source,
        destination.clone(),
        local_fs(),
        EventBus::default(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(report.copied, 1);
    assert_eq!(report.skipped_unfingerprinted, 1);
    assert_eq!(destination.uploads.lock().await.len(), 1);
}

#[tokio::test]
async fn test_unfingerprinted_copy_policy_uploads_every_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeSource::new(10).folder(
        "/Photos",
        vec![SourceEntry::file("/Photos/scan.jpg", None)],
    ));
    let destination = Arc::new(FakeDestination::new(10));

    for _ in 0..2 {
        let report = orchestrator(
            config(dir.path())
                .unfingerprinted_policy(UnfingerprintedPolicy::Copy)
                .build()
                .unwrap(),
            source.clone(),
            destination.clone(),
            local_fs(),
            EventBus::default(),
        )
        .run()
        .await
        .unwrap();
        assert_eq!(report.copied, 1);
    }

    let uploads = destination.uploads.lock().await.clone();
    assert_eq!(uploads.len(), 2);
    assert!(uploads.iter().all(|u| u.display_name == "scan.jpg"));
    assert!(uploads.iter().all(|u| u.metadata.is_none()));
    assert!(checkpoint(dir.path()).await.is_empty());
}
