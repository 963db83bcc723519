use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to list source folder {path}: {source}")]
    SourceListing {
        path: String,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to download {path}: {source}")]
    SourceDownload {
        path: String,
        #[source]
        source: BridgeError,
    },

    #[error("Destination error: {0}")]
    Destination(#[source] BridgeError),

    #[error("Upload of {path} rejected with status {status}: {message}")]
    DestinationUpload {
        path: String,
        status: u16,
        message: String,
    },

    #[error("Failed to persist {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: BridgeError,
    },

    #[error("Scratch file error for {path}: {source}")]
    Scratch {
        path: String,
        #[source]
        source: BridgeError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Invalid run phase: {0}")]
    InvalidPhase(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, TransferError>;
