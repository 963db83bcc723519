//! # Photo Fingerprints
//!
//! A content identity derived from image metadata rather than file bytes, so
//! the same photo can be recognized on two services without downloading it.
//!
//! The fingerprint covers height, width and capture time. Two different
//! photos taken in the same second at the same resolution collide; that
//! lossy notion of "same photo" is accepted.
//!
//! The digest is MD5 over the decimal height, decimal width and the capture
//! time with whitespace removed, so state files written by earlier tooling
//! over the same scheme stay valid.
//!
//! ```rust
//! use bridge_traits::PhotoMetadata;
//! use core_transfer::Fingerprint;
//!
//! let a = PhotoMetadata::new(3000, 4000, "2019:06:01 10:15:00");
//! let b = PhotoMetadata::new(3000, 4000, "2019:06:01 10:15:00 ");
//! assert_eq!(Fingerprint::compute(&a), Fingerprint::compute(&b));
//!
//! let no_size = PhotoMetadata { width: None, ..a };
//! assert!(Fingerprint::compute(&no_size).is_none());
//! ```

use crate::{Result, TransferError};
use bridge_traits::PhotoMetadata;
use serde::{Deserialize, Serialize};
use md5::{Digest, Md5};
use std::fmt;
use std::str::FromStr;

/// Length of a fingerprint in bytes
pub const FINGERPRINT_LEN: usize = 16;

/// 128-bit photo fingerprint, rendered as 32 lowercase hex characters
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Derive the fingerprint of a photo from its metadata.
    ///
    /// Returns `None` when height or width is missing. A missing capture
    /// time hashes as the empty string.
    pub fn compute(metadata: &PhotoMetadata) -> Option<Self> {
        let height = metadata.height?;
        let width = metadata.width?;
        let capture_time = metadata.capture_time.as_deref().unwrap_or("");
        Some(Self::from_parts(height, width, capture_time))
    }

    /// Fingerprint of explicit metadata values
    pub fn from_parts(height: u32, width: u32, capture_time: &str) -> Self {
        let normalized: String = capture_time
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let mut hasher = Md5::new();
        hasher.update(height.to_string().as_bytes());
        hasher.update(width.to_string().as_bytes());
        hasher.update(normalized.as_bytes());
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        let is_lower_hex = s
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if s.len() != FINGERPRINT_LEN * 2 || !is_lower_hex {
            return Err(TransferError::InvalidFingerprint(s.to_string()));
        }

        let mut bytes = [0u8; FINGERPRINT_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| TransferError::InvalidFingerprint(format!("{}: {}", s, e)))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = TransferError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.to_hex()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}
