//! Dedup records for ingested attachments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::MessageId;

/// Lowercase hex SHA-256 digest of an attachment's raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash raw bytes
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap an existing hex digest (as loaded from storage)
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One saved attachment of one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedMessage {
    pub message_id: MessageId,
    /// MIME part ID of the attachment (falls back to the attachment ID)
    pub attachment_part_id: String,
    pub content_hash: ContentHash,
    pub saved_path: String,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedMessage {
    pub fn new(
        message_id: MessageId,
        attachment_part_id: impl Into<String>,
        content_hash: ContentHash,
        saved_path: impl Into<String>,
    ) -> Self {
        Self {
            message_id,
            attachment_part_id: attachment_part_id.into(),
            content_hash,
            saved_path: saved_path.into(),
            processed_at: Utc::now(),
        }
    }
}
