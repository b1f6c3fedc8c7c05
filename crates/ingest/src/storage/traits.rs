//! Storage trait definitions

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::models::{ContentHash, MessageId, ProcessedMessage, UserCredential};

/// Trait for dedup state and credential persistence
///
/// Every operation is independently atomic. There are no multi-record
/// transactions: the content-hash uniqueness invariant is kept by the
/// ingestion driver's check-then-write sequence, not by the store.
pub trait ContentStore: Send + Sync {
    /// Insert or replace a user credential by ID
    fn upsert_user(&self, credential: UserCredential) -> Result<()>;

    /// List all user credentials, ordered by ID
    fn list_users(&self) -> Result<Vec<UserCredential>>;

    /// Get a user credential by ID
    ///
    /// # Errors
    /// Returns [`StoreError::UserNotFound`](crate::StoreError::UserNotFound) when absent.
    fn get_user(&self, id: &str) -> Result<UserCredential>;

    /// Insert or replace a processed record by (message ID, attachment part ID)
    fn upsert_processed(&self, record: ProcessedMessage) -> Result<()>;

    /// Check whether any processed record carries this content hash
    fn has_content_hash(&self, hash: &ContentHash) -> Result<bool>;

    /// Check whether any processed record belongs to this message
    fn has_message(&self, id: &MessageId) -> Result<bool>;

    /// List all processed records, ordered by message ID then part ID
    fn list_processed(&self) -> Result<Vec<ProcessedMessage>>;
}

/// Trait for persisting attachment bytes and per-message details files
pub trait AttachmentStore: Send + Sync {
    /// Write attachment bytes into `folder` under a sanitized `filename`
    ///
    /// Overwrites an existing file at the same destination; callers pick
    /// names unique within the folder. Returns the path written.
    fn save_attachment(&self, folder: &str, filename: &str, data: &[u8]) -> Result<PathBuf>;

    /// Write the message details text file into `folder`
    fn save_details(&self, folder: &str, text: &str) -> Result<PathBuf>;

    /// Root directory all folders are created under
    fn root(&self) -> &Path;
}
