//! Ingestion driver
//!
//! One pass over every stored user: list unread self-sent messages with
//! attachments, save each previously unseen document attachment, record it,
//! and label the message.
//!
//! The store is authoritative for "already processed". The Gmail label is a
//! marker for humans and for the listing query; a message that was recorded
//! but never labeled is short-circuited on the next pass.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::attachments::{SelectedPart, content_hash, fetch_part_bytes, select_document_parts};
use crate::models::{FetchedMessage, MessageId, ProcessedMessage, UserCredential};
use crate::provider::{MailConnector, MailProvider, ensure_label};
use crate::storage::{AttachmentStore, ContentStore, DETAILS_FILENAME, sanitize_filename};

/// Gmail caps the candidate batch per user per pass
pub const MAX_BATCH: usize = 50;

/// System label removed when `mark_read` is set
const UNREAD_LABEL: &str = "UNREAD";

/// Options for an ingestion pass
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Address the ingestible messages are sent from (the mailbox itself)
    pub sender: String,
    /// Label applied to processed messages
    pub label_name: String,
    /// Candidates listed per user; capped at [`MAX_BATCH`]
    pub max_batch: usize,
    /// Also remove UNREAD when labeling
    pub mark_read: bool,
    /// Prefix of per-message folder names
    pub folder_prefix: String,
}

impl IngestOptions {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            label_name: "KMRL_Processed".to_string(),
            max_batch: MAX_BATCH,
            mark_read: false,
            folder_prefix: "self".to_string(),
        }
    }

    /// Search query selecting candidate messages
    pub fn query(&self) -> String {
        format!("from:{} has:attachment is:unread", self.sender)
    }

    /// Effective batch size
    pub fn batch_size(&self) -> usize {
        self.max_batch.clamp(1, MAX_BATCH)
    }

    /// Folder a message's attachments are saved in
    ///
    /// Derived only from the message, so a retry lands in the same folder.
    pub fn folder_name(&self, message: &FetchedMessage) -> String {
        format!(
            "{}_{}_{}",
            self.folder_prefix,
            message.sent_at.format("%Y%m%d_%H%M%S"),
            message.id
        )
    }
}

/// What happened to one candidate message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Already recorded; not fetched
    ShortCircuited,
    /// The full message could not be fetched
    FetchFailed,
    /// The From address did not match the expected sender
    SenderMismatch,
    Processed {
        saved: usize,
        duplicates: usize,
        failed_parts: usize,
    },
}

/// Statistics from an ingestion pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Users processed to the end of their candidate list
    pub users_processed: usize,
    /// Users abandoned (credentials or listing failed)
    pub users_failed: usize,
    /// Candidate messages listed
    pub messages_listed: usize,
    pub messages_short_circuited: usize,
    pub messages_processed: usize,
    pub messages_skipped: usize,
    /// Messages aborted by a storage failure
    pub message_errors: usize,
    pub attachments_saved: usize,
    pub duplicates_skipped: usize,
    pub parts_failed: usize,
    pub labels_failed: usize,
    /// Duration of the pass
    pub duration_ms: u64,
}

impl RunStats {
    fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::ShortCircuited => self.messages_short_circuited += 1,
            MessageOutcome::FetchFailed | MessageOutcome::SenderMismatch => {
                self.messages_skipped += 1
            }
            MessageOutcome::Processed {
                saved,
                duplicates,
                failed_parts,
            } => {
                self.messages_processed += 1;
                self.attachments_saved += saved;
                self.duplicates_skipped += duplicates;
                self.parts_failed += failed_parts;
            }
        }
    }

    fn merge(&mut self, other: RunStats) {
        self.users_processed += other.users_processed;
        self.users_failed += other.users_failed;
        self.messages_listed += other.messages_listed;
        self.messages_short_circuited += other.messages_short_circuited;
        self.messages_processed += other.messages_processed;
        self.messages_skipped += other.messages_skipped;
        self.message_errors += other.message_errors;
        self.attachments_saved += other.attachments_saved;
        self.duplicates_skipped += other.duplicates_skipped;
        self.parts_failed += other.parts_failed;
        self.labels_failed += other.labels_failed;
    }
}

/// Runs ingestion passes against a mail connector and the local stores
///
/// A pass is safe to repeat: recorded messages are skipped without a fetch,
/// and attachment bytes already on record under any message are not saved
/// again.
pub struct Ingestor {
    store: Arc<dyn ContentStore>,
    files: Arc<dyn AttachmentStore>,
    connector: Arc<dyn MailConnector>,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn ContentStore>,
        files: Arc<dyn AttachmentStore>,
        connector: Arc<dyn MailConnector>,
        options: IngestOptions,
    ) -> Self {
        Self {
            store,
            files,
            connector,
            options,
        }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Run one pass over every stored user
    ///
    /// A failing user is logged and counted; the next user still runs. Only
    /// a failure to list users fails the pass.
    pub fn run_once(&self) -> Result<RunStats> {
        let start = std::time::Instant::now();
        let mut stats = RunStats::default();

        let users = self.store.list_users().context("Failed to list users")?;
        info!("Ingestion pass starting for {} user(s)", users.len());

        for user in users {
            match self.process_user(&user) {
                Ok(user_stats) => stats.merge(user_stats),
                Err(e) => {
                    warn!("Skipping user {}: {:#}", user.id, e);
                    stats.users_failed += 1;
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Ingestion pass finished in {}ms: {} saved, {} duplicate(s), {} short-circuited, {} user(s) failed",
            stats.duration_ms,
            stats.attachments_saved,
            stats.duplicates_skipped,
            stats.messages_short_circuited,
            stats.users_failed
        );
        Ok(stats)
    }

    /// Process one user's candidate messages
    ///
    /// # Errors
    /// Fails when no mailbox session can be opened or the candidate listing
    /// fails. Per-message errors are counted, not returned.
    pub fn process_user(&self, credential: &UserCredential) -> Result<RunStats> {
        let mut stats = RunStats::default();

        let session = self
            .connector
            .connect(credential)
            .with_context(|| format!("Failed to connect as {}", credential.id))?;

        if let Some(refreshed) = session.refreshed {
            debug!("Persisting refreshed credential for {}", refreshed.id);
            self.store.upsert_user(refreshed)?;
        }
        let provider = session.provider.as_ref();

        let label_id = match ensure_label(provider, &self.options.label_name) {
            Ok(label) => Some(label.id),
            Err(e) => {
                warn!(
                    "Label {} unavailable for {}, labeling skipped this pass: {:#}",
                    self.options.label_name, credential.id, e
                );
                None
            }
        };

        let candidates = provider
            .list_messages(&self.options.query(), self.options.batch_size())
            .context("Failed to list candidate messages")?;
        stats.messages_listed = candidates.len();
        info!("{}: {} candidate message(s)", credential.id, candidates.len());

        for id in &candidates {
            match self.process_message(provider, id, label_id.as_deref()) {
                Ok((outcome, labeled)) => {
                    stats.record(&outcome);
                    if !labeled {
                        stats.labels_failed += 1;
                    }
                }
                Err(e) => {
                    warn!("Message {} aborted: {:#}", id, e);
                    stats.message_errors += 1;
                }
            }
        }

        stats.users_processed = 1;
        Ok(stats)
    }

    /// Process one candidate message
    ///
    /// Returns the outcome and whether labeling (when attempted) succeeded.
    ///
    /// # Errors
    /// Storage failures (content store or file writes) abort the message
    /// before it is labeled. Remote failures never surface here.
    pub fn process_message(
        &self,
        provider: &dyn MailProvider,
        id: &MessageId,
        label_id: Option<&str>,
    ) -> Result<(MessageOutcome, bool)> {
        if self.store.has_message(id)? {
            debug!("Message {} already recorded", id);
            return Ok((MessageOutcome::ShortCircuited, true));
        }

        let message = match provider.get_message(id) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to fetch message {}: {:#}", id, e);
                return Ok((MessageOutcome::FetchFailed, true));
            }
        };

        if !message.from.is(&self.options.sender) {
            debug!(
                "Message {} is from {}, expected {}",
                id, message.from.email, self.options.sender
            );
            return Ok((MessageOutcome::SenderMismatch, true));
        }

        let folder = self.options.folder_name(&message);
        let mut saved = 0;
        let mut duplicates = 0;
        let mut failed_parts = 0;
        let mut details_written = false;

        let parts = select_document_parts(&message.parts);
        let names = destination_names(&parts);

        for (part, name) in parts.iter().zip(&names) {
            let data = match fetch_part_bytes(provider, id, part) {
                Ok(data) if !data.is_empty() => data,
                Ok(_) => {
                    warn!("Attachment {} of {} is empty", part.filename, id);
                    failed_parts += 1;
                    continue;
                }
                Err(e) => {
                    warn!("{:#}", e);
                    failed_parts += 1;
                    continue;
                }
            };

            if self.save_part(&message, &folder, part, name, &data, &mut details_written)? {
                saved += 1;
            } else {
                duplicates += 1;
            }
        }

        let labeled = self.apply_labels(provider, id, label_id);

        info!(
            "Message {}: {} saved, {} duplicate(s), {} failed part(s)",
            id, saved, duplicates, failed_parts
        );
        Ok((
            MessageOutcome::Processed {
                saved,
                duplicates,
                failed_parts,
            },
            labeled,
        ))
    }

    /// Save and record one part unless its content is already on record
    ///
    /// Returns false for a duplicate. The record is written only after the
    /// file is in place.
    fn save_part(
        &self,
        message: &FetchedMessage,
        folder: &str,
        part: &SelectedPart,
        name: &str,
        data: &[u8],
        details_written: &mut bool,
    ) -> Result<bool> {
        let hash = content_hash(data);
        if self.store.has_content_hash(&hash)? {
            debug!(
                "Skipping {} of {}: content {} already ingested",
                part.filename, message.id, hash
            );
            return Ok(false);
        }

        let path = self.files.save_attachment(folder, name, data)?;
        if !*details_written {
            self.files.save_details(folder, &message.details_text())?;
            *details_written = true;
        }

        self.store.upsert_processed(ProcessedMessage::new(
            message.id.clone(),
            part.part_id.clone(),
            hash,
            path.to_string_lossy(),
        ))?;
        debug!("Saved {} to {}", part.filename, path.display());
        Ok(true)
    }

    /// Apply the processed label (and drop UNREAD if configured)
    ///
    /// Failure is logged and reported as false; it never fails the message.
    fn apply_labels(&self, provider: &dyn MailProvider, id: &MessageId, label_id: Option<&str>) -> bool {
        let add: Vec<&str> = label_id.into_iter().collect();
        let remove: &[&str] = if self.options.mark_read {
            &[UNREAD_LABEL]
        } else {
            &[]
        };
        if add.is_empty() && remove.is_empty() {
            return true;
        }

        match provider.modify_labels(id, &add, remove) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to label message {}: {:#}", id, e);
                false
            }
        }
    }
}

/// File names for a message's selected parts, unique within its folder
///
/// A part keeps its sanitized name unless the details file or an earlier
/// part already holds it (compared case-insensitively); then the part id is
/// prefixed. Computed from every selected part, fetched or not, so a retry
/// writes to the same paths.
fn destination_names(parts: &[SelectedPart]) -> Vec<String> {
    let mut taken = HashSet::from([DETAILS_FILENAME.to_ascii_lowercase()]);
    parts
        .iter()
        .map(|part| {
            let base = sanitize_filename(&part.filename);
            let prefix = sanitize_filename(&part.part_id);
            let mut name = base.clone();
            let mut attempt = 1;
            while taken.contains(&name.to_ascii_lowercase()) {
                name = match attempt {
                    1 => format!("{}_{}", prefix, base),
                    n => format!("{}_{}_{}", prefix, n, base),
                };
                attempt += 1;
            }
            taken.insert(name.to_ascii_lowercase());
            name
        })
        .collect()
}
