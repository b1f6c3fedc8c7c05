//! Ingest crate - Mail attachment ingestion and document summarization
//!
//! This crate provides:
//! - Domain models (credentials, part trees, processed records, tasks)
//! - Gmail API client and OAuth authentication
//! - Storage trait abstractions for dedup state and attachment files
//! - Idempotent ingestion driver with content-hash dedup
//! - Upload pipeline: text extraction, summarization, task tracking

pub mod attachments;
pub mod config;
pub mod error;
pub mod gmail;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod storage;

pub use attachments::{SelectedPart, content_hash, fetch_part_bytes, is_document, select_document_parts};
pub use config::{GoogleCredentials, Settings};
pub use error::{CredentialError, PipelineError, StoreError, UploadError};
pub use gmail::{GmailClient, GmailConnector, OAuthClient};
pub use ingest::{IngestOptions, Ingestor, MessageOutcome, RunStats};
pub use models::{
    ContentHash, EmailAddress, FetchedMessage, MessageId, PartBody, PartNode, ProcessedMessage,
    TaskRecord, TaskStatus, UserCredential,
};
pub use pipeline::{
    DocumentTextExtractor, InMemoryTaskStore, OpenAiSummarizer, ProcessingJob, Summarizer,
    TaskStore, TextExtractor, UploadService, UploadedFile,
};
pub use provider::{MailConnector, MailProvider, MailSession, RemoteLabel};
pub use storage::{
    AttachmentStore, ContentStore, FileAttachmentStore, InMemoryContentStore, SqliteContentStore,
};
