//! Uploaded document pipeline
//!
//! Uploaded files are written to the upload directory, tracked by a task
//! record, run through text extraction and summarization, and removed once
//! processed.

pub mod extract;
pub mod summarize;
pub mod tasks;
pub mod upload;

pub use extract::{DocumentTextExtractor, TextExtractor};
pub use summarize::{OpenAiSummarizer, Summarizer, Summary, parse_summary};
pub use tasks::{InMemoryTaskStore, TaskStore};
pub use upload::{ProcessingJob, UploadService, UploadedFile, is_supported_upload};
