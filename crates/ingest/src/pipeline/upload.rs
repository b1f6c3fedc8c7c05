//! Upload handling and per-document processing jobs

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::{Summarizer, TaskStore, TextExtractor};
use crate::error::{PipelineError, UploadError};
use crate::models::TaskRecord;
use crate::storage::sanitize_filename;

/// Extensions accepted for upload
const UPLOAD_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "md"];

/// A file received for processing
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, keeping only its file name
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, data })
    }
}

/// Whether a file name has an accepted upload extension
pub fn is_supported_upload(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| UPLOAD_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Accepts uploads and creates one processing job per accepted file
pub struct UploadService {
    upload_dir: PathBuf,
    tasks: Arc<dyn TaskStore>,
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn Summarizer>,
}

impl UploadService {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        tasks: Arc<dyn TaskStore>,
        extractor: Arc<dyn TextExtractor>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            tasks,
            extractor,
            summarizer,
        }
    }

    pub fn tasks(&self) -> &Arc<dyn TaskStore> {
        &self.tasks
    }

    /// Write accepted files to the upload directory and register their tasks
    ///
    /// Files with an empty name or an unsupported extension are skipped.
    ///
    /// # Errors
    /// [`UploadError::NoFiles`] for an empty request and
    /// [`UploadError::NoSupportedFiles`] when every file was skipped.
    pub fn accept(&self, files: Vec<UploadedFile>) -> Result<Vec<ProcessingJob>> {
        if files.is_empty() {
            return Err(UploadError::NoFiles.into());
        }

        fs::create_dir_all(&self.upload_dir).with_context(|| {
            format!(
                "Failed to create upload directory {}",
                self.upload_dir.display()
            )
        })?;

        let mut jobs = Vec::new();
        for file in files {
            if file.filename.trim().is_empty() {
                continue;
            }
            if !is_supported_upload(&file.filename) {
                info!("Skipping unsupported file: {}", file.filename);
                continue;
            }

            let task_id = uuid::Uuid::new_v4().to_string();
            let path = self
                .upload_dir
                .join(format!("{}_{}", task_id, sanitize_filename(&file.filename)));

            if let Err(e) = fs::write(&path, &file.data) {
                warn!("Failed to store upload {}: {}", file.filename, e);
                continue;
            }

            self.tasks
                .insert(TaskRecord::processing(&task_id, &file.filename))?;
            debug!("Task {} created for {}", task_id, file.filename);

            jobs.push(ProcessingJob {
                task_id,
                path,
                tasks: Arc::clone(&self.tasks),
                extractor: Arc::clone(&self.extractor),
                summarizer: Arc::clone(&self.summarizer),
            });
        }

        if jobs.is_empty() {
            return Err(UploadError::NoSupportedFiles.into());
        }
        info!("{} file(s) uploaded, processing started", jobs.len());
        Ok(jobs)
    }
}

/// Extraction and summarization of one uploaded file
pub struct ProcessingJob {
    task_id: String,
    path: PathBuf,
    tasks: Arc<dyn TaskStore>,
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn Summarizer>,
}

impl std::fmt::Debug for ProcessingJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingJob")
            .field("task_id", &self.task_id)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ProcessingJob {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run to completion, returning the final task record
    ///
    /// The uploaded file is removed afterwards whatever the outcome.
    pub fn run(self) -> Result<TaskRecord> {
        info!("Processing task {}", self.task_id);
        let outcome = self.summarize_file();

        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove {}: {}", self.path.display(), e);
        }

        let mut task = self
            .tasks
            .get(&self.task_id)?
            .with_context(|| format!("Task {} not found", self.task_id))?;

        match outcome {
            Ok(summary) => task.complete(summary.summary, summary.key_points),
            Err(e) => {
                warn!("Task {} failed: {:#}", self.task_id, e);
                task.fail(format!("{:#}", e));
            }
        }

        self.tasks.update(task.clone())?;
        info!("Task {} {}", task.id, task.status.as_str());
        Ok(task)
    }

    /// Run on a background thread
    pub fn spawn(self) -> JoinHandle<Result<TaskRecord>> {
        std::thread::spawn(move || self.run())
    }

    fn summarize_file(&self) -> Result<super::Summary> {
        let text = self.extractor.extract(&self.path)?;
        if text.trim().is_empty() {
            return Err(PipelineError::NoTextExtracted.into());
        }
        self.summarizer.summarize(&text)
    }
}
