//! Processing task record for uploaded documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a document processing task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Tracking record for one uploaded document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// UUID v4 identifier
    pub id: String,
    /// Original file name as uploaded
    pub filename: String,
    pub status: TaskStatus,
    pub summary: Option<String>,
    pub key_points: Vec<String>,
    /// Human-readable failure reason when status is failed
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// New task in the processing state
    pub fn processing(id: impl Into<String>, filename: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            filename: filename.into(),
            status: TaskStatus::Processing,
            summary: None,
            key_points: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to completed with the generated summary
    pub fn complete(&mut self, summary: String, key_points: Vec<String>) {
        self.status = TaskStatus::Completed;
        self.summary = Some(summary);
        self.key_points = key_points;
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Transition to failed with a reason
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_completed() {
        let mut task = TaskRecord::processing("t1", "report.pdf");
        assert_eq!(task.status, TaskStatus::Processing);

        task.complete("A summary".to_string(), vec!["point".to_string()]);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.summary.as_deref(), Some("A summary"));
        assert!(task.error.is_none());
    }

    #[test]
    fn test_lifecycle_failed() {
        let mut task = TaskRecord::processing("t1", "scan.pdf");
        task.fail("Could not extract text from document.");
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.is_some());
    }

    #[test]
    fn test_serializes_camel_case_lowercase_status() {
        let task = TaskRecord::processing("t1", "a.txt");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "processing");
        assert!(json.get("keyPoints").is_some());
    }
}
