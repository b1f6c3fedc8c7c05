//! Task record storage

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::TaskRecord;

/// Storage for upload task records
///
/// Shared between the upload handler and background jobs.
pub trait TaskStore: Send + Sync {
    /// Insert a new task; fails if the ID is taken
    fn insert(&self, task: TaskRecord) -> Result<()>;

    /// Get a task by ID
    fn get(&self, id: &str) -> Result<Option<TaskRecord>>;

    /// List all tasks, oldest first
    fn list(&self) -> Result<Vec<TaskRecord>>;

    /// Replace an existing task; fails if it is unknown
    fn update(&self, task: TaskRecord) -> Result<()>;
}

/// In-memory task store; tasks live as long as the process
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, TaskRecord>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn insert(&self, task: TaskRecord) -> Result<()> {
        let mut tasks = self.tasks.write().unwrap();
        if tasks.contains_key(&task.id) {
            bail!("Task {} already exists", task.id);
        }
        tasks.insert(task.id.clone(), task);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<TaskRecord>> {
        let tasks = self.tasks.read().unwrap();
        Ok(tasks.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<TaskRecord>> {
        let tasks = self.tasks.read().unwrap();
        let mut list: Vec<TaskRecord> = tasks.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    fn update(&self, task: TaskRecord) -> Result<()> {
        let mut tasks = self.tasks.write().unwrap();
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task;
                Ok(())
            }
            None => bail!("Task {} not found", task.id),
        }
    }
}
