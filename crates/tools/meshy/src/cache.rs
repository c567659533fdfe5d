//! Caller-side cache of task listings

use crate::endpoint::JobFamily;
use crate::types::{TaskId, TaskResult};
use std::collections::HashMap;

/// Last listing fetched per job family, refreshed by poll snapshots
#[derive(Debug, Clone, Default)]
pub struct TaskCache {
    listings: HashMap<JobFamily, Vec<TaskResult>>,
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listing of `family`, keeping the server's order
    pub fn replace(&mut self, family: JobFamily, tasks: Vec<TaskResult>) {
        self.listings.insert(family, tasks);
    }

    pub fn get(&self, family: JobFamily) -> &[TaskResult] {
        self.listings.get(&family).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, family: JobFamily, id: &TaskId) -> Option<&TaskResult> {
        self.get(family).iter().find(|t| &t.id == id)
    }

    /// Copy status, progress and queue position of `snapshot` onto every
    /// cached entry with the same id
    ///
    /// Returns false if no listing holds the task.
    pub fn merge(&mut self, snapshot: &TaskResult) -> bool {
        let mut found = false;
        for cached in self
            .listings
            .values_mut()
            .flat_map(|tasks| tasks.iter_mut())
            .filter(|t| t.id == snapshot.id)
        {
            cached.status = snapshot.status;
            cached.progress = snapshot.progress;
            cached.preceding_tasks = snapshot.preceding_tasks;
            found = true;
        }
        found
    }

    pub fn clear(&mut self) {
        self.listings.clear();
    }

    pub fn len(&self) -> usize {
        self.listings.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
