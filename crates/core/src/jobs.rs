//! Injected job registry. The default implementation is in-memory: job
//! history lives exactly as long as the process, a documented limitation
//! of the source design.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::IndexingJob;

/// Storage abstraction for indexing jobs, enabling persistence and test
/// doubles without touching orchestrator logic.
pub trait JobStore: Send + Sync {
    fn get(&self, job_id: &str) -> Option<IndexingJob>;
    fn put(&self, job: IndexingJob);
    fn list(&self) -> Vec<IndexingJob>;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, IndexingJob>>,
    order: RwLock<Vec<String>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn get(&self, job_id: &str) -> Option<IndexingJob> {
        self.jobs.read().unwrap().get(job_id).cloned()
    }

    fn put(&self, job: IndexingJob) {
        let mut jobs = self.jobs.write().unwrap();
        if !jobs.contains_key(&job.id) {
            self.order.write().unwrap().push(job.id.clone());
        }
        jobs.insert(job.id.clone(), job);
    }

    fn list(&self) -> Vec<IndexingJob> {
        let jobs = self.jobs.read().unwrap();
        self.order
            .read()
            .unwrap()
            .iter()
            .filter_map(|id| jobs.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    #[test]
    fn put_then_get_round_trips() {
        let store = InMemoryJobStore::new();
        let job = IndexingJob::new("site-1", "/docs", true);
        let id = job.id.clone();

        store.put(job);
        let loaded = store.get(&id).expect("job should exist");
        assert_eq!(loaded.status, JobStatus::Pending);
    }

    #[test]
    fn list_preserves_submission_order() {
        let store = InMemoryJobStore::new();
        let first = IndexingJob::new("site-1", "/a", false);
        let second = IndexingJob::new("site-1", "/b", false);
        let (first_id, second_id) = (first.id.clone(), second.id.clone());

        store.put(first);
        store.put(second);

        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first_id);
        assert_eq!(listed[1].id, second_id);
    }

    #[test]
    fn put_updates_existing_job_in_place() {
        let store = InMemoryJobStore::new();
        let mut job = IndexingJob::new("site-1", "/a", false);
        let id = job.id.clone();
        store.put(job.clone());

        job.status = JobStatus::Completed;
        store.put(job);

        assert_eq!(store.list().len(), 1);
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Completed);
    }
}
