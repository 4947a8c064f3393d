//! In-memory store for asynchronous bulk jobs.
//!
//! A job is created `pending`, moves to `processing` once its first batch
//! is picked up, accumulates one result row per address, and ends
//! `completed` (or `failed` if the processing task died). Rows live only
//! for the process lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;

use crate::report::{ResultRecord, Status};
use crate::smtp::epoch_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRow {
    pub id: String,
    pub status: JobStatus,
    pub total_emails: usize,
    pub processed_emails: usize,
    pub created_at: u64,
    pub updated_at: u64,
    pub error: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultRow {
    pub job_id: String,
    pub email: String,
    pub is_valid: bool,
    pub status: Status,
    pub message: String,
    pub domain: String,
    pub mx_record: Option<String>,
    pub created_at: u64,
}

impl JobResultRow {
    pub fn from_record(job_id: &str, record: &ResultRecord) -> Self {
        Self {
            job_id: job_id.to_string(),
            email: record.email.clone(),
            is_valid: record.is_valid,
            status: record.status,
            message: record.message.clone(),
            domain: record.domain.clone(),
            mx_record: record.mx_record.clone(),
            created_at: epoch_ms(),
        }
    }
}

#[derive(Debug)]
struct JobEntry {
    row: JobRow,
    results: Vec<JobResultRow>,
}

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<String, JobEntry>>,
    sequence: AtomicU64,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, total_emails: usize, metadata: serde_json::Value) -> JobRow {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        let now = epoch_ms();
        let row = JobRow {
            id: format!("job-{sequence}-{}", suffix.to_lowercase()),
            status: JobStatus::Pending,
            total_emails,
            processed_emails: 0,
            created_at: now,
            updated_at: now,
            error: None,
            metadata,
        };
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                row.id.clone(),
                JobEntry {
                    row: row.clone(),
                    results: Vec::new(),
                },
            );
        row
    }

    pub fn mark_processing(&self, id: &str) {
        self.update(id, |entry| {
            entry.row.status = JobStatus::Processing;
        });
    }

    pub fn append_result(&self, id: &str, result: JobResultRow) {
        self.update(id, |entry| {
            entry.row.processed_emails += 1;
            entry.results.push(result);
        });
    }

    pub fn complete(&self, id: &str) {
        self.update(id, |entry| {
            entry.row.status = JobStatus::Completed;
        });
    }

    pub fn fail(&self, id: &str, error: impl Into<String>) {
        let error = error.into();
        self.update(id, move |entry| {
            entry.row.status = JobStatus::Failed;
            entry.row.error = Some(error);
        });
    }

    /// The job row, plus its result rows once the job has completed.
    pub fn get(&self, id: &str) -> Option<(JobRow, Option<Vec<JobResultRow>>)> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(id).map(|entry| {
            let results = (entry.row.status == JobStatus::Completed)
                .then(|| entry.results.clone());
            (entry.row.clone(), results)
        })
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut JobEntry)) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = jobs.get_mut(id) {
            apply(entry);
            entry.row.updated_at = epoch_ms();
        }
    }
}
