//! Scripted [`JobApi`] used to drive the polling engine without a network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::job_client::{JobApi, JobError};
use crate::models::job::{Job, JobAction, JobStatus, SubmitPayload};

/// Replays a fixed sequence of fetch responses.
///
/// Once the script runs out every fetch reports the job as `IN_PROGRESS`.
pub struct ScriptedJobApi {
    submit_result: Result<String, JobError>,
    fetches: Mutex<VecDeque<Result<Job, JobError>>>,
    submitted: Mutex<Vec<SubmitPayload>>,
    submit_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl Default for ScriptedJobApi {
    fn default() -> Self {
        Self::new("task-1")
    }
}

impl ScriptedJobApi {
    pub fn new(job_id: &str) -> Self {
        Self {
            submit_result: Ok(job_id.to_string()),
            fetches: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            submit_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(error: JobError) -> Self {
        Self {
            submit_result: Err(error),
            ..Self::default()
        }
    }

    pub fn then_status(self, status: JobStatus) -> Self {
        let id = self.job_id();
        self.push(Ok(Job {
            id,
            status,
            image_url: None,
            buttons: Vec::new(),
        }))
    }

    pub fn then_success(self, image_url: &str, buttons: Vec<JobAction>) -> Self {
        let id = self.job_id();
        self.push(Ok(Job {
            id,
            status: JobStatus::Success,
            image_url: Some(image_url.to_string()),
            buttons,
        }))
    }

    pub fn then_failure(self, reason: &str) -> Self {
        self.push(Err(JobError::JobFailed(reason.to_string())))
    }

    pub fn then_error(self, error: JobError) -> Self {
        self.push(Err(error))
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<SubmitPayload> {
        self.submitted.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn job_id(&self) -> String {
        self.submit_result.clone().unwrap_or_default()
    }

    fn push(self, response: Result<Job, JobError>) -> Self {
        if let Ok(mut fetches) = self.fetches.lock() {
            fetches.push_back(response);
        }
        self
    }
}

#[async_trait]
impl JobApi for ScriptedJobApi {
    async fn submit(&self, payload: &SubmitPayload) -> Result<String, JobError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(payload.clone());
        }
        self.submit_result.clone()
    }

    async fn fetch_status(&self, job_id: &str) -> Result<Job, JobError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.fetches.lock().ok().and_then(|mut f| f.pop_front());
        next.unwrap_or_else(|| {
            Ok(Job {
                id: job_id.to_string(),
                status: JobStatus::InProgress,
                image_url: None,
                buttons: Vec::new(),
            })
        })
    }
}
