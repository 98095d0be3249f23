use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::job_client::{JobApi, JobError};
use crate::models::job::{JobOutcome, JobStatus, SubmitPayload};

/// Drives a submitted job to a terminal state by polling its status.
///
/// One cycle runs on the caller's task. Dropping the returned future (for
/// example when the HTTP client disconnects) stops polling at the next
/// network call or sleep.
pub struct PollingEngine {
    api: Arc<dyn JobApi>,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl PollingEngine {
    pub fn new(api: Arc<dyn JobApi>, poll_interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            api,
            poll_interval,
            timeout,
        }
    }

    /// Submit a fresh prompt and wait for the finished image.
    pub async fn submit_prompt(&self, prompt: &str) -> Result<JobOutcome, JobError> {
        if prompt.is_empty() {
            return Err(JobError::Validation("Prompt is required".to_string()));
        }

        self.run(SubmitPayload::Imagine {
            prompt: prompt.to_string(),
        })
        .await
    }

    /// Apply a follow-up action (upscale, variation...) to an existing job
    /// and wait for the resulting job.
    pub async fn submit_action(
        &self,
        custom_id: &str,
        task_id: &str,
    ) -> Result<JobOutcome, JobError> {
        if custom_id.is_empty() || task_id.is_empty() {
            return Err(JobError::Validation(
                "CustomId and taskId are required".to_string(),
            ));
        }

        self.run(SubmitPayload::Action {
            custom_id: custom_id.to_string(),
            task_id: task_id.to_string(),
        })
        .await
    }

    async fn run(&self, payload: SubmitPayload) -> Result<JobOutcome, JobError> {
        let started = Instant::now();
        let cycle = self.submit_and_poll(&payload);

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cycle)
                .await
                .unwrap_or(Err(JobError::Timeout(limit))),
            None => cycle.await,
        };

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::histogram!("imagine_job_duration_seconds", "outcome" => outcome)
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn submit_and_poll(&self, payload: &SubmitPayload) -> Result<JobOutcome, JobError> {
        let task_id = self.api.submit(payload).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Job submission failed");
        })?;

        metrics::counter!("imagine_jobs_submitted_total").increment(1);
        tracing::info!(job_id = %task_id, "Job submitted");

        let mut polls: u32 = 0;
        loop {
            polls += 1;
            let job = self.api.fetch_status(&task_id).await.inspect_err(|e| {
                tracing::warn!(job_id = %task_id, polls, error = %e, "Job did not complete");
            })?;

            match job.status {
                JobStatus::Success => {
                    tracing::info!(job_id = %task_id, polls, "Job completed");
                    return Ok(JobOutcome {
                        image_url: job.image_url.unwrap_or_default(),
                        buttons: job.buttons,
                        task_id,
                    });
                }
                // FAILURE never gets here, fetch_status reports it as JobFailed.
                status => {
                    tracing::debug!(job_id = %task_id, status = %status, polls, "Job pending");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }
}
