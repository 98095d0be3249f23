use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::models::job::{Job, JobAction, JobStatus, SubmitPayload};

const SECRET_HEADER: &str = "mj-api-secret";
const BOT_TYPE: &str = "MID_JOURNEY";
const ACCEPTED_CODE: i64 = 1;

/// Transport seam between the polling engine and the downstream job API.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Submit a job and return the downstream job id.
    async fn submit(&self, payload: &SubmitPayload) -> Result<String, JobError>;

    /// Fetch the current state of a job.
    ///
    /// A job reported as `FAILURE` comes back as [`JobError::JobFailed`].
    async fn fetch_status(&self, job_id: &str) -> Result<Job, JobError>;
}

/// Client for the Midjourney proxy REST API.
pub struct MidjourneyClient {
    http: Client,
    api_secret: String,
    imagine_url: String,
    action_url: String,
    fetch_url_base: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagineBody<'a> {
    base64_array: [&'a str; 0],
    notify_hook: &'a str,
    prompt: &'a str,
    state: &'a str,
    bot_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionBody<'a> {
    custom_id: &'a str,
    task_id: &'a str,
    bot_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitAck {
    code: i64,
    description: Option<String>,
    result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchBody {
    #[serde(default)]
    status: Option<String>,
    image_url: Option<String>,
    fail_reason: Option<String>,
    #[serde(default)]
    buttons: Option<Vec<JobAction>>,
}

impl MidjourneyClient {
    pub fn new(
        api_secret: String,
        imagine_url: String,
        action_url: String,
        fetch_url_base: String,
    ) -> Result<Self, JobError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| JobError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_secret,
            imagine_url,
            action_url,
            fetch_url_base,
        })
    }

    fn fetch_url(&self, job_id: &str) -> String {
        format!("{}{}/fetch", self.fetch_url_base, job_id)
    }
}

#[async_trait]
impl JobApi for MidjourneyClient {
    async fn submit(&self, payload: &SubmitPayload) -> Result<String, JobError> {
        let request = match payload {
            SubmitPayload::Imagine { prompt } => self.http.post(&self.imagine_url).json(&ImagineBody {
                base64_array: [],
                notify_hook: "",
                prompt,
                state: "",
                bot_type: BOT_TYPE,
            }),
            SubmitPayload::Action { custom_id, task_id } => {
                self.http.post(&self.action_url).json(&ActionBody {
                    custom_id,
                    task_id,
                    bot_type: BOT_TYPE,
                })
            }
        };

        let ack: SubmitAck = request
            .header(SECRET_HEADER, &self.api_secret)
            .send()
            .await?
            .json()
            .await?;

        accept_submission(ack)
    }

    async fn fetch_status(&self, job_id: &str) -> Result<Job, JobError> {
        let body: FetchBody = self
            .http
            .get(self.fetch_url(job_id))
            .header(SECRET_HEADER, &self.api_secret)
            .send()
            .await?
            .json()
            .await?;

        interpret_fetch(job_id, body)
    }
}

/// Turn a submit acknowledgement into a job id, or the rejection reason.
fn accept_submission(ack: SubmitAck) -> Result<String, JobError> {
    if ack.code != ACCEPTED_CODE {
        return Err(JobError::SubmissionRejected(
            ack.description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "Failed to submit task".to_string()),
        ));
    }

    // The proxy returns the id as a string, but numeric ids have been seen.
    match ack.result {
        Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(id),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(JobError::Transport(
            "submission accepted without a job id".to_string(),
        )),
    }
}

fn interpret_fetch(job_id: &str, body: FetchBody) -> Result<Job, JobError> {
    let status = body
        .status
        .as_deref()
        .map(|s| JobStatus::from_str(s).unwrap_or_else(|_| JobStatus::Other(s.to_string())))
        .unwrap_or_else(|| JobStatus::Other(String::new()));

    if status == JobStatus::Failure {
        return Err(JobError::JobFailed(
            body.fail_reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "Task failed".to_string()),
        ));
    }

    Ok(Job {
        id: job_id.to_string(),
        status,
        image_url: body.image_url.filter(|u| !u.is_empty()),
        buttons: body.buttons.unwrap_or_default(),
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    SubmissionRejected(String),

    #[error("Job API request failed: {0}")]
    Transport(String),

    #[error("{0}")]
    JobFailed(String),

    #[error("Job did not finish within {0:?}")]
    Timeout(Duration),
}

impl JobError {
    /// Whether this error counts toward the submission cooldown.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, JobError::Validation(_))
    }
}

impl From<reqwest::Error> for JobError {
    fn from(err: reqwest::Error) -> Self {
        JobError::Transport(err.to_string())
    }
}
