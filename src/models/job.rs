use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Status of a job as reported by the Midjourney proxy.
///
/// Only `Success` and `Failure` are terminal; any other value, including
/// names this crate does not know about, means the job is still pending.
#[derive(Debug, Clone, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    NotStart,
    Submitted,
    InProgress,
    Success,
    Failure,
    #[strum(default)]
    Other(String),
}

/// A follow-up operation offered on a job (upscale, variation, reroll...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAction {
    #[serde(default)]
    pub custom_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<i64>,
}

/// Snapshot of a downstream job taken by one status fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub image_url: Option<String>,
    pub buttons: Vec<JobAction>,
}

/// Payload for one submission to the job API.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitPayload {
    /// A fresh prompt, sent to the imagine endpoint.
    Imagine { prompt: String },
    /// A follow-up action on an existing job, sent to the action endpoint.
    Action { custom_id: String, task_id: String },
}

/// Final payload of a job that reached `SUCCESS`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub image_url: String,
    pub buttons: Vec<JobAction>,
    pub task_id: String,
}
