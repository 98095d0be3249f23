use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Shared secret sent to the Midjourney proxy in the `mj-api-secret` header
    pub mj_api_secret: String,

    /// Endpoint accepting fresh imagine prompts
    pub imagine_url: String,

    /// Endpoint accepting follow-up actions (upscale, variation, ...)
    pub action_url: String,

    /// Prefix for status lookups; the job id and `/fetch` are appended
    pub fetch_url_base: String,

    /// Password expected by `POST /auth`
    #[serde(default = "default_access_code")]
    pub access_code: String,

    /// Delay between two status fetches of the same job
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on one submit/poll cycle. 0 polls until a terminal state.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    #[serde(default = "default_failure_threshold")]
    pub auth_failure_threshold: u32,

    #[serde(default = "default_cooldown_ms")]
    pub auth_cooldown_ms: u64,

    /// Directory receiving copies of finished images
    #[serde(default = "default_images_dir")]
    pub images_dir: String,

    #[serde(default = "default_true")]
    pub save_images: bool,

    /// Largest image body accepted from the CDN, for downloads and saves
    #[serde(default = "default_image_max_bytes")]
    pub image_max_bytes: u64,

    /// Whole-request bound on one image fetch
    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,

    /// Use the first `X-Forwarded-For` entry as the client identity
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_access_code() -> String {
    "your-access-code".to_string()
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_job_timeout_secs() -> u64 {
    900
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_ms() -> u64 {
    10 * 60 * 1000
}

fn default_images_dir() -> String {
    "images".to_string()
}

fn default_image_max_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_image_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn auth_cooldown(&self) -> Duration {
        Duration::from_millis(self.auth_cooldown_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }
}
