use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    admission::CooldownTable,
    image_store::{ImageStore, ImageStoreError},
    job_client::JobApi,
    poller::PollingEngine,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PollingEngine>,
    pub auth_guard: Arc<CooldownTable>,
    pub submit_guard: Arc<CooldownTable>,
    pub images: Arc<ImageStore>,
    pub access_code: Arc<str>,
    pub save_images: bool,
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(config: &AppConfig, api: Arc<dyn JobApi>) -> Result<Self, ImageStoreError> {
        let images = ImageStore::new(
            &config.images_dir,
            config.image_max_bytes,
            config.image_timeout(),
        )?;

        Ok(Self {
            engine: Arc::new(PollingEngine::new(
                api,
                config.poll_interval(),
                config.job_timeout(),
            )),
            auth_guard: Arc::new(CooldownTable::new(
                "auth",
                config.auth_failure_threshold,
                config.auth_cooldown(),
            )),
            submit_guard: Arc::new(CooldownTable::new(
                "submit",
                config.failure_threshold,
                config.cooldown(),
            )),
            images: Arc::new(images),
            access_code: Arc::from(config.access_code.as_str()),
            save_images: config.save_images,
            trust_forwarded_for: config.trust_forwarded_for,
        })
    }
}
