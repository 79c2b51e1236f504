use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://TheodoraE-sentinel1-api.hf.space";

/// Floor for either poll cadence so a bad config cannot spin the loop.
const MIN_POLL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Page-life model status poll.
    pub status_poll_ms: u64,
    /// Poll used while a training job is being watched.
    pub job_poll_ms: u64,
    pub default_epochs: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            status_poll_ms: 5000,
            job_poll_ms: 2000,
            default_epochs: crate::watcher::DEFAULT_EPOCHS,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms.max(MIN_POLL_MS))
    }

    pub fn job_poll(&self) -> Duration {
        Duration::from_millis(self.job_poll_ms.max(MIN_POLL_MS))
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }
}
