use serde::{Deserialize, Serialize};

pub mod config;
pub mod http;
pub mod metrics;
pub mod predict;
pub mod schedule;
pub mod status;
pub mod storage;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

// Wire types for the Sentinel API. Every field is optional or defaulted:
// the server omits keys freely and the core decides what is required.

/// Body of `GET /model/status`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ModelStatusResponse {
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub model_accuracy: Option<f64>,
    #[serde(default)]
    pub is_training: bool,
    #[serde(default)]
    pub training_status: Option<TrainingStatusBody>,
    #[serde(default)]
    pub training_history: Option<TrainingHistory>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TrainingStatusBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub epoch: Option<u32>,
    #[serde(default)]
    pub total_epochs: Option<u32>,
}

/// Per-epoch curves reported after (or during) a training run.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TrainingHistory {
    #[serde(default)]
    pub accuracy: Vec<f64>,
    #[serde(default)]
    pub val_accuracy: Vec<f64>,
    #[serde(default)]
    pub loss: Vec<f64>,
}

impl TrainingHistory {
    pub fn epochs(&self) -> usize {
        self.accuracy.len()
    }

    pub fn epoch_labels(&self) -> Vec<String> {
        (1..=self.epochs()).map(|i| format!("Epoch {}", i)).collect()
    }
}

/// Error fields the server may attach to any response.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ServerFault {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ServerFault {
    /// `error` wins over `detail`; a structured `detail` is rendered as JSON.
    pub fn describe(&self) -> Option<String> {
        if let Some(error) = self.error.as_deref().filter(|e| !e.trim().is_empty()) {
            return Some(error.to_string());
        }
        match &self.detail {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(detail)) if detail.trim().is_empty() => None,
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Body of `POST /predict`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PredictResponse {
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub confidence: Option<serde_json::Value>,
}

/// Body of the three job-start endpoints.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StartJobResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub safe_count: Option<u64>,
    #[serde(default)]
    pub danger_count: Option<u64>,
    #[serde(default)]
    pub data_files: Option<u64>,
}
