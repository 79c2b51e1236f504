use std::time::Duration;

use crate::http::{STATUS_PATH, Transport, TransportError};
use crate::schedule::{CancellationToken, Sleeper};
use crate::{ModelStatusResponse, TrainingHistory, TrainingStatusBody};

/// Server-side training job state as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Idle,
    Running {
        /// Server phase name, e.g. `preprocessing` or `training`.
        phase: String,
        progress_percent: f64,
        current_epoch: u32,
        /// `None` when the server omits the total or reports 0.
        total_epochs: Option<u32>,
        message: String,
    },
    Succeeded {
        message: String,
    },
    Failed {
        message: String,
    },
}

impl JobStatus {
    pub fn from_body(body: &TrainingStatusBody) -> Self {
        let message = body.message.clone().unwrap_or_default();
        match body.status.as_deref().map(str::trim) {
            None | Some("") | Some("idle") => JobStatus::Idle,
            Some("error") => JobStatus::Failed { message },
            Some("completed") => JobStatus::Succeeded { message },
            Some(phase) => JobStatus::Running {
                phase: phase.to_string(),
                progress_percent: body
                    .progress
                    .filter(|p| p.is_finite())
                    .unwrap_or(0.0)
                    .clamp(0.0, 100.0),
                current_epoch: body.epoch.unwrap_or(0),
                total_epochs: body.total_epochs.filter(|t| *t > 0),
                message,
            },
        }
    }

    pub fn phase(&self) -> &str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Running { phase, .. } => phase,
            JobStatus::Succeeded { .. } => "completed",
            JobStatus::Failed { .. } => "error",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            JobStatus::Idle => None,
            JobStatus::Running { message, .. }
            | JobStatus::Succeeded { message }
            | JobStatus::Failed { message } => Some(message.as_str()),
        }
    }
}

/// Point-in-time view of the server; fetched per tick and never diffed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelStatusSnapshot {
    pub model_loaded: bool,
    pub model_accuracy: Option<f64>,
    pub is_training: bool,
    pub job_status: Option<JobStatus>,
    pub training_history: Option<TrainingHistory>,
}

impl From<ModelStatusResponse> for ModelStatusSnapshot {
    fn from(response: ModelStatusResponse) -> Self {
        Self {
            model_loaded: response.model_loaded,
            model_accuracy: response
                .model_accuracy
                .filter(|a| a.is_finite())
                .map(|a| a.clamp(0.0, 1.0)),
            is_training: response.is_training,
            job_status: response.training_status.as_ref().map(JobStatus::from_body),
            training_history: response.training_history,
        }
    }
}

impl ModelStatusSnapshot {
    pub fn accuracy_percent(&self) -> Option<u32> {
        self.model_accuracy.map(|a| (a * 100.0).round() as u32)
    }
}

/// Progress projected onto the UI while a job is training.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingProgress {
    pub phase: String,
    pub progress_percent: f64,
    pub current_epoch: u32,
    pub total_epochs: u32,
    pub message: String,
}

impl TrainingProgress {
    pub fn from_status(status: &JobStatus, fallback_total_epochs: u32) -> Self {
        match status {
            JobStatus::Running {
                phase,
                progress_percent,
                current_epoch,
                total_epochs,
                message,
            } => Self {
                phase: phase.clone(),
                progress_percent: *progress_percent,
                current_epoch: *current_epoch,
                total_epochs: total_epochs.unwrap_or(fallback_total_epochs),
                message: message.clone(),
            },
            other => Self {
                phase: other.phase().to_string(),
                progress_percent: 0.0,
                current_epoch: 0,
                total_epochs: fallback_total_epochs,
                message: other.message().unwrap_or_default().to_string(),
            },
        }
    }

    /// `45% (Epoch 2/3)`
    pub fn summary(&self) -> String {
        format!(
            "{}% (Epoch {}/{})",
            self.progress_percent.round() as u32,
            self.current_epoch,
            self.total_epochs
        )
    }
}

#[allow(async_fn_in_trait)]
pub trait StatusSource {
    async fn fetch_status(&self) -> Result<ModelStatusSnapshot, TransportError>;
}

/// Reads `/model/status` through a transport. One request per call, no retries.
pub struct RemoteStatusClient<'a, T> {
    transport: &'a T,
}

impl<'a, T: Transport> RemoteStatusClient<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }
}

impl<T: Transport> StatusSource for RemoteStatusClient<'_, T> {
    async fn fetch_status(&self) -> Result<ModelStatusSnapshot, TransportError> {
        let reply = self.transport.get(STATUS_PATH).await?;
        if !reply.is_success() {
            return Err(TransportError::http_status(reply.status));
        }
        let body: ModelStatusResponse =
            serde_json::from_str(&reply.body).map_err(|e| TransportError::decode(e.to_string()))?;
        Ok(body.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ModelAvailability {
    Online,
    Offline,
    Error,
}

/// Everything the status surfaces render, derived from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusBoard {
    pub availability: ModelAvailability,
    pub accuracy_percent: Option<u32>,
    pub training_badge: String,
    pub is_training: bool,
    pub progress_line: Option<String>,
    pub model_info: String,
    pub history: Option<TrainingHistory>,
}

impl StatusBoard {
    pub fn from_snapshot(snapshot: &ModelStatusSnapshot) -> Self {
        let accuracy_percent = snapshot.accuracy_percent();

        let (training_badge, progress_line) = match (&snapshot.job_status, snapshot.is_training) {
            (Some(status), true) => (
                capitalize(status.phase()),
                Some(TrainingProgress::from_status(status, 0).summary()),
            ),
            (None, true) => ("Training".to_string(), None),
            (_, false) => ("Idle".to_string(), None),
        };

        let model_info = if snapshot.model_loaded {
            let accuracy = accuracy_percent
                .map(|a| format!("{}%", a))
                .unwrap_or_else(|| "N/A".to_string());
            format!("Model loaded. Accuracy: {}", accuracy)
        } else {
            "Model not loaded. Please wait...".to_string()
        };

        Self {
            availability: if snapshot.model_loaded {
                ModelAvailability::Online
            } else {
                ModelAvailability::Offline
            },
            accuracy_percent,
            training_badge,
            is_training: snapshot.is_training,
            progress_line,
            model_info,
            history: snapshot.training_history.clone(),
        }
    }

    /// Board shown when the status endpoint cannot be read.
    pub fn unreachable() -> Self {
        Self {
            availability: ModelAvailability::Error,
            accuracy_percent: None,
            training_badge: "Error".to_string(),
            is_training: false,
            progress_line: None,
            model_info: "Unable to load model information.".to_string(),
            history: None,
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Page-life status poll: fetches immediately, then once per `period` until
/// `token` is cancelled. Fetch failures are projected as an unreachable board.
/// Returns the number of boards delivered.
pub async fn monitor_status<S, Z, F>(
    source: &S,
    sleeper: &Z,
    period: Duration,
    token: &CancellationToken,
    mut on_board: F,
) -> u64
where
    S: StatusSource,
    Z: Sleeper,
    F: FnMut(StatusBoard),
{
    let mut delivered = 0u64;
    while !token.is_cancelled() {
        let board = match source.fetch_status().await {
            Ok(snapshot) => StatusBoard::from_snapshot(&snapshot),
            Err(e) => {
                log::warn!("Error fetching model status: {}", e);
                StatusBoard::unreachable()
            }
        };
        on_board(board);
        delivered += 1;

        sleeper.sleep(period).await;
    }
    delivered
}
