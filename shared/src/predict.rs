use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PredictResponse;
use crate::http::{
    PREDICT_PATH, ReplyError, Transport, TransportError, UploadFile, decode_reply, has_extension,
};
use crate::metrics::MetricsStore;
use crate::storage::KeyValueStore;

pub const AUDIO_EXTENSIONS: [&str; 2] = [".wav", ".mp3"];

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
pub enum Label {
    Safe,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display(fmt = "{} ({}%)", label, confidence_percent)]
pub struct PredictionOutcome {
    pub label: Label,
    pub confidence_percent: u8,
}

impl PredictionOutcome {
    pub fn is_danger(&self) -> bool {
        self.label == Label::Danger
    }

    pub fn headline(&self) -> &'static str {
        if self.is_danger() {
            "Danger Detected"
        } else {
            "Safe Environment"
        }
    }

    pub fn subtitle(&self) -> &'static str {
        if self.is_danger() {
            "High-frequency distress signal identified."
        } else {
            "Audio signature matches safe background levels."
        }
    }

    pub fn confidence_text(&self) -> String {
        format!("{}%", self.confidence_percent)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    #[error("Unsupported file format `{file_name}`. Please upload only WAV or MP3 files.")]
    InvalidFormat { file_name: String },
    #[error("Failed to connect to API: {0}")]
    Network(#[from] TransportError),
    #[error("{detail}")]
    ServerError { detail: String },
    #[error("Invalid response from server. {0}")]
    MalformedResponse(String),
}

pub fn validate_audio_name(file_name: &str) -> Result<(), PredictError> {
    if has_extension(file_name, &AUDIO_EXTENSIONS) {
        Ok(())
    } else {
        Err(PredictError::InvalidFormat {
            file_name: file_name.to_string(),
        })
    }
}

/// Validates and submits one clip without touching local statistics.
pub async fn submit_prediction<T: Transport>(
    transport: &T,
    clip: &T::File,
) -> Result<PredictionOutcome, PredictError> {
    let file_name = clip.file_name();
    validate_audio_name(&file_name)?;

    log::debug!("Submitting {} for prediction", file_name);
    let reply = transport.post(PREDICT_PATH, Some(clip)).await?;

    let body = decode_reply::<PredictResponse>(&reply).map_err(|e| match e {
        ReplyError::Server(detail) => PredictError::ServerError { detail },
        ReplyError::Status(status) => TransportError::http_status(status).into(),
        ReplyError::Malformed(detail) => PredictError::MalformedResponse(detail),
    })?;
    interpret(body)
}

/// Full prediction flow: submit, then record the rounded confidence.
///
/// A storage failure after a successful prediction is logged; the outcome is
/// still returned because the server answered.
pub async fn predict<T: Transport, S: KeyValueStore>(
    transport: &T,
    clip: &T::File,
    metrics: &mut MetricsStore<S>,
) -> Result<PredictionOutcome, PredictError> {
    let outcome = submit_prediction(transport, clip).await?;
    if let Err(e) = metrics.record_outcome(&outcome) {
        log::warn!("Prediction {} was not persisted: {}", outcome, e);
    }
    log::info!("Prediction for {}: {}", clip.file_name(), outcome);
    Ok(outcome)
}

fn interpret(body: PredictResponse) -> Result<PredictionOutcome, PredictError> {
    const MISSING: &str = "Missing prediction or confidence.";

    let raw_label = body
        .prediction
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| PredictError::MalformedResponse(MISSING.into()))?;
    let label = Label::from_str(raw_label).map_err(|_| {
        PredictError::MalformedResponse(format!("Unknown prediction label `{}`.", raw_label))
    })?;

    let confidence = match body.confidence {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|c| c.is_finite())
    .ok_or_else(|| PredictError::MalformedResponse(MISSING.into()))?;

    Ok(PredictionOutcome {
        label,
        confidence_percent: confidence.round().clamp(0.0, 100.0) as u8,
    })
}
