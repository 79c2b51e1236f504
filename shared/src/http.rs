use serde::de::DeserializeOwned;

use crate::ServerFault;

pub const STATUS_PATH: &str = "/model/status";
pub const PREDICT_PATH: &str = "/predict";
pub const RETRAIN_PATH: &str = "/retrain";
pub const RETRAIN_EXISTING_PATH: &str = "/retrain-existing";

pub fn continue_training_path(epochs: u32) -> String {
    format!("/continue-training?epochs={}", epochs)
}

/// Raw response handed back by a transport. Decoding is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TransportErrorKind {
    Network,
    Decode,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {detail}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    pub fn network(detail: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Network,
            detail: detail.into(),
        }
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Decode,
            detail: detail.into(),
        }
    }

    pub fn http_status(status: u16) -> Self {
        Self::network(format!("HTTP error! status: {}", status))
    }
}

/// Anything that can be sent as the multipart `file` field.
pub trait UploadFile {
    fn file_name(&self) -> String;
}

/// True when `name` ends with one of `extensions`, ignoring ASCII case.
pub fn has_extension(name: &str, extensions: &[&str]) -> bool {
    let lower = name.to_ascii_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext))
}

/// Platform HTTP seam. Implementations only move bytes: a completed exchange
/// is `Ok` whatever its status code, and `Err` means nothing usable came back.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type File: UploadFile;

    async fn get(&self, path: &str) -> Result<HttpReply, TransportError>;

    /// POST to `path`, as multipart with a single `file` field when one is given.
    async fn post(&self, path: &str, file: Option<&Self::File>) -> Result<HttpReply, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("{0}")]
    Server(String),
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("{0}")]
    Malformed(String),
}

/// Decodes a request/response body. Explicit server error fields take
/// precedence over the status code, which takes precedence over shape checks.
pub fn decode_reply<T: DeserializeOwned>(reply: &HttpReply) -> Result<T, ReplyError> {
    if let Ok(fault) = serde_json::from_str::<ServerFault>(&reply.body) {
        if let Some(detail) = fault.describe() {
            return Err(ReplyError::Server(detail));
        }
    }
    if !reply.is_success() {
        return Err(ReplyError::Status(reply.status));
    }
    serde_json::from_str(&reply.body).map_err(|e| ReplyError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StartJobResponse;

    #[test]
    fn extension_check_ignores_case() {
        assert!(has_extension("Scream.WAV", &[".wav", ".mp3"]));
        assert!(has_extension("street.mp3", &[".wav", ".mp3"]));
        assert!(!has_extension("clip.txt", &[".wav", ".mp3"]));
        assert!(!has_extension("wav", &[".wav"]));
    }

    #[test]
    fn server_fault_beats_status_code() {
        let reply = HttpReply::new(409, r#"{"detail":"Model is already training. Please wait."}"#);
        assert_eq!(
            decode_reply::<StartJobResponse>(&reply),
            Err(ReplyError::Server(
                "Model is already training. Please wait.".into()
            ))
        );
    }

    #[test]
    fn bare_error_status_is_reported_by_code() {
        let reply = HttpReply::new(502, "<html>Bad Gateway</html>");
        assert_eq!(
            decode_reply::<StartJobResponse>(&reply),
            Err(ReplyError::Status(502))
        );
    }

    #[test]
    fn undecodable_success_is_malformed() {
        let reply = HttpReply::new(200, "not json");
        assert!(matches!(
            decode_reply::<StartJobResponse>(&reply),
            Err(ReplyError::Malformed(_))
        ));
    }

    #[test]
    fn continue_path_carries_epochs() {
        assert_eq!(continue_training_path(7), "/continue-training?epochs=7");
    }
}
