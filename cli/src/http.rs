use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use shared::config::ClientConfig;
use shared::http::{HttpReply, Transport, TransportError, UploadFile};

/// A clip or dataset on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UploadFile for LocalFile {
    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ReqwestTransport {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

async fn read_reply(response: reqwest::Response) -> Result<HttpReply, TransportError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| TransportError::decode(e.to_string()))?;
    Ok(HttpReply::new(status, body))
}

impl Transport for ReqwestTransport {
    type File = LocalFile;

    async fn get(&self, path: &str) -> Result<HttpReply, TransportError> {
        let url = self.config.endpoint(path);
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        read_reply(response).await
    }

    async fn post(&self, path: &str, file: Option<&LocalFile>) -> Result<HttpReply, TransportError> {
        let url = self.config.endpoint(path);
        log::debug!("POST {}", url);
        let request = match file {
            Some(file) => {
                let bytes = tokio::fs::read(file.path()).await.map_err(|e| {
                    TransportError::network(format!(
                        "failed to read {}: {}",
                        file.path().display(),
                        e
                    ))
                })?;
                let part = Part::bytes(bytes).file_name(file.file_name());
                self.client
                    .post(&url)
                    .multipart(Form::new().part("file", part))
            }
            None => self
                .client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json"),
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        read_reply(response).await
    }
}
