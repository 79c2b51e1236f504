//! Browser adapters for the core seams: fetch, timers and localStorage.

use std::rc::Rc;
use std::time::Duration;

use gloo_file::File as GlooFile;
use gloo_net::http::{Request, Response};
use gloo_storage::errors::StorageError as GlooStorageError;
use gloo_storage::{LocalStorage, Storage};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::config::ClientConfig;
use shared::http::{HttpReply, Transport, TransportError, UploadFile};
use shared::schedule::Sleeper;
use shared::storage::{KeyValueStore, StorageError};
use wasm_bindgen::JsValue;
use web_sys::FormData;

/// A file picked through an input or dropped on an upload area.
#[derive(Clone)]
pub struct PickedFile(pub GlooFile);

impl PickedFile {
    pub fn name(&self) -> String {
        self.0.name()
    }
}

impl From<web_sys::File> for PickedFile {
    fn from(file: web_sys::File) -> Self {
        Self(GlooFile::from(file))
    }
}

impl UploadFile for PickedFile {
    fn file_name(&self) -> String {
        self.0.name()
    }
}

#[derive(Clone)]
pub struct GlooTransport {
    config: Rc<ClientConfig>,
}

impl GlooTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: Rc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn js_error(err: JsValue) -> TransportError {
    TransportError::network(format!("{:?}", err))
}

async fn read_reply(response: Response) -> Result<HttpReply, TransportError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| TransportError::decode(e.to_string()))?;
    Ok(HttpReply::new(status, body))
}

impl Transport for GlooTransport {
    type File = PickedFile;

    async fn get(&self, path: &str) -> Result<HttpReply, TransportError> {
        let url = self.config.endpoint(path);
        let response = Request::get(&url)
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        read_reply(response).await
    }

    async fn post(&self, path: &str, file: Option<&PickedFile>) -> Result<HttpReply, TransportError> {
        let url = self.config.endpoint(path);
        let request = match file {
            Some(file) => {
                let form_data = FormData::new().map_err(js_error)?;
                form_data
                    .append_with_blob_and_filename("file", file.0.as_ref(), &file.name())
                    .map_err(js_error)?;
                Request::post(&url).body(form_data)
            }
            None => Request::post(&url)
                .header("Content-Type", "application/json")
                .build(),
        }
        .map_err(|e| TransportError::network(e.to_string()))?;

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        read_reply(response).await
    }
}

#[derive(Clone, Copy, Default)]
pub struct TimerSleeper;

impl Sleeper for TimerSleeper {
    async fn sleep(&self, period: Duration) {
        gloo_timers::future::sleep(period).await;
    }
}

/// `localStorage` under the same keys the dashboard has always used.
#[derive(Clone, Copy, Default)]
pub struct BrowserStore;

impl KeyValueStore for BrowserStore {
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match LocalStorage::get::<T>(key) {
            Ok(value) => Ok(Some(value)),
            Err(GlooStorageError::KeyNotFound(_)) => Ok(None),
            Err(GlooStorageError::SerdeError(e)) => Err(StorageError::Decode {
                key: key.to_string(),
                detail: e.to_string(),
            }),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    fn save<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        LocalStorage::set(key, value).map_err(|e| StorageError::Backend(e.to_string()))
    }
}

/// Build-time override of the API origin, else the hosted default.
pub fn load_config() -> ClientConfig {
    match option_env!("SENTINEL_API_URL") {
        Some(url) if !url.trim().is_empty() => ClientConfig::default().with_base_url(url.trim()),
        _ => ClientConfig::default(),
    }
}
