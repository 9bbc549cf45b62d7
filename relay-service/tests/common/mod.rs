#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use object_store::memory::InMemory;
use relay_service::config::{InferenceConfig, ObjectStoreConfig, RelayConfig, UploadConfig};
use relay_service::config::parse_extensions;
use relay_service::services::{DashScopeProvider, ObjectStorage, Storage, StorageError};
use relay_service::startup::Application;
use service_core::config::Config as CoreConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const TEST_BUCKET: &str = "relay-test";
pub const TEST_ENDPOINT: &str = "oss-cn-beijing.aliyuncs.com";
pub const TEST_API_KEY: &str = "sk-test-key";
pub const SUBMIT_PATH: &str = "/api/v1/services/aigc/image2video/video-synthesis";
pub const TASKS_PATH: &str = "/api/v1/tasks";

/// A request received by the stub inference API.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("stub received a non-JSON body")
    }
}

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Option<Duration>,
}

impl StubResponse {
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct StubState {
    response: Mutex<Option<StubResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Stand-in for the DashScope API, answering every request with one canned response.
pub struct StubInference {
    pub base_url: String,
    state: Arc<StubState>,
}

impl StubInference {
    pub async fn start() -> Self {
        let state = Arc::new(StubState::default());
        let app = Router::new().fallback(record).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub listener");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    pub fn respond_with(&self, response: StubResponse) {
        *self.state.response.lock().unwrap() = Some(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn record(
    State(state): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        headers,
        body,
    });

    let response = state.response.lock().unwrap().clone();
    let Some(response) = response else {
        return (StatusCode::NOT_IMPLEMENTED, "no stub response configured").into_response();
    };

    if let Some(delay) = response.delay {
        tokio::time::sleep(delay).await;
    }

    (
        response.status,
        [(header::CONTENT_TYPE, response.content_type)],
        response.body,
    )
        .into_response()
}

/// Object storage backed by memory that remembers which keys were written.
pub struct RecordingStorage {
    inner: ObjectStorage,
    memory: Arc<InMemory>,
    keys: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingStorage {
    pub fn new(fail: bool) -> Self {
        let memory = Arc::new(InMemory::new());
        Self {
            inner: ObjectStorage::new(memory.clone(), TEST_BUCKET, TEST_ENDPOINT),
            memory,
            keys: Mutex::new(Vec::new()),
            fail,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    pub async fn object(&self, key: &str) -> Bytes {
        use object_store::{path::Path, GetOptions, ObjectStore};

        self.memory
            .get_opts(&Path::from(key), GetOptions::default())
            .await
            .expect("object not stored")
            .bytes()
            .await
            .expect("failed to read stored object")
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn upload(&self, key: &str, data: Bytes) -> Result<String, StorageError> {
        if self.fail {
            return Err(StorageError::UploadFailed(
                "bucket relay-test is unavailable".to_string(),
            ));
        }
        let url = self.inner.upload(key, data).await?;
        self.keys.lock().unwrap().push(key.to_string());
        Ok(url)
    }

    fn public_url(&self, key: &str) -> String {
        self.inner.public_url(key)
    }
}

pub struct TestOptions {
    pub max_file_size: usize,
    pub allowed_extensions: &'static str,
    pub inference_timeout_secs: u64,
    pub storage_fails: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,
            allowed_extensions: ".png,.jpg",
            inference_timeout_secs: 5,
            storage_fails: false,
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub storage: Arc<RecordingStorage>,
    pub inference: StubInference,
    pub scratch: tempfile::TempDir,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        let inference = StubInference::start().await;
        let scratch = tempfile::tempdir().expect("Failed to create scratch directory");

        let config = RelayConfig {
            common: CoreConfig { port: 0 }, // Random port for testing
            inference: InferenceConfig {
                api_key: TEST_API_KEY.to_string(),
                api_url: format!("{}{}", inference.base_url, SUBMIT_PATH),
                task_url: format!("{}{}", inference.base_url, TASKS_PATH),
                model: "wan2.2-animate-mix".to_string(),
                mode: "wan-std".to_string(),
                timeout_secs: options.inference_timeout_secs,
            },
            object_store: ObjectStoreConfig {
                access_key_id: "test-id".to_string(),
                access_key_secret: "test-secret".to_string(),
                endpoint: format!("https://{}", TEST_ENDPOINT),
                bucket: TEST_BUCKET.to_string(),
                region: "oss-cn-beijing".to_string(),
                timeout_secs: 5,
            },
            upload: UploadConfig {
                max_file_size: options.max_file_size,
                allowed_extensions: parse_extensions(options.allowed_extensions),
                local_dir: scratch.path().join("uploads").to_string_lossy().into_owned(),
            },
        };

        let storage = Arc::new(RecordingStorage::new(options.storage_fails));
        let provider = DashScopeProvider::new(config.inference.clone())
            .expect("Failed to build inference provider");

        let app = Application::build_with(config, storage.clone(), Arc::new(provider))
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            storage,
            inference,
            scratch,
            client,
        }
    }

    pub fn uploads_dir(&self) -> std::path::PathBuf {
        self.scratch.path().join("uploads")
    }

    pub async fn upload(&self, filename: &str, data: Vec<u8>) -> reqwest::Response {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(data).file_name(filename.to_string()),
        );

        self.client
            .post(format!("{}/upload", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute upload request")
    }

    pub async fn generate(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/generate", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute generate request")
    }

    pub async fn status(&self, task_id: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/status/{}", self.address, task_id))
            .send()
            .await
            .expect("Failed to execute status request")
    }
}
